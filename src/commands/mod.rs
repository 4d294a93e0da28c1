pub mod comparison;
pub mod dialects;
mod inputs;
pub mod roc;
pub mod truth;
