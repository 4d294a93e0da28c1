use thiserror::Error;

pub type EvalResult<T> = Result<T, EvalError>;

/// Errors raised by the dialect layer and the evaluation pipeline.
///
/// Undefined rates are not errors; they surface as `None` on the metrics row.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("schema error in table {table}: {message}")]
    Schema { table: String, message: String },

    #[error("failed to load table {table}: {message}")]
    Input { table: String, message: String },

    #[error("invalid value for {column} at row {row}: {message}")]
    InvalidValue {
        column: String,
        row: usize,
        message: String,
    },

    #[error("backend query failed: {0}")]
    Backend(#[from] rusqlite::Error),
}

impl EvalError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn schema(table: &str, message: impl Into<String>) -> Self {
        Self::Schema {
            table: table.to_string(),
            message: message.into(),
        }
    }
}
