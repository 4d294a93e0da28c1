//! Threshold-sweep evaluation of scored record pairs against clerical labels.
//!
//! Inputs are loaded into SQLite tables, reconciled into one persisted
//! temporary table, and every threshold is summarised with a query against it.

mod input;
mod metrics;
mod reconcile;
mod score;
mod sweep;
#[cfg(test)]
mod tests;

pub use input::{load_csv_table, table_columns};
pub use metrics::{ConfusionCounts, MetricsRow, MetricsTable, TruthCategoryRow, write_truth_csv};
pub use reconcile::{ReconciledRow, ReconciledTable, reconcile};
pub use score::resolve_score_column;
pub use sweep::{sweep, truth_categories, validate_threshold};

pub const LABELS_TABLE: &str = "labels";
pub const SCORES_TABLE: &str = "scores";

pub const CLERICAL_SCORE_COLUMN: &str = "clerical_match_score";
pub const MATCH_PROBABILITY_COLUMN: &str = "match_probability";
pub const TF_ADJUSTED_MATCH_PROB_COLUMN: &str = "tf_adjusted_match_prob";

pub const DEFAULT_THRESHOLD_ACTUAL: f64 = 0.5;

const SCORE_COLUMNS: [&str; 3] = [
    CLERICAL_SCORE_COLUMN,
    MATCH_PROBABILITY_COLUMN,
    TF_ADJUSTED_MATCH_PROB_COLUMN,
];

fn is_score_column(name: &str) -> bool {
    SCORE_COLUMNS.contains(&name)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
