use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::eval::{MetricsRow, TruthCategoryRow};

pub const DEFAULT_UNIQUE_ID_COLUMN: &str = "unique_id";

/// The subset of linkage-model settings the evaluation reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_unique_id_column_name")]
    pub unique_id_column_name: String,
    #[serde(default)]
    pub comparison_columns: Vec<ComparisonColumn>,
}

/// Only the term-frequency flag matters here; other keys are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonColumn {
    #[serde(default)]
    pub term_frequency_adjustments: bool,
}

fn default_unique_id_column_name() -> String {
    DEFAULT_UNIQUE_ID_COLUMN.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            unique_id_column_name: default_unique_id_column_name(),
            comparison_columns: Vec::new(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let settings: Settings = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse settings {}", path.display()))?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InputDigest {
    pub path: String,
    pub sha256: String,
    pub row_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationSummary {
    pub labeled_pairs: usize,
    pub found_by_blocking: usize,
    pub excluded_label_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RocReport {
    pub report_version: u32,
    pub generated_at: String,
    pub unique_id_column_name: String,
    pub score_column: String,
    pub threshold_actual: f64,
    pub labels: InputDigest,
    pub scores: InputDigest,
    pub reconciliation: ReconciliationSummary,
    pub threshold_count: usize,
    pub rows: Vec<MetricsRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TruthReport {
    pub report_version: u32,
    pub generated_at: String,
    pub unique_id_column_name: String,
    pub score_column: String,
    pub threshold_actual: f64,
    pub threshold_pred: f64,
    pub labels: InputDigest,
    pub scores: InputDigest,
    pub reconciliation: ReconciliationSummary,
    pub rows: Vec<TruthCategoryRow>,
}
