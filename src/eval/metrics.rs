use std::io::Write;

use serde::Serialize;

use super::ReconciledRow;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfusionCategory {
    TruePositive,
    TrueNegative,
    FalsePositive,
    FalseNegative,
}

impl ConfusionCategory {
    pub fn classify(predicted: bool, actual: bool) -> Self {
        match (predicted, actual) {
            (true, true) => Self::TruePositive,
            (false, false) => Self::TrueNegative,
            (true, false) => Self::FalsePositive,
            (false, true) => Self::FalseNegative,
        }
    }
}

/// Aggregated confusion counts at one threshold.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ConfusionCounts {
    pub row_count: u64,
    pub p: u64,
    pub n: u64,
    pub tp: u64,
    pub tn: u64,
    pub fp: u64,
    pub fn_: u64,
}

impl ConfusionCounts {
    pub fn record(&mut self, category: ConfusionCategory) {
        self.row_count += 1;
        match category {
            ConfusionCategory::TruePositive => {
                self.p += 1;
                self.tp += 1;
            }
            ConfusionCategory::FalseNegative => {
                self.p += 1;
                self.fn_ += 1;
            }
            ConfusionCategory::TrueNegative => {
                self.n += 1;
                self.tn += 1;
            }
            ConfusionCategory::FalsePositive => {
                self.n += 1;
                self.fp += 1;
            }
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.p + self.n == self.row_count
            && self.tp + self.fn_ == self.p
            && self.tn + self.fp == self.n
    }
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRow {
    pub truth_threshold: f64,
    pub row_count: u64,
    pub P: u64,
    pub N: u64,
    pub TP: u64,
    pub TN: u64,
    pub FP: u64,
    pub FN: u64,
    pub P_rate: Option<f64>,
    pub N_rate: Option<f64>,
    pub TP_rate: Option<f64>,
    pub TN_rate: Option<f64>,
    pub FP_rate: Option<f64>,
    pub FN_rate: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
}

impl MetricsRow {
    pub fn from_counts(truth_threshold: f64, counts: ConfusionCounts) -> Self {
        Self {
            truth_threshold,
            row_count: counts.row_count,
            P: counts.p,
            N: counts.n,
            TP: counts.tp,
            TN: counts.tn,
            FP: counts.fp,
            FN: counts.fn_,
            P_rate: ratio(counts.p, counts.row_count),
            N_rate: ratio(counts.n, counts.row_count),
            TP_rate: ratio(counts.tp, counts.p),
            TN_rate: ratio(counts.tn, counts.n),
            FP_rate: ratio(counts.fp, counts.n),
            FN_rate: ratio(counts.fn_, counts.p),
            precision: ratio(counts.tp, counts.tp + counts.fp),
            recall: ratio(counts.tp, counts.tp + counts.fn_),
        }
    }
}

fn ratio(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

/// Metrics rows ordered by ascending threshold, whatever order they were
/// computed in.
#[derive(Debug, Clone, Default)]
pub struct MetricsTable {
    rows: Vec<MetricsRow>,
}

impl MetricsTable {
    pub fn from_rows(mut rows: Vec<MetricsRow>) -> Self {
        rows.sort_by(|left, right| left.truth_threshold.total_cmp(&right.truth_threshold));
        Self { rows }
    }

    pub fn rows(&self) -> &[MetricsRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Undefined rates are written as empty cells.
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

/// One reconciled pair classified at a single prediction threshold.
#[allow(non_snake_case)]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TruthCategoryRow {
    pub id_l: String,
    pub id_r: String,
    pub clerical_match_score: f64,
    pub match_score: f64,
    pub found_by_blocking: bool,
    pub truth_threshold: f64,
    pub P: bool,
    pub N: bool,
    pub TP: bool,
    pub TN: bool,
    pub FP: bool,
    pub FN: bool,
}

impl TruthCategoryRow {
    pub fn classify(row: &ReconciledRow, threshold_pred: f64, threshold_actual: f64) -> Self {
        let actual = row.clerical_match_score >= threshold_actual;
        let predicted = row.resolved_score() > threshold_pred;
        let category = ConfusionCategory::classify(predicted, actual);

        Self {
            id_l: row.id_l.clone(),
            id_r: row.id_r.clone(),
            clerical_match_score: row.clerical_match_score,
            match_score: row.resolved_score(),
            found_by_blocking: row.found_by_blocking,
            truth_threshold: threshold_pred,
            P: actual,
            N: !actual,
            TP: category == ConfusionCategory::TruePositive,
            TN: category == ConfusionCategory::TrueNegative,
            FP: category == ConfusionCategory::FalsePositive,
            FN: category == ConfusionCategory::FalseNegative,
        }
    }

    pub fn category(&self) -> ConfusionCategory {
        ConfusionCategory::classify(self.TP || self.FP, self.P)
    }
}

pub fn write_truth_csv<W: Write>(rows: &[TruthCategoryRow], writer: W) -> csv::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
