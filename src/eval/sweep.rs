use rusqlite::{Connection, params};
use tracing::{debug, info};

use super::{ConfusionCounts, MetricsRow, MetricsTable, ReconciledTable, TruthCategoryRow, quote_ident};
use crate::error::{EvalError, EvalResult};

const PERCENTILE_STEPS: u64 = 100;

/// Percentiles 0..=100 of `sorted_scores` plus 1.0, ascending and distinct.
///
/// Uses the nearest-rank rule on integer arithmetic so percentile `k` of `n`
/// values is the `ceil(k * n / 100)`-th smallest value (the first for k = 0).
pub fn derive_thresholds(sorted_scores: &[f64]) -> Vec<f64> {
    let count = sorted_scores.len() as u64;
    let mut thresholds = Vec::with_capacity(PERCENTILE_STEPS as usize + 2);

    if count > 0 {
        for percentile in 0..=PERCENTILE_STEPS {
            let rank = (percentile * count).div_ceil(PERCENTILE_STEPS).max(1);
            thresholds.push(sorted_scores[(rank - 1) as usize]);
        }
    }
    thresholds.push(1.0);

    thresholds.sort_by(f64::total_cmp);
    thresholds.dedup();
    thresholds
}

fn truth_counts_sql(table: &str) -> String {
    format!(
        "
        SELECT
          COUNT(*),
          COALESCE(SUM(CASE WHEN clerical_match_score >= ?1 THEN 1 ELSE 0 END), 0),
          COALESCE(SUM(CASE WHEN clerical_match_score < ?1 THEN 1 ELSE 0 END), 0),
          COALESCE(SUM(CASE WHEN resolved_score > ?2 AND clerical_match_score >= ?1 THEN 1 ELSE 0 END), 0),
          COALESCE(SUM(CASE WHEN resolved_score <= ?2 AND clerical_match_score < ?1 THEN 1 ELSE 0 END), 0),
          COALESCE(SUM(CASE WHEN resolved_score > ?2 AND clerical_match_score < ?1 THEN 1 ELSE 0 END), 0),
          COALESCE(SUM(CASE WHEN resolved_score <= ?2 AND clerical_match_score >= ?1 THEN 1 ELSE 0 END), 0)
        FROM {table}
        "
    )
}

fn summarise_threshold(
    connection: &Connection,
    sql: &str,
    threshold_pred: f64,
    threshold_actual: f64,
) -> EvalResult<ConfusionCounts> {
    let counts = connection.query_row(sql, params![threshold_actual, threshold_pred], |row| {
        Ok(ConfusionCounts {
            row_count: row.get::<_, i64>(0)? as u64,
            p: row.get::<_, i64>(1)? as u64,
            n: row.get::<_, i64>(2)? as u64,
            tp: row.get::<_, i64>(3)? as u64,
            tn: row.get::<_, i64>(4)? as u64,
            fp: row.get::<_, i64>(5)? as u64,
            fn_: row.get::<_, i64>(6)? as u64,
        })
    })?;
    Ok(counts)
}

/// Confusion counts and rates at every threshold derived from the resolved
/// score distribution. The first failing threshold aborts the sweep.
pub fn sweep(table: &ReconciledTable<'_>, threshold_actual: f64) -> EvalResult<MetricsTable> {
    validate_threshold("threshold_actual", threshold_actual)?;

    let scores = table.sorted_scores()?;
    let thresholds = derive_thresholds(&scores);
    info!(
        rows = scores.len(),
        thresholds = thresholds.len(),
        "derived sweep thresholds"
    );

    let sql = truth_counts_sql(&quote_ident(table.name()));
    let mut rows = Vec::with_capacity(thresholds.len());
    for threshold in thresholds {
        let counts = summarise_threshold(table.connection(), &sql, threshold, threshold_actual)?;
        debug_assert!(counts.is_consistent(), "inconsistent counts at {threshold}");
        debug!(
            threshold,
            tp = counts.tp,
            fp = counts.fp,
            tn = counts.tn,
            fn_ = counts.fn_,
            "summarised threshold"
        );
        rows.push(MetricsRow::from_counts(threshold, counts));
    }

    let metrics = MetricsTable::from_rows(rows);
    info!(rows = metrics.len(), "threshold sweep complete");
    Ok(metrics)
}

/// Every reconciled pair classified at a single prediction threshold.
pub fn truth_categories(
    table: &ReconciledTable<'_>,
    threshold_pred: f64,
    threshold_actual: f64,
) -> EvalResult<Vec<TruthCategoryRow>> {
    validate_threshold("threshold_pred", threshold_pred)?;
    validate_threshold("threshold_actual", threshold_actual)?;

    let rows = table
        .rows()?
        .iter()
        .map(|row| TruthCategoryRow::classify(row, threshold_pred, threshold_actual))
        .collect::<Vec<TruthCategoryRow>>();
    Ok(rows)
}

pub fn validate_threshold(name: &str, value: f64) -> EvalResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EvalError::configuration(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_always_end_at_one() {
        assert_eq!(derive_thresholds(&[]), vec![1.0]);
        assert_eq!(derive_thresholds(&[1.0, 1.0]), vec![1.0]);
        assert_eq!(derive_thresholds(&[0.0, 0.8]), vec![0.0, 0.8, 1.0]);
    }

    #[test]
    fn thresholds_use_nearest_rank_percentiles() {
        let scores = (1..=200).map(|value| value as f64 / 200.0).collect::<Vec<f64>>();
        let thresholds = derive_thresholds(&scores);

        // 101 percentiles over 200 distinct values are distinct and the 100th is 1.0.
        assert_eq!(thresholds.len(), 101);
        assert_eq!(thresholds[0], 0.005);
        assert_eq!(thresholds[1], 0.01);
        assert_eq!(thresholds[50], 0.5);
        assert_eq!(*thresholds.last().expect("non-empty"), 1.0);
    }

    #[test]
    fn thresholds_are_strictly_ascending_and_bounded() {
        let scores = vec![0.1, 0.1, 0.1, 0.3, 0.3, 0.9];
        let thresholds = derive_thresholds(&scores);
        assert!(thresholds.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(thresholds.first().copied(), Some(0.1));
        assert_eq!(thresholds, vec![0.1, 0.3, 0.9, 1.0]);
    }

    #[test]
    fn thresholds_outside_unit_interval_are_rejected() {
        assert!(validate_threshold("threshold_actual", 1.5).is_err());
        assert!(validate_threshold("threshold_actual", f64::NAN).is_err());
        assert!(validate_threshold("threshold_actual", 0.0).is_ok());
    }
}
