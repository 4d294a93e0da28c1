use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use super::{CLERICAL_SCORE_COLUMN, quote_ident, table_columns};
use crate::error::{EvalError, EvalResult};

const RECONCILED_TABLE_PREFIX: &str = "reconciled_pairs";

static NEXT_RECONCILED_TABLE: AtomicU64 = AtomicU64::new(1);

/// Each reconciliation owns its temp table, so live handles never share one.
fn next_reconciled_table_name() -> String {
    let id = NEXT_RECONCILED_TABLE.fetch_add(1, Ordering::Relaxed);
    format!("{RECONCILED_TABLE_PREFIX}_{id}")
}

/// One labeled pair joined to its model score, if any.
///
/// `model_score` keeps the distinction between "never scored" and "scored
/// as 0"; `resolved_score` collapses it the way the sweep sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledRow {
    pub id_l: String,
    pub id_r: String,
    pub clerical_match_score: f64,
    pub model_score: Option<f64>,
    pub found_by_blocking: bool,
}

impl ReconciledRow {
    pub fn resolved_score(&self) -> f64 {
        self.model_score.unwrap_or(0.0)
    }
}

/// The persisted reconciliation result. The backing temp table is dropped
/// when this value is released or goes out of scope.
#[derive(Debug)]
pub struct ReconciledTable<'conn> {
    connection: &'conn Connection,
    name: String,
    score_column: String,
    row_count: usize,
    found_count: usize,
    excluded_count: usize,
    released: bool,
}

impl<'conn> ReconciledTable<'conn> {
    pub fn connection(&self) -> &'conn Connection {
        self.connection
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn score_column(&self) -> &str {
        &self.score_column
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn found_by_blocking_count(&self) -> usize {
        self.found_count
    }

    pub fn excluded_label_rows(&self) -> usize {
        self.excluded_count
    }

    pub fn rows(&self) -> EvalResult<Vec<ReconciledRow>> {
        let mut statement = self.connection.prepare(&format!(
            "SELECT id_l, id_r, clerical_match_score, model_score, found_by_blocking
             FROM {}
             ORDER BY rowid",
            quote_ident(&self.name)
        ))?;
        let rows = statement
            .query_map([], |row| {
                Ok(ReconciledRow {
                    id_l: row.get(0)?,
                    id_r: row.get(1)?,
                    clerical_match_score: row.get(2)?,
                    model_score: row.get(3)?,
                    found_by_blocking: row.get::<_, i64>(4)? != 0,
                })
            })?
            .collect::<Result<Vec<ReconciledRow>, rusqlite::Error>>()?;
        Ok(rows)
    }

    /// Resolved scores in ascending order.
    pub fn sorted_scores(&self) -> EvalResult<Vec<f64>> {
        let mut statement = self.connection.prepare(&format!(
            "SELECT resolved_score FROM {} ORDER BY resolved_score",
            quote_ident(&self.name)
        ))?;
        let scores = statement
            .query_map([], |row| row.get::<_, f64>(0))?
            .collect::<Result<Vec<f64>, rusqlite::Error>>()?;
        Ok(scores)
    }

    pub fn release(mut self) -> EvalResult<()> {
        self.released = true;
        drop_reconciled_table(self.connection, &self.name)
    }
}

impl Drop for ReconciledTable<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = drop_reconciled_table(self.connection, &self.name) {
            warn!(error = %err, table = %self.name, "failed to release reconciled table");
        }
    }
}

fn drop_reconciled_table(connection: &Connection, name: &str) -> EvalResult<()> {
    connection.execute_batch(&format!("DROP TABLE IF EXISTS temp.{}", quote_ident(name)))?;
    Ok(())
}

/// Left-joins every labeled pair to the scored pairs on an order-independent
/// key, so `(a, b)` in one table matches `(b, a)` in the other.
pub fn reconcile<'conn>(
    connection: &'conn Connection,
    labels_table: &str,
    scores_table: &str,
    uid: &str,
    score_column: &str,
) -> EvalResult<ReconciledTable<'conn>> {
    let uid = uid.trim();
    if uid.is_empty() {
        return Err(EvalError::configuration("unique id column name is empty"));
    }
    let uid_l = format!("{uid}_l");
    let uid_r = format!("{uid}_r");

    require_columns(
        connection,
        labels_table,
        &[&uid_l, &uid_r, CLERICAL_SCORE_COLUMN],
    )?;
    require_columns(connection, scores_table, &[&uid_l, &uid_r, score_column])?;

    let name = next_reconciled_table_name();
    connection.execute_batch(&reconcile_sql(
        labels_table,
        scores_table,
        uid,
        score_column,
        &name,
    ))?;
    let mut table = ReconciledTable {
        connection,
        name,
        score_column: score_column.to_string(),
        row_count: 0,
        found_count: 0,
        excluded_count: 0,
        released: false,
    };

    let (row_count, found_count): (i64, i64) = connection.query_row(
        &format!(
            "SELECT COUNT(*), COALESCE(SUM(found_by_blocking), 0) FROM {}",
            quote_ident(&table.name)
        ),
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let (label_rows, usable_rows): (i64, i64) = connection.query_row(
        &format!(
            "SELECT
               COUNT(*),
               COALESCE(SUM(
                 CASE
                   WHEN {l} IS NOT NULL AND {r} IS NOT NULL AND {clerical} IS NOT NULL
                   THEN 1
                   ELSE 0
                 END
               ), 0)
             FROM {labels}",
            l = quote_ident(&uid_l),
            r = quote_ident(&uid_r),
            clerical = quote_ident(CLERICAL_SCORE_COLUMN),
            labels = quote_ident(labels_table),
        ),
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    table.row_count = row_count as usize;
    table.found_count = found_count as usize;
    table.excluded_count = (label_rows - usable_rows) as usize;

    if table.excluded_count > 0 {
        warn!(
            rows = table.excluded_count,
            "labeled rows without ids or clerical score were excluded"
        );
    }
    let duplicates = usable_rows - row_count;
    if duplicates > 0 {
        warn!(rows = duplicates, "duplicate labeled pairs were collapsed");
    }
    info!(
        table = %table.name,
        labeled_pairs = table.row_count,
        found_by_blocking = table.found_count,
        score_column = %table.score_column,
        "reconciled labels with scored pairs"
    );

    Ok(table)
}

fn require_columns(connection: &Connection, table: &str, required: &[&str]) -> EvalResult<()> {
    let columns = table_columns(connection, table)?;
    let missing = required
        .iter()
        .filter(|name| !columns.iter().any(|column| column.as_str() == **name))
        .copied()
        .collect::<Vec<&str>>();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EvalError::schema(
            table,
            format!("missing required column(s): {}", missing.join(", ")),
        ))
    }
}

/// Lower and upper ends of an unordered id pair, compared as text in both
/// tables so the key is consistent regardless of input column types.
fn canonical_pair_sql(col_l: &str, col_r: &str) -> (String, String) {
    let left = format!("CAST({col_l} AS TEXT)");
    let right = format!("CAST({col_r} AS TEXT)");
    (
        format!("CASE WHEN {left} > {right} THEN {right} ELSE {left} END"),
        format!("CASE WHEN {left} > {right} THEN {left} ELSE {right} END"),
    )
}

fn reconcile_sql(
    labels_table: &str,
    scores_table: &str,
    uid: &str,
    score_column: &str,
    target: &str,
) -> String {
    let col_l = quote_ident(&format!("{uid}_l"));
    let col_r = quote_ident(&format!("{uid}_r"));
    let (pair_lo, pair_hi) = canonical_pair_sql(&col_l, &col_r);
    let clerical = quote_ident(CLERICAL_SCORE_COLUMN);
    let score = quote_ident(score_column);
    let labels = quote_ident(labels_table);
    let scores = quote_ident(scores_table);
    let target = quote_ident(target);

    format!(
        "
        CREATE TEMP TABLE {target} AS
        WITH labeled AS (
          SELECT
            CAST({col_l} AS TEXT) AS id_l,
            CAST({col_r} AS TEXT) AS id_r,
            {clerical} AS clerical_match_score,
            {pair_lo} AS pair_lo,
            {pair_hi} AS pair_hi,
            ROW_NUMBER() OVER (PARTITION BY {pair_lo}, {pair_hi} ORDER BY rowid) AS occurrence
          FROM {labels}
          WHERE {col_l} IS NOT NULL
            AND {col_r} IS NOT NULL
            AND {clerical} IS NOT NULL
        ),
        scored AS (
          SELECT
            {pair_lo} AS pair_lo,
            {pair_hi} AS pair_hi,
            MAX({score}) AS model_score
          FROM {scores}
          WHERE {col_l} IS NOT NULL
            AND {col_r} IS NOT NULL
          GROUP BY {pair_lo}, {pair_hi}
        )
        SELECT
          labeled.id_l,
          labeled.id_r,
          labeled.clerical_match_score,
          scored.model_score,
          COALESCE(scored.model_score, 0.0) AS resolved_score,
          CASE WHEN scored.pair_lo IS NULL THEN 0 ELSE 1 END AS found_by_blocking
        FROM labeled
        LEFT JOIN scored
          ON labeled.pair_lo = scored.pair_lo
         AND labeled.pair_hi = scored.pair_hi
        WHERE labeled.occurrence = 1
        ORDER BY labeled.pair_lo, labeled.pair_hi;
        "
    )
}
