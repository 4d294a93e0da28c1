use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

use crate::cli::EvalInputArgs;
use crate::eval::{LABELS_TABLE, ReconciledTable, SCORES_TABLE, load_csv_table, reconcile};
use crate::model::{InputDigest, ReconciliationSummary, Settings};
use crate::util::{ensure_directory, sha256_file};

/// Loaded inputs for one evaluation run.
pub(crate) struct Workspace {
    pub connection: Connection,
    pub settings: Settings,
    pub score_column: &'static str,
    pub labels: InputDigest,
    pub scores: InputDigest,
}

impl Workspace {
    pub fn open(args: &EvalInputArgs) -> Result<Self> {
        let settings = match &args.settings {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        let score_column = crate::eval::resolve_score_column(&settings);

        let mut connection = open_connection(args.db_path.as_deref())?;
        let labels = load_input(&mut connection, LABELS_TABLE, &args.labels)?;
        let scores = load_input(&mut connection, SCORES_TABLE, &args.scores)?;

        info!(
            unique_id_column = %settings.unique_id_column_name,
            score_column,
            labels = labels.row_count,
            scores = scores.row_count,
            "evaluation inputs ready"
        );

        Ok(Self {
            connection,
            settings,
            score_column,
            labels,
            scores,
        })
    }

    pub fn reconcile(&self) -> Result<ReconciledTable<'_>> {
        let table = reconcile(
            &self.connection,
            LABELS_TABLE,
            SCORES_TABLE,
            &self.settings.unique_id_column_name,
            self.score_column,
        )
        .context("failed to reconcile labels with scored pairs")?;
        Ok(table)
    }
}

pub(crate) fn reconciliation_summary(table: &ReconciledTable<'_>) -> ReconciliationSummary {
    ReconciliationSummary {
        labeled_pairs: table.row_count(),
        found_by_blocking: table.found_by_blocking_count(),
        excluded_label_rows: table.excluded_label_rows(),
    }
}

fn open_connection(db_path: Option<&Path>) -> Result<Connection> {
    let Some(db_path) = db_path else {
        return Connection::open_in_memory().context("failed to open in-memory database");
    };

    if let Some(parent) = db_path.parent() {
        ensure_directory(parent)?;
    }
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn load_input(connection: &mut Connection, table: &str, path: &Path) -> Result<InputDigest> {
    let loaded = load_csv_table(connection, table, path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(InputDigest {
        path: path.display().to_string(),
        sha256: sha256_file(path)?,
        row_count: loaded.row_count,
    })
}
