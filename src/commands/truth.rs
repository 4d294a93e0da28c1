use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use super::inputs::{Workspace, reconciliation_summary};
use crate::cli::TruthArgs;
use crate::eval::{ConfusionCounts, truth_categories, validate_threshold, write_truth_csv};
use crate::model::TruthReport;
use crate::util::{create_output_file, has_extension, now_utc_string, write_json_pretty};

const REPORT_VERSION: u32 = 1;

pub fn run(args: TruthArgs) -> Result<()> {
    let threshold_actual = args.inputs.threshold_actual;
    validate_threshold("threshold_actual", threshold_actual)?;
    validate_threshold("threshold_pred", args.threshold_pred)?;

    let workspace = Workspace::open(&args.inputs)?;
    let table = workspace.reconcile()?;
    let rows = truth_categories(&table, args.threshold_pred, threshold_actual)
        .context("failed to classify reconciled pairs")?;
    let reconciliation = reconciliation_summary(&table);
    let score_column = table.score_column().to_string();
    table.release()?;

    let mut counts = ConfusionCounts::default();
    for row in &rows {
        counts.record(row.category());
    }
    info!(
        threshold_pred = args.threshold_pred,
        rows = counts.row_count,
        tp = counts.tp,
        fp = counts.fp,
        tn = counts.tn,
        fn_ = counts.fn_,
        "classified labeled pairs"
    );

    let report = TruthReport {
        report_version: REPORT_VERSION,
        generated_at: now_utc_string(),
        unique_id_column_name: workspace.settings.unique_id_column_name.clone(),
        score_column,
        threshold_actual,
        threshold_pred: args.threshold_pred,
        labels: workspace.labels.clone(),
        scores: workspace.scores.clone(),
        reconciliation,
        rows,
    };

    if let Some(path) = args.output.as_deref() {
        if has_extension(path, "csv") {
            let file = create_output_file(path)?;
            write_truth_csv(&report.rows, file)
                .with_context(|| format!("failed to write {}", path.display()))?;
        } else {
            write_json_pretty(path, &report)?;
        }
        info!(path = %path.display(), rows = report.rows.len(), "wrote truth categories");
    }

    if args.json {
        let mut output = io::BufWriter::new(io::stdout().lock());
        serde_json::to_writer_pretty(&mut output, &report)
            .context("failed to serialize truth json output")?;
        writeln!(output)?;
        output.flush()?;
    } else if args.output.is_none() {
        let mut output = io::BufWriter::new(io::stdout().lock());
        write_truth_csv(&report.rows, &mut output).context("failed to write truth categories")?;
        output.flush()?;
    }

    Ok(())
}
