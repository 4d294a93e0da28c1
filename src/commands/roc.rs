use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use super::inputs::{Workspace, reconciliation_summary};
use crate::cli::RocArgs;
use crate::eval::{MetricsRow, sweep, validate_threshold};
use crate::model::RocReport;
use crate::util::{create_output_file, has_extension, now_utc_string, write_json_pretty};

const REPORT_VERSION: u32 = 1;

pub fn run(args: RocArgs) -> Result<()> {
    let threshold_actual = args.inputs.threshold_actual;
    validate_threshold("threshold_actual", threshold_actual)?;

    let workspace = Workspace::open(&args.inputs)?;
    let table = workspace.reconcile()?;
    let metrics = sweep(&table, threshold_actual).context("threshold sweep failed")?;
    let reconciliation = reconciliation_summary(&table);
    table.release()?;

    if let Some(path) = args.output.as_deref().filter(|path| has_extension(path, "csv")) {
        let file = create_output_file(path)?;
        metrics
            .write_csv(file)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), rows = metrics.len(), "wrote metrics csv");
    }

    let report = RocReport {
        report_version: REPORT_VERSION,
        generated_at: now_utc_string(),
        unique_id_column_name: workspace.settings.unique_id_column_name.clone(),
        score_column: workspace.score_column.to_string(),
        threshold_actual,
        labels: workspace.labels.clone(),
        scores: workspace.scores.clone(),
        reconciliation,
        threshold_count: metrics.len(),
        rows: metrics.rows().to_vec(),
    };

    if let Some(path) = args.output.as_deref().filter(|path| !has_extension(path, "csv")) {
        write_json_pretty(path, &report)?;
        info!(path = %path.display(), rows = report.rows.len(), "wrote metrics report");
    }

    if args.json {
        let mut output = io::BufWriter::new(io::stdout().lock());
        serde_json::to_writer_pretty(&mut output, &report)
            .context("failed to serialize metrics json output")?;
        writeln!(output)?;
        output.flush()?;
    } else if args.output.is_none() {
        write_text_report(&report)?;
    }

    Ok(())
}

fn write_text_report(report: &RocReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Labeled pairs: {} (found by blocking {}, excluded rows {})",
        report.reconciliation.labeled_pairs,
        report.reconciliation.found_by_blocking,
        report.reconciliation.excluded_label_rows,
    )?;
    writeln!(
        output,
        "Score column: {} threshold_actual={}",
        report.score_column, report.threshold_actual
    )?;
    writeln!(
        output,
        "threshold\trows\tTP\tFP\tTN\tFN\tTP_rate\tFP_rate\tprecision\trecall"
    )?;
    for row in &report.rows {
        write_text_row(&mut output, row)?;
    }
    output.flush()?;
    Ok(())
}

fn write_text_row<W: Write>(output: &mut W, row: &MetricsRow) -> io::Result<()> {
    writeln!(
        output,
        "{:.6}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        row.truth_threshold,
        row.row_count,
        row.TP,
        row.FP,
        row.TN,
        row.FN,
        format_rate(row.TP_rate),
        format_rate(row.FP_rate),
        format_rate(row.precision),
        format_rate(row.recall),
    )
}

fn format_rate(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |rate| format!("{rate:.4}"))
}
