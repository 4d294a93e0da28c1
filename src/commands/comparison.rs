use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::{ComparisonArgs, ComparisonKind};
use crate::comparison::{
    Comparison, array_intersect_at_sizes, datediff_at_thresholds, jaro_winkler_at_thresholds,
    regex_extract_match,
};
use crate::dialect::{DateMetric, Dialect, DialectParams, DialectRegistry};

pub fn run(args: ComparisonArgs) -> Result<()> {
    let registry = DialectRegistry::builtin();
    let params = DialectParams {
        jaro_winkler_name: args.jaro_winkler_name.clone(),
    };
    let dialect = registry.resolve(&args.dialect, &params)?;

    let comparison = build_comparison(&args, &dialect)?;
    info!(
        dialect = %comparison.dialect,
        kind = args.kind.as_str(),
        levels = comparison.comparison_levels.len(),
        "rendered comparison"
    );

    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, &comparison)
        .context("failed to serialize comparison json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn build_comparison(args: &ComparisonArgs, dialect: &Dialect) -> Result<Comparison> {
    let comparison = match args.kind {
        ComparisonKind::ArrayIntersectAtSizes => {
            let sizes = if args.sizes.is_empty() {
                vec![1]
            } else {
                args.sizes.clone()
            };
            array_intersect_at_sizes(dialect, &args.column, &sizes)?
        }
        ComparisonKind::DatediffAtThresholds => {
            let metrics = args
                .date_metrics
                .iter()
                .map(|raw| DateMetric::parse(raw))
                .collect::<Result<Vec<DateMetric>, _>>()?;
            datediff_at_thresholds(dialect, &args.column, &args.date_thresholds, &metrics)?
        }
        ComparisonKind::JaroWinklerAtThresholds => {
            jaro_winkler_at_thresholds(dialect, &args.column, &args.similarity_thresholds)?
        }
        ComparisonKind::RegexExtractMatch => {
            let Some(pattern) = args.regex.as_deref() else {
                bail!("--regex is required for {}", args.kind.as_str());
            };
            regex_extract_match(dialect, &args.column, pattern)?
        }
    };
    Ok(comparison)
}
