use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::DialectsArgs;
use crate::dialect::{DialectParams, DialectRegistry, Operation};

#[derive(Debug, Serialize)]
struct DialectSummary {
    name: String,
    jaro_winkler_name: Option<String>,
    operations: Vec<&'static str>,
}

pub fn run(args: DialectsArgs) -> Result<()> {
    let summaries = summarise(&DialectRegistry::builtin())?;
    let mut output = io::BufWriter::new(io::stdout().lock());

    if args.json {
        serde_json::to_writer_pretty(&mut output, &summaries)
            .context("failed to serialize dialect json output")?;
        writeln!(output)?;
    } else {
        for summary in &summaries {
            writeln!(
                output,
                "{}\tjaro_winkler={}\toperations={}",
                summary.name,
                summary.jaro_winkler_name.as_deref().unwrap_or("-"),
                summary.operations.join(",")
            )?;
        }
    }
    output.flush()?;
    Ok(())
}

fn summarise(registry: &DialectRegistry) -> Result<Vec<DialectSummary>> {
    let params = DialectParams::default();
    let mut summaries = Vec::new();
    for name in registry.names() {
        let dialect = registry.resolve(name, &params)?;
        summaries.push(DialectSummary {
            name: dialect.name().to_string(),
            jaro_winkler_name: dialect.jaro_winkler_name().ok().map(ToOwned::to_owned),
            operations: Operation::ALL
                .into_iter()
                .filter(|operation| dialect.supports(*operation))
                .map(Operation::as_str)
                .collect(),
        });
    }
    Ok(summaries)
}
