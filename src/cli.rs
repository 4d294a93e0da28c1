use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::eval::DEFAULT_THRESHOLD_ACTUAL;

#[derive(Parser, Debug)]
#[command(
    name = "linkage-eval",
    version,
    about = "Threshold-sweep evaluation of record-linkage scores against clerical labels"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Confusion counts and rates at every score-derived threshold.
    Roc(RocArgs),
    /// Truth category of every labeled pair at one prediction threshold.
    Truth(TruthArgs),
    /// Render a comparison's levels as SQL for one dialect.
    Comparison(ComparisonArgs),
    /// List registered dialects.
    Dialects(DialectsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EvalInputArgs {
    /// CSV with `{uid}_l`, `{uid}_r` and `clerical_match_score`.
    #[arg(long)]
    pub labels: PathBuf,

    /// CSV with `{uid}_l`, `{uid}_r` and the resolved score column.
    #[arg(long)]
    pub scores: PathBuf,

    /// Model settings JSON; defaults apply when omitted.
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Persist the working database here instead of using memory.
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_THRESHOLD_ACTUAL)]
    pub threshold_actual: f64,
}

#[derive(Args, Debug, Clone)]
pub struct RocArgs {
    #[command(flatten)]
    pub inputs: EvalInputArgs,

    /// Write the metrics table; `.csv` writes rows only, anything else a JSON report.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TruthArgs {
    #[command(flatten)]
    pub inputs: EvalInputArgs,

    #[arg(long)]
    pub threshold_pred: f64,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ComparisonKind {
    ArrayIntersectAtSizes,
    DatediffAtThresholds,
    JaroWinklerAtThresholds,
    RegexExtractMatch,
}

impl ComparisonKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ArrayIntersectAtSizes => "array_intersect_at_sizes",
            Self::DatediffAtThresholds => "datediff_at_thresholds",
            Self::JaroWinklerAtThresholds => "jaro_winkler_at_thresholds",
            Self::RegexExtractMatch => "regex_extract_match",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ComparisonArgs {
    #[arg(long)]
    pub dialect: String,

    #[arg(long, value_enum)]
    pub kind: ComparisonKind,

    #[arg(long)]
    pub column: String,

    #[arg(long = "size")]
    pub sizes: Vec<u32>,

    #[arg(long = "date-threshold")]
    pub date_thresholds: Vec<u32>,

    #[arg(long = "date-metric")]
    pub date_metrics: Vec<String>,

    #[arg(long = "similarity-threshold")]
    pub similarity_thresholds: Vec<f64>,

    #[arg(long)]
    pub regex: Option<String>,

    /// Override the dialect's fuzzy-similarity function name for this run.
    #[arg(long)]
    pub jaro_winkler_name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DialectsArgs {
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
