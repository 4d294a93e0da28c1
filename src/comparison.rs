//! Comparison levels rendered through a resolved dialect.
//!
//! Every builder checks column names eagerly and asks the dialect for its
//! fragment, so an engine missing an operation fails before any SQL is used.

use serde::Serialize;

use crate::dialect::{DateMetric, Dialect, validate_identifier};
use crate::error::{EvalError, EvalResult};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComparisonLevel {
    pub sql_condition: String,
    pub label_for_charts: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_null_level: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub output_column_name: String,
    pub comparison_description: String,
    pub dialect: String,
    pub comparison_levels: Vec<ComparisonLevel>,
}

pub fn null_level(col_name: &str) -> EvalResult<ComparisonLevel> {
    let (col_l, col_r) = column_pair(col_name)?;
    Ok(ComparisonLevel {
        sql_condition: format!("{col_l} IS NULL OR {col_r} IS NULL"),
        label_for_charts: "Null".to_string(),
        is_null_level: true,
    })
}

pub fn exact_match_level(col_name: &str) -> EvalResult<ComparisonLevel> {
    let (col_l, col_r) = column_pair(col_name)?;
    Ok(ComparisonLevel {
        sql_condition: format!("{col_l} = {col_r}"),
        label_for_charts: "Exact match".to_string(),
        is_null_level: false,
    })
}

pub fn else_level() -> ComparisonLevel {
    ComparisonLevel {
        sql_condition: "ELSE".to_string(),
        label_for_charts: "All other comparisons".to_string(),
        is_null_level: false,
    }
}

pub fn array_intersect_level(
    dialect: &Dialect,
    col_name: &str,
    min_intersection: u32,
) -> EvalResult<ComparisonLevel> {
    if min_intersection == 0 {
        return Err(EvalError::configuration(
            "array intersection size must be at least 1",
        ));
    }
    let (col_l, col_r) = column_pair(col_name)?;
    let size = dialect.size_array_intersect_sql(&col_l, &col_r)?;
    Ok(ComparisonLevel {
        sql_condition: format!("{size} >= {min_intersection}"),
        label_for_charts: format!("Array intersection size >= {min_intersection}"),
        is_null_level: false,
    })
}

pub fn datediff_level(
    dialect: &Dialect,
    col_name: &str,
    threshold: u32,
    metric: DateMetric,
) -> EvalResult<ComparisonLevel> {
    let (col_l, col_r) = column_pair(col_name)?;
    let unit = if threshold == 1 {
        metric.as_str().to_string()
    } else {
        format!("{}s", metric.as_str())
    };
    Ok(ComparisonLevel {
        sql_condition: dialect.datediff_sql(&col_l, &col_r, threshold, metric)?,
        label_for_charts: format!("Within {threshold} {unit}"),
        is_null_level: false,
    })
}

pub fn regex_extract_level(
    dialect: &Dialect,
    col_name: &str,
    pattern: &str,
) -> EvalResult<ComparisonLevel> {
    let (col_l, col_r) = column_pair(col_name)?;
    Ok(ComparisonLevel {
        sql_condition: dialect.regex_extract_sql(&col_l, &col_r, pattern)?,
        label_for_charts: format!("Exact match on regex extract '{pattern}'"),
        is_null_level: false,
    })
}

pub fn jaro_winkler_level(
    dialect: &Dialect,
    col_name: &str,
    threshold: f64,
) -> EvalResult<ComparisonLevel> {
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(EvalError::configuration(format!(
            "jaro-winkler threshold must be in (0, 1], got {threshold}"
        )));
    }
    let (col_l, col_r) = column_pair(col_name)?;
    let function = dialect.jaro_winkler_name()?;
    Ok(ComparisonLevel {
        sql_condition: format!("{function}({col_l}, {col_r}) >= {threshold}"),
        label_for_charts: format!("Jaro-Winkler similarity >= {threshold}"),
        is_null_level: false,
    })
}

/// Null level, one level per requested intersection size (largest first),
/// then the else level.
pub fn array_intersect_at_sizes(
    dialect: &Dialect,
    col_name: &str,
    sizes: &[u32],
) -> EvalResult<Comparison> {
    if sizes.is_empty() {
        return Err(EvalError::configuration(
            "array_intersect_at_sizes needs at least one size",
        ));
    }
    let mut ordered = sizes.to_vec();
    ordered.sort_unstable_by(|left, right| right.cmp(left));
    ordered.dedup();

    let mut levels = vec![null_level(col_name)?];
    for size in &ordered {
        levels.push(array_intersect_level(dialect, col_name, *size)?);
    }
    levels.push(else_level());

    let sizes_desc = ordered
        .iter()
        .map(u32::to_string)
        .collect::<Vec<String>>()
        .join(", ");
    Ok(Comparison {
        output_column_name: col_name.trim().to_string(),
        comparison_description: format!("Array intersection at minimum sizes {sizes_desc}"),
        dialect: dialect.name().to_string(),
        comparison_levels: levels,
    })
}

/// Thresholds and metrics are paired positionally, e.g. `[1, 1]` with
/// `[month, year]`.
pub fn datediff_at_thresholds(
    dialect: &Dialect,
    col_name: &str,
    thresholds: &[u32],
    metrics: &[DateMetric],
) -> EvalResult<Comparison> {
    if thresholds.is_empty() {
        return Err(EvalError::configuration(
            "datediff_at_thresholds needs at least one threshold",
        ));
    }
    if thresholds.len() != metrics.len() {
        return Err(EvalError::configuration(format!(
            "got {} date thresholds but {} date metrics",
            thresholds.len(),
            metrics.len()
        )));
    }

    let mut levels = vec![null_level(col_name)?, exact_match_level(col_name)?];
    let mut described = Vec::with_capacity(thresholds.len());
    for (threshold, metric) in thresholds.iter().zip(metrics) {
        let level = datediff_level(dialect, col_name, *threshold, *metric)?;
        described.push(level.label_for_charts.to_ascii_lowercase());
        levels.push(level);
    }
    levels.push(else_level());

    Ok(Comparison {
        output_column_name: col_name.trim().to_string(),
        comparison_description: format!("Exact match vs. {}", described.join(", ")),
        dialect: dialect.name().to_string(),
        comparison_levels: levels,
    })
}

pub fn jaro_winkler_at_thresholds(
    dialect: &Dialect,
    col_name: &str,
    thresholds: &[f64],
) -> EvalResult<Comparison> {
    if thresholds.is_empty() {
        return Err(EvalError::configuration(
            "jaro_winkler_at_thresholds needs at least one threshold",
        ));
    }
    let mut ordered = thresholds.to_vec();
    ordered.sort_by(|left, right| right.total_cmp(left));
    ordered.dedup();

    let mut levels = vec![null_level(col_name)?, exact_match_level(col_name)?];
    for threshold in &ordered {
        levels.push(jaro_winkler_level(dialect, col_name, *threshold)?);
    }
    levels.push(else_level());

    let thresholds_desc = ordered
        .iter()
        .map(f64::to_string)
        .collect::<Vec<String>>()
        .join(", ");
    Ok(Comparison {
        output_column_name: col_name.trim().to_string(),
        comparison_description: format!("Exact match vs. Jaro-Winkler at {thresholds_desc}"),
        dialect: dialect.name().to_string(),
        comparison_levels: levels,
    })
}

pub fn regex_extract_match(
    dialect: &Dialect,
    col_name: &str,
    pattern: &str,
) -> EvalResult<Comparison> {
    Ok(Comparison {
        output_column_name: col_name.trim().to_string(),
        comparison_description: format!("Exact match on regex extract '{pattern}'"),
        dialect: dialect.name().to_string(),
        comparison_levels: vec![
            null_level(col_name)?,
            regex_extract_level(dialect, col_name, pattern)?,
            else_level(),
        ],
    })
}

fn column_pair(col_name: &str) -> EvalResult<(String, String)> {
    let column = validate_identifier(col_name)?;
    Ok((format!("{column}_l"), format!("{column}_r")))
}
