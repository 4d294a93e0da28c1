use super::{DateMetric, DialectDescriptor};

pub(super) fn descriptor() -> DialectDescriptor {
    DialectDescriptor {
        name: "spark".to_string(),
        size_array_intersect: Some(size_array_intersect_sql),
        datediff: Some(datediff_sql),
        regex_extract: Some(regex_extract_sql),
        jaro_winkler_name: Some("jaro_sim".to_string()),
    }
}

fn size_array_intersect_sql(col_l: &str, col_r: &str) -> String {
    format!("size(array_intersect({col_l}, {col_r}))")
}

fn datediff_sql(col_l: &str, col_r: &str, threshold: u32, metric: DateMetric) -> String {
    let difference = match metric {
        DateMetric::Day => format!("abs(datediff({col_l}, {col_r}))"),
        DateMetric::Month => format!("ceil(abs(months_between({col_l}, {col_r})))"),
        DateMetric::Year => format!("ceil(abs(months_between({col_l}, {col_r}) / 12))"),
    };
    format!("{difference} <= {threshold}")
}

fn regex_extract_sql(col_l: &str, col_r: &str, pattern: &str) -> String {
    let literal = quote_literal(pattern);
    format!("regexp_extract({col_l}, {literal}, 0) = regexp_extract({col_r}, {literal}, 0)")
}

// Spark string literals treat backslash as an escape character.
fn quote_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\\', "\\\\").replace('\'', "\\'"))
}
