use super::{DateMetric, DialectDescriptor};

pub(super) fn descriptor() -> DialectDescriptor {
    DialectDescriptor {
        name: "duckdb".to_string(),
        size_array_intersect: Some(size_array_intersect_sql),
        datediff: Some(datediff_sql),
        regex_extract: Some(regex_extract_sql),
        jaro_winkler_name: Some("jaro_winkler_similarity".to_string()),
    }
}

fn size_array_intersect_sql(col_l: &str, col_r: &str) -> String {
    format!("array_length(list_intersect({col_l}, {col_r}))")
}

fn datediff_sql(col_l: &str, col_r: &str, threshold: u32, metric: DateMetric) -> String {
    let difference = match metric {
        DateMetric::Day => format!("abs(date_diff('day', {col_l}, {col_r}))"),
        DateMetric::Month => format!("ceil(abs(date_diff('month', {col_l}, {col_r})))"),
        DateMetric::Year => format!("ceil(abs(date_diff('month', {col_l}, {col_r}) / 12))"),
    };
    format!("{difference} <= {threshold}")
}

fn regex_extract_sql(col_l: &str, col_r: &str, pattern: &str) -> String {
    let literal = quote_literal(pattern);
    format!("regexp_extract({col_l}, {literal}, 0) = regexp_extract({col_r}, {literal}, 0)")
}

// Standard SQL string literal; backslashes are not escapes here.
fn quote_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_intersect_uses_list_functions() {
        assert_eq!(
            size_array_intersect_sql("tags_l", "tags_r"),
            "array_length(list_intersect(tags_l, tags_r))"
        );
    }

    #[test]
    fn datediff_rounds_month_and_year_up() {
        assert_eq!(
            datediff_sql("dob_l", "dob_r", 3, DateMetric::Day),
            "abs(date_diff('day', dob_l, dob_r)) <= 3"
        );
        assert_eq!(
            datediff_sql("dob_l", "dob_r", 2, DateMetric::Month),
            "ceil(abs(date_diff('month', dob_l, dob_r))) <= 2"
        );
        assert_eq!(
            datediff_sql("dob_l", "dob_r", 1, DateMetric::Year),
            "ceil(abs(date_diff('month', dob_l, dob_r) / 12)) <= 1"
        );
    }

    #[test]
    fn regex_literal_doubles_single_quotes() {
        assert_eq!(
            regex_extract_sql("name_l", "name_r", r"^O'\w+"),
            r"regexp_extract(name_l, '^O''\w+', 0) = regexp_extract(name_r, '^O''\w+', 0)"
        );
    }
}
