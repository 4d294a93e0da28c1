use super::{MATCH_PROBABILITY_COLUMN, TF_ADJUSTED_MATCH_PROB_COLUMN};
use crate::model::Settings;

/// Column holding the final match probability for these settings.
pub fn resolve_score_column(settings: &Settings) -> &'static str {
    if settings
        .comparison_columns
        .iter()
        .any(|column| column.term_frequency_adjustments)
    {
        TF_ADJUSTED_MATCH_PROB_COLUMN
    } else {
        MATCH_PROBABILITY_COLUMN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ComparisonColumn;

    fn column(tf: bool) -> ComparisonColumn {
        ComparisonColumn {
            term_frequency_adjustments: tf,
        }
    }

    #[test]
    fn defaults_to_raw_match_probability() {
        let mut settings = Settings::default();
        assert_eq!(resolve_score_column(&settings), "match_probability");

        settings.comparison_columns = vec![column(false), column(false)];
        assert_eq!(resolve_score_column(&settings), "match_probability");
    }

    #[test]
    fn any_tf_adjusted_column_switches_to_adjusted_probability() {
        let settings = Settings {
            comparison_columns: vec![column(false), column(true)],
            ..Settings::default()
        };
        assert_eq!(resolve_score_column(&settings), "tf_adjusted_match_prob");
    }
}
