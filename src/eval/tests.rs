use proptest::prelude::*;
use rusqlite::Connection;

use super::input::load_table_from_reader;
use super::*;
use crate::model::{ComparisonColumn, Settings};

fn load(connection: &mut Connection, labels_csv: &str, scores_csv: &str) {
    load_table_from_reader(connection, LABELS_TABLE, labels_csv.as_bytes())
        .expect("labels should load");
    load_table_from_reader(connection, SCORES_TABLE, scores_csv.as_bytes())
        .expect("scores should load");
}

fn metrics_for(connection: &Connection, settings: &Settings, threshold_actual: f64) -> MetricsTable {
    let table = reconcile(
        connection,
        LABELS_TABLE,
        SCORES_TABLE,
        &settings.unique_id_column_name,
        resolve_score_column(settings),
    )
    .expect("reconcile should succeed");
    let metrics = sweep(&table, threshold_actual).expect("sweep should succeed");
    table.release().expect("release should succeed");
    metrics
}

#[test]
fn worked_example_classifies_reversed_pair_as_true_positive() {
    let mut connection = Connection::open_in_memory().expect("in-memory DB should open");
    load(
        &mut connection,
        "unique_id_l,unique_id_r,clerical_match_score\n1,2,0.9\n1,3,0.1\n",
        "unique_id_l,unique_id_r,match_probability\n2,1,0.8\n",
    );

    let table = reconcile(
        &connection,
        LABELS_TABLE,
        SCORES_TABLE,
        "unique_id",
        MATCH_PROBABILITY_COLUMN,
    )
    .expect("reconcile should succeed");

    let truth = truth_categories(&table, 0.5, DEFAULT_THRESHOLD_ACTUAL)
        .expect("truth categories should compute");
    assert_eq!(truth.len(), 2);
    let pair_12 = truth.iter().find(|row| row.id_r == "2").expect("pair (1,2)");
    assert!(pair_12.TP && pair_12.found_by_blocking);
    assert_eq!(pair_12.match_score, 0.8);
    let pair_13 = truth.iter().find(|row| row.id_r == "3").expect("pair (1,3)");
    assert!(pair_13.TN && !pair_13.found_by_blocking);
    assert_eq!(pair_13.match_score, 0.0);

    let metrics = sweep(&table, DEFAULT_THRESHOLD_ACTUAL).expect("sweep should succeed");
    let thresholds = metrics
        .rows()
        .iter()
        .map(|row| row.truth_threshold)
        .collect::<Vec<f64>>();
    assert_eq!(thresholds, vec![0.0, 0.8, 1.0]);

    // Anything in [0, 0.8) classifies exactly like t = 0.5.
    let lowest = &metrics.rows()[0];
    assert_eq!(
        (lowest.P, lowest.N, lowest.TP, lowest.FN, lowest.TN, lowest.FP),
        (1, 1, 1, 0, 1, 0)
    );
    assert_eq!(lowest.precision, Some(1.0));
    assert_eq!(lowest.recall, Some(1.0));

    let top = &metrics.rows()[2];
    assert_eq!((top.TP, top.FN), (0, 1));
    assert_eq!(top.precision, None, "nothing is predicted positive at 1.0");
    assert_eq!(top.recall, Some(0.0));
}

#[test]
fn sweep_matches_single_threshold_classification() {
    let mut connection = Connection::open_in_memory().expect("in-memory DB should open");
    load(
        &mut connection,
        "unique_id_l,unique_id_r,clerical_match_score\n\
         a,b,1.0\nb,c,0.7\nc,d,0.2\nd,e,0.0\ne,f,0.5\nf,g,0.4\n",
        "unique_id_l,unique_id_r,match_probability\n\
         b,a,0.95\nb,c,0.3\nd,c,0.6\nf,e,0.5\ng,f,0.1\n",
    );
    let table = reconcile(
        &connection,
        LABELS_TABLE,
        SCORES_TABLE,
        "unique_id",
        MATCH_PROBABILITY_COLUMN,
    )
    .expect("reconcile should succeed");
    let metrics = sweep(&table, 0.5).expect("sweep should succeed");

    for row in metrics.rows() {
        let mut expected = ConfusionCounts::default();
        for truth in truth_categories(&table, row.truth_threshold, 0.5).expect("truth") {
            expected.record(truth.category());
        }
        assert_eq!(
            (row.row_count, row.P, row.N, row.TP, row.TN, row.FP, row.FN),
            (
                expected.row_count,
                expected.p,
                expected.n,
                expected.tp,
                expected.tn,
                expected.fp,
                expected.fn_
            ),
            "threshold {}",
            row.truth_threshold
        );
    }
}

#[test]
fn tf_adjusted_settings_read_the_adjusted_column() {
    let mut connection = Connection::open_in_memory().expect("in-memory DB should open");
    load(
        &mut connection,
        "person_id_l,person_id_r,clerical_match_score\n1,2,1.0\n",
        "person_id_l,person_id_r,match_probability,tf_adjusted_match_prob\n1,2,0.2,0.9\n",
    );
    let settings = Settings {
        unique_id_column_name: "person_id".to_string(),
        comparison_columns: vec![ComparisonColumn {
            term_frequency_adjustments: true,
        }],
    };

    let metrics = metrics_for(&connection, &settings, 0.5);
    let thresholds = metrics
        .rows()
        .iter()
        .map(|row| row.truth_threshold)
        .collect::<Vec<f64>>();
    assert_eq!(thresholds, vec![0.9, 1.0]);
}

#[test]
fn sweeping_one_reconciliation_ignores_a_later_one() {
    let mut connection = Connection::open_in_memory().expect("in-memory DB should open");
    load(
        &mut connection,
        "unique_id_l,unique_id_r,clerical_match_score\n1,2,0.9\n1,3,0.1\n",
        "unique_id_l,unique_id_r,match_probability,tf_adjusted_match_prob\n2,1,0.8,0.1\n",
    );
    let thresholds = |metrics: MetricsTable| {
        metrics
            .rows()
            .iter()
            .map(|row| row.truth_threshold)
            .collect::<Vec<f64>>()
    };

    let raw = reconcile(
        &connection,
        LABELS_TABLE,
        SCORES_TABLE,
        "unique_id",
        MATCH_PROBABILITY_COLUMN,
    )
    .expect("raw reconcile should succeed");
    let before = thresholds(sweep(&raw, 0.5).expect("raw sweep"));
    assert_eq!(before, vec![0.0, 0.8, 1.0]);

    let adjusted = reconcile(
        &connection,
        LABELS_TABLE,
        SCORES_TABLE,
        "unique_id",
        TF_ADJUSTED_MATCH_PROB_COLUMN,
    )
    .expect("adjusted reconcile should succeed");
    assert_eq!(thresholds(sweep(&raw, 0.5).expect("raw sweep")), before);
    assert_eq!(
        thresholds(sweep(&adjusted, 0.5).expect("adjusted sweep")),
        vec![0.0, 0.1, 1.0]
    );

    adjusted.release().expect("release should succeed");
    assert_eq!(thresholds(sweep(&raw, 0.5).expect("raw sweep after release")), before);
}

#[test]
fn empty_labels_produce_a_single_undefined_row() {
    let mut connection = Connection::open_in_memory().expect("in-memory DB should open");
    load(
        &mut connection,
        "unique_id_l,unique_id_r,clerical_match_score\n",
        "unique_id_l,unique_id_r,match_probability\n1,2,0.4\n",
    );

    let metrics = metrics_for(&connection, &Settings::default(), 0.5);
    assert_eq!(metrics.len(), 1);
    let row = &metrics.rows()[0];
    assert_eq!(row.truth_threshold, 1.0);
    assert_eq!(row.row_count, 0);
    assert_eq!(row.P_rate, None);
    assert_eq!(row.recall, None);
}

#[test]
fn invalid_threshold_actual_fails_before_querying() {
    let mut connection = Connection::open_in_memory().expect("in-memory DB should open");
    load(
        &mut connection,
        "unique_id_l,unique_id_r,clerical_match_score\n1,2,0.9\n",
        "unique_id_l,unique_id_r,match_probability\n1,2,0.4\n",
    );
    let table = reconcile(
        &connection,
        LABELS_TABLE,
        SCORES_TABLE,
        "unique_id",
        MATCH_PROBABILITY_COLUMN,
    )
    .expect("reconcile should succeed");

    let error = sweep(&table, -0.1).expect_err("negative threshold should be rejected");
    assert!(matches!(error, crate::error::EvalError::Configuration(_)));
}

fn labeled_pairs() -> impl Strategy<Value = Vec<(u8, u8, f64, Option<f64>)>> {
    prop::collection::vec(
        (
            0u8..30,
            0u8..30,
            0.0..=1.0f64,
            prop::option::of(0.0..=1.0f64),
        ),
        0..40,
    )
}

fn seed_from_pairs(pairs: &[(u8, u8, f64, Option<f64>)]) -> Connection {
    let mut labels = String::from("unique_id_l,unique_id_r,clerical_match_score\n");
    let mut scores = String::from("unique_id_l,unique_id_r,match_probability\n");
    for (index, (left, right, clerical, score)) in pairs.iter().enumerate() {
        labels.push_str(&format!("{left},{right},{clerical}\n"));
        if let Some(score) = score {
            // Alternate the id order so reconciliation has to canonicalise.
            if index % 2 == 0 {
                scores.push_str(&format!("{right},{left},{score}\n"));
            } else {
                scores.push_str(&format!("{left},{right},{score}\n"));
            }
        }
    }

    let mut connection = Connection::open_in_memory().expect("in-memory DB should open");
    load(&mut connection, &labels, &scores);
    connection
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn counts_are_consistent_at_every_threshold(
        pairs in labeled_pairs(),
        threshold_actual in 0.0..=1.0f64,
    ) {
        let connection = seed_from_pairs(&pairs);
        let metrics = metrics_for(&connection, &Settings::default(), threshold_actual);

        prop_assert!(!metrics.rows().is_empty());
        prop_assert_eq!(metrics.rows().last().map(|row| row.truth_threshold), Some(1.0));
        for row in metrics.rows() {
            prop_assert_eq!(row.P + row.N, row.row_count);
            prop_assert_eq!(row.TP + row.FN, row.P);
            prop_assert_eq!(row.TN + row.FP, row.N);
            prop_assert_eq!(row.TP + row.TN + row.FP + row.FN, row.row_count);
            for value in [row.precision, row.recall].into_iter().flatten() {
                prop_assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    #[test]
    fn positive_rates_do_not_increase_with_threshold(pairs in labeled_pairs()) {
        let connection = seed_from_pairs(&pairs);
        let metrics = metrics_for(&connection, &Settings::default(), 0.5);

        for window in metrics.rows().windows(2) {
            prop_assert!(window[0].truth_threshold < window[1].truth_threshold);
            if let (Some(before), Some(after)) = (window[0].TP_rate, window[1].TP_rate) {
                prop_assert!(after <= before);
            }
            if let (Some(before), Some(after)) = (window[0].FP_rate, window[1].FP_rate) {
                prop_assert!(after <= before);
            }
        }
    }

    #[test]
    fn truth_rows_have_exactly_one_category(
        pairs in labeled_pairs(),
        threshold_pred in 0.0..=1.0f64,
    ) {
        let connection = seed_from_pairs(&pairs);
        let table = reconcile(
            &connection,
            LABELS_TABLE,
            SCORES_TABLE,
            "unique_id",
            MATCH_PROBABILITY_COLUMN,
        )
        .expect("reconcile should succeed");

        for row in truth_categories(&table, threshold_pred, 0.5).expect("truth") {
            let flags = [row.TP, row.TN, row.FP, row.FN];
            prop_assert_eq!(flags.iter().filter(|flag| **flag).count(), 1);
            prop_assert!(row.P != row.N);
        }
    }
}
