//! Unit tests for batch aggregation and ranking

use signalyst::models::{Direction, StructuredSignal};
use signalyst::signals::{SignalEngine, SuccessPolicy};

fn signal(id: &str, score: f64, change_pct: f64) -> StructuredSignal {
    StructuredSignal {
        instrument_id: id.to_string(),
        display_name: String::new(),
        score,
        direction: Direction::Watch,
        bullish_factors: Vec::new(),
        bearish_factors: Vec::new(),
        support_levels: Vec::new(),
        resistance_levels: Vec::new(),
        closing_price: 100.0,
        change_pct,
    }
}

fn ids(signals: &[StructuredSignal]) -> Vec<&str> {
    signals.iter().map(|s| s.instrument_id.as_str()).collect()
}

#[test]
fn test_batch_cardinality_with_partial_failures() {
    // Three instruments, one schema failure: 2 analyzed, 1 failed, and the
    // batch still reports success under the default policy.
    let requested = vec!["2330".to_string(), "2317".to_string(), "2454".to_string()];
    let outcomes = vec![
        ("2330".to_string(), Ok(signal("2330", 8.0, 1.0))),
        (
            "2317".to_string(),
            Err("schema violation: field `score`".to_string()),
        ),
        ("2454".to_string(), Ok(signal("2454", 5.0, 0.5))),
    ];

    let batch = SignalEngine::aggregate(&requested, outcomes);
    assert_eq!(batch.analyzed_count(), 2);
    assert_eq!(batch.failed_count(), 1);
    assert_eq!(
        batch.analyzed_count() + batch.failed_count(),
        SignalEngine::dedup_requested(&requested).len()
    );
    assert!(batch.meets(SuccessPolicy::Any));
    assert_eq!(batch.failures[0].instrument_id, "2317");
    assert!(batch.failures[0].reason.contains("schema"));
}

#[test]
fn test_requested_duplicates_collapse_to_first_occurrence() {
    let requested = vec!["2330".to_string(), "2330".to_string(), "2317".to_string()];
    let outcomes = vec![
        ("2330".to_string(), Ok(signal("2330", 3.0, 0.0))),
        ("2317".to_string(), Ok(signal("2317", 2.0, 0.0))),
    ];
    let batch = SignalEngine::aggregate(&requested, outcomes);
    assert_eq!(batch.analyzed_count() + batch.failed_count(), 2);
}

#[test]
fn test_missing_outcome_lands_in_failures() {
    let requested = vec!["2330".to_string(), "2317".to_string()];
    let outcomes = vec![("2330".to_string(), Ok(signal("2330", 3.0, 0.0)))];
    let batch = SignalEngine::aggregate(&requested, outcomes);
    assert_eq!(batch.analyzed_count(), 1);
    assert_eq!(batch.failed_count(), 1);
    assert_eq!(batch.failures[0].instrument_id, "2317");
}

#[test]
fn test_ranking_is_deterministic_and_fully_tiebroken() {
    let input = vec![
        signal("2454", 5.0, 2.0),
        signal("2317", 8.0, 1.0),
        signal("2603", 5.0, 2.0),
        signal("2330", 5.0, 3.0),
    ];

    let ranked = SignalEngine::rank(input.clone());
    // score desc, then change_pct desc, then instrument_id asc.
    assert_eq!(ids(&ranked), vec!["2317", "2330", "2454", "2603"]);

    // Identical input, identical output order.
    let again = SignalEngine::rank(input);
    assert_eq!(ids(&again), ids(&ranked));
}

#[test]
fn test_rank_dedups_keeping_first_occurrence() {
    let ranked = SignalEngine::rank(vec![
        signal("2330", 5.0, 1.0),
        signal("2330", 9.0, 9.0),
        signal("2317", 6.0, 0.0),
    ]);
    assert_eq!(ids(&ranked), vec!["2317", "2330"]);
    // The first 2330 won, so its score is the kept one.
    assert_eq!(ranked[1].score, 5.0);
}

#[test]
fn test_success_policies() {
    let requested = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let outcomes = vec![
        ("a".to_string(), Ok(signal("a", 1.0, 0.0))),
        ("b".to_string(), Ok(signal("b", 1.0, 0.0))),
        ("c".to_string(), Err("no data".to_string())),
    ];
    let batch = SignalEngine::aggregate(&requested, outcomes);

    assert!(batch.meets(SuccessPolicy::Any));
    assert!(batch.meets(SuccessPolicy::Majority));
    assert!(!batch.meets(SuccessPolicy::All));

    let empty = SignalEngine::aggregate(&requested, vec![]);
    assert!(!empty.meets(SuccessPolicy::Any));
    assert!(!empty.meets(SuccessPolicy::Majority));
    assert!(!empty.meets(SuccessPolicy::All));
}
