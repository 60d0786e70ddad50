//! Unit tests for artifact parsing and plan watch-list extraction

use signalyst::models::Direction;
use signalyst::report::{
    parse_plan_watchlist, parse_signal_report, split_field_block, ParseError,
};

const FULL_REPORT: &str = r#"---
instrument_id: 2330
display_name: TSMC
direction: buy
score: 7.5
bullish_factors: [break above 20MA, volume surge]
bearish_factors:
  - macd divergence
support_levels: [1020, 1000]
resistance_levels: [1080]
closing_price: 1050.0
change_pct: 1.8
---

Momentum continues to build after the breakout.
"#;

#[test]
fn test_parse_full_report() {
    let parsed = parse_signal_report(FULL_REPORT).unwrap();
    let signal = &parsed.signal;
    assert_eq!(signal.instrument_id, "2330");
    assert_eq!(signal.display_name, "TSMC");
    assert_eq!(signal.direction, Direction::Buy);
    assert_eq!(signal.score, 7.5);
    assert_eq!(
        signal.bullish_factors,
        vec!["break above 20MA", "volume surge"]
    );
    assert_eq!(signal.bearish_factors, vec!["macd divergence"]);
    assert_eq!(signal.support_levels, vec![1020.0, 1000.0]);
    assert_eq!(signal.resistance_levels, vec![1080.0]);
    assert_eq!(signal.closing_price, 1050.0);
    assert_eq!(signal.change_pct, 1.8);
    assert!(parsed.narrative.starts_with("Momentum continues"));
}

#[test]
fn test_field_order_is_preserved() {
    let (block, _) = split_field_block(FULL_REPORT).unwrap();
    let keys: Vec<&str> = block.keys().collect();
    assert_eq!(keys[0], "instrument_id");
    assert_eq!(keys[1], "display_name");
    assert_eq!(keys[2], "direction");
}

#[test]
fn test_missing_required_field_is_schema_violation() {
    let text = "---\ninstrument_id: 2330\ndirection: buy\nscore: 5\nbullish_factors: [a]\nbearish_factors: [b]\n---\nbody";
    match parse_signal_report(text) {
        Err(ParseError::SchemaViolation { field, .. }) => assert_eq!(field, "closing_price"),
        other => panic!("expected schema violation, got {other:?}"),
    }
}

#[test]
fn test_empty_instrument_id_is_schema_violation() {
    let text = "---\ninstrument_id:  \ndirection: buy\nscore: 5\nbullish_factors: [a]\nbearish_factors: [b]\nclosing_price: 10\n---";
    // An empty scalar reads as an empty sequence, so instrument_id fails
    // either way; assert it is the reported field.
    match parse_signal_report(text) {
        Err(ParseError::SchemaViolation { field, .. }) => assert_eq!(field, "instrument_id"),
        other => panic!("expected schema violation, got {other:?}"),
    }
}

#[test]
fn test_unknown_direction_is_schema_violation() {
    let text = "---\ninstrument_id: 2330\ndirection: moon\nscore: 5\nbullish_factors: [a]\nbearish_factors: [b]\nclosing_price: 10\n---";
    match parse_signal_report(text) {
        Err(ParseError::SchemaViolation { field, .. }) => assert_eq!(field, "direction"),
        other => panic!("expected schema violation, got {other:?}"),
    }
}

#[test]
fn test_score_out_of_range_is_schema_violation() {
    let text = "---\ninstrument_id: 2330\ndirection: buy\nscore: 42\nbullish_factors: [a]\nbearish_factors: [b]\nclosing_price: 10\n---";
    match parse_signal_report(text) {
        Err(ParseError::SchemaViolation { field, .. }) => assert_eq!(field, "score"),
        other => panic!("expected schema violation, got {other:?}"),
    }
}

#[test]
fn test_scalar_where_sequence_expected_is_schema_violation() {
    let text = "---\ninstrument_id: 2330\ndirection: buy\nscore: 5\nbullish_factors: strong\nbearish_factors: [b]\nclosing_price: 10\n---";
    match parse_signal_report(text) {
        Err(ParseError::SchemaViolation { field, .. }) => assert_eq!(field, "bullish_factors"),
        other => panic!("expected schema violation, got {other:?}"),
    }
}

#[test]
fn test_missing_field_block_is_rejected() {
    assert!(matches!(
        parse_signal_report("just some narrative"),
        Err(ParseError::MissingFieldBlock)
    ));
    assert!(matches!(
        parse_signal_report("---\ninstrument_id: 2330\nno closing fence"),
        Err(ParseError::MissingFieldBlock)
    ));
}

const PLAN: &str = r#"# Trading Plan 2026-08-07

## Buy Plan

| Code | Name | Entry |
|---|---|---|
| 2330 | TSMC | 1040 |
| 2454 | MediaTek | 1200 |

## Strong Buy Candidates

| Code | Name |
|---|---|
| 2330 | TSMC |

## Watch List

| Code | Name |
|---|---|
| 2317 | Hon Hai |
| 00878 | Cathay ESG |

## Notes

| 9999 | not a recommendation table |
"#;

#[test]
fn test_plan_watchlist_extraction_dedups_in_order() {
    let plan = parse_plan_watchlist(PLAN);
    assert_eq!(plan.buy_candidates, vec!["2330", "2454"]);
    assert_eq!(plan.watchlist, vec!["2317", "00878"]);
    assert_eq!(plan.all(), vec!["2330", "2454", "2317", "00878"]);
}

#[test]
fn test_plan_rows_outside_sections_are_ignored() {
    let plan = parse_plan_watchlist(PLAN);
    assert!(!plan.all().contains(&"9999".to_string()));
}

#[test]
fn test_empty_plan_yields_empty_watchlist() {
    let plan = parse_plan_watchlist("# A plan with no tables\n\nNothing today.");
    assert!(plan.is_empty());
    assert!(plan.all().is_empty());
}
