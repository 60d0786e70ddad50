//! Unit tests for the risk rule filter

use signalyst::models::{Direction, RiskRejection, StructuredSignal};
use signalyst::risk::{accepted, Holding, HoldingsSnapshot, RiskFilter, RiskLimits};

fn limits() -> RiskLimits {
    RiskLimits {
        capital: 1_000_000.0,
        max_position_pct: 0.2,
        max_open_positions: 5,
        max_holding_quantity: 5_000,
        board_lot: 1_000,
    }
}

fn buy(id: &str, price: f64, score: f64) -> StructuredSignal {
    StructuredSignal {
        instrument_id: id.to_string(),
        display_name: String::new(),
        score,
        direction: Direction::Buy,
        bullish_factors: Vec::new(),
        bearish_factors: Vec::new(),
        support_levels: Vec::new(),
        resistance_levels: Vec::new(),
        closing_price: price,
        change_pct: 0.0,
    }
}

#[test]
fn test_affordable_buy_is_accepted_with_original_score() {
    let filter = RiskFilter::new(limits());
    let candidates = vec![buy("2330", 100.0, 7.0)];
    let decisions = filter.evaluate(&candidates, &HoldingsSnapshot::default());

    assert_eq!(decisions.len(), 1);
    assert!(decisions[0].accepted);
    assert!(decisions[0].rejection.is_none());
    assert_eq!(decisions[0].signal.score, 7.0);
}

#[test]
fn test_first_violated_rule_short_circuits() {
    // Price breaks the notional rule (rule 1) AND the instrument is at the
    // holdings cap (rule 3): only rule 1's reason may surface.
    let holdings = HoldingsSnapshot::from_positions([(
        "2330".to_string(),
        Holding {
            quantity: 5_000,
            average_cost: 500.0,
        },
    )]);
    let filter = RiskFilter::new(limits());
    let candidates = vec![buy("2330", 999.0, 7.0)]; // 999 * 1000 > 200_000

    let decisions = filter.evaluate(&candidates, &holdings);
    assert!(!decisions[0].accepted);
    assert!(matches!(
        decisions[0].rejection,
        Some(RiskRejection::PositionNotional { .. })
    ));
}

#[test]
fn test_concentration_limit_caps_accepted_buys() {
    let mut limits = limits();
    limits.max_open_positions = 1;
    let filter = RiskFilter::new(limits);

    let candidates = vec![buy("2330", 100.0, 8.0), buy("2317", 100.0, 7.0)];
    let decisions = filter.evaluate(&candidates, &HoldingsSnapshot::default());

    assert!(decisions[0].accepted);
    assert!(matches!(
        decisions[1].rejection,
        Some(RiskRejection::ConcentrationLimit { open: 1, limit: 1 })
    ));
}

#[test]
fn test_holdings_cap_rejects_further_buys() {
    let holdings = HoldingsSnapshot::from_positions([(
        "2330".to_string(),
        Holding {
            quantity: 5_000,
            average_cost: 90.0,
        },
    )]);
    let filter = RiskFilter::new(limits());
    let decisions = filter.evaluate(&[buy("2330", 100.0, 7.0)], &holdings);

    assert!(matches!(
        decisions[0].rejection,
        Some(RiskRejection::HoldingsCap {
            held: 5_000,
            cap: 5_000
        })
    ));
}

#[test]
fn test_non_buy_candidates_pass_through() {
    let mut sell = buy("2603", 99_999.0, -6.0);
    sell.direction = Direction::Sell;
    let mut watch = buy("2609", 99_999.0, 2.0);
    watch.direction = Direction::Watch;

    let filter = RiskFilter::new(limits());
    let decisions = filter.evaluate(&[sell, watch], &HoldingsSnapshot::default());
    assert!(decisions.iter().all(|d| d.accepted));
}

#[test]
fn test_rejected_candidates_stay_in_the_decision_log() {
    let mut limits = limits();
    limits.max_open_positions = 1;
    let filter = RiskFilter::new(limits);

    let candidates = vec![
        buy("2330", 100.0, 9.0),
        buy("2317", 100.0, 8.0),
        buy("2454", 100.0, 7.0),
    ];
    let decisions = filter.evaluate(&candidates, &HoldingsSnapshot::default());

    // Order preserved, nothing silently dropped.
    assert_eq!(decisions.len(), 3);
    let ids: Vec<&str> = decisions
        .iter()
        .map(|d| d.signal.instrument_id.as_str())
        .collect();
    assert_eq!(ids, vec!["2330", "2317", "2454"]);

    let kept = accepted(&decisions);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].instrument_id, "2330");
}

#[test]
fn test_zero_capital_rejects_buys_on_notional_rule() {
    let mut limits = limits();
    limits.capital = 0.0;
    let filter = RiskFilter::new(limits);
    let decisions = filter.evaluate(&[buy("2330", 100.0, 7.0)], &HoldingsSnapshot::default());
    assert!(matches!(
        decisions[0].rejection,
        Some(RiskRejection::PositionNotional { .. })
    ));
}
