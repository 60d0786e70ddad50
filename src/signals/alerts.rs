//! Intraday alert evaluation and position sizing.

use crate::models::{Direction, StructuredSignal, TradeAlert};
use crate::risk::HoldingsSnapshot;

#[derive(Debug, Clone, Copy)]
pub struct AlertThresholds {
    pub min_bullish_factors: usize,
    pub min_bearish_factors: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct QuantityInputs {
    pub capital: f64,
    pub buy_ratio: f64,
    pub sell_ratio: f64,
}

/// Ratios may arrive as percentages (20 instead of 0.2); normalize and
/// clamp into 0..=1.
pub fn normalize_ratio(value: f64, default: f64) -> f64 {
    let mut ratio = if value.is_finite() { value } else { default };
    if ratio > 1.0 {
        ratio /= 100.0;
    }
    ratio.clamp(0.0, 1.0)
}

/// Decide whether a signal triggers a buy/sell alert: an explicit
/// direction always does; otherwise enough one-sided factors with a score
/// of matching sign.
pub fn evaluate_alert(signal: &StructuredSignal, thresholds: &AlertThresholds) -> Option<TradeAlert> {
    let bull = signal.bullish_factors.len();
    let bear = signal.bearish_factors.len();

    let (side, reason) = match signal.direction {
        Direction::Buy => (
            Direction::Buy,
            format!(
                "suggested buy (bullish {} / bearish {}, score {})",
                bull, bear, signal.score
            ),
        ),
        Direction::Sell => (
            Direction::Sell,
            format!(
                "suggested sell (bullish {} / bearish {}, score {})",
                bull, bear, signal.score
            ),
        ),
        _ if bull >= thresholds.min_bullish_factors && signal.score > 0.0 => (
            Direction::Buy,
            format!(
                "{} bullish factors (>= {}), score {}: {}",
                bull,
                thresholds.min_bullish_factors,
                signal.score,
                head_of(&signal.bullish_factors)
            ),
        ),
        _ if bear >= thresholds.min_bearish_factors && signal.score < 0.0 => (
            Direction::Sell,
            format!(
                "{} bearish factors (>= {}), score {}: {}",
                bear,
                thresholds.min_bearish_factors,
                signal.score,
                head_of(&signal.bearish_factors)
            ),
        ),
        _ => return None,
    };

    Some(TradeAlert {
        instrument_id: signal.instrument_id.clone(),
        display_name: signal.display_name.clone(),
        side,
        price: signal.closing_price,
        reason,
        suggested_quantity: 0,
        quantity_note: String::new(),
    })
}

/// Fill in the suggested share quantity: buys from a capital ratio at the
/// current price, sells from the holdings snapshot and sell ratio.
pub fn attach_quantity(
    mut alert: TradeAlert,
    inputs: &QuantityInputs,
    holdings: &HoldingsSnapshot,
) -> TradeAlert {
    match alert.side {
        Direction::Buy => {
            let quantity = buy_quantity(inputs.capital, inputs.buy_ratio, alert.price);
            alert.quantity_note = if quantity > 0 {
                format!(
                    "capital {:.0} x buy ratio {:.0}% / price {:.2}",
                    inputs.capital,
                    inputs.buy_ratio * 100.0,
                    alert.price
                )
            } else {
                "insufficient capital or no usable price, suggesting 0 shares".to_string()
            };
            alert.suggested_quantity = quantity;
        }
        Direction::Sell => {
            let held = holdings.quantity(&alert.instrument_id);
            let quantity = sell_quantity(held, inputs.sell_ratio);
            alert.quantity_note = if held > 0 {
                format!(
                    "holding {} shares x sell ratio {:.0}%",
                    held,
                    inputs.sell_ratio * 100.0
                )
            } else {
                "no holdings on record, suggesting 0 shares".to_string()
            };
            alert.suggested_quantity = quantity;
        }
        _ => {
            alert.quantity_note = "unsupported signal side".to_string();
        }
    }
    alert
}

fn buy_quantity(capital: f64, buy_ratio: f64, price: f64) -> u64 {
    if capital <= 0.0 || buy_ratio <= 0.0 || price <= 0.0 {
        return 0;
    }
    let budget = capital * buy_ratio;
    if budget < price {
        return 0;
    }
    (budget / price) as u64
}

fn sell_quantity(held: u64, sell_ratio: f64) -> u64 {
    if held == 0 || sell_ratio <= 0.0 {
        return 0;
    }
    let suggested = (held as f64 * sell_ratio) as u64;
    suggested.clamp(1, held)
}

fn head_of(factors: &[String]) -> String {
    factors
        .iter()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}
