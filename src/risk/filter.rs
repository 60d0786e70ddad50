//! Capital, concentration, and holdings constraints.
//!
//! Rules run per candidate in a fixed order and short-circuit: the first
//! violated rule decides the rejection and its reason. A candidate is
//! never tagged with an aggregate of every rule it breaks. Rejected
//! candidates stay in the decision log for audit; accepted ones keep their
//! original score and ranking order.

use crate::config::RiskConfig;
use crate::models::{Direction, RiskDecision, RiskRejection, StructuredSignal};
use crate::risk::HoldingsSnapshot;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RiskLimits {
    pub capital: f64,
    pub max_position_pct: f64,
    pub max_open_positions: usize,
    pub max_holding_quantity: u64,
    pub board_lot: u64,
}

impl RiskLimits {
    pub fn from_config(risk: &RiskConfig, capital: f64) -> Self {
        Self {
            capital,
            max_position_pct: risk.max_position_pct,
            max_open_positions: risk.max_open_positions,
            max_holding_quantity: risk.max_holding_quantity,
            board_lot: risk.board_lot,
        }
    }
}

pub struct RiskFilter {
    limits: RiskLimits,
}

impl RiskFilter {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    /// Evaluate every ranked candidate, producing one decision each.
    /// Constraints bound new exposure, so only buy candidates are gated;
    /// sell/watch/hold candidates pass through.
    pub fn evaluate(
        &self,
        ranked: &[StructuredSignal],
        holdings: &HoldingsSnapshot,
    ) -> Vec<RiskDecision> {
        let mut decisions = Vec::with_capacity(ranked.len());
        let mut accepted_buys = 0usize;

        for signal in ranked {
            let rejection = if signal.direction == Direction::Buy {
                self.first_violation(signal, accepted_buys, holdings)
            } else {
                None
            };

            let accepted = rejection.is_none();
            if accepted && signal.direction == Direction::Buy {
                accepted_buys += 1;
            }
            if let Some(reason) = &rejection {
                debug!(
                    instrument = %signal.instrument_id,
                    reason = %reason,
                    "risk filter rejected {}",
                    signal.instrument_id
                );
            }
            decisions.push(RiskDecision {
                signal: signal.clone(),
                accepted,
                rejection,
            });
        }
        decisions
    }

    /// Fixed rule order; the first hit wins.
    fn first_violation(
        &self,
        signal: &StructuredSignal,
        accepted_buys: usize,
        holdings: &HoldingsSnapshot,
    ) -> Option<RiskRejection> {
        // Rule 1: one board lot must fit the per-position budget.
        let required = signal.closing_price * self.limits.board_lot as f64;
        let budget = self.limits.capital * self.limits.max_position_pct;
        if required > 0.0 && (budget <= 0.0 || required > budget) {
            return Some(RiskRejection::PositionNotional { required, budget });
        }

        // Rule 2: concentration across the watch-list.
        if accepted_buys >= self.limits.max_open_positions {
            return Some(RiskRejection::ConcentrationLimit {
                open: accepted_buys,
                limit: self.limits.max_open_positions,
            });
        }

        // Rule 3: existing-holdings cap.
        let held = holdings.quantity(&signal.instrument_id);
        if held >= self.limits.max_holding_quantity {
            return Some(RiskRejection::HoldingsCap {
                held,
                cap: self.limits.max_holding_quantity,
            });
        }

        None
    }
}

/// The accepted subset of a decision log, order preserved.
pub fn accepted<'a>(decisions: &'a [RiskDecision]) -> Vec<&'a StructuredSignal> {
    decisions
        .iter()
        .filter(|d| d.accepted)
        .map(|d| &d.signal)
        .collect()
}
