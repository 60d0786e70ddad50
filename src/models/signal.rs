//! Structured trade signals extracted from report artifacts.

use serde::{Deserialize, Serialize};

/// Valid score range for a parsed signal. Values outside this range are a
/// schema violation, not a clamp.
pub const SCORE_MIN: f64 = -10.0;
pub const SCORE_MAX: f64 = 10.0;

/// Trade direction suggested by an analysis report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
    Watch,
    Hold,
}

impl Direction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(Direction::Buy),
            "sell" => Some(Direction::Sell),
            "watch" => Some(Direction::Watch),
            "hold" => Some(Direction::Hold),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
            Direction::Watch => "watch",
            Direction::Hold => "hold",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One instrument's analysis, extracted from a single artifact.
/// Immutable after parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredSignal {
    pub instrument_id: String,
    pub display_name: String,
    pub score: f64,
    pub direction: Direction,
    pub bullish_factors: Vec<String>,
    pub bearish_factors: Vec<String>,
    pub support_levels: Vec<f64>,
    pub resistance_levels: Vec<f64>,
    pub closing_price: f64,
    pub change_pct: f64,
}

/// A per-instrument failure collected during batch analysis. Failures never
/// abort the batch; they ride alongside the candidate list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentFailure {
    pub instrument_id: String,
    pub reason: String,
}

/// Why the risk filter turned a candidate away. Rejection is an expected
/// filtering outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RiskRejection {
    /// One board lot at the closing price exceeds the per-position budget.
    PositionNotional { required: f64, budget: f64 },
    /// The watch-list already carries the maximum number of accepted buys.
    ConcentrationLimit { open: usize, limit: usize },
    /// The instrument is already held at or above the holdings cap.
    HoldingsCap { held: u64, cap: u64 },
}

impl std::fmt::Display for RiskRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskRejection::PositionNotional { required, budget } => write!(
                f,
                "position notional {:.0} exceeds budget {:.0}",
                required, budget
            ),
            RiskRejection::ConcentrationLimit { open, limit } => {
                write!(f, "open buy candidates {} at limit {}", open, limit)
            }
            RiskRejection::HoldingsCap { held, cap } => {
                write!(f, "holding {} shares at cap {}", held, cap)
            }
        }
    }
}

/// The audit record for one candidate. Never mutated after the filter runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskDecision {
    pub signal: StructuredSignal,
    pub accepted: bool,
    pub rejection: Option<RiskRejection>,
}

/// An actionable buy/sell alert derived from an accepted intraday candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeAlert {
    pub instrument_id: String,
    pub display_name: String,
    pub side: Direction,
    pub price: f64,
    pub reason: String,
    pub suggested_quantity: u64,
    pub quantity_note: String,
}
