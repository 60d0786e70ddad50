//! Signal aggregation, ranking, and alert evaluation.

pub mod alerts;
pub mod engine;

pub use alerts::{attach_quantity, evaluate_alert, normalize_ratio, AlertThresholds, QuantityInputs};
pub use engine::{BatchOutcome, SignalEngine, SuccessPolicy};
