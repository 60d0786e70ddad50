//! Shared data models spanning the scheduler layers.

pub mod job;
pub mod signal;

pub use job::{
    AttemptStatus, InvocationReport, InvocationResult, JobKind, JobSpec, RetryPolicy, TriggerRule,
};
pub use signal::{
    Direction, InstrumentFailure, RiskDecision, RiskRejection, StructuredSignal, TradeAlert,
    SCORE_MAX, SCORE_MIN,
};
