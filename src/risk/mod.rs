//! Risk policy: holdings snapshot and the candidate filter.

pub mod filter;
pub mod holdings;

pub use filter::{accepted, RiskFilter, RiskLimits};
pub use holdings::{Holding, HoldingsSnapshot};
