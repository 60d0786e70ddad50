//! Orchestration core: single-instance guard, market calendar, job clock.

pub mod calendar;
pub mod clock;
pub mod guard;

pub use calendar::MarketCalendar;
pub use clock::{ClockCounters, FireDisposition, JobClock, JobHandler, JobRun};
pub use guard::{GuardError, ProcessGuard};
