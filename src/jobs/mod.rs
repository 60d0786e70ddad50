//! Scheduled jobs: shared context, error taxonomy, and the built-in
//! news/daily/monitor handlers.

pub mod context;
pub mod handlers;

pub use context::JobContext;
pub use handlers::{build_jobs, DailyJob, MonitorJob, NewsJob};

use crate::ai::PreflightError;
use crate::report::ParseError;
use crate::reporting::ReportingError;
use chrono::{DateTime, Local};
use thiserror::Error;

/// Terminal job failures. Retryable invocation errors never surface here;
/// they are consumed by the attempt budget inside the invoker.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Preflight(#[from] PreflightError),
    #[error("reasoning process failed after {attempts} attempt(s): {last}")]
    FailedProcess { attempts: u32, last: String },
    #[error("process exited cleanly but no new artifact matched {pattern}")]
    FailedNoArtifact { pattern: String },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("no trading plan available for the watch-list")]
    MissingPlan,
    #[error("batch below success policy: {analyzed} analyzed, {failed} failed")]
    BatchBelowPolicy { analyzed: usize, failed: usize },
    #[error(transparent)]
    Reporting(#[from] ReportingError),
    #[error("job io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run identifier carried through every event of one execution.
pub fn run_id(job: &str, at: DateTime<Local>) -> String {
    format!("{job}_{}", at.format("%Y%m%d%H%M%S"))
}
