//! Job definitions and invocation records.

use chrono::{NaiveTime, Timelike, Weekday};
use std::path::PathBuf;
use std::time::Duration;

/// The built-in job families the scheduler knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Weekly news-driven stock picking.
    News,
    /// Trading-plan generation on session days.
    Daily,
    /// Intraday watch-list monitoring.
    Monitor,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::News => "news",
            JobKind::Daily => "daily",
            JobKind::Monitor => "monitor",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a job fires. Resolved into a `cron::Schedule` at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerRule {
    /// Once a week at a fixed local time.
    Weekly { weekday: Weekday, at: NaiveTime },
    /// Monday through Friday at a fixed local time; the market-session
    /// predicate decides whether a given weekday actually runs.
    SessionDaily { at: NaiveTime },
    /// Every `every_minutes` minutes within an intraday window,
    /// Monday through Friday.
    Interval {
        start: NaiveTime,
        end: NaiveTime,
        every_minutes: u32,
    },
}

impl TriggerRule {
    /// Render the rule as a six-field cron expression
    /// (`sec min hour dom month dow`).
    pub fn cron_expression(&self) -> String {
        match self {
            TriggerRule::Weekly { weekday, at } => {
                let dow = match weekday {
                    Weekday::Mon => "MON",
                    Weekday::Tue => "TUE",
                    Weekday::Wed => "WED",
                    Weekday::Thu => "THU",
                    Weekday::Fri => "FRI",
                    Weekday::Sat => "SAT",
                    Weekday::Sun => "SUN",
                };
                format!("0 {} {} * * {}", at.minute(), at.hour(), dow)
            }
            TriggerRule::SessionDaily { at } => {
                format!("0 {} {} * * MON-FRI", at.minute(), at.hour())
            }
            TriggerRule::Interval {
                start,
                end,
                every_minutes,
            } => format!(
                "0 */{} {}-{} * * MON-FRI",
                every_minutes,
                start.hour(),
                end.hour(),
            ),
        }
    }
}

/// Attempt budget for the external reasoning command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(3),
        }
    }
}

/// Immutable description of one scheduled job, resolved once at startup.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub job_id: String,
    pub kind: JobKind,
    pub trigger: TriggerRule,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Capability bundle the reasoning tool must have before being trusted
    /// for this job. `None` skips the preflight entirely.
    pub required_capability: Option<String>,
    /// Directory the external tool writes artifacts into.
    pub artifact_dir: PathBuf,
    /// Filename wildcard that identifies this job's artifacts,
    /// e.g. `trading_plan_*.md`.
    pub artifact_pattern: String,
    /// Whether fires are gated on the market-session predicate.
    pub requires_session: bool,
}

/// How a single invocation attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptStatus {
    Exited(i32),
    TimedOut,
    SpawnFailed(String),
}

impl AttemptStatus {
    pub fn is_clean_exit(&self) -> bool {
        matches!(self, AttemptStatus::Exited(0))
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptStatus::Exited(code) => write!(f, "exited with status {}", code),
            AttemptStatus::TimedOut => f.write_str("timed out"),
            AttemptStatus::SpawnFailed(reason) => write!(f, "spawn failed: {}", reason),
        }
    }
}

/// One attempt against the external reasoning command. Captured output is
/// diagnostic only; signals are never extracted from it.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub attempt: u32,
    pub status: AttemptStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// The full attempt history of one invocation, retained for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct InvocationReport {
    pub attempts: Vec<InvocationResult>,
}

impl InvocationReport {
    pub fn last(&self) -> Option<&InvocationResult> {
        self.attempts.last()
    }

    /// Process-level success: the final attempt exited 0. Necessary but not
    /// sufficient for job success; artifact detection still applies.
    pub fn process_succeeded(&self) -> bool {
        self.last().is_some_and(|a| a.status.is_clean_exit())
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }
}
