//! Cron-based job clock.
//!
//! Holds the resolved `JobSpec`s and drives their handlers from wall-clock
//! time. Executions are sequential by construction: the run loop fires due
//! jobs one at a time, and a fire that lands while the same job is still
//! executing is coalesced (skipped with a logged `overlap` reason), never
//! queued. Missed ticks are dropped on recompute for the same reason,
//! bounding load on the external reasoning tool.

use crate::config::ConfigError;
use crate::jobs::{JobContext, JobError};
use crate::models::JobSpec;
use chrono::{DateTime, Local};
use cron::Schedule;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Handler-level result: a job may decide on its own to skip a fire
/// (outside the monitor window, nothing to monitor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRun {
    Completed,
    Skipped { reason: &'static str },
}

#[async_trait::async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, ctx: &JobContext) -> Result<JobRun, JobError>;
}

/// How one fire of one job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireDisposition {
    Completed,
    Failed,
    SkippedOverlap,
    SkippedMarketClosed,
    Skipped { reason: String },
}

impl FireDisposition {
    /// Skips are not failures; the test-job CLI mode keys off this.
    pub fn is_failure(&self) -> bool {
        matches!(self, FireDisposition::Failed)
    }
}

/// Monotonic diagnostic counters. Atomics so the clock can be parallelized
/// later without touching call sites.
#[derive(Debug, Default)]
pub struct ClockCounters {
    pub fires: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub skipped_overlap: AtomicU64,
    pub skipped_market_closed: AtomicU64,
}

impl ClockCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            fires: self.fires.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped_overlap: self.skipped_overlap.load(Ordering::Relaxed),
            skipped_market_closed: self.skipped_market_closed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub fires: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped_overlap: u64,
    pub skipped_market_closed: u64,
}

struct RegisteredJob {
    spec: JobSpec,
    schedule: Schedule,
    handler: Arc<dyn JobHandler>,
    running: AtomicBool,
}

/// Explicitly constructed orchestrator: registered once at startup, passed
/// by reference into whatever drives it. No global registry.
pub struct JobClock {
    jobs: Vec<RegisteredJob>,
    counters: Arc<ClockCounters>,
}

impl JobClock {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            counters: Arc::new(ClockCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<ClockCounters> {
        Arc::clone(&self.counters)
    }

    /// Resolve the spec's trigger into a cron schedule and register it.
    pub fn register(
        &mut self,
        spec: JobSpec,
        handler: Arc<dyn JobHandler>,
    ) -> Result<(), ConfigError> {
        let expr = spec.trigger.cron_expression();
        let schedule = Schedule::from_str(&expr)
            .map_err(|e| ConfigError::InvalidSchedule(format!("{expr}: {e}")))?;
        info!(
            job = %spec.job_id,
            cron = %expr,
            "registered job {} (cron: {})",
            spec.job_id,
            expr
        );
        self.jobs.push(RegisteredJob {
            spec,
            schedule,
            handler,
            running: AtomicBool::new(false),
        });
        Ok(())
    }

    pub fn job_ids(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.spec.job_id.as_str()).collect()
    }

    /// Next upcoming tick per job.
    pub fn upcoming(&self) -> Vec<(String, Option<DateTime<Local>>)> {
        self.jobs
            .iter()
            .map(|j| {
                (
                    j.spec.job_id.clone(),
                    j.schedule.upcoming(Local).next(),
                )
            })
            .collect()
    }

    /// Fire one job now. At most one concurrent execution per job_id: an
    /// overlapping fire is skipped, not queued.
    pub async fn fire(&self, job_id: &str, ctx: &JobContext) -> FireDisposition {
        let Some(job) = self.jobs.iter().find(|j| j.spec.job_id == job_id) else {
            error!(job = %job_id, "fire requested for unknown job {}", job_id);
            return FireDisposition::Failed;
        };
        self.counters.fires.fetch_add(1, Ordering::Relaxed);

        if job.spec.requires_session {
            let today = Local::now().date_naive();
            if !ctx.calendar.is_session_day(today) {
                self.counters
                    .skipped_market_closed
                    .fetch_add(1, Ordering::Relaxed);
                info!(
                    job = %job_id,
                    date = %today,
                    reason = "market_closed",
                    "skipping {}: {} is not a session day",
                    job_id,
                    today
                );
                return FireDisposition::SkippedMarketClosed;
            }
        }

        if job
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.counters
                .skipped_overlap
                .fetch_add(1, Ordering::Relaxed);
            warn!(
                job = %job_id,
                reason = "overlap",
                "skipping {}: prior run still executing",
                job_id
            );
            return FireDisposition::SkippedOverlap;
        }

        let outcome = job.handler.run(ctx).await;
        job.running.store(false, Ordering::SeqCst);

        match outcome {
            Ok(JobRun::Completed) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                FireDisposition::Completed
            }
            Ok(JobRun::Skipped { reason }) => {
                info!(job = %job_id, reason, "job {} skipped its fire", job_id);
                FireDisposition::Skipped {
                    reason: reason.to_string(),
                }
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(job = %job_id, error = %e, "job {} failed: {}", job_id, e);
                FireDisposition::Failed
            }
        }
    }

    /// Drive the clock until `shutdown` flips to true. The only suspension
    /// point inside a fire is the external-process invocation.
    pub async fn run(&self, ctx: &JobContext, mut shutdown: watch::Receiver<bool>) {
        info!(jobs = self.jobs.len(), "job clock started");
        for (job_id, next) in self.upcoming() {
            match next {
                Some(when) => info!(job = %job_id, next = %when, "next fire for {}: {}", job_id, when),
                None => warn!(job = %job_id, "job {} has no upcoming fire", job_id),
            }
        }

        loop {
            let ticks: Vec<(usize, DateTime<Local>)> = self
                .jobs
                .iter()
                .enumerate()
                .filter_map(|(idx, j)| j.schedule.upcoming(Local).next().map(|t| (idx, t)))
                .collect();

            let Some(&(_, earliest)) = ticks.iter().min_by_key(|(_, t)| *t) else {
                // Nothing schedulable; idle until shutdown.
                if shutdown.changed().await.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            };

            let wait = (earliest - Local::now()).to_std().unwrap_or_default();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            // Fire every job whose tick has come due, one at a time. A tick
            // for a job that is somehow still running coalesces in fire().
            let now = Local::now();
            for (idx, when) in &ticks {
                if *when <= now {
                    let job_id = self.jobs[*idx].spec.job_id.clone();
                    let _ = self.fire(&job_id, ctx).await;
                }
            }
        }
        info!("job clock stopped");
    }
}

impl Default for JobClock {
    fn default() -> Self {
        Self::new()
    }
}
