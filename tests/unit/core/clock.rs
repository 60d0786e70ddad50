//! Unit tests for the job clock: registration, coalescing, session gating

use async_trait::async_trait;
use chrono::{Local, NaiveTime};
use signalyst::config::Config;
use signalyst::core::{FireDisposition, JobClock, JobHandler, JobRun};
use signalyst::jobs::{JobContext, JobError};
use signalyst::models::{JobKind, JobSpec, RetryPolicy, TriggerRule};
use signalyst::notify::LogNotifier;
use std::sync::Arc;
use std::time::Duration;

struct SleepHandler {
    hold: Duration,
}

#[async_trait]
impl JobHandler for SleepHandler {
    async fn run(&self, _ctx: &JobContext) -> Result<JobRun, JobError> {
        tokio::time::sleep(self.hold).await;
        Ok(JobRun::Completed)
    }
}

struct FailingHandler;

#[async_trait]
impl JobHandler for FailingHandler {
    async fn run(&self, _ctx: &JobContext) -> Result<JobRun, JobError> {
        Err(JobError::MissingPlan)
    }
}

fn test_spec(job_id: &str, requires_session: bool) -> JobSpec {
    JobSpec {
        job_id: job_id.to_string(),
        kind: JobKind::Monitor,
        trigger: TriggerRule::Interval {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(13, 30, 0).unwrap(),
            every_minutes: 30,
        },
        timeout: Duration::from_secs(60),
        retry: RetryPolicy::default(),
        required_capability: None,
        artifact_dir: ".".into(),
        artifact_pattern: "*.md".into(),
        requires_session,
    }
}

fn test_ctx(config: Config) -> JobContext {
    JobContext::new(Arc::new(config), Arc::new(LogNotifier)).unwrap()
}

#[tokio::test]
async fn test_overlapping_fire_is_skipped_with_overlap_reason() {
    let mut clock = JobClock::new();
    clock
        .register(
            test_spec("monitor", false),
            Arc::new(SleepHandler {
                hold: Duration::from_millis(300),
            }),
        )
        .unwrap();
    let ctx = test_ctx(Config::default());

    let (first, second) = tokio::join!(clock.fire("monitor", &ctx), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        clock.fire("monitor", &ctx).await
    });

    assert_eq!(first, FireDisposition::Completed);
    assert_eq!(second, FireDisposition::SkippedOverlap);

    let counters = clock.counters().snapshot();
    assert_eq!(counters.fires, 2);
    assert_eq!(counters.completed, 1);
    assert_eq!(counters.skipped_overlap, 1);
}

#[tokio::test]
async fn test_fire_runs_again_after_prior_run_finishes() {
    let mut clock = JobClock::new();
    clock
        .register(
            test_spec("monitor", false),
            Arc::new(SleepHandler {
                hold: Duration::from_millis(10),
            }),
        )
        .unwrap();
    let ctx = test_ctx(Config::default());

    assert_eq!(clock.fire("monitor", &ctx).await, FireDisposition::Completed);
    assert_eq!(clock.fire("monitor", &ctx).await, FireDisposition::Completed);
    assert_eq!(clock.counters().snapshot().completed, 2);
}

#[tokio::test]
async fn test_session_gated_job_skips_on_closed_day() {
    let mut config = Config::default();
    // Today is always a holiday for this test's calendar.
    config
        .calendar
        .holidays
        .push(Local::now().date_naive().format("%Y-%m-%d").to_string());

    let mut clock = JobClock::new();
    clock
        .register(
            test_spec("daily", true),
            Arc::new(SleepHandler {
                hold: Duration::from_millis(1),
            }),
        )
        .unwrap();
    let ctx = test_ctx(config);

    assert_eq!(
        clock.fire("daily", &ctx).await,
        FireDisposition::SkippedMarketClosed
    );
    assert_eq!(clock.counters().snapshot().skipped_market_closed, 1);
}

#[tokio::test]
async fn test_failed_handler_reports_failure() {
    let mut clock = JobClock::new();
    clock
        .register(test_spec("monitor", false), Arc::new(FailingHandler))
        .unwrap();
    let ctx = test_ctx(Config::default());

    let disposition = clock.fire("monitor", &ctx).await;
    assert!(disposition.is_failure());
    assert_eq!(clock.counters().snapshot().failed, 1);
}

#[tokio::test]
async fn test_unknown_job_fire_fails() {
    let clock = JobClock::new();
    let ctx = test_ctx(Config::default());
    assert!(clock.fire("nope", &ctx).await.is_failure());
}

#[test]
fn test_register_rejects_unschedulable_interval() {
    let mut clock = JobClock::new();
    let mut spec = test_spec("monitor", false);
    spec.trigger = TriggerRule::Interval {
        start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end: NaiveTime::from_hms_opt(13, 30, 0).unwrap(),
        every_minutes: 0,
    };
    assert!(clock.register(spec, Arc::new(FailingHandler)).is_err());
}
