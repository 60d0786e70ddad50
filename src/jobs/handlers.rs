//! The built-in job handlers: weekly news picking, daily plan generation,
//! and intraday watch-list monitoring.
//!
//! Every handler follows the same spine: preflight the required capability,
//! invoke the reasoning command with the job's timeout and retry budget,
//! judge success from exit status plus fresh artifacts, then hand the
//! artifact downstream. Terminal failures send one failure report to the
//! notifier before propagating.

use crate::ai::validator::wildcard_match;
use crate::ai::{judge, Artifact, ArtifactProbe, RunVerdict};
use crate::config::{parse_time, parse_weekday, Config, ConfigError, TradingConfig};
use crate::core::{JobHandler, JobRun};
use crate::jobs::{run_id, JobContext, JobError};
use crate::models::{
    Direction, JobKind, JobSpec, RetryPolicy, StructuredSignal, TriggerRule,
};
use crate::notify::Notifier;
use crate::report::{parse_plan_watchlist, parse_signal_artifact};
use crate::reporting::write_candidate_outputs;
use crate::risk::{HoldingsSnapshot, RiskFilter, RiskLimits};
use crate::signals::{
    attach_quantity, evaluate_alert, normalize_ratio, AlertThresholds, QuantityInputs,
    SignalEngine,
};
use chrono::{Local, NaiveTime};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Score assigned to instruments listed in the plan's buy tables.
const BUY_PLAN_SCORE: f64 = 7.0;
/// Score assigned to instruments listed in the plan's watch tables.
const WATCHLIST_SCORE: f64 = 4.0;

/// Build the three registered jobs from config. Trigger times are parsed
/// here so malformed schedules fail at startup.
pub fn build_jobs(config: &Config) -> Result<Vec<(JobSpec, Arc<dyn JobHandler>)>, ConfigError> {
    let sched = &config.schedule;
    let retry = RetryPolicy {
        max_attempts: config.ai.retry.max_attempts,
        backoff: Duration::from_secs(config.ai.retry.backoff_seconds),
    };
    let capability = |kind: &str| config.ai.skills.job_map.get(kind).cloned();

    let news_spec = JobSpec {
        job_id: "news".to_string(),
        kind: JobKind::News,
        trigger: TriggerRule::Weekly {
            weekday: parse_weekday(&sched.news_day)?,
            at: parse_time(&sched.news_time)?,
        },
        timeout: Duration::from_secs(config.ai.timeout_minutes.news * 60),
        retry,
        required_capability: capability("news"),
        artifact_dir: config.paths.strategy_dir.clone(),
        artifact_pattern: "news_strategy_*.md".to_string(),
        requires_session: false,
    };

    let daily_spec = JobSpec {
        job_id: "daily".to_string(),
        kind: JobKind::Daily,
        trigger: TriggerRule::SessionDaily {
            at: parse_time(&sched.daily_time)?,
        },
        timeout: Duration::from_secs(config.ai.timeout_minutes.daily * 60),
        retry,
        required_capability: capability("daily"),
        artifact_dir: config.paths.outputs_dir.clone(),
        artifact_pattern: "trading_plan_*.md".to_string(),
        requires_session: true,
    };

    let window = (
        parse_time(&sched.monitor_start)?,
        parse_time(&sched.monitor_end)?,
    );
    let monitor_spec = JobSpec {
        job_id: "monitor".to_string(),
        kind: JobKind::Monitor,
        trigger: TriggerRule::Interval {
            start: window.0,
            end: window.1,
            every_minutes: sched.monitor_interval_minutes,
        },
        timeout: Duration::from_secs(config.ai.timeout_minutes.monitor * 60),
        retry,
        required_capability: capability("monitor"),
        artifact_dir: config.paths.intraday_dir.clone(),
        artifact_pattern: "stock_analysis_*.md".to_string(),
        requires_session: true,
    };

    Ok(vec![
        (
            news_spec.clone(),
            Arc::new(NewsJob { spec: news_spec }) as Arc<dyn JobHandler>,
        ),
        (
            daily_spec.clone(),
            Arc::new(DailyJob { spec: daily_spec }) as Arc<dyn JobHandler>,
        ),
        (
            monitor_spec.clone(),
            Arc::new(MonitorJob {
                spec: monitor_spec,
                window,
            }) as Arc<dyn JobHandler>,
        ),
    ])
}

/// Preflight, invoke, and validate one reporting task. Success means a
/// clean final exit and a fresh artifact; each failure mode keeps its own
/// terminal state.
async fn run_analysis(
    ctx: &JobContext,
    job_id: &str,
    capability: Option<&str>,
    prompt: &str,
    timeout: Duration,
    retry: &RetryPolicy,
    artifact_dir: &Path,
    artifact_pattern: &str,
) -> Result<Artifact, JobError> {
    let preflight = ctx.preflight.prepare(job_id, capability, prompt)?;
    let probe = ArtifactProbe::begin(artifact_dir, artifact_pattern);
    let report = ctx
        .invoker
        .run_task(job_id, &ctx.provider, &preflight.prompt, timeout, retry)
        .await;

    match judge(&report, &probe) {
        RunVerdict::Success(artifact) => {
            info!(
                job = %job_id,
                artifact = %artifact.path.display(),
                attempts = report.attempt_count(),
                "artifact produced: {}",
                artifact.path.display()
            );
            Ok(artifact)
        }
        RunVerdict::FailedNoArtifact => Err(JobError::FailedNoArtifact {
            pattern: artifact_pattern.to_string(),
        }),
        RunVerdict::FailedProcess => Err(JobError::FailedProcess {
            attempts: report.attempt_count(),
            last: report
                .last()
                .map(|a| a.status.to_string())
                .unwrap_or_else(|| "no attempts recorded".to_string()),
        }),
    }
}

/// One failure report per terminal failure, where a notifier is configured.
async fn notify_failure(notifier: &dyn Notifier, job_id: &str, run: &str, error: &JobError) {
    let subject = format!("[Scheduler] job {job_id} failed");
    let body = format!("run_id: {run}\njob: {job_id}\nerror: {error}\n");
    if let Err(e) = notifier.send_report(&subject, &body, &[]).await {
        warn!(job = %job_id, error = %e, "failed to send failure report");
    }
}

/// Weekly news-driven stock picking.
pub struct NewsJob {
    pub spec: JobSpec,
}

fn news_prompt(strategy_dir: &Path) -> String {
    format!(
        "Run the news-driven stock picking analysis. Search major domestic and \
         international news from the past week, assess the market impact, and \
         produce a complete stock-picking strategy report saved under {} as \
         news_strategy_<date>.md. Execute directly without asking any questions.",
        strategy_dir.display()
    )
}

#[async_trait::async_trait]
impl JobHandler for NewsJob {
    async fn run(&self, ctx: &JobContext) -> Result<JobRun, JobError> {
        let started = Instant::now();
        let run = run_id(&self.spec.job_id, Local::now());
        info!(job = %self.spec.job_id, run_id = %run, event = "start", "news picking started");

        let prompt = news_prompt(&self.spec.artifact_dir);
        let outcome = run_analysis(
            ctx,
            &self.spec.job_id,
            self.spec.required_capability.as_deref(),
            &prompt,
            self.spec.timeout,
            &self.spec.retry,
            &self.spec.artifact_dir,
            &self.spec.artifact_pattern,
        )
        .await;

        let result = match outcome {
            Ok(artifact) => self.deliver(ctx, artifact).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(artifact_path) => {
                info!(
                    job = %self.spec.job_id,
                    run_id = %run,
                    event = "completed",
                    duration_sec = started.elapsed().as_secs_f64(),
                    artifact = %artifact_path.display(),
                    "news picking completed"
                );
                Ok(JobRun::Completed)
            }
            Err(e) => {
                notify_failure(ctx.notifier.as_ref(), &self.spec.job_id, &run, &e).await;
                Err(e)
            }
        }
    }
}

impl NewsJob {
    async fn deliver(&self, ctx: &JobContext, artifact: Artifact) -> Result<PathBuf, JobError> {
        let content = std::fs::read_to_string(&artifact.path)?;
        let subject = format!(
            "[Weekly report] news stock picking {}",
            Local::now().date_naive()
        );
        if let Err(e) = ctx
            .notifier
            .send_report(&subject, &content, &[artifact.path.clone()])
            .await
        {
            warn!(job = %self.spec.job_id, error = %e, "report mail failed");
        }
        Ok(artifact.path)
    }
}

/// Daily trading-plan generation on session days.
pub struct DailyJob {
    pub spec: JobSpec,
}

fn daily_prompt(trading: &TradingConfig, outputs_dir: &Path) -> String {
    let holdings = if trading.holdings.is_empty() {
        "none".to_string()
    } else {
        trading.holdings.join(", ")
    };
    let sectors = if trading.focus_sectors.is_empty() {
        "any".to_string()
    } else {
        trading.focus_sectors.join(", ")
    };
    format!(
        "Run the daily market analysis. My preferences:\n\
         - risk level: {}\n\
         - available capital: {:.0}\n\
         - trading period: {}\n\
         - current holdings: {}\n\
         - focus sectors: {}\n\n\
         Produce today's trading plan under {} as trading_plan_<YYYYMMDD>.md \
         with Buy Plan, Strong Buy Candidates, and Watch List tables. Execute \
         directly without asking any questions.",
        trading.risk_level,
        trading.capital,
        trading.trading_period,
        holdings,
        sectors,
        outputs_dir.display(),
    )
}

/// Plan tables carry no prices, so plan-derived signals use fixed scores
/// and a zero closing price.
fn plan_candidates(buy: &[String], watch: &[String]) -> Vec<StructuredSignal> {
    let make = |id: &String, direction: Direction, score: f64, source: &str| StructuredSignal {
        instrument_id: id.clone(),
        display_name: String::new(),
        score,
        direction,
        bullish_factors: vec![source.to_string()],
        bearish_factors: Vec::new(),
        support_levels: Vec::new(),
        resistance_levels: Vec::new(),
        closing_price: 0.0,
        change_pct: 0.0,
    };
    buy.iter()
        .map(|id| make(id, Direction::Buy, BUY_PLAN_SCORE, "listed in the daily buy plan"))
        .chain(
            watch
                .iter()
                .map(|id| make(id, Direction::Watch, WATCHLIST_SCORE, "listed in the watch list")),
        )
        .collect()
}

#[async_trait::async_trait]
impl JobHandler for DailyJob {
    async fn run(&self, ctx: &JobContext) -> Result<JobRun, JobError> {
        let started = Instant::now();
        let now = Local::now();
        let run = run_id(&self.spec.job_id, now);
        info!(
            job = %self.spec.job_id,
            run_id = %run,
            event = "start",
            risk_level = %ctx.config.trading.risk_level,
            capital = ctx.config.trading.capital,
            "daily analysis started"
        );

        let prompt = daily_prompt(&ctx.config.trading, &self.spec.artifact_dir);
        let outcome = run_analysis(
            ctx,
            &self.spec.job_id,
            self.spec.required_capability.as_deref(),
            &prompt,
            self.spec.timeout,
            &self.spec.retry,
            &self.spec.artifact_dir,
            &self.spec.artifact_pattern,
        )
        .await;

        let result = match outcome {
            Ok(artifact) => self.process_plan(ctx, &run, artifact).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(artifact_path) => {
                info!(
                    job = %self.spec.job_id,
                    run_id = %run,
                    event = "completed",
                    duration_sec = started.elapsed().as_secs_f64(),
                    artifact = %artifact_path.display(),
                    "daily analysis completed"
                );
                Ok(JobRun::Completed)
            }
            Err(e) => {
                notify_failure(ctx.notifier.as_ref(), &self.spec.job_id, &run, &e).await;
                Err(e)
            }
        }
    }
}

impl DailyJob {
    async fn process_plan(
        &self,
        ctx: &JobContext,
        run: &str,
        artifact: Artifact,
    ) -> Result<PathBuf, JobError> {
        let content = std::fs::read_to_string(&artifact.path)?;
        let plan = parse_plan_watchlist(&content);
        info!(
            job = %self.spec.job_id,
            buy = plan.buy_candidates.len(),
            watch = plan.watchlist.len(),
            "plan recommends {} buy / {} watch",
            plan.buy_candidates.len(),
            plan.watchlist.len()
        );

        let ranked = SignalEngine::rank(plan_candidates(&plan.buy_candidates, &plan.watchlist));
        let holdings = HoldingsSnapshot::load(&ctx.config.paths.holdings_file);
        let filter = RiskFilter::new(RiskLimits::from_config(
            &ctx.config.risk,
            ctx.config.trading.capital,
        ));
        let decisions = filter.evaluate(&ranked, &holdings);

        let mut attachments = vec![artifact.path.clone()];
        attachments.extend(write_candidate_outputs(
            &ctx.config.paths.candidates_dir,
            &self.spec.job_id,
            run,
            Local::now(),
            &decisions,
        )?);

        let subject = format!("[Daily report] trading plan {}", Local::now().date_naive());
        if let Err(e) = ctx
            .notifier
            .send_report(&subject, &content, &attachments)
            .await
        {
            warn!(job = %self.spec.job_id, error = %e, "report mail failed");
        }
        Ok(artifact.path)
    }
}

/// Intraday watch-list monitoring within the session window.
pub struct MonitorJob {
    pub spec: JobSpec,
    pub window: (NaiveTime, NaiveTime),
}

fn monitor_prompt(instrument_id: &str, target: &Path) -> String {
    format!(
        "Run an intraday technical analysis for instrument {instrument_id}.\n\
         Write the report to: {}\n\n\
         Report format requirements:\n\
         1. Markdown file.\n\
         2. Open with a field block fenced by `---` lines.\n\
         3. The field block must include:\n\
            - instrument_id\n\
            - display_name\n\
            - direction (buy/sell/watch/hold)\n\
            - score (number between -10 and 10)\n\
            - bullish_factors (sequence)\n\
            - bearish_factors (sequence)\n\
            - closing_price (number)\n\
            - change_pct (number)\n\
         Execute directly and write the file without asking further questions.",
        target.display()
    )
}

#[async_trait::async_trait]
impl JobHandler for MonitorJob {
    async fn run(&self, ctx: &JobContext) -> Result<JobRun, JobError> {
        let started = Instant::now();
        let now = Local::now();
        let run = run_id(&self.spec.job_id, now);

        let time_of_day = now.time();
        if time_of_day < self.window.0 || time_of_day > self.window.1 {
            return Ok(JobRun::Skipped {
                reason: "outside_monitor_window",
            });
        }

        let Some(plan_path) = latest_plan(&ctx.config.paths.outputs_dir) else {
            let e = JobError::MissingPlan;
            notify_failure(ctx.notifier.as_ref(), &self.spec.job_id, &run, &e).await;
            return Err(e);
        };
        let plan_text = match std::fs::read_to_string(&plan_path) {
            Ok(text) => text,
            Err(e) => {
                let e = JobError::Io(e);
                notify_failure(ctx.notifier.as_ref(), &self.spec.job_id, &run, &e).await;
                return Err(e);
            }
        };
        let watch = parse_plan_watchlist(&plan_text).all();
        if watch.is_empty() {
            return Ok(JobRun::Skipped {
                reason: "empty_watchlist",
            });
        }

        info!(
            job = %self.spec.job_id,
            run_id = %run,
            event = "start",
            watch_count = watch.len(),
            plan = %plan_path.display(),
            "monitoring {} instruments",
            watch.len()
        );

        let result = self.analyze_batch(ctx, &run, &watch).await;
        match result {
            Ok((analyzed, failed, alerts)) => {
                info!(
                    job = %self.spec.job_id,
                    run_id = %run,
                    event = "completed",
                    duration_sec = started.elapsed().as_secs_f64(),
                    analyzed_count = analyzed,
                    failed_count = failed,
                    alert_count = alerts,
                    "monitor run completed"
                );
                Ok(JobRun::Completed)
            }
            Err(e) => {
                notify_failure(ctx.notifier.as_ref(), &self.spec.job_id, &run, &e).await;
                Err(e)
            }
        }
    }
}

impl MonitorJob {
    /// One invocation per instrument; per-instrument failures are collected
    /// and never abort the batch.
    async fn analyze_batch(
        &self,
        ctx: &JobContext,
        run: &str,
        watch: &[String],
    ) -> Result<(usize, usize, usize), JobError> {
        let capability = self.spec.required_capability.as_deref();
        // Strict-mode capability failures abort before any invocation
        // attempt is recorded.
        ctx.preflight.prepare(&self.spec.job_id, capability, "")?;

        std::fs::create_dir_all(&self.spec.artifact_dir)?;
        let date_tag = Local::now().format("%Y%m%d").to_string();

        let mut outcomes = Vec::with_capacity(watch.len());
        for instrument_id in SignalEngine::dedup_requested(watch) {
            let pattern = format!("stock_analysis_{instrument_id}_*.md");
            let target = self
                .spec
                .artifact_dir
                .join(format!("stock_analysis_{instrument_id}_{date_tag}.md"));
            let prompt = monitor_prompt(&instrument_id, &target);

            let analysis = run_analysis(
                ctx,
                &self.spec.job_id,
                capability,
                &prompt,
                self.spec.timeout,
                &self.spec.retry,
                &self.spec.artifact_dir,
                &pattern,
            )
            .await;

            let outcome = match analysis {
                Ok(artifact) => match parse_signal_artifact(&artifact.path) {
                    Ok(parsed) => Ok(parsed.signal),
                    Err(e) => Err(e.to_string()),
                },
                Err(e) => Err(e.to_string()),
            };
            if let Err(reason) = &outcome {
                warn!(
                    job = %self.spec.job_id,
                    instrument = %instrument_id,
                    reason = %reason,
                    "instrument analysis failed, batch continues"
                );
            }
            outcomes.push((instrument_id, outcome));
        }

        let batch = SignalEngine::aggregate(watch, outcomes);
        let policy = ctx.config.signals.success_policy;
        if !batch.meets(policy) {
            return Err(JobError::BatchBelowPolicy {
                analyzed: batch.analyzed_count(),
                failed: batch.failed_count(),
            });
        }

        let holdings = HoldingsSnapshot::load(&ctx.config.paths.holdings_file);
        let filter = RiskFilter::new(RiskLimits::from_config(
            &ctx.config.risk,
            ctx.config.trading.capital,
        ));
        let decisions = filter.evaluate(&batch.candidates, &holdings);
        write_candidate_outputs(
            &ctx.config.paths.candidates_dir,
            &self.spec.job_id,
            run,
            Local::now(),
            &decisions,
        )?;

        let thresholds = AlertThresholds {
            min_bullish_factors: ctx.config.signals.min_bullish_factors,
            min_bearish_factors: ctx.config.signals.min_bearish_factors,
        };
        let quantities = QuantityInputs {
            capital: ctx.config.trading.capital,
            buy_ratio: normalize_ratio(ctx.config.trading.monitor_buy_ratio, 0.2),
            sell_ratio: normalize_ratio(ctx.config.trading.monitor_sell_ratio, 0.3),
        };
        let alerts: Vec<_> = decisions
            .iter()
            .filter(|d| d.accepted)
            .filter_map(|d| evaluate_alert(&d.signal, &thresholds))
            .map(|alert| attach_quantity(alert, &quantities, &holdings))
            .collect();

        if !alerts.is_empty() {
            if let Err(e) = ctx.notifier.send_alerts(&alerts).await {
                warn!(job = %self.spec.job_id, error = %e, "alert mail failed");
            }
        }

        Ok((batch.analyzed_count(), batch.failed_count(), alerts.len()))
    }
}

/// Today's plan when present, otherwise the newest plan by filename.
fn latest_plan(outputs_dir: &Path) -> Option<PathBuf> {
    let today = Local::now().format("%Y%m%d").to_string();
    let exact = outputs_dir.join(format!("trading_plan_{today}.md"));
    if exact.exists() {
        return Some(exact);
    }

    let entries = std::fs::read_dir(outputs_dir).ok()?;
    entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| wildcard_match("trading_plan_*.md", n))
        })
        .max()
}
