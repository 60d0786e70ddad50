//! Scheduler CLI.
//!
//! `run` starts the persistent clock under the single-instance lease;
//! `test-job` fires one job synchronously and reports pass/fail;
//! `test-email` probes the SMTP transport.

use clap::{Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use signalyst::config::Config;
use signalyst::core::{JobClock, ProcessGuard};
use signalyst::jobs::{build_jobs, JobContext};
use signalyst::logging;
use signalyst::notify::{EmailNotifier, LogNotifier, Notifier};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "scheduler", about = "AI-driven trading report scheduler")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum JobName {
    News,
    Daily,
    Monitor,
}

impl JobName {
    fn as_str(&self) -> &'static str {
        match self {
            JobName::News => "news",
            JobName::Daily => "daily",
            JobName::Monitor => "monitor",
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Start the persistent clock.
    Run,
    /// Fire one job now and report pass/fail.
    TestJob {
        #[arg(value_enum)]
        job: JobName,
    },
    /// Probe the SMTP transport and send a test mail.
    TestEmail,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Arc::new(Config::load(&cli.config)?);

    match cli.command {
        Command::TestEmail => test_email(&config),
        Command::TestJob { job } => test_job(config, job.as_str()).await,
        Command::Run => run(config).await,
    }
}

fn notifier_for(config: &Config) -> Arc<dyn Notifier> {
    if config.email.is_configured() {
        Arc::new(EmailNotifier::new(config.email.clone()))
    } else {
        warn!("email not configured, falling back to log-only notifications");
        Arc::new(LogNotifier)
    }
}

fn build_clock(config: &Arc<Config>) -> Result<JobClock, Box<dyn std::error::Error>> {
    let mut clock = JobClock::new();
    for (spec, handler) in build_jobs(config)? {
        clock.register(spec, handler)?;
    }
    Ok(clock)
}

fn test_email(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if !config.email.is_configured() {
        println!("Email is not configured; set [email] in the config file.");
        std::process::exit(1);
    }
    let notifier = EmailNotifier::new(config.email.clone());
    match notifier.test_connection() {
        Ok(()) => {
            println!("SMTP connection test passed.");
            Ok(())
        }
        Err(e) => {
            println!("SMTP connection test failed: {e}");
            std::process::exit(1);
        }
    }
}

async fn test_job(config: Arc<Config>, job_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let notifier = notifier_for(&config);
    let ctx = JobContext::new(Arc::clone(&config), notifier)?;
    let clock = build_clock(&config)?;

    info!(job = %job_id, "test-firing job {}", job_id);
    let disposition = clock.fire(job_id, &ctx).await;
    if disposition.is_failure() {
        println!("job {job_id}: FAIL");
        std::process::exit(1);
    }
    println!("job {job_id}: PASS ({disposition:?})");
    Ok(())
}

async fn run(config: Arc<Config>) -> Result<(), Box<dyn std::error::Error>> {
    let guard = ProcessGuard::acquire(&config.paths.lease_file)?;

    let notifier = notifier_for(&config);
    let ctx = JobContext::new(Arc::clone(&config), notifier)?;
    let clock = build_clock(&config)?;

    info!(pid = std::process::id(), "scheduler started");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    clock.run(&ctx, shutdown_rx).await;

    let counters = clock.counters().snapshot();
    info!(
        fires = counters.fires,
        completed = counters.completed,
        failed = counters.failed,
        skipped_overlap = counters.skipped_overlap,
        skipped_market_closed = counters.skipped_market_closed,
        "scheduler stopped"
    );
    guard.release()?;
    Ok(())
}
