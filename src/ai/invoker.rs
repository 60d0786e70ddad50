//! External-command execution with timeout and retry.
//!
//! Each attempt is bounded by the job's timeout and forcibly terminated on
//! expiry. Non-zero exits, timeouts, and spawn failures all retry up to the
//! attempt budget with a fixed backoff; the loop stops at the first clean
//! exit. Every attempt's outcome is retained for diagnostics; captured
//! output is never parsed for signals.

use crate::ai::provider::{InvocationPlan, ProviderSpec};
use crate::models::{AttemptStatus, InvocationReport, InvocationResult, RetryPolicy};
use backon::{ConstantBuilder, Retryable};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("attempt timed out after {secs}s")]
    TimedOut { secs: u64 },
    #[error("process exited with status {code}")]
    NonZeroExit { code: i32 },
    #[error("failed to spawn reasoning command: {0}")]
    Spawn(String),
}

/// Runs invocation plans inside a fixed working directory.
pub struct Invoker {
    workdir: PathBuf,
}

impl Invoker {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Execute one prompt under the given retry policy. The returned report
    /// carries the full attempt history; `process_succeeded()` on it is the
    /// process-level half of the success contract.
    pub async fn run_task(
        &self,
        job_id: &str,
        provider: &ProviderSpec,
        prompt: &str,
        timeout: Duration,
        retry: &RetryPolicy,
    ) -> InvocationReport {
        let max_attempts = retry.max_attempts.max(1);
        let history: Mutex<Vec<InvocationResult>> = Mutex::new(Vec::new());

        let attempt_once = || async {
            let attempt = lock(&history).len() as u32 + 1;
            info!(
                job = %job_id,
                provider = %provider.id(),
                attempt,
                max_attempts,
                timeout_secs = timeout.as_secs(),
                "invoking reasoning command (attempt {}/{})",
                attempt,
                max_attempts
            );

            let result = self.single_attempt(provider.plan(prompt), attempt, timeout).await;
            let status = result.status.clone();
            let stderr_head: String = result.stderr.chars().take(500).collect();
            lock(&history).push(result);

            match status {
                AttemptStatus::Exited(0) => {
                    info!(job = %job_id, attempt, "reasoning command exited cleanly");
                    Ok(())
                }
                AttemptStatus::Exited(code) => {
                    error!(
                        job = %job_id,
                        attempt,
                        code,
                        stderr = %stderr_head,
                        "reasoning command failed with status {}",
                        code
                    );
                    Err(InvokeError::NonZeroExit { code })
                }
                AttemptStatus::TimedOut => {
                    error!(
                        job = %job_id,
                        attempt,
                        timeout_secs = timeout.as_secs(),
                        "reasoning command timed out"
                    );
                    Err(InvokeError::TimedOut {
                        secs: timeout.as_secs(),
                    })
                }
                AttemptStatus::SpawnFailed(reason) => {
                    error!(job = %job_id, attempt, %reason, "could not spawn reasoning command");
                    Err(InvokeError::Spawn(reason))
                }
            }
        };

        let _ = attempt_once
            .retry(
                ConstantBuilder::default()
                    .with_delay(retry.backoff)
                    .with_max_times(max_attempts.saturating_sub(1) as usize),
            )
            .await;

        InvocationReport {
            attempts: history.into_inner().unwrap_or_else(|e| e.into_inner()),
        }
    }

    async fn single_attempt(
        &self,
        plan: InvocationPlan,
        attempt: u32,
        timeout: Duration,
    ) -> InvocationResult {
        let started = Instant::now();

        let mut cmd = Command::new(&plan.program);
        cmd.args(&plan.args)
            .current_dir(&self.workdir)
            .stdin(if plan.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return InvocationResult {
                    attempt,
                    status: AttemptStatus::SpawnFailed(e.to_string()),
                    stdout: String::new(),
                    stderr: String::new(),
                    elapsed: started.elapsed(),
                }
            }
        };

        if let Some(body) = &plan.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                // Write errors surface through the exit status.
                let _ = stdin.write_all(body.as_bytes()).await;
            }
        }

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => InvocationResult {
                attempt,
                status: AttemptStatus::Exited(output.status.code().unwrap_or(-1)),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                elapsed: started.elapsed(),
            },
            Ok(Err(e)) => InvocationResult {
                attempt,
                status: AttemptStatus::SpawnFailed(format!("wait failed: {e}")),
                stdout: String::new(),
                stderr: String::new(),
                elapsed: started.elapsed(),
            },
            // Dropping the in-flight wait kills the child (kill_on_drop):
            // the timeout cancels exactly this attempt, not the job.
            Err(_) => InvocationResult {
                attempt,
                status: AttemptStatus::TimedOut,
                stdout: String::new(),
                stderr: String::new(),
                elapsed: started.elapsed(),
            },
        }
    }
}

fn lock<T>(mutex: &Mutex<Vec<T>>) -> std::sync::MutexGuard<'_, Vec<T>> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
