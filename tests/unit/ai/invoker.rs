//! Unit tests for external-command execution: timeout, retry, delivery

use signalyst::ai::{Invoker, ProviderSpec};
use signalyst::config::DeliveryMode;
use signalyst::models::{AttemptStatus, RetryPolicy};
use std::time::Duration;
use tempfile::tempdir;

fn shell_provider(template: &str) -> ProviderSpec {
    ProviderSpec::Custom {
        template: template.to_string(),
        delivery: DeliveryMode::Argument,
        shell: true,
    }
}

fn retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn test_clean_exit_records_single_attempt() {
    let dir = tempdir().unwrap();
    let invoker = Invoker::new(dir.path());

    let report = invoker
        .run_task(
            "news",
            &shell_provider("echo ok"),
            "unused",
            Duration::from_secs(5),
            &retry(3),
        )
        .await;

    assert_eq!(report.attempt_count(), 1);
    assert!(report.process_succeeded());
    let last = report.last().unwrap();
    assert_eq!(last.status, AttemptStatus::Exited(0));
    assert!(last.stdout.contains("ok"));
}

#[tokio::test]
async fn test_nonzero_exit_retries_to_attempt_budget() {
    let dir = tempdir().unwrap();
    let invoker = Invoker::new(dir.path());

    let report = invoker
        .run_task(
            "news",
            &shell_provider("exit 3"),
            "unused",
            Duration::from_secs(5),
            &retry(3),
        )
        .await;

    assert_eq!(report.attempt_count(), 3);
    assert!(!report.process_succeeded());
    for (i, attempt) in report.attempts.iter().enumerate() {
        assert_eq!(attempt.attempt, i as u32 + 1);
        assert_eq!(attempt.status, AttemptStatus::Exited(3));
    }
}

#[tokio::test]
async fn test_retries_stop_at_first_clean_exit() {
    let dir = tempdir().unwrap();
    let invoker = Invoker::new(dir.path());

    // Fails once, then succeeds: the third budgeted attempt never runs.
    let report = invoker
        .run_task(
            "news",
            &shell_provider("if [ -f marker ]; then exit 0; else touch marker; exit 1; fi"),
            "unused",
            Duration::from_secs(5),
            &retry(3),
        )
        .await;

    assert_eq!(report.attempt_count(), 2);
    assert!(report.process_succeeded());
    assert_eq!(report.attempts[0].status, AttemptStatus::Exited(1));
    assert_eq!(report.attempts[1].status, AttemptStatus::Exited(0));
}

#[tokio::test]
async fn test_timeout_terminates_attempt_and_retries() {
    let dir = tempdir().unwrap();
    let invoker = Invoker::new(dir.path());

    let started = std::time::Instant::now();
    let report = invoker
        .run_task(
            "monitor",
            &shell_provider("sleep 30"),
            "unused",
            Duration::from_millis(200),
            &retry(2),
        )
        .await;

    assert_eq!(report.attempt_count(), 2);
    assert!(!report.process_succeeded());
    assert!(report
        .attempts
        .iter()
        .all(|a| a.status == AttemptStatus::TimedOut));
    // Both attempts were cut off, not waited out.
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_piped_delivery_feeds_prompt_via_stdin() {
    let dir = tempdir().unwrap();
    let invoker = Invoker::new(dir.path());

    let provider = ProviderSpec::Custom {
        template: "cat".to_string(),
        delivery: DeliveryMode::Piped,
        shell: false,
    };
    let report = invoker
        .run_task(
            "news",
            &provider,
            "prompt over stdin",
            Duration::from_secs(5),
            &retry(1),
        )
        .await;

    assert!(report.process_succeeded());
    assert_eq!(report.last().unwrap().stdout, "prompt over stdin");
}

#[tokio::test]
async fn test_spawn_failure_is_recorded_and_retried() {
    let dir = tempdir().unwrap();
    let invoker = Invoker::new(dir.path());

    let provider = ProviderSpec::Custom {
        template: "definitely-not-a-command-zzz".to_string(),
        delivery: DeliveryMode::Argument,
        shell: false,
    };
    let report = invoker
        .run_task("news", &provider, "unused", Duration::from_secs(5), &retry(2))
        .await;

    assert_eq!(report.attempt_count(), 2);
    assert!(matches!(
        report.last().unwrap().status,
        AttemptStatus::SpawnFailed(_)
    ));
}
