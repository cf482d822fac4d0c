//! Integration tests for retry and backoff behavior
//!
//! Run on paused tokio time, so backoff sleeps complete instantly while
//! elapsed time is still measured exactly.

use jira_ingest::ingest::{
    AttemptEvent, AttemptObserver, AttemptOutcome, ErrorKind, FetchFailure, RetryEngine,
    RetryPolicy,
};
use jira_ingest::shutdown::ShutdownCoordinator;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(1),
        max_jitter: Duration::ZERO,
    }
}

/// Observer keeping `(attempt, outcome)` of every event
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<(u32, AttemptOutcome)>>,
}

impl AttemptObserver for Recorder {
    fn on_attempt(&self, event: &AttemptEvent<'_>) {
        self.events
            .lock()
            .unwrap()
            .push((event.attempt, event.outcome.clone()));
    }
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_attempts() {
    let engine = RetryEngine::new(policy(3));
    let attempts = AtomicU32::new(0);
    let start = Instant::now();

    let result: Result<(), _> = engine
        .execute("fetch_detail", "PROJ-1", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchFailure::from_status(503, None, "unavailable")) }
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Server);
    assert_eq!(err.attempts, 3);
    assert_eq!(err.status, Some(503));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    // Backoffs of base * 2^1 and base * 2^2
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(600), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(700), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_transient_failures() {
    let engine = RetryEngine::new(policy(5));
    let attempts = AtomicU32::new(0);

    let result = engine
        .execute("fetch_page", "PROJ", || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 3 {
                    Err(FetchFailure::new(ErrorKind::Network, "connection reset"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_failure_stops_immediately() {
    let engine = RetryEngine::new(policy(5));
    let attempts = AtomicU32::new(0);
    let start = Instant::now();

    let result: Result<(), _> = engine
        .execute("fetch_detail", "PROJ-404", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchFailure::from_status(404, None, "does not exist")) }
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.attempts, 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_server_hint_overrides_backoff_cap() {
    let engine = RetryEngine::new(policy(2));
    let attempts = AtomicU32::new(0);
    let start = Instant::now();

    let result = engine
        .execute("fetch_page", "PROJ", || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt == 1 {
                    Err(FetchFailure::from_status(
                        429,
                        Some(Duration::from_secs(5)),
                        "slow down",
                    ))
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert!(result.is_ok());
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(5), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(5100), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_observer_sees_every_attempt() {
    let recorder = Arc::new(Recorder::default());
    let engine = RetryEngine::new(policy(3)).with_observer(recorder.clone());

    let _: Result<(), _> = engine
        .execute("fetch_detail", "PROJ-1", || async {
            Err(FetchFailure::new(ErrorKind::Network, "timed out"))
        })
        .await;

    let events = recorder.events.lock().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(
        events.iter().map(|(attempt, _)| *attempt).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(matches!(
        events[0].1,
        AttemptOutcome::Retrying {
            kind: ErrorKind::Network,
            server_hint: false,
            ..
        }
    ));
    assert_eq!(
        events[2].1,
        AttemptOutcome::GaveUp {
            kind: ErrorKind::Network
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_observer_sees_success() {
    let recorder = Arc::new(Recorder::default());
    let engine = RetryEngine::new(policy(3)).with_observer(recorder.clone());

    engine
        .execute("fetch_page", "PROJ", || async { Ok::<_, FetchFailure>(()) })
        .await
        .unwrap();

    let events = recorder.events.lock().unwrap();
    assert_eq!(events.as_slice(), &[(1, AttemptOutcome::Succeeded)]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_backoff_interrupts() {
    let shutdown = ShutdownCoordinator::shared();
    let mut long_policy = policy(5);
    long_policy.base_delay = Duration::from_secs(30);
    long_policy.max_delay = Duration::from_secs(300);
    let engine = RetryEngine::new(long_policy).with_shutdown(shutdown.clone());

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.request_shutdown();
    });

    let attempts = AtomicU32::new(0);
    let start = Instant::now();
    let result: Result<(), _> = engine
        .execute("fetch_page", "PROJ", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchFailure::from_status(500, None, "boom")) }
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.is_interrupted());
    assert_eq!(err.attempts, 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(start.elapsed() < Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_first_attempt() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();
    let engine = RetryEngine::new(policy(3)).with_shutdown(shutdown);
    let attempts = AtomicU32::new(0);

    let result: Result<(), _> = engine
        .execute("fetch_page", "PROJ", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

    assert_eq!(result.unwrap_err().kind, ErrorKind::Interrupted);
    assert_eq!(attempts.load(Ordering::SeqCst), 0);
}
