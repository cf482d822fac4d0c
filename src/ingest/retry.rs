//! Retry engine with failure classification and exponential backoff
//!
//! [`RetryEngine::execute`] runs one remote operation until it succeeds,
//! fails with a non-retryable kind, or exhausts its attempts. Between
//! attempts it sleeps for `min(max_delay, base_delay * 2^attempt)` plus a
//! bounded random jitter, unless the failure carried a server wait hint, in
//! which case the hint is used verbatim.

use super::config::IngestConfig;
use super::failure::{ErrorKind, FetchFailure, TerminalError};
use crate::shutdown::SharedShutdown;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Backoff parameters of a [`RetryEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per call, first try included
    pub max_attempts: u32,
    /// Base of the exponential backoff
    pub base_delay: Duration,
    /// Ceiling of the computed backoff
    pub max_delay: Duration,
    /// Upper bound of the uniform jitter
    pub max_jitter: Duration,
}

impl RetryPolicy {
    /// Policy described by a configuration.
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            max_jitter: config.max_jitter(),
        }
    }

    /// Exponential delay after the `attempt`-th failed attempt, without jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay before the next attempt.
    ///
    /// A server hint replaces the computed value entirely, including the cap.
    pub fn delay_for(&self, attempt: u32, failure: &FetchFailure) -> Duration {
        if let Some(hint) = failure.retry_after {
            return hint;
        }
        self.backoff_delay(attempt) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}

/// Per-call retry bookkeeping.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Attempts made so far
    pub attempt: u32,
    /// Attempts allowed
    pub max_attempts: u32,
    /// Base of the exponential backoff
    pub base_delay: Duration,
    /// Kind of the most recent failure
    pub last_error_kind: Option<ErrorKind>,
}

impl RetryContext {
    /// Fresh context for one call.
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 0,
            max_attempts: policy.max_attempts,
            base_delay: policy.base_delay,
            last_error_kind: None,
        }
    }

    /// Whether no attempts remain.
    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// Result of a single attempt, as reported to an [`AttemptObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// The attempt succeeded
    Succeeded,
    /// The attempt failed and another one is scheduled after `delay`
    Retrying {
        /// Failure kind
        kind: ErrorKind,
        /// Sleep before the next attempt
        delay: Duration,
        /// Whether `delay` came from a server hint
        server_hint: bool,
    },
    /// The attempt failed and the call is over
    GaveUp {
        /// Failure kind
        kind: ErrorKind,
    },
}

impl AttemptOutcome {
    /// Label used in metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded => "success",
            Self::Retrying { .. } => "retry",
            Self::GaveUp { .. } => "gave_up",
        }
    }
}

/// One observed attempt.
#[derive(Debug, Clone)]
pub struct AttemptEvent<'a> {
    /// Operation label (e.g., "fetch_detail")
    pub operation: &'static str,
    /// Target of the call (project id or issue key)
    pub resource: &'a str,
    /// 1-based attempt number
    pub attempt: u32,
    /// Attempts allowed
    pub max_attempts: u32,
    /// Duration of this attempt
    pub elapsed: Duration,
    /// What happened
    pub outcome: AttemptOutcome,
    /// Failure detail, if the attempt failed
    pub message: Option<&'a str>,
}

/// Caller-supplied hook invoked after every attempt.
pub trait AttemptObserver: Send + Sync {
    /// Called once per attempt, success or failure.
    fn on_attempt(&self, event: &AttemptEvent<'_>);
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AttemptObserver for NoopObserver {
    fn on_attempt(&self, _event: &AttemptEvent<'_>) {}
}

/// Observer that logs attempts through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AttemptObserver for TracingObserver {
    fn on_attempt(&self, event: &AttemptEvent<'_>) {
        match &event.outcome {
            AttemptOutcome::Succeeded if event.attempt > 1 => info!(
                operation = event.operation,
                resource = event.resource,
                attempt = event.attempt,
                max_attempts = event.max_attempts,
                "Retry attempt {}/{} succeeded",
                event.attempt,
                event.max_attempts
            ),
            AttemptOutcome::Succeeded => debug!(
                operation = event.operation,
                resource = event.resource,
                elapsed_ms = event.elapsed.as_millis() as u64,
                "Request succeeded"
            ),
            AttemptOutcome::Retrying {
                kind,
                delay,
                server_hint,
            } => warn!(
                operation = event.operation,
                resource = event.resource,
                error_kind = %kind,
                attempt = event.attempt,
                max_attempts = event.max_attempts,
                backoff_ms = delay.as_millis() as u64,
                server_hint = *server_hint,
                error = event.message.unwrap_or_default(),
                "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds",
                event.attempt,
                event.max_attempts,
                kind,
                delay.as_secs_f64()
            ),
            AttemptOutcome::GaveUp { kind } => warn!(
                operation = event.operation,
                resource = event.resource,
                error_kind = %kind,
                attempt = event.attempt,
                max_attempts = event.max_attempts,
                error = event.message.unwrap_or_default(),
                "Giving up after {} attempt(s)",
                event.attempt
            ),
        }
    }
}

/// Fan-out to several observers in order.
#[derive(Default, Clone)]
pub struct ObserverChain {
    observers: Vec<Arc<dyn AttemptObserver>>,
}

impl ObserverChain {
    /// Empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer
    pub fn with(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Number of chained observers
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl AttemptObserver for ObserverChain {
    fn on_attempt(&self, event: &AttemptEvent<'_>) {
        for observer in &self.observers {
            observer.on_attempt(event);
        }
    }
}

/// Runs remote operations with retry and backoff.
#[derive(Clone)]
pub struct RetryEngine {
    policy: RetryPolicy,
    observer: Arc<dyn AttemptObserver>,
    shutdown: Option<SharedShutdown>,
}

impl RetryEngine {
    /// Engine with the given policy and a logging observer.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            observer: Arc::new(TracingObserver),
            shutdown: None,
        }
    }

    /// Replace the attempt observer.
    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Make backoff sleeps end early on shutdown.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Backoff policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds or the retry lifecycle ends.
    ///
    /// `operation` is invoked once per attempt. Retryable failures are
    /// retried after a backoff; non-retryable failures end the call at once
    /// without consuming further attempts. A shutdown request observed
    /// before an attempt or during a backoff yields an
    /// [`ErrorKind::Interrupted`] terminal error.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &'static str,
        target: &str,
        mut op: F,
    ) -> Result<T, TerminalError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchFailure>>,
    {
        let mut ctx = RetryContext::new(&self.policy);

        loop {
            if self.shutdown_requested() {
                return Err(TerminalError::interrupted(operation, ctx.attempt));
            }

            let started = Instant::now();
            let result = op().await;
            ctx.attempt += 1;

            let failure = match result {
                Ok(value) => {
                    self.observe(operation, target, &ctx, started, AttemptOutcome::Succeeded, None);
                    return Ok(value);
                }
                Err(failure) => failure,
            };
            ctx.last_error_kind = Some(failure.kind);

            if !failure.kind.is_retryable() || ctx.is_exhausted() {
                self.observe(
                    operation,
                    target,
                    &ctx,
                    started,
                    AttemptOutcome::GaveUp { kind: failure.kind },
                    Some(&failure.message),
                );
                return Err(TerminalError::from_failure(operation, failure, ctx.attempt));
            }

            let delay = self.policy.delay_for(ctx.attempt, &failure);
            self.observe(
                operation,
                target,
                &ctx,
                started,
                AttemptOutcome::Retrying {
                    kind: failure.kind,
                    delay,
                    server_hint: failure.retry_after.is_some(),
                },
                Some(&failure.message),
            );

            if !self.backoff(delay).await {
                info!(
                    operation,
                    resource = target,
                    attempt = ctx.attempt,
                    "Shutdown requested during backoff, abandoning retries"
                );
                return Err(TerminalError::interrupted(operation, ctx.attempt));
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|s| s.is_shutdown_requested())
    }

    async fn backoff(&self, delay: Duration) -> bool {
        match &self.shutdown {
            Some(shutdown) => shutdown.sleep(delay).await,
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }

    fn observe(
        &self,
        operation: &'static str,
        target: &str,
        ctx: &RetryContext,
        started: Instant,
        outcome: AttemptOutcome,
        message: Option<&str>,
    ) {
        self.observer.on_attempt(&AttemptEvent {
            operation,
            resource: target,
            attempt: ctx.attempt,
            max_attempts: ctx.max_attempts,
            elapsed: started.elapsed(),
            outcome,
            message,
        });
    }
}
