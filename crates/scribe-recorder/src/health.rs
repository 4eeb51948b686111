//! Health gate — circuit-breaker admission control for store operations.
//!
//! Tracks consecutive connectivity failures and applies capped exponential
//! backoff before admitting new operations. Every admitted operation runs on
//! the blocking pool raced against a fixed timeout; losing the race counts
//! as a connectivity failure and the operation is abandoned unobserved.
//!
//! Data errors (constraint violations, serialization) do not degrade health:
//! they say nothing about availability, only about one statement.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use scribe_settings::HealthSettings;
use tracing::{debug, error, warn};

/// Failure counter plus the timestamp of the last connectivity failure.
#[derive(Debug, Default)]
struct FailureState {
    failures: u32,
    last_failure: Option<Instant>,
}

/// Health-aware admission gate wrapping every store operation.
#[derive(Debug)]
pub struct HealthGate {
    state: Mutex<FailureState>,
    base_backoff: Duration,
    max_backoff: Duration,
    op_timeout: Duration,
}

impl HealthGate {
    /// Create a gate from health settings and the per-operation timeout.
    pub fn new(settings: &HealthSettings, op_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(FailureState::default()),
            base_backoff: Duration::from_millis(settings.base_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            op_timeout,
        }
    }

    /// Whether new operations are currently admitted.
    ///
    /// Healthy while the failure counter is zero; otherwise healthy again
    /// once the capped exponential backoff since the last failure elapses.
    /// Recovery is probabilistic-by-time — the next caller's attempt is the
    /// retry, there is no active probe loop.
    pub fn is_healthy(&self) -> bool {
        let state = self.state.lock();
        if state.failures == 0 {
            return true;
        }
        match state.last_failure {
            Some(at) => at.elapsed() >= self.backoff_for(state.failures),
            None => true,
        }
    }

    /// Run a store operation through the gate.
    ///
    /// Returns `None` when the gate is closed, the operation times out, or
    /// it fails — reads get "no data", writes are simply never admitted.
    /// Failures are routed to the log sink and never propagate.
    pub async fn run<T, F>(&self, label: &'static str, op: F) -> Option<T>
    where
        F: FnOnce() -> scribe_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        if !self.is_healthy() {
            debug!(label, "store unhealthy, skipping operation");
            return None;
        }

        let task = tokio::task::spawn_blocking(op);
        match tokio::time::timeout(self.op_timeout, task).await {
            Err(_) => {
                // Timed out: the blocking task keeps running in the
                // background but its outcome is never observed.
                self.record_failure();
                let timeout_ms = u64::try_from(self.op_timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(label, timeout_ms, "store operation timed out, abandoning");
                None
            }
            Ok(Err(join_err)) => {
                error!(label, error = %join_err, "store operation panicked");
                None
            }
            Ok(Ok(Ok(value))) => {
                self.record_success();
                Some(value)
            }
            Ok(Ok(Err(err))) => {
                if err.is_connectivity() {
                    self.record_failure();
                    warn!(label, error = %err, "store connectivity failure");
                } else {
                    warn!(label, error = %err, "store data error, dropping operation");
                }
                None
            }
        }
    }

    /// Record a successful operation: the counter resets immediately.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.failures = 0;
        state.last_failure = None;
    }

    /// Record a connectivity failure.
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.failures = state.failures.saturating_add(1);
        state.last_failure = Some(Instant::now());
    }

    /// Backoff for the given consecutive failure count:
    /// `min(BASE * 2^(failures-1), MAX)`.
    fn backoff_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        let backoff = self.base_backoff.saturating_mul(1_u32 << exponent);
        backoff.min(self.max_backoff)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
