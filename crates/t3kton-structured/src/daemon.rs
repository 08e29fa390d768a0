//! Host loop: keeps running passes for one Structure until cancelled.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{Directive, ReconcileError, Reconciler, StructuredConfig};

/// Exponential retry delay for failed passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to use now; doubles the next one up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Delay before the pass after one that returned `directive`.
pub fn delay_for(directive: Directive, resync_interval: Duration) -> Duration {
    match directive {
        Directive::RequeueNow => Duration::ZERO,
        Directive::RequeueAfter(delay) => delay,
        Directive::Stop => resync_interval,
    }
}

/// Runs passes for `name` until `cancel` fires.
///
/// A converged Structure is re-checked every resync interval, so changes
/// made directly in Contractor are noticed without an external trigger.
pub async fn run(reconciler: &Reconciler, name: &str, config: &StructuredConfig, cancel: &CancellationToken) {
    let mut backoff = Backoff::new(config.error_backoff(), config.max_error_backoff());
    info!(structure = name, "Starting reconcile loop");

    loop {
        let delay = match reconciler.reconcile(name, cancel).await {
            Ok(directive) => {
                backoff.reset();
                if directive.is_stop() {
                    info!(structure = name, resync_in = ?config.resync_interval(), "Structure reconciled");
                } else {
                    debug!(structure = name, directive = %directive, "Reconcile pass complete");
                }
                delay_for(directive, config.resync_interval())
            }
            Err(ReconcileError::Cancelled) => break,
            Err(e) => {
                let delay = backoff.next_delay();
                if e.is_retryable() {
                    warn!(structure = name, error = %e, retry_in = ?delay, "Reconcile pass failed");
                } else {
                    error!(structure = name, error = %e, retry_in = ?delay, "Reconcile pass failed");
                }
                delay
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    info!(structure = name, "Reconcile loop stopped");
}
