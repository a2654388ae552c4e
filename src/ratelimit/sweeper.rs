//! Periodic removal of expired rate limit records.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::clock::Clock;
use super::limiter::RateLimiter;
use crate::error::{GatewayError, Result};

/// Handle to a background task that sweeps a [`RateLimiter`] on an interval.
///
/// Call [`Sweeper::shutdown`] to stop the task and wait for it. Dropping the
/// handle aborts the task.
pub struct Sweeper {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Start sweeping `limiter` every `interval`.
    ///
    /// The first sweep happens one full interval after spawning. A zero
    /// interval is rejected.
    pub fn spawn<C: Clock + 'static>(limiter: Arc<RateLimiter<C>>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(GatewayError::Config(
                "sweep interval must be greater than zero".to_string(),
            ));
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = limiter.clock().now_millis();
                        let removed = limiter.sweep_expired(now);
                        if removed > 0 {
                            info!(removed = removed, remaining = limiter.len(), "Swept expired rate limit records");
                        } else {
                            debug!("Sweep found no expired rate limit records");
                        }
                    }
                    _ = &mut shutdown_rx => {
                        debug!("Rate limit sweeper stopping");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Stop the sweeper and wait for its task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
