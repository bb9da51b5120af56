//! Polling until the cluster converges
//!
//! [`spawn_wait`] evaluates a predicate on a background task at a fixed
//! interval until it reports `true`, the optional timeout elapses, or the
//! cancellation token fires. Evaluations never overlap: the interval timer
//! starts only after the previous evaluation has finished. The deadline also
//! interrupts an evaluation in flight. The outcome is handed back once through
//! a oneshot channel.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default delay between predicate evaluations
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Configuration for a convergence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Delay between the end of one evaluation and the start of the next
    pub interval: Duration,
    /// Give up after this long; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The predicate reported `true`
    Converged { attempts: u32 },
    /// The timeout elapsed first
    TimedOut { attempts: u32 },
    /// The cancellation token fired first
    Cancelled { attempts: u32 },
}

impl WaitOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    pub fn attempts(&self) -> u32 {
        match *self {
            Self::Converged { attempts }
            | Self::TimedOut { attempts }
            | Self::Cancelled { attempts } => attempts,
        }
    }
}

/// Handle to a running wait
pub struct WaitHandle {
    done: oneshot::Receiver<WaitOutcome>,
}

impl WaitHandle {
    /// Block until the wait finishes
    ///
    /// If the background task dies without reporting, the wait counts as
    /// cancelled.
    pub async fn wait(self) -> WaitOutcome {
        match self.done.await {
            Ok(outcome) => outcome,
            Err(_) => WaitOutcome::Cancelled { attempts: 0 },
        }
    }
}

/// Start polling `until` on a background task
///
/// Errors from `until` are passed to `on_error` and do not end the wait.
pub fn spawn_wait<F, Fut, E>(
    mut until: F,
    mut on_error: E,
    options: WaitOptions,
    cancel: CancellationToken,
) -> WaitHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
    E: FnMut(&Error) + Send + 'static,
{
    let (tx, done) = oneshot::channel();
    let deadline = options.timeout.map(|t| Instant::now() + t);

    tokio::spawn(async move {
        let mut attempts = 0u32;
        let outcome = loop {
            if cancel.is_cancelled() {
                break WaitOutcome::Cancelled { attempts };
            }

            attempts += 1;
            let finished = tokio::select! {
                result = until() => result,
                _ = cancel.cancelled() => break WaitOutcome::Cancelled { attempts },
                _ = sleep_until_deadline(deadline) => break WaitOutcome::TimedOut { attempts },
            };
            match finished {
                Ok(true) => break WaitOutcome::Converged { attempts },
                Ok(false) => debug!(attempts, "Not converged yet"),
                Err(e) => on_error(&e),
            }

            let next = Instant::now() + options.interval;
            if let Some(deadline) = deadline {
                if next > deadline {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => {}
                        _ = cancel.cancelled() => break WaitOutcome::Cancelled { attempts },
                    }
                    break WaitOutcome::TimedOut { attempts };
                }
            }

            tokio::select! {
                _ = tokio::time::sleep_until(next) => {}
                _ = cancel.cancelled() => break WaitOutcome::Cancelled { attempts },
            }
        };

        let _ = tx.send(outcome);
    });

    WaitHandle { done }
}

/// Sleep until the deadline, or forever without one
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
