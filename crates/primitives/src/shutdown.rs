use std::time::Duration;

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// The time given to running tasks to wind down after a shutdown signal is received.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// A process-wide shutdown signal, backed by a [`CancellationToken`].
///
/// Every long-running component receives a child token, so that all suspension points can be
/// interrupted at once.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Creates a new, non-triggered shutdown signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a child token that is cancelled when the signal triggers.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Triggers the shutdown.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Returns true if the shutdown has been triggered.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Waits until the shutdown is triggered.
    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }
}

/// Run the given future until it completes, or until a termination signal is received.
///
/// On `SIGINT` or `SIGTERM` the shutdown signal is triggered, and the future is given
/// [`GRACEFUL_SHUTDOWN_TIMEOUT`] to complete. `on_shutdown` runs in every case.
pub async fn run_until_shutdown<F, E, S>(
    fut: F,
    shutdown_signal: ShutdownSignal,
    on_shutdown: S,
) -> Result<(), E>
where
    F: Future<Output = Result<(), E>>,
    S: FnOnce(),
{
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => Some(sigterm),
        Err(err) => {
            warn!(?err, "Failed to install SIGTERM handler");
            None
        }
    };
    let sigterm_recv = async {
        match sigterm.as_mut() {
            Some(s) => s.recv().await,
            None => std::future::pending().await,
        }
    };

    tokio::pin!(fut);

    let interrupted = tokio::select! {
        res = &mut fut => Ok(res),
        _ = tokio::signal::ctrl_c() => Err("SIGINT"),
        _ = sigterm_recv => Err("SIGTERM"),
        _ = shutdown_signal.triggered() => Err("internal trigger"),
    };

    let result = match interrupted {
        Ok(res) => res,
        Err(reason) => {
            info!(reason, "🛑 Shutting down");
            wind_down(fut, &shutdown_signal).await
        }
    };

    on_shutdown();
    result
}

async fn wind_down<F, E>(
    fut: std::pin::Pin<&mut F>,
    shutdown_signal: &ShutdownSignal,
) -> Result<(), E>
where
    F: Future<Output = Result<(), E>>,
{
    shutdown_signal.trigger();
    match tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, fut).await {
        Ok(res) => res,
        Err(_) => {
            error!(timeout = ?GRACEFUL_SHUTDOWN_TIMEOUT, "Tasks did not complete in time, exiting");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;

    #[test]
    fn child_tokens_follow_the_signal() {
        let signal = ShutdownSignal::new();
        let token = signal.token();
        assert!(!token.is_cancelled());
        signal.trigger();
        assert!(token.is_cancelled());
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn internal_trigger_winds_down_the_future() {
        let signal = ShutdownSignal::new();
        let token = signal.token();
        let called = Arc::new(AtomicBool::new(false));

        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });

        let fut = async move {
            token.cancelled().await;
            Ok::<(), String>(())
        };

        let on_shutdown_called = Arc::clone(&called);
        let res = run_until_shutdown(fut, signal, move || {
            on_shutdown_called.store(true, Ordering::SeqCst);
        })
        .await;

        assert!(res.is_ok());
        assert!(called.load(Ordering::SeqCst));
    }
}
