use std::{error::Error as StdError, time::Duration};

use alloy::transports::{TransportErrorKind, layers::RetryBackoffLayer};
use tokio_retry::{
    RetryIf,
    strategy::{ExponentialBackoff, FixedInterval},
};
use tokio_util::sync::CancellationToken;

/// The default retry layer for RPC clients: 10 retries, 100ms initial backoff and a budget of
/// 330 compute units per second.
pub const DEFAULT_RETRY_LAYER: RetryBackoffLayer = RetryBackoffLayer::new(10, 100, 330);

/// Returns true if the transport error is caused by a refused connection.
///
/// This happens often on local setups where the node is restarted, and is always worth a retry.
pub fn is_connection_refused(err: &TransportErrorKind) -> bool {
    let TransportErrorKind::Custom(inner) = err else {
        return false;
    };

    let mut source: Option<&(dyn StdError + 'static)> = Some(inner.as_ref());
    while let Some(err) = source {
        if err.to_string().to_lowercase().contains("connection refused") {
            return true
        }
        source = err.source();
    }
    false
}

/// A bounded backoff policy for retrying side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// The (initial) interval between attempts.
    pub interval: Duration,
    /// The maximum number of retries after the first attempt.
    pub max_retries: usize,
    /// Whether the interval doubles on every attempt.
    pub exponential: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { interval: Duration::from_secs(12), max_retries: 5, exponential: false }
    }
}

impl BackoffPolicy {
    /// Creates a fixed-interval policy.
    pub const fn fixed(interval: Duration, max_retries: usize) -> Self {
        Self { interval, max_retries, exponential: false }
    }

    /// Creates an exponential policy, starting at `interval`.
    pub const fn exponential(interval: Duration, max_retries: usize) -> Self {
        Self { interval, max_retries, exponential: true }
    }

    /// Returns the sequence of delays between attempts.
    pub fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let millis = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX);
        if self.exponential {
            Box::new(
                ExponentialBackoff::from_millis(2)
                    .factor(millis.max(1) / 2)
                    .max_delay(self.interval.saturating_mul(32))
                    .take(self.max_retries),
            )
        } else {
            Box::new(FixedInterval::from_millis(millis).take(self.max_retries))
        }
    }
}

/// The error returned by [`retry_until_cancelled`].
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The cancellation token fired before the action succeeded.
    #[error("cancelled")]
    Cancelled,
    /// The action failed with a non-retryable error, or retries were exhausted.
    #[error(transparent)]
    Failed(E),
}

/// Retry the given action following the policy, as long as `condition` holds for the error
/// and the token is not cancelled.
///
/// Cancellation interrupts both the action and the sleeps between attempts.
pub async fn retry_until_cancelled<T, E, A, Fut, C>(
    policy: BackoffPolicy,
    token: &CancellationToken,
    action: A,
    condition: C,
) -> Result<T, RetryError<E>>
where
    A: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(&E) -> bool,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(RetryError::Cancelled),
        res = RetryIf::spawn(policy.delays(), action, condition) => res.map_err(RetryError::Failed),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[test]
    fn fixed_policy_is_bounded() {
        let policy = BackoffPolicy::fixed(Duration::from_millis(50), 3);
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(delays, vec![Duration::from_millis(50); 3]);
    }

    #[test]
    fn exponential_policy_grows() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(100), 4);
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(delays.len(), 4);
        assert!(delays.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn retries_until_exhausted() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let policy = BackoffPolicy::fixed(Duration::from_millis(1), 2);

        let res: Result<(), _> = retry_until_cancelled(
            policy,
            &token,
            || {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("boom")
                }
            },
            |_: &&str| true,
        )
        .await;

        assert!(matches!(res, Err(RetryError::Failed("boom"))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let token = CancellationToken::new();
        let policy = BackoffPolicy::fixed(Duration::from_secs(3_600), 10);

        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            child.cancel();
        });

        let start = std::time::Instant::now();
        let res: Result<(), _> = retry_until_cancelled(
            policy,
            &token,
            || async { Err::<(), _>("transient") },
            |_: &&str| true,
        )
        .await;

        assert!(matches!(res, Err(RetryError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn non_retryable_errors_return_immediately() {
        let token = CancellationToken::new();
        let policy = BackoffPolicy::fixed(Duration::from_secs(3_600), 10);

        let res: Result<(), _> =
            retry_until_cancelled(policy, &token, || async { Err::<(), _>("fatal") }, |e: &&str| {
                *e != "fatal"
            })
            .await;

        assert!(matches!(res, Err(RetryError::Failed("fatal"))));
    }
}
