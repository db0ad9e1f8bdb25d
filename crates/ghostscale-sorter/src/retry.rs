//! Bounded local retry of expander calls.
//!
//! Every provision/bind/unbind is attempted up to `attempts` times and the
//! first success wins. Once attempts are exhausted the last error is
//! returned and the caller escalates to a global requeue.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::expander::ExpanderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Upper bound on a single call; a call that exceeds it counts as a
    /// failed attempt.
    pub call_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            call_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl ExpanderError {
    /// Rejections are final; everything else is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ExpanderError::Rejected(_))
    }
}

/// Run `call` until it succeeds or the policy's attempts are used up.
pub async fn retry<T, F, Fut>(
    op: &'static str,
    policy: &RetryPolicy,
    mut call: F,
) -> Result<T, ExpanderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExpanderError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let outcome = match policy.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call())
                .await
                .unwrap_or(Err(ExpanderError::Timeout(limit))),
            None => call().await,
        };

        match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!(op, attempt, "expander call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt >= attempts || !e.is_retryable() => {
                warn!(op, attempt, error = %e, "expander call failed, giving up");
                return Err(e);
            }
            Err(e) => {
                debug!(op, attempt, error = %e, "expander call failed, retrying");
            }
        }
    }
}
