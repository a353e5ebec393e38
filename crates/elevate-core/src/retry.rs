//! Network Helper
//!
//! Bounded retry with exponential backoff around any async operation that
//! returns the wizard error taxonomy. Only transport failures are retried
//! (see `WizardError::is_retryable`); validation and domain errors come
//! back on the first attempt. The sleep future is injected so the same
//! helper runs under tokio natively and a JS timer on wasm.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Retry/timeout parameters for one outbound call
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt
    pub base_delay: Duration,
    /// Per-attempt deadline, enforced by the transport
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(12),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (0-based): base × 2^attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Run `op`, retrying per `policy` with `sleep` between attempts.
pub async fn run_with_retry<T, Op, Fut, Sl, SlFut>(
    policy: RetryPolicy,
    mut op: Op,
    mut sleep: Sl,
) -> Result<T>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    Sl: FnMut(Duration) -> SlFut,
    SlFut: Future<Output = ()>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after transient failure"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WizardError;
    use std::cell::Cell;

    async fn no_sleep(_d: Duration) {}

    #[tokio::test]
    async fn test_success_needs_one_attempt() {
        let calls = Cell::new(0u32);
        let result = run_with_retry(
            RetryPolicy::default(),
            || {
                calls.set(calls.get() + 1);
                async { Ok::<_, WizardError>(7) }
            },
            no_sleep,
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_timeouts_are_retried_then_fail() {
        let calls = Cell::new(0u32);
        let result: Result<()> = run_with_retry(
            RetryPolicy::default(),
            || {
                calls.set(calls.get() + 1);
                async { Err(WizardError::Timeout) }
            },
            no_sleep,
        )
        .await;

        assert!(matches!(result, Err(WizardError::Timeout)));
        // initial attempt + 2 retries
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let calls = Cell::new(0u32);
        let result: Result<()> = run_with_retry(
            RetryPolicy::default(),
            || {
                calls.set(calls.get() + 1);
                async { Err(WizardError::Status(400)) }
            },
            no_sleep,
        )
        .await;

        assert!(matches!(result, Err(WizardError::Status(400))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let calls = Cell::new(0u32);
        let result = run_with_retry(
            RetryPolicy::default(),
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err(WizardError::Status(503))
                    } else {
                        Ok("ok")
                    }
                }
            },
            no_sleep,
        )
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }
}
