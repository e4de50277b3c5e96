//! Bounded retry for one network operation.

use std::future::Future;

use rollcall_core::config::RetryPolicy;

use crate::error::{AgentError, TransportError};

/// Run `op` up to `policy.max_attempts` times, sleeping `retry_delay`
/// between failed attempts (never after the last). Exhaustion is
/// [`AgentError::ExhaustedRetries`]; no call is made after it.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T, AgentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last = String::new();
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(operation, attempt, max = attempts, error = %e, "attempt failed");
                last = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(policy.retry_delay).await;
                }
            }
        }
    }
    Err(AgentError::ExhaustedRetries {
        operation,
        attempts,
        last,
    })
}
