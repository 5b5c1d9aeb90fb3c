use std::future::Future;

use steep_core::ServiceId;
use tracing::debug;

use crate::counters::RetryCounters;
use crate::policy::RetryPolicy;

/// Run `op` under `policy`, retrying while the error's classified kind is
/// in `policy.retry_on` and attempts remain (§4.4 step 4).
///
/// `classify` maps an error to the caller-defined kind tag used against
/// `policy.retry_on`; it never changes the error itself, only whether this
/// function retries.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    service: ServiceId,
    counters: &RetryCounters,
    classify: impl Fn(&E) -> &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let kind = classify(&error);
                if attempt >= policy.max_attempts || !policy.is_retryable(kind) {
                    return Err(error);
                }
                let count = counters.increment(service);
                let delay = policy.delay_for_attempt(attempt - 1);
                debug!(%service, attempt, kind, total_retries = count, ?delay, "retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
