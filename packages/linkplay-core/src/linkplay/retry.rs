//! Retry logic for transient device errors.
//!
//! Group formation is the only call that is retried: a device that is
//! still switching networks often times out on the first attempt.

use std::time::Duration;

use super::traits::DeviceResult;

/// Retry delays for transient errors (exponential backoff).
const RETRY_DELAYS_MS: [u64; 3] = [200, 500, 1000];

/// Executes a device call with retry on timeouts.
///
/// # Arguments
/// * `action` - Action name for logging
/// * `operation` - Closure that performs the call
pub(crate) async fn with_retry<F, Fut>(action: &str, mut operation: F) -> DeviceResult<String>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = DeviceResult<String>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(r) => return Ok(r),
            Err(e) if e.is_transient() && attempt < RETRY_DELAYS_MS.len() => {
                let delay_ms = RETRY_DELAYS_MS[attempt];
                attempt += 1;
                log::warn!(
                    "[Device] {} transient error: {} (retry {}/{} in {}ms)",
                    action,
                    e,
                    attempt,
                    RETRY_DELAYS_MS.len(),
                    delay_ms
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}
