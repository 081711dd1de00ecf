use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Attempts applied to embedding and vector-store calls by the pipelines.
pub const DEFAULT_ATTEMPTS: usize = 3;
pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

/// Retries an async operation with exponential backoff. The first failure
/// waits `initial_delay`, doubling after each further failure, until
/// `attempts` calls have been made; the final error is returned as-is.
pub async fn with_backoff<T, E, F, Fut>(
    attempts: usize,
    initial_delay: Duration,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut delay = initial_delay;

    for attempt in 1..=attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < attempts => {
                warn!(
                    operation = operation_name,
                    attempt,
                    error = %error,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(error) => return Err(error),
        }
    }

    unreachable!("loop always returns on the final attempt")
}
