use std::fmt::Display;
use std::time::Duration;
use tracing::warn;

/// Retry an async operation with exponential backoff.
///
/// Calls `f` up to `max_attempts` times. On failure, waits `base_delay`
/// before the second attempt and doubles it after each further failure.
/// Returns the first successful result (or the last error) together with the
/// number of attempts actually made.
pub async fn retry_with_backoff<F, Fut, T, E>(
    max_attempts: u32,
    base_delay: Duration,
    label: &str,
    f: F,
) -> (Result<T, E>, u32)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
{
    let mut last_err = None;
    for attempt in 1..=max_attempts {
        match f().await {
            Ok(result) => return (Ok(result), attempt),
            Err(e) => {
                if attempt < max_attempts {
                    let delay = base_delay * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        label, attempt, max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
        }
    }

    warn!("{} failed after {} attempts", label, max_attempts);
    (Err(last_err.unwrap()), max_attempts)
}
