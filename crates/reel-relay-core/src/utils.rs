//! Shared helpers.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Initial delay before the first retry of a transport call.
pub const TRANSPORT_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for the retry delay.
pub const TRANSPORT_MAX_BACKOFF_MS: u64 = 4000;
/// Number of retries after the first attempt.
pub const TRANSPORT_MAX_RETRIES: usize = 3;

/// Safely truncates a string to a maximum character length (not bytes).
///
/// # Examples
///
/// ```
/// use reel_relay_core::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Retry a transport operation with exponential backoff.
///
/// Delays start at 500ms, are capped at 4s and carry jitter; at most three
/// retries are made before the last error is returned.
///
/// # Errors
///
/// Returns the last error if every attempt fails.
///
/// # Examples
///
/// ```no_run
/// use reel_relay_core::utils::retry_transport_operation;
///
/// # async fn example() -> anyhow::Result<()> {
/// let value = retry_transport_operation(|| async { Ok::<_, anyhow::Error>(1) }).await?;
/// assert_eq!(value, 1);
/// # Ok(())
/// # }
/// ```
pub async fn retry_transport_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let retry_strategy = ExponentialBackoff::from_millis(TRANSPORT_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TRANSPORT_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TRANSPORT_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Transport operation failed after {} retries: {}",
            TRANSPORT_MAX_RETRIES, e
        );
        e
    })
}
