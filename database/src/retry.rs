use std::{future::Future, pin::Pin, time::Duration};

use tokio::time::sleep;

pub type BoxedAttempt<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// Runs `operation` until it succeeds or `max_retries` extra attempts have
/// failed, doubling the pause between attempts.
pub async fn retry_with_backoff<F, T, E>(
    label: &str,
    mut operation: F,
    max_retries: usize,
    initial_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> BoxedAttempt<T, E>,
    E: std::fmt::Display,
{
    let mut delay = initial_delay;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    operation = label,
                    attempt,
                    error = %e,
                    "retrying in {:?}",
                    delay
                );
                sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
