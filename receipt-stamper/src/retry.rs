use std::{fmt::Display, future::Future, time::Duration};

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Runs `operation` (given the 1-based attempt number) until it succeeds,
    /// fails with an error `is_retryable` rejects, or attempts run out. The
    /// last error is returned.
    pub async fn run<T, E, F, Fut, P>(&self, label: &str, mut operation: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && is_retryable(&e) => {
                    tracing::warn!(
                        operation = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Attempt failed, retrying in {}s",
                        self.delay.as_secs()
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(operation = label, attempt, error = %e, "Giving up");
                    return Err(e);
                }
            }
        }
    }
}
