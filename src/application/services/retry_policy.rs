use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::application::ports::{BrokerError, JobStoreError};

/// Errors that report an infrastructure outage worth retrying.
pub trait Retryable {
    fn is_unavailable(&self) -> bool;
}

impl Retryable for JobStoreError {
    fn is_unavailable(&self) -> bool {
        JobStoreError::is_unavailable(self)
    }
}

impl Retryable for BrokerError {
    fn is_unavailable(&self) -> bool {
        BrokerError::is_unavailable(self)
    }
}

/// Exponential backoff for outages of the store or the broker. Any other error
/// is returned on first sight.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut retries_left = self.max_retries;
        let mut delay = self.initial_delay;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_unavailable() && retries_left > 0 => {
                    retries_left -= 1;
                    tracing::warn!(
                        error = %e,
                        operation,
                        retries_left,
                        delay_ms = delay.as_millis() as u64,
                        "Backend unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.max_delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
