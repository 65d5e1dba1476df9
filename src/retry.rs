use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};

pub const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);
pub const SUCCESS_THROTTLE: Duration = Duration::from_millis(10);

/// Backoff state for one fetch. Dropped on success or on a fatal error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryState {
    pub delay: Duration,
    pub attempts: u32,
}

impl RetryState {
    fn new(initial: Duration) -> Self {
        Self {
            delay: initial,
            attempts: 0,
        }
    }
}

/// Retries an operation while the remote side reports rate limiting.
///
/// With no `max_retries` and no `max_delay` the policy retries forever,
/// doubling the delay each time. Every other error is returned on the spot.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    initial_delay: Duration,
    throttle: Duration,
    max_retries: Option<u32>,
    max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: INITIAL_BACKOFF,
            throttle: SUCCESS_THROTTLE,
            max_retries: None,
            max_delay: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: Option<u32>, max_delay: Option<Duration>) -> Self {
        Self {
            max_retries,
            max_delay,
            ..Self::default()
        }
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut state = RetryState::new(self.initial_delay);

        loop {
            state.attempts += 1;

            match operation().await {
                Ok(value) => {
                    debug!(target_id = %label, attempts = state.attempts, "Fetch succeeded");
                    sleep(self.throttle).await;
                    return Ok(value);
                }
                Err(err) if err.is_rate_limited() => {
                    if let Some(max) = self.max_retries {
                        if state.attempts > max {
                            return Err(AppError::RetriesExhausted {
                                attempts: state.attempts,
                            });
                        }
                    }

                    warn!(
                        target_id = %label,
                        attempt = state.attempts,
                        wait_ms = state.delay.as_millis() as u64,
                        "Rate limited; backing off"
                    );
                    sleep(state.delay).await;
                    state.delay = self.next_delay(state.delay);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let doubled = current.saturating_mul(2);
        match self.max_delay {
            Some(cap) => doubled.min(cap),
            None => doubled,
        }
    }
}
