//! Token-bucket rate limiter for outbound API calls.

use anyhow::{anyhow, Result};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct State {
    tokens: u32,
    last_refill: Instant,
}

/// Allows `max_tokens` calls per `refill_interval`. Refill is lazy: on each
/// wait, whole elapsed intervals mint tokens (capped at capacity) and
/// `last_refill` advances by exactly the minted intervals, so fractional
/// elapsed time keeps accumulating.
pub struct RateLimiter {
    max_tokens: u32,
    refill_interval: Duration,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(max_tokens: u32, refill_interval: Duration) -> Self {
        RateLimiter {
            max_tokens,
            refill_interval,
            state: Mutex::new(State {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Blocks until a token is acquired or the token is cancelled.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            {
                let mut state = self.state.lock().await;
                self.refill(&mut state);
                if state.tokens > 0 {
                    state.tokens -= 1;
                    return Ok(());
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(anyhow!("rate limit wait cancelled")),
                _ = tokio::time::sleep(self.refill_interval) => {}
            }
        }
    }

    fn refill(&self, state: &mut State) {
        let elapsed = state.last_refill.elapsed();
        let minted = (elapsed.as_nanos() / self.refill_interval.as_nanos().max(1)) as u32;
        if minted > 0 {
            state.tokens = (state.tokens + minted).min(self.max_tokens);
            state.last_refill += self.refill_interval * minted;
        }
    }
}
