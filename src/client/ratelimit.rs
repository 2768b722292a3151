//! Outbound pacing.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Token bucket gating outbound lines.
///
/// One token is one line. Tokens refill at one per `period`, up to the
/// burst capacity; [`acquire`](SendLimiter::acquire) waits until a token is
/// available. The limiter holds no messages in flight — senders block
/// cooperatively on acquisition.
#[derive(Debug, Clone)]
pub struct SendLimiter {
    inner: Arc<Mutex<SendLimiterInner>>,
}

#[derive(Debug)]
struct SendLimiterInner {
    /// Refill interval per token.
    period: Duration,
    /// Currently available tokens.
    tokens: f64,
    /// Bucket capacity.
    capacity: f64,
    /// Last time tokens were added.
    last_update: Instant,
}

impl SendLimiter {
    /// Create a limiter refilling one token per `period`. A zero `burst`
    /// is coerced to 1. The bucket starts full.
    pub fn new(period: Duration, burst: u32) -> Self {
        debug_assert!(!period.is_zero());
        let capacity = f64::from(burst.max(1));
        SendLimiter {
            inner: Arc::new(Mutex::new(SendLimiterInner {
                period,
                tokens: capacity,
                capacity,
                last_update: Instant::now(),
            })),
        }
    }

    /// Wait until one token is available and consume it.
    pub async fn acquire(&self) {
        loop {
            let mut inner = self.inner.lock().await;

            let now = Instant::now();
            let elapsed = now.duration_since(inner.last_update).as_secs_f64();
            let refill = elapsed / inner.period.as_secs_f64();
            inner.tokens = (inner.tokens + refill).min(inner.capacity);
            inner.last_update = now;

            if inner.tokens >= 1.0 {
                inner.tokens -= 1.0;
                return;
            }

            let wait = inner.period.mul_f64(1.0 - inner.tokens);
            drop(inner);
            tokio::time::sleep(wait).await;
        }
    }
}
