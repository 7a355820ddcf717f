use {
    anyhow::{Result, ensure},
    std::time::Duration,
    tokio::{
        sync::Mutex,
        time::{Instant, sleep},
    },
};

/// A fixed-interval gate pacing all outbound RPC calls process-wide.
///
/// Every caller reserves the next free slot and sleeps until it comes up,
/// so calls are spaced at least `1 / requests_per_second` apart no matter
/// where in the pipeline they originate.
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64) -> Result<Self> {
        ensure!(
            requests_per_second.is_finite() && requests_per_second > 0.0,
            "requests per second must be a positive number, got {requests_per_second}"
        );
        Ok(Self {
            min_interval: Duration::from_secs_f64(1.0 / requests_per_second),
            next_slot: Mutex::new(None),
        })
    }

    /// Waits until the next call may go out.
    pub async fn acquire(&self) {
        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next_slot {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next_slot = Some(slot + self.min_interval);
            slot
        };
        sleep_until(slot).await;
    }
}

async fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        sleep(deadline - now).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn spaces_calls_by_the_configured_interval() {
        let limiter = RateLimiter::new(10.0).unwrap();
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn first_call_passes_immediately() {
        let limiter = RateLimiter::new(0.001).unwrap();
        let start = std::time::Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn rejects_nonsensical_rates() {
        assert!(RateLimiter::new(0.0).is_err());
        assert!(RateLimiter::new(-1.0).is_err());
        assert!(RateLimiter::new(f64::NAN).is_err());
    }
}
