use tokio::time::{Duration, Instant};

/// Minimum-interval gate. A call that arrives before `interval` has elapsed
/// since the last accepted one is dropped, not queued.
///
/// Uses tokio's clock so paused-time tests can drive it.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_call: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Throttle {
            interval,
            last_call: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        match self.last_call {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_call = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_call = None;
    }
}
