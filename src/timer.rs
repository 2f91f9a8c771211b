//! Gravity timer: a cancellable fixed-interval tick that drives `Board::step_down`.

use std::time::{Duration, Instant};

/// Speed-up per level above 1 (fraction of the base rate).
const LEVEL_SPEEDUP: f64 = 0.1;

/// Upper bound on the tick rate so very high levels stay playable.
const MAX_TICK_RATE: f64 = 60.0;

/// Interval between gravity ticks for `level`; `relaxed` pins it to the base rate.
pub fn tick_interval(base_rate: f64, level: u32, relaxed: bool) -> Duration {
    let rate = if relaxed {
        base_rate
    } else {
        base_rate * (1.0 + (level.saturating_sub(1) as f64) * LEVEL_SPEEDUP)
    };
    Duration::from_secs_f64(1.0 / rate.clamp(f64::MIN_POSITIVE, MAX_TICK_RATE))
}

#[derive(Debug, Clone)]
pub struct DropTimer {
    interval: Duration,
    /// Time of the last tick; `None` while cancelled.
    last: Option<Instant>,
}

impl DropTimer {
    /// A cancelled timer; call `start` to arm it.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.last = Some(now);
    }

    pub fn cancel(&mut self) {
        self.last = None;
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.last.is_some()
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// True once per elapsed interval. Missed ticks are not replayed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.last {
            Some(t) if now.saturating_duration_since(t) >= self.interval => {
                self.last = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Time left until the next tick, if armed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.last
            .map(|t| self.interval.saturating_sub(now.saturating_duration_since(t)))
    }
}
