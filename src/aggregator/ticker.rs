use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

/// Paces the aggregation loop.
///
/// `tick` resolves when the next cycle may start. Returning `false` ends
/// the run.
#[allow(async_fn_in_trait)]
pub trait Ticker {
    async fn tick(&mut self) -> bool;
}

/// Fires immediately, then once per period, forever.
///
/// A cycle that overruns its period delays the next tick rather than
/// causing a burst of catch-up ticks.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    /// # Panics
    ///
    /// Panics if `period` is zero, as `tokio::time::interval` does.
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Fires a fixed number of times without waiting.
pub struct FixedTicks {
    remaining: usize,
}

impl FixedTicks {
    pub fn new(count: usize) -> Self {
        Self { remaining: count }
    }
}

impl Ticker for FixedTicks {
    async fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}
