//! Host time adapter.
//!
//! Monotonic milliseconds from `embassy_time::Instant`; sleeps are
//! `async_io_mini` timers, so they yield to the executor instead of
//! blocking the thread.  Both run on the embassy-time `std` driver.

use core::time::Duration;

use async_io_mini::Timer;
use embassy_time::Instant;

use crate::app::ports::TimePort;

pub struct MonotonicTime {
    start: Instant,
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl TimePort for MonotonicTime {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis()
    }

    async fn sleep_ms(&self, ms: u32) {
        if ms > 0 {
            Timer::after(Duration::from_millis(u64::from(ms))).await;
        }
    }
}
