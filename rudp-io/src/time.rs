//! Timing utilities
//!
//! The rudp update loop runs at a fixed cadence (30 Hz by default): tick,
//! drain receives, pace sends, sleep to the next boundary. `Ticker` owns
//! the sleep; `SendPacer` owns the carry-over send budget.

use std::thread;
use std::time::{Duration, Instant};

/// Fixed-cadence tick driver.
///
/// `wait` sleeps until the next tick boundary and returns the nominal
/// tick interval in seconds. If a tick overruns, the next boundary is
/// re-anchored to now rather than letting sleep debt accumulate.
pub struct Ticker {
    interval: Duration,
    next: Instant,
}

impl Ticker {
    /// Create a ticker firing every `interval`.
    pub fn new(interval: Duration) -> Self {
        Ticker {
            interval,
            next: Instant::now() + interval,
        }
    }

    /// Create a ticker firing `hz` times per second.
    pub fn from_hz(hz: u32) -> Self {
        Ticker::new(Duration::from_secs(1) / hz)
    }

    /// Sleep until the next tick boundary; returns the tick length in
    /// seconds.
    pub fn wait(&mut self) -> f64 {
        let now = Instant::now();
        if self.next > now {
            thread::sleep(self.next - now);
            self.next += self.interval;
        } else {
            // Overran the boundary; re-anchor instead of sprinting.
            self.next = now + self.interval;
        }
        self.interval.as_secs_f64()
    }

    /// The nominal tick interval in seconds.
    pub fn dt(&self) -> f64 {
        self.interval.as_secs_f64()
    }
}

/// Carry-over send budget.
///
/// Accumulates elapsed time and releases one send whenever a full
/// packet interval (`1 / rate`) has been banked, so pacing stays smooth
/// across ticks instead of bursting.
#[derive(Debug, Default)]
pub struct SendPacer {
    accumulator: f64,
}

impl SendPacer {
    pub fn new() -> Self {
        SendPacer { accumulator: 0.0 }
    }

    /// Bank `dt` seconds of send budget.
    pub fn advance(&mut self, dt: f64) {
        self.accumulator += dt;
    }

    /// Try to withdraw one packet's worth of budget at `rate` packets per
    /// second. Returns true if a packet may be sent now.
    pub fn try_consume(&mut self, rate: f64) -> bool {
        let interval = 1.0 / rate;
        if self.accumulator > interval {
            self.accumulator -= interval;
            true
        } else {
            false
        }
    }

    /// Drop any banked budget (used when there is nothing to send, so a
    /// later burst does not inherit idle time).
    pub fn clear(&mut self) {
        self.accumulator = 0.0;
    }
}
