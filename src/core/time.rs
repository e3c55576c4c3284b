/*!
 * Clock Service and Timeout Evaluation
 *
 * Monotonic tick source for blocking socket operations and the check that
 * decides when a blocked call must give up.
 *
 * ## Units
 *
 * - The clock counts ticks (`CLOCK_TICKS_PER_SEC` per second)
 * - Socket timeouts (`SO_SNDTIMEO`, `SO_RCVTIMEO`) are deciseconds
 * - A timeout of zero means "wait forever"
 *
 * The evaluator only ever compares against a monotonic source, so wall-clock
 * adjustments cannot make a wait fire early or late.
 */

use super::limits::{CLOCK_TICKS_PER_SEC, DSEC_PER_SEC, USEC_PER_TICK};
use super::types::{Deciseconds, Ticks};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic tick counter
pub trait Clock: Send + Sync {
    /// Current tick count
    fn now(&self) -> Ticks;
}

/// Clock backed by `std::time::Instant`
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Ticks {
        self.origin.elapsed().as_micros() as u64 / USEC_PER_TICK
    }
}

/// Clock that only moves when told to
///
/// Lets tests place a blocked operation exactly at its deadline.
#[derive(Debug, Default)]
pub struct ManualClock {
    ticks: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Ticks) -> Self {
        Self {
            ticks: AtomicU64::new(start),
        }
    }

    /// Advance the clock and return the new tick count
    pub fn advance(&self, ticks: Ticks) -> Ticks {
        self.ticks.fetch_add(ticks, Ordering::AcqRel) + ticks
    }

    pub fn set(&self, ticks: Ticks) {
        self.ticks.store(ticks, Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Ticks {
        self.ticks.load(Ordering::Acquire)
    }
}

/// Convert a decisecond timeout into clock ticks
#[inline]
pub const fn dsec_to_ticks(timeout: Deciseconds) -> Ticks {
    (timeout as u64 * CLOCK_TICKS_PER_SEC) / DSEC_PER_SEC
}

/// Convert clock ticks into a wall duration for a bounded wait
#[inline]
pub const fn ticks_to_duration(ticks: Ticks) -> Duration {
    Duration::from_micros(ticks * USEC_PER_TICK)
}

/// Check if a timeout has elapsed
///
/// `timeout == 0` never expires. Otherwise true once the ticks elapsed since
/// `start` reach the timeout converted to ticks.
#[inline]
pub fn has_timed_out(clock: &dyn Clock, start: Ticks, timeout: Deciseconds) -> bool {
    if timeout == 0 {
        return false;
    }
    let elapsed = clock.now().saturating_sub(start);
    elapsed >= dsec_to_ticks(timeout)
}

/// Time left before a timeout expires
///
/// `None` means wait without bound; `Some(Duration::ZERO)` means expired.
pub fn remaining(clock: &dyn Clock, start: Ticks, timeout: Deciseconds) -> Option<Duration> {
    if timeout == 0 {
        return None;
    }
    let elapsed = clock.now().saturating_sub(start);
    let left = dsec_to_ticks(timeout).saturating_sub(elapsed);
    Some(ticks_to_duration(left))
}
