/*!
 * Wait Queue
 *
 * Condvar-based wait queue keyed by a generation counter. A waiter takes a
 * snapshot before checking its condition and sleeps only while the
 * generation is unchanged, so a notification that lands between the check
 * and the sleep is never lost.
 */

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Wait operation outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The generation moved (woken by a notify)
    Woken,
    /// The bound elapsed with no notification
    TimedOut,
}

/// Generation-counted wait queue
///
/// # Performance
///
/// - One mutex + condvar per queue, no allocation on wait
/// - `notify_all` is cheap when nobody waits (counter bump only)
pub struct WaitQueue {
    generation: Mutex<u64>,
    condvar: Condvar,
    waiters: AtomicUsize,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self {
            generation: Mutex::new(0),
            condvar: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    /// Current generation; pass it to `wait_changed` after checking state
    #[inline]
    pub fn snapshot(&self) -> u64 {
        *self.generation.lock()
    }

    /// Bump the generation and wake every waiter
    pub fn notify_all(&self) {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        drop(generation);

        if self.waiters.load(Ordering::Acquire) > 0 {
            self.condvar.notify_all();
        }
    }

    /// Sleep until the generation differs from `seen` or `timeout` elapses
    ///
    /// Returns immediately with `Woken` if a notify already happened after
    /// the snapshot. `None` waits without bound.
    pub fn wait_changed(&self, seen: u64, timeout: Option<Duration>) -> WaitOutcome {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut generation = self.generation.lock();

        if *generation != seen {
            return WaitOutcome::Woken;
        }

        self.waiters.fetch_add(1, Ordering::AcqRel);
        let outcome = loop {
            match deadline {
                None => self.condvar.wait(&mut generation),
                Some(deadline) => {
                    if self.condvar.wait_until(&mut generation, deadline).timed_out()
                        && *generation == seen
                    {
                        break WaitOutcome::TimedOut;
                    }
                }
            }
            if *generation != seen {
                break WaitOutcome::Woken;
            }
        };
        self.waiters.fetch_sub(1, Ordering::AcqRel);
        outcome
    }

    /// Number of tasks currently sleeping on this queue (diagnostics)
    pub fn waiter_count(&self) -> usize {
        self.waiters.load(Ordering::Acquire)
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WaitQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitQueue")
            .field("generation", &self.snapshot())
            .field("waiters", &self.waiter_count())
            .finish()
    }
}
