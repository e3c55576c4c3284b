/*!
 * Task Signal State
 *
 * The calling task as seen by blocking socket operations: its pid, the set
 * of signals pending against it, and the wait queue it is parked on so a
 * signal can cut the wait short.
 */

use super::types::Signal;
use crate::core::sync::WaitQueue;
use crate::core::types::Pid;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// A schedulable task that may block in socket operations
pub struct Task {
    pid: Pid,
    pending: AtomicU64,
    parked_on: Mutex<Option<Arc<WaitQueue>>>,
}

impl Task {
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            pending: AtomicU64::new(0),
            parked_on: Mutex::new(None),
        }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Post a signal and wake the queue the task sleeps on, if any
    pub fn interrupt(&self, signal: Signal) {
        self.pending
            .fetch_or(1u64 << signal.number(), Ordering::SeqCst);
        let parked = self.parked_on.lock().clone();
        if let Some(queue) = parked {
            trace!(pid = self.pid, signal = %signal, "waking parked task");
            queue.notify_all();
        }
    }

    /// True while any signal is pending
    #[inline]
    pub fn signal_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) != 0
    }

    /// Pending signals in ascending number order
    pub fn pending_signals(&self) -> Vec<Signal> {
        let mask = self.pending.load(Ordering::SeqCst);
        (0..64)
            .filter(|n| mask & (1u64 << n) != 0)
            .filter_map(Signal::from_number)
            .collect()
    }

    /// Consume the lowest-numbered pending signal
    pub fn take_signal(&self) -> Option<Signal> {
        let mut taken = None;
        let _ = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |mask| {
                if mask == 0 {
                    return None;
                }
                let n = mask.trailing_zeros();
                taken = Signal::from_number(n);
                Some(mask & !(1u64 << n))
            });
        taken
    }

    pub fn clear_signals(&self) {
        self.pending.store(0, Ordering::SeqCst);
    }

    /// Register `queue` as the one `interrupt` must wake until the guard drops
    pub(crate) fn park_on(&self, queue: &Arc<WaitQueue>) -> ParkGuard<'_> {
        *self.parked_on.lock() = Some(Arc::clone(queue));
        ParkGuard { task: self }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("pid", &self.pid)
            .field("pending", &self.pending_signals())
            .finish()
    }
}

/// Clears the task's parked queue on drop
pub(crate) struct ParkGuard<'a> {
    task: &'a Task,
}

impl Drop for ParkGuard<'_> {
    fn drop(&mut self) {
        *self.task.parked_on.lock() = None;
    }
}
