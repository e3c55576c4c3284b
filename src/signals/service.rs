/*!
 * Signal Delivery Service
 *
 * The socket layer raises signals (SIGPIPE on a broken pipe) through this
 * seam; the process subsystem owns actual delivery.
 */

use super::types::Signal;
use crate::core::types::Pid;
use parking_lot::Mutex;
use tracing::info;

/// Delivers a signal to a process
pub trait SignalService: Send + Sync {
    fn deliver(&self, pid: Pid, signal: Signal);
}

/// Service that only logs what it is asked to deliver
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggedSignals;

impl SignalService for LoggedSignals {
    fn deliver(&self, pid: Pid, signal: Signal) {
        info!(pid, signal = %signal, "signal raised by socket layer");
    }
}

/// Service that keeps every delivery for later inspection
#[derive(Debug, Default)]
pub struct RecordingSignals {
    delivered: Mutex<Vec<(Pid, Signal)>>,
}

impl RecordingSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<(Pid, Signal)> {
        self.delivered.lock().clone()
    }

    pub fn count(&self, signal: Signal) -> usize {
        self.delivered
            .lock()
            .iter()
            .filter(|(_, s)| *s == signal)
            .count()
    }
}

impl SignalService for RecordingSignals {
    fn deliver(&self, pid: Pid, signal: Signal) {
        info!(pid, signal = %signal, "signal raised by socket layer");
        self.delivered.lock().push((pid, signal));
    }
}
