/*!
 * Signals Module
 * Signal numbers, task interruption and delivery seam for blocking socket calls
 */

pub mod service;
pub mod task;
pub mod types;

pub use service::{LoggedSignals, RecordingSignals, SignalService};
pub use task::Task;
pub use types::Signal;
