/*!
 * Core Module
 * Fundamental socket-layer types, errors, limits, configuration and clock
 */

pub mod config;
pub mod errors;
pub mod limits;
pub mod sync;
pub mod time;
pub mod types;

// Re-export for convenience
pub use config::SocketConfig;
pub use errors::*;
pub use time::{has_timed_out, Clock, ManualClock, MonotonicClock};
pub use types::*;
