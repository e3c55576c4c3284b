/*!
 * AI-OS Socket Layer Library
 * Kernel socket abstraction exposed as a library
 */

pub mod core;
pub mod monitoring;
pub mod net;
pub mod signals;
pub mod syscalls;

// Re-exports
pub use core::errors::{SocketError, SocketResult};
pub use core::{Clock, ManualClock, MonotonicClock, SocketConfig};
pub use monitoring::init_tracing;
pub use net::{AddressFamily, MsgFlags, SockAddr, SocketLayer, SocketType};
pub use signals::{Signal, Task};
pub use syscalls::{SocketCall, SocketSyscalls, SyscallResult};
