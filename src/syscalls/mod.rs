/*!
 * Syscalls Module
 * Socket system-call surface over the socket layer
 */

mod executor;
mod socket;
mod types;

// Re-export public API
pub use executor::SocketSyscalls;
pub use types::{SocketCall, SyscallResult};
