/*!
 * Core Types
 * Common types used across the socket layer
 */

/// Process ID type
pub type Pid = u32;

/// Socket descriptor type
pub type SockFd = u32;

/// Monotonic clock ticks since the clock's origin
pub type Ticks = u64;

/// Socket timeout value in deciseconds (0 = wait forever)
pub type Deciseconds = u32;

/// Raw address family number (`AF_*`)
pub type RawFamily = u16;
