/*!
 * System Limits and Constants
 *
 * Centralized location for socket-layer limits, thresholds, and magic numbers.
 * Organized by domain for maintainability and discoverability.
 *
 * - Performance-critical constants are marked with [PERF]
 * - Linux-compatible values are marked with [LINUX-COMPAT]
 */

use super::types::{Deciseconds, SockFd};

// =============================================================================
// DESCRIPTOR LIMITS
// =============================================================================

/// Default number of socket descriptors in a table
pub const MAX_SOCKET_DESCRIPTORS: usize = 64;

/// Descriptor table size for restricted configurations
pub const RESTRICTED_SOCKET_DESCRIPTORS: usize = 16;

/// Descriptor table size for relaxed configurations
pub const RELAXED_SOCKET_DESCRIPTORS: usize = 256;

/// Lowest descriptor handed out when the caller does not ask for more
pub const DEFAULT_MIN_SOCKFD: SockFd = 0;

// =============================================================================
// CLOCK
// =============================================================================

/// System clock rate (100 ticks per second, 10ms per tick)
pub const CLOCK_TICKS_PER_SEC: u64 = 100;

/// Microseconds per clock tick
pub const USEC_PER_TICK: u64 = 1_000_000 / CLOCK_TICKS_PER_SEC;

/// Deciseconds per second
pub const DSEC_PER_SEC: u64 = 10;

// =============================================================================
// SOCKET OPTIONS
// =============================================================================

/// Largest socket option code tracked in the option bitmask
pub const MAX_SOCKET_OPTION: u32 = 15;

/// Standard send/receive timeout for restricted configurations (5 seconds)
pub const RESTRICTED_SOCKET_TIMEOUT: Deciseconds = 50;

// =============================================================================
// LOCAL ADDRESS FAMILY
// =============================================================================

/// Per-direction stream buffer of a local connection (4KB)
/// [PERF] Aligned with common page size
pub const DEFAULT_LOCAL_BUFFER: usize = 4096;

/// Pending connections queued on a local listener
/// [LINUX-COMPAT] Small default like SOMAXCONN on embedded targets
pub const DEFAULT_LOCAL_BACKLOG: usize = 8;

/// Largest local datagram accepted as one atomic unit (16KB)
pub const LOCAL_MAX_DATAGRAM: usize = 16 * 1024;

/// Largest receive buffer a serialized `recv` call allocates (64KB)
/// Larger requests are clamped, like a short read
pub const MAX_RECV_SIZE: usize = 64 * 1024;

/// Maximum length of a local socket path
/// [LINUX-COMPAT] Matches sizeof(sun_path) - 1
pub const LOCAL_MAX_PATH: usize = 107;
