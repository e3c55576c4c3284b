/*!
 * Socket Layer Configuration
 *
 * Descriptor range, default blocking timeouts and local transport sizing.
 */

use super::limits::*;
use super::types::{Deciseconds, SockFd};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Configuration for a socket layer instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketConfig {
    /// Lowest descriptor handed out by `socket()` and `dup()`
    pub min_descriptor: SockFd,

    /// Number of descriptor slots
    pub max_descriptors: usize,

    /// Initial `SO_SNDTIMEO` of new sockets (deciseconds, 0 = forever)
    pub default_send_timeout: Deciseconds,

    /// Initial `SO_RCVTIMEO` of new sockets (deciseconds, 0 = forever)
    pub default_recv_timeout: Deciseconds,

    /// Per-direction buffer of a local stream connection
    pub local_buffer_size: usize,

    /// Pending connections a local listener may queue
    pub local_backlog: usize,
}

impl SocketConfig {
    /// Create default configuration
    pub fn new() -> Self {
        Self {
            min_descriptor: DEFAULT_MIN_SOCKFD,
            max_descriptors: MAX_SOCKET_DESCRIPTORS,
            default_send_timeout: 0,
            default_recv_timeout: 0,
            local_buffer_size: DEFAULT_LOCAL_BUFFER,
            local_backlog: DEFAULT_LOCAL_BACKLOG,
        }
    }

    /// Small table with bounded waits, for untrusted callers
    pub fn restricted() -> Self {
        Self {
            max_descriptors: RESTRICTED_SOCKET_DESCRIPTORS,
            default_send_timeout: RESTRICTED_SOCKET_TIMEOUT,
            default_recv_timeout: RESTRICTED_SOCKET_TIMEOUT,
            ..Self::new()
        }
    }

    /// Large table for busy environments
    pub fn relaxed() -> Self {
        Self {
            max_descriptors: RELAXED_SOCKET_DESCRIPTORS,
            ..Self::new()
        }
    }

    /// Defaults overridden by `NET_*` environment variables
    ///
    /// - NET_MIN_SOCKFD: lowest descriptor
    /// - NET_MAX_SOCKETS: descriptor slots
    /// - NET_SNDTIMEO_DS / NET_RCVTIMEO_DS: default timeouts in deciseconds
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Some(v) = env_value("NET_MIN_SOCKFD") {
            config.min_descriptor = v;
        }
        if let Some(v) = env_value("NET_MAX_SOCKETS") {
            config.max_descriptors = v;
        }
        if let Some(v) = env_value("NET_SNDTIMEO_DS") {
            config.default_send_timeout = v;
        }
        if let Some(v) = env_value("NET_RCVTIMEO_DS") {
            config.default_recv_timeout = v;
        }
        config
    }

    pub fn with_min_descriptor(mut self, min: SockFd) -> Self {
        self.min_descriptor = min;
        self
    }

    pub fn with_max_descriptors(mut self, max: usize) -> Self {
        self.max_descriptors = max;
        self
    }

    pub fn with_timeouts(mut self, send: Deciseconds, recv: Deciseconds) -> Self {
        self.default_send_timeout = send;
        self.default_recv_timeout = recv;
        self
    }

    pub fn with_local_buffer_size(mut self, size: usize) -> Self {
        self.local_buffer_size = size;
        self
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn env_value<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring unparsable socket config value");
            None
        }
    }
}
