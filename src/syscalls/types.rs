/*!
 * Syscall Types
 * Serializable socket call requests and their results
 */

use serde::{Deserialize, Serialize};

/// Result of a dispatched socket call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyscallResult {
    Success { data: Option<Vec<u8>> },
    Error { errno: i32, message: String },
}

impl SyscallResult {
    pub fn success() -> Self {
        Self::Success { data: None }
    }

    pub fn success_with_data(data: Vec<u8>) -> Self {
        Self::Success { data: Some(data) }
    }

    pub fn error(errno: i32, message: impl Into<String>) -> Self {
        Self::Error {
            errno,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Errno of a failed call
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Error { errno, .. } => Some(*errno),
            Self::Success { .. } => None,
        }
    }
}

/// Socket system call with its arguments
///
/// Local addresses are carried as paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SocketCall {
    Socket {
        domain: u16,
        sock_type: u32,
        protocol: u32,
    },
    Bind {
        sockfd: u32,
        path: String,
    },
    Listen {
        sockfd: u32,
        backlog: usize,
    },
    Accept {
        sockfd: u32,
    },
    Connect {
        sockfd: u32,
        path: String,
    },
    Send {
        sockfd: u32,
        data: Vec<u8>,
        flags: u32,
    },
    SendTo {
        sockfd: u32,
        data: Vec<u8>,
        flags: u32,
        path: String,
    },
    Recv {
        sockfd: u32,
        size: usize,
        flags: u32,
    },
    Shutdown {
        sockfd: u32,
        how: u32,
    },
    Close {
        sockfd: u32,
    },
    Dup {
        sockfd: u32,
    },
    Dup2 {
        sockfd: u32,
        target: u32,
    },
    SetSockOpt {
        sockfd: u32,
        level: u32,
        option: u32,
        value: i32,
    },
    GetSockOpt {
        sockfd: u32,
        level: u32,
        option: u32,
    },
}

impl SocketCall {
    /// Call name for logs and spans
    pub fn name(&self) -> &'static str {
        match self {
            Self::Socket { .. } => "socket",
            Self::Bind { .. } => "bind",
            Self::Listen { .. } => "listen",
            Self::Accept { .. } => "accept",
            Self::Connect { .. } => "connect",
            Self::Send { .. } => "send",
            Self::SendTo { .. } => "sendto",
            Self::Recv { .. } => "recv",
            Self::Shutdown { .. } => "shutdown",
            Self::Close { .. } => "close",
            Self::Dup { .. } => "dup",
            Self::Dup2 { .. } => "dup2",
            Self::SetSockOpt { .. } => "setsockopt",
            Self::GetSockOpt { .. } => "getsockopt",
        }
    }
}
