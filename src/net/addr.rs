/*!
 * Socket Addressing
 * Address families, socket types and endpoint addresses
 */

use crate::core::errors::{SocketError, SocketResult};
use crate::core::limits::LOCAL_MAX_PATH;
use crate::core::types::RawFamily;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol family selecting the interface that handles a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum AddressFamily {
    Unspec = 0,
    /// Host-local sockets named by path
    Local = 1,
    Inet = 2,
    Inet6 = 10,
    Packet = 17,
}

impl AddressFamily {
    pub fn from_raw(raw: RawFamily) -> SocketResult<Self> {
        match raw {
            0 => Ok(Self::Unspec),
            1 => Ok(Self::Local),
            2 => Ok(Self::Inet),
            10 => Ok(Self::Inet6),
            17 => Ok(Self::Packet),
            _ => Err(SocketError::AddressFamilyNotSupported),
        }
    }

    #[inline]
    pub fn raw(self) -> RawFamily {
        self as RawFamily
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unspec => "AF_UNSPEC",
            Self::Local => "AF_LOCAL",
            Self::Inet => "AF_INET",
            Self::Inet6 => "AF_INET6",
            Self::Packet => "AF_PACKET",
        };
        f.write_str(name)
    }
}

/// Communication semantics of a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum SocketType {
    Stream = 1,
    Dgram = 2,
    Raw = 3,
    SeqPacket = 5,
}

impl SocketType {
    pub fn from_raw(raw: u32) -> SocketResult<Self> {
        match raw {
            1 => Ok(Self::Stream),
            2 => Ok(Self::Dgram),
            3 => Ok(Self::Raw),
            5 => Ok(Self::SeqPacket),
            _ => Err(SocketError::InvalidArgument),
        }
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self as u32
    }

    /// Types that can only send once connected
    #[inline]
    pub fn requires_connection(self) -> bool {
        matches!(self, Self::Stream | Self::SeqPacket)
    }

    /// Types that transfer each message as one atomic unit
    #[inline]
    pub fn is_message_oriented(self) -> bool {
        !matches!(self, Self::Stream)
    }
}

/// Endpoint address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SockAddr {
    /// Local socket path
    Local(String),
    /// Internet endpoint
    Inet(std::net::SocketAddr),
    /// Peer with no name (e.g. an unbound local client)
    Unnamed,
}

impl SockAddr {
    /// Build a validated local address
    pub fn local(path: impl Into<String>) -> SocketResult<Self> {
        let path = path.into();
        if path.is_empty() || path.len() > LOCAL_MAX_PATH || path.contains('\0') {
            return Err(SocketError::InvalidArgument);
        }
        Ok(Self::Local(path))
    }

    /// Family this address belongs to (`None` for unnamed)
    pub fn family(&self) -> Option<AddressFamily> {
        match self {
            Self::Local(_) => Some(AddressFamily::Local),
            Self::Inet(addr) if addr.is_ipv4() => Some(AddressFamily::Inet),
            Self::Inet(_) => Some(AddressFamily::Inet6),
            Self::Unnamed => None,
        }
    }

    pub fn as_local(&self) -> Option<&str> {
        match self {
            Self::Local(path) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for SockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "local:{}", path),
            Self::Inet(addr) => write!(f, "{}", addr),
            Self::Unnamed => f.write_str("(unnamed)"),
        }
    }
}

/// Which half of a connection to shut down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shutdown {
    Read,
    Write,
    Both,
}

impl Shutdown {
    pub fn from_raw(how: u32) -> SocketResult<Self> {
        match how {
            0 => Ok(Self::Read),
            1 => Ok(Self::Write),
            2 => Ok(Self::Both),
            _ => Err(SocketError::InvalidArgument),
        }
    }

    #[inline]
    pub fn covers_read(self) -> bool {
        matches!(self, Self::Read | Self::Both)
    }

    #[inline]
    pub fn covers_write(self) -> bool {
        matches!(self, Self::Write | Self::Both)
    }
}
