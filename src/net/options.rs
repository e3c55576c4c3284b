/*!
 * Socket Options
 *
 * Option codes at the socket level, the one-bit-per-option mask carried by
 * every socket object, and the stored values of the non-boolean options.
 *
 * `SO_ACCEPTCONN`, `SO_ERROR` and `SO_TYPE` are read-only: they can be
 * queried but never set or cleared by a caller.
 */

use crate::core::errors::{SocketError, SocketResult};
use crate::core::limits::MAX_SOCKET_OPTION;
use crate::core::types::Deciseconds;
use serde::{Deserialize, Serialize};

/// Option level addressing the socket layer itself
pub const SOL_SOCKET: u32 = 1;

/// Socket-level option codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum SocketOption {
    /// Socket is listening (get-only)
    AcceptConn = 0,
    Broadcast = 1,
    Debug = 2,
    DontRoute = 3,
    /// Pending error, cleared on read (get-only)
    Error = 4,
    KeepAlive = 5,
    Linger = 6,
    OobInline = 7,
    RcvBuf = 8,
    RcvLowat = 9,
    RcvTimeo = 10,
    ReuseAddr = 11,
    SndBuf = 12,
    SndLowat = 13,
    SndTimeo = 14,
    /// Socket type (get-only)
    Type = 15,
}

impl SocketOption {
    pub fn from_code(code: u32) -> SocketResult<Self> {
        let option = match code {
            0 => Self::AcceptConn,
            1 => Self::Broadcast,
            2 => Self::Debug,
            3 => Self::DontRoute,
            4 => Self::Error,
            5 => Self::KeepAlive,
            6 => Self::Linger,
            7 => Self::OobInline,
            8 => Self::RcvBuf,
            9 => Self::RcvLowat,
            10 => Self::RcvTimeo,
            11 => Self::ReuseAddr,
            12 => Self::SndBuf,
            13 => Self::SndLowat,
            14 => Self::SndTimeo,
            15 => Self::Type,
            _ => return Err(SocketError::InvalidArgument),
        };
        Ok(option)
    }

    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    #[inline]
    pub fn is_get_only(self) -> bool {
        matches!(self, Self::AcceptConn | Self::Error | Self::Type)
    }

    /// Options whose whole value is their mask bit
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            Self::Broadcast | Self::Debug | Self::DontRoute | Self::KeepAlive | Self::OobInline | Self::ReuseAddr
        )
    }
}

/// True if `code` names a tracked socket-level option
#[inline]
pub fn is_valid_code(code: u32) -> bool {
    code <= MAX_SOCKET_OPTION
}

/// True if a caller may set or clear `code`
#[inline]
pub fn is_settable(code: u32) -> bool {
    is_valid_code(code) && OptionMask::GET_ONLY & (1 << code) == 0
}

/// One bit per socket-level option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OptionMask(u16);

impl OptionMask {
    const GET_ONLY: u16 = (1 << SocketOption::AcceptConn as u16)
        | (1 << SocketOption::Error as u16)
        | (1 << SocketOption::Type as u16);

    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Set a caller-settable option bit
    pub fn set(&mut self, code: u32) -> SocketResult<()> {
        if !is_settable(code) {
            return Err(SocketError::InvalidArgument);
        }
        self.0 |= 1 << code;
        Ok(())
    }

    /// Clear a caller-settable option bit
    pub fn clear(&mut self, code: u32) -> SocketResult<()> {
        if !is_settable(code) {
            return Err(SocketError::InvalidArgument);
        }
        self.0 &= !(1 << code);
        Ok(())
    }

    /// Query any valid option bit, read-only ones included
    pub fn test(self, code: u32) -> SocketResult<bool> {
        if !is_valid_code(code) {
            return Err(SocketError::InvalidArgument);
        }
        Ok(self.0 & (1 << code) != 0)
    }

    #[inline]
    pub fn contains(self, option: SocketOption) -> bool {
        self.0 & (1 << option.code()) != 0
    }
}

/// `SO_LINGER` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Linger {
    pub enabled: bool,
    pub seconds: u32,
}

/// Value passed to or returned from a socket option call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionValue {
    Bool(bool),
    Int(i32),
    /// Timeout in deciseconds, 0 waits forever
    Timeout(Deciseconds),
    Linger(Linger),
}

impl OptionValue {
    /// Interpret as a boolean switch (non-zero integers count as on)
    pub fn as_bool(self) -> SocketResult<bool> {
        match self {
            Self::Bool(on) => Ok(on),
            Self::Int(v) => Ok(v != 0),
            _ => Err(SocketError::InvalidArgument),
        }
    }

    /// Interpret as a non-negative size
    pub fn as_size(self) -> SocketResult<usize> {
        match self {
            Self::Int(v) if v >= 0 => Ok(v as usize),
            _ => Err(SocketError::InvalidArgument),
        }
    }

    pub fn as_timeout(self) -> SocketResult<Deciseconds> {
        match self {
            Self::Timeout(ds) => Ok(ds),
            Self::Int(v) if v >= 0 => Ok(v as Deciseconds),
            _ => Err(SocketError::InvalidArgument),
        }
    }
}

/// Stored values of the non-boolean socket options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OptionValues {
    pub send_timeout: Deciseconds,
    pub recv_timeout: Deciseconds,
    pub linger: Linger,
    pub send_buffer: Option<usize>,
    pub recv_buffer: Option<usize>,
    pub send_lowat: Option<usize>,
    pub recv_lowat: Option<usize>,
}
