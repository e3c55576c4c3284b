/*!
 * Socket State Codec
 *
 * Activity and connection state of a socket object. The in-memory form is an
 * activity tag plus independent booleans; `bits()`/`from_bits()` convert to
 * and from the packed one-byte word:
 *
 * ```text
 *  bit 7    6         5      4          3         2   1-0
 *  CLOSED | CONNECTED | BOUND | LISTENING | NONBLOCK | - | ACTIVITY
 * ```
 *
 * Connection encoding:
 *
 * - CONNECTED=1, CLOSED=0: connected
 * - CONNECTED=0, CLOSED=1: gracefully disconnected
 * - CONNECTED=0, CLOSED=0: never connected or abruptly reset
 * - CONNECTED=1, CLOSED=1: illegal, rejected on construction
 */

use crate::core::errors::{SocketError, SocketResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The blocking operation currently in flight on a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Activity {
    /// No socket activity
    #[default]
    Idle = 0,
    /// Waiting to accept a connection
    Accept = 1,
    /// Waiting for a receive to complete
    Recv = 2,
    /// Waiting for a send to complete
    Send = 3,
}

impl Activity {
    fn from_bits(bits: u8) -> Self {
        match bits & SocketFlags::ACTIVITY_MASK {
            1 => Activity::Accept,
            2 => Activity::Recv,
            3 => Activity::Send,
            _ => Activity::Idle,
        }
    }
}

/// Connection condition derived from the CONNECTED/CLOSED pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connection {
    Connected,
    /// Gracefully disconnected
    Closed,
    /// Never connected, or torn down abruptly
    Reset,
}

/// Decoded socket state word
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SocketFlags {
    activity: Activity,
    nonblock: bool,
    listening: bool,
    bound: bool,
    connected: bool,
    closed: bool,
}

impl SocketFlags {
    pub const ACTIVITY_MASK: u8 = 0x03;
    pub const NONBLOCK: u8 = 0x08;
    pub const LISTENING: u8 = 0x10;
    pub const BOUND: u8 = 0x20;
    pub const CONNECTED: u8 = 0x40;
    pub const CLOSED: u8 = 0x80;

    const KNOWN: u8 = Self::ACTIVITY_MASK
        | Self::NONBLOCK
        | Self::LISTENING
        | Self::BOUND
        | Self::CONNECTED
        | Self::CLOSED;

    /// Build a state word, rejecting illegal combinations
    pub fn new(
        activity: Activity,
        nonblock: bool,
        listening: bool,
        bound: bool,
        connected: bool,
        closed: bool,
    ) -> SocketResult<Self> {
        if connected && closed {
            return Err(SocketError::InvalidArgument);
        }
        if listening && connected {
            return Err(SocketError::InvalidArgument);
        }
        Ok(Self {
            activity,
            nonblock,
            listening,
            bound,
            connected,
            closed,
        })
    }

    /// Decode a packed word
    pub fn from_bits(bits: u8) -> SocketResult<Self> {
        if bits & !Self::KNOWN != 0 {
            return Err(SocketError::InvalidArgument);
        }
        Self::new(
            Activity::from_bits(bits),
            bits & Self::NONBLOCK != 0,
            bits & Self::LISTENING != 0,
            bits & Self::BOUND != 0,
            bits & Self::CONNECTED != 0,
            bits & Self::CLOSED != 0,
        )
    }

    /// Encode as the packed word
    pub fn bits(self) -> u8 {
        let mut bits = self.activity as u8;
        if self.nonblock {
            bits |= Self::NONBLOCK;
        }
        if self.listening {
            bits |= Self::LISTENING;
        }
        if self.bound {
            bits |= Self::BOUND;
        }
        if self.connected {
            bits |= Self::CONNECTED;
        }
        if self.closed {
            bits |= Self::CLOSED;
        }
        bits
    }

    #[inline]
    pub fn activity(self) -> Activity {
        self.activity
    }

    /// Copy with the activity field replaced
    #[inline]
    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activity = activity;
        self
    }

    #[inline]
    pub fn set_activity(&mut self, activity: Activity) {
        self.activity = activity;
    }

    /// True unless the activity is idle
    #[inline]
    pub fn is_busy(self) -> bool {
        self.activity != Activity::Idle
    }

    #[inline]
    pub fn is_nonblock(self) -> bool {
        self.nonblock
    }

    #[inline]
    pub fn is_listening(self) -> bool {
        self.listening
    }

    #[inline]
    pub fn is_bound(self) -> bool {
        self.bound
    }

    #[inline]
    pub fn is_connected(self) -> bool {
        self.connected
    }

    #[inline]
    pub fn is_closed(self) -> bool {
        self.closed
    }

    pub fn connection(self) -> Connection {
        match (self.connected, self.closed) {
            (true, _) => Connection::Connected,
            (false, true) => Connection::Closed,
            (false, false) => Connection::Reset,
        }
    }

    pub fn set_nonblock(&mut self, nonblock: bool) {
        self.nonblock = nonblock;
    }

    pub fn set_bound(&mut self, bound: bool) {
        self.bound = bound;
    }

    /// Enter the passive listening state; callers reject connected sockets first
    pub fn mark_listening(&mut self) {
        debug_assert!(!self.connected, "listening socket cannot be connected");
        self.listening = true;
        self.connected = false;
    }

    /// Enter the connected state; callers reject listeners first
    pub fn mark_connected(&mut self) {
        debug_assert!(!self.listening, "connected socket cannot be listening");
        self.connected = true;
        self.closed = false;
    }

    /// Peer or local end closed the connection in order
    pub fn mark_closed(&mut self) {
        self.connected = false;
        self.closed = true;
    }

    /// Connection torn down abruptly
    pub fn mark_reset(&mut self) {
        self.connected = false;
        self.closed = false;
    }
}

impl fmt::Debug for SocketFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketFlags")
            .field("activity", &self.activity)
            .field("nonblock", &self.nonblock)
            .field("listening", &self.listening)
            .field("bound", &self.bound)
            .field("connection", &self.connection())
            .finish()
    }
}
