/*!
 * Error Types
 * Centralized socket error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// POSIX errno values reported through the system-call surface
pub mod errno {
    pub const EINTR: i32 = 4;
    pub const EAGAIN: i32 = 11;
    pub const ENOMEM: i32 = 12;
    pub const EFAULT: i32 = 14;
    pub const EINVAL: i32 = 22;
    pub const EMFILE: i32 = 24;
    pub const EPIPE: i32 = 32;
    pub const ENOTSOCK: i32 = 88;
    pub const EDESTADDRREQ: i32 = 89;
    pub const EMSGSIZE: i32 = 90;
    pub const ENOPROTOOPT: i32 = 92;
    pub const EOPNOTSUPP: i32 = 95;
    pub const EAFNOSUPPORT: i32 = 97;
    pub const EADDRINUSE: i32 = 98;
    pub const EADDRNOTAVAIL: i32 = 99;
    pub const ECONNRESET: i32 = 104;
    pub const ENOBUFS: i32 = 105;
    pub const EISCONN: i32 = 106;
    pub const ENOTCONN: i32 = 107;
    pub const ETIMEDOUT: i32 = 110;
    pub const ECONNREFUSED: i32 = 111;
    pub const EALREADY: i32 = 114;
    pub const EINPROGRESS: i32 = 115;
}

/// Socket layer errors with serialization support
///
/// Every variant is a plain kind so the value can be parked in a socket's
/// `last_error` slot and copied out again by `SO_ERROR`.
#[derive(Error, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Diagnostic)]
#[serde(rename_all = "snake_case")]
pub enum SocketError {
    #[error("Descriptor does not refer to a socket")]
    #[diagnostic(
        code(socket::not_a_socket),
        help("The descriptor is out of range, unallocated, or its socket was torn down.")
    )]
    NotASocket,

    #[error("Invalid argument")]
    #[diagnostic(code(socket::invalid_argument))]
    InvalidArgument,

    #[error("Address family not supported")]
    #[diagnostic(
        code(socket::af_not_supported),
        help("No registered socket interface matches this family, type and protocol.")
    )]
    AddressFamilyNotSupported,

    #[error("Operation already in progress")]
    #[diagnostic(
        code(socket::already_in_progress),
        help("Another task is blocked in an operation on this socket.")
    )]
    AlreadyInProgress,

    #[error("Socket is not connected")]
    #[diagnostic(code(socket::not_connected))]
    NotConnected,

    #[error("Socket is already connected")]
    #[diagnostic(code(socket::already_connected))]
    AlreadyConnected,

    #[error("Operation not supported")]
    #[diagnostic(
        code(socket::unsupported_operation),
        help("A flag bit is not supported by this socket type.")
    )]
    UnsupportedOperation,

    #[error("Message too large")]
    #[diagnostic(
        code(socket::message_too_large),
        help("Datagram transports send each message atomically. Split the payload.")
    )]
    MessageTooLarge,

    #[error("Broken pipe")]
    #[diagnostic(code(socket::broken_pipe))]
    BrokenPipe,

    #[error("Operation would block")]
    #[diagnostic(code(socket::would_block))]
    WouldBlock,

    #[error("Connection reset by peer")]
    #[diagnostic(code(socket::connection_reset))]
    ConnectionReset,

    #[error("Out of resources")]
    #[diagnostic(
        code(socket::out_of_resources),
        help("Buffer space or memory is exhausted. Retry later.")
    )]
    OutOfResources,

    #[error("Bad address")]
    #[diagnostic(code(socket::bad_address))]
    BadAddress,

    #[error("Interrupted by signal")]
    #[diagnostic(code(socket::interrupted))]
    Interrupted,

    #[error("Operation timed out")]
    #[diagnostic(
        code(socket::timed_out),
        help("SO_SNDTIMEO / SO_RCVTIMEO elapsed before the operation could complete.")
    )]
    TimedOut,

    #[error("Out of socket descriptors")]
    #[diagnostic(
        code(socket::out_of_descriptors),
        help("Every descriptor slot is in use. Close unused sockets.")
    )]
    OutOfDescriptors,

    #[error("Destination address required")]
    #[diagnostic(code(socket::destination_required))]
    DestinationRequired,

    #[error("Operation now in progress")]
    #[diagnostic(code(socket::in_progress))]
    InProgress,

    #[error("Connection refused")]
    #[diagnostic(code(socket::connection_refused))]
    ConnectionRefused,

    #[error("Address already in use")]
    #[diagnostic(code(socket::address_in_use))]
    AddressInUse,

    #[error("Address not available")]
    #[diagnostic(code(socket::address_not_available))]
    AddressNotAvailable,

    #[error("Protocol option not available")]
    #[diagnostic(code(socket::option_unavailable))]
    ProtocolOptionUnavailable,
}

impl SocketError {
    /// POSIX errno value for this error
    pub const fn errno(self) -> i32 {
        match self {
            SocketError::NotASocket => errno::ENOTSOCK,
            SocketError::InvalidArgument => errno::EINVAL,
            SocketError::AddressFamilyNotSupported => errno::EAFNOSUPPORT,
            SocketError::AlreadyInProgress => errno::EALREADY,
            SocketError::NotConnected => errno::ENOTCONN,
            SocketError::AlreadyConnected => errno::EISCONN,
            SocketError::UnsupportedOperation => errno::EOPNOTSUPP,
            SocketError::MessageTooLarge => errno::EMSGSIZE,
            SocketError::BrokenPipe => errno::EPIPE,
            SocketError::WouldBlock => errno::EAGAIN,
            SocketError::ConnectionReset => errno::ECONNRESET,
            SocketError::OutOfResources => errno::ENOMEM,
            SocketError::BadAddress => errno::EFAULT,
            SocketError::Interrupted => errno::EINTR,
            SocketError::TimedOut => errno::ETIMEDOUT,
            SocketError::OutOfDescriptors => errno::EMFILE,
            SocketError::DestinationRequired => errno::EDESTADDRREQ,
            SocketError::InProgress => errno::EINPROGRESS,
            SocketError::ConnectionRefused => errno::ECONNREFUSED,
            SocketError::AddressInUse => errno::EADDRINUSE,
            SocketError::AddressNotAvailable => errno::EADDRNOTAVAIL,
            SocketError::ProtocolOptionUnavailable => errno::ENOPROTOOPT,
        }
    }

    /// Map an errno value back to its error kind
    pub const fn from_errno(value: i32) -> Option<Self> {
        let err = match value {
            errno::ENOTSOCK => SocketError::NotASocket,
            errno::EINVAL => SocketError::InvalidArgument,
            errno::EAFNOSUPPORT => SocketError::AddressFamilyNotSupported,
            errno::EALREADY => SocketError::AlreadyInProgress,
            errno::ENOTCONN => SocketError::NotConnected,
            errno::EISCONN => SocketError::AlreadyConnected,
            errno::EOPNOTSUPP => SocketError::UnsupportedOperation,
            errno::EMSGSIZE => SocketError::MessageTooLarge,
            errno::EPIPE => SocketError::BrokenPipe,
            errno::EAGAIN => SocketError::WouldBlock,
            errno::ECONNRESET => SocketError::ConnectionReset,
            errno::ENOMEM | errno::ENOBUFS => SocketError::OutOfResources,
            errno::EFAULT => SocketError::BadAddress,
            errno::EINTR => SocketError::Interrupted,
            errno::ETIMEDOUT => SocketError::TimedOut,
            errno::EMFILE => SocketError::OutOfDescriptors,
            errno::EDESTADDRREQ => SocketError::DestinationRequired,
            errno::EINPROGRESS => SocketError::InProgress,
            errno::ECONNREFUSED => SocketError::ConnectionRefused,
            errno::EADDRINUSE => SocketError::AddressInUse,
            errno::EADDRNOTAVAIL => SocketError::AddressNotAvailable,
            errno::ENOPROTOOPT => SocketError::ProtocolOptionUnavailable,
            _ => return None,
        };
        Some(err)
    }

    /// Errors that end a blocking wait rather than describe bad input
    pub const fn is_wait_outcome(self) -> bool {
        matches!(
            self,
            SocketError::WouldBlock | SocketError::Interrupted | SocketError::TimedOut
        )
    }
}

/// Result type for socket operations
pub type SocketResult<T> = std::result::Result<T, SocketError>;
