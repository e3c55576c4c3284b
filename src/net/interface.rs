/*!
 * Socket Interface Table
 *
 * The capability set every address-family implementation provides, and the
 * compiled-in registry the core selects an implementation from when a socket
 * is created. The core only ever calls through `SocketInterface`; protocol
 * private state travels as an opaque `ProtocolState` that only the owning
 * implementation looks inside.
 *
 * ## Contract
 *
 * - Data-path methods never block. When they cannot make progress they
 *   return `Attempt::Blocked` and notify the socket's wait queue once
 *   progress becomes possible.
 * - Methods are called with the socket object locked and must not call back
 *   into the socket layer.
 * - `close` runs exactly once, after the last reference is released.
 */

use super::addr::{AddressFamily, SockAddr, Shutdown, SocketType};
use super::flags::{MsgFlags, PollEvents};
use super::options::{OptionValue, SOL_SOCKET};
use crate::core::config::SocketConfig;
use crate::core::errors::{SocketError, SocketResult};
use crate::core::sync::WaitQueue;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Opaque per-socket protocol data
pub struct ProtocolState(Box<dyn Any + Send + Sync>);

impl ProtocolState {
    pub fn new<T: Any + Send + Sync>(state: T) -> Self {
        Self(Box::new(state))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.0.downcast_mut()
    }

    /// Recover the concrete state, or give it back unchanged on type mismatch
    pub fn into_inner<T: Any>(self) -> Result<Box<T>, Self> {
        self.0.downcast().map_err(Self)
    }
}

impl fmt::Debug for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProtocolState(..)")
    }
}

/// Result of a non-blocking protocol attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// The operation completed
    Ready(T),
    /// No progress possible yet; the wait queue will be notified
    Blocked,
}

impl<T> Attempt<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Attempt::Ready(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Attempt<U> {
        match self {
            Attempt::Ready(v) => Attempt::Ready(f(v)),
            Attempt::Blocked => Attempt::Blocked,
        }
    }
}

/// A connection taken off a listener's queue
#[derive(Debug)]
pub struct Accepted {
    pub state: ProtocolState,
    pub peer: SockAddr,
}

/// Bytes received and, for datagrams, who sent them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub len: usize,
    pub from: Option<SockAddr>,
}

/// What a send on a connected socket does with an explicit destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationPolicy {
    /// Fail with `AlreadyConnected`
    Reject,
    /// Drop the destination and send to the peer
    Ignore,
}

/// Capability set of one address-family implementation
pub trait SocketInterface: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    fn family(&self) -> AddressFamily;

    /// True if this implementation serves `(sock_type, protocol)`; protocol 0
    /// asks for the type's default
    fn supports(&self, sock_type: SocketType, protocol: u32) -> bool;

    /// Send flags the protocol understands beyond `MsgFlags::CORE`
    fn supported_send_flags(&self, _sock_type: SocketType) -> MsgFlags {
        MsgFlags::empty()
    }

    /// Receive flags the protocol understands beyond `MsgFlags::CORE`
    fn supported_recv_flags(&self, _sock_type: SocketType) -> MsgFlags {
        MsgFlags::empty()
    }

    /// Largest atomic message, `None` for byte streams
    fn max_message_size(&self, _sock_type: SocketType) -> Option<usize> {
        None
    }

    fn destination_policy(&self, _sock_type: SocketType) -> DestinationPolicy {
        DestinationPolicy::Reject
    }

    /// True if an end-of-stream read ends the whole connection, false if
    /// only the peer's write side is done and sending may continue
    fn eof_closes(&self, _state: &ProtocolState) -> bool {
        true
    }

    /// Create protocol state for a new socket whose wait queue is `waiter`
    fn setup(
        &self,
        sock_type: SocketType,
        protocol: u32,
        waiter: &Arc<WaitQueue>,
    ) -> SocketResult<ProtocolState>;

    fn bind(&self, state: &mut ProtocolState, addr: &SockAddr) -> SocketResult<()>;

    fn listen(&self, state: &mut ProtocolState, backlog: usize) -> SocketResult<()>;

    /// Take one pending connection; its state reports to `waiter`
    fn accept(
        &self,
        state: &mut ProtocolState,
        waiter: &Arc<WaitQueue>,
    ) -> SocketResult<Attempt<Accepted>>;

    /// Start (or poll) a connection to `addr`
    fn connect(&self, state: &mut ProtocolState, addr: &SockAddr) -> SocketResult<Attempt<()>>;

    fn send(
        &self,
        state: &mut ProtocolState,
        buf: &[u8],
        flags: MsgFlags,
        dest: Option<&SockAddr>,
    ) -> SocketResult<Attempt<usize>>;

    /// `Ready` with zero length means orderly shutdown by the peer
    fn recv(
        &self,
        state: &mut ProtocolState,
        buf: &mut [u8],
        flags: MsgFlags,
    ) -> SocketResult<Attempt<Received>>;

    /// Protocol view of an option write; socket-level options are already
    /// recorded by the core and forwarded for information
    fn set_option(
        &self,
        _state: &mut ProtocolState,
        level: u32,
        _option: u32,
        _value: OptionValue,
    ) -> SocketResult<()> {
        if level == SOL_SOCKET {
            Ok(())
        } else {
            Err(SocketError::ProtocolOptionUnavailable)
        }
    }

    /// Options the core does not answer itself
    fn get_option(
        &self,
        _state: &ProtocolState,
        _level: u32,
        _option: u32,
    ) -> SocketResult<OptionValue> {
        Err(SocketError::ProtocolOptionUnavailable)
    }

    fn poll(&self, state: &ProtocolState) -> PollEvents;

    fn shutdown(&self, state: &mut ProtocolState, how: Shutdown) -> SocketResult<()>;

    /// Final teardown
    fn close(&self, state: ProtocolState);

    /// State for a clone of this socket, either shared or deep-copied
    fn duplicate(&self, state: &ProtocolState, waiter: &Arc<WaitQueue>) -> SocketResult<ProtocolState>;
}

/// Compiled-in set of address-family implementations
#[derive(Clone, Default)]
pub struct InterfaceRegistry {
    interfaces: Vec<Arc<dyn SocketInterface>>,
}

impl InterfaceRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in families
    pub fn builtin(config: &SocketConfig) -> Self {
        Self::empty().with(Arc::new(super::local::LocalInterface::new(config)))
    }

    /// Add an implementation; earlier registrations win ties
    pub fn with(mut self, interface: Arc<dyn SocketInterface>) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// First implementation matching `(family, sock_type, protocol)`
    pub fn select_interface(
        &self,
        family: AddressFamily,
        sock_type: SocketType,
        protocol: u32,
    ) -> SocketResult<Arc<dyn SocketInterface>> {
        self.interfaces
            .iter()
            .find(|iface| iface.family() == family && iface.supports(sock_type, protocol))
            .cloned()
            .ok_or_else(|| {
                warn!(%family, ?sock_type, protocol, "no socket interface for request");
                SocketError::AddressFamilyNotSupported
            })
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

impl fmt::Debug for InterfaceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.interfaces.iter().map(|iface| iface.name()))
            .finish()
    }
}
