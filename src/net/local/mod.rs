/*!
 * Local Address Family
 *
 * Built-in `AF_LOCAL` implementation of the socket interface: host-local
 * stream and datagram sockets named by path.
 *
 * ## Destination policy
 *
 * - Stream: a destination passed to a connected socket is ignored
 * - Datagram: a destination passed to a connected socket is rejected with
 *   `AlreadyConnected`
 *
 * ## Half-close
 *
 * End-of-stream on a stream socket whose peer only shut its write side
 * leaves the socket connected: sending continues until the peer closes
 * its end or shuts its read side, and only then fails with `BrokenPipe`.
 *
 * ## Naming
 *
 * Bound paths live in a namespace shared by all sockets of one interface.
 * A path is released when the last socket object sharing the binding closes.
 * Connecting to a path with no listener, or to a listener with a full
 * backlog, is refused.
 */

mod dgram;
mod stream;

use self::dgram::Inbox;
use self::stream::{Channel, Listener, Side};
use super::addr::{AddressFamily, SockAddr, Shutdown, SocketType};
use super::flags::{MsgFlags, PollEvents};
use super::interface::{Accepted, Attempt, DestinationPolicy, ProtocolState, Received, SocketInterface};
use super::options::{OptionValue, SocketOption, SOL_SOCKET};
use crate::core::config::SocketConfig;
use crate::core::errors::{SocketError, SocketResult};
use crate::core::limits::LOCAL_MAX_DATAGRAM;
use crate::core::sync::WaitQueue;
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

type Namespace = DashMap<String, Endpoint, RandomState>;

/// What a bound path currently names
#[derive(Clone)]
enum Endpoint {
    /// Stream socket bound but not listening
    Bound,
    Listener(Weak<Listener>),
    Datagram(Weak<Inbox>),
}

/// Ownership of a path in the namespace, released on drop
struct Binding {
    path: String,
    namespace: Arc<Namespace>,
}

impl Binding {
    fn claim(namespace: &Arc<Namespace>, path: &str, endpoint: Endpoint) -> SocketResult<Arc<Self>> {
        match namespace.entry(path.to_string()) {
            Entry::Occupied(_) => Err(SocketError::AddressInUse),
            Entry::Vacant(slot) => {
                slot.insert(endpoint);
                trace!(path, "local path bound");
                Ok(Arc::new(Self {
                    path: path.to_string(),
                    namespace: Arc::clone(namespace),
                }))
            }
        }
    }

    fn addr(&self) -> SockAddr {
        SockAddr::Local(self.path.clone())
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.namespace.remove(&self.path);
        trace!(path = %self.path, "local path released");
    }
}

enum StreamRole {
    Idle,
    Listening(Arc<Listener>),
    Connected { channel: Arc<Channel>, side: Side },
}

struct StreamSocket {
    binding: Option<Arc<Binding>>,
    role: StreamRole,
    waiter: Weak<WaitQueue>,
}

struct DgramSocket {
    binding: Option<Arc<Binding>>,
    inbox: Arc<Inbox>,
    peer: Option<String>,
    waiter: Weak<WaitQueue>,
}

enum LocalState {
    Stream(StreamSocket),
    Dgram(DgramSocket),
}

fn name_of(binding: &Option<Arc<Binding>>) -> SockAddr {
    binding.as_ref().map_or(SockAddr::Unnamed, |b| b.addr())
}

fn local_state(state: &ProtocolState) -> SocketResult<&LocalState> {
    state.downcast_ref().ok_or(SocketError::InvalidArgument)
}

fn local_state_mut(state: &mut ProtocolState) -> SocketResult<&mut LocalState> {
    state.downcast_mut().ok_or(SocketError::InvalidArgument)
}

/// Wake every live watcher, dropping the dead ones
pub(crate) fn notify_watchers(watchers: &mut Vec<Weak<WaitQueue>>) {
    watchers.retain(|weak| match weak.upgrade() {
        Some(queue) => {
            queue.notify_all();
            true
        }
        None => false,
    });
}

/// `AF_LOCAL` socket interface
pub struct LocalInterface {
    namespace: Arc<Namespace>,
    buffer_size: usize,
    backlog: usize,
}

impl LocalInterface {
    pub fn new(config: &SocketConfig) -> Self {
        Self {
            namespace: Arc::new(DashMap::with_hasher(RandomState::new())),
            buffer_size: config.local_buffer_size.max(1),
            backlog: config.local_backlog.max(1),
        }
    }

    /// Number of bound paths
    pub fn bound_paths(&self) -> usize {
        self.namespace.len()
    }

    fn lookup(&self, path: &str) -> Option<Endpoint> {
        self.namespace.get(path).map(|entry| entry.value().clone())
    }
}

impl SocketInterface for LocalInterface {
    fn name(&self) -> &'static str {
        "local"
    }

    fn family(&self) -> AddressFamily {
        AddressFamily::Local
    }

    fn supports(&self, sock_type: SocketType, protocol: u32) -> bool {
        protocol == 0 && matches!(sock_type, SocketType::Stream | SocketType::Dgram)
    }

    fn supported_recv_flags(&self, _sock_type: SocketType) -> MsgFlags {
        MsgFlags::PEEK
    }

    fn max_message_size(&self, sock_type: SocketType) -> Option<usize> {
        match sock_type {
            SocketType::Dgram => Some(self.buffer_size.min(LOCAL_MAX_DATAGRAM)),
            _ => None,
        }
    }

    fn destination_policy(&self, sock_type: SocketType) -> DestinationPolicy {
        match sock_type {
            SocketType::Stream => DestinationPolicy::Ignore,
            _ => DestinationPolicy::Reject,
        }
    }

    fn eof_closes(&self, state: &ProtocolState) -> bool {
        match local_state(state) {
            Ok(LocalState::Stream(StreamSocket {
                role: StreamRole::Connected { channel, side },
                ..
            })) => channel.peer_closed(*side),
            _ => true,
        }
    }

    fn setup(&self, sock_type: SocketType, _protocol: u32, waiter: &Arc<WaitQueue>) -> SocketResult<ProtocolState> {
        let waiter = Arc::downgrade(waiter);
        let state = match sock_type {
            SocketType::Stream => LocalState::Stream(StreamSocket {
                binding: None,
                role: StreamRole::Idle,
                waiter,
            }),
            SocketType::Dgram => LocalState::Dgram(DgramSocket {
                binding: None,
                inbox: Inbox::new(self.buffer_size, waiter.clone()),
                peer: None,
                waiter,
            }),
            _ => return Err(SocketError::AddressFamilyNotSupported),
        };
        Ok(ProtocolState::new(state))
    }

    fn bind(&self, state: &mut ProtocolState, addr: &SockAddr) -> SocketResult<()> {
        let path = addr.as_local().ok_or(SocketError::InvalidArgument)?;
        match local_state_mut(state)? {
            LocalState::Stream(sock) => {
                if sock.binding.is_some() {
                    return Err(SocketError::InvalidArgument);
                }
                sock.binding = Some(Binding::claim(&self.namespace, path, Endpoint::Bound)?);
            }
            LocalState::Dgram(sock) => {
                if sock.binding.is_some() {
                    return Err(SocketError::InvalidArgument);
                }
                let endpoint = Endpoint::Datagram(Arc::downgrade(&sock.inbox));
                sock.binding = Some(Binding::claim(&self.namespace, path, endpoint)?);
            }
        }
        Ok(())
    }

    fn listen(&self, state: &mut ProtocolState, backlog: usize) -> SocketResult<()> {
        let backlog = backlog.clamp(1, self.backlog);
        let LocalState::Stream(sock) = local_state_mut(state)? else {
            return Err(SocketError::UnsupportedOperation);
        };
        let Some(binding) = sock.binding.as_ref() else {
            return Err(SocketError::InvalidArgument);
        };

        match &sock.role {
            StreamRole::Listening(listener) => {
                listener.set_backlog(backlog);
                return Ok(());
            }
            StreamRole::Connected { .. } => return Err(SocketError::InvalidArgument),
            StreamRole::Idle => {}
        }

        let listener = Listener::new(backlog, sock.waiter.clone());
        self.namespace
            .insert(binding.path.clone(), Endpoint::Listener(Arc::downgrade(&listener)));
        debug!(path = %binding.path, backlog, "local listener open");
        sock.role = StreamRole::Listening(listener);
        Ok(())
    }

    fn accept(&self, state: &mut ProtocolState, waiter: &Arc<WaitQueue>) -> SocketResult<Attempt<Accepted>> {
        let LocalState::Stream(StreamSocket {
            role: StreamRole::Listening(listener),
            ..
        }) = local_state_mut(state)?
        else {
            return Err(SocketError::InvalidArgument);
        };

        Ok(listener.dequeue()?.map(|(channel, peer)| {
            let waiter = Arc::downgrade(waiter);
            channel.attach(Side::Server, waiter.clone());
            let conn = StreamSocket {
                binding: None,
                role: StreamRole::Connected {
                    channel,
                    side: Side::Server,
                },
                waiter,
            };
            Accepted {
                state: ProtocolState::new(LocalState::Stream(conn)),
                peer,
            }
        }))
    }

    fn connect(&self, state: &mut ProtocolState, addr: &SockAddr) -> SocketResult<Attempt<()>> {
        let path = addr.as_local().ok_or(SocketError::InvalidArgument)?;
        let endpoint = self.lookup(path);

        match local_state_mut(state)? {
            LocalState::Stream(sock) => {
                match sock.role {
                    StreamRole::Idle => {}
                    StreamRole::Listening(_) => return Err(SocketError::InvalidArgument),
                    StreamRole::Connected { .. } => return Err(SocketError::AlreadyConnected),
                }
                let listener = match endpoint {
                    Some(Endpoint::Listener(weak)) => weak.upgrade().ok_or(SocketError::ConnectionRefused)?,
                    _ => return Err(SocketError::ConnectionRefused),
                };

                let me = name_of(&sock.binding);
                let channel = Channel::new(self.buffer_size, sock.waiter.clone());
                listener.enqueue(Arc::clone(&channel), me)?;
                sock.role = StreamRole::Connected {
                    channel,
                    side: Side::Client,
                };
                Ok(Attempt::Ready(()))
            }
            LocalState::Dgram(sock) => {
                match endpoint {
                    Some(Endpoint::Datagram(weak)) if weak.strong_count() > 0 => {}
                    _ => return Err(SocketError::ConnectionRefused),
                }
                sock.peer = Some(path.to_string());
                Ok(Attempt::Ready(()))
            }
        }
    }

    fn send(
        &self,
        state: &mut ProtocolState,
        buf: &[u8],
        _flags: MsgFlags,
        dest: Option<&SockAddr>,
    ) -> SocketResult<Attempt<usize>> {
        match local_state_mut(state)? {
            LocalState::Stream(sock) => match &sock.role {
                StreamRole::Connected { channel, side } => channel.send(*side, buf),
                _ => Err(SocketError::NotConnected),
            },
            LocalState::Dgram(sock) => {
                let path = match dest {
                    Some(addr) => addr.as_local().ok_or(SocketError::InvalidArgument)?,
                    None => sock.peer.as_deref().ok_or(SocketError::DestinationRequired)?,
                };
                let inbox = match self.lookup(path) {
                    Some(Endpoint::Datagram(weak)) => weak.upgrade().ok_or(SocketError::ConnectionRefused)?,
                    _ => return Err(SocketError::ConnectionRefused),
                };
                Ok(inbox.deliver(buf, name_of(&sock.binding), &sock.waiter))
            }
        }
    }

    fn recv(&self, state: &mut ProtocolState, buf: &mut [u8], flags: MsgFlags) -> SocketResult<Attempt<Received>> {
        let peek = flags.contains(MsgFlags::PEEK);
        match local_state_mut(state)? {
            LocalState::Stream(sock) => match &sock.role {
                StreamRole::Connected { channel, side } => channel.recv(*side, buf, peek),
                _ => Err(SocketError::NotConnected),
            },
            LocalState::Dgram(sock) => Ok(sock.inbox.take(buf, peek)),
        }
    }

    fn get_option(&self, _state: &ProtocolState, level: u32, option: u32) -> SocketResult<OptionValue> {
        if level != SOL_SOCKET {
            return Err(SocketError::ProtocolOptionUnavailable);
        }
        match SocketOption::from_code(option)? {
            SocketOption::RcvBuf | SocketOption::SndBuf => Ok(OptionValue::Int(self.buffer_size as i32)),
            _ => Err(SocketError::ProtocolOptionUnavailable),
        }
    }

    fn poll(&self, state: &ProtocolState) -> PollEvents {
        match local_state(state) {
            Ok(LocalState::Stream(sock)) => match &sock.role {
                StreamRole::Idle => PollEvents::empty(),
                StreamRole::Listening(listener) if listener.has_pending() => PollEvents::IN,
                StreamRole::Listening(_) => PollEvents::empty(),
                StreamRole::Connected { channel, side } => channel.poll(*side),
            },
            Ok(LocalState::Dgram(sock)) => {
                if sock.inbox.is_readable() {
                    PollEvents::IN | PollEvents::OUT
                } else {
                    PollEvents::OUT
                }
            }
            Err(_) => PollEvents::ERR,
        }
    }

    fn shutdown(&self, state: &mut ProtocolState, how: Shutdown) -> SocketResult<()> {
        match local_state_mut(state)? {
            LocalState::Stream(sock) => match &sock.role {
                StreamRole::Connected { channel, side } => {
                    channel.shutdown(*side, how);
                    Ok(())
                }
                _ => Err(SocketError::NotConnected),
            },
            LocalState::Dgram(_) => Ok(()),
        }
    }

    fn close(&self, state: ProtocolState) {
        let Ok(state) = state.into_inner::<LocalState>() else {
            return;
        };
        match *state {
            LocalState::Stream(sock) => match sock.role {
                StreamRole::Connected { channel, side } => channel.close_end(side),
                StreamRole::Listening(listener) => listener.release(),
                StreamRole::Idle => {}
            },
            LocalState::Dgram(_) => {}
        }
    }

    fn duplicate(&self, state: &ProtocolState, waiter: &Arc<WaitQueue>) -> SocketResult<ProtocolState> {
        let waiter = Arc::downgrade(waiter);
        let dup = match local_state(state)? {
            LocalState::Stream(sock) => {
                let role = match &sock.role {
                    StreamRole::Idle => StreamRole::Idle,
                    StreamRole::Listening(listener) => {
                        listener.share(waiter.clone());
                        StreamRole::Listening(Arc::clone(listener))
                    }
                    StreamRole::Connected { channel, side } => {
                        channel.open_end(*side, waiter.clone());
                        StreamRole::Connected {
                            channel: Arc::clone(channel),
                            side: *side,
                        }
                    }
                };
                LocalState::Stream(StreamSocket {
                    binding: sock.binding.clone(),
                    role,
                    waiter,
                })
            }
            LocalState::Dgram(sock) => {
                sock.inbox.attach(waiter.clone());
                LocalState::Dgram(DgramSocket {
                    binding: sock.binding.clone(),
                    inbox: Arc::clone(&sock.inbox),
                    peer: sock.peer.clone(),
                    waiter,
                })
            }
        };
        Ok(ProtocolState::new(dup))
    }
}
