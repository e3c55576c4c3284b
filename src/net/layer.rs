/*!
 * Socket Layer
 *
 * Descriptor-level socket API on top of the descriptor table, the interface
 * registry and the blocking data paths. One `SocketLayer` is one descriptor
 * namespace; the system-call surface wraps it.
 */

use super::addr::{AddressFamily, SockAddr, Shutdown, SocketType};
use super::blocking::IoContext;
use super::clone::clone_socket;
use super::connection;
use super::descriptor::DescriptorTable;
use super::flags::{DescriptorFlags, MsgFlags, PollEvents};
use super::interface::InterfaceRegistry;
use super::options::{OptionValue, OptionValues, SocketOption, SOL_SOCKET};
use super::recv;
use super::send;
use super::socket::{SocketObject, SocketRef};
use crate::core::config::SocketConfig;
use crate::core::errors::{SocketError, SocketResult};
use crate::core::time::{Clock, MonotonicClock};
use crate::core::types::SockFd;
use crate::monitoring::span_operation;
use crate::signals::{LoggedSignals, SignalService, Task};
use std::sync::Arc;
use tracing::{debug, info};

/// Socket descriptor namespace with its platform services
pub struct SocketLayer {
    table: DescriptorTable,
    registry: InterfaceRegistry,
    clock: Arc<dyn Clock>,
    signals: Arc<dyn SignalService>,
    config: SocketConfig,
}

impl SocketLayer {
    /// Layer with the built-in families, a monotonic clock and logged signals
    pub fn new(config: SocketConfig) -> Self {
        info!(
            max_descriptors = config.max_descriptors,
            min_descriptor = config.min_descriptor,
            "socket layer initialized"
        );
        Self {
            table: DescriptorTable::with_capacity(config.max_descriptors),
            registry: InterfaceRegistry::builtin(&config),
            clock: Arc::new(MonotonicClock::new()),
            signals: Arc::new(LoggedSignals),
            config,
        }
    }

    pub fn with_registry(mut self, registry: InterfaceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_signals(mut self, signals: Arc<dyn SignalService>) -> Self {
        self.signals = signals;
        self
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    pub fn table(&self) -> &DescriptorTable {
        &self.table
    }

    /// Socket object behind a descriptor
    pub fn resolve(&self, fd: SockFd) -> SocketResult<Arc<SocketObject>> {
        self.table.resolve(fd)
    }

    /// Resolve and pin the socket for the duration of a call
    fn pin(&self, fd: SockFd) -> SocketResult<SocketRef> {
        SocketRef::acquire(&self.table.resolve(fd)?)
    }

    fn ctx<'a>(&'a self, task: &'a Task) -> IoContext<'a> {
        IoContext::new(task, self.clock.as_ref(), self.signals.as_ref())
    }

    /// Create a socket and return its descriptor
    pub fn socket(&self, family: AddressFamily, sock_type: SocketType, protocol: u32) -> SocketResult<SockFd> {
        let span = span_operation("socket_create");
        let iface = self.registry.select_interface(family, sock_type, protocol)?;

        let fd = self.table.allocate(self.config.min_descriptor)?;
        let values = OptionValues {
            send_timeout: self.config.default_send_timeout,
            recv_timeout: self.config.default_recv_timeout,
            ..OptionValues::default()
        };
        match SocketObject::open(iface, family, sock_type, protocol, values) {
            Ok(socket) => {
                self.table.install(fd, socket, DescriptorFlags::empty());
                span.record_sockfd(fd);
                span.record_result(true);
                debug!(sockfd = fd, %family, ?sock_type, "socket created");
                Ok(fd)
            }
            Err(err) => {
                self.table.cancel(fd);
                span.record_error(&err);
                Err(err)
            }
        }
    }

    /// Assign a local address
    pub fn bind(&self, fd: SockFd, addr: &SockAddr) -> SocketResult<()> {
        let socket = self.pin(fd)?;
        check_family(&socket, addr)?;

        let mut inner = socket.lock();
        if inner.flags.is_bound() {
            return Err(SocketError::InvalidArgument);
        }
        socket.interface().bind(inner.proto_mut()?, addr)?;
        inner.flags.set_bound(true);
        inner.local_addr = Some(addr.clone());
        debug!(sockfd = fd, addr = %addr, "socket bound");
        Ok(())
    }

    /// Turn a bound connection-oriented socket into a listener
    pub fn listen(&self, fd: SockFd, backlog: usize) -> SocketResult<()> {
        let socket = self.pin(fd)?;
        if !socket.sock_type().requires_connection() {
            return Err(SocketError::UnsupportedOperation);
        }

        let mut inner = socket.lock();
        if inner.flags.is_connected() {
            return Err(SocketError::InvalidArgument);
        }
        socket.interface().listen(inner.proto_mut()?, backlog)?;
        inner.flags.mark_listening();
        debug!(sockfd = fd, backlog, "socket listening");
        Ok(())
    }

    /// Wait for and install an incoming connection
    pub fn accept(&self, task: &Task, fd: SockFd) -> SocketResult<(SockFd, SockAddr)> {
        let listener = self.table.resolve(fd)?;
        let (socket, peer) = connection::accept(&listener, &self.ctx(task))?;

        match self.table.insert(self.config.min_descriptor, Arc::clone(&socket), DescriptorFlags::empty()) {
            Ok(newfd) => Ok((newfd, peer)),
            Err(err) => {
                self.table.release_object(&socket);
                Err(err)
            }
        }
    }

    pub fn connect(&self, task: &Task, fd: SockFd, addr: &SockAddr) -> SocketResult<()> {
        let socket = self.table.resolve(fd)?;
        connection::connect(&socket, addr, &self.ctx(task))
    }

    /// Send on a connected socket
    pub fn send(&self, task: &Task, fd: SockFd, buf: &[u8], flags: MsgFlags) -> SocketResult<usize> {
        self.sendto(task, fd, buf, flags, None)
    }

    pub fn sendto(
        &self,
        task: &Task,
        fd: SockFd,
        buf: &[u8],
        flags: MsgFlags,
        dest: Option<&SockAddr>,
    ) -> SocketResult<usize> {
        let socket = self.table.resolve(fd)?;
        send::send(&socket, buf, flags, dest, &self.ctx(task))
    }

    /// Receive; 0 means orderly shutdown on a stream
    pub fn recv(&self, task: &Task, fd: SockFd, buf: &mut [u8], flags: MsgFlags) -> SocketResult<usize> {
        self.recvfrom(task, fd, buf, flags).map(|(len, _)| len)
    }

    pub fn recvfrom(
        &self,
        task: &Task,
        fd: SockFd,
        buf: &mut [u8],
        flags: MsgFlags,
    ) -> SocketResult<(usize, Option<SockAddr>)> {
        let socket = self.table.resolve(fd)?;
        let received = recv::recv(&socket, buf, flags, &self.ctx(task))?;
        Ok((received.len, received.from))
    }

    /// Shut down one or both directions
    pub fn shutdown(&self, fd: SockFd, how: Shutdown) -> SocketResult<()> {
        let socket = self.pin(fd)?;
        {
            let mut inner = socket.lock();
            if socket.sock_type().requires_connection() && !inner.flags.is_connected() {
                return Err(SocketError::NotConnected);
            }
            socket.interface().shutdown(inner.proto_mut()?, how)?;
            inner.read_shut |= how.covers_read();
            inner.write_shut |= how.covers_write();
        }
        socket.waiter().notify_all();
        debug!(sockfd = fd, ?how, "socket shut down");
        Ok(())
    }

    /// Release a descriptor
    pub fn close(&self, fd: SockFd) -> SocketResult<()> {
        let span = span_operation("socket_close");
        span.record_sockfd(fd);
        let result = self.table.release(fd);
        match &result {
            Ok(()) => span.record_result(true),
            Err(err) => span.record_error(err),
        }
        result
    }

    /// Clone a socket into the lowest free descriptor
    pub fn dup(&self, fd: SockFd) -> SocketResult<SockFd> {
        let source = self.table.resolve(fd)?;
        let clone = clone_socket(&source)?;
        match self.table.insert(self.config.min_descriptor, Arc::clone(&clone), DescriptorFlags::empty()) {
            Ok(newfd) => {
                debug!(sockfd = fd, newfd, "socket duplicated");
                Ok(newfd)
            }
            Err(err) => {
                clone.release();
                Err(err)
            }
        }
    }

    /// Clone a socket into `target`, closing whatever `target` held
    pub fn dup2(&self, fd: SockFd, target: SockFd) -> SocketResult<SockFd> {
        let source = self.table.resolve(fd)?;
        if fd == target {
            return Ok(target);
        }

        let clone = clone_socket(&source)?;
        match self.table.install_at(target, Arc::clone(&clone), DescriptorFlags::empty()) {
            Ok(previous) => {
                if let Some(previous) = previous {
                    previous.release();
                }
                debug!(sockfd = fd, newfd = target, "socket duplicated to fixed descriptor");
                Ok(target)
            }
            Err(err) => {
                clone.release();
                Err(err)
            }
        }
    }

    /// Second descriptor on the same socket object
    pub fn share(&self, fd: SockFd, min: SockFd) -> SocketResult<SockFd> {
        self.table.share(fd, min.max(self.config.min_descriptor))
    }

    pub fn setsockopt(&self, fd: SockFd, level: u32, option: u32, value: OptionValue) -> SocketResult<()> {
        let socket = self.pin(fd)?;
        let mut inner = socket.lock();
        if level != SOL_SOCKET {
            return socket.interface().set_option(inner.proto_mut()?, level, option, value);
        }

        let opt = SocketOption::from_code(option)?;
        if opt.is_get_only() {
            return Err(SocketError::InvalidArgument);
        }

        // Staged on copies, committed once the interface accepts the value
        let mut values = inner.values;
        let mut options = inner.options;
        let enable = match opt {
            SocketOption::RcvTimeo => {
                values.recv_timeout = value.as_timeout()?;
                values.recv_timeout != 0
            }
            SocketOption::SndTimeo => {
                values.send_timeout = value.as_timeout()?;
                values.send_timeout != 0
            }
            SocketOption::Linger => match value {
                OptionValue::Linger(linger) => {
                    values.linger = linger;
                    linger.enabled
                }
                _ => return Err(SocketError::InvalidArgument),
            },
            SocketOption::RcvBuf => store_size(&mut values.recv_buffer, value)?,
            SocketOption::SndBuf => store_size(&mut values.send_buffer, value)?,
            SocketOption::RcvLowat => store_size(&mut values.recv_lowat, value)?,
            SocketOption::SndLowat => store_size(&mut values.send_lowat, value)?,
            _ => value.as_bool()?,
        };

        if enable {
            options.set(option)?;
        } else {
            options.clear(option)?;
        }
        socket.interface().set_option(inner.proto_mut()?, SOL_SOCKET, option, value)?;
        inner.values = values;
        inner.options = options;
        Ok(())
    }

    pub fn getsockopt(&self, fd: SockFd, level: u32, option: u32) -> SocketResult<OptionValue> {
        let socket = self.pin(fd)?;
        let mut inner = socket.lock();
        if level != SOL_SOCKET {
            return socket.interface().get_option(inner.proto()?, level, option);
        }

        let opt = SocketOption::from_code(option)?;
        let stored = |size: Option<usize>| size.map(|v| OptionValue::Int(v.min(i32::MAX as usize) as i32));
        let value = match opt {
            SocketOption::AcceptConn => OptionValue::Bool(inner.flags.is_listening()),
            SocketOption::Error => OptionValue::Int(inner.last_error.take().map_or(0, |err| err.errno())),
            SocketOption::Type => OptionValue::Int(socket.sock_type().raw() as i32),
            SocketOption::RcvTimeo => OptionValue::Timeout(inner.values.recv_timeout),
            SocketOption::SndTimeo => OptionValue::Timeout(inner.values.send_timeout),
            SocketOption::Linger => OptionValue::Linger(inner.values.linger),
            SocketOption::RcvLowat => stored(inner.values.recv_lowat).unwrap_or(OptionValue::Int(1)),
            SocketOption::SndLowat => stored(inner.values.send_lowat).unwrap_or(OptionValue::Int(1)),
            SocketOption::RcvBuf => match stored(inner.values.recv_buffer) {
                Some(value) => value,
                None => socket.interface().get_option(inner.proto()?, SOL_SOCKET, option)?,
            },
            SocketOption::SndBuf => match stored(inner.values.send_buffer) {
                Some(value) => value,
                None => socket.interface().get_option(inner.proto()?, SOL_SOCKET, option)?,
            },
            _ => OptionValue::Bool(inner.options.contains(opt)),
        };
        Ok(value)
    }

    /// Set or clear `O_NONBLOCK` on the shared socket object
    pub fn set_nonblocking(&self, fd: SockFd, nonblock: bool) -> SocketResult<()> {
        let socket = self.pin(fd)?;
        socket.lock().flags.set_nonblock(nonblock);
        Ok(())
    }

    pub fn is_nonblocking(&self, fd: SockFd) -> SocketResult<bool> {
        Ok(self.table.resolve(fd)?.flags().is_nonblock())
    }

    /// Set or clear close-on-exec on this descriptor only
    pub fn set_cloexec(&self, fd: SockFd, cloexec: bool) -> SocketResult<()> {
        let (_, mut flags) = self.table.resolve_with_flags(fd)?;
        flags.set(DescriptorFlags::CLOEXEC, cloexec);
        self.table.set_flags(fd, flags)
    }

    pub fn descriptor_flags(&self, fd: SockFd) -> SocketResult<DescriptorFlags> {
        Ok(self.table.resolve_with_flags(fd)?.1)
    }

    /// Readiness of a socket
    pub fn poll(&self, fd: SockFd) -> SocketResult<PollEvents> {
        let socket = self.pin(fd)?;
        let inner = socket.lock();
        let mut events = socket.interface().poll(inner.proto()?);
        if inner.last_error.is_some() {
            events |= PollEvents::ERR;
        }
        if inner.read_shut {
            events |= PollEvents::IN;
        }
        Ok(events)
    }

    pub fn local_addr(&self, fd: SockFd) -> SocketResult<Option<SockAddr>> {
        Ok(self.table.resolve(fd)?.local_addr())
    }

    pub fn peer_addr(&self, fd: SockFd) -> SocketResult<SockAddr> {
        self.table.resolve(fd)?.peer_addr().ok_or(SocketError::NotConnected)
    }

    /// Descriptors currently open, ascending
    pub fn open_descriptors(&self) -> Vec<SockFd> {
        self.table.live_descriptors()
    }

    /// Release every open descriptor
    pub fn close_all(&self) {
        for fd in self.table.live_descriptors() {
            // Another caller may close it first
            let _ = self.table.release(fd);
        }
    }
}

impl Drop for SocketLayer {
    fn drop(&mut self) {
        self.close_all();
    }
}

fn check_family(socket: &SocketObject, addr: &SockAddr) -> SocketResult<()> {
    match addr.family() {
        None => Err(SocketError::InvalidArgument),
        Some(family) if family != socket.family() => Err(SocketError::AddressFamilyNotSupported),
        Some(_) => Ok(()),
    }
}

fn store_size(slot: &mut Option<usize>, value: OptionValue) -> SocketResult<bool> {
    let size = value.as_size()?;
    *slot = Some(size);
    Ok(size != 0)
}
