/*!
 * Connection Establishment
 *
 * Blocking accept and connect. Both follow the same suspension contract as
 * the data path; a blocked connect shows as the send activity since the
 * activity set has no separate connect state.
 */

use super::addr::SockAddr;
use super::blocking::{note_failure, run_blocking, IoContext};
use super::clone::derive_accepted;
use super::socket::{SocketObject, SocketRef};
use super::state::Activity;
use crate::core::errors::{SocketError, SocketResult};
use crate::core::sync::WaitQueue;
use std::sync::Arc;
use tracing::debug;

/// Wait for a connection on a listening socket
///
/// Returns the new connection's object (one reference held) and the peer
/// address.
pub fn accept(listener: &Arc<SocketObject>, ctx: &IoContext<'_>) -> SocketResult<(Arc<SocketObject>, SockAddr)> {
    let listener = SocketRef::acquire(listener)?;
    let iface = Arc::clone(listener.interface());

    let (nonblock, timeout) = {
        let inner = listener.lock();
        if !inner.flags.is_listening() {
            return Err(SocketError::InvalidArgument);
        }
        (inner.flags.is_nonblock(), inner.values.recv_timeout)
    };

    let waiter = Arc::new(WaitQueue::new());
    let result = run_blocking(&listener, Activity::Accept, ctx, timeout, nonblock, |inner| {
        iface.accept(inner.proto_mut()?, &waiter)
    });

    match result {
        Ok(accepted) => {
            let peer = accepted.peer.clone();
            let socket = derive_accepted(&listener, accepted, waiter);
            debug!(peer = %peer, "connection accepted");
            Ok((socket, peer))
        }
        Err(err) => {
            note_failure(&listener, err);
            Err(err)
        }
    }
}

/// Connect `socket` to `addr`
///
/// A non-blocking connect that cannot finish at once reports `InProgress`.
/// Connectionless sockets may connect again to change their peer.
pub fn connect(socket: &Arc<SocketObject>, addr: &SockAddr, ctx: &IoContext<'_>) -> SocketResult<()> {
    let socket = SocketRef::acquire(socket)?;
    let iface = Arc::clone(socket.interface());

    match addr.family() {
        None => return Err(SocketError::InvalidArgument),
        Some(family) if family != socket.family() => return Err(SocketError::AddressFamilyNotSupported),
        Some(_) => {}
    }

    let (nonblock, timeout) = {
        let inner = socket.lock();
        if inner.flags.is_listening() {
            return Err(SocketError::InvalidArgument);
        }
        if socket.sock_type().requires_connection() && inner.flags.is_connected() {
            return Err(SocketError::AlreadyConnected);
        }
        (inner.flags.is_nonblock(), inner.values.send_timeout)
    };

    let result = run_blocking(&socket, Activity::Send, ctx, timeout, nonblock, |inner| {
        iface.connect(inner.proto_mut()?, addr)
    });

    match result {
        Ok(()) => {
            let mut inner = socket.lock();
            inner.flags.mark_connected();
            inner.peer_addr = Some(addr.clone());
            debug!(peer = %addr, "socket connected");
            Ok(())
        }
        Err(SocketError::WouldBlock) => Err(SocketError::InProgress),
        Err(err) => {
            note_failure(&socket, err);
            Err(err)
        }
    }
}
