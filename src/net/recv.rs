/*!
 * Receive Path
 *
 * Mirrors the send path ordering:
 *
 * 1. Live socket, else `NotASocket`
 * 2. Connection-oriented socket never connected: `NotConnected`
 * 3. Flags outside the interface's set plus `MsgFlags::CORE`:
 *    `UnsupportedOperation`
 * 4. Read side shut down: end of stream (0 bytes)
 * 5. Nothing queued and non-blocking: `WouldBlock`
 * 6. Otherwise block with `SO_RCVTIMEO`
 *
 * A zero-length read on a stream is the peer's orderly shutdown. It moves
 * the socket to the gracefully closed state unless the interface reports
 * a half-close (`SocketInterface::eof_closes`).
 */

use super::blocking::{note_failure, run_blocking, IoContext};
use super::flags::MsgFlags;
use super::interface::{Attempt, Received};
use super::socket::{SocketObject, SocketRef};
use super::state::Activity;
use crate::core::errors::{SocketError, SocketResult};
use std::sync::Arc;
use tracing::trace;

/// Receive into `buf`
pub fn recv(
    socket: &Arc<SocketObject>,
    buf: &mut [u8],
    flags: MsgFlags,
    ctx: &IoContext<'_>,
) -> SocketResult<Received> {
    let socket = SocketRef::acquire(socket)?;
    let iface = Arc::clone(socket.interface());
    let sock_type = socket.sock_type();

    let (nonblock, timeout) = {
        let inner = socket.lock();
        if sock_type.requires_connection() && !inner.flags.is_connected() && !inner.flags.is_closed() {
            return Err(SocketError::NotConnected);
        }

        let allowed = iface.supported_recv_flags(sock_type) | MsgFlags::CORE;
        if !allowed.contains(flags) {
            return Err(SocketError::UnsupportedOperation);
        }

        if inner.read_shut {
            return Ok(Received { len: 0, from: None });
        }
        (
            inner.flags.is_nonblock() || flags.contains(MsgFlags::DONTWAIT),
            inner.values.recv_timeout,
        )
    };

    let result = run_blocking(&socket, Activity::Recv, ctx, timeout, nonblock, |inner| {
        if inner.read_shut {
            return Ok(Attempt::Ready(Received { len: 0, from: None }));
        }
        iface.recv(inner.proto_mut()?, &mut *buf, flags)
    });

    match result {
        Ok(received) => {
            if received.len == 0 && !buf.is_empty() && sock_type.requires_connection() {
                let mut inner = socket.lock();
                let closes = inner.proto().map_or(true, |proto| iface.eof_closes(proto));
                if inner.flags.is_connected() && !inner.read_shut && closes {
                    inner.flags.mark_closed();
                    trace!("peer closed connection");
                }
            }
            trace!(bytes = received.len, "recv complete");
            Ok(received)
        }
        Err(err) => {
            note_failure(&socket, err);
            Err(err)
        }
    }
}
