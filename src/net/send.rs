/*!
 * Send Path
 *
 * The canonical data-path operation. Checks run in a fixed order and the
 * first failing one decides the error:
 *
 * 1. Live socket, else `NotASocket`
 * 2. Connection and destination:
 *    - connection-oriented and not connected: `NotConnected`
 *    - connectionless, unconnected, no destination: `DestinationRequired`
 *    - connected with a destination: the family's `DestinationPolicy`
 *      (`AlreadyConnected` or the destination is ignored)
 * 3. Flags outside the interface's set plus `MsgFlags::CORE`:
 *    `UnsupportedOperation`
 * 4. Message over the transport's atomic limit: `MessageTooLarge`
 * 5. Write side shut down: `BrokenPipe`, plus SIGPIPE unless
 *    `MSG_NOSIGNAL`
 * 6. No room and non-blocking (`O_NONBLOCK` or `MSG_DONTWAIT`):
 *    `WouldBlock`
 * 7. Otherwise block with `SO_SNDTIMEO`
 *
 * A gracefully closed stream skips step 2 and fails at step 5.
 */

use super::addr::{SockAddr, SocketType};
use super::blocking::{note_failure, run_blocking, IoContext};
use super::flags::MsgFlags;
use super::interface::{DestinationPolicy, SocketInterface};
use super::socket::{SocketObject, SocketRef};
use super::state::{Activity, SocketFlags};
use crate::core::errors::{SocketError, SocketResult};
use std::sync::Arc;
use tracing::trace;

/// Send `buf` on `socket`, optionally to `dest`
///
/// Returns the bytes the transport accepted, which may be fewer than
/// `buf.len()` on a stream.
pub fn send(
    socket: &Arc<SocketObject>,
    buf: &[u8],
    flags: MsgFlags,
    dest: Option<&SockAddr>,
    ctx: &IoContext<'_>,
) -> SocketResult<usize> {
    let socket = SocketRef::acquire(socket)?;
    let iface = Arc::clone(socket.interface());
    let sock_type = socket.sock_type();

    let (dest, pipe_closed, nonblock, timeout) = {
        let inner = socket.lock();
        let dest = check_destination(inner.flags, sock_type, iface.as_ref(), dest)?;

        let allowed = iface.supported_send_flags(sock_type) | MsgFlags::CORE;
        if !allowed.contains(flags) {
            return Err(SocketError::UnsupportedOperation);
        }

        if let Some(max) = iface.max_message_size(sock_type) {
            if buf.len() > max {
                return Err(SocketError::MessageTooLarge);
            }
        }

        let pipe_closed = inner.write_shut || (sock_type.requires_connection() && inner.flags.is_closed());
        let nonblock = inner.flags.is_nonblock() || flags.contains(MsgFlags::DONTWAIT);
        (dest, pipe_closed, nonblock, inner.values.send_timeout)
    };

    if pipe_closed {
        broken_pipe(&socket, flags, ctx);
        return Err(SocketError::BrokenPipe);
    }

    let result = run_blocking(&socket, Activity::Send, ctx, timeout, nonblock, |inner| {
        if inner.write_shut {
            return Err(SocketError::BrokenPipe);
        }
        iface.send(inner.proto_mut()?, buf, flags, dest)
    });

    match result {
        Ok(sent) => {
            trace!(bytes = sent, requested = buf.len(), "send complete");
            Ok(sent)
        }
        Err(SocketError::BrokenPipe) => {
            broken_pipe(&socket, flags, ctx);
            Err(SocketError::BrokenPipe)
        }
        Err(err) => {
            note_failure(&socket, err);
            Err(err)
        }
    }
}

fn broken_pipe(socket: &SocketObject, flags: MsgFlags, ctx: &IoContext<'_>) {
    note_failure(socket, SocketError::BrokenPipe);
    if !flags.contains(MsgFlags::NOSIGNAL) {
        ctx.raise_sigpipe();
    }
}

/// Step 2: where the data goes, `None` meaning the connected peer
fn check_destination<'d>(
    flags: SocketFlags,
    sock_type: SocketType,
    iface: &dyn SocketInterface,
    dest: Option<&'d SockAddr>,
) -> SocketResult<Option<&'d SockAddr>> {
    if flags.is_connected() {
        return match (dest, iface.destination_policy(sock_type)) {
            (Some(_), DestinationPolicy::Reject) => Err(SocketError::AlreadyConnected),
            _ => Ok(None),
        };
    }

    if sock_type.requires_connection() {
        if flags.is_closed() {
            return Ok(None);
        }
        return Err(SocketError::NotConnected);
    }

    dest.map(Some).ok_or(SocketError::DestinationRequired)
}
