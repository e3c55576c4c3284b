/*!
 * Socket Clone Engine
 *
 * Builds a second, independently counted socket object from an existing
 * one. Used by `dup`/`dup2` and to give an accepted connection its own
 * object.
 *
 * The clone starts idle with no pending error and inherits the option mask,
 * option values and the bound/listening/connected/nonblock flags verbatim.
 * Protocol state comes from the interface's `duplicate`, which decides
 * whether it is shared or copied. Nothing is built until that call
 * succeeds, so a failed clone leaves no partial object behind.
 */

use super::interface::Accepted;
use super::socket::{SocketObject, SocketSeed};
use super::state::SocketFlags;
use crate::core::errors::{SocketError, SocketResult};
use crate::core::sync::WaitQueue;
use crate::monitoring::span_operation;
use std::sync::Arc;
use tracing::debug;

/// Duplicate `source` into a new object holding one reference
pub fn clone_socket(source: &SocketObject) -> SocketResult<Arc<SocketObject>> {
    let span = span_operation("socket_clone");
    let _entered = span.enter();

    let waiter = Arc::new(WaitQueue::new());
    let (proto, seed) = {
        let inner = source.lock();
        if inner.crefs == 0 {
            span.record_error(&SocketError::NotASocket);
            return Err(SocketError::NotASocket);
        }

        let proto = match source.interface().duplicate(inner.proto()?, &waiter) {
            Ok(proto) => proto,
            Err(err) => {
                span.record_error(&err);
                return Err(err);
            }
        };
        let seed = SocketSeed {
            flags: inner.flags,
            options: inner.options,
            values: inner.values,
            local_addr: inner.local_addr.clone(),
            peer_addr: inner.peer_addr.clone(),
        };
        (proto, seed)
    };

    let clone = SocketObject::assemble(
        Arc::clone(source.interface()),
        source.family(),
        source.sock_type(),
        source.protocol(),
        waiter,
        proto,
        seed,
    );
    span.record_result(true);
    debug!(family = %source.family(), flags = ?clone.flags(), "socket cloned");
    Ok(clone)
}

/// Promote a connection taken off `listener` into its own object
///
/// The new socket is bound and connected, never listening, and keeps the
/// listener's options. Its protocol state already reports to `waiter`.
pub(crate) fn derive_accepted(
    listener: &SocketObject,
    accepted: Accepted,
    waiter: Arc<WaitQueue>,
) -> Arc<SocketObject> {
    let mut flags = SocketFlags::default();
    flags.set_bound(true);
    flags.mark_connected();

    let seed = {
        let inner = listener.lock();
        SocketSeed {
            flags,
            options: inner.options,
            values: inner.values,
            local_addr: inner.local_addr.clone(),
            peer_addr: Some(accepted.peer),
        }
    };

    SocketObject::assemble(
        Arc::clone(listener.interface()),
        listener.family(),
        listener.sock_type(),
        listener.protocol(),
        waiter,
        accepted.state,
        seed,
    )
}
