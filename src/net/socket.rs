/*!
 * Socket Object
 *
 * The reference-counted endpoint record shared by every descriptor that
 * names it. Identity (family, type, protocol, interface) is fixed at
 * creation; everything mutable lives behind one per-object mutex.
 *
 * ## Lifecycle
 *
 * - Created with one reference (the descriptor that will hold it)
 * - `try_add_ref` for every extra descriptor or in-flight operation
 * - `release` drops one reference; the caller that takes the count to zero
 *   tears the protocol state down, exactly once
 *
 * The `Arc` only keeps the memory alive. Whether the socket is live is
 * decided by the reference count under the object mutex.
 */

use super::addr::{AddressFamily, SockAddr, SocketType};
use super::interface::{ProtocolState, SocketInterface};
use super::options::{OptionMask, OptionValues};
use super::state::{Activity, SocketFlags};
use crate::core::errors::{SocketError, SocketResult};
use crate::core::sync::WaitQueue;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, error};

/// Mutable part of a socket object
#[derive(Debug)]
pub(crate) struct SocketInner {
    pub(crate) flags: SocketFlags,
    pub(crate) options: OptionMask,
    pub(crate) values: OptionValues,
    pub(crate) last_error: Option<SocketError>,
    pub(crate) read_shut: bool,
    pub(crate) write_shut: bool,
    pub(crate) crefs: usize,
    pub(crate) waits: PendingWaits,
    pub(crate) proto: Option<ProtocolState>,
    pub(crate) local_addr: Option<SockAddr>,
    pub(crate) peer_addr: Option<SockAddr>,
}

impl SocketInner {
    /// Protocol state of a live socket
    pub(crate) fn proto_mut(&mut self) -> SocketResult<&mut ProtocolState> {
        self.proto.as_mut().ok_or(SocketError::NotASocket)
    }

    pub(crate) fn proto(&self) -> SocketResult<&ProtocolState> {
        self.proto.as_ref().ok_or(SocketError::NotASocket)
    }
}

/// Blocking operations parked on an object, at most one per kind
///
/// A send and a receive may wait side by side on a full-duplex socket;
/// two of the same kind may not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PendingWaits {
    accept: bool,
    recv: bool,
    send: bool,
}

impl PendingWaits {
    fn slot(&mut self, activity: Activity) -> Option<&mut bool> {
        match activity {
            Activity::Idle => None,
            Activity::Accept => Some(&mut self.accept),
            Activity::Recv => Some(&mut self.recv),
            Activity::Send => Some(&mut self.send),
        }
    }

    /// Claim the slot for `activity`; false if it is already taken
    pub(crate) fn claim(&mut self, activity: Activity) -> bool {
        match self.slot(activity) {
            Some(pending) if *pending => false,
            Some(pending) => {
                *pending = true;
                true
            }
            None => true,
        }
    }

    pub(crate) fn clear(&mut self, activity: Activity) {
        if let Some(pending) = self.slot(activity) {
            *pending = false;
        }
    }

    /// Activity to report while these waits remain
    pub(crate) fn reported(self) -> Activity {
        if self.send {
            Activity::Send
        } else if self.recv {
            Activity::Recv
        } else if self.accept {
            Activity::Accept
        } else {
            Activity::Idle
        }
    }
}

/// Values a new object starts from
#[derive(Debug, Clone, Default)]
pub(crate) struct SocketSeed {
    pub(crate) flags: SocketFlags,
    pub(crate) options: OptionMask,
    pub(crate) values: OptionValues,
    pub(crate) local_addr: Option<SockAddr>,
    pub(crate) peer_addr: Option<SockAddr>,
}

/// Kernel socket endpoint
pub struct SocketObject {
    family: AddressFamily,
    sock_type: SocketType,
    protocol: u32,
    interface: Arc<dyn SocketInterface>,
    waiter: Arc<WaitQueue>,
    inner: Mutex<SocketInner>,
}

impl SocketObject {
    /// Create a socket through `interface` with one reference held
    pub fn open(
        interface: Arc<dyn SocketInterface>,
        family: AddressFamily,
        sock_type: SocketType,
        protocol: u32,
        values: OptionValues,
    ) -> SocketResult<Arc<Self>> {
        let waiter = Arc::new(WaitQueue::new());
        let proto = interface.setup(sock_type, protocol, &waiter)?;
        let seed = SocketSeed {
            values,
            ..SocketSeed::default()
        };
        Ok(Self::assemble(interface, family, sock_type, protocol, waiter, proto, seed))
    }

    /// Wrap already-built protocol state in a fresh object (clone and accept)
    pub(crate) fn assemble(
        interface: Arc<dyn SocketInterface>,
        family: AddressFamily,
        sock_type: SocketType,
        protocol: u32,
        waiter: Arc<WaitQueue>,
        proto: ProtocolState,
        seed: SocketSeed,
    ) -> Arc<Self> {
        Arc::new(Self {
            family,
            sock_type,
            protocol,
            interface,
            waiter,
            inner: Mutex::new(SocketInner {
                flags: seed.flags.with_activity(Activity::Idle),
                options: seed.options,
                values: seed.values,
                last_error: None,
                read_shut: false,
                write_shut: false,
                crefs: 1,
                waits: PendingWaits::default(),
                proto: Some(proto),
                local_addr: seed.local_addr,
                peer_addr: seed.peer_addr,
            }),
        })
    }

    #[inline]
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    #[inline]
    pub fn sock_type(&self) -> SocketType {
        self.sock_type
    }

    #[inline]
    pub fn protocol(&self) -> u32 {
        self.protocol
    }

    #[inline]
    pub fn interface(&self) -> &Arc<dyn SocketInterface> {
        &self.interface
    }

    /// Queue the protocol notifies on progress
    #[inline]
    pub fn waiter(&self) -> &Arc<WaitQueue> {
        &self.waiter
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SocketInner> {
        self.inner.lock()
    }

    /// Snapshot of the state word
    pub fn flags(&self) -> SocketFlags {
        self.inner.lock().flags
    }

    pub fn options(&self) -> OptionMask {
        self.inner.lock().options
    }

    pub fn option_values(&self) -> OptionValues {
        self.inner.lock().values
    }

    pub fn activity(&self) -> Activity {
        self.inner.lock().flags.activity()
    }

    pub fn refcount(&self) -> usize {
        self.inner.lock().crefs
    }

    /// True once the last reference is gone
    pub fn is_torn_down(&self) -> bool {
        self.inner.lock().crefs == 0
    }

    pub fn local_addr(&self) -> Option<SockAddr> {
        self.inner.lock().local_addr.clone()
    }

    pub fn peer_addr(&self) -> Option<SockAddr> {
        self.inner.lock().peer_addr.clone()
    }

    /// Take another reference; fails once the object is torn down
    pub fn try_add_ref(&self) -> SocketResult<()> {
        let mut inner = self.inner.lock();
        if inner.crefs == 0 {
            return Err(SocketError::NotASocket);
        }
        inner.crefs += 1;
        Ok(())
    }

    /// Drop one reference, tearing down on the last one
    ///
    /// Returns true for the caller that performed teardown.
    ///
    /// # Panics
    ///
    /// Releasing an object whose count is already zero is a double free.
    pub fn release(&self) -> bool {
        let proto = {
            let mut inner = self.inner.lock();
            if inner.crefs == 0 {
                error!(family = %self.family, "socket released with no references");
                panic!("socket object double release");
            }
            inner.crefs -= 1;
            if inner.crefs > 0 {
                return false;
            }
            inner.flags.set_activity(Activity::Idle);
            inner.proto.take()
        };

        if let Some(proto) = proto {
            self.interface.close(proto);
        }
        self.waiter.notify_all();
        debug!(family = %self.family, iface = self.interface.name(), "socket torn down");
        true
    }

    /// Read and clear the pending error
    pub fn take_error(&self) -> Option<SocketError> {
        self.inner.lock().last_error.take()
    }

    /// Record an asynchronous error for `SO_ERROR`
    pub fn record_error(&self, err: SocketError) {
        self.inner.lock().last_error = Some(err);
    }

    /// Mark `activity` pending until the guard drops
    ///
    /// Fails with `AlreadyInProgress` if a blocking operation of the same
    /// kind is already in flight on this object. The reported activity is
    /// the one most recently begun.
    pub fn begin_activity(&self, activity: Activity) -> SocketResult<ActivityGuard<'_>> {
        let mut inner = self.inner.lock();
        if inner.crefs == 0 {
            return Err(SocketError::NotASocket);
        }
        if !inner.waits.claim(activity) {
            return Err(SocketError::AlreadyInProgress);
        }
        inner.flags.set_activity(activity);
        Ok(ActivityGuard {
            socket: self,
            activity,
        })
    }
}

impl fmt::Debug for SocketObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SocketObject")
            .field("family", &self.family)
            .field("type", &self.sock_type)
            .field("iface", &self.interface.name())
            .field("flags", &inner.flags)
            .field("options", &inner.options)
            .field("crefs", &inner.crefs)
            .finish()
    }
}

/// Releases the activity on drop, whatever path the operation took
#[must_use = "the activity resets as soon as the guard is dropped"]
pub struct ActivityGuard<'a> {
    socket: &'a SocketObject,
    activity: Activity,
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.socket.inner.lock();
        inner.waits.clear(self.activity);
        let reported = if inner.crefs == 0 {
            Activity::Idle
        } else {
            inner.waits.reported()
        };
        inner.flags.set_activity(reported);
    }
}

/// Counted reference held for the duration of an operation
///
/// Keeps the socket live while a task is blocked in it, even if every
/// descriptor naming it is closed meanwhile.
pub struct SocketRef {
    socket: Arc<SocketObject>,
}

impl SocketRef {
    pub fn acquire(socket: &Arc<SocketObject>) -> SocketResult<Self> {
        socket.try_add_ref()?;
        Ok(Self {
            socket: Arc::clone(socket),
        })
    }

    pub fn object(&self) -> &Arc<SocketObject> {
        &self.socket
    }
}

impl Deref for SocketRef {
    type Target = SocketObject;

    fn deref(&self) -> &SocketObject {
        &self.socket
    }
}

impl Drop for SocketRef {
    fn drop(&mut self) {
        self.socket.release();
    }
}
