/*!
 * Socket Descriptor Table
 * Lock-free descriptor-to-socket mapping using epoch-based reclamation
 *
 * Each slot is empty, reserved (allocated but not yet attached to a socket),
 * or bound to a socket object plus per-descriptor flags. Slots change state
 * only by compare-and-swap, so a descriptor value is never handed to two
 * owners at once.
 */

use super::flags::DescriptorFlags;
use super::socket::SocketObject;
use crate::core::errors::{SocketError, SocketResult};
use crate::core::types::SockFd;
use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, trace};

/// Slot contents; `socket: None` marks a reservation
struct SlotEntry {
    socket: Option<Arc<SocketObject>>,
    flags: DescriptorFlags,
}

impl SlotEntry {
    fn reserved() -> Self {
        Self {
            socket: None,
            flags: DescriptorFlags::empty(),
        }
    }
}

/// Lock-free socket descriptor table
///
/// # Performance
///
/// - **Resolve**: Wait-free, one atomic load under an epoch pin
/// - **Allocate**: First-fit CAS scan from the requested minimum
/// - **Memory reclamation**: Deferred via epochs
pub struct DescriptorTable {
    entries: Vec<Atomic<SlotEntry>>,
    size: AtomicUsize,
}

impl DescriptorTable {
    /// Create a table with `capacity` descriptor slots
    pub fn with_capacity(capacity: usize) -> Self {
        let mut entries = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            entries.push(Atomic::null());
        }

        Self {
            entries,
            size: AtomicUsize::new(0),
        }
    }

    /// Reserve the smallest free descriptor >= `min`
    pub fn allocate(&self, min: SockFd) -> SocketResult<SockFd> {
        let guard = epoch::pin();
        let mut reservation = Owned::new(SlotEntry::reserved());

        for fd in (min as usize)..self.entries.len() {
            match self.entries[fd].compare_exchange(
                Shared::null(),
                reservation,
                Ordering::AcqRel,
                Ordering::Acquire,
                &guard,
            ) {
                Ok(_) => {
                    self.size.fetch_add(1, Ordering::Relaxed);
                    trace!(sockfd = fd, "descriptor reserved");
                    return Ok(fd as SockFd);
                }
                Err(e) => reservation = e.new,
            }
        }

        Err(SocketError::OutOfDescriptors)
    }

    /// Attach a socket to a reserved descriptor
    ///
    /// # Panics
    ///
    /// The slot must hold the caller's reservation.
    pub fn install(&self, fd: SockFd, socket: Arc<SocketObject>, flags: DescriptorFlags) {
        let guard = epoch::pin();
        let slot = &self.entries[fd as usize];
        let current = slot.load(Ordering::Acquire, &guard);

        if !is_reserved(current) {
            error!(sockfd = fd, "install on a descriptor that is not reserved");
            panic!("descriptor table corrupted: install without reservation");
        }

        let entry = Owned::new(SlotEntry {
            socket: Some(socket),
            flags,
        });
        let old = slot.swap(entry, Ordering::AcqRel, &guard);
        unsafe {
            guard.defer_destroy(old);
        }
        trace!(sockfd = fd, "descriptor installed");
    }

    /// Give back a reservation that was never installed
    pub fn cancel(&self, fd: SockFd) {
        let guard = epoch::pin();
        let slot = &self.entries[fd as usize];
        let current = slot.load(Ordering::Acquire, &guard);
        if !is_reserved(current) {
            error!(sockfd = fd, "cancel on a descriptor that is not reserved");
            panic!("descriptor table corrupted: cancel without reservation");
        }
        self.vacate(slot, current, &guard);
    }

    /// Reserve and install in one step
    pub fn insert(
        &self,
        min: SockFd,
        socket: Arc<SocketObject>,
        flags: DescriptorFlags,
    ) -> SocketResult<SockFd> {
        let fd = self.allocate(min)?;
        self.install(fd, socket, flags);
        Ok(fd)
    }

    /// Socket a descriptor refers to (wait-free)
    ///
    /// # Performance
    /// This is the hot path of every socket call
    #[inline]
    pub fn resolve(&self, fd: SockFd) -> SocketResult<Arc<SocketObject>> {
        self.resolve_with_flags(fd).map(|(socket, _)| socket)
    }

    /// Socket and descriptor flags (wait-free)
    pub fn resolve_with_flags(&self, fd: SockFd) -> SocketResult<(Arc<SocketObject>, DescriptorFlags)> {
        let slot = self
            .entries
            .get(fd as usize)
            .ok_or(SocketError::NotASocket)?;

        let guard = epoch::pin();
        let entry_ptr = slot.load(Ordering::Acquire, &guard);

        // Safe to dereference - epoch ensures it won't be freed
        let entry = unsafe { entry_ptr.as_ref() }.ok_or(SocketError::NotASocket)?;
        match &entry.socket {
            Some(socket) => Ok((Arc::clone(socket), entry.flags)),
            None => Err(SocketError::NotASocket),
        }
    }

    /// Replace the per-descriptor flags
    pub fn set_flags(&self, fd: SockFd, flags: DescriptorFlags) -> SocketResult<()> {
        let slot = self
            .entries
            .get(fd as usize)
            .ok_or(SocketError::NotASocket)?;
        let guard = epoch::pin();

        loop {
            let current_ptr = slot.load(Ordering::Acquire, &guard);
            let socket = match unsafe { current_ptr.as_ref() } {
                Some(SlotEntry {
                    socket: Some(socket),
                    ..
                }) => Arc::clone(socket),
                _ => return Err(SocketError::NotASocket),
            };

            let entry = Owned::new(SlotEntry {
                socket: Some(socket),
                flags,
            });
            match slot.compare_exchange(current_ptr, entry, Ordering::AcqRel, Ordering::Acquire, &guard) {
                Ok(old) => {
                    unsafe {
                        guard.defer_destroy(old);
                    }
                    return Ok(());
                }
                // Raced with release or another flag update; re-read
                Err(_) => continue,
            }
        }
    }

    /// Remove a descriptor and drop its reference to the socket
    ///
    /// Tears the socket down when this was the last reference.
    pub fn release(&self, fd: SockFd) -> SocketResult<()> {
        let socket = self.detach(fd)?;
        trace!(sockfd = fd, "descriptor released");
        socket.release();
        Ok(())
    }

    /// Remove a descriptor, handing its socket reference to the caller
    pub fn detach(&self, fd: SockFd) -> SocketResult<Arc<SocketObject>> {
        let slot = self
            .entries
            .get(fd as usize)
            .ok_or(SocketError::NotASocket)?;
        let guard = epoch::pin();

        loop {
            let current = slot.load(Ordering::Acquire, &guard);
            let socket = match unsafe { current.as_ref() } {
                Some(SlotEntry {
                    socket: Some(socket),
                    ..
                }) => Arc::clone(socket),
                _ => return Err(SocketError::NotASocket),
            };

            // Only the caller that wins the swap owns the reference; a lost
            // race with a flag update re-reads, a lost race with another
            // release finds the slot empty
            if slot
                .compare_exchange(current, Shared::null(), Ordering::AcqRel, Ordering::Acquire, &guard)
                .is_ok()
            {
                self.size.fetch_sub(1, Ordering::Relaxed);
                unsafe {
                    guard.defer_destroy(current);
                }
                return Ok(socket);
            }
        }
    }

    /// Drop a reference held without a descriptor
    pub fn release_object(&self, socket: &SocketObject) -> bool {
        socket.release()
    }

    /// Second descriptor >= `min` naming the same socket (refcount + 1)
    pub fn share(&self, fd: SockFd, min: SockFd) -> SocketResult<SockFd> {
        let socket = self.resolve(fd)?;
        socket.try_add_ref()?;
        match self.insert(min, Arc::clone(&socket), DescriptorFlags::empty()) {
            Ok(newfd) => Ok(newfd),
            Err(err) => {
                socket.release();
                Err(err)
            }
        }
    }

    /// Put `socket` at exactly `fd`, returning whatever socket was there
    ///
    /// Fails with `AlreadyInProgress` while another caller holds a
    /// reservation on `fd`.
    pub fn install_at(
        &self,
        fd: SockFd,
        socket: Arc<SocketObject>,
        flags: DescriptorFlags,
    ) -> SocketResult<Option<Arc<SocketObject>>> {
        let slot = self
            .entries
            .get(fd as usize)
            .ok_or(SocketError::InvalidArgument)?;
        let guard = epoch::pin();
        let mut entry = Owned::new(SlotEntry {
            socket: Some(socket),
            flags,
        });

        loop {
            let current = slot.load(Ordering::Acquire, &guard);
            if is_reserved(current) {
                return Err(SocketError::AlreadyInProgress);
            }
            match slot.compare_exchange(current, entry, Ordering::AcqRel, Ordering::Acquire, &guard) {
                Ok(_) => {
                    let previous = unsafe { current.as_ref() }.and_then(|old| old.socket.clone());
                    if current.is_null() {
                        self.size.fetch_add(1, Ordering::Relaxed);
                    } else {
                        unsafe {
                            guard.defer_destroy(current);
                        }
                    }
                    trace!(sockfd = fd, replaced = previous.is_some(), "descriptor installed at fixed slot");
                    return Ok(previous);
                }
                Err(e) => entry = e.new,
            }
        }
    }

    /// Descriptors currently bound to a socket, ascending
    pub fn live_descriptors(&self) -> Vec<SockFd> {
        let guard = epoch::pin();
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                let entry = slot.load(Ordering::Acquire, &guard);
                matches!(unsafe { entry.as_ref() }, Some(SlotEntry { socket: Some(_), .. }))
            })
            .map(|(fd, _)| fd as SockFd)
            .collect()
    }

    /// Number of occupied slots, reservations included
    #[inline]
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn vacate(&self, slot: &Atomic<SlotEntry>, current: Shared<'_, SlotEntry>, guard: &Guard) {
        if slot
            .compare_exchange(current, Shared::null(), Ordering::AcqRel, Ordering::Acquire, guard)
            .is_ok()
        {
            self.size.fetch_sub(1, Ordering::Relaxed);
            unsafe {
                guard.defer_destroy(current);
            }
        }
    }
}

impl Drop for DescriptorTable {
    fn drop(&mut self) {
        let guard = epoch::pin();
        for entry in &self.entries {
            let old = entry.swap(Shared::null(), Ordering::AcqRel, &guard);
            if !old.is_null() {
                unsafe {
                    guard.defer_destroy(old);
                }
            }
        }
    }
}

fn is_reserved(ptr: Shared<'_, SlotEntry>) -> bool {
    matches!(unsafe { ptr.as_ref() }, Some(SlotEntry { socket: None, .. }))
}
