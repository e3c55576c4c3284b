/*!
 * Local Stream Transport
 *
 * A connection is one `Channel` with a ring buffer per direction, shared by
 * every socket object holding either end. A `Listener` queues channels that
 * connected clients created until a server accepts them.
 */

use super::notify_watchers;
use crate::core::errors::{SocketError, SocketResult};
use crate::core::sync::WaitQueue;
use crate::net::addr::{SockAddr, Shutdown};
use crate::net::flags::PollEvents;
use crate::net::interface::{Attempt, Received};
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tracing::debug;

/// End of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Side {
    Client = 0,
    Server = 1,
}

impl Side {
    #[inline]
    fn index(self) -> usize {
        self as usize
    }

    #[inline]
    fn peer(self) -> Side {
        match self {
            Side::Client => Side::Server,
            Side::Server => Side::Client,
        }
    }
}

/// Bidirectional byte channel
pub(super) struct Channel {
    inner: Mutex<ChannelInner>,
}

struct ChannelInner {
    /// `rx[i]` holds bytes waiting to be read by side `i`
    rx: [HeapRb<u8>; 2],
    /// Socket objects holding each end
    open: [usize; 2],
    write_shut: [bool; 2],
    read_shut: [bool; 2],
    reset: bool,
    watchers: [Vec<Weak<WaitQueue>>; 2],
}

impl ChannelInner {
    fn peer_gone(&self, side: Side) -> bool {
        self.open[side.peer().index()] == 0
    }

    fn wake(&mut self, side: Side) {
        notify_watchers(&mut self.watchers[side.index()]);
    }

    fn wake_all(&mut self) {
        self.wake(Side::Client);
        self.wake(Side::Server);
    }
}

impl Channel {
    /// New connection with one holder per end; the server end belongs to
    /// the listener queue until accepted
    pub(super) fn new(capacity: usize, client_waiter: Weak<WaitQueue>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(ChannelInner {
                rx: [HeapRb::new(capacity), HeapRb::new(capacity)],
                open: [1, 1],
                write_shut: [false; 2],
                read_shut: [false; 2],
                reset: false,
                watchers: [vec![client_waiter], Vec::new()],
            }),
        })
    }

    /// Register another wait queue for `side` without taking a hold
    pub(super) fn attach(&self, side: Side, waiter: Weak<WaitQueue>) {
        self.inner.lock().watchers[side.index()].push(waiter);
    }

    /// Take another hold on `side` for a duplicated socket
    pub(super) fn open_end(&self, side: Side, waiter: Weak<WaitQueue>) {
        let mut inner = self.inner.lock();
        inner.open[side.index()] += 1;
        inner.watchers[side.index()].push(waiter);
    }

    /// Drop one hold on `side`; the peer sees end-of-stream once none remain
    pub(super) fn close_end(&self, side: Side) {
        let mut inner = self.inner.lock();
        debug_assert!(inner.open[side.index()] > 0, "channel end closed twice");
        inner.open[side.index()] = inner.open[side.index()].saturating_sub(1);
        if inner.open[side.index()] == 0 {
            debug!(?side, "local connection end closed");
            inner.wake_all();
        }
    }

    /// Abort the connection
    pub(super) fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.reset = true;
        inner.wake_all();
    }

    pub(super) fn send(&self, side: Side, buf: &[u8]) -> SocketResult<Attempt<usize>> {
        let mut inner = self.inner.lock();
        if inner.reset {
            return Err(SocketError::ConnectionReset);
        }
        let peer = side.peer();
        if inner.write_shut[side.index()] || inner.peer_gone(side) || inner.read_shut[peer.index()] {
            return Err(SocketError::BrokenPipe);
        }
        if buf.is_empty() {
            return Ok(Attempt::Ready(0));
        }

        let rb = &mut inner.rx[peer.index()];
        if rb.vacant_len() == 0 {
            return Ok(Attempt::Blocked);
        }
        let written = rb.push_slice(buf);
        inner.wake(peer);
        Ok(Attempt::Ready(written))
    }

    pub(super) fn recv(&self, side: Side, buf: &mut [u8], peek: bool) -> SocketResult<Attempt<Received>> {
        let mut inner = self.inner.lock();
        if inner.reset {
            return Err(SocketError::ConnectionReset);
        }

        let rb = &mut inner.rx[side.index()];
        if !rb.is_empty() {
            let len = if peek {
                let mut copied = 0;
                for (dst, src) in buf.iter_mut().zip(rb.iter()) {
                    *dst = *src;
                    copied += 1;
                }
                copied
            } else {
                rb.pop_slice(buf)
            };
            if !peek {
                inner.wake(side.peer());
            }
            return Ok(Attempt::Ready(Received { len, from: None }));
        }

        if buf.is_empty() || inner.peer_gone(side) || inner.write_shut[side.peer().index()] {
            return Ok(Attempt::Ready(Received { len: 0, from: None }));
        }
        Ok(Attempt::Blocked)
    }

    /// True once the peer end is gone or the connection was reset
    pub(super) fn peer_closed(&self, side: Side) -> bool {
        let inner = self.inner.lock();
        inner.reset || inner.peer_gone(side)
    }

    pub(super) fn shutdown(&self, side: Side, how: Shutdown) {
        let mut inner = self.inner.lock();
        if how.covers_read() {
            inner.read_shut[side.index()] = true;
        }
        if how.covers_write() {
            inner.write_shut[side.index()] = true;
        }
        inner.wake_all();
    }

    pub(super) fn poll(&self, side: Side) -> PollEvents {
        let inner = self.inner.lock();
        let peer = side.peer();
        let mut events = PollEvents::empty();

        if inner.reset {
            return PollEvents::ERR | PollEvents::HUP;
        }
        if !inner.rx[side.index()].is_empty() || inner.peer_gone(side) || inner.write_shut[peer.index()] {
            events |= PollEvents::IN;
        }
        if !inner.write_shut[side.index()]
            && !inner.peer_gone(side)
            && !inner.read_shut[peer.index()]
            && inner.rx[peer.index()].vacant_len() > 0
        {
            events |= PollEvents::OUT;
        }
        if inner.peer_gone(side) {
            events |= PollEvents::HUP;
        }
        events
    }
}

struct PendingConnection {
    channel: Arc<Channel>,
    peer: SockAddr,
}

/// Accept queue of a listening local stream socket
pub(super) struct Listener {
    inner: Mutex<ListenerInner>,
}

struct ListenerInner {
    backlog: usize,
    pending: VecDeque<PendingConnection>,
    /// Socket objects sharing this listener
    refs: usize,
    open: bool,
    watchers: Vec<Weak<WaitQueue>>,
}

impl Listener {
    pub(super) fn new(backlog: usize, waiter: Weak<WaitQueue>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(ListenerInner {
                backlog,
                pending: VecDeque::new(),
                refs: 1,
                open: true,
                watchers: vec![waiter],
            }),
        })
    }

    pub(super) fn set_backlog(&self, backlog: usize) {
        self.inner.lock().backlog = backlog;
    }

    /// Another socket object now shares this listener
    pub(super) fn share(&self, waiter: Weak<WaitQueue>) {
        let mut inner = self.inner.lock();
        inner.refs += 1;
        inner.watchers.push(waiter);
    }

    /// Queue a connecting client's channel
    pub(super) fn enqueue(&self, channel: Arc<Channel>, peer: SockAddr) -> SocketResult<()> {
        let mut inner = self.inner.lock();
        if !inner.open || inner.pending.len() >= inner.backlog {
            return Err(SocketError::ConnectionRefused);
        }
        inner.pending.push_back(PendingConnection { channel, peer });
        notify_watchers(&mut inner.watchers);
        Ok(())
    }

    pub(super) fn dequeue(&self) -> SocketResult<Attempt<(Arc<Channel>, SockAddr)>> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(SocketError::InvalidArgument);
        }
        Ok(match inner.pending.pop_front() {
            Some(conn) => Attempt::Ready((conn.channel, conn.peer)),
            None => Attempt::Blocked,
        })
    }

    pub(super) fn has_pending(&self) -> bool {
        !self.inner.lock().pending.is_empty()
    }

    /// Drop one sharer; the last one resets every unaccepted connection
    pub(super) fn release(&self) {
        let pending = {
            let mut inner = self.inner.lock();
            inner.refs = inner.refs.saturating_sub(1);
            if inner.refs > 0 {
                return;
            }
            inner.open = false;
            std::mem::take(&mut inner.pending)
        };

        if !pending.is_empty() {
            debug!(count = pending.len(), "resetting unaccepted local connections");
        }
        for conn in pending {
            conn.channel.reset();
        }
    }
}
