/*!
 * Local Datagram Transport
 *
 * Every datagram socket owns a bounded inbox. Senders deliver whole
 * messages into the receiver's inbox and register on it when it is full.
 */

use super::notify_watchers;
use crate::core::sync::WaitQueue;
use crate::net::addr::SockAddr;
use crate::net::interface::{Attempt, Received};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

struct Datagram {
    data: Vec<u8>,
    from: SockAddr,
}

/// Bounded message queue of one datagram socket
pub(super) struct Inbox {
    inner: Mutex<InboxInner>,
}

struct InboxInner {
    queue: VecDeque<Datagram>,
    /// Payload bytes queued
    queued: usize,
    capacity: usize,
    readers: Vec<Weak<WaitQueue>>,
    /// Senders waiting for room, woken once then dropped
    writers: Vec<Weak<WaitQueue>>,
}

impl Inbox {
    pub(super) fn new(capacity: usize, waiter: Weak<WaitQueue>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(InboxInner {
                queue: VecDeque::new(),
                queued: 0,
                capacity,
                readers: vec![waiter],
                writers: Vec::new(),
            }),
        })
    }

    pub(super) fn attach(&self, waiter: Weak<WaitQueue>) {
        self.inner.lock().readers.push(waiter);
    }

    /// Queue one message, or register `sender` to hear about free space
    pub(super) fn deliver(&self, data: &[u8], from: SockAddr, sender: &Weak<WaitQueue>) -> Attempt<usize> {
        let mut inner = self.inner.lock();
        if inner.queued + data.len() > inner.capacity {
            inner.writers.push(sender.clone());
            return Attempt::Blocked;
        }

        inner.queued += data.len();
        inner.queue.push_back(Datagram {
            data: data.to_vec(),
            from,
        });
        notify_watchers(&mut inner.readers);
        Attempt::Ready(data.len())
    }

    /// Take the oldest message; bytes past `buf.len()` are discarded
    pub(super) fn take(&self, buf: &mut [u8], peek: bool) -> Attempt<Received> {
        let mut inner = self.inner.lock();

        let Some(front) = inner.queue.front() else {
            return Attempt::Blocked;
        };
        let len = front.data.len().min(buf.len());
        buf[..len].copy_from_slice(&front.data[..len]);
        let from = Some(front.from.clone());

        if !peek {
            if let Some(msg) = inner.queue.pop_front() {
                inner.queued -= msg.data.len();
            }
            let mut writers = std::mem::take(&mut inner.writers);
            notify_watchers(&mut writers);
        }
        Attempt::Ready(Received { len, from })
    }

    pub(super) fn is_readable(&self) -> bool {
        !self.inner.lock().queue.is_empty()
    }
}
