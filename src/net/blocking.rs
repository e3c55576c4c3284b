/*!
 * Blocking Operation Driver
 *
 * The suspension contract shared by send, receive, accept and connect:
 *
 * 1. Try once without marking anything
 * 2. Non-blocking callers get `WouldBlock`
 * 3. Otherwise mark the activity pending (`AlreadyInProgress` if a
 *    blocking call of the same kind already waits on the socket) and park
 *    the task on the socket's wait queue
 * 4. Loop: snapshot the queue, retry, then give up on a pending signal
 *    (`Interrupted`) or an expired timeout (`TimedOut`), else sleep until
 *    the queue moves or the remaining time runs out
 *
 * The object lock is held only around each attempt, never while sleeping,
 * and the activity is released on every exit path.
 */

use super::interface::Attempt;
use super::socket::{SocketInner, SocketObject};
use super::state::Activity;
use crate::core::errors::{SocketError, SocketResult};
use crate::core::time::{self, Clock};
use crate::core::types::Deciseconds;
use crate::signals::{Signal, SignalService, Task};
use tracing::{info, trace};

/// Platform services a blocking call needs
#[derive(Clone, Copy)]
pub struct IoContext<'a> {
    /// The calling task
    pub task: &'a Task,
    pub clock: &'a dyn Clock,
    pub signals: &'a dyn SignalService,
}

impl<'a> IoContext<'a> {
    pub fn new(task: &'a Task, clock: &'a dyn Clock, signals: &'a dyn SignalService) -> Self {
        Self { task, clock, signals }
    }

    /// Raise SIGPIPE against the calling task
    pub(crate) fn raise_sigpipe(&self) {
        info!(pid = self.task.pid(), "broken pipe, raising SIGPIPE");
        self.signals.deliver(self.task.pid(), Signal::SIGPIPE);
    }
}

/// Drive `attempt` to completion under the suspension contract
pub(crate) fn run_blocking<T>(
    socket: &SocketObject,
    activity: Activity,
    ctx: &IoContext<'_>,
    timeout: Deciseconds,
    nonblock: bool,
    mut attempt: impl FnMut(&mut SocketInner) -> SocketResult<Attempt<T>>,
) -> SocketResult<T> {
    let first = attempt(&mut *socket.lock())?;
    if let Attempt::Ready(value) = first {
        return Ok(value);
    }
    if nonblock {
        return Err(SocketError::WouldBlock);
    }

    let start = ctx.clock.now();
    let _activity = socket.begin_activity(activity)?;
    let _park = ctx.task.park_on(socket.waiter());
    trace!(pid = ctx.task.pid(), ?activity, timeout, "task suspended on socket");

    loop {
        let seen = socket.waiter().snapshot();

        let result = attempt(&mut *socket.lock())?;
        if let Attempt::Ready(value) = result {
            return Ok(value);
        }
        if ctx.task.signal_pending() {
            return Err(SocketError::Interrupted);
        }
        if time::has_timed_out(ctx.clock, start, timeout) {
            return Err(SocketError::TimedOut);
        }

        socket
            .waiter()
            .wait_changed(seen, time::remaining(ctx.clock, start, timeout));
    }
}

/// Bookkeeping for a failed data-path call: connection state follows
/// pipe and reset errors, and protocol failures land in `last_error`
pub(crate) fn note_failure(socket: &SocketObject, err: SocketError) {
    let mut inner = socket.lock();
    match err {
        SocketError::BrokenPipe if inner.flags.is_connected() => inner.flags.mark_closed(),
        SocketError::ConnectionReset => inner.flags.mark_reset(),
        _ => {}
    }
    if !err.is_wait_outcome() {
        inner.last_error = Some(err);
    }
}
