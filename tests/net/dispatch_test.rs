/*!
 * Send Path Ordering Tests
 * Each check fires in order and stops the call before the transport sees it
 */

use crate::support::{harness, inet, SCRIPTED_MAX_DGRAM};
use ai_os_net::net::{AddressFamily, Attempt, MsgFlags, OptionValue, SocketOption, SocketType, SOL_SOCKET};
use ai_os_net::signals::Signal;
use ai_os_net::{SocketError, Task};
use pretty_assertions::assert_eq;

fn so_error(layer: &ai_os_net::SocketLayer, fd: u32) -> OptionValue {
    layer
        .getsockopt(fd, SOL_SOCKET, SocketOption::Error.code())
        .unwrap()
}

#[test]
fn test_unconnected_stream_is_not_connected_even_with_destination() {
    let h = harness();
    let task = Task::new(10);
    let fd = h.layer.socket(AddressFamily::Inet, SocketType::Stream, 0).unwrap();

    assert_eq!(
        h.layer.send(&task, fd, b"data", MsgFlags::empty()),
        Err(SocketError::NotConnected)
    );
    assert_eq!(
        h.layer
            .sendto(&task, fd, b"data", MsgFlags::empty(), Some(&inet(80))),
        Err(SocketError::NotConnected)
    );
    assert_eq!(h.iface.sends(), 0);
    assert_eq!(so_error(&h.layer, fd), OptionValue::Int(0));
}

#[test]
fn test_unconnected_datagram_requires_destination() {
    let h = harness();
    let task = Task::new(10);
    let fd = h.layer.socket(AddressFamily::Inet, SocketType::Dgram, 0).unwrap();

    assert_eq!(
        h.layer.send(&task, fd, b"data", MsgFlags::empty()),
        Err(SocketError::DestinationRequired)
    );
    assert_eq!(h.iface.sends(), 0);
}

#[test]
fn test_connected_datagram_rejects_destination() {
    let h = harness();
    let task = Task::new(10);
    let fd = h.layer.socket(AddressFamily::Inet, SocketType::Dgram, 0).unwrap();
    h.layer.connect(&task, fd, &inet(53)).unwrap();

    assert_eq!(
        h.layer
            .sendto(&task, fd, b"data", MsgFlags::empty(), Some(&inet(54))),
        Err(SocketError::AlreadyConnected)
    );

    h.iface.script_send(Ok(Attempt::Ready(4)));
    assert_eq!(h.layer.send(&task, fd, b"data", MsgFlags::empty()), Ok(4));
    assert_eq!(h.iface.sends(), 1);
}

#[test]
fn test_unsupported_flag_changes_nothing() {
    let h = harness();
    let task = Task::new(10);
    let fd = h.layer.socket(AddressFamily::Inet, SocketType::Dgram, 0).unwrap();
    let socket = h.layer.resolve(fd).unwrap();
    let before = socket.flags();

    assert_eq!(
        h.layer
            .sendto(&task, fd, b"urgent", MsgFlags::OOB, Some(&inet(9))),
        Err(SocketError::UnsupportedOperation)
    );
    assert_eq!(socket.flags(), before);
    assert_eq!(socket.refcount(), 1);
    assert_eq!(h.iface.sends(), 0);
    assert_eq!(so_error(&h.layer, fd), OptionValue::Int(0));
}

#[test]
fn test_protocol_flags_pass_through_on_stream() {
    let h = harness();
    let task = Task::new(10);
    let fd = h.layer.socket(AddressFamily::Inet, SocketType::Stream, 0).unwrap();
    h.layer.connect(&task, fd, &inet(80)).unwrap();

    h.iface.script_send(Ok(Attempt::Ready(3)));
    assert_eq!(
        h.layer
            .send(&task, fd, b"oob", MsgFlags::OOB | MsgFlags::NOSIGNAL),
        Ok(3)
    );
    assert_eq!(
        h.layer.send(&task, fd, b"x", MsgFlags::PEEK),
        Err(SocketError::UnsupportedOperation)
    );
}

#[test]
fn test_oversized_datagram_is_rejected() {
    let h = harness();
    let task = Task::new(10);
    let fd = h.layer.socket(AddressFamily::Inet, SocketType::Dgram, 0).unwrap();
    let payload = vec![0u8; SCRIPTED_MAX_DGRAM + 1];

    assert_eq!(
        h.layer
            .sendto(&task, fd, &payload, MsgFlags::empty(), Some(&inet(9))),
        Err(SocketError::MessageTooLarge)
    );
    assert_eq!(h.iface.sends(), 0);

    h.iface.script_send(Ok(Attempt::Ready(SCRIPTED_MAX_DGRAM)));
    assert_eq!(
        h.layer
            .sendto(&task, fd, &payload[1..], MsgFlags::empty(), Some(&inet(9))),
        Ok(SCRIPTED_MAX_DGRAM)
    );
}

#[test]
fn test_write_shutdown_raises_sigpipe_unless_nosignal() {
    let h = harness();
    let task = Task::new(42);
    let fd = h.layer.socket(AddressFamily::Inet, SocketType::Stream, 0).unwrap();
    h.layer.connect(&task, fd, &inet(80)).unwrap();
    h.layer.shutdown(fd, ai_os_net::net::Shutdown::Write).unwrap();

    assert_eq!(
        h.layer.send(&task, fd, b"late", MsgFlags::empty()),
        Err(SocketError::BrokenPipe)
    );
    assert_eq!(h.signals.delivered(), vec![(42, Signal::SIGPIPE)]);

    assert_eq!(
        h.layer.send(&task, fd, b"late", MsgFlags::NOSIGNAL),
        Err(SocketError::BrokenPipe)
    );
    assert_eq!(h.signals.count(Signal::SIGPIPE), 1);
    assert_eq!(h.iface.sends(), 0);
    assert_eq!(
        so_error(&h.layer, fd),
        OptionValue::Int(SocketError::BrokenPipe.errno())
    );
}

#[test]
fn test_transport_broken_pipe_closes_connection() {
    let h = harness();
    let task = Task::new(7);
    let fd = h.layer.socket(AddressFamily::Inet, SocketType::Stream, 0).unwrap();
    h.layer.connect(&task, fd, &inet(80)).unwrap();

    h.iface.script_send(Err(SocketError::BrokenPipe));
    assert_eq!(
        h.layer.send(&task, fd, b"data", MsgFlags::empty()),
        Err(SocketError::BrokenPipe)
    );
    let flags = h.layer.resolve(fd).unwrap().flags();
    assert!(!flags.is_connected());
    assert!(flags.is_closed());
    assert_eq!(h.signals.count(Signal::SIGPIPE), 1);

    // A closed stream fails before reaching the transport again
    assert_eq!(
        h.layer.send(&task, fd, b"data", MsgFlags::NOSIGNAL),
        Err(SocketError::BrokenPipe)
    );
    assert_eq!(h.iface.sends(), 1);
}

#[test]
fn test_connection_reset_is_recorded_once() {
    let h = harness();
    let task = Task::new(7);
    let fd = h.layer.socket(AddressFamily::Inet, SocketType::Stream, 0).unwrap();
    h.layer.connect(&task, fd, &inet(80)).unwrap();

    h.iface.script_send(Err(SocketError::ConnectionReset));
    assert_eq!(
        h.layer.send(&task, fd, b"data", MsgFlags::empty()),
        Err(SocketError::ConnectionReset)
    );
    assert_eq!(
        h.layer.resolve(fd).unwrap().flags().connection(),
        ai_os_net::net::Connection::Reset
    );
    assert_eq!(
        so_error(&h.layer, fd),
        OptionValue::Int(SocketError::ConnectionReset.errno())
    );
    assert_eq!(so_error(&h.layer, fd), OptionValue::Int(0));
}

#[test]
fn test_nonblocking_send_would_block_and_stays_idle() {
    let h = harness();
    let task = Task::new(7);
    let fd = h.layer.socket(AddressFamily::Inet, SocketType::Dgram, 0).unwrap();
    h.layer.set_nonblocking(fd, true).unwrap();

    assert_eq!(
        h.layer
            .sendto(&task, fd, b"data", MsgFlags::empty(), Some(&inet(9))),
        Err(SocketError::WouldBlock)
    );
    let socket = h.layer.resolve(fd).unwrap();
    assert_eq!(socket.activity(), ai_os_net::net::Activity::Idle);
    assert_eq!(so_error(&h.layer, fd), OptionValue::Int(0));
}

#[test]
fn test_dontwait_applies_to_one_call() {
    let h = harness();
    let task = Task::new(7);
    let fd = h.layer.socket(AddressFamily::Inet, SocketType::Dgram, 0).unwrap();

    assert_eq!(
        h.layer
            .sendto(&task, fd, b"data", MsgFlags::DONTWAIT, Some(&inet(9))),
        Err(SocketError::WouldBlock)
    );
    assert!(!h.layer.is_nonblocking(fd).unwrap());
}

#[test]
fn test_nonblocking_connect_reports_in_progress() {
    let h = harness();
    let task = Task::new(7);
    let fd = h.layer.socket(AddressFamily::Inet, SocketType::Stream, 0).unwrap();
    h.layer.set_nonblocking(fd, true).unwrap();
    h.iface
        .connect_pending
        .store(true, std::sync::atomic::Ordering::SeqCst);

    assert_eq!(h.layer.connect(&task, fd, &inet(80)), Err(SocketError::InProgress));
    assert!(!h.layer.resolve(fd).unwrap().flags().is_connected());
}

#[test]
fn test_unregistered_family_allocates_nothing() {
    let h = harness();
    assert_eq!(
        h.layer.socket(AddressFamily::Inet6, SocketType::Stream, 0),
        Err(SocketError::AddressFamilyNotSupported)
    );
    assert_eq!(
        h.layer.socket(AddressFamily::Inet, SocketType::Raw, 0),
        Err(SocketError::AddressFamilyNotSupported)
    );
    assert!(h.layer.open_descriptors().is_empty());
}
