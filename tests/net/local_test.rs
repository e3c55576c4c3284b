/*!
 * Local Family Tests
 * Stream and datagram traffic through the socket layer
 */

use crate::support::harness;
use ai_os_net::net::{AddressFamily, DescriptorFlags, MsgFlags, OptionValue, PollEvents, SockAddr, Shutdown, SocketOption, SocketType, SOL_SOCKET};
use ai_os_net::signals::Signal;
use ai_os_net::{SocketError, SocketLayer, Task};
use pretty_assertions::assert_eq;

/// Connected (client, server) pair plus the listener
fn stream_pair(layer: &SocketLayer, path: &str) -> (u32, u32, u32) {
    let addr = SockAddr::local(path).unwrap();
    let listener = layer.socket(AddressFamily::Local, SocketType::Stream, 0).unwrap();
    layer.bind(listener, &addr).unwrap();
    layer.listen(listener, 4).unwrap();

    let client = layer.socket(AddressFamily::Local, SocketType::Stream, 0).unwrap();
    layer.connect(&Task::new(2), client, &addr).unwrap();
    let (server, peer) = layer.accept(&Task::new(1), listener).unwrap();
    assert_eq!(peer, SockAddr::Unnamed);
    (client, server, listener)
}

fn read_all(layer: &SocketLayer, fd: u32, task: &Task) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 8];
    loop {
        let n = layer.recv(task, fd, &mut buf, MsgFlags::empty()).unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

#[test]
fn test_stream_round_trip_and_orderly_close() {
    let h = harness();
    let task = Task::new(1);
    let (client, server, listener) = stream_pair(&h.layer, "/tmp/echo.sock");

    assert_eq!(h.layer.send(&task, client, b"hello world", MsgFlags::empty()), Ok(11));
    h.layer.close(client).unwrap();

    assert_eq!(read_all(&h.layer, server, &task), b"hello world".to_vec());
    let flags = h.layer.resolve(server).unwrap().flags();
    assert!(flags.is_closed());
    assert!(!flags.is_connected());

    assert_eq!(
        h.layer
            .getsockopt(listener, SOL_SOCKET, SocketOption::AcceptConn.code())
            .unwrap(),
        OptionValue::Bool(true)
    );
}

#[test]
fn test_half_closed_peer_still_receives() {
    let h = harness();
    let task = Task::new(3);
    let (client, server, _) = stream_pair(&h.layer, "/tmp/half.sock");

    h.layer.send(&task, client, b"request", MsgFlags::empty()).unwrap();
    h.layer.shutdown(client, Shutdown::Write).unwrap();
    assert_eq!(read_all(&h.layer, server, &task), b"request".to_vec());
    assert!(h.layer.resolve(server).unwrap().flags().is_connected());

    assert_eq!(h.layer.send(&task, server, b"reply", MsgFlags::empty()), Ok(5));
    let mut buf = [0u8; 16];
    assert_eq!(h.layer.recv(&task, client, &mut buf, MsgFlags::empty()), Ok(5));
    assert_eq!(&buf[..5], b"reply");
    assert!(h.signals.delivered().is_empty());

    // Once the client is gone the next send is a broken pipe
    h.layer.close(client).unwrap();
    assert_eq!(
        h.layer.send(&task, server, b"late", MsgFlags::NOSIGNAL),
        Err(SocketError::BrokenPipe)
    );
    assert!(h.layer.resolve(server).unwrap().flags().is_closed());
}

#[test]
fn test_addresses_after_connect() {
    let h = harness();
    let (client, server, listener) = stream_pair(&h.layer, "/tmp/names.sock");
    let addr = SockAddr::local("/tmp/names.sock").unwrap();

    assert_eq!(h.layer.peer_addr(client), Ok(addr.clone()));
    assert_eq!(h.layer.local_addr(server), Ok(Some(addr.clone())));
    assert_eq!(h.layer.peer_addr(server), Ok(SockAddr::Unnamed));
    assert_eq!(h.layer.peer_addr(listener), Err(SocketError::NotConnected));
}

#[test]
fn test_send_to_departed_peer_raises_sigpipe() {
    let h = harness();
    let task = Task::new(9);
    let (client, server, _) = stream_pair(&h.layer, "/tmp/gone.sock");
    h.layer.close(server).unwrap();

    assert_eq!(
        h.layer.send(&task, client, b"anyone?", MsgFlags::empty()),
        Err(SocketError::BrokenPipe)
    );
    assert_eq!(h.signals.delivered(), vec![(9, Signal::SIGPIPE)]);

    let mut buf = [0u8; 4];
    assert_eq!(h.layer.recv(&task, client, &mut buf, MsgFlags::empty()), Ok(0));
}

#[test]
fn test_connect_refused_without_listener() {
    let h = harness();
    let task = Task::new(1);
    let fd = h.layer.socket(AddressFamily::Local, SocketType::Stream, 0).unwrap();

    assert_eq!(
        h.layer
            .connect(&task, fd, &SockAddr::local("/tmp/nobody.sock").unwrap()),
        Err(SocketError::ConnectionRefused)
    );
    assert_eq!(
        h.layer
            .getsockopt(fd, SOL_SOCKET, SocketOption::Error.code())
            .unwrap(),
        OptionValue::Int(SocketError::ConnectionRefused.errno())
    );
}

#[test]
fn test_connect_validates_address_family() {
    let h = harness();
    let task = Task::new(1);
    let fd = h.layer.socket(AddressFamily::Local, SocketType::Stream, 0).unwrap();

    assert_eq!(
        h.layer.connect(&task, fd, &crate::support::inet(80)),
        Err(SocketError::AddressFamilyNotSupported)
    );
    assert_eq!(
        h.layer.connect(&task, fd, &SockAddr::Unnamed),
        Err(SocketError::InvalidArgument)
    );
}

#[test]
fn test_bind_rules() {
    let h = harness();
    let addr = SockAddr::local("/tmp/bound.sock").unwrap();
    let a = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();
    let b = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();

    h.layer.bind(a, &addr).unwrap();
    assert_eq!(h.layer.bind(a, &SockAddr::local("/tmp/other.sock").unwrap()), Err(SocketError::InvalidArgument));
    assert_eq!(h.layer.bind(b, &addr), Err(SocketError::AddressInUse));

    // Closing the owner frees the path
    h.layer.close(a).unwrap();
    assert_eq!(h.layer.bind(b, &addr), Ok(()));
}

#[test]
fn test_listen_needs_connection_type() {
    let h = harness();
    let dgram = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();
    assert_eq!(h.layer.listen(dgram, 1), Err(SocketError::UnsupportedOperation));

    let unbound = h.layer.socket(AddressFamily::Local, SocketType::Stream, 0).unwrap();
    assert_eq!(h.layer.listen(unbound, 1), Err(SocketError::InvalidArgument));
    assert_eq!(
        h.layer.accept(&Task::new(1), unbound).err(),
        Some(SocketError::InvalidArgument)
    );
}

#[test]
fn test_datagram_sender_address_and_peek() {
    let h = harness();
    let task = Task::new(1);
    let a_addr = SockAddr::local("/tmp/dgram-a.sock").unwrap();
    let b_addr = SockAddr::local("/tmp/dgram-b.sock").unwrap();
    let a = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();
    let b = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();
    h.layer.bind(a, &a_addr).unwrap();
    h.layer.bind(b, &b_addr).unwrap();

    h.layer.sendto(&task, a, b"one", MsgFlags::empty(), Some(&b_addr)).unwrap();
    h.layer.sendto(&task, a, b"two", MsgFlags::empty(), Some(&b_addr)).unwrap();
    assert!(h.layer.poll(b).unwrap().contains(PollEvents::IN));

    let mut buf = [0u8; 8];
    assert_eq!(
        h.layer.recvfrom(&task, b, &mut buf, MsgFlags::PEEK),
        Ok((3, Some(a_addr.clone())))
    );
    assert_eq!(h.layer.recvfrom(&task, b, &mut buf, MsgFlags::empty()), Ok((3, Some(a_addr))));
    assert_eq!(&buf[..3], b"one");
    assert_eq!(h.layer.recv(&task, b, &mut buf, MsgFlags::empty()), Ok(3));
    assert_eq!(&buf[..3], b"two");
    assert!(!h.layer.poll(b).unwrap().contains(PollEvents::IN));
}

#[test]
fn test_connected_datagram_peer() {
    let h = harness();
    let task = Task::new(1);
    let b_addr = SockAddr::local("/tmp/dgram-peer.sock").unwrap();
    let a = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();
    let b = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();
    h.layer.bind(b, &b_addr).unwrap();
    h.layer.connect(&task, a, &b_addr).unwrap();

    assert_eq!(h.layer.send(&task, a, b"hi", MsgFlags::empty()), Ok(2));
    assert_eq!(
        h.layer.sendto(&task, a, b"hi", MsgFlags::empty(), Some(&b_addr)),
        Err(SocketError::AlreadyConnected)
    );

    let mut buf = [0u8; 8];
    assert_eq!(h.layer.recvfrom(&task, b, &mut buf, MsgFlags::empty()), Ok((2, Some(SockAddr::Unnamed))));
}

#[test]
fn test_connected_stream_ignores_destination() {
    let h = harness();
    let task = Task::new(1);
    let (client, server, _) = stream_pair(&h.layer, "/tmp/ignore.sock");
    let elsewhere = SockAddr::local("/tmp/elsewhere.sock").unwrap();

    assert_eq!(h.layer.sendto(&task, client, b"abc", MsgFlags::empty(), Some(&elsewhere)), Ok(3));
    let mut buf = [0u8; 8];
    assert_eq!(h.layer.recv(&task, server, &mut buf, MsgFlags::empty()), Ok(3));
}

#[test]
fn test_dup_shares_the_connection() {
    let h = harness();
    let task = Task::new(1);
    let (client, server, _) = stream_pair(&h.layer, "/tmp/dup.sock");

    let copy = h.layer.dup(client).unwrap();
    assert_ne!(copy, client);
    h.layer.close(client).unwrap();

    assert_eq!(h.layer.send(&task, copy, b"via dup", MsgFlags::empty()), Ok(7));
    h.layer.close(copy).unwrap();
    assert_eq!(read_all(&h.layer, server, &task), b"via dup".to_vec());
}

#[test]
fn test_dup2_replaces_target() {
    let h = harness();
    let a = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();
    let b = h.layer.socket(AddressFamily::Local, SocketType::Stream, 0).unwrap();
    let old = h.layer.resolve(b).unwrap();

    assert_eq!(h.layer.dup2(a, b), Ok(b));
    assert!(old.is_torn_down());
    assert_eq!(h.layer.resolve(b).unwrap().sock_type(), SocketType::Dgram);
    assert_eq!(h.layer.dup2(a, a), Ok(a));
    assert_eq!(h.layer.open_descriptors(), vec![a, b]);
}

#[test]
fn test_shared_descriptor_flags_are_private() {
    let h = harness();
    let fd = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();
    let alias = h.layer.share(fd, 0).unwrap();

    h.layer.set_cloexec(alias, true).unwrap();
    assert_eq!(h.layer.descriptor_flags(alias), Ok(DescriptorFlags::CLOEXEC));
    assert_eq!(h.layer.descriptor_flags(fd), Ok(DescriptorFlags::empty()));

    // The object and its O_NONBLOCK are shared
    h.layer.set_nonblocking(fd, true).unwrap();
    assert_eq!(h.layer.is_nonblocking(alias), Ok(true));
    assert_eq!(h.layer.resolve(fd).unwrap().refcount(), 2);
}

#[test]
fn test_nonblocking_accept_would_block() {
    let h = harness();
    let listener = h.layer.socket(AddressFamily::Local, SocketType::Stream, 0).unwrap();
    h.layer.bind(listener, &SockAddr::local("/tmp/idle.sock").unwrap()).unwrap();
    h.layer.listen(listener, 1).unwrap();
    h.layer.set_nonblocking(listener, true).unwrap();

    assert_eq!(
        h.layer.accept(&Task::new(1), listener).err(),
        Some(SocketError::WouldBlock)
    );
    assert_eq!(h.layer.open_descriptors(), vec![listener]);
}
