/*!
 * Blocking Operation Tests
 * Timeouts, signal interruption, per-kind activity and shutdown wakeups
 */

use crate::support::{harness, harness_with, inet, wait_until};
use ai_os_net::net::{Activity, AddressFamily, MsgFlags, OptionValue, SockAddr, Shutdown, SocketOption, SocketType, SOL_SOCKET};
use ai_os_net::signals::Signal;
use ai_os_net::{SocketConfig, SocketError, Task};
use std::sync::Arc;
use std::thread;

#[test]
fn test_send_times_out_at_deadline() {
    let h = harness();
    let fd = h.layer.socket(AddressFamily::Inet, SocketType::Dgram, 0).unwrap();
    h.layer
        .setsockopt(fd, SOL_SOCKET, SocketOption::SndTimeo.code(), OptionValue::Timeout(5))
        .unwrap();

    let sender = {
        let layer = Arc::clone(&h.layer);
        thread::spawn(move || {
            let task = Task::new(1);
            layer.sendto(&task, fd, b"data", MsgFlags::empty(), Some(&inet(9)))
        })
    };

    let socket = h.layer.resolve(fd).unwrap();
    wait_until(|| socket.activity() == Activity::Send);

    // 5 deciseconds = 50 ticks; one short of it must keep waiting
    h.clock.advance(49);
    socket.waiter().notify_all();
    thread::sleep(std::time::Duration::from_millis(20));
    assert!(!sender.is_finished());

    h.clock.advance(1);
    socket.waiter().notify_all();
    assert_eq!(sender.join().unwrap(), Err(SocketError::TimedOut));

    assert_eq!(socket.activity(), Activity::Idle);
    assert_eq!(socket.refcount(), 1);
    assert_eq!(
        h.layer
            .getsockopt(fd, SOL_SOCKET, SocketOption::Error.code())
            .unwrap(),
        OptionValue::Int(0)
    );
}

#[test]
fn test_signal_interrupts_blocked_recv() {
    let h = harness();
    let fd = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();
    h.layer.bind(fd, &SockAddr::local("/tmp/intr.sock").unwrap()).unwrap();

    let task = Arc::new(Task::new(5));
    let receiver = {
        let layer = Arc::clone(&h.layer);
        let task = Arc::clone(&task);
        thread::spawn(move || {
            let mut buf = [0u8; 16];
            layer.recv(&task, fd, &mut buf, MsgFlags::empty())
        })
    };

    let socket = h.layer.resolve(fd).unwrap();
    wait_until(|| socket.activity() == Activity::Recv);
    task.interrupt(Signal::SIGUSR1);

    assert_eq!(receiver.join().unwrap(), Err(SocketError::Interrupted));
    assert_eq!(socket.activity(), Activity::Idle);
    assert!(task.signal_pending());
}

#[test]
fn test_second_blocking_call_is_already_in_progress() {
    let h = harness();
    let fd = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();
    h.layer.bind(fd, &SockAddr::local("/tmp/busy.sock").unwrap()).unwrap();

    let first = Arc::new(Task::new(1));
    let blocked = {
        let layer = Arc::clone(&h.layer);
        let task = Arc::clone(&first);
        thread::spawn(move || {
            let mut buf = [0u8; 16];
            layer.recv(&task, fd, &mut buf, MsgFlags::empty())
        })
    };

    let socket = h.layer.resolve(fd).unwrap();
    wait_until(|| socket.activity() == Activity::Recv);

    let second = Task::new(2);
    let mut buf = [0u8; 16];
    assert_eq!(
        h.layer.recv(&second, fd, &mut buf, MsgFlags::empty()),
        Err(SocketError::AlreadyInProgress)
    );
    // The owner of the activity is undisturbed
    assert_eq!(socket.activity(), Activity::Recv);

    first.interrupt(Signal::SIGINT);
    assert_eq!(blocked.join().unwrap(), Err(SocketError::Interrupted));
}

#[test]
fn test_blocked_recv_completes_when_data_arrives() {
    let h = harness();
    let server = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();
    let client = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();
    let server_addr = SockAddr::local("/tmp/wake.sock").unwrap();
    h.layer.bind(server, &server_addr).unwrap();

    let receiver = {
        let layer = Arc::clone(&h.layer);
        thread::spawn(move || {
            let mut buf = [0u8; 16];
            let len = layer.recv(&Task::new(1), server, &mut buf, MsgFlags::empty())?;
            Ok::<_, SocketError>(buf[..len].to_vec())
        })
    };

    let socket = h.layer.resolve(server).unwrap();
    wait_until(|| socket.activity() == Activity::Recv);
    h.layer
        .sendto(&Task::new(2), client, b"wake", MsgFlags::empty(), Some(&server_addr))
        .unwrap();

    assert_eq!(receiver.join().unwrap(), Ok(b"wake".to_vec()));
}

#[test]
fn test_read_shutdown_wakes_blocked_stream_recv() {
    let h = harness();
    let addr = SockAddr::local("/tmp/shut.sock").unwrap();
    let listener = h.layer.socket(AddressFamily::Local, SocketType::Stream, 0).unwrap();
    h.layer.bind(listener, &addr).unwrap();
    h.layer.listen(listener, 1).unwrap();

    let client = h.layer.socket(AddressFamily::Local, SocketType::Stream, 0).unwrap();
    h.layer.connect(&Task::new(2), client, &addr).unwrap();
    let (_conn, _) = h.layer.accept(&Task::new(1), listener).unwrap();

    let receiver = {
        let layer = Arc::clone(&h.layer);
        thread::spawn(move || {
            let mut buf = [0u8; 16];
            layer.recv(&Task::new(2), client, &mut buf, MsgFlags::empty())
        })
    };

    let socket = h.layer.resolve(client).unwrap();
    wait_until(|| socket.activity() == Activity::Recv);
    h.layer.shutdown(client, Shutdown::Read).unwrap();

    assert_eq!(receiver.join().unwrap(), Ok(0));
}

#[test]
fn test_close_during_block_keeps_socket_alive() {
    let h = harness();
    let fd = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();
    h.layer.bind(fd, &SockAddr::local("/tmp/pinned.sock").unwrap()).unwrap();
    let socket = h.layer.resolve(fd).unwrap();

    let task = Arc::new(Task::new(3));
    let receiver = {
        let layer = Arc::clone(&h.layer);
        let task = Arc::clone(&task);
        thread::spawn(move || {
            let mut buf = [0u8; 16];
            layer.recv(&task, fd, &mut buf, MsgFlags::empty())
        })
    };

    wait_until(|| socket.activity() == Activity::Recv);
    h.layer.close(fd).unwrap();
    assert!(!socket.is_torn_down());
    assert_eq!(h.layer.resolve(fd).err(), Some(SocketError::NotASocket));

    task.interrupt(Signal::SIGTERM);
    assert_eq!(receiver.join().unwrap(), Err(SocketError::Interrupted));
    assert!(socket.is_torn_down());
}

#[test]
fn test_send_waits_while_recv_is_pending() {
    let h = harness_with(SocketConfig::default().with_local_buffer_size(4));
    let addr = SockAddr::local("/tmp/duplex.sock").unwrap();
    let listener = h.layer.socket(AddressFamily::Local, SocketType::Stream, 0).unwrap();
    h.layer.bind(listener, &addr).unwrap();
    h.layer.listen(listener, 1).unwrap();
    let client = h.layer.socket(AddressFamily::Local, SocketType::Stream, 0).unwrap();
    h.layer.connect(&Task::new(1), client, &addr).unwrap();
    let (server, _) = h.layer.accept(&Task::new(2), listener).unwrap();
    let socket = h.layer.resolve(client).unwrap();

    let receiver = {
        let layer = Arc::clone(&h.layer);
        thread::spawn(move || {
            let mut buf = [0u8; 16];
            let len = layer.recv(&Task::new(3), client, &mut buf, MsgFlags::empty())?;
            Ok::<_, SocketError>(buf[..len].to_vec())
        })
    };
    wait_until(|| socket.activity() == Activity::Recv);

    // Fill the client-to-server buffer so the next send has to wait
    assert_eq!(h.layer.send(&Task::new(4), client, b"abcd", MsgFlags::empty()), Ok(4));
    let sender = {
        let layer = Arc::clone(&h.layer);
        thread::spawn(move || layer.send(&Task::new(5), client, b"e", MsgFlags::empty()))
    };
    wait_until(|| socket.activity() == Activity::Send);

    let mut buf = [0u8; 8];
    assert_eq!(h.layer.recv(&Task::new(2), server, &mut buf, MsgFlags::empty()), Ok(4));
    assert_eq!(&buf[..4], b"abcd");
    assert_eq!(sender.join().unwrap(), Ok(1));

    // The receive is still parked and reported once the send is done
    assert!(!receiver.is_finished());
    assert_eq!(socket.activity(), Activity::Recv);

    h.layer.send(&Task::new(2), server, b"pong", MsgFlags::empty()).unwrap();
    assert_eq!(receiver.join().unwrap(), Ok(b"pong".to_vec()));
    assert_eq!(socket.activity(), Activity::Idle);
}
