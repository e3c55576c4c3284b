/*!
 * Socket Option Tests
 */

use crate::support::{harness, harness_with};
use ai_os_net::net::{AddressFamily, Linger, OptionValue, SocketOption, SocketType, SOL_SOCKET};
use ai_os_net::{SocketConfig, SocketError};
use pretty_assertions::assert_eq;

const IPPROTO_TCP: u32 = 6;

#[test]
fn test_boolean_options_toggle_mask() {
    let h = harness();
    let fd = h.layer.socket(AddressFamily::Local, SocketType::Stream, 0).unwrap();
    let keepalive = SocketOption::KeepAlive.code();

    assert_eq!(h.layer.getsockopt(fd, SOL_SOCKET, keepalive), Ok(OptionValue::Bool(false)));
    h.layer.setsockopt(fd, SOL_SOCKET, keepalive, OptionValue::Int(1)).unwrap();
    assert_eq!(h.layer.getsockopt(fd, SOL_SOCKET, keepalive), Ok(OptionValue::Bool(true)));
    assert!(h.layer.resolve(fd).unwrap().options().contains(SocketOption::KeepAlive));

    h.layer.setsockopt(fd, SOL_SOCKET, keepalive, OptionValue::Bool(false)).unwrap();
    assert_eq!(h.layer.getsockopt(fd, SOL_SOCKET, keepalive), Ok(OptionValue::Bool(false)));
}

#[test]
fn test_get_only_and_unknown_options() {
    let h = harness();
    let fd = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();

    for opt in [SocketOption::AcceptConn, SocketOption::Error, SocketOption::Type] {
        assert_eq!(
            h.layer.setsockopt(fd, SOL_SOCKET, opt.code(), OptionValue::Int(1)),
            Err(SocketError::InvalidArgument)
        );
    }
    assert_eq!(
        h.layer.setsockopt(fd, SOL_SOCKET, 16, OptionValue::Int(1)),
        Err(SocketError::InvalidArgument)
    );
    assert_eq!(h.layer.getsockopt(fd, SOL_SOCKET, 99), Err(SocketError::InvalidArgument));
    assert_eq!(
        h.layer.getsockopt(fd, SOL_SOCKET, SocketOption::Type.code()),
        Ok(OptionValue::Int(SocketType::Dgram.raw() as i32))
    );
    assert_eq!(
        h.layer.getsockopt(fd, SOL_SOCKET, SocketOption::AcceptConn.code()),
        Ok(OptionValue::Bool(false))
    );
}

#[test]
fn test_timeouts_and_linger_are_stored() {
    let h = harness();
    let fd = h.layer.socket(AddressFamily::Local, SocketType::Stream, 0).unwrap();
    let rcvtimeo = SocketOption::RcvTimeo.code();
    let linger = SocketOption::Linger.code();

    h.layer.setsockopt(fd, SOL_SOCKET, rcvtimeo, OptionValue::Timeout(20)).unwrap();
    assert_eq!(h.layer.getsockopt(fd, SOL_SOCKET, rcvtimeo), Ok(OptionValue::Timeout(20)));
    assert_eq!(h.layer.resolve(fd).unwrap().option_values().recv_timeout, 20);

    let value = Linger { enabled: true, seconds: 5 };
    h.layer.setsockopt(fd, SOL_SOCKET, linger, OptionValue::Linger(value)).unwrap();
    assert_eq!(h.layer.getsockopt(fd, SOL_SOCKET, linger), Ok(OptionValue::Linger(value)));
    assert!(h.layer.resolve(fd).unwrap().options().contains(SocketOption::Linger));
    assert_eq!(
        h.layer.setsockopt(fd, SOL_SOCKET, linger, OptionValue::Int(5)),
        Err(SocketError::InvalidArgument)
    );
}

#[test]
fn test_buffer_sizes_fall_back_to_protocol() {
    let config = SocketConfig::default().with_local_buffer_size(2048);
    let h = harness_with(config);
    let fd = h.layer.socket(AddressFamily::Local, SocketType::Stream, 0).unwrap();
    let rcvbuf = SocketOption::RcvBuf.code();

    assert_eq!(h.layer.getsockopt(fd, SOL_SOCKET, rcvbuf), Ok(OptionValue::Int(2048)));
    h.layer.setsockopt(fd, SOL_SOCKET, rcvbuf, OptionValue::Int(8192)).unwrap();
    assert_eq!(h.layer.getsockopt(fd, SOL_SOCKET, rcvbuf), Ok(OptionValue::Int(8192)));
    assert_eq!(
        h.layer.setsockopt(fd, SOL_SOCKET, rcvbuf, OptionValue::Int(-1)),
        Err(SocketError::InvalidArgument)
    );
    assert_eq!(
        h.layer.getsockopt(fd, SOL_SOCKET, SocketOption::SndLowat.code()),
        Ok(OptionValue::Int(1))
    );
}

#[test]
fn test_protocol_levels_go_to_interface() {
    let h = harness();
    let fd = h.layer.socket(AddressFamily::Local, SocketType::Stream, 0).unwrap();

    assert_eq!(
        h.layer.setsockopt(fd, IPPROTO_TCP, 1, OptionValue::Int(1)),
        Err(SocketError::ProtocolOptionUnavailable)
    );
    assert_eq!(
        h.layer.getsockopt(fd, IPPROTO_TCP, 1),
        Err(SocketError::ProtocolOptionUnavailable)
    );
}

#[test]
fn test_config_timeouts_seed_new_sockets() {
    let h = harness_with(SocketConfig::default().with_timeouts(30, 40));
    let fd = h.layer.socket(AddressFamily::Inet, SocketType::Stream, 0).unwrap();

    assert_eq!(
        h.layer.getsockopt(fd, SOL_SOCKET, SocketOption::SndTimeo.code()),
        Ok(OptionValue::Timeout(30))
    );
    assert_eq!(
        h.layer.getsockopt(fd, SOL_SOCKET, SocketOption::RcvTimeo.code()),
        Ok(OptionValue::Timeout(40))
    );
}

#[test]
fn test_dup_inherits_options() {
    let h = harness();
    let fd = h.layer.socket(AddressFamily::Local, SocketType::Dgram, 0).unwrap();
    h.layer
        .setsockopt(fd, SOL_SOCKET, SocketOption::Broadcast.code(), OptionValue::Bool(true))
        .unwrap();
    h.layer
        .setsockopt(fd, SOL_SOCKET, SocketOption::SndTimeo.code(), OptionValue::Timeout(7))
        .unwrap();

    let copy = h.layer.dup(fd).unwrap();
    assert_eq!(
        h.layer.getsockopt(copy, SOL_SOCKET, SocketOption::Broadcast.code()),
        Ok(OptionValue::Bool(true))
    );
    assert_eq!(
        h.layer.getsockopt(copy, SOL_SOCKET, SocketOption::SndTimeo.code()),
        Ok(OptionValue::Timeout(7))
    );
}

#[test]
fn test_rejected_option_leaves_socket_unchanged() {
    let h = harness();
    let fd = h.layer.socket(AddressFamily::Inet, SocketType::Stream, 0).unwrap();
    h.layer
        .setsockopt(fd, SOL_SOCKET, SocketOption::RcvTimeo.code(), OptionValue::Timeout(7))
        .unwrap();
    let before = h.layer.resolve(fd).unwrap();
    let (mask, values) = (before.options(), before.option_values());

    h.iface.reject_options.store(true, std::sync::atomic::Ordering::SeqCst);
    assert_eq!(
        h.layer
            .setsockopt(fd, SOL_SOCKET, SocketOption::RcvTimeo.code(), OptionValue::Timeout(0)),
        Err(SocketError::ProtocolOptionUnavailable)
    );
    assert_eq!(
        h.layer
            .setsockopt(fd, SOL_SOCKET, SocketOption::KeepAlive.code(), OptionValue::Bool(true)),
        Err(SocketError::ProtocolOptionUnavailable)
    );

    assert_eq!(before.options(), mask);
    assert_eq!(before.option_values(), values);
    assert_eq!(
        h.layer.getsockopt(fd, SOL_SOCKET, SocketOption::RcvTimeo.code()),
        Ok(OptionValue::Timeout(7))
    );
    assert_eq!(
        h.layer.getsockopt(fd, SOL_SOCKET, SocketOption::KeepAlive.code()),
        Ok(OptionValue::Bool(false))
    );
}
