/*!
 * Socket Syscalls
 *
 * POSIX-shaped entry points: every call returns the non-negative result or
 * the negated errno.
 */

use super::executor::SocketSyscalls;
use crate::core::errors::{SocketError, SocketResult};
use crate::core::types::SockFd;
use crate::net::{
    AddressFamily, Linger, MsgFlags, OptionValue, SockAddr, Shutdown, SocketOption, SocketType, SOL_SOCKET,
};
use tracing::trace;

/// Fold a socket result into a syscall return value
pub(super) fn to_return(result: SocketResult<isize>) -> isize {
    match result {
        Ok(value) => value,
        Err(err) => -(err.errno() as isize),
    }
}

fn fd_return(result: SocketResult<SockFd>) -> isize {
    to_return(result.map(|fd| fd as isize))
}

fn unit_return(result: SocketResult<()>) -> isize {
    to_return(result.map(|()| 0))
}

/// Map a raw `setsockopt` integer onto the option's value shape
fn option_value(level: u32, option: u32, raw: i32) -> OptionValue {
    if level != SOL_SOCKET {
        return OptionValue::Int(raw);
    }
    match SocketOption::from_code(option) {
        Ok(SocketOption::RcvTimeo | SocketOption::SndTimeo) if raw >= 0 => OptionValue::Timeout(raw as u32),
        Ok(SocketOption::Linger) => OptionValue::Linger(Linger {
            enabled: raw > 0,
            seconds: raw.max(0) as u32,
        }),
        _ => OptionValue::Int(raw),
    }
}

fn option_int(value: OptionValue) -> isize {
    match value {
        OptionValue::Bool(on) => on as isize,
        OptionValue::Int(v) => v as isize,
        OptionValue::Timeout(ds) => ds as isize,
        OptionValue::Linger(linger) if linger.enabled => linger.seconds as isize,
        OptionValue::Linger(_) => 0,
    }
}

impl SocketSyscalls {
    pub fn sys_socket(&self, domain: u16, sock_type: u32, protocol: u32) -> isize {
        let result = AddressFamily::from_raw(domain)
            .and_then(|family| Ok((family, SocketType::from_raw(sock_type)?)))
            .and_then(|(family, sock_type)| self.layer().socket(family, sock_type, protocol));
        fd_return(result)
    }

    pub fn sys_bind(&self, sockfd: SockFd, addr: &SockAddr) -> isize {
        unit_return(self.layer().bind(sockfd, addr))
    }

    pub fn sys_listen(&self, sockfd: SockFd, backlog: usize) -> isize {
        unit_return(self.layer().listen(sockfd, backlog))
    }

    pub fn sys_accept(&self, sockfd: SockFd) -> isize {
        fd_return(self.layer().accept(self.task(), sockfd).map(|(fd, _)| fd))
    }

    pub fn sys_connect(&self, sockfd: SockFd, addr: &SockAddr) -> isize {
        unit_return(self.layer().connect(self.task(), sockfd, addr))
    }

    /// Send `len` bytes of `buf`; a length past the buffer is a copy fault
    pub fn sys_send(&self, sockfd: SockFd, buf: &[u8], len: usize, flags: u32) -> isize {
        self.sys_sendto(sockfd, buf, len, flags, None)
    }

    pub fn sys_sendto(&self, sockfd: SockFd, buf: &[u8], len: usize, flags: u32, dest: Option<&SockAddr>) -> isize {
        let result = self.layer().resolve(sockfd).and_then(|_| {
            let data = buf.get(..len).ok_or(SocketError::BadAddress)?;
            self.layer()
                .sendto(self.task(), sockfd, data, MsgFlags::from_bits_retain(flags), dest)
        });
        trace!(sockfd, len, ?result, "sys_send");
        to_return(result.map(|n| n as isize))
    }

    pub fn sys_recv(&self, sockfd: SockFd, buf: &mut [u8], len: usize, flags: u32) -> isize {
        let result = self.layer().resolve(sockfd).and_then(|_| {
            let data = buf.get_mut(..len).ok_or(SocketError::BadAddress)?;
            self.layer()
                .recv(self.task(), sockfd, data, MsgFlags::from_bits_retain(flags))
        });
        to_return(result.map(|n| n as isize))
    }

    pub fn sys_shutdown(&self, sockfd: SockFd, how: u32) -> isize {
        unit_return(Shutdown::from_raw(how).and_then(|how| self.layer().shutdown(sockfd, how)))
    }

    pub fn sys_close(&self, sockfd: SockFd) -> isize {
        unit_return(self.layer().close(sockfd))
    }

    pub fn sys_dup(&self, sockfd: SockFd) -> isize {
        fd_return(self.layer().dup(sockfd))
    }

    pub fn sys_dup2(&self, sockfd: SockFd, target: SockFd) -> isize {
        fd_return(self.layer().dup2(sockfd, target))
    }

    pub fn sys_setsockopt(&self, sockfd: SockFd, level: u32, option: u32, value: i32) -> isize {
        unit_return(
            self.layer()
                .setsockopt(sockfd, level, option, option_value(level, option, value)),
        )
    }

    pub fn sys_getsockopt(&self, sockfd: SockFd, level: u32, option: u32) -> isize {
        to_return(self.layer().getsockopt(sockfd, level, option).map(option_int))
    }
}
