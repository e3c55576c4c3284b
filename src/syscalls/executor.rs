/*!
 * Syscall Executor
 * Binds a socket layer to the calling task and dispatches socket calls
 */

use super::socket::to_return;
use super::types::{SocketCall, SyscallResult};
use crate::core::errors::SocketError;
use crate::core::limits::MAX_RECV_SIZE;
use crate::monitoring::span_operation;
use crate::net::{SockAddr, SocketLayer};
use crate::signals::Task;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Socket system calls issued by one task
#[derive(Clone)]
pub struct SocketSyscalls {
    layer: Arc<SocketLayer>,
    task: Arc<Task>,
}

impl SocketSyscalls {
    pub fn new(layer: Arc<SocketLayer>, task: Arc<Task>) -> Self {
        Self { layer, task }
    }

    #[inline]
    pub fn layer(&self) -> &SocketLayer {
        &self.layer
    }

    #[inline]
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Execute a serialized call, returning JSON data on success
    pub fn execute(&self, call: SocketCall) -> SyscallResult {
        let span = span_operation("socket_syscall");
        let _entered = span.enter();
        let name = call.name();

        let ret = match &call {
            SocketCall::Socket {
                domain,
                sock_type,
                protocol,
            } => self.sys_socket(*domain, *sock_type, *protocol),
            SocketCall::Bind { sockfd, path } => match SockAddr::local(path.as_str()) {
                Ok(addr) => self.sys_bind(*sockfd, &addr),
                Err(err) => to_return(Err(err)),
            },
            SocketCall::Listen { sockfd, backlog } => self.sys_listen(*sockfd, *backlog),
            SocketCall::Accept { sockfd } => self.sys_accept(*sockfd),
            SocketCall::Connect { sockfd, path } => match SockAddr::local(path.as_str()) {
                Ok(addr) => self.sys_connect(*sockfd, &addr),
                Err(err) => to_return(Err(err)),
            },
            SocketCall::Send { sockfd, data, flags } => self.sys_send(*sockfd, data, data.len(), *flags),
            SocketCall::SendTo {
                sockfd,
                data,
                flags,
                path,
            } => match SockAddr::local(path.as_str()) {
                Ok(addr) => self.sys_sendto(*sockfd, data, data.len(), *flags, Some(&addr)),
                Err(err) => to_return(Err(err)),
            },
            // The descriptor resolves before the buffer is sized
            SocketCall::Recv { sockfd, size, flags } => match self.layer.resolve(*sockfd) {
                Err(err) => to_return(Err(err)),
                Ok(_) => {
                    let size = (*size).min(MAX_RECV_SIZE);
                    let mut buf = vec![0u8; size];
                    let ret = self.sys_recv(*sockfd, &mut buf, size, *flags);
                    if ret >= 0 {
                        buf.truncate(ret as usize);
                        span.record_result(true);
                        return self.encode(name, json!({ "bytes": ret, "data": buf }));
                    }
                    ret
                }
            },
            SocketCall::Shutdown { sockfd, how } => self.sys_shutdown(*sockfd, *how),
            SocketCall::Close { sockfd } => self.sys_close(*sockfd),
            SocketCall::Dup { sockfd } => self.sys_dup(*sockfd),
            SocketCall::Dup2 { sockfd, target } => self.sys_dup2(*sockfd, *target),
            SocketCall::SetSockOpt {
                sockfd,
                level,
                option,
                value,
            } => self.sys_setsockopt(*sockfd, *level, *option, *value),
            SocketCall::GetSockOpt { sockfd, level, option } => self.sys_getsockopt(*sockfd, *level, *option),
        };

        if ret < 0 {
            let errno = (-ret) as i32;
            let message = SocketError::from_errno(errno).map_or_else(|| format!("errno {}", errno), |err| err.to_string());
            span.record_error(&message);
            debug!(pid = self.task.pid(), call = name, errno, "socket call failed");
            return SyscallResult::error(errno, message);
        }

        span.record_result(true);
        self.encode(name, json!({ "result": ret }))
    }

    fn encode(&self, name: &str, value: serde_json::Value) -> SyscallResult {
        match serde_json::to_vec(&value) {
            Ok(data) => SyscallResult::success_with_data(data),
            Err(e) => SyscallResult::error(crate::core::errors::errno::EINVAL, format!("{} result encoding failed: {}", name, e)),
        }
    }
}
