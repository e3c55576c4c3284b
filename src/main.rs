/*!
 * AI-OS Socket Daemon - Main Entry Point
 *
 * Brings up a socket layer and runs a local stream echo exchange between a
 * server task and a client task.
 */

use ai_os_net::{
    init_tracing, AddressFamily, MsgFlags, SockAddr, SocketConfig, SocketLayer, SocketResult, SocketType, Task,
};
use std::error::Error;
use std::sync::Arc;
use std::thread;
use tracing::info;

const ECHO_PATH: &str = "/run/netd/echo";

fn serve_once(layer: &SocketLayer, task: &Task, listener: u32) -> SocketResult<usize> {
    let (conn, peer) = layer.accept(task, listener)?;
    info!(conn, %peer, "accepted connection");

    let mut buf = [0u8; 256];
    let mut echoed = 0;
    loop {
        let n = layer.recv(task, conn, &mut buf, MsgFlags::empty())?;
        if n == 0 {
            break;
        }
        echoed += layer.send(task, conn, &buf[..n], MsgFlags::empty())?;
    }
    layer.close(conn)?;
    Ok(echoed)
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    info!("AgentOS socket daemon starting...");
    let config = SocketConfig::from_env();
    info!(?config, "configuration loaded");

    let layer = Arc::new(SocketLayer::new(config));
    let addr = SockAddr::local(ECHO_PATH)?;

    let listener = layer.socket(AddressFamily::Local, SocketType::Stream, 0)?;
    layer.bind(listener, &addr)?;
    layer.listen(listener, 4)?;
    info!(listener, path = ECHO_PATH, "echo server listening");

    let server = {
        let layer = Arc::clone(&layer);
        thread::spawn(move || serve_once(&layer, &Task::new(1), listener))
    };

    let client_task = Task::new(2);
    let client = layer.socket(AddressFamily::Local, SocketType::Stream, 0)?;
    layer.connect(&client_task, client, &addr)?;

    let message = b"hello from netd";
    layer.send(&client_task, client, message, MsgFlags::empty())?;
    layer.shutdown(client, ai_os_net::net::Shutdown::Write)?;

    let mut reply = Vec::new();
    let mut buf = [0u8; 64];
    loop {
        let n = layer.recv(&client_task, client, &mut buf, MsgFlags::empty())?;
        if n == 0 {
            break;
        }
        reply.extend_from_slice(&buf[..n]);
    }
    layer.close(client)?;

    let echoed = server.join().map_err(|_| "echo server panicked")??;
    info!(
        echoed,
        reply = %String::from_utf8_lossy(&reply),
        "echo exchange complete"
    );

    layer.close(listener)?;
    info!(open = layer.open_descriptors().len(), "socket daemon stopped");
    Ok(())
}
