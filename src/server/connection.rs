// Connection handling module
// Serves one accepted connection (plain TCP or TLS) over HTTP/1.1

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::Watcher;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;

use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Accept a connection and serve it on its own task.
///
/// TLS handshakes run inside the task and are bounded by the read timeout;
/// a failed handshake only drops that connection.
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    tls: Option<&TlsAcceptor>,
    watcher: Watcher,
) {
    if let Err(e) = stream.set_nodelay(true) {
        logger::log_debug(&format!("Failed to set TCP_NODELAY for {peer_addr}: {e}"));
    }

    let state = Arc::clone(state);
    let tls = tls.cloned();
    tokio::spawn(async move {
        let Some(acceptor) = tls else {
            serve_connection(stream, peer_addr, state, watcher).await;
            return;
        };

        let handshake_timeout = read_timeout(&state).unwrap_or(Duration::from_secs(15));
        match tokio::time::timeout(handshake_timeout, acceptor.accept(stream)).await {
            Ok(Ok(tls_stream)) => serve_connection(tls_stream, peer_addr, state, watcher).await,
            Ok(Err(e)) => logger::log_debug(&format!("TLS handshake with {peer_addr} failed: {e}")),
            Err(_) => logger::log_debug(&format!("TLS handshake with {peer_addr} timed out")),
        }
    });
}

/// Serve HTTP/1.1 on an established stream until the client or a graceful
/// shutdown closes it.
///
/// Dropping the connection future also drops any in-flight request handler,
/// which releases open files.
pub async fn serve_connection<I>(io: I, peer_addr: SocketAddr, state: Arc<AppState>, watcher: Watcher)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .keep_alive(state.config.server.keep_alive);
    if let Some(timeout) = read_timeout(&state) {
        builder.header_read_timeout(timeout);
    }

    let service = service_fn(move |req| handler::handle_request(req, peer_addr, Arc::clone(&state)));
    let conn = builder.serve_connection(TokioIo::new(io), service);

    if let Err(err) = watcher.watch(conn).await {
        logger::log_connection_error(&err);
    }
}

fn read_timeout(state: &AppState) -> Option<Duration> {
    let secs = state.config.server.read_timeout;
    (secs > 0).then(|| Duration::from_secs(secs))
}
