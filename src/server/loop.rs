// Server loop module
// Accepts connections until shutdown, then drains in-flight connections

use hyper_util::server::graceful::GracefulShutdown;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Pause after a failed accept (e.g. file descriptor exhaustion)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Run the accept loop until `shutdown` resolves.
///
/// The listener is closed first, then open connections get up to
/// `server.shutdown_timeout` seconds to finish. Returns whether every
/// connection closed in time.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    tls: Option<TlsAcceptor>,
    shutdown: impl Future<Output = ()>,
) -> bool {
    let graceful = GracefulShutdown::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    accept_connection(stream, peer_addr, &state, tls.as_ref(), graceful.watcher());
                }
                Err(e) => {
                    logger::log_error(&format!("Failed to accept connection: {e}"));
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            () = &mut shutdown => break,
        }
    }

    drop(listener);

    let timeout_secs = state.config.server.shutdown_timeout;
    logger::log_shutdown_started(timeout_secs);
    let drained = tokio::time::timeout(Duration::from_secs(timeout_secs), graceful.shutdown())
        .await
        .is_ok();
    logger::log_shutdown_complete(drained);
    drained
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::create_reusable_listener;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_serves_requests_and_shuts_down() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hello over tcp").unwrap();

        let mut cfg = Config::default();
        cfg.server.root_dir = dir.path().to_string_lossy().into_owned();
        cfg.logging.access_log = false;
        let state = Arc::new(AppState::new(cfg.validate().unwrap()));

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(start_server_loop(listener, state, None, async move {
            let _ = stop_rx.await;
        }));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /hello.txt HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        client.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.ends_with("hello over tcp"));

        stop_tx.send(()).unwrap();
        assert!(server.await.unwrap());
        assert!(TcpStream::connect(addr).await.is_err());
    }
}
