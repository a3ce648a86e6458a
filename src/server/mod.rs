// Server module entry point
// Binds the listener, loads TLS and runs the accept loop until a shutdown signal

pub mod connection;
pub mod listener;
pub mod signal;
pub mod tls;

// Rust does not allow `loop` as a module name (keyword), use server_loop
#[path = "loop.rs"]
pub mod server_loop;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use crate::config::AppState;
use crate::logger;

// Re-export commonly used items
pub use listener::create_reusable_listener;
pub use server_loop::start_server_loop;

/// Fatal errors that stop the server before it serves requests
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load TLS material from {path}: {reason}")]
    Tls { path: String, reason: String },
}

/// Start serving and block until SIGINT/SIGTERM and the drain complete
pub async fn run(state: Arc<AppState>) -> Result<(), ServerError> {
    let addr = state.config.get_socket_addr();

    let security = &state.config.security;
    let tls = if security.enable_https {
        Some(tls::load_tls_acceptor(
            Path::new(&security.cert_file),
            Path::new(&security.key_file),
        )?)
    } else {
        None
    };

    let listener =
        create_reusable_listener(addr).map_err(|source| ServerError::Bind { addr, source })?;
    let local_addr = listener.local_addr().unwrap_or(addr);

    let scheme = if tls.is_some() { "https" } else { "http" };
    logger::log_server_start(
        &local_addr,
        scheme,
        state.config.root(),
        &state.enabled_features(),
    );

    start_server_loop(listener, state, tls, signal::wait_for_shutdown()).await;
    Ok(())
}
