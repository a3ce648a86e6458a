// TLS module
// Loads PEM certificate chain and private key into a rustls acceptor

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use super::ServerError;

/// Build a TLS acceptor from PEM files.
///
/// Only HTTP/1.1 is offered through ALPN.
pub fn load_tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, ServerError> {
    let tls_err = |path: &Path, reason: String| ServerError::Tls {
        path: path.display().to_string(),
        reason,
    };

    let cert_file = File::open(cert_path).map_err(|e| tls_err(cert_path, e.to_string()))?;
    let cert_chain = rustls_pemfile::certs(&mut BufReader::new(cert_file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_err(cert_path, e.to_string()))?;
    if cert_chain.is_empty() {
        return Err(tls_err(cert_path, "no certificates found".to_string()));
    }

    let key_file = File::open(key_path).map_err(|e| tls_err(key_path, e.to_string()))?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(key_file))
        .map_err(|e| tls_err(key_path, e.to_string()))?
        .ok_or_else(|| tls_err(key_path, "private key not found".to_string()))?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|e| tls_err(cert_path, e.to_string()))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}
