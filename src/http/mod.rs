//! HTTP protocol layer module
//!
//! Provides HTTP protocol-related base functionality: cache validators,
//! compression, content types and response builders. Decoupled from the
//! request pipeline so each piece can be tested on its own.

pub mod cache;
pub mod compression;
pub mod mime;
pub mod response;

use hyper::HeaderMap;

// Re-export commonly used types
pub use cache::{CacheValidators, Negotiation};
pub use compression::Compressor;
pub use response::{
    build_304_response, build_empty_response, build_options_response, build_preflight_response,
    build_response,
};

/// Failures while producing a response body
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("permission denied")]
    Forbidden,
    #[error("file vanished after resolution")]
    NotFound,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServeError {
    /// Classify an I/O error from reading a resolved file
    pub fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::Forbidden,
            _ => Self::Io(err),
        }
    }
}

/// Conditional request headers for cache validation and content negotiation
#[derive(Debug, Default, Clone)]
pub struct ConditionalHeaders {
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub accept_encoding: Option<String>,
}

impl ConditionalHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };
        Self {
            if_none_match: get("if-none-match"),
            if_modified_since: get("if-modified-since"),
            accept_encoding: get("accept-encoding"),
        }
    }
}
