//! Static file serving module
//!
//! Loads a resolved file, negotiates cache validators and compression, and
//! builds the response.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;
use tokio::fs;

use crate::config::AppState;
use crate::handler::pipeline::{RequestContext, Termination};
use crate::http::cache::{self, CacheValidators, Negotiation};
use crate::http::{self, mime, ServeError};
use crate::logger;

/// File metadata captured during resolution
pub struct ResolvedFile<'a> {
    pub path: &'a Path,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Serve a regular file.
///
/// A matching conditional request ends in `NotModified` before the body is
/// read (unless the `ETag` is content-derived) and before any compression.
pub async fn serve_file(
    ctx: &RequestContext,
    state: &AppState,
    file: &ResolvedFile<'_>,
) -> Result<Response<Full<Bytes>>, Termination> {
    let cache_config = &state.config.features.cache;
    let mut content = None;

    let etag = if !cache_config.etag {
        None
    } else if cache_config.content_hash {
        let bytes = read_file(file.path).await?;
        let tag = cache::generate_content_etag(&bytes, cache_config.weak_etag);
        content = Some(bytes);
        Some(tag)
    } else {
        Some(cache::generate_etag(
            file.path,
            file.size,
            file.modified,
            cache_config.weak_etag,
        ))
    };

    let validators = CacheValidators {
        etag,
        last_modified: file.modified,
    };
    let mut headers = match cache::negotiate(&validators, &ctx.conditional, cache_config.max_age) {
        Negotiation::NotModified(headers) => return Err(Termination::NotModified(headers)),
        Negotiation::Serve(headers) => headers,
    };

    let body = match content {
        Some(body) => body,
        None => read_file(file.path).await?,
    };

    let content_type = mime::content_type_for(file.path);
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));

    let body = state
        .compressor
        .maybe_compress(
            body,
            ctx.conditional.accept_encoding.as_deref(),
            content_type,
            &mut headers,
        )
        .map_err(|e| {
            logger::log_error(&format!(
                "Compression failed for '{}': {e}",
                file.path.display()
            ));
            ServeError::Io(e)
        })?;

    Ok(http::build_response(StatusCode::OK, headers, body, ctx.is_head))
}

/// Read a file that resolution already found.
///
/// Any failure other than the file vanishing is a server error.
async fn read_file(path: &Path) -> Result<Bytes, ServeError> {
    match fs::read(path).await {
        Ok(content) => Ok(Bytes::from(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ServeError::NotFound),
        Err(e) => {
            logger::log_error(&format!("Failed to read file '{}': {e}", path.display()));
            Err(ServeError::Io(e))
        }
    }
}
