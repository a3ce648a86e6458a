//! HTTP cache control module
//!
//! Provides `ETag`/`Last-Modified` generation and conditional request handling.

use hyper::header::{self, HeaderMap, HeaderValue};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use super::ConditionalHeaders;

/// Validators computed for one representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheValidators {
    pub etag: Option<String>,
    pub last_modified: Option<SystemTime>,
}

/// Result of cache negotiation
#[derive(Debug)]
pub enum Negotiation {
    /// The client copy is fresh; answer 304 with these headers
    NotModified(HeaderMap),
    /// Serve the body with these cache headers
    Serve(HeaderMap),
}

fn quote(tag: &str, weak: bool) -> String {
    if weak {
        format!("W/\"{tag}\"")
    } else {
        format!("\"{tag}\"")
    }
}

/// Generate an `ETag` from file identity
///
/// Any change to the path, size or modification time (to the nanosecond)
/// yields a different tag.
pub fn generate_etag(path: &Path, size: u64, modified: Option<SystemTime>, weak: bool) -> String {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    let mtime = modified
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos());
    quote(&format!("{:x}-{size:x}-{mtime:x}", hasher.finish()), weak)
}

/// Generate an `ETag` by hashing the content itself
pub fn generate_content_etag(content: &[u8], weak: bool) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    quote(&format!("{:x}-{:x}", hasher.finish(), content.len()), weak)
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Uses weak comparison (RFC 7232 section 2.3.2), which is the comparison
/// defined for `If-None-Match`. Supports lists and the `*` wildcard.
pub fn check_etag_match(if_none_match: &str, etag: &str) -> bool {
    let opaque = |tag: &str| tag.trim().trim_start_matches("W/").to_string();
    let etag = opaque(etag);
    if_none_match
        .split(',')
        .any(|candidate| candidate.trim() == "*" || opaque(candidate) == etag)
}

/// Whether `If-Modified-Since` shows the client copy is still current.
///
/// HTTP dates have one-second resolution, so the file time is truncated to
/// whole seconds before comparing. Unparseable dates never match.
pub fn not_modified_since(last_modified: SystemTime, if_modified_since: &str) -> bool {
    let Ok(since) = httpdate::parse_http_date(if_modified_since.trim()) else {
        return false;
    };
    let secs = |t: SystemTime| t.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
    secs(last_modified) <= secs(since)
}

/// Decide between 304 and a full response, building the cache headers.
///
/// `If-None-Match` takes precedence; `If-Modified-Since` is only consulted
/// when the client sent no entity tags.
pub fn negotiate(
    validators: &CacheValidators,
    conditional: &ConditionalHeaders,
    max_age: u64,
) -> Negotiation {
    let mut headers = HeaderMap::new();
    if let Some(etag) = validators
        .etag
        .as_deref()
        .and_then(|e| HeaderValue::from_str(e).ok())
    {
        headers.insert(header::ETAG, etag);
    }
    if let Some(modified) = validators.last_modified {
        if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(modified)) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
    if let Ok(value) = HeaderValue::from_str(&format!("max-age={max_age}")) {
        headers.insert(header::CACHE_CONTROL, value);
    }

    let fresh = match (conditional.if_none_match.as_deref(), validators.etag.as_deref()) {
        (Some(inm), Some(etag)) => check_etag_match(inm, etag),
        (Some(_), None) => false,
        (None, _) => match (conditional.if_modified_since.as_deref(), validators.last_modified) {
            (Some(ims), Some(modified)) => not_modified_since(modified, ims),
            _ => false,
        },
    };

    if fresh {
        Negotiation::NotModified(headers)
    } else {
        Negotiation::Serve(headers)
    }
}
