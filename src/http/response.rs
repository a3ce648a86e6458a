//! HTTP response building module
//!
//! Provides builders for responses, decoupled from specific business logic.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Response, StatusCode};

pub const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

/// Build a response carrying `body`.
///
/// `Content-Length` always reflects the full body; for `HEAD` requests the
/// body itself is dropped.
pub fn build_response(
    status: StatusCode,
    mut headers: HeaderMap,
    body: Bytes,
    is_head: bool,
) -> Response<Full<Bytes>> {
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    let body = if is_head { Bytes::new() } else { body };

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Build a body-less response (204, 304)
pub fn build_empty_response(status: StatusCode, headers: HeaderMap) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Build 304 Not Modified response with the negotiated cache headers
pub fn build_304_response(headers: HeaderMap) -> Response<Full<Bytes>> {
    build_empty_response(StatusCode::NOT_MODIFIED, headers)
}

/// Build OPTIONS response for servers without CORS
pub fn build_options_response() -> Response<Full<Bytes>> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    build_empty_response(StatusCode::NO_CONTENT, headers)
}

/// Build preflight response carrying the CORS headers
pub fn build_preflight_response(mut headers: HeaderMap) -> Response<Full<Bytes>> {
    headers.insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    build_empty_response(StatusCode::NO_CONTENT, headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_keeps_length_drops_body() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let response = build_response(StatusCode::OK, headers, Bytes::from("hello"), true);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "5");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn test_options_response() {
        let response = build_options_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[header::ALLOW], ALLOWED_METHODS);
    }
}
