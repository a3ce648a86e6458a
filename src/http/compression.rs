//! Response body compression (gzip)

use flate2::write::GzEncoder;
use flate2::Compression;
use hyper::body::Bytes;
use hyper::header::{self, HeaderMap, HeaderValue};
use std::io::Write;

use super::mime;
use crate::config::PerformanceConfig;

pub struct Compressor {
    enabled: bool,
    level: Compression,
    min_size: u64,
}

impl Compressor {
    pub fn new(config: &PerformanceConfig) -> Self {
        Self {
            enabled: config.enable_compression,
            level: Compression::new(config.compression_level.clamp(1, 9)),
            min_size: config.compression_min_size,
        }
    }

    /// Whether a body of this type and size would be compressed for a
    /// client that accepts gzip
    pub fn eligible(&self, content_type: &str, len: u64) -> bool {
        self.enabled && len >= self.min_size && mime::is_compressible(content_type)
    }

    /// Gzip `body` when the client accepts it and the content qualifies.
    ///
    /// Eligible responses always get `Vary: Accept-Encoding`, since caches
    /// must key them on the request encoding. `Content-Encoding: gzip` is
    /// only set when the compressed body is actually smaller.
    pub fn maybe_compress(
        &self,
        body: Bytes,
        accept_encoding: Option<&str>,
        content_type: &str,
        headers: &mut HeaderMap,
    ) -> std::io::Result<Bytes> {
        if !self.eligible(content_type, body.len() as u64) {
            return Ok(body);
        }
        headers.append(header::VARY, HeaderValue::from_static("Accept-Encoding"));

        if !accept_encoding.is_some_and(accepts_gzip) {
            return Ok(body);
        }

        let compressed = gzip_compress(&body, self.level)?;
        if compressed.len() >= body.len() {
            return Ok(body);
        }
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        Ok(Bytes::from(compressed))
    }
}

/// Parse quality value from Accept-Encoding part (e.g., "gzip;q=0.5" -> 0.5)
fn parse_quality(part: &str) -> f32 {
    part.split(';')
        .skip(1)
        .find_map(|p| p.trim().strip_prefix("q="))
        .and_then(|q| q.trim().parse::<f32>().ok())
        .unwrap_or(1.0)
}

/// Whether the `Accept-Encoding` header admits gzip with a non-zero quality.
///
/// An explicit `gzip` entry wins over `*`.
pub fn accepts_gzip(accept_encoding: &str) -> bool {
    let mut wildcard = None;
    for part in accept_encoding.split(',') {
        let coding = part.split(';').next().unwrap_or("").trim();
        if coding.eq_ignore_ascii_case("gzip") || coding.eq_ignore_ascii_case("x-gzip") {
            return parse_quality(part) > 0.0;
        }
        if coding == "*" {
            wildcard = Some(parse_quality(part) > 0.0);
        }
    }
    wildcard.unwrap_or(false)
}

fn gzip_compress(data: &[u8], level: Compression) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), level);
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn compressor(min_size: u64) -> Compressor {
        Compressor::new(&PerformanceConfig {
            compression_min_size: min_size,
            ..PerformanceConfig::default()
        })
    }

    fn text(len: usize) -> Bytes {
        Bytes::from("lorem ipsum dolor sit amet ".repeat(len / 27 + 1))
    }

    #[test]
    fn test_accepts_gzip() {
        assert!(accepts_gzip("gzip"));
        assert!(accepts_gzip("br, gzip;q=0.8"));
        assert!(accepts_gzip("*"));
        assert!(!accepts_gzip("gzip;q=0"));
        assert!(!accepts_gzip("br, deflate"));
        assert!(!accepts_gzip("*;q=0"));
        assert!(!accepts_gzip("gzip;q=0, *"));
    }

    #[test]
    fn test_compresses_text_round_trip() {
        let body = text(4096);
        let mut headers = HeaderMap::new();
        let out = compressor(1024)
            .maybe_compress(body.clone(), Some("gzip, br"), "text/plain; charset=utf-8", &mut headers)
            .unwrap();

        assert_eq!(headers[header::CONTENT_ENCODING], "gzip");
        assert_eq!(headers[header::VARY], "Accept-Encoding");
        assert!(out.len() < body.len());

        let mut decoded = Vec::new();
        GzDecoder::new(&out[..]).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn test_skips_small_bodies() {
        let body = text(100).slice(0..100);
        let mut headers = HeaderMap::new();
        let out = compressor(1024)
            .maybe_compress(body.clone(), Some("gzip"), "text/html", &mut headers)
            .unwrap();
        assert_eq!(out, body);
        assert!(headers.is_empty());
    }

    #[test]
    fn test_skips_binary_media() {
        let body = text(4096);
        let mut headers = HeaderMap::new();
        let out = compressor(0)
            .maybe_compress(body.clone(), Some("gzip"), "image/png", &mut headers)
            .unwrap();
        assert_eq!(out, body);
        assert!(!headers.contains_key(header::CONTENT_ENCODING));
    }

    #[test]
    fn test_vary_without_gzip_support() {
        let body = text(4096);
        let mut headers = HeaderMap::new();
        let out = compressor(1024)
            .maybe_compress(body.clone(), None, "application/json", &mut headers)
            .unwrap();
        assert_eq!(out, body);
        assert_eq!(headers[header::VARY], "Accept-Encoding");
        assert!(!headers.contains_key(header::CONTENT_ENCODING));
    }

    #[test]
    fn test_disabled() {
        let compressor = Compressor::new(&PerformanceConfig {
            enable_compression: false,
            ..PerformanceConfig::default()
        });
        assert!(!compressor.eligible("text/plain", 1 << 20));
    }
}
