//! Cross-origin resource sharing policy

use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::Method;

use crate::config::CorsConfig;

/// Outcome of applying the CORS policy to a request
#[derive(Debug, Default)]
pub struct CorsOutcome {
    /// Headers to attach to whatever response the request ends with
    pub headers: HeaderMap,
    /// The request is a preflight and should be answered with 204 now
    pub preflight: bool,
}

pub struct CorsPolicy {
    enabled: bool,
    any_origin: bool,
    origins: Vec<String>,
    allow_methods: Option<HeaderValue>,
    allow_headers: Option<HeaderValue>,
    max_age: HeaderValue,
}

impl CorsPolicy {
    pub fn new(config: &CorsConfig) -> Self {
        let join = |items: &[String]| {
            if items.is_empty() {
                None
            } else {
                HeaderValue::from_str(&items.join(", ")).ok()
            }
        };
        Self {
            enabled: config.enabled,
            any_origin: config.allowed_origins.iter().any(|o| o == "*"),
            origins: config
                .allowed_origins
                .iter()
                .map(|o| o.trim_end_matches('/').to_ascii_lowercase())
                .collect(),
            allow_methods: join(&config.allowed_methods),
            allow_headers: join(&config.allowed_headers),
            max_age: HeaderValue::from(config.max_age),
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        self.any_origin
            || self
                .origins
                .iter()
                .any(|o| o.eq_ignore_ascii_case(origin.trim_end_matches('/')))
    }

    /// Compute CORS response headers for `origin` and `method`.
    ///
    /// The request origin is echoed only when it is allowed, but `Vary: Origin`
    /// is always set so caches keep per-origin variants apart. `OPTIONS`
    /// requests are flagged as preflights whenever the policy is enabled.
    pub fn apply(&self, origin: Option<&HeaderValue>, method: &Method) -> CorsOutcome {
        let mut outcome = CorsOutcome::default();
        if !self.enabled {
            return outcome;
        }
        outcome.preflight = *method == Method::OPTIONS;
        outcome
            .headers
            .insert(header::VARY, HeaderValue::from_static("Origin"));

        let Some(origin) = origin.filter(|o| o.to_str().is_ok_and(|s| self.origin_allowed(s)))
        else {
            return outcome;
        };

        let headers = &mut outcome.headers;
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        if outcome.preflight {
            if let Some(methods) = &self.allow_methods {
                headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, methods.clone());
            }
            if let Some(allowed) = &self.allow_headers {
                headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allowed.clone());
            }
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(origins: &[&str]) -> CorsPolicy {
        CorsPolicy::new(&CorsConfig {
            enabled: true,
            allowed_origins: origins.iter().map(ToString::to_string).collect(),
            ..CorsConfig::default()
        })
    }

    #[test]
    fn test_disabled_adds_nothing() {
        let policy = CorsPolicy::new(&CorsConfig::default());
        let origin = HeaderValue::from_static("https://a.example");
        let outcome = policy.apply(Some(&origin), &Method::OPTIONS);
        assert!(outcome.headers.is_empty());
        assert!(!outcome.preflight);
    }

    #[test]
    fn test_echoes_listed_origin() {
        let policy = policy(&["https://a.example"]);
        let origin = HeaderValue::from_static("https://a.example");
        let outcome = policy.apply(Some(&origin), &Method::GET);
        assert_eq!(
            outcome.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://a.example"
        );
        assert_eq!(outcome.headers[header::VARY], "Origin");
        assert!(!outcome.preflight);
        assert!(!outcome
            .headers
            .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    }

    #[test]
    fn test_rejects_unlisted_origin() {
        let policy = policy(&["https://a.example"]);
        let origin = HeaderValue::from_static("https://evil.example");
        let outcome = policy.apply(Some(&origin), &Method::GET);
        assert!(!outcome
            .headers
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
        assert_eq!(outcome.headers[header::VARY], "Origin");
        assert_eq!(outcome.headers.len(), 1);
    }

    #[test]
    fn test_vary_without_origin_header() {
        let policy = policy(&["https://a.example"]);
        let outcome = policy.apply(None, &Method::GET);
        assert_eq!(outcome.headers[header::VARY], "Origin");
        assert!(!outcome
            .headers
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[test]
    fn test_wildcard_echoes_any_origin() {
        let policy = policy(&["*"]);
        let origin = HeaderValue::from_static("https://b.example");
        let outcome = policy.apply(Some(&origin), &Method::GET);
        assert_eq!(
            outcome.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://b.example"
        );
    }

    #[test]
    fn test_preflight_headers() {
        let policy = policy(&["*"]);
        let origin = HeaderValue::from_static("https://c.example");
        let outcome = policy.apply(Some(&origin), &Method::OPTIONS);
        assert!(outcome.preflight);
        assert_eq!(
            outcome.headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, HEAD, OPTIONS"
        );
        assert_eq!(
            outcome.headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, Authorization"
        );
        assert_eq!(outcome.headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }

    #[test]
    fn test_preflight_without_origin_still_short_circuits() {
        let policy = policy(&["https://a.example"]);
        let outcome = policy.apply(None, &Method::OPTIONS);
        assert!(outcome.preflight);
        assert!(!outcome
            .headers
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
