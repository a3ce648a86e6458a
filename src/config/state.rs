// Application state module
// Shared, read-only view of the validated configuration plus the pipeline
// components built from it. The rate limiter is the only mutable part.

use hyper::header::HeaderValue;

use super::validate::ValidConfig;
use crate::handler::PathResolver;
use crate::http::Compressor;
use crate::security::{AccessControl, Authenticator, CorsPolicy, RateLimiter};

pub const SERVER_NAME: &str = concat!("qserv/", env!("CARGO_PKG_VERSION"));

/// Application state
pub struct AppState {
    pub config: ValidConfig,
    pub rate_limiter: RateLimiter,
    pub access: AccessControl,
    pub auth: Option<Authenticator>,
    pub cors: CorsPolicy,
    pub compressor: Compressor,
    pub resolver: PathResolver,
    pub server_header: HeaderValue,
}

impl AppState {
    pub fn new(config: ValidConfig) -> Self {
        Self {
            rate_limiter: RateLimiter::new(&config.performance.rate_limit),
            access: AccessControl::new(&config.security),
            auth: Authenticator::from_config(config.security.basic_auth.as_ref()),
            cors: CorsPolicy::new(&config.features.cors),
            compressor: Compressor::new(&config.performance),
            resolver: PathResolver::new(&config),
            server_header: HeaderValue::from_static(SERVER_NAME),
            config,
        }
    }

    /// Names of the optional features turned on, for the startup banner
    pub fn enabled_features(&self) -> Vec<&'static str> {
        let features = &self.config.features;
        [
            (self.config.security.enable_https, "https"),
            (self.auth.is_some(), "basic-auth"),
            (self.rate_limiter.is_enabled(), "rate-limit"),
            (self.cors.is_enabled(), "cors"),
            (self.config.performance.enable_compression, "gzip"),
            (features.directory_listing, "directory-listing"),
            (features.spa.enabled, "spa"),
            (features.cache.etag, "etag"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BasicAuthConfig, Config};
    use tempfile::TempDir;

    #[test]
    fn test_enabled_features() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.server.root_dir = dir.path().to_string_lossy().into_owned();
        cfg.features.spa.enabled = true;
        cfg.security.basic_auth = Some(BasicAuthConfig {
            enabled: true,
            username: "admin".to_string(),
            password: "secret".to_string(),
            realm: String::new(),
        });

        let state = AppState::new(cfg.validate().unwrap());
        let features = state.enabled_features();
        assert!(features.contains(&"spa"));
        assert!(features.contains(&"basic-auth"));
        assert!(!features.contains(&"rate-limit"));
        assert!(!features.contains(&"https"));
    }
}
