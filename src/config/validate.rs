// Configuration validation module
// Single pass that turns a raw `Config` into an immutable `ValidConfig`

use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::StatusCode;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::net::IpAddr;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use super::types::Config;

pub const DEFAULT_REALM: &str = "Restricted";
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];
const ACCESS_LOG_FORMATS: [&str; 3] = ["combined", "common", "json"];

/// A single failed validation rule
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Violation {
    #[error("invalid port: {0} (must be between 1-65535)")]
    InvalidPort(u32),
    #[error("invalid bind address '{0}'")]
    InvalidHost(String),
    #[error("root directory error: {0}")]
    RootDirMissing(String),
    #[error("root path is not a directory: {0}")]
    RootNotDirectory(String),
    #[error("HTTPS enabled but cert_file or key_file not specified")]
    TlsPathsMissing,
    #[error("{kind} file not readable: {path}")]
    TlsFileUnreadable { kind: &'static str, path: String },
    #[error("basic auth enabled but username or password not specified")]
    BasicAuthCredentialsMissing,
    #[error("rate limit requests_per_second must be a positive number, got {0}")]
    InvalidRequestRate(f64),
    #[error("rate limit burst must be at least 1")]
    InvalidBurst,
    #[error("invalid custom error page status '{0}' (must be 400-599)")]
    InvalidErrorStatus(String),
    #[error("invalid security header '{name}: {value}'")]
    InvalidSecurityHeader { name: String, value: String },
    #[error("SPA fallback file must be a relative path inside the root directory: {0}")]
    InvalidSpaFallback(String),
    #[error("unknown access log format '{0}' (expected combined, common or json)")]
    InvalidAccessLogFormat(String),
}

/// Every violation found during validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "configuration validation failed ({} errors)",
            self.violations.len()
        )?;
        for violation in &self.violations {
            write!(f, "\n  - {violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// Configuration that passed validation.
///
/// Immutable for the server lifetime; dereferences to the underlying
/// [`Config`] and carries the values derived during validation.
#[derive(Debug, Clone)]
pub struct ValidConfig {
    config: Config,
    root: PathBuf,
    bind_ip: IpAddr,
    error_pages: HashMap<StatusCode, PathBuf>,
    security_headers: HeaderMap,
}

impl ValidConfig {
    /// Canonical root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn error_pages(&self) -> &HashMap<StatusCode, PathBuf> {
        &self.error_pages
    }

    pub const fn security_headers(&self) -> &HeaderMap {
        &self.security_headers
    }

    pub fn port(&self) -> u16 {
        u16::try_from(self.config.server.port).unwrap_or(u16::MAX)
    }

    /// Parsed listen address
    pub const fn bind_ip(&self) -> IpAddr {
        self.bind_ip
    }
}

impl Deref for ValidConfig {
    type Target = Config;

    fn deref(&self) -> &Config {
        &self.config
    }
}

impl Config {
    /// Validate and normalize the configuration.
    ///
    /// Collects every violation instead of stopping at the first one.
    /// Soft fields are defaulted rather than rejected: an empty realm becomes
    /// `Restricted`, an out-of-range compression level becomes 6 and an
    /// unknown log level becomes `info`.
    pub fn validate(mut self) -> Result<ValidConfig, ValidationReport> {
        let mut report = ValidationReport::default();

        if self.server.port < 1 || self.server.port > 65535 {
            report.push(Violation::InvalidPort(self.server.port));
        }
        let bind_ip = parse_bind_host(&self.server.host);
        if bind_ip.is_none() {
            report.push(Violation::InvalidHost(self.server.host.clone()));
        }

        let root = match std::fs::metadata(&self.server.root_dir) {
            Err(e) => {
                report.push(Violation::RootDirMissing(e.to_string()));
                None
            }
            Ok(meta) if !meta.is_dir() => {
                report.push(Violation::RootNotDirectory(self.server.root_dir.clone()));
                None
            }
            Ok(_) => match Path::new(&self.server.root_dir).canonicalize() {
                Ok(p) => Some(p),
                Err(e) => {
                    report.push(Violation::RootDirMissing(e.to_string()));
                    None
                }
            },
        };

        self.validate_tls(&mut report);

        if let Some(auth) = self.security.basic_auth.as_mut() {
            if auth.enabled {
                if auth.username.is_empty() || auth.password.is_empty() {
                    report.push(Violation::BasicAuthCredentialsMissing);
                }
                if auth.realm.is_empty() {
                    auth.realm = DEFAULT_REALM.to_string();
                }
            }
        }

        let perf = &mut self.performance;
        if !(1..=9).contains(&perf.compression_level) {
            perf.compression_level = DEFAULT_COMPRESSION_LEVEL;
        }
        if perf.rate_limit.enabled {
            let rate = perf.rate_limit.requests_per_second;
            if !rate.is_finite() || rate <= 0.0 {
                report.push(Violation::InvalidRequestRate(rate));
            }
            if perf.rate_limit.burst < 1 {
                report.push(Violation::InvalidBurst);
            }
        }

        if self.features.spa.enabled && !is_plain_relative(&self.features.spa.fallback_file) {
            report.push(Violation::InvalidSpaFallback(
                self.features.spa.fallback_file.clone(),
            ));
        }

        let base = root
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.server.root_dir));
        let error_pages = self.parse_error_pages(&base, &mut report);
        let security_headers = self.parse_security_headers(&mut report);

        let level = self.logging.level.to_ascii_lowercase();
        self.logging.level = if LOG_LEVELS.contains(&level.as_str()) {
            level
        } else {
            DEFAULT_LOG_LEVEL.to_string()
        };
        if !ACCESS_LOG_FORMATS.contains(&self.logging.access_log_format.as_str()) {
            report.push(Violation::InvalidAccessLogFormat(
                self.logging.access_log_format.clone(),
            ));
        }

        match (root, bind_ip) {
            (Some(root), Some(bind_ip)) if !report.has_violations() => Ok(ValidConfig {
                config: self,
                root,
                bind_ip,
                error_pages,
                security_headers,
            }),
            _ => Err(report),
        }
    }

    fn validate_tls(&self, report: &mut ValidationReport) {
        let security = &self.security;
        if !security.enable_https {
            return;
        }
        if security.cert_file.is_empty() || security.key_file.is_empty() {
            report.push(Violation::TlsPathsMissing);
            return;
        }
        for (kind, path) in [("certificate", &security.cert_file), ("key", &security.key_file)] {
            if File::open(path).is_err() {
                report.push(Violation::TlsFileUnreadable {
                    kind,
                    path: path.clone(),
                });
            }
        }
    }

    fn parse_error_pages(
        &self,
        base: &Path,
        report: &mut ValidationReport,
    ) -> HashMap<StatusCode, PathBuf> {
        let mut pages = HashMap::new();
        for (code, page) in &self.features.custom_error_pages {
            let status = code
                .trim()
                .parse::<u16>()
                .ok()
                .and_then(|c| StatusCode::from_u16(c).ok())
                .filter(|s| s.is_client_error() || s.is_server_error());
            match status {
                Some(status) => {
                    pages.insert(status, base.join(page));
                }
                None => report.push(Violation::InvalidErrorStatus(code.clone())),
            }
        }
        pages
    }

    fn parse_security_headers(&self, report: &mut ValidationReport) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.security.headers {
            let parsed = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            );
            match parsed {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => report.push(Violation::InvalidSecurityHeader {
                    name: name.clone(),
                    value: value.clone(),
                }),
            }
        }
        headers
    }
}

/// IP literal (optionally bracketed) or `localhost`
fn parse_bind_host(host: &str) -> Option<IpAddr> {
    let host = host.trim();
    if host.eq_ignore_ascii_case("localhost") {
        return Some(IpAddr::from([127, 0, 0, 1]));
    }
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    host.parse().ok()
}

/// Relative path with no parent or root components
fn is_plain_relative(path: &str) -> bool {
    use std::path::Component;
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::BasicAuthConfig;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir) -> Config {
        let mut cfg = Config::default();
        cfg.server.root_dir = dir.path().to_string_lossy().into_owned();
        cfg
    }

    #[test]
    fn test_default_config_is_valid() {
        let dir = TempDir::new().unwrap();
        let valid = config_for(&dir).validate().unwrap();
        assert_eq!(valid.root(), dir.path().canonicalize().unwrap());
        assert_eq!(valid.port(), 8080);
        assert!(valid.security_headers().contains_key("x-content-type-options"));
    }

    #[test]
    fn test_collects_all_violations() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        cfg.server.root_dir = "/definitely/not/here".to_string();
        cfg.security.enable_https = true;
        cfg.security.basic_auth = Some(BasicAuthConfig {
            enabled: true,
            ..BasicAuthConfig::default()
        });

        let report = cfg.validate().unwrap_err();
        assert!(report.violations.contains(&Violation::InvalidPort(0)));
        assert!(report.violations.contains(&Violation::TlsPathsMissing));
        assert!(report
            .violations
            .contains(&Violation::BasicAuthCredentialsMissing));
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, Violation::RootDirMissing(_))));
        assert!(report.to_string().contains("4 errors"));
    }

    #[test]
    fn test_bind_host_must_be_an_address() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config_for(&dir);
        cfg.server.host = "example.com".to_string();
        cfg.server.port = 0;
        let report = cfg.validate().unwrap_err();
        assert!(report
            .violations
            .contains(&Violation::InvalidHost("example.com".to_string())));
        assert!(report.violations.contains(&Violation::InvalidPort(0)));

        for (host, expected) in [
            ("localhost", "127.0.0.1"),
            ("[::1]", "::1"),
            ("0.0.0.0", "0.0.0.0"),
        ] {
            let mut cfg = config_for(&dir);
            cfg.server.host = host.to_string();
            let valid = cfg.validate().unwrap();
            assert_eq!(valid.bind_ip(), expected.parse::<IpAddr>().unwrap());
        }
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        let mut cfg = Config::default();
        cfg.server.root_dir = file.to_string_lossy().into_owned();
        let report = cfg.validate().unwrap_err();
        assert!(matches!(
            report.violations.as_slice(),
            [Violation::RootNotDirectory(_)]
        ));
    }

    #[test]
    fn test_missing_tls_files() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config_for(&dir);
        cfg.security.enable_https = true;
        cfg.security.cert_file = "/nope/cert.pem".to_string();
        cfg.security.key_file = "/nope/key.pem".to_string();
        let report = cfg.validate().unwrap_err();
        assert_eq!(report.violations.len(), 2);
    }

    #[test]
    fn test_soft_fields_are_defaulted() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config_for(&dir);
        cfg.performance.compression_level = 42;
        cfg.logging.level = "verbose".to_string();
        cfg.security.basic_auth = Some(BasicAuthConfig {
            enabled: true,
            username: "admin".to_string(),
            password: "secret".to_string(),
            realm: String::new(),
        });

        let valid = cfg.validate().unwrap();
        assert_eq!(valid.performance.compression_level, DEFAULT_COMPRESSION_LEVEL);
        assert_eq!(valid.logging.level, "info");
        assert_eq!(
            valid.security.basic_auth.as_ref().unwrap().realm,
            DEFAULT_REALM
        );
    }

    #[test]
    fn test_rate_limit_bounds() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config_for(&dir);
        cfg.performance.rate_limit.enabled = true;
        cfg.performance.rate_limit.requests_per_second = 0.0;
        cfg.performance.rate_limit.burst = 0;
        let report = cfg.validate().unwrap_err();
        assert_eq!(report.violations.len(), 2);
    }

    #[test]
    fn test_error_pages_are_keyed_by_status() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config_for(&dir);
        cfg.features
            .custom_error_pages
            .insert("404".to_string(), "404.html".to_string());
        let valid = cfg.validate().unwrap();
        let page = valid.error_pages().get(&StatusCode::NOT_FOUND).unwrap();
        assert!(page.ends_with("404.html"));
        assert!(page.starts_with(valid.root()));

        let mut cfg = config_for(&dir);
        cfg.features
            .custom_error_pages
            .insert("200".to_string(), "ok.html".to_string());
        cfg.features
            .custom_error_pages
            .insert("abc".to_string(), "x.html".to_string());
        assert_eq!(cfg.validate().unwrap_err().violations.len(), 2);
    }

    #[test]
    fn test_invalid_security_header() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config_for(&dir);
        cfg.security
            .headers
            .insert("Bad Header".to_string(), "v".to_string());
        let report = cfg.validate().unwrap_err();
        assert!(matches!(
            report.violations.as_slice(),
            [Violation::InvalidSecurityHeader { .. }]
        ));
    }

    #[test]
    fn test_spa_fallback_must_stay_inside_root() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config_for(&dir);
        cfg.features.spa.enabled = true;
        cfg.features.spa.fallback_file = "../outside.html".to_string();
        assert!(cfg.validate().is_err());
    }
}
