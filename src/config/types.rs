// Configuration types module
// Defines all configuration-related data structures

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub performance: PerformanceConfig,
    pub features: FeaturesConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// Kept wider than `u16` so out-of-range values surface as validation errors
    pub port: u32,
    pub root_dir: String,
    pub workers: Option<usize>,
    /// Seconds allowed for a client to send request headers
    pub read_timeout: u64,
    pub keep_alive: bool,
    /// Seconds to wait for in-flight connections during shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            root_dir: ".".to_string(),
            workers: None,
            read_timeout: 15,
            keep_alive: true,
            shutdown_timeout: 30,
        }
    }
}

/// Security configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SecurityConfig {
    pub enable_https: bool,
    pub cert_file: String,
    pub key_file: String,
    pub basic_auth: Option<BasicAuthConfig>,
    pub allowed_ips: Vec<IpRule>,
    pub denied_ips: Vec<IpRule>,
    /// Peers whose `X-Forwarded-For` header is trusted for client identity
    pub trusted_proxies: Vec<IpRule>,
    /// Headers added to every response
    pub headers: BTreeMap<String, String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_https: false,
            cert_file: String::new(),
            key_file: String::new(),
            basic_auth: None,
            allowed_ips: Vec::new(),
            denied_ips: Vec::new(),
            trusted_proxies: Vec::new(),
            headers: default_security_headers(),
        }
    }
}

fn default_security_headers() -> BTreeMap<String, String> {
    [
        ("X-Content-Type-Options", "nosniff"),
        ("X-Frame-Options", "SAMEORIGIN"),
        ("X-XSS-Protection", "1; mode=block"),
        ("Referrer-Policy", "strict-origin-when-cross-origin"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Basic authentication configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct BasicAuthConfig {
    pub enabled: bool,
    pub username: String,
    pub password: String,
    pub realm: String,
}

/// Performance configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PerformanceConfig {
    pub enable_compression: bool,
    /// gzip level, 1-9 (out-of-range values fall back to 6)
    pub compression_level: u32,
    /// Bodies smaller than this are never compressed
    pub compression_min_size: u64,
    pub rate_limit: RateLimitConfig,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            enable_compression: true,
            compression_level: 6,
            compression_min_size: 1024,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Token bucket rate limiting configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_second: f64,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 10.0,
            burst: 20,
        }
    }
}

/// Feature toggles
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct FeaturesConfig {
    pub directory_listing: bool,
    pub spa: SpaConfig,
    pub cors: CorsConfig,
    pub cache: CacheConfig,
    /// Status code (as a decimal string) to page path
    pub custom_error_pages: BTreeMap<String, String>,
}

/// Single-page application fallback
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SpaConfig {
    pub enabled: bool,
    pub fallback_file: String,
}

impl Default for SpaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fallback_file: "index.html".to_string(),
        }
    }
}

/// Cross-origin resource sharing
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["GET".to_string(), "HEAD".to_string(), "OPTIONS".to_string()],
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            max_age: 86400,
        }
    }
}

/// HTTP caching validators
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// `Cache-Control: max-age` in seconds
    pub max_age: u64,
    pub etag: bool,
    pub weak_etag: bool,
    /// Hash file contents instead of path + size + mtime
    pub content_hash: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: 3600,
            etag: true,
            weak_etag: true,
            content_hash: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`
    pub format: String,
    pub access_log: bool,
    /// Access log format (combined, common, json)
    pub access_log_format: String,
    /// Log file path (optional, stdout if not set)
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            access_log: true,
            access_log_format: "combined".to_string(),
            file: None,
        }
    }
}

/// An IP address or CIDR block from an allow/deny/trusted list.
///
/// Bare addresses become single-host networks, so `10.0.0.1` and
/// `10.0.0.1/32` are equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpRule(IpNet);

impl IpRule {
    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.0.contains(&ip.to_canonical())
    }
}

impl std::str::FromStr for IpRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(net) = s.parse::<IpNet>() {
            return Ok(Self(net.trunc()));
        }
        s.parse::<IpAddr>()
            .map(|ip| Self(IpNet::from(ip.to_canonical())))
            .map_err(|_| format!("invalid IP address or CIDR block: '{s}'"))
    }
}

impl TryFrom<String> for IpRule {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IpRule> for String {
    fn from(rule: IpRule) -> Self {
        rule.to_string()
    }
}

impl fmt::Display for IpRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.prefix_len() == self.0.max_prefix_len() {
            write!(f, "{}", self.0.addr())
        } else {
            write!(f, "{}", self.0)
        }
    }
}
