// Configuration module entry point
// Loads, saves and validates the server configuration

mod state;
mod types;
mod validate;

use std::net::SocketAddr;
use std::path::Path;

// Re-export public types
pub use state::{AppState, SERVER_NAME};
pub use types::{
    BasicAuthConfig, CacheConfig, Config, CorsConfig, FeaturesConfig, IpRule, LoggingConfig,
    PerformanceConfig, RateLimitConfig, SecurityConfig, ServerConfig, SpaConfig,
};
pub use validate::{ValidConfig, ValidationReport, Violation, DEFAULT_REALM};

/// Errors raised while loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    Load(#[from] config::ConfigError),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write config file: {0}")]
    Write(#[from] std::io::Error),
}

/// Command line values that take precedence over the loaded file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub root_dir: Option<String>,
    pub directory_listing: bool,
}

impl Config {
    /// Load configuration from a file.
    ///
    /// The format follows the file extension (JSON, TOML or YAML). Values can
    /// be overridden with `QSERV__<SECTION>__<KEY>` environment variables.
    /// Missing sections and fields fall back to their defaults.
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(config_path).required(true))
            .add_source(config::Environment::with_prefix("QSERV").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load from an optional file, starting from defaults when none is given
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => Self::load_from(path),
            None => Ok(Self::default()),
        }
    }

    /// Write this configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Apply command line overrides
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(port) = overrides.port.filter(|p| *p > 0) {
            self.server.port = u32::from(port);
        }
        if let Some(host) = overrides.host.as_ref().filter(|h| !h.is_empty()) {
            self.server.host.clone_from(host);
        }
        if let Some(dir) = overrides.root_dir.as_ref().filter(|d| !d.is_empty()) {
            self.server.root_dir.clone_from(dir);
        }
        if overrides.directory_listing {
            self.features.directory_listing = true;
        }
    }
}

impl ValidConfig {
    pub fn get_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip(), self.port())
    }
}
