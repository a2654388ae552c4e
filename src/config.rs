//! Configuration management for Skygate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{GatewayError, Result};
use crate::ratelimit::Quota;

/// Prefix for environment overrides, e.g. `SKYGATE__RATE_LIMITING__LIMIT=50`.
pub const ENV_PREFIX: &str = "SKYGATE";

/// Main configuration for the Skygate gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// CORS headers attached to guarded routes
    #[serde(default)]
    pub cors: CorsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Requests allowed per client per window
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// How often expired records are swept, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Only paths under this prefix are limited
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    /// Header carrying the client address
    #[serde(default = "default_client_ip_header")]
    pub client_ip_header: String,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_ms: default_window_ms(),
            sweep_interval_secs: default_sweep_interval(),
            path_prefix: default_path_prefix(),
            client_ip_header: default_client_ip_header(),
        }
    }
}

fn default_limit() -> u32 {
    100
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_path_prefix() -> String {
    "/api/v1".to_string()
}

fn default_client_ip_header() -> String {
    "x-forwarded-for".to_string()
}

impl RateLimitingConfig {
    /// The configured quota.
    pub fn quota(&self) -> Result<Quota> {
        Quota::new(self.limit, self.window_ms)
    }

    /// The configured sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allow_origin")]
    pub allow_origin: String,

    #[serde(default = "default_allow_methods")]
    pub allow_methods: String,

    #[serde(default = "default_allow_headers")]
    pub allow_headers: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: default_allow_origin(),
            allow_methods: default_allow_methods(),
            allow_headers: default_allow_headers(),
        }
    }
}

fn default_allow_origin() -> String {
    "*".to_string()
}

fn default_allow_methods() -> String {
    "GET, POST, OPTIONS".to_string()
}

fn default_allow_headers() -> String {
    "Content-Type, Authorization".to_string()
}

impl GatewayConfig {
    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading gateway configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GatewayError::Config(format!("Failed to parse gateway config: {}", e)))
    }

    /// Load the optional file, layer `SKYGATE__*` environment variables on
    /// top, and validate the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SKYGATE__SECTION__FIELD` environment variables over `self`.
    pub fn with_env_overrides(self) -> Result<Self> {
        let env = config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true);
        self.with_source(env)
    }

    fn with_source<S>(self, source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let base = config::Config::try_from(&self).map_err(config_error)?;
        config::Config::builder()
            .add_source(base)
            .add_source(source)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)
    }

    /// Check values that would make the gateway misbehave.
    pub fn validate(&self) -> Result<()> {
        self.rate_limiting
            .quota()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        if self.rate_limiting.sweep_interval_secs == 0 {
            return Err(GatewayError::Config(
                "rate_limiting.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }

        if !self.rate_limiting.path_prefix.starts_with('/') {
            return Err(GatewayError::Config(format!(
                "rate_limiting.path_prefix must start with '/': {}",
                self.rate_limiting.path_prefix
            )));
        }

        if self.rate_limiting.client_ip_header.trim().is_empty() {
            return Err(GatewayError::Config(
                "rate_limiting.client_ip_header must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn config_error(e: config::ConfigError) -> GatewayError {
    GatewayError::Config(e.to_string())
}
