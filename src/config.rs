//! Gateway configuration, assembled once at startup and immutable afterwards.

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default identity backend for production deployments.
pub const PRODUCTION_BACKEND_URL: &str = "https://api.tollgate.io";

/// Default identity backend for local development.
pub const DEVELOPMENT_BACKEND_URL: &str = "http://localhost:5000";

pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Deployment environment, selects the default backend and cookie flags.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn default_backend_url(self) -> &'static str {
        match self {
            Self::Development => DEVELOPMENT_BACKEND_URL,
            Self::Production => PRODUCTION_BACKEND_URL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Identity backend base URL (the refresh path is appended).
    pub backend_url: Url,
    /// Minimum time between two refresh calls for one credential.
    pub refresh_cooldown: Duration,
    /// How long a refresh result is served from cache.
    pub cache_ttl: Duration,
    /// Soft upper bound on cached entries.
    pub cache_capacity: usize,
    /// Upper bound on one refresh call.
    pub refresh_timeout: Duration,
    /// Whether the credential-clearing cookies carry the Secure flag.
    pub secure_cookies: bool,
}

impl GatewayConfig {
    /// Defaults for `environment`, pointing at its default backend.
    pub fn for_environment(environment: Environment) -> Result<Self, ConfigError> {
        let backend_url = parse_url(environment.default_backend_url())?;
        Ok(Self {
            backend_url,
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            secure_cookies: environment == Environment::Production,
        })
    }

    /// Reject zero durations and capacities.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_cooldown.is_zero() {
            return Err(ConfigError::Zero("refresh cooldown"));
        }
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::Zero("cache TTL"));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Zero("cache capacity"));
        }
        if self.refresh_timeout.is_zero() {
            return Err(ConfigError::Zero("refresh timeout"));
        }
        Ok(())
    }
}

/// Parse an absolute http(s) URL.
pub fn parse_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        url: value.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            url: value.to_string(),
            reason: "scheme must be http or https".to_string(),
        });
    }

    Ok(url)
}
