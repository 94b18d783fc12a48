//! CLI argument parsing, validation, and startup helpers.

use std::time::Duration;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::ServerConfig;
use crate::config::{
    ConfigError, DEFAULT_CACHE_CAPACITY, Environment, GatewayConfig, parse_url,
};

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tollgate",
    about = "Edge authentication gateway with transparent credential refresh"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "TOLLGATE_PORT", default_value = "7300")]
    pub port: u16,

    /// Web app that receives every request the gateway lets through
    #[arg(short, long, env = "TOLLGATE_UPSTREAM")]
    pub upstream: String,

    /// Deployment environment, selects the default identity backend
    #[arg(short, long, env = "TOLLGATE_ENV", default_value = "development")]
    pub environment: Environment,

    /// Identity backend base URL, overrides the environment default
    #[arg(long, env = "TOLLGATE_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Seconds between two refresh attempts for the same refresh credential
    #[arg(long, env = "TOLLGATE_REFRESH_COOLDOWN_SECS", default_value = "30")]
    pub refresh_cooldown_secs: u64,

    /// Seconds a refresh result is served from cache
    #[arg(long, env = "TOLLGATE_CACHE_TTL_SECS", default_value = "60")]
    pub cache_ttl_secs: u64,

    /// Maximum number of cached refresh results
    #[arg(long, env = "TOLLGATE_CACHE_CAPACITY", default_value_t = DEFAULT_CACHE_CAPACITY)]
    pub cache_capacity: usize,

    /// Timeout in seconds for calls to the identity backend and upstream
    #[arg(long, env = "TOLLGATE_REFRESH_TIMEOUT_SECS", default_value = "5")]
    pub refresh_timeout_secs: u64,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format. `RUST_LOG` overrides the
/// default `info` level.
pub fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .init(),
    }
}

/// Build ServerConfig from parsed arguments.
pub fn build_config(args: &Args) -> Result<ServerConfig, ConfigError> {
    let mut gateway = GatewayConfig::for_environment(args.environment)?;

    if let Some(url) = args.backend_url.as_deref() {
        gateway.backend_url = parse_url(url)?;
    }
    gateway.refresh_cooldown = Duration::from_secs(args.refresh_cooldown_secs);
    gateway.cache_ttl = Duration::from_secs(args.cache_ttl_secs);
    gateway.cache_capacity = args.cache_capacity;
    gateway.refresh_timeout = Duration::from_secs(args.refresh_timeout_secs);
    gateway.validate()?;

    Ok(ServerConfig {
        gateway,
        upstream: parse_url(&args.upstream)?,
    })
}

/// Build the config, logging the error if it is invalid.
pub fn load_config(args: &Args) -> Option<ServerConfig> {
    match build_config(args) {
        Ok(config) => Some(config),
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            None
        }
    }
}
