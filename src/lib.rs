pub mod auth;
pub mod cache;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod proxy;
pub mod refresh;
pub mod role;
pub mod routes;
pub mod throttle;

use axum::{Router, middleware};
use config::{ConfigError, GatewayConfig};
use gateway::{Gateway, gate};
use proxy::{UpstreamProxy, forward};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use url::Url;

/// User agent sent to the identity backend and the upstream.
pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub struct ServerConfig {
    /// Authentication gateway settings
    pub gateway: GatewayConfig,
    /// Web app receiving every request the gateway lets through
    pub upstream: Url,
}

/// Put the gateway in front of `router`. The layer also covers the fallback.
pub fn protect(router: Router, gateway: Arc<Gateway>) -> Router {
    router.layer(middleware::from_fn_with_state(gateway, gate))
}

/// Create the application router: the gateway in front of the upstream proxy.
pub fn create_app(config: &ServerConfig, gateway: Arc<Gateway>) -> Result<Router, ConfigError> {
    let proxy = UpstreamProxy::new(config.upstream.clone(), config.gateway.refresh_timeout)?;
    let router = Router::new().fallback(forward).with_state(proxy);
    Ok(protect(router, gateway))
}

/// Start the cleanup scheduler for `gateway`.
pub fn init_cleanup(gateway: &Arc<Gateway>) -> tokio::task::JoinHandle<()> {
    cleanup::spawn_cleanup_scheduler(Arc::clone(gateway))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> std::io::Result<()> {
    let gateway = Arc::new(Gateway::new(config.gateway.clone()).map_err(std::io::Error::other)?);
    init_cleanup(&gateway);
    let app = create_app(&config, gateway).map_err(std::io::Error::other)?;
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> std::io::Result<(tokio::task::JoinHandle<()>, SocketAddr)> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
