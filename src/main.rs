use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tollgate::cli::{Args, init_logging, load_config};
use tollgate::gateway::Gateway;
use tollgate::{create_app, init_cleanup};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(config) = load_config(&args) else {
        std::process::exit(1);
    };

    let gateway = match Gateway::new(config.gateway.clone()) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            error!(error = %e, "Failed to initialize gateway");
            std::process::exit(1);
        }
    };
    init_cleanup(&gateway);

    let app = match create_app(&config, gateway) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "Failed to initialize upstream proxy");
            std::process::exit(1);
        }
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    match listener.local_addr() {
        Ok(local_addr) => info!(
            address = %local_addr,
            backend = %config.gateway.backend_url,
            upstream = %config.upstream,
            "Listening"
        ),
        Err(e) => error!(error = %e, "Failed to read local address"),
    }

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, make_service).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
