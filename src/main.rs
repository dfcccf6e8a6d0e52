mod api;
mod config;
mod core;
mod logger;
mod models;
mod services;

use std::net::SocketAddr;

use tokio::signal;
use tracing::{error, info};

use crate::services::gateway::Gateway;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cfg = match config::Config::init_global() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("Failed to load config: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = logger::init_logger(cfg) {
        eprintln!("Failed to init logger: {err}");
        std::process::exit(1);
    }

    cfg.print();

    let gateway = match Gateway::from_config(cfg) {
        Ok(gateway) => gateway,
        Err(err) => {
            error!("Failed to build gateway: {err}");
            std::process::exit(1);
        }
    };

    let app = api::router(cfg, gateway);

    let host = cfg.host.parse().unwrap_or_else(|_| std::net::Ipv4Addr::UNSPECIFIED.into());
    let addr = SocketAddr::new(host, cfg.port);
    info!("Server running on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(err) => {
            error!("Failed to bind: {err}");
            std::process::exit(1);
        }
    };

    let server = axum::serve(listener, app);

    if let Err(err) = server.with_graceful_shutdown(shutdown_signal()).await {
        error!("Server error: {err}");
    }
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("Shutdown signal received");
}
