//! # Relist API server
//!
//! Entry point for the `relist-api` binary. Loads configuration,
//! initializes logging, wires the escrow engine together, and serves the
//! HTTP API until a shutdown signal arrives.

mod api;
mod config;
mod logging;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;

use escrow_engine::payment_gateway::{GatewayConfig, RazorpayGateway};
use escrow_engine::store::MemoryStore;
use escrow_engine::transaction_manager::{TransactionManager, TransactionManagerConfig};
use escrow_engine::verification_service::SignatureVerifier;

use config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init("relist_api=info,escrow_engine=info,tower_http=info");

    let cfg = AppConfig::load().context("failed to load configuration")?;

    if cfg.razorpay.webhook_secret.is_empty() {
        tracing::warn!("razorpay.webhook_secret is empty; payment callbacks will never verify");
    }

    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(
        RazorpayGateway::new(GatewayConfig {
            api_url: cfg.razorpay.api_url.clone(),
            key_id: cfg.razorpay.key_id.clone(),
            key_secret: cfg.razorpay.key_secret.clone(),
            timeout_secs: cfg.razorpay.timeout_secs,
        })
        .context("failed to build gateway client")?,
    );
    let manager = Arc::new(TransactionManager::new(
        TransactionManagerConfig {
            currency: cfg.currency.clone(),
            max_amount: cfg.max_amount,
        },
        store,
        gateway,
        SignatureVerifier::new(cfg.razorpay.webhook_secret.clone()),
    ));

    let router = api::create_router(api::AppState { manager });

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", cfg.listen_addr))?;
    tracing::info!("API server listening on {}", cfg.listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    tracing::info!("relist-api stopped");
    Ok(())
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
