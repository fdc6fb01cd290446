// SPDX-License-Identifier: AGPL-3.0-or-later

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use spectra_server::api::router;
use spectra_server::chain::{RelayerSigner, SolanaRpc};
use spectra_server::config::Config;
use spectra_server::providers::{JupiterClient, ShadowWireClient};
use spectra_server::state::{AppState, TransferLocks};
use spectra_server::storage::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Arc::new(Config::from_env()?);

    let store = Arc::new(Store::open(&config.database_path())?);
    info!(path = %config.database_path().display(), "ledger database opened");

    let chain = Arc::new(SolanaRpc::new(config.solana_rpc_url.clone()));
    let pool = Arc::new(ShadowWireClient::new(
        config.shadowwire_base_url.clone(),
        config.shadowwire_api_key.clone(),
    )?);
    let swap = Arc::new(JupiterClient::new(
        config.jupiter_quote_url.clone(),
        config.jupiter_swap_url.clone(),
    )?);

    // Decode the relayer keypair exactly once; a bad key is a startup error,
    // an absent key only disables the transfer endpoint.
    let relayer = match &config.relayer_secret_key {
        Some(secret) => {
            let signer = Arc::new(RelayerSigner::from_base58(secret)?);
            info!(address = %signer.address(), "relayer configured");
            Some(signer)
        }
        None => {
            warn!("RELAYER_SECRET_KEY not set; transfer endpoint disabled");
            None
        }
    };

    let state = AppState {
        config: config.clone(),
        store,
        chain,
        pool,
        swap,
        relayer,
        transfer_locks: TransferLocks::default(),
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Spectra server listening (docs at /docs)");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_env_filter(filter)
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
