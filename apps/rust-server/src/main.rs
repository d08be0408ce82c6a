// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;

use exchange_rust_server::{
    api::router,
    auth::{TokenIssuer, VerificationKey},
    config::AppConfig,
    logging::init_logging,
    providers::{CoinGeckoFeed, HttpNotifier},
    services::AdminService,
    state::AppState,
    storage::Store,
    sweeper::CodeSweeper,
};

/// Time in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "Failed to install rustls crypto provider")?;

    let config = AppConfig::from_env()?;
    init_logging(config.log_format);

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Store::open(&config.database_path())?;
    tracing::info!(path = %config.database_path().display(), "Database opened");

    if let Some(seed) = &config.seed_superadmin {
        if AdminService::new(&store).seed_superadmin(&seed.email, &seed.password)? {
            tracing::info!(email = %seed.email, "Seeded superadmin account");
        }
    }

    if config.email.is_none() {
        tracing::warn!("Email delivery is not configured; OTPs are logged instead");
    }
    if config.sms.is_none() {
        tracing::warn!("SMS delivery is not configured; phone OTPs are logged instead");
    }
    let notifier = HttpNotifier::new(config.email.clone(), config.sms.clone())?;
    let price_feed = CoinGeckoFeed::new(config.price_feed_url.clone())?;

    let state = AppState::new(
        store,
        TokenIssuer::new(&config.jwt_secret, config.jwt_ttl),
        VerificationKey::new(config.verification_secret.as_bytes())
            .map_err(|_| "VERIFICATION_SECRET cannot be used as an HMAC key")?,
        Arc::new(notifier),
        Arc::new(price_feed),
        config.frontend_url.clone(),
    );

    // Background sweeper for expired verification codes
    let shutdown = CancellationToken::new();
    let sweeper = CodeSweeper::new(state.store.clone());
    let sweeper_task = tokio::spawn(sweeper.run(shutdown.clone()));

    let handle = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone(), shutdown.clone()));

    let app = router(state).into_make_service();
    let addr = config.bind_addr;

    match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
            tracing::info!(%addr, "Exchange server listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app)
                .await?;
        }
        None => {
            tracing::info!(%addr, "Exchange server listening on http (docs at /docs)");
            axum_server::bind(addr).handle(handle).serve(app).await?;
        }
    }

    shutdown.cancel();
    if let Err(e) = sweeper_task.await {
        tracing::warn!(error = %e, "Sweeper task ended abnormally");
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_on_signal(handle: Handle<SocketAddr>, shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections");
    shutdown.cancel();
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
