//! Serve command implementation

use crate::api::{create_router, AppState, ConnectOutcome};
use crate::config::Config;
use crate::exchange::{Credentials, ExchangeKind};
use crate::signal::RandomSignalEngine;
use clap::Args;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address, overrides `server.bind`
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Exchange to auto-connect at startup, overrides `exchange.default`
    #[arg(short, long)]
    pub exchange: Option<ExchangeKind>,
}

impl ServeArgs {
    pub async fn execute(&self, mut config: Config) -> anyhow::Result<()> {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(exchange) = self.exchange {
            config.exchange.default = exchange;
        }
        let bind = config.server.bind.clone();
        let signals = Arc::new(RandomSignalEngine::new(config.signal.confidence_floor));
        let state = Arc::new(AppState::from_config(config, signals)?);

        auto_connect(&state).await;
        let hub_task = state.hub.clone().spawn();

        let listener = TcpListener::bind(&bind).await?;
        tracing::info!(addr = %listener.local_addr()?, "Dashboard API listening");
        axum::serve(listener, create_router(state.clone()))
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        hub_task.abort();
        if state.controller.stop().await.is_ok() {
            tracing::info!("Bot stopped on shutdown");
        }
        Ok(())
    }
}

/// Credentials for `kind` from the process environment
///
/// The simulated exchange needs none and always gets placeholder credentials.
pub fn credentials_from_env(kind: ExchangeKind, testnet: bool) -> Option<Credentials> {
    let (key_var, secret_var) = match kind {
        ExchangeKind::Binance => ("BINANCE_API_KEY", "BINANCE_API_SECRET"),
        ExchangeKind::Bybit => ("BYBIT_API_KEY", "BYBIT_API_SECRET"),
        ExchangeKind::Simulated => return Some(Credentials::new("simulated", "simulated", true)),
    };
    let api_key = std::env::var(key_var).ok()?;
    let api_secret = std::env::var(secret_var).ok()?;
    Some(Credentials::new(api_key, api_secret, testnet))
}

async fn auto_connect(state: &AppState) {
    let kind = state.config.exchange.default;
    let Some(credentials) = credentials_from_env(kind, state.config.exchange.testnet) else {
        tracing::info!(exchange = %kind, "No credentials in environment, waiting for connect request");
        return;
    };

    match state.connect_exchange(kind, credentials).await {
        Ok(ConnectOutcome::Connected(account)) => {
            tracing::info!(exchange = %kind, account_type = %account.account_type, "Auto-connected");
        }
        Ok(ConnectOutcome::Degraded { warning, .. }) => {
            tracing::warn!(exchange = %kind, %warning, "Auto-connected with degraded access");
        }
        Err(e) => {
            tracing::error!(exchange = %kind, error = %e, "Auto-connect failed, serving without exchange");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
