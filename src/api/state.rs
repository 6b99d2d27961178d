//! Shared application state, owned by the server and handed to handlers

use crate::config::Config;
use crate::exchange::{build_adapter, AccountInfo, ActiveExchange, Credentials, ExchangeError, ExchangeKind};
use crate::feed::{
    BreakerConfig, ExchangeSource, PriceFeedHub, PriceOracle, PublicTickerSource, SourceChain,
};
use crate::scalp::{ControllerTiming, ScalpController};
use crate::signal::SignalEngine;
use crate::store::{CredentialStore, MemoryStore, TradingPairCache};
use std::sync::Arc;

/// Result of a successful connect
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    Connected(AccountInfo),
    /// Session kept but the account could not be verified
    Degraded { account: AccountInfo, warning: String },
}

pub struct AppState {
    pub config: Arc<Config>,
    pub exchange: ActiveExchange,
    pub hub: Arc<PriceFeedHub>,
    pub controller: ScalpController,
    pub credentials: Arc<dyn CredentialStore>,
    pub pairs: Arc<dyn TradingPairCache>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        exchange: ActiveExchange,
        hub: Arc<PriceFeedHub>,
        controller: ScalpController,
        credentials: Arc<dyn CredentialStore>,
        pairs: Arc<dyn TradingPairCache>,
    ) -> Self {
        AppState {
            config,
            exchange,
            hub,
            controller,
            credentials,
            pairs,
        }
    }

    /// Wire the feed hub, controller and stores for `config`
    ///
    /// Nothing is spawned; the caller starts the hub loop.
    pub fn from_config(
        config: Config,
        signals: Arc<dyn SignalEngine>,
    ) -> Result<Self, ExchangeError> {
        let config = Arc::new(config);
        let exchange = ActiveExchange::new();

        let mut chain = SourceChain::new(BreakerConfig {
            failure_threshold: config.feed.failure_threshold,
            cooldown: config.feed.cooldown(),
        })
        .with_source(Arc::new(ExchangeSource::new(exchange.clone())));
        if !config.feed.public_url.is_empty() {
            let http = reqwest::Client::builder()
                .timeout(config.exchange.request_timeout())
                .build()
                .map_err(|e| ExchangeError::Transport(e.to_string()))?;
            chain = chain.with_source(Arc::new(PublicTickerSource::new(
                http,
                config.feed.public_url.clone(),
            )));
        }
        let hub = Arc::new(PriceFeedHub::new(&config.feed, chain));

        let default_bot = config.bot.bot_config(config.exchange.default);
        let controller = ScalpController::new(
            ControllerTiming::from(&config.bot),
            default_bot,
            exchange.clone(),
            hub.clone() as Arc<dyn PriceOracle>,
            signals,
        );

        let store = Arc::new(MemoryStore::new());
        Ok(Self::new(
            config,
            exchange,
            hub,
            controller,
            store.clone(),
            store,
        ))
    }

    /// Build, connect and install an adapter for `kind`
    ///
    /// A degraded connection still installs the adapter and saves the
    /// credentials; any other failure leaves the current adapter in place.
    pub async fn connect_exchange(
        &self,
        kind: ExchangeKind,
        credentials: Credentials,
    ) -> Result<ConnectOutcome, ExchangeError> {
        credentials.validate()?;
        let adapter = build_adapter(
            kind,
            &self.config.exchange,
            credentials.is_testnet,
            self.config.feed.symbols.clone(),
            &self.config.feed.seed_prices,
        )?;

        let outcome = match adapter.connect(credentials.clone()).await {
            Ok(account) => ConnectOutcome::Connected(account),
            Err(ExchangeError::DegradedConnection(warning)) => ConnectOutcome::Degraded {
                account: AccountInfo::unverified(kind),
                warning,
            },
            Err(e) => {
                tracing::warn!(exchange = %kind, error = %e, "Exchange connect failed");
                return Err(e);
            }
        };

        self.exchange.install(adapter).await;
        self.credentials.save_credential(kind, credentials).await;
        tracing::info!(
            exchange = %kind,
            degraded = matches!(outcome, ConnectOutcome::Degraded { .. }),
            "Exchange adapter installed"
        );
        Ok(outcome)
    }
}
