//! Exchange adapters
//!
//! Every supported exchange sits behind [`ExchangeAdapter`], so the feed hub
//! and the scalping controller never branch on exchange identity.

mod binance;
mod bybit;
mod cache;
mod simulated;
mod types;

pub use binance::{fetch_public_ticker, BinanceExchange};
pub use bybit::BybitExchange;
pub use cache::{Poller, QuoteCache};
pub use simulated::SimulatedExchange;
pub use types::{
    rank_pairs, reference_pairs, AccountInfo, Balance, CloseOutcome, Credentials, ExchangeError,
    ExchangeKind, ExchangePosition, ExchangeSession, OrderAck, OrderSide, PositionSide,
    PriceQuote, TradingPair, MAX_TRADING_PAIRS,
};

use crate::config::ExchangeConfig;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Common contract for one exchange
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn kind(&self) -> ExchangeKind;

    /// Accept credentials and start price polling
    ///
    /// Fails with `Auth` on structurally invalid credentials and keeps no
    /// session. Fails with `DegradedConnection` when the exchange could not
    /// validate them; the session is kept and the adapter counts as connected.
    async fn connect(&self, credentials: Credentials) -> Result<AccountInfo, ExchangeError>;

    /// Drop the session and stop polling
    async fn disconnect(&self);

    async fn is_connected(&self) -> bool;

    /// Most recent known price; stale when no live session backs it
    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, ExchangeError>;

    async fn get_open_positions(&self) -> Result<Vec<ExchangePosition>, ExchangeError>;

    /// Set leverage, then submit a market order
    async fn open_position(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        leverage: u32,
    ) -> Result<OrderAck, ExchangeError>;

    /// Flatten the resident position on `side` with an opposing market order
    async fn close_position(
        &self,
        symbol: &str,
        side: PositionSide,
    ) -> Result<CloseOutcome, ExchangeError>;

    async fn get_account_info(&self) -> Result<AccountInfo, ExchangeError>;

    /// Up to `MAX_TRADING_PAIRS` USDT pairs; falls back to the reference list
    async fn get_trading_pairs(&self) -> Vec<TradingPair>;
}

/// Slot holding the one installed adapter, shared by the feed and the controller
#[derive(Clone, Default)]
pub struct ActiveExchange {
    slot: Arc<RwLock<Option<Arc<dyn ExchangeAdapter>>>>,
}

impl ActiveExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<Arc<dyn ExchangeAdapter>> {
        self.slot.read().await.clone()
    }

    /// Install an adapter, disconnecting the one it replaces
    pub async fn install(&self, adapter: Arc<dyn ExchangeAdapter>) {
        let previous = self.slot.write().await.replace(adapter);
        if let Some(previous) = previous {
            tracing::info!(exchange = %previous.kind(), "Replacing exchange adapter");
            previous.disconnect().await;
        }
    }

    pub async fn is_connected(&self) -> bool {
        match self.get().await {
            Some(adapter) => adapter.is_connected().await,
            None => false,
        }
    }

    pub async fn kind(&self) -> Option<ExchangeKind> {
        self.get().await.map(|adapter| adapter.kind())
    }
}

/// Build an unconnected adapter for `kind`
///
/// `symbols` are polled once connected; `seeds` start the simulated walk.
pub fn build_adapter(
    kind: ExchangeKind,
    config: &ExchangeConfig,
    testnet: bool,
    symbols: Vec<String>,
    seeds: &HashMap<String, Decimal>,
) -> Result<Arc<dyn ExchangeAdapter>, ExchangeError> {
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| ExchangeError::Transport(e.to_string()))?;

    let adapter: Arc<dyn ExchangeAdapter> = match kind {
        ExchangeKind::Binance => Arc::new(BinanceExchange::new(
            http,
            config.base_url(kind, testnet),
            config,
            symbols,
        )),
        ExchangeKind::Bybit => Arc::new(BybitExchange::new(
            http,
            config.base_url(kind, testnet),
            config,
            symbols,
        )),
        ExchangeKind::Simulated => Arc::new(
            SimulatedExchange::new(seeds.clone()).with_poll_interval(config.poll_interval()),
        ),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn seeds() -> HashMap<String, Decimal> {
        HashMap::from([("BTCUSDT".to_string(), dec!(43250))])
    }

    #[tokio::test]
    async fn test_active_exchange_empty() {
        let active = ActiveExchange::new();
        assert!(active.get().await.is_none());
        assert!(!active.is_connected().await);
        assert!(active.kind().await.is_none());
    }

    #[tokio::test]
    async fn test_install_replaces_and_disconnects_previous() {
        let active = ActiveExchange::new();
        let first = Arc::new(SimulatedExchange::new(seeds()));
        first
            .connect(Credentials::new("k", "s", true))
            .await
            .unwrap();
        active.install(first.clone()).await;
        assert!(active.is_connected().await);

        let second = Arc::new(SimulatedExchange::new(seeds()));
        active.install(second).await;
        assert!(!first.is_connected().await);
        assert!(!active.is_connected().await);
    }

    #[test]
    fn test_build_adapter_kinds() {
        let config = ExchangeConfig::default();
        for kind in [
            ExchangeKind::Binance,
            ExchangeKind::Bybit,
            ExchangeKind::Simulated,
        ] {
            let adapter = build_adapter(kind, &config, false, vec![], &seeds()).unwrap();
            assert_eq!(adapter.kind(), kind);
        }
    }
}
