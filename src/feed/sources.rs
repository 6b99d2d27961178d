//! Concrete price sources for the chain

use super::{PriceSource, PriceTick, SourceError, SourceKind};
use crate::exchange::{fetch_public_ticker, ActiveExchange};
use async_trait::async_trait;

/// Source (1): whichever exchange adapter is currently installed
///
/// Reports `Unavailable` while no adapter is connected, so a missing session
/// never counts against the breaker. A stale quote from a connected adapter
/// is a failure: its poller has stopped delivering.
pub struct ExchangeSource {
    active: ActiveExchange,
}

impl ExchangeSource {
    pub fn new(active: ActiveExchange) -> Self {
        Self { active }
    }
}

#[async_trait]
impl PriceSource for ExchangeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Exchange
    }

    async fn fetch(&self, symbol: &str) -> Result<PriceTick, SourceError> {
        let adapter = self.active.get().await.ok_or(SourceError::Unavailable)?;
        if !adapter.is_connected().await {
            return Err(SourceError::Unavailable);
        }

        let quote = adapter
            .get_price(symbol)
            .await
            .map_err(|e| SourceError::Failed(e.to_string()))?;
        if quote.stale {
            return Err(SourceError::Failed(format!(
                "{} quote for {symbol} is stale",
                adapter.kind()
            )));
        }
        Ok(quote.tick)
    }
}

/// Source (2): unauthenticated public futures ticker
pub struct PublicTickerSource {
    http: reqwest::Client,
    base_url: String,
}

impl PublicTickerSource {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PriceSource for PublicTickerSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Public
    }

    async fn fetch(&self, symbol: &str) -> Result<PriceTick, SourceError> {
        fetch_public_ticker(&self.http, &self.base_url, symbol)
            .await
            .map_err(|e| SourceError::Failed(e.to_string()))
    }
}
