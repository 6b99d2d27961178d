//! Current-price lookup used by the scalping controller

use super::PriceTick;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Read side of the feed: "give me the current price"
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn current_price(&self, symbol: &str) -> Option<PriceTick>;
}

/// Manually driven prices, for tests and offline tooling
#[derive(Debug, Default)]
pub struct StaticPrices {
    prices: RwLock<HashMap<String, Decimal>>,
}

impl StaticPrices {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, symbol: &str, price: Decimal) {
        self.prices.write().await.insert(symbol.to_string(), price);
    }

    pub async fn clear(&self, symbol: &str) {
        self.prices.write().await.remove(symbol);
    }
}

#[async_trait]
impl PriceOracle for StaticPrices {
    async fn current_price(&self, symbol: &str) -> Option<PriceTick> {
        self.prices
            .read()
            .await
            .get(symbol)
            .map(|price| PriceTick::seed(symbol, *price))
    }
}
