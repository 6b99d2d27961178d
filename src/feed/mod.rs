//! Price feed module
//!
//! Aggregates prices from a prioritized chain of sources (authenticated
//! exchange, public ticker, last known value) and fans them out to
//! price socket subscribers.

mod breaker;
mod chain;
mod hub;
mod oracle;
mod sources;
mod subscribers;
mod types;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use chain::{LinkHealth, SourceChain};
pub use hub::{PriceFeedHub, SourceCounts};
pub use oracle::{PriceOracle, StaticPrices};
pub use sources::{ExchangeSource, PublicTickerSource};
pub use subscribers::{BroadcastReport, SubscriberId, SubscriberRegistry, Subscription};
pub use types::{FeedEvent, PriceTick, SourceError, SourceKind};

use async_trait::async_trait;

/// One link in the price source chain
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Which slot of the chain this source fills
    fn kind(&self) -> SourceKind;

    /// Fetch the current tick for a symbol
    async fn fetch(&self, symbol: &str) -> Result<PriceTick, SourceError>;
}
