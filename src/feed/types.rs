//! Price feed types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A normalized price observation for one symbol
///
/// Serializes to the dashboard wire format:
/// `{symbol, price, bid?, ask?, percentChange, volume24h, timestamp}` with
/// prices as JSON numbers and `timestamp` in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTick {
    /// Trading symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Last traded price
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Best bid, when the source provides one
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub bid: Option<Decimal>,
    /// Best ask, when the source provides one
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub ask: Option<Decimal>,
    /// 24h change in percent
    #[serde(rename = "percentChange", with = "rust_decimal::serde::float")]
    pub percent_change_24h: Decimal,
    /// 24h quote volume
    #[serde(with = "rust_decimal::serde::float")]
    pub volume_24h: Decimal,
    /// Observation time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    /// A bare tick carrying only a price, stamped now
    pub fn seed(symbol: impl Into<String>, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            bid: None,
            ask: None,
            percent_change_24h: Decimal::ZERO,
            volume_24h: Decimal::ZERO,
            timestamp: Utc::now(),
        }
    }

    /// Attach best bid/ask
    pub fn with_quotes(mut self, bid: Decimal, ask: Decimal) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self
    }

    /// Age of the observation
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.timestamp
    }
}

/// Where a broadcast tick came from, in chain priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Authenticated exchange adapter
    Exchange,
    /// Public unauthenticated ticker
    Public,
    /// Last successfully observed value
    Cache,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Exchange => "exchange",
            SourceKind::Public => "public",
            SourceKind::Cache => "cache",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message on the price socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    #[serde(flatten)]
    pub tick: PriceTick,
    pub source: SourceKind,
}

/// Price source failures
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Source cannot be asked right now (e.g. no exchange session); not a failure
    #[error("Source unavailable")]
    Unavailable,
    /// Source was asked and failed; counts toward demotion
    #[error("Source failed: {0}")]
    Failed(String),
}
