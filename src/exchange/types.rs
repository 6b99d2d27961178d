//! Exchange adapter types

use crate::feed::PriceTick;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Most pairs an adapter returns from `get_trading_pairs`
pub const MAX_TRADING_PAIRS: usize = 50;

/// Supported exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Binance,
    Bybit,
    /// In-process random walk, no network
    Simulated,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Binance => "binance",
            ExchangeKind::Bybit => "bybit",
            ExchangeKind::Simulated => "simulated",
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeKind {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binance" => Ok(ExchangeKind::Binance),
            "bybit" => Ok(ExchangeKind::Bybit),
            "simulated" => Ok(ExchangeKind::Simulated),
            other => Err(ExchangeError::Unsupported(format!("exchange {other}"))),
        }
    }
}

/// API credentials for one exchange account
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    #[serde(default)]
    pub is_testnet: bool,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>, is_testnet: bool) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            is_testnet,
        }
    }

    /// Structural check only; whether the exchange accepts them is a separate question
    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.api_key.trim().is_empty() {
            return Err(ExchangeError::Auth("API key is required".into()));
        }
        if self.api_secret.trim().is_empty() {
            return Err(ExchangeError::Auth("API secret is required".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &"***")
            .field("is_testnet", &self.is_testnet)
            .finish()
    }
}

fn redact(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{prefix}***")
}

/// A live session, owned by exactly one adapter
#[derive(Clone)]
pub struct ExchangeSession {
    pub exchange: ExchangeKind,
    pub credentials: Credentials,
    pub connected_at: DateTime<Utc>,
}

impl ExchangeSession {
    pub fn new(exchange: ExchangeKind, credentials: Credentials) -> Self {
        Self {
            exchange,
            credentials,
            connected_at: Utc::now(),
        }
    }
}

impl fmt::Debug for ExchangeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeSession")
            .field("exchange", &self.exchange)
            .field("credentials", &self.credentials)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Side of a resident position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Order side that opens this position
    pub fn opening_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Buy,
            PositionSide::Short => OrderSide::Sell,
        }
    }

    /// Order side that flattens this position
    pub fn closing_side(&self) -> OrderSide {
        self.opening_side().opposite()
    }
}

impl From<OrderSide> for PositionSide {
    fn from(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => PositionSide::Long,
            OrderSide::Sell => PositionSide::Short,
        }
    }
}

/// Exchange acknowledgement of a submitted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    /// Exchange-assigned order identity
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub status: String,
}

/// Result of `close_position`
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    Closed(OrderAck),
    /// No resident position on that side
    NothingToClose,
}

/// A position resident on the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangePosition {
    pub symbol: String,
    pub side: PositionSide,
    /// Absolute contract quantity
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub unrealized_pnl: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub asset: String,
    pub wallet_balance: Decimal,
    pub available: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub exchange: ExchangeKind,
    pub account_type: String,
    pub balances: Vec<Balance>,
    pub total_wallet_balance: Decimal,
    pub total_unrealized_pnl: Decimal,
}

impl AccountInfo {
    /// Placeholder returned when the account could not be read
    pub fn unverified(exchange: ExchangeKind) -> Self {
        Self {
            exchange,
            account_type: "UNVERIFIED".to_string(),
            balances: Vec::new(),
            total_wallet_balance: Decimal::ZERO,
            total_unrealized_pnl: Decimal::ZERO,
        }
    }
}

/// A tradable symbol as shown in the dashboard's pair picker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingPair {
    pub symbol: String,
    pub category: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub last_price: Decimal,
    #[serde(rename = "change24h", with = "rust_decimal::serde::float")]
    pub change_24h: Decimal,
    #[serde(rename = "volume24h", with = "rust_decimal::serde::float")]
    pub volume_24h: Decimal,
}

/// Price read from an adapter, flagged stale when it did not come from a live session
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub tick: PriceTick,
    pub stale: bool,
}

/// Exchange adapter errors
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Missing or malformed credentials
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Exchange reachable but restricted, or validation failed; credentials are still kept
    #[error("Degraded connection: {0}")]
    DegradedConnection(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Not connected to an exchange")]
    NotConnected,

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Exchange API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ExchangeError::Decode(e.to_string())
        } else {
            ExchangeError::Transport(e.to_string())
        }
    }
}

/// Built-in pair list used when the exchange cannot be asked
const REFERENCE_PAIRS: &[(&str, Decimal, Decimal, Decimal)] = &[
    ("BTCUSDT", dec!(43250), dec!(2.15), dec!(1250000000)),
    ("ETHUSDT", dec!(2250), dec!(1.85), dec!(850000000)),
    ("SOLUSDT", dec!(98.5), dec!(3.42), dec!(420000000)),
    ("BNBUSDT", dec!(315.2), dec!(0.95), dec!(180000000)),
    ("XRPUSDT", dec!(0.62), dec!(-0.45), dec!(160000000)),
    ("DOGEUSDT", dec!(0.085), dec!(1.12), dec!(95000000)),
    ("ADAUSDT", dec!(0.52), dec!(-1.05), dec!(85000000)),
    ("AVAXUSDT", dec!(36.8), dec!(2.75), dec!(78000000)),
    ("LINKUSDT", dec!(14.6), dec!(1.38), dec!(52000000)),
    ("DOTUSDT", dec!(7.2), dec!(-0.62), dec!(41000000)),
];

/// Fallback pair list so the pair picker never renders empty
pub fn reference_pairs() -> Vec<TradingPair> {
    REFERENCE_PAIRS
        .iter()
        .map(|(symbol, price, change, volume)| TradingPair {
            symbol: symbol.to_string(),
            category: "linear".to_string(),
            last_price: *price,
            change_24h: *change,
            volume_24h: *volume,
        })
        .collect()
}

/// Keep USDT-quoted pairs, highest volume first, capped at `MAX_TRADING_PAIRS`
pub fn rank_pairs(mut pairs: Vec<TradingPair>) -> Vec<TradingPair> {
    pairs.retain(|p| p.symbol.ends_with("USDT"));
    pairs.sort_by(|a, b| b.volume_24h.cmp(&a.volume_24h));
    pairs.truncate(MAX_TRADING_PAIRS);
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_kind_parse() {
        assert_eq!("Binance".parse::<ExchangeKind>().unwrap(), ExchangeKind::Binance);
        assert_eq!(" bybit ".parse::<ExchangeKind>().unwrap(), ExchangeKind::Bybit);
        assert!(matches!(
            "kraken".parse::<ExchangeKind>(),
            Err(ExchangeError::Unsupported(_))
        ));
    }

    #[test]
    fn test_credentials_validate() {
        assert!(Credentials::new("key", "secret", false).validate().is_ok());
        assert!(matches!(
            Credentials::new("", "secret", false).validate(),
            Err(ExchangeError::Auth(_))
        ));
        assert!(matches!(
            Credentials::new("key", "   ", false).validate(),
            Err(ExchangeError::Auth(_))
        ));
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials::new("abcdef123", "topsecret", true);
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("topsecret"));
        assert!(!debug.contains("abcdef123"));
        assert!(debug.contains("abcd***"));
    }

    #[test]
    fn test_position_sides() {
        assert_eq!(PositionSide::Long.closing_side(), OrderSide::Sell);
        assert_eq!(PositionSide::Short.closing_side(), OrderSide::Buy);
        assert_eq!(PositionSide::from(OrderSide::Sell), PositionSide::Short);
    }

    #[test]
    fn test_rank_pairs_filters_and_caps() {
        let mut pairs: Vec<TradingPair> = (0..60)
            .map(|i| TradingPair {
                symbol: format!("C{i}USDT"),
                category: "linear".into(),
                last_price: dec!(1),
                change_24h: dec!(0),
                volume_24h: Decimal::from(i),
            })
            .collect();
        pairs.push(TradingPair {
            symbol: "BTCUSDC".into(),
            category: "linear".into(),
            last_price: dec!(1),
            change_24h: dec!(0),
            volume_24h: dec!(1000000),
        });

        let ranked = rank_pairs(pairs);
        assert_eq!(ranked.len(), MAX_TRADING_PAIRS);
        assert_eq!(ranked[0].symbol, "C59USDT");
        assert!(ranked.iter().all(|p| p.symbol.ends_with("USDT")));
    }

    #[test]
    fn test_reference_pairs_nonempty() {
        let pairs = reference_pairs();
        assert!(!pairs.is_empty());
        assert_eq!(pairs[0].symbol, "BTCUSDT");
    }

    #[test]
    fn test_trading_pair_wire_format() {
        let json = serde_json::to_value(&reference_pairs()[0]).unwrap();
        assert_eq!(json["lastPrice"], 43250.0);
        assert_eq!(json["change24h"], 2.15);
        assert!(json.get("volume24h").is_some());
    }
}
