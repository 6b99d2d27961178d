//! Configuration types for scalp-hub

use crate::exchange::ExchangeKind;
use crate::execution::ExecutionMode;
use crate::scalp::BotConfig;
use crate::telemetry::LogFormat;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// File is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// Values are inconsistent
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub bot: BotDefaults,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for the dashboard API and price socket
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

/// Price feed hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Symbols broadcast on every tick
    pub symbols: Vec<String>,
    /// Known starting price per symbol; the hub never invents a first value
    pub seed_prices: HashMap<String, Decimal>,
    /// Interval between feed ticks
    pub poll_interval_ms: u64,
    /// Consecutive source failures before the source is demoted
    pub failure_threshold: u32,
    /// How long a demoted source stays out of the chain
    pub cooldown_secs: u64,
    /// Base URL of the public ticker aggregator (empty disables it)
    pub public_url: String,
    /// Per-subscriber queue depth before ticks are dropped for that subscriber
    pub subscriber_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string()],
            seed_prices: HashMap::from([("BTCUSDT".to_string(), dec!(43250))]),
            poll_interval_ms: 1000,
            failure_threshold: 3,
            cooldown_secs: 30,
            public_url: "https://fapi.binance.com".to_string(),
            subscriber_buffer: 64,
        }
    }
}

impl FeedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Exchange adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Exchange used when a request does not name one
    pub default: ExchangeKind,
    /// Use the exchange testnet when a request does not say otherwise
    pub testnet: bool,
    /// REST request timeout
    pub request_timeout_secs: u64,
    /// Signed request validity window
    pub recv_window_ms: u64,
    /// Adapter-internal price polling interval
    pub poll_interval_ms: u64,
    pub binance_url: String,
    pub binance_testnet_url: String,
    pub bybit_url: String,
    pub bybit_testnet_url: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            default: ExchangeKind::Binance,
            testnet: false,
            request_timeout_secs: 10,
            recv_window_ms: 5000,
            poll_interval_ms: 1000,
            binance_url: "https://fapi.binance.com".to_string(),
            binance_testnet_url: "https://testnet.binancefuture.com".to_string(),
            bybit_url: "https://api.bybit.com".to_string(),
            bybit_testnet_url: "https://api-testnet.bybit.com".to_string(),
        }
    }
}

impl ExchangeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// REST base URL for an exchange and network
    pub fn base_url(&self, kind: ExchangeKind, testnet: bool) -> &str {
        match (kind, testnet) {
            (ExchangeKind::Binance, false) => &self.binance_url,
            (ExchangeKind::Binance, true) => &self.binance_testnet_url,
            (ExchangeKind::Bybit, false) => &self.bybit_url,
            (ExchangeKind::Bybit, true) => &self.bybit_testnet_url,
            (ExchangeKind::Simulated, _) => "",
        }
    }
}

/// Scalping bot runtime settings and start-request defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotDefaults {
    /// Interval between signal evaluations
    pub tick_interval_ms: u64,
    /// Shortest holding time before auto-close
    pub min_hold_ms: u64,
    /// Longest holding time before auto-close
    pub max_hold_ms: u64,
    pub symbol: String,
    pub leverage: u32,
    /// Position size in quote currency (USDT)
    pub position_size: Decimal,
    /// Daily loss ceiling in quote currency
    pub max_loss: Decimal,
    /// Minimum signal confidence (exclusive)
    pub confidence: Decimal,
    pub mode: ExecutionMode,
}

impl Default for BotDefaults {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            min_hold_ms: 2000,
            max_hold_ms: 5000,
            symbol: "BTCUSDT".to_string(),
            leverage: 20,
            position_size: dec!(100),
            max_loss: dec!(50),
            confidence: dec!(90),
            mode: ExecutionMode::Paper,
        }
    }
}

impl BotDefaults {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn hold_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.min_hold_ms),
            Duration::from_millis(self.max_hold_ms),
        )
    }

    /// Bot configuration used for fields a start request leaves out
    pub fn bot_config(&self, exchange: ExchangeKind) -> BotConfig {
        BotConfig {
            exchange,
            symbol: self.symbol.clone(),
            leverage: self.leverage,
            position_size: self.position_size,
            max_loss: self.max_loss,
            confidence: self.confidence,
            mode: self.mode,
        }
    }
}

/// Signal engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Signals sampled below this confidence are never emitted
    pub confidence_floor: Decimal,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            confidence_floor: dec!(85),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Prometheus exporter port (disabled when absent)
    pub metrics_port: Option<u16>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the feed hub or controller cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.symbols.is_empty() {
            return Err(ConfigError::Invalid("feed.symbols is empty".into()));
        }
        for symbol in &self.feed.symbols {
            match self.feed.seed_prices.get(symbol) {
                Some(price) if *price > Decimal::ZERO => {}
                Some(_) => {
                    return Err(ConfigError::Invalid(format!(
                        "seed price for {symbol} must be positive"
                    )))
                }
                None => {
                    return Err(ConfigError::Invalid(format!(
                        "no seed price for tracked symbol {symbol}"
                    )))
                }
            }
        }
        if self.feed.poll_interval_ms == 0 || self.exchange.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll intervals must be non-zero".into()));
        }
        if self.feed.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "feed.failure_threshold must be at least 1".into(),
            ));
        }
        if self.feed.subscriber_buffer == 0 {
            return Err(ConfigError::Invalid(
                "feed.subscriber_buffer must be at least 1".into(),
            ));
        }
        if self.bot.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("bot.tick_interval_ms must be non-zero".into()));
        }
        if self.bot.min_hold_ms > self.bot.max_hold_ms {
            return Err(ConfigError::Invalid(
                "bot.min_hold_ms exceeds bot.max_hold_ms".into(),
            ));
        }
        Ok(())
    }
}
