//! Request and response bodies

use crate::exchange::{AccountInfo, Balance, ExchangeKind, TradingPair};
use crate::execution::ExecutionMode;
use crate::feed::{PriceTick, SourceKind};
use crate::scalp::{BotConfig, BotState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of `POST /api/exchange/connect`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    #[serde(default)]
    pub exchange: Option<ExchangeKind>,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default)]
    pub is_testnet: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub status: &'static str,
    pub exchange: ExchangeKind,
    pub account_type: String,
    pub balances: Vec<Balance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ConnectResponse {
    pub fn connected(account: AccountInfo) -> Self {
        Self {
            status: "CONNECTED",
            exchange: account.exchange,
            account_type: account.account_type,
            balances: account.balances,
            warning: None,
        }
    }

    pub fn degraded(account: AccountInfo, warning: String) -> Self {
        Self {
            status: "CONNECTED_DEGRADED",
            warning: Some(warning),
            ..Self::connected(account)
        }
    }
}

/// Body of `POST /api/bot/start`; omitted fields fall back to `[bot]` defaults
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBotRequest {
    #[serde(default)]
    pub exchange: Option<ExchangeKind>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub leverage: Option<u32>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub position_size: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub max_loss: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub confidence: Option<Decimal>,
    #[serde(default)]
    pub mode: Option<ExecutionMode>,
}

impl StartBotRequest {
    /// Overlay the request onto `base`
    pub fn apply(self, mut base: BotConfig) -> BotConfig {
        if let Some(exchange) = self.exchange {
            base.exchange = exchange;
        }
        if let Some(symbol) = self.symbol {
            base.symbol = symbol.trim().to_uppercase();
        }
        if let Some(leverage) = self.leverage {
            base.leverage = leverage;
        }
        if let Some(position_size) = self.position_size {
            base.position_size = position_size;
        }
        if let Some(max_loss) = self.max_loss {
            base.max_loss = max_loss;
        }
        if let Some(confidence) = self.confidence {
            base.confidence = confidence;
        }
        if let Some(mode) = self.mode {
            base.mode = mode;
        }
        base
    }
}

#[derive(Debug, Serialize)]
pub struct BotStartedResponse {
    pub status: &'static str,
    pub state: BotState,
    pub config: BotConfig,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub state: BotState,
}

#[derive(Debug, Serialize)]
pub struct MarketPriceResponse {
    #[serde(flatten)]
    pub tick: PriceTick,
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceKind>,
}

#[derive(Debug, Serialize)]
pub struct TradingPairsResponse {
    pub pairs: Vec<TradingPair>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub exchange: &'static str,
    pub bot_running: bool,
    pub price_subscribers: usize,
}
