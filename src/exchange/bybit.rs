//! Bybit v5 adapter for USDT linear perpetuals
//!
//! Signed requests send `X-BAPI-API-KEY`, `X-BAPI-TIMESTAMP`,
//! `X-BAPI-RECV-WINDOW` and `X-BAPI-SIGN`, where the signature is
//! HMAC-SHA256 over `timestamp + key + recv_window + (query | body)`.
//! Every response is wrapped in a `{retCode, retMsg, result}` envelope.

use super::cache::{Poller, QuoteCache};
use super::{
    rank_pairs, reference_pairs, AccountInfo, Balance, CloseOutcome, Credentials, ExchangeAdapter,
    ExchangeError, ExchangeKind, ExchangePosition, ExchangeSession, OrderAck, OrderSide,
    PositionSide, PriceQuote, TradingPair,
};
use crate::config::ExchangeConfig;
use crate::feed::PriceTick;
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use sha2::Sha256;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

type HmacSha256 = Hmac<Sha256>;

/// `set-leverage` answer when the leverage is already at the requested value
const LEVERAGE_NOT_MODIFIED: i64 = 110043;

/// Bybit sends "" for absent numeric fields
fn lenient_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(&raw).map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    ret_code: i64,
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ListResult<T> {
    list: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    symbol: String,
    #[serde(deserialize_with = "lenient_decimal")]
    last_price: Decimal,
    #[serde(default, deserialize_with = "lenient_decimal")]
    bid1_price: Decimal,
    #[serde(default, deserialize_with = "lenient_decimal")]
    ask1_price: Decimal,
    /// Fraction, not percent
    #[serde(rename = "price24hPcnt", deserialize_with = "lenient_decimal")]
    price_24h_pcnt: Decimal,
    #[serde(rename = "turnover24h", deserialize_with = "lenient_decimal")]
    turnover_24h: Decimal,
}

impl Ticker {
    fn percent_change(&self) -> Decimal {
        self.price_24h_pcnt * Decimal::ONE_HUNDRED
    }

    fn into_tick(self) -> PriceTick {
        let mut tick = PriceTick {
            percent_change_24h: self.percent_change(),
            volume_24h: self.turnover_24h,
            ..PriceTick::seed(self.symbol, self.last_price)
        };
        if !self.bid1_price.is_zero() && !self.ask1_price.is_zero() {
            tick = tick.with_quotes(self.bid1_price, self.ask1_price);
        }
        tick
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletAccount {
    account_type: String,
    #[serde(deserialize_with = "lenient_decimal")]
    total_wallet_balance: Decimal,
    #[serde(rename = "totalPerpUPL", deserialize_with = "lenient_decimal")]
    total_perp_upl: Decimal,
    #[serde(default)]
    coin: Vec<WalletCoin>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletCoin {
    coin: String,
    #[serde(deserialize_with = "lenient_decimal")]
    wallet_balance: Decimal,
    #[serde(default, deserialize_with = "lenient_decimal")]
    available_to_withdraw: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionEntry {
    symbol: String,
    /// "Buy", "Sell", or "" / "None" when flat
    side: String,
    #[serde(deserialize_with = "lenient_decimal")]
    size: Decimal,
    #[serde(deserialize_with = "lenient_decimal")]
    avg_price: Decimal,
    #[serde(deserialize_with = "lenient_decimal")]
    unrealised_pnl: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedOrder {
    order_id: String,
}

fn sign(secret: &str, payload: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Auth(format!("unusable API secret: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn bybit_side(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "Buy",
        OrderSide::Sell => "Sell",
    }
}

fn unwrap_envelope<T>(envelope: Envelope<T>, http_status: u16) -> Result<T, ExchangeError> {
    if envelope.ret_code != 0 {
        return Err(ExchangeError::Api {
            status: http_status,
            message: format!("{} (retCode {})", envelope.ret_msg, envelope.ret_code),
        });
    }
    envelope
        .result
        .ok_or_else(|| ExchangeError::Decode("response has no result".into()))
}

async fn fetch_ticker(http: &Client, base_url: &str, symbol: &str) -> Result<PriceTick, ExchangeError> {
    let url = format!("{}/v5/market/tickers", base_url);
    let response = http
        .get(&url)
        .query(&[("category", "linear"), ("symbol", symbol)])
        .send()
        .await?;
    let status = response.status().as_u16();
    let envelope: Envelope<ListResult<Ticker>> = response.json().await?;
    unwrap_envelope(envelope, status)?
        .list
        .into_iter()
        .next()
        .map(Ticker::into_tick)
        .ok_or_else(|| ExchangeError::Decode(format!("no ticker for {symbol}")))
}

struct LiveSession {
    session: ExchangeSession,
    _poller: Poller,
}

/// Bybit linear futures adapter
pub struct BybitExchange {
    http: Client,
    base_url: String,
    recv_window_ms: u64,
    poll_interval: Duration,
    symbols: Vec<String>,
    cache: Arc<QuoteCache>,
    live: RwLock<Option<LiveSession>>,
}

impl BybitExchange {
    pub fn new(http: Client, base_url: &str, config: &ExchangeConfig, symbols: Vec<String>) -> Self {
        let poll_interval = config.poll_interval();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            recv_window_ms: config.recv_window_ms,
            poll_interval,
            symbols,
            cache: Arc::new(QuoteCache::new(poll_interval * 5)),
            live: RwLock::new(None),
        }
    }

    async fn credentials(&self) -> Result<Credentials, ExchangeError> {
        self.live
            .read()
            .await
            .as_ref()
            .map(|live| live.session.credentials.clone())
            .ok_or(ExchangeError::NotConnected)
    }

    fn auth_headers(
        &self,
        credentials: &Credentials,
        payload: &str,
    ) -> Result<[(&'static str, String); 4], ExchangeError> {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let recv_window = self.recv_window_ms.to_string();
        let signature = sign(
            &credentials.api_secret,
            &format!("{}{}{}{}", timestamp, credentials.api_key, recv_window, payload),
        )?;
        Ok([
            ("X-BAPI-API-KEY", credentials.api_key.clone()),
            ("X-BAPI-TIMESTAMP", timestamp),
            ("X-BAPI-RECV-WINDOW", recv_window),
            ("X-BAPI-SIGN", signature),
        ])
    }

    async fn signed_get<T: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ExchangeError> {
        let query = serde_urlencoded::to_string(params)
            .map_err(|e| ExchangeError::Decode(e.to_string()))?;
        let url = format!("{}{}?{}", self.base_url, path, query);

        let mut request = self.http.get(&url);
        for (name, value) in self.auth_headers(credentials, &query)? {
            request = request.header(name, value);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let envelope: Envelope<T> = response.json().await?;
        unwrap_envelope(envelope, status)
    }

    async fn signed_post<T: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ExchangeError> {
        let body = body.to_string();
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .http
            .post(&url)
            .header("Content-Type", "application/json");
        for (name, value) in self.auth_headers(credentials, &body)? {
            request = request.header(name, value);
        }
        let response = request.body(body).send().await?;
        let status = response.status().as_u16();
        let envelope: Envelope<T> = response.json().await?;
        unwrap_envelope(envelope, status)
    }

    async fn fetch_account(&self, credentials: &Credentials) -> Result<AccountInfo, ExchangeError> {
        let wallets: ListResult<WalletAccount> = self
            .signed_get(
                credentials,
                "/v5/account/wallet-balance",
                &[("accountType", "UNIFIED")],
            )
            .await?;
        let wallet = wallets
            .list
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::Decode("empty wallet list".into()))?;

        Ok(AccountInfo {
            exchange: ExchangeKind::Bybit,
            account_type: wallet.account_type,
            balances: wallet
                .coin
                .into_iter()
                .map(|c| Balance {
                    asset: c.coin,
                    wallet_balance: c.wallet_balance,
                    available: c.available_to_withdraw,
                })
                .collect(),
            total_wallet_balance: wallet.total_wallet_balance,
            total_unrealized_pnl: wallet.total_perp_upl,
        })
    }

    async fn submit_market_order(
        &self,
        credentials: &Credentials,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        reduce_only: bool,
    ) -> Result<OrderAck, ExchangeError> {
        let body = serde_json::json!({
            "category": "linear",
            "symbol": symbol,
            "side": bybit_side(side),
            "orderType": "Market",
            "qty": quantity.normalize().to_string(),
            "reduceOnly": reduce_only,
        });

        let created: CreatedOrder = self
            .signed_post(credentials, "/v5/order/create", body)
            .await
            .map_err(|e| match e {
                ExchangeError::Api { message, .. } => ExchangeError::OrderRejected(message),
                other => other,
            })?;

        tracing::info!(
            exchange = "bybit",
            %symbol,
            side = side.as_str(),
            %quantity,
            order_id = %created.order_id,
            "Market order accepted"
        );

        Ok(OrderAck {
            order_id: created.order_id,
            symbol: symbol.to_string(),
            side,
            quantity,
            status: "NEW".to_string(),
        })
    }
}

#[async_trait]
impl ExchangeAdapter for BybitExchange {
    fn kind(&self) -> ExchangeKind {
        ExchangeKind::Bybit
    }

    async fn connect(&self, credentials: Credentials) -> Result<AccountInfo, ExchangeError> {
        credentials.validate()?;

        let http = self.http.clone();
        let base_url = self.base_url.clone();
        let poller = Poller::spawn(
            ExchangeKind::Bybit,
            self.poll_interval,
            self.symbols.clone(),
            self.cache.clone(),
            move |symbol| {
                let http = http.clone();
                let base_url = base_url.clone();
                async move { fetch_ticker(&http, &base_url, &symbol).await }
            },
        );
        *self.live.write().await = Some(LiveSession {
            session: ExchangeSession::new(ExchangeKind::Bybit, credentials.clone()),
            _poller: poller,
        });

        match self.fetch_account(&credentials).await {
            Ok(info) => {
                tracing::info!(exchange = "bybit", testnet = credentials.is_testnet, "Connected");
                Ok(info)
            }
            Err(e) => {
                tracing::warn!(
                    exchange = "bybit",
                    error = %e,
                    "Credential validation failed, keeping session with fallback data"
                );
                Err(ExchangeError::DegradedConnection(e.to_string()))
            }
        }
    }

    async fn disconnect(&self) {
        if self.live.write().await.take().is_some() {
            tracing::info!(exchange = "bybit", "Disconnected");
        }
    }

    async fn is_connected(&self) -> bool {
        self.live.read().await.is_some()
    }

    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, ExchangeError> {
        let live = self.is_connected().await;
        self.cache
            .quote_or_fetch(symbol, live, fetch_ticker(&self.http, &self.base_url, symbol))
            .await
    }

    async fn get_open_positions(&self) -> Result<Vec<ExchangePosition>, ExchangeError> {
        let credentials = self.credentials().await?;
        let positions: ListResult<PositionEntry> = self
            .signed_get(
                &credentials,
                "/v5/position/list",
                &[("category", "linear"), ("settleCoin", "USDT")],
            )
            .await?;

        Ok(positions
            .list
            .into_iter()
            .filter(|p| !p.size.is_zero())
            .filter_map(|p| {
                let side = match p.side.as_str() {
                    "Buy" => PositionSide::Long,
                    "Sell" => PositionSide::Short,
                    _ => return None,
                };
                Some(ExchangePosition {
                    symbol: p.symbol,
                    side,
                    quantity: p.size,
                    entry_price: p.avg_price,
                    unrealized_pnl: p.unrealised_pnl,
                })
            })
            .collect())
    }

    async fn open_position(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        leverage: u32,
    ) -> Result<OrderAck, ExchangeError> {
        let credentials = self.credentials().await?;

        let leverage_body = serde_json::json!({
            "category": "linear",
            "symbol": symbol,
            "buyLeverage": leverage.to_string(),
            "sellLeverage": leverage.to_string(),
        });
        let result = self
            .signed_post::<serde_json::Value>(&credentials, "/v5/position/set-leverage", leverage_body)
            .await;
        match result {
            Ok(_) => {}
            Err(ExchangeError::Api { message, .. })
                if message.contains(&LEVERAGE_NOT_MODIFIED.to_string()) => {}
            Err(ExchangeError::Api { message, .. }) => {
                return Err(ExchangeError::OrderRejected(message))
            }
            Err(e) => return Err(e),
        }

        self.submit_market_order(&credentials, symbol, side, quantity, false)
            .await
    }

    async fn close_position(
        &self,
        symbol: &str,
        side: PositionSide,
    ) -> Result<CloseOutcome, ExchangeError> {
        let credentials = self.credentials().await?;
        let resident = self
            .get_open_positions()
            .await?
            .into_iter()
            .find(|p| p.symbol == symbol && p.side == side);

        let Some(position) = resident else {
            tracing::debug!(exchange = "bybit", %symbol, ?side, "Nothing to close");
            return Ok(CloseOutcome::NothingToClose);
        };

        let ack = self
            .submit_market_order(
                &credentials,
                symbol,
                side.closing_side(),
                position.quantity,
                true,
            )
            .await?;
        Ok(CloseOutcome::Closed(ack))
    }

    async fn get_account_info(&self) -> Result<AccountInfo, ExchangeError> {
        let credentials = self.credentials().await?;
        self.fetch_account(&credentials).await
    }

    async fn get_trading_pairs(&self) -> Vec<TradingPair> {
        let url = format!("{}/v5/market/tickers", self.base_url);
        let result = async {
            let response = self
                .http
                .get(&url)
                .query(&[("category", "linear")])
                .send()
                .await?;
            let status = response.status().as_u16();
            let envelope: Envelope<ListResult<Ticker>> = response.json().await?;
            unwrap_envelope(envelope, status)
        }
        .await;

        match result {
            Ok(tickers) => {
                let pairs = rank_pairs(
                    tickers
                        .list
                        .into_iter()
                        .map(|t| TradingPair {
                            change_24h: t.percent_change(),
                            symbol: t.symbol,
                            category: "linear".to_string(),
                            last_price: t.last_price,
                            volume_24h: t.turnover_24h,
                        })
                        .collect(),
                );
                if pairs.is_empty() {
                    reference_pairs()
                } else {
                    pairs
                }
            }
            Err(e) => {
                tracing::warn!(exchange = "bybit", error = %e, "Trading pairs unavailable, using reference list");
                reference_pairs()
            }
        }
    }
}
