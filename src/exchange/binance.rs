//! Binance USDⓈ-M futures adapter
//!
//! REST only. Signed endpoints carry `timestamp`, `recvWindow` and an
//! HMAC-SHA256 `signature` over the query string, with the key in the
//! `X-MBX-APIKEY` header.

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
use reqwest::{Client, Method, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    last_price: Decimal,
    price_change_percent: Decimal,
    quote_volume: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookTicker {
    bid_price: Decimal,
    ask_price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    total_wallet_balance: Decimal,
    total_unrealized_profit: Decimal,
    #[serde(default)]
    assets: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetBalance {
    asset: String,
    wallet_balance: Decimal,
    available_balance: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRisk {
    symbol: String,
    position_amt: Decimal,
    entry_price: Decimal,
    un_realized_profit: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    symbol: String,
    status: String,
    orig_qty: Decimal,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

fn sign(secret: &str, payload: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Auth(format!("unusable API secret: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ExchangeError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(err) => format!("{} (code {})", err.msg, err.code),
            Err(_) => body,
        };
        return Err(ExchangeError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}

fn order_rejected(e: ExchangeError) -> ExchangeError {
    match e {
        ExchangeError::Api { message, .. } => ExchangeError::OrderRejected(message),
        other => other,
    }
}

/// Unauthenticated 24h ticker plus best bid/ask for one symbol
///
/// The book ticker is best-effort: without it the tick carries no quotes.
pub async fn fetch_public_ticker(
    http: &Client,
    base_url: &str,
    symbol: &str,
) -> Result<PriceTick, ExchangeError> {
    let ticker_url = format!("{}/fapi/v1/ticker/24hr", base_url);
    let book_url = format!("{}/fapi/v1/ticker/bookTicker", base_url);

    let (ticker, book) = tokio::join!(
        async {
            let response = http.get(&ticker_url).query(&[("symbol", symbol)]).send().await?;
            decode::<Ticker24h>(response).await
        },
        async {
            let response = http.get(&book_url).query(&[("symbol", symbol)]).send().await?;
            decode::<BookTicker>(response).await
        }
    );

    let ticker = ticker?;
    let mut tick = PriceTick {
        symbol: ticker.symbol,
        price: ticker.last_price,
        bid: None,
        ask: None,
        percent_change_24h: ticker.price_change_percent,
        volume_24h: ticker.quote_volume,
        timestamp: Utc::now(),
    };
    match book {
        Ok(book) => tick = tick.with_quotes(book.bid_price, book.ask_price),
        Err(e) => tracing::debug!(%symbol, error = %e, "Book ticker unavailable"),
    }
    Ok(tick)
}

struct LiveSession {
    session: ExchangeSession,
    _poller: Poller,
}

/// Binance futures adapter
pub struct BinanceExchange {
    http: Client,
    base_url: String,
    recv_window_ms: u64,
    poll_interval: Duration,
    symbols: Vec<String>,
    cache: Arc<QuoteCache>,
    live: RwLock<Option<LiveSession>>,
}

impl BinanceExchange {
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

    async fn signed<T: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T, ExchangeError> {
        params.push(("recvWindow", self.recv_window_ms.to_string()));
        params.push(("timestamp", Utc::now().timestamp_millis().to_string()));
        let query = serde_urlencoded::to_string(&params)
            .map_err(|e| ExchangeError::Decode(e.to_string()))?;
        let signature = sign(&credentials.api_secret, &query)?;
        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);

        let response = self
            .http
            .request(method, &url)
            .header("X-MBX-APIKEY", &credentials.api_key)
            .send()
            .await?;
        decode(response).await
    }

    async fn fetch_account(&self, credentials: &Credentials) -> Result<AccountInfo, ExchangeError> {
        let account: AccountResponse = self
            .signed(credentials, Method::GET, "/fapi/v2/account", vec![])
            .await?;

        Ok(AccountInfo {
            exchange: ExchangeKind::Binance,
            account_type: "FUTURES".to_string(),
            balances: account
                .assets
                .into_iter()
                .filter(|a| !a.wallet_balance.is_zero())
                .map(|a| Balance {
                    asset: a.asset,
                    wallet_balance: a.wallet_balance,
                    available: a.available_balance,
                })
                .collect(),
            total_wallet_balance: account.total_wallet_balance,
            total_unrealized_pnl: account.total_unrealized_profit,
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
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.normalize().to_string()),
        ];
        if reduce_only {
            params.push(("reduceOnly", "true".to_string()));
        }

        let order: OrderResponse = self
            .signed(credentials, Method::POST, "/fapi/v1/order", params)
            .await
            .map_err(order_rejected)?;

        tracing::info!(
            exchange = "binance",
            %symbol,
            side = side.as_str(),
            %quantity,
            order_id = order.order_id,
            "Market order accepted"
        );

        Ok(OrderAck {
            order_id: order.order_id.to_string(),
            symbol: order.symbol,
            side,
            quantity: order.orig_qty,
            status: order.status,
        })
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceExchange {
    fn kind(&self) -> ExchangeKind {
        ExchangeKind::Binance
    }

    async fn connect(&self, credentials: Credentials) -> Result<AccountInfo, ExchangeError> {
        credentials.validate()?;

        let http = self.http.clone();
        let base_url = self.base_url.clone();
        let poller = Poller::spawn(
            ExchangeKind::Binance,
            self.poll_interval,
            self.symbols.clone(),
            self.cache.clone(),
            move |symbol| {
                let http = http.clone();
                let base_url = base_url.clone();
                async move { fetch_public_ticker(&http, &base_url, &symbol).await }
            },
        );
        *self.live.write().await = Some(LiveSession {
            session: ExchangeSession::new(ExchangeKind::Binance, credentials.clone()),
            _poller: poller,
        });

        match self.fetch_account(&credentials).await {
            Ok(info) => {
                tracing::info!(
                    exchange = "binance",
                    testnet = credentials.is_testnet,
                    "Connected"
                );
                Ok(info)
            }
            Err(e) => {
                tracing::warn!(
                    exchange = "binance",
                    error = %e,
                    "Credential validation failed, keeping session with fallback data"
                );
                Err(ExchangeError::DegradedConnection(e.to_string()))
            }
        }
    }

    async fn disconnect(&self) {
        if self.live.write().await.take().is_some() {
            tracing::info!(exchange = "binance", "Disconnected");
        }
    }

    async fn is_connected(&self) -> bool {
        self.live.read().await.is_some()
    }

    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, ExchangeError> {
        let live = self.is_connected().await;
        self.cache
            .quote_or_fetch(
                symbol,
                live,
                fetch_public_ticker(&self.http, &self.base_url, symbol),
            )
            .await
    }

    async fn get_open_positions(&self) -> Result<Vec<ExchangePosition>, ExchangeError> {
        let credentials = self.credentials().await?;
        let risks: Vec<PositionRisk> = self
            .signed(&credentials, Method::GET, "/fapi/v2/positionRisk", vec![])
            .await?;

        Ok(risks
            .into_iter()
            .filter(|p| !p.position_amt.is_zero())
            .map(|p| ExchangePosition {
                side: if p.position_amt.is_sign_positive() {
                    PositionSide::Long
                } else {
                    PositionSide::Short
                },
                symbol: p.symbol,
                quantity: p.position_amt.abs(),
                entry_price: p.entry_price,
                unrealized_pnl: p.un_realized_profit,
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

        self.signed::<serde_json::Value>(
            &credentials,
            Method::POST,
            "/fapi/v1/leverage",
            vec![
                ("symbol", symbol.to_string()),
                ("leverage", leverage.to_string()),
            ],
        )
        .await
        .map_err(order_rejected)?;

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
            tracing::debug!(exchange = "binance", %symbol, ?side, "Nothing to close");
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
        let url = format!("{}/fapi/v1/ticker/24hr", self.base_url);
        let result = async {
            let response = self.http.get(&url).send().await?;
            decode::<Vec<Ticker24h>>(response).await
        }
        .await;

        match result {
            Ok(tickers) => {
                let pairs = rank_pairs(
                    tickers
                        .into_iter()
                        .map(|t| TradingPair {
                            symbol: t.symbol,
                            category: "linear".to_string(),
                            last_price: t.last_price,
                            change_24h: t.price_change_percent,
                            volume_24h: t.quote_volume,
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
                tracing::warn!(exchange = "binance", error = %e, "Trading pairs unavailable, using reference list");
                reference_pairs()
            }
        }
    }
}
