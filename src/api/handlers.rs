//! REST handlers

use super::dto::{
    BotStartedResponse, ConnectRequest, ConnectResponse, HealthResponse, MarketPriceResponse,
    StartBotRequest, StatusResponse, TradingPairsResponse,
};
use super::state::{AppState, ConnectOutcome};
use super::ApiError;
use crate::exchange::{reference_pairs, AccountInfo, Credentials, ExchangeError};
use crate::feed::SourceKind;
use crate::scalp::{BotState, ControllerError, ControllerStatus};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// POST /api/exchange/connect
pub async fn connect_exchange(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ConnectRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let kind = req.exchange.unwrap_or(state.config.exchange.default);
    let testnet = req.is_testnet.unwrap_or(state.config.exchange.testnet);
    let credentials = Credentials::new(req.api_key, req.api_secret, testnet);

    match state.connect_exchange(kind, credentials).await? {
        ConnectOutcome::Connected(account) => {
            Ok((StatusCode::OK, Json(ConnectResponse::connected(account))).into_response())
        }
        ConnectOutcome::Degraded { account, warning } => Ok((
            StatusCode::ACCEPTED,
            Json(ConnectResponse::degraded(account, warning)),
        )
            .into_response()),
    }
}

/// GET /api/account
pub async fn account(State(state): State<Arc<AppState>>) -> Result<Json<AccountInfo>, ApiError> {
    let adapter = state.exchange.get().await.ok_or(ExchangeError::NotConnected)?;
    Ok(Json(adapter.get_account_info().await?))
}

/// POST /api/bot/start
pub async fn start_bot(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StartBotRequest>, JsonRejection>,
) -> Result<Json<BotStartedResponse>, ApiError> {
    let Json(req) = payload?;
    let exchange = match state.exchange.kind().await {
        Some(kind) => kind,
        None => state.config.exchange.default,
    };
    let config = req.apply(state.config.bot.bot_config(exchange));
    if !state.hub.symbols().contains(&config.symbol) {
        return Err(ControllerError::UntrackedSymbol(config.symbol).into());
    }
    let bot_state = state.controller.start(config.clone()).await?;
    Ok(Json(BotStartedResponse {
        status: "BOT_STARTED",
        state: bot_state,
        config,
    }))
}

/// POST /api/bot/stop
pub async fn stop_bot(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, ApiError> {
    let bot_state = state.controller.stop().await?;
    Ok(Json(StatusResponse {
        status: "BOT_STOPPED",
        state: bot_state,
    }))
}

/// GET /api/bot/status
pub async fn bot_status(State(state): State<Arc<AppState>>) -> Json<ControllerStatus> {
    Json(state.controller.status().await)
}

/// POST /api/risk/reset
pub async fn reset_risk(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let bot_state = state.controller.reset_risk().await;
    Json(StatusResponse {
        status: "RISK_RESET",
        state: bot_state,
    })
}

/// GET /api/market/price/{symbol}
///
/// Asks the connected adapter first, then the feed hub's last tick.
pub async fn market_price(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<MarketPriceResponse>, ApiError> {
    let symbol = symbol.trim().to_uppercase();

    if let Some(adapter) = state.exchange.get().await {
        match adapter.get_price(&symbol).await {
            Ok(quote) => {
                return Ok(Json(MarketPriceResponse {
                    tick: quote.tick,
                    stale: quote.stale,
                    source: None,
                }))
            }
            Err(e) => tracing::debug!(%symbol, error = %e, "Adapter price unavailable"),
        }
    }

    let event = state
        .hub
        .latest(&symbol)
        .await
        .ok_or_else(|| ApiError::not_found(format!("No price for {symbol}")))?;
    Ok(Json(MarketPriceResponse {
        stale: event.source == SourceKind::Cache,
        source: Some(event.source),
        tick: event.tick,
    }))
}

/// GET /api/trading-pairs
pub async fn trading_pairs(State(state): State<Arc<AppState>>) -> Json<TradingPairsResponse> {
    if let Some(adapter) = state.exchange.get().await {
        let pairs = adapter.get_trading_pairs().await;
        state.pairs.update_trading_pairs(adapter.kind(), pairs.clone()).await;
        return Json(TradingPairsResponse { pairs });
    }

    let pairs = match state
        .pairs
        .get_trading_pairs(state.config.exchange.default)
        .await
    {
        Some((pairs, _)) => pairs,
        None => reference_pairs(),
    };
    Json(TradingPairsResponse { pairs })
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let connected = state.exchange.is_connected().await;
    Json(HealthResponse {
        status: "healthy",
        exchange: if connected { "connected" } else { "disconnected" },
        bot_running: state.controller.state().await != BotState::Stopped,
        price_subscribers: state.hub.subscriber_count().await,
    })
}
