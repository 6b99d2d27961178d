//! REST API tests through the full router

use crate::support::{offline_config, offline_state, state_from};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use scalp_hub::api::create_router;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn connect_simulated(app: &Router) {
    let (status, body) = send(
        app,
        post(
            "/api/exchange/connect",
            json!({"exchange": "simulated", "apiKey": "demo", "apiSecret": "demo"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn test_health_reports_disconnected() {
    let app = create_router(offline_state());
    let (status, body) = send(&app, get("/api/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["exchange"], "disconnected");
    assert_eq!(body["botRunning"], false);
}

#[tokio::test]
async fn test_connect_requires_credentials() {
    let app = create_router(offline_state());
    let (status, body) = send(
        &app,
        post("/api/exchange/connect", json!({"exchange": "simulated", "apiSecret": "s"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "API key is required");
}

#[tokio::test]
async fn test_connect_rejects_malformed_body() {
    let app = create_router(offline_state());
    let request = Request::builder()
        .method("POST")
        .uri("/api/exchange/connect")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_connect_simulated() {
    let app = create_router(offline_state());
    let (status, body) = send(
        &app,
        post(
            "/api/exchange/connect",
            json!({"exchange": "simulated", "apiKey": "demo", "apiSecret": "demo", "isTestnet": true}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CONNECTED");
    assert_eq!(body["exchange"], "simulated");
    assert!(body["balances"].is_array());
    assert!(body.get("warning").is_none());

    let (_, health) = send(&app, get("/api/health")).await;
    assert_eq!(health["exchange"], "connected");
}

#[tokio::test]
async fn test_connect_degraded_when_exchange_unreachable() {
    let mut config = offline_config();
    config.exchange.binance_url = "http://127.0.0.1:1".to_string();
    config.exchange.binance_testnet_url = "http://127.0.0.1:1".to_string();
    let app = create_router(state_from(config));

    let (status, body) = send(
        &app,
        post(
            "/api/exchange/connect",
            json!({"exchange": "binance", "apiKey": "key", "apiSecret": "secret", "isTestnet": false}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
    assert_eq!(body["status"], "CONNECTED_DEGRADED");
    assert_eq!(body["exchange"], "binance");
    assert!(!body["warning"].as_str().unwrap().is_empty());

    let (_, health) = send(&app, get("/api/health")).await;
    assert_eq!(health["exchange"], "connected");
}

#[tokio::test]
async fn test_start_without_connection_fails() {
    let app = create_router(offline_state());
    let (status, body) = send(&app, post("/api/bot/start", json!({"symbol": "BTCUSDT"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Not connected to an exchange");
}

#[tokio::test]
async fn test_bot_lifecycle() {
    let app = create_router(offline_state());
    connect_simulated(&app).await;

    let (status, body) = send(
        &app,
        post(
            "/api/bot/start",
            json!({
                "exchange": "simulated",
                "symbol": "BTCUSDT",
                "leverage": 10,
                "positionSize": 50,
                "maxLoss": 25,
                "confidence": 92
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "BOT_STARTED");
    assert_eq!(body["config"]["leverage"], 10);
    assert_eq!(body["config"]["maxLoss"], 25.0);

    let (status, _) = send(&app, post("/api/bot/start", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, status_body) = send(&app, get("/api/bot/status")).await;
    assert_eq!(status_body["running"], true);
    assert_eq!(status_body["connected"], true);
    assert_eq!(status_body["state"], "RUNNING");
    assert_eq!(status_body["openPositions"], 0);
    assert!(status_body["positions"].as_array().unwrap().is_empty());
    assert!(status_body["currentPrice"].is_number());

    let (status, body) = send(&app, post("/api/bot/stop", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "BOT_STOPPED");

    let (status, body) = send(&app, post("/api/bot/stop", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bot is not running");
}

#[tokio::test]
async fn test_start_rejects_invalid_config() {
    let app = create_router(offline_state());
    connect_simulated(&app).await;

    let (status, body) = send(&app, post("/api/bot/start", json!({"leverage": 0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("leverage"));
}

#[tokio::test]
async fn test_risk_reset() {
    let app = create_router(offline_state());
    let (status, body) = send(&app, post("/api/risk/reset", json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "RISK_RESET");
    assert_eq!(body["state"], "STOPPED");
}

#[tokio::test]
async fn test_market_price_falls_back_to_hub_seed() {
    let app = create_router(offline_state());
    let (status, body) = send(&app, get("/api/market/price/btcusdt")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "BTCUSDT");
    assert_eq!(body["price"], 43250.0);
    assert_eq!(body["stale"], true);
    assert_eq!(body["source"], "cache");
    assert!(body["timestamp"].is_i64());
}

#[tokio::test]
async fn test_market_price_from_exchange() {
    let app = create_router(offline_state());
    connect_simulated(&app).await;

    let (status, body) = send(&app, get("/api/market/price/BTCUSDT")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stale"], false);
    assert!(body["bid"].as_f64().unwrap() < body["ask"].as_f64().unwrap());
}

#[tokio::test]
async fn test_market_price_unknown_symbol() {
    let app = create_router(offline_state());
    let (status, body) = send(&app, get("/api/market/price/NOPEUSDT")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No price for NOPEUSDT");
}

#[tokio::test]
async fn test_trading_pairs_without_exchange() {
    let app = create_router(offline_state());
    let (status, body) = send(&app, get("/api/trading-pairs")).await;

    assert_eq!(status, StatusCode::OK);
    let pairs = body["pairs"].as_array().unwrap();
    assert_eq!(pairs.len(), 10);
    assert_eq!(pairs[0]["symbol"], "BTCUSDT");
    assert!(pairs[0]["lastPrice"].is_number());
    assert!(pairs[0]["change24h"].is_number());
    assert!(pairs[0]["volume24h"].is_number());
}

#[tokio::test]
async fn test_account_requires_connection() {
    let app = create_router(offline_state());
    let (status, _) = send(&app, get("/api/account")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    connect_simulated(&app).await;
    let (status, body) = send(&app, get("/api/account")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exchange"], "simulated");
}

#[tokio::test]
async fn test_start_rejects_exchange_other_than_connected() {
    let app = create_router(offline_state());
    connect_simulated(&app).await;

    let (status, body) = send(&app, post("/api/bot/start", json!({"exchange": "bybit"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Bot configured for bybit but simulated is connected"
    );

    let (_, status_body) = send(&app, get("/api/bot/status")).await;
    assert_eq!(status_body["running"], false);
}

#[tokio::test]
async fn test_start_rejects_untracked_symbol() {
    let app = create_router(offline_state());
    connect_simulated(&app).await;

    let (status, body) = send(&app, post("/api/bot/start", json!({"symbol": "ethusdt"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Symbol ETHUSDT is not tracked by the price feed");

    let (_, status_body) = send(&app, get("/api/bot/status")).await;
    assert_eq!(status_body["state"], "STOPPED");
}
