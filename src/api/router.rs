use super::{handlers, prices, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the dashboard API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Price stream
        .route("/ws/prices", get(prices::ws_prices))
        // Exchange session
        .route("/api/exchange/connect", post(handlers::connect_exchange))
        .route("/api/account", get(handlers::account))
        // Bot control
        .route("/api/bot/start", post(handlers::start_bot))
        .route("/api/bot/stop", post(handlers::stop_bot))
        .route("/api/bot/status", get(handlers::bot_status))
        .route("/api/risk/reset", post(handlers::reset_risk))
        // Market data
        .route("/api/market/price/{symbol}", get(handlers::market_price))
        .route("/api/trading-pairs", get(handlers::trading_pairs))
        .route("/api/health", get(handlers::health))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
