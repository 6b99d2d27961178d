//! WebSocket client library
//!
//! Reconnecting client for the price stream, with fixed or exponential
//! backoff and ping/pong keepalive.

mod client;
mod types;

pub use client::ConnectionManager;
pub use types::{Backoff, WsConfig, WsError, WsMessage};
