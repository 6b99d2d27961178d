//! scalp-hub: futures price feed hub and scalping bot backend
//!
//! This library provides the core components for:
//! - Exchange adapters for Binance, Bybit and a simulated market
//! - A price feed hub with prioritized sources and circuit breakers
//! - Signal generation and the entry gate
//! - Paper/live execution engine
//! - A daily loss ceiling
//! - The tick-driven scalping controller
//! - The dashboard HTTP API and price WebSocket
//! - A reconnecting WebSocket client
//! - Structured logging and Prometheus metrics

pub mod api;
pub mod cli;
pub mod config;
pub mod exchange;
pub mod execution;
pub mod feed;
pub mod risk;
pub mod scalp;
pub mod signal;
pub mod store;
pub mod telemetry;
pub mod ws;
