//! Shared fixtures

use rust_decimal_macros::dec;
use scalp_hub::api::AppState;
use scalp_hub::config::Config;
use scalp_hub::exchange::ExchangeKind;
use scalp_hub::signal::{Direction, FixedSignalEngine};
use std::sync::Arc;

/// Offline configuration: no public source, simulated exchange, no timers firing
pub fn offline_config() -> Config {
    let mut config = Config::default();
    config.feed.public_url = String::new();
    config.feed.poll_interval_ms = 50;
    config.exchange.default = ExchangeKind::Simulated;
    config.exchange.poll_interval_ms = 50;
    config.bot.tick_interval_ms = 3_600_000;
    config.bot.min_hold_ms = 3_600_000;
    config.bot.max_hold_ms = 3_600_000;
    config
}

pub fn offline_state() -> Arc<AppState> {
    state_from(offline_config())
}

pub fn state_from(config: Config) -> Arc<AppState> {
    let signals = Arc::new(FixedSignalEngine::clean(Direction::Long, dec!(99)));
    Arc::new(AppState::from_config(config, signals).unwrap())
}
