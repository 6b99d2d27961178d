//! Configuration loading from disk

use scalp_hub::config::{Config, ConfigError};
use scalp_hub::exchange::ExchangeKind;
use std::io::Write;

#[test]
fn test_example_config_loads() {
    let config = tokio_test::assert_ok!(Config::from_toml_str(include_str!(
        "../../config.toml.example"
    )));
    assert_eq!(config.feed.symbols, vec!["BTCUSDT".to_string()]);
    assert_eq!(config.exchange.default, ExchangeKind::Binance);
    assert_eq!(config.server.bind, "0.0.0.0:5000");
}

#[test]
fn test_load_partial_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [exchange]
        default = "bybit"

        [bot]
        confidence = 95
        "#
    )
    .unwrap();

    let config = tokio_test::assert_ok!(Config::load(file.path()));
    assert_eq!(config.exchange.default, ExchangeKind::Bybit);
    assert_eq!(config.bot.confidence, rust_decimal_macros::dec!(95));
    assert_eq!(config.bot.leverage, 20);
}

#[test]
fn test_load_rejects_unseeded_symbol() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [feed]
        symbols = ["BTCUSDT", "SOLUSDT"]

        [feed.seed_prices]
        BTCUSDT = 43250
        "#
    )
    .unwrap();

    assert!(matches!(
        Config::load(file.path()),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_load_missing_file() {
    assert!(matches!(
        Config::load("/nonexistent/scalp-hub.toml"),
        Err(ConfigError::Io(_))
    ));
}
