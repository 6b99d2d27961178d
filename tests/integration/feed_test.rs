//! Price feed hub across real sources

use async_trait::async_trait;
use rust_decimal_macros::dec;
use scalp_hub::config::FeedConfig;
use scalp_hub::exchange::{ActiveExchange, Credentials, ExchangeAdapter, SimulatedExchange};
use scalp_hub::feed::{
    BreakerConfig, ExchangeSource, PriceFeedHub, PriceSource, PriceTick, SourceChain,
    SourceError, SourceKind,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counts calls; fails every one
struct DownSource {
    calls: AtomicU32,
}

#[async_trait]
impl PriceSource for DownSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Exchange
    }

    async fn fetch(&self, _symbol: &str) -> Result<PriceTick, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SourceError::Failed("restricted location".into()))
    }
}

struct FixedSource;

#[async_trait]
impl PriceSource for FixedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Public
    }

    async fn fetch(&self, symbol: &str) -> Result<PriceTick, SourceError> {
        Ok(PriceTick::seed(symbol, dec!(43300)).with_quotes(dec!(43299.5), dec!(43300.5)))
    }
}

fn feed_config() -> FeedConfig {
    FeedConfig {
        symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
        seed_prices: HashMap::from([
            ("BTCUSDT".to_string(), dec!(43250)),
            ("ETHUSDT".to_string(), dec!(2250)),
        ]),
        public_url: String::new(),
        ..FeedConfig::default()
    }
}

fn breaker() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 2,
        cooldown: Duration::from_secs(3600),
    }
}

#[tokio::test]
async fn test_failover_to_public_after_failure_streak() {
    let primary = Arc::new(DownSource {
        calls: AtomicU32::new(0),
    });
    let chain = SourceChain::new(breaker())
        .with_source(primary.clone() as Arc<dyn PriceSource>)
        .with_source(Arc::new(FixedSource));
    let hub = PriceFeedHub::new(&feed_config(), chain);

    for _ in 0..5 {
        hub.poll_once().await;
    }

    let stats = hub.stats();
    assert_eq!(stats.public, 10);
    assert_eq!(stats.exchange, 0);
    assert_eq!(stats.cache, 0);
    // Two failures per symbol trip the breaker; later ticks skip the source
    assert!(primary.calls.load(Ordering::SeqCst) <= 4);
    assert!(hub.health().await.iter().any(|link| link.trips > 0));
}

#[tokio::test]
async fn test_every_open_subscriber_gets_each_tick_once() {
    let chain = SourceChain::new(breaker()).with_source(Arc::new(FixedSource));
    let hub = PriceFeedHub::new(&feed_config(), chain);

    let mut open_a = hub.subscribe().await;
    let mut open_b = hub.subscribe().await;
    let closed = hub.subscribe().await;
    drop(closed);

    const TICKS: usize = 4;
    for _ in 0..TICKS {
        hub.poll_once().await;
    }

    for sub in [&mut open_a, &mut open_b] {
        let mut received = Vec::new();
        while let Ok(event) = sub.receiver.try_recv() {
            received.push(event);
        }
        // Seed snapshot for both symbols, then one event per (symbol, tick)
        assert_eq!(received.len(), 2 + 2 * TICKS);
        let live: Vec<_> = received
            .iter()
            .filter(|event| event.source == SourceKind::Public)
            .collect();
        assert_eq!(live.len(), 2 * TICKS);
        assert_eq!(
            live.iter().filter(|e| e.tick.symbol == "BTCUSDT").count(),
            TICKS
        );
    }
}

#[tokio::test]
async fn test_exchange_source_follows_installed_adapter() {
    let active = ActiveExchange::new();
    let chain =
        SourceChain::new(breaker()).with_source(Arc::new(ExchangeSource::new(active.clone())));
    let hub = PriceFeedHub::new(&feed_config(), chain);

    hub.poll_once().await;
    assert_eq!(hub.latest("BTCUSDT").await.unwrap().source, SourceKind::Cache);

    let sim = Arc::new(SimulatedExchange::new(feed_config().seed_prices));
    sim.connect(Credentials::new("demo", "demo", true))
        .await
        .unwrap();
    active.install(sim).await;

    hub.poll_once().await;
    let event = hub.latest("BTCUSDT").await.unwrap();
    assert_eq!(event.source, SourceKind::Exchange);
    let drift = (event.tick.price - dec!(43250)).abs();
    assert!(drift <= dec!(300));
}
