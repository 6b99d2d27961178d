//! Price feed hub
//!
//! On every interval, resolves each tracked symbol through the source chain,
//! falls back to the last known value when every source is degraded, and
//! broadcasts the result to all subscribers.

use super::chain::{LinkHealth, SourceChain};
use super::oracle::PriceOracle;
use super::subscribers::{SubscriberId, SubscriberRegistry, Subscription};
use super::{FeedEvent, PriceTick, SourceKind};
use crate::config::FeedConfig;
use crate::telemetry::{increment, set_gauge, CounterMetric, GaugeMetric};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Number of broadcast ticks populated by each source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    pub exchange: u64,
    pub public: u64,
    pub cache: u64,
}

#[derive(Debug, Default)]
struct SourceStats {
    exchange: AtomicU64,
    public: AtomicU64,
    cache: AtomicU64,
}

impl SourceStats {
    fn record(&self, source: SourceKind) {
        let counter = match source {
            SourceKind::Exchange => &self.exchange,
            SourceKind::Public => &self.public,
            SourceKind::Cache => &self.cache,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SourceCounts {
        SourceCounts {
            exchange: self.exchange.load(Ordering::Relaxed),
            public: self.public.load(Ordering::Relaxed),
            cache: self.cache.load(Ordering::Relaxed),
        }
    }
}

/// Aggregating, broadcasting price hub
pub struct PriceFeedHub {
    symbols: Vec<String>,
    poll_interval: Duration,
    chain: Mutex<SourceChain>,
    latest: RwLock<HashMap<String, FeedEvent>>,
    subscribers: SubscriberRegistry,
    stats: SourceStats,
}

impl PriceFeedHub {
    /// Build a hub; every tracked symbol starts from its configured seed price
    ///
    /// Symbols without a seed are not tracked (`Config::validate` rejects them).
    pub fn new(config: &FeedConfig, chain: SourceChain) -> Self {
        let mut latest = HashMap::new();
        let mut symbols = Vec::with_capacity(config.symbols.len());
        for symbol in &config.symbols {
            match config.seed_prices.get(symbol) {
                Some(seed) => {
                    latest.insert(
                        symbol.clone(),
                        FeedEvent {
                            tick: PriceTick::seed(symbol.clone(), *seed),
                            source: SourceKind::Cache,
                        },
                    );
                    symbols.push(symbol.clone());
                }
                None => tracing::warn!(%symbol, "No seed price, symbol not tracked"),
            }
        }

        Self {
            symbols,
            poll_interval: config.poll_interval(),
            chain: Mutex::new(chain),
            latest: RwLock::new(latest),
            subscribers: SubscriberRegistry::new(config.subscriber_buffer),
            stats: SourceStats::default(),
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Run one feed tick across every tracked symbol
    pub async fn poll_once(&self) {
        let mut chain = self.chain.lock().await;
        let now = Instant::now();

        for symbol in &self.symbols {
            let event = match chain.resolve(symbol, now).await {
                Some((tick, source)) => FeedEvent { tick, source },
                None => match self.latest.read().await.get(symbol) {
                    Some(cached) => FeedEvent {
                        tick: cached.tick.clone(),
                        source: SourceKind::Cache,
                    },
                    None => continue,
                },
            };

            self.stats.record(event.source);
            increment(CounterMetric::FeedTick(event.source));
            self.latest.write().await.insert(symbol.clone(), event.clone());

            let report = self.subscribers.broadcast(Arc::new(event)).await;
            if report.lagging > 0 {
                tracing::debug!(
                    %symbol,
                    delivered = report.delivered,
                    lagging = report.lagging,
                    "Broadcast skipped lagging subscribers"
                );
            }
        }
    }

    /// Spawn the periodic feed loop
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(
                symbols = ?self.symbols,
                interval_ms = self.poll_interval.as_millis() as u64,
                "Price feed hub started"
            );
            loop {
                interval.tick().await;
                self.poll_once().await;
            }
        })
    }

    /// Register a subscriber and queue the current snapshot for it
    pub async fn subscribe(&self) -> Subscription {
        let subscription = self.subscribers.register().await;
        let snapshot: Vec<FeedEvent> = {
            let latest = self.latest.read().await;
            self.symbols
                .iter()
                .filter_map(|symbol| latest.get(symbol).cloned())
                .collect()
        };
        for event in snapshot {
            self.subscribers
                .send_to(subscription.id, Arc::new(event))
                .await;
        }

        let count = self.subscribers.len().await;
        set_gauge(GaugeMetric::Subscribers, count as f64);
        tracing::debug!(subscriber = subscription.id, count, "Price subscriber connected");
        subscription
    }

    pub async fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.remove(id).await {
            let count = self.subscribers.len().await;
            set_gauge(GaugeMetric::Subscribers, count as f64);
            tracing::debug!(subscriber = id, count, "Price subscriber disconnected");
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.len().await
    }

    /// Last broadcast (or seed) event for a symbol
    pub async fn latest(&self, symbol: &str) -> Option<FeedEvent> {
        self.latest.read().await.get(symbol).cloned()
    }

    /// How many broadcast ticks each source has populated
    pub fn stats(&self) -> SourceCounts {
        self.stats.snapshot()
    }

    pub async fn health(&self) -> Vec<LinkHealth> {
        self.chain.lock().await.health(Instant::now())
    }
}

#[async_trait]
impl PriceOracle for PriceFeedHub {
    async fn current_price(&self, symbol: &str) -> Option<PriceTick> {
        self.latest(symbol).await.map(|event| event.tick)
    }
}
