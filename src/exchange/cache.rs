//! Adapter-internal price polling and quote cache

use super::{ExchangeError, ExchangeKind, PriceQuote};
use crate::feed::PriceTick;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Last polled tick per symbol
#[derive(Debug)]
pub struct QuoteCache {
    max_age: chrono::Duration,
    ticks: RwLock<HashMap<String, PriceTick>>,
}

impl QuoteCache {
    /// Ticks older than `max_age` are reported stale
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age: chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX),
            ticks: RwLock::new(HashMap::new()),
        }
    }

    pub async fn store(&self, tick: PriceTick) {
        self.ticks.write().await.insert(tick.symbol.clone(), tick);
    }

    pub async fn get(&self, symbol: &str) -> Option<PriceTick> {
        self.ticks.read().await.get(symbol).cloned()
    }

    /// Cached tick as a quote; stale when the session is gone or the poller fell behind
    pub async fn quote(&self, symbol: &str, live: bool) -> Option<PriceQuote> {
        let tick = self.get(symbol).await?;
        let stale = !live || tick.age() > self.max_age;
        Some(PriceQuote { tick, stale })
    }

    /// Fresh cached quote, else a direct fetch when live, else the stale cached value
    pub async fn quote_or_fetch<Fut>(
        &self,
        symbol: &str,
        live: bool,
        fetch: Fut,
    ) -> Result<PriceQuote, ExchangeError>
    where
        Fut: Future<Output = Result<PriceTick, ExchangeError>>,
    {
        if live {
            if let Some(quote) = self.quote(symbol, true).await {
                if !quote.stale {
                    return Ok(quote);
                }
            }
            match fetch.await {
                Ok(tick) => {
                    self.store(tick.clone()).await;
                    return Ok(PriceQuote { tick, stale: false });
                }
                Err(e) => tracing::debug!(%symbol, error = %e, "Direct price fetch failed"),
            }
        }

        let tick = self.get(symbol).await.ok_or(ExchangeError::NotConnected)?;
        Ok(PriceQuote { tick, stale: true })
    }
}

/// Background task refreshing a `QuoteCache`; stops when dropped
#[derive(Debug)]
pub struct Poller {
    handle: JoinHandle<()>,
}

impl Poller {
    pub fn spawn<F, Fut>(
        exchange: ExchangeKind,
        interval: Duration,
        symbols: Vec<String>,
        cache: Arc<QuoteCache>,
        fetch: F,
    ) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PriceTick, ExchangeError>> + Send,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                for symbol in &symbols {
                    match fetch(symbol.clone()).await {
                        Ok(tick) => cache.store(tick).await,
                        Err(e) => {
                            tracing::debug!(%exchange, %symbol, error = %e, "Price poll failed")
                        }
                    }
                }
            }
        });
        Self { handle }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_quote_staleness() {
        let cache = QuoteCache::new(Duration::from_secs(5));
        assert!(cache.quote("BTCUSDT", true).await.is_none());

        cache.store(PriceTick::seed("BTCUSDT", dec!(100))).await;
        assert!(!cache.quote("BTCUSDT", true).await.unwrap().stale);
        assert!(cache.quote("BTCUSDT", false).await.unwrap().stale);

        let mut old = PriceTick::seed("ETHUSDT", dec!(10));
        old.timestamp -= chrono::Duration::seconds(60);
        cache.store(old).await;
        assert!(cache.quote("ETHUSDT", true).await.unwrap().stale);
    }

    #[tokio::test]
    async fn test_quote_or_fetch() {
        let cache = QuoteCache::new(Duration::from_secs(5));

        let fetched = cache
            .quote_or_fetch("BTCUSDT", true, async {
                Ok(PriceTick::seed("BTCUSDT", dec!(7)))
            })
            .await
            .unwrap();
        assert!(!fetched.stale);
        assert_eq!(cache.get("BTCUSDT").await.unwrap().price, dec!(7));

        let offline = cache
            .quote_or_fetch("BTCUSDT", false, async {
                Err(ExchangeError::NotConnected)
            })
            .await
            .unwrap();
        assert!(offline.stale);
        assert_eq!(offline.tick.price, dec!(7));

        let missing = cache
            .quote_or_fetch("ETHUSDT", true, async {
                Err(ExchangeError::Transport("down".into()))
            })
            .await;
        assert!(matches!(missing, Err(ExchangeError::NotConnected)));
    }

    #[tokio::test]
    async fn test_poller_fills_cache_and_stops_on_drop() {
        let cache = Arc::new(QuoteCache::new(Duration::from_secs(5)));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let poller = Poller::spawn(
            ExchangeKind::Simulated,
            Duration::from_millis(10),
            vec!["BTCUSDT".to_string()],
            cache.clone(),
            move |symbol| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(PriceTick::seed(symbol, dec!(42))) }
            },
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get("BTCUSDT").await.unwrap().price, dec!(42));

        drop(poller);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_drop = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_drop);
    }
}
