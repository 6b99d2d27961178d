//! Prioritized price source chain
//!
//! Sources are tried in the order they were added. Each one sits behind its
//! own circuit breaker so a source that keeps failing is skipped for a
//! cooldown instead of costing a timeout on every tick.

use super::breaker::{BreakerConfig, BreakerState, CircuitBreaker};
use super::{PriceSource, PriceTick, SourceError, SourceKind};
use crate::telemetry::{increment, record_latency, CounterMetric, LatencyMetric};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

struct Link {
    source: Arc<dyn PriceSource>,
    breaker: CircuitBreaker,
}

/// Health of one link, for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct LinkHealth {
    pub source: SourceKind,
    pub demoted: bool,
    pub consecutive_failures: u32,
    pub trips: u64,
}

/// Ordered list of price sources with per-source demotion
pub struct SourceChain {
    breaker_config: BreakerConfig,
    links: Vec<Link>,
}

impl SourceChain {
    pub fn new(breaker_config: BreakerConfig) -> Self {
        Self {
            breaker_config,
            links: Vec::new(),
        }
    }

    /// Append a source at the next-lower priority
    pub fn with_source(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.links.push(Link {
            source,
            breaker: CircuitBreaker::new(self.breaker_config),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Ask each admitted source in priority order; first success wins
    ///
    /// Returns `None` when every source is demoted, unavailable, or failed;
    /// the caller then falls back to its last known value.
    pub async fn resolve(&mut self, symbol: &str, now: Instant) -> Option<(PriceTick, SourceKind)> {
        for link in &mut self.links {
            let kind = link.source.kind();
            if !link.breaker.allows(now) {
                continue;
            }

            let started = Instant::now();
            let result = link.source.fetch(symbol).await;
            record_latency(LatencyMetric::SourceFetch, started.elapsed());

            match result {
                Ok(tick) => {
                    if link.breaker.state(now) == BreakerState::HalfOpen {
                        tracing::info!(source = %kind, symbol, "Price source recovered");
                    }
                    link.breaker.record_success();
                    return Some((tick, kind));
                }
                Err(SourceError::Unavailable) => continue,
                Err(SourceError::Failed(reason)) => {
                    if link.breaker.record_failure(now) {
                        increment(CounterMetric::BreakerTrip(kind));
                        tracing::warn!(
                            source = %kind,
                            symbol,
                            failures = link.breaker.consecutive_failures(),
                            %reason,
                            "Price source demoted"
                        );
                    } else {
                        tracing::debug!(source = %kind, symbol, %reason, "Price source fetch failed");
                    }
                }
            }
        }
        None
    }

    pub fn health(&self, now: Instant) -> Vec<LinkHealth> {
        self.links
            .iter()
            .map(|link| LinkHealth {
                source: link.source.kind(),
                demoted: link.breaker.state(now) == BreakerState::Open,
                consecutive_failures: link.breaker.consecutive_failures(),
                trips: link.breaker.trips(),
            })
            .collect()
    }
}
