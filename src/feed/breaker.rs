//! Circuit breaker for price source demotion
//!
//! A source that fails `failure_threshold` times in a row is taken out of the
//! chain for `cooldown`. After the cooldown a single trial request is let through: a
//! success restores the source, a failure opens the breaker again.

use std::time::{Duration, Instant};

/// Breaker thresholds
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens
    pub failure_threshold: u32,
    /// Time the breaker stays open before probing
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Breaker state at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Source is in rotation
    Closed,
    /// Source is demoted
    Open,
    /// Cooldown elapsed, next attempt is a trial
    HalfOpen,
}

/// Per-source consecutive-failure breaker
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trips: u64,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
            opened_at: None,
            trips: 0,
        }
    }

    pub fn state(&self, now: Instant) -> BreakerState {
        match self.opened_at {
            None => BreakerState::Closed,
            Some(opened) if now.saturating_duration_since(opened) >= self.config.cooldown => {
                BreakerState::HalfOpen
            }
            Some(_) => BreakerState::Open,
        }
    }

    /// Whether the source may be asked at `now`
    pub fn allows(&self, now: Instant) -> bool {
        self.state(now) != BreakerState::Open
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    /// Record a failure; returns true when this failure opened the breaker
    pub fn record_failure(&mut self, now: Instant) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let probing = self.opened_at.is_some();
        if probing || self.consecutive_failures >= self.config.failure_threshold {
            self.opened_at = Some(now);
            self.trips += 1;
            return true;
        }
        false
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Number of times the breaker has opened
    pub fn trips(&self) -> u64 {
        self.trips
    }
}
