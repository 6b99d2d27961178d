//! Collaborator persistence: credentials and the trading-pair cache
//!
//! Both are opaque key-value stores from the service's point of view; the
//! in-memory implementation backs a single process.

use crate::exchange::{Credentials, ExchangeKind, TradingPair};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Saved exchange credentials, keyed by exchange
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn save_credential(&self, exchange: ExchangeKind, credentials: Credentials);
    async fn get(&self, exchange: ExchangeKind) -> Option<Credentials>;
}

/// Last fetched trading pairs, keyed by exchange
#[async_trait]
pub trait TradingPairCache: Send + Sync {
    async fn update_trading_pairs(&self, exchange: ExchangeKind, pairs: Vec<TradingPair>);
    /// Cached pairs and when they were stored
    async fn get_trading_pairs(
        &self,
        exchange: ExchangeKind,
    ) -> Option<(Vec<TradingPair>, DateTime<Utc>)>;
}

#[derive(Default)]
pub struct MemoryStore {
    credentials: RwLock<HashMap<ExchangeKind, Credentials>>,
    pairs: RwLock<HashMap<ExchangeKind, (Vec<TradingPair>, DateTime<Utc>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn save_credential(&self, exchange: ExchangeKind, credentials: Credentials) {
        tracing::debug!(%exchange, "Credentials saved");
        self.credentials.write().await.insert(exchange, credentials);
    }

    async fn get(&self, exchange: ExchangeKind) -> Option<Credentials> {
        self.credentials.read().await.get(&exchange).cloned()
    }
}

#[async_trait]
impl TradingPairCache for MemoryStore {
    async fn update_trading_pairs(&self, exchange: ExchangeKind, pairs: Vec<TradingPair>) {
        self.pairs.write().await.insert(exchange, (pairs, Utc::now()));
    }

    async fn get_trading_pairs(
        &self,
        exchange: ExchangeKind,
    ) -> Option<(Vec<TradingPair>, DateTime<Utc>)> {
        self.pairs.read().await.get(&exchange).cloned()
    }
}
