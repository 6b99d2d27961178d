//! In-process simulated exchange
//!
//! Prices random-walk around their seed, positions live in memory. Used for
//! paper trading when no exchange credentials are available, and in tests.

use super::cache::{Poller, QuoteCache};
use super::{
    reference_pairs, AccountInfo, Balance, CloseOutcome, Credentials, ExchangeAdapter,
    ExchangeError, ExchangeKind, ExchangePosition, ExchangeSession, OrderAck, OrderSide,
    PositionSide, PriceQuote, TradingPair,
};
use crate::feed::PriceTick;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;

/// Largest single step of the walk, in price units
const MAX_STEP_CENTS: i64 = 750;
/// The walk never strays further than this from the seed
const MAX_DRIFT: Decimal = dec!(300);
const SPREAD: Decimal = dec!(1);
const STARTING_BALANCE: Decimal = dec!(10000);

struct RandomWalk {
    rng: StdRng,
    seeds: HashMap<String, Decimal>,
    current: HashMap<String, Decimal>,
}

impl RandomWalk {
    fn step(&mut self, symbol: &str) -> Option<PriceTick> {
        let seed = *self.seeds.get(symbol)?;
        let step = Decimal::new(self.rng.gen_range(-MAX_STEP_CENTS..=MAX_STEP_CENTS), 2);
        let current = self.current.entry(symbol.to_string()).or_insert(seed);
        let floor = (seed - MAX_DRIFT).max(seed / Decimal::TWO);
        *current = (*current + step).clamp(floor, seed + MAX_DRIFT);
        let price = *current;

        let volume = Decimal::from(2_500_000 + self.rng.gen_range(0..500_000i64));
        Some(Self::tick(symbol, seed, price, volume))
    }

    fn peek(&self, symbol: &str) -> Option<PriceTick> {
        let seed = *self.seeds.get(symbol)?;
        let price = self.current.get(symbol).copied().unwrap_or(seed);
        Some(Self::tick(symbol, seed, price, Decimal::ZERO))
    }

    fn tick(symbol: &str, seed: Decimal, price: Decimal, volume: Decimal) -> PriceTick {
        let change = ((price - seed) / seed * Decimal::ONE_HUNDRED).round_dp(2);
        PriceTick {
            percent_change_24h: change,
            volume_24h: volume,
            ..PriceTick::seed(symbol, price)
        }
        .with_quotes(price - SPREAD, price + SPREAD)
    }
}

struct LiveSession {
    session: ExchangeSession,
    _poller: Poller,
}

/// Simulated futures exchange
pub struct SimulatedExchange {
    walk: Arc<Mutex<RandomWalk>>,
    poll_interval: Duration,
    cache: Arc<QuoteCache>,
    live: RwLock<Option<LiveSession>>,
    positions: Mutex<HashMap<(String, PositionSide), ExchangePosition>>,
    next_order_id: AtomicU64,
    degraded: AtomicBool,
    reject_orders: AtomicBool,
}

impl SimulatedExchange {
    pub fn new(seeds: HashMap<String, Decimal>) -> Self {
        Self::with_rng(seeds, StdRng::from_entropy())
    }

    /// Deterministic walk
    pub fn seeded(seeds: HashMap<String, Decimal>, seed: u64) -> Self {
        Self::with_rng(seeds, StdRng::seed_from_u64(seed))
    }

    fn with_rng(seeds: HashMap<String, Decimal>, rng: StdRng) -> Self {
        let poll_interval = Duration::from_secs(1);
        Self {
            walk: Arc::new(Mutex::new(RandomWalk {
                rng,
                seeds,
                current: HashMap::new(),
            })),
            poll_interval,
            cache: Arc::new(QuoteCache::new(poll_interval * 5)),
            live: RwLock::new(None),
            positions: Mutex::new(HashMap::new()),
            next_order_id: AtomicU64::new(1),
            degraded: AtomicBool::new(false),
            reject_orders: AtomicBool::new(false),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self.cache = Arc::new(QuoteCache::new(interval * 5));
        self
    }

    /// Make the next `connect` report a degraded connection
    pub fn set_degraded(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::SeqCst);
    }

    /// Make order submission fail with `OrderRejected`
    pub fn set_reject_orders(&self, reject: bool) {
        self.reject_orders.store(reject, Ordering::SeqCst);
    }

    fn step(&self, symbol: &str) -> Option<PriceTick> {
        self.walk
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .step(symbol)
    }

    fn peek(&self, symbol: &str) -> Option<PriceTick> {
        self.walk
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .peek(symbol)
    }

    fn symbols(&self) -> Vec<String> {
        let walk = self.walk.lock().unwrap_or_else(PoisonError::into_inner);
        let mut symbols: Vec<String> = walk.seeds.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    async fn require_session(&self) -> Result<(), ExchangeError> {
        if self.is_connected().await {
            Ok(())
        } else {
            Err(ExchangeError::NotConnected)
        }
    }

    fn order_id(&self) -> String {
        format!("SIM-{}", self.next_order_id.fetch_add(1, Ordering::Relaxed))
    }

    fn account(&self) -> AccountInfo {
        let positions = self
            .positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let unrealized: Decimal = positions.values().map(|p| p.unrealized_pnl).sum();
        AccountInfo {
            exchange: ExchangeKind::Simulated,
            account_type: "SIMULATED".to_string(),
            balances: vec![Balance {
                asset: "USDT".to_string(),
                wallet_balance: STARTING_BALANCE,
                available: STARTING_BALANCE,
            }],
            total_wallet_balance: STARTING_BALANCE,
            total_unrealized_pnl: unrealized,
        }
    }
}

#[async_trait]
impl ExchangeAdapter for SimulatedExchange {
    fn kind(&self) -> ExchangeKind {
        ExchangeKind::Simulated
    }

    async fn connect(&self, credentials: Credentials) -> Result<AccountInfo, ExchangeError> {
        credentials.validate()?;

        let walk = self.walk.clone();
        let poller = Poller::spawn(
            ExchangeKind::Simulated,
            self.poll_interval,
            self.symbols(),
            self.cache.clone(),
            move |symbol| {
                let tick = walk
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .step(&symbol)
                    .ok_or_else(|| ExchangeError::Unsupported(format!("symbol {symbol}")));
                async move { tick }
            },
        );
        *self.live.write().await = Some(LiveSession {
            session: ExchangeSession::new(ExchangeKind::Simulated, credentials),
            _poller: poller,
        });

        if self.degraded.load(Ordering::SeqCst) {
            tracing::warn!(exchange = "simulated", "Connected in degraded mode");
            return Err(ExchangeError::DegradedConnection(
                "simulated restriction".to_string(),
            ));
        }
        tracing::info!(exchange = "simulated", "Connected");
        Ok(self.account())
    }

    async fn disconnect(&self) {
        if let Some(live) = self.live.write().await.take() {
            tracing::info!(
                exchange = "simulated",
                connected_at = %live.session.connected_at,
                "Disconnected"
            );
        }
    }

    async fn is_connected(&self) -> bool {
        self.live.read().await.is_some()
    }

    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, ExchangeError> {
        let live = self.is_connected().await;
        let fetch = async {
            self.step(symbol)
                .ok_or_else(|| ExchangeError::Unsupported(format!("symbol {symbol}")))
        };
        match self.cache.quote_or_fetch(symbol, live, fetch).await {
            Ok(quote) => Ok(quote),
            Err(ExchangeError::NotConnected) => self
                .peek(symbol)
                .map(|tick| PriceQuote { tick, stale: true })
                .ok_or_else(|| ExchangeError::Unsupported(format!("symbol {symbol}"))),
            Err(e) => Err(e),
        }
    }

    async fn get_open_positions(&self) -> Result<Vec<ExchangePosition>, ExchangeError> {
        self.require_session().await?;
        let positions = self
            .positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(positions.values().cloned().collect())
    }

    async fn open_position(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        leverage: u32,
    ) -> Result<OrderAck, ExchangeError> {
        self.require_session().await?;
        if self.reject_orders.load(Ordering::SeqCst) {
            return Err(ExchangeError::OrderRejected("simulated rejection".into()));
        }
        if quantity <= Decimal::ZERO || leverage == 0 {
            return Err(ExchangeError::OrderRejected(format!(
                "invalid quantity {quantity} or leverage {leverage}"
            )));
        }
        let price = self.get_price(symbol).await?.tick.price;

        let position_side = PositionSide::from(side);
        let mut positions = self
            .positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = positions
            .entry((symbol.to_string(), position_side))
            .or_insert_with(|| ExchangePosition {
                symbol: symbol.to_string(),
                side: position_side,
                quantity: Decimal::ZERO,
                entry_price: price,
                unrealized_pnl: Decimal::ZERO,
            });
        let total = entry.quantity + quantity;
        entry.entry_price = (entry.entry_price * entry.quantity + price * quantity) / total;
        entry.quantity = total;

        Ok(OrderAck {
            order_id: self.order_id(),
            symbol: symbol.to_string(),
            side,
            quantity,
            status: "FILLED".to_string(),
        })
    }

    async fn close_position(
        &self,
        symbol: &str,
        side: PositionSide,
    ) -> Result<CloseOutcome, ExchangeError> {
        self.require_session().await?;
        let removed = self
            .positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(symbol.to_string(), side));

        Ok(match removed {
            Some(position) => CloseOutcome::Closed(OrderAck {
                order_id: self.order_id(),
                symbol: symbol.to_string(),
                side: side.closing_side(),
                quantity: position.quantity,
                status: "FILLED".to_string(),
            }),
            None => CloseOutcome::NothingToClose,
        })
    }

    async fn get_account_info(&self) -> Result<AccountInfo, ExchangeError> {
        self.require_session().await?;
        Ok(self.account())
    }

    async fn get_trading_pairs(&self) -> Vec<TradingPair> {
        reference_pairs()
    }
}
