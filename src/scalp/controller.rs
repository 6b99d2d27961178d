//! Scalping bot controller
//!
//! Owns the bot state machine, the position book and the daily risk state.
//! A periodic tick evaluates one signal; accepted signals open a position
//! which a detached timer closes after a random hold.

use super::{
    BotConfig, BotState, ControllerError, ControllerStatus, PositionBook, ScalpPosition,
    TickOutcome,
};
use crate::config::BotDefaults;
use crate::exchange::ActiveExchange;
use crate::execution::{
    EntryOrder, ExecutionEngine, ExecutionMode, ExitOrder, LiveEngine, PaperEngine,
};
use crate::feed::PriceOracle;
use crate::risk::RiskGovernor;
use crate::signal::{FilterResult, MarketSnapshot, SignalEngine, SignalFilter};
use crate::telemetry::{
    increment, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric,
};
use chrono::Utc;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Timing knobs for the tick loop and auto-close
#[derive(Debug, Clone, Copy)]
pub struct ControllerTiming {
    pub tick_interval: Duration,
    pub min_hold: Duration,
    pub max_hold: Duration,
}

impl From<&BotDefaults> for ControllerTiming {
    fn from(defaults: &BotDefaults) -> Self {
        let (min_hold, max_hold) = defaults.hold_range();
        Self {
            tick_interval: defaults.tick_interval(),
            min_hold,
            max_hold: max_hold.max(min_hold),
        }
    }
}

struct Core {
    state: BotState,
    config: BotConfig,
    risk: RiskGovernor,
    book: PositionBook,
    ticker: Option<JoinHandle<()>>,
}

struct Inner {
    timing: ControllerTiming,
    exchange: ActiveExchange,
    prices: Arc<dyn PriceOracle>,
    signals: Arc<dyn SignalEngine>,
    paper: PaperEngine,
    live: LiveEngine,
    core: Mutex<Core>,
}

/// Handle to the scalping bot; clones share the same bot
#[derive(Clone)]
pub struct ScalpController {
    inner: Arc<Inner>,
}

impl ScalpController {
    /// Create a stopped controller
    ///
    /// `defaults` is reported by `status` until the first start.
    pub fn new(
        timing: ControllerTiming,
        defaults: BotConfig,
        exchange: ActiveExchange,
        prices: Arc<dyn PriceOracle>,
        signals: Arc<dyn SignalEngine>,
    ) -> Self {
        let risk = RiskGovernor::new(defaults.max_loss);
        Self {
            inner: Arc::new(Inner {
                timing,
                live: LiveEngine::new(exchange.clone()),
                exchange,
                prices,
                signals,
                paper: PaperEngine::new(),
                core: Mutex::new(Core {
                    state: BotState::Stopped,
                    config: defaults,
                    risk,
                    book: PositionBook::default(),
                    ticker: None,
                }),
            }),
        }
    }

    /// Start ticking with `config`
    pub async fn start(&self, config: BotConfig) -> Result<BotState, ControllerError> {
        config.validate()?;
        match self.inner.exchange.kind().await {
            None => return Err(ControllerError::NotConnected),
            Some(connected) if connected != config.exchange => {
                return Err(ControllerError::ExchangeMismatch {
                    requested: config.exchange,
                    connected,
                })
            }
            Some(_) => {}
        }
        if !self.inner.exchange.is_connected().await {
            return Err(ControllerError::NotConnected);
        }

        let mut core = self.inner.core.lock().await;
        if core.state != BotState::Stopped {
            return Err(ControllerError::AlreadyRunning);
        }

        core.risk.set_loss_ceiling(config.max_loss);
        tracing::info!(
            exchange = %config.exchange,
            symbol = %config.symbol,
            leverage = config.leverage,
            position_size = %config.position_size,
            max_loss = %config.max_loss,
            confidence = %config.confidence,
            mode = ?config.mode,
            "Scalping bot started"
        );
        core.config = config;
        core.state = if core.risk.permits_trading() {
            BotState::Running
        } else {
            BotState::RiskHalted
        };
        core.ticker = Some(self.spawn_ticker());
        set_gauge(GaugeMetric::TradingHalted, halted_gauge(core.state));
        Ok(core.state)
    }

    fn spawn_ticker(&self) -> JoinHandle<()> {
        let controller = self.clone();
        let period = self.inner.timing.tick_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let outcome = controller.tick().await;
                tracing::trace!(?outcome, "Tick complete");
            }
        })
    }

    /// Stop ticking; open positions still close on their timers
    pub async fn stop(&self) -> Result<BotState, ControllerError> {
        let mut core = self.inner.core.lock().await;
        if core.state == BotState::Stopped {
            return Err(ControllerError::NotRunning);
        }
        if let Some(ticker) = core.ticker.take() {
            ticker.abort();
        }
        core.state = BotState::Stopped;
        set_gauge(GaugeMetric::TradingHalted, 0.0);
        tracing::info!(open_positions = core.book.open_count(), "Scalping bot stopped");
        Ok(core.state)
    }

    /// One evaluation step
    ///
    /// The core lock is released while prices, signals and orders are in
    /// flight. Once the entry fill returns the state is checked again, and a
    /// fill that lands after a halt or stop is discarded.
    pub async fn tick(&self) -> TickOutcome {
        let started = Instant::now();

        let config = {
            let mut core = self.inner.core.lock().await;
            match core.state {
                BotState::Stopped => return TickOutcome::Idle,
                BotState::RiskHalted => return TickOutcome::Halted,
                BotState::Running => {}
            }
            core.risk.check();
            if !core.risk.permits_trading() {
                core.state = BotState::RiskHalted;
                set_gauge(GaugeMetric::TradingHalted, 1.0);
                return TickOutcome::Halted;
            }
            core.config.clone()
        };

        let Some(tick) = self.inner.prices.current_price(&config.symbol).await else {
            tracing::debug!(symbol = %config.symbol, "No price for symbol, skipping tick");
            return TickOutcome::NoPrice;
        };
        let snapshot = MarketSnapshot::from(&tick);

        let Some(signal) = self.inner.signals.evaluate(&snapshot) else {
            return TickOutcome::NoSignal;
        };
        record_latency(LatencyMetric::TickEvaluation, started.elapsed());

        if let FilterResult::Reject(reason) = SignalFilter::new(config.confidence).apply(&signal) {
            increment(CounterMetric::TradeRejected);
            tracing::debug!(
                signal_id = %signal.id,
                confidence = %signal.confidence,
                reason = reason.as_str(),
                "Signal rejected"
            );
            return TickOutcome::Rejected(reason);
        }

        let order = EntryOrder {
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            notional: config.position_size,
            leverage: config.leverage,
            price: signal.entry_price,
        };
        let submitted = Instant::now();
        let fill = match self.engine(config.mode).open(&order).await {
            Ok(fill) => fill,
            Err(e) => {
                increment(CounterMetric::OrderFailed);
                tracing::warn!(
                    symbol = %order.symbol,
                    direction = ?order.direction,
                    error = %e,
                    "Entry order failed, no position opened"
                );
                return TickOutcome::ExecutionFailed;
            }
        };
        record_latency(LatencyMetric::OrderSubmission, submitted.elapsed());

        let position = ScalpPosition::open(
            &signal,
            config.position_size,
            config.leverage,
            config.mode,
            &fill,
        );
        let id = position.id;

        // The bot may have halted or stopped while the entry was in flight
        let superseded = {
            let mut core = self.inner.core.lock().await;
            if core.state == BotState::Running {
                core.risk.check();
                if !core.risk.permits_trading() {
                    core.state = BotState::RiskHalted;
                    set_gauge(GaugeMetric::TradingHalted, 1.0);
                }
            }
            match core.state {
                BotState::Running => {
                    core.book.insert(position.clone());
                    set_gauge(GaugeMetric::OpenPositions, core.book.open_count() as f64);
                    None
                }
                BotState::RiskHalted => Some(TickOutcome::Halted),
                BotState::Stopped => Some(TickOutcome::Idle),
            }
        };
        if let Some(outcome) = superseded {
            self.discard_entry(&position).await;
            return outcome;
        }

        tracing::info!(
            position_id = %id,
            symbol = %position.symbol,
            direction = ?position.direction,
            entry_price = %position.entry_price,
            take_profit = %position.take_profit,
            stop_loss = %position.stop_loss,
            confidence = %signal.confidence,
            order_id = %position.order_id,
            "Position opened"
        );
        increment(CounterMetric::TradeOpened);
        self.schedule_close(id);
        TickOutcome::Opened(id)
    }

    /// Unwind an entry filled after trading was no longer allowed
    async fn discard_entry(&self, position: &ScalpPosition) {
        tracing::warn!(
            order_id = %position.order_id,
            symbol = %position.symbol,
            "Trading stopped while entry was in flight, position discarded"
        );
        if position.mode != ExecutionMode::Live {
            return;
        }
        let exit = ExitOrder {
            symbol: position.symbol.clone(),
            direction: position.direction,
            quantity: position.quantity,
            price: position.entry_price,
        };
        if let Err(e) = self.inner.live.close(&exit).await {
            increment(CounterMetric::OrderFailed);
            tracing::warn!(order_id = %position.order_id, error = %e, "Unwind order failed");
        }
    }

    /// Close `id` after a random hold; the timer is never cancelled
    fn schedule_close(&self, id: Uuid) {
        let controller = self.clone();
        let hold = self.random_hold();
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            if let Err(e) = controller.close_position(id).await {
                tracing::debug!(position_id = %id, error = %e, "Scheduled close skipped");
            }
        });
    }

    fn random_hold(&self) -> Duration {
        let min = self.inner.timing.min_hold.as_millis() as u64;
        let max = self.inner.timing.max_hold.as_millis() as u64;
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Close an open position at the current price and fold its PnL into
    /// the day; returns the realized PnL
    pub async fn close_position(&self, id: Uuid) -> Result<Decimal, ControllerError> {
        let (symbol, direction, quantity, entry_price, mode) = {
            let core = self.inner.core.lock().await;
            let position = core
                .book
                .get_open(id)
                .ok_or(ControllerError::PositionNotFound(id))?;
            (
                position.symbol.clone(),
                position.direction,
                position.quantity,
                position.entry_price,
                position.mode,
            )
        };

        let exit_price = match self.inner.prices.current_price(&symbol).await {
            Some(tick) => tick.price,
            None => {
                tracing::warn!(position_id = %id, %symbol, "No exit price, closing at entry");
                entry_price
            }
        };

        let exit = ExitOrder {
            symbol,
            direction,
            quantity,
            price: exit_price,
        };
        let submitted = Instant::now();
        match self.engine(mode).close(&exit).await {
            Ok(Some(_)) => record_latency(LatencyMetric::OrderSubmission, submitted.elapsed()),
            Ok(None) => {
                tracing::warn!(position_id = %id, "Exchange reported nothing to close");
            }
            Err(e) => {
                increment(CounterMetric::OrderFailed);
                tracing::warn!(position_id = %id, error = %e, "Exit order failed, closing locally");
            }
        }

        let mut core = self.inner.core.lock().await;
        let mut position = core
            .book
            .take_open(id)
            .ok_or(ControllerError::PositionNotFound(id))?;
        let pnl = position.close(exit_price, Utc::now());
        tracing::info!(
            position_id = %id,
            symbol = %position.symbol,
            exit_price = %exit_price,
            realized_pnl = %pnl,
            "Position closed"
        );
        core.book.archive(position);
        core.risk.record_close(pnl);
        if core.risk.check().is_some() && core.state == BotState::Running {
            core.state = BotState::RiskHalted;
        }

        increment(CounterMetric::TradeClosed);
        set_gauge(GaugeMetric::OpenPositions, core.book.open_count() as f64);
        set_gauge(
            GaugeMetric::DailyPnl,
            core.risk.state().cumulative_pnl.to_f64().unwrap_or_default(),
        );
        set_gauge(GaugeMetric::TradingHalted, halted_gauge(core.state));
        Ok(pnl)
    }

    /// Clear the day's PnL and halt; a halted bot resumes running
    pub async fn reset_risk(&self) -> BotState {
        let mut core = self.inner.core.lock().await;
        core.risk.reset_day();
        core.book.clear_closed();
        if core.state == BotState::RiskHalted {
            core.state = BotState::Running;
        }
        set_gauge(GaugeMetric::DailyPnl, 0.0);
        set_gauge(GaugeMetric::TradingHalted, halted_gauge(core.state));
        core.state
    }

    /// Snapshot of the bot; never mutates
    pub async fn status(&self) -> ControllerStatus {
        let (state, config, open, closed, risk) = {
            let core = self.inner.core.lock().await;
            (
                core.state,
                core.config.clone(),
                core.book.open().to_vec(),
                core.book.closed().len(),
                core.risk.state().clone(),
            )
        };
        let current_price = self
            .inner
            .prices
            .current_price(&config.symbol)
            .await
            .map(|tick| tick.price);

        ControllerStatus {
            state,
            running: state != BotState::Stopped,
            connected: self.inner.exchange.is_connected().await,
            current_price,
            open_positions: open.len(),
            positions: open,
            closed_positions: closed,
            cumulative_pnl: risk.cumulative_pnl,
            risk,
            config,
        }
    }

    pub async fn state(&self) -> BotState {
        self.inner.core.lock().await.state
    }

    /// Today's closed positions
    pub async fn closed_positions(&self) -> Vec<ScalpPosition> {
        self.inner.core.lock().await.book.closed().to_vec()
    }

    fn engine(&self, mode: ExecutionMode) -> &dyn ExecutionEngine {
        match mode {
            ExecutionMode::Paper => &self.inner.paper,
            ExecutionMode::Live => &self.inner.live,
        }
    }
}

fn halted_gauge(state: BotState) -> f64 {
    if state == BotState::RiskHalted {
        1.0
    } else {
        0.0
    }
}
