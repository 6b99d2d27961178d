//! Scalping controller types

use crate::exchange::ExchangeKind;
use crate::execution::{ExecutionMode, Fill};
use crate::risk::DailyRiskState;
use crate::signal::{Direction, RejectReason, TradeSignal};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Highest leverage accepted in a bot configuration
pub const MAX_LEVERAGE: u32 = 125;

/// Controller state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BotState {
    Stopped,
    Running,
    /// Daily loss ceiling breached; no trading until the risk state is reset
    RiskHalted,
}

/// Active bot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    pub exchange: ExchangeKind,
    pub symbol: String,
    pub leverage: u32,
    /// Position size in quote currency
    #[serde(with = "rust_decimal::serde::float")]
    pub position_size: Decimal,
    /// Daily loss ceiling in quote currency
    #[serde(with = "rust_decimal::serde::float")]
    pub max_loss: Decimal,
    /// Signals must exceed this confidence to trade
    #[serde(with = "rust_decimal::serde::float")]
    pub confidence: Decimal,
    #[serde(default)]
    pub mode: ExecutionMode,
}

impl BotConfig {
    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.symbol.trim().is_empty() {
            return Err(ControllerError::InvalidConfig("symbol is required".into()));
        }
        if self.leverage == 0 || self.leverage > MAX_LEVERAGE {
            return Err(ControllerError::InvalidConfig(format!(
                "leverage must be between 1 and {MAX_LEVERAGE}"
            )));
        }
        if self.position_size <= Decimal::ZERO {
            return Err(ControllerError::InvalidConfig(
                "positionSize must be positive".into(),
            ));
        }
        if self.max_loss <= Decimal::ZERO {
            return Err(ControllerError::InvalidConfig("maxLoss must be positive".into()));
        }
        if self.confidence < Decimal::ZERO || self.confidence > dec!(100) {
            return Err(ControllerError::InvalidConfig(
                "confidence must be within 0..=100".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// `(exit - entry) * sign * size / entry`
pub fn realized_pnl(direction: Direction, entry: Decimal, exit: Decimal, size: Decimal) -> Decimal {
    if entry.is_zero() {
        return Decimal::ZERO;
    }
    (exit - entry) * direction.sign() * size / entry
}

/// A scalp position; mutated once, on close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalpPosition {
    pub id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    #[serde(with = "rust_decimal::serde::float")]
    pub entry_price: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub exit_price: Option<Decimal>,
    /// Notional in quote currency
    #[serde(with = "rust_decimal::serde::float")]
    pub size: Decimal,
    /// Contract quantity filled on entry
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    pub leverage: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub take_profit: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub stop_loss: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(with = "rust_decimal::serde::float")]
    pub realized_pnl: Decimal,
    pub status: PositionStatus,
    pub mode: ExecutionMode,
    pub order_id: String,
}

impl ScalpPosition {
    /// Open at the signal's price snapshot
    pub fn open(signal: &TradeSignal, size: Decimal, leverage: u32, mode: ExecutionMode, fill: &Fill) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            entry_price: signal.entry_price,
            exit_price: None,
            size,
            quantity: fill.quantity,
            leverage,
            take_profit: signal.take_profit_price,
            stop_loss: signal.stop_loss_price,
            opened_at: Utc::now(),
            closed_at: None,
            realized_pnl: Decimal::ZERO,
            status: PositionStatus::Open,
            mode,
            order_id: fill.order_id.clone(),
        }
    }

    /// Close at `exit`; returns the realized PnL
    ///
    /// Closing twice is a no-op returning the PnL already realized.
    pub fn close(&mut self, exit: Decimal, at: DateTime<Utc>) -> Decimal {
        if self.status == PositionStatus::Closed {
            return self.realized_pnl;
        }
        self.exit_price = Some(exit);
        self.closed_at = Some(at);
        self.realized_pnl = realized_pnl(self.direction, self.entry_price, exit, self.size);
        self.status = PositionStatus::Closed;
        self.realized_pnl
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }
}

/// Open positions plus today's closed ones
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    open: Vec<ScalpPosition>,
    closed: Vec<ScalpPosition>,
}

impl PositionBook {
    pub fn insert(&mut self, position: ScalpPosition) {
        self.open.push(position);
    }

    pub fn take_open(&mut self, id: Uuid) -> Option<ScalpPosition> {
        let index = self.open.iter().position(|p| p.id == id)?;
        Some(self.open.swap_remove(index))
    }

    pub fn get_open(&self, id: Uuid) -> Option<&ScalpPosition> {
        self.open.iter().find(|p| p.id == id)
    }

    pub fn archive(&mut self, position: ScalpPosition) {
        self.closed.push(position);
    }

    pub fn open(&self) -> &[ScalpPosition] {
        &self.open
    }

    pub fn closed(&self) -> &[ScalpPosition] {
        &self.closed
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Sum of realized PnL over archived positions
    pub fn realized_total(&self) -> Decimal {
        self.closed.iter().map(|p| p.realized_pnl).sum()
    }

    /// Forget the day's closed positions
    pub fn clear_closed(&mut self) {
        self.closed.clear();
    }
}

/// Read-only controller snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    pub state: BotState,
    pub running: bool,
    pub connected: bool,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub current_price: Option<Decimal>,
    pub open_positions: usize,
    pub positions: Vec<ScalpPosition>,
    pub closed_positions: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub cumulative_pnl: Decimal,
    pub risk: DailyRiskState,
    pub config: BotConfig,
}

/// Outcome of one controller tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Controller not running
    Idle,
    /// Trading halted by the daily loss ceiling
    Halted,
    /// No price available for the configured symbol
    NoPrice,
    /// Signal engine emitted nothing
    NoSignal,
    Rejected(RejectReason),
    Opened(Uuid),
    /// Order submission failed; no position created
    ExecutionFailed,
}

/// Control-plane errors, surfaced to the HTTP caller
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Not connected to an exchange")]
    NotConnected,
    #[error("Bot is not running")]
    NotRunning,
    #[error("Bot is already running")]
    AlreadyRunning,
    #[error("Invalid bot configuration: {0}")]
    InvalidConfig(String),
    #[error("Bot configured for {requested} but {connected} is connected")]
    ExchangeMismatch {
        requested: ExchangeKind,
        connected: ExchangeKind,
    },
    #[error("Symbol {0} is not tracked by the price feed")]
    UntrackedSymbol(String),
    #[error("No open position {0}")]
    PositionNotFound(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::OrderSide;
    use crate::signal::{MarketSnapshot, SignalInputs};

    fn config() -> BotConfig {
        BotConfig {
            exchange: ExchangeKind::Simulated,
            symbol: "BTCUSDT".to_string(),
            leverage: 20,
            position_size: dec!(100),
            max_loss: dec!(50),
            confidence: dec!(90),
            mode: ExecutionMode::Paper,
        }
    }

    fn position(direction: Direction, entry: Decimal, size: Decimal) -> ScalpPosition {
        let signal = TradeSignal::new(
            &MarketSnapshot {
                symbol: "BTCUSDT".to_string(),
                price: entry,
                timestamp: Utc::now(),
            },
            SignalInputs {
                confidence: dec!(95),
                fakeout_probability: Decimal::ZERO,
                whale_move: false,
                direction,
            },
        );
        let fill = Fill {
            order_id: "PAPER-1".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            price: entry,
            quantity: dec!(0.2),
            timestamp: Utc::now(),
        };
        ScalpPosition::open(&signal, size, 20, ExecutionMode::Paper, &fill)
    }

    #[test]
    fn test_pnl_long_and_short() {
        let mut long = position(Direction::Long, dec!(100), dec!(20));
        assert_eq!(long.close(dec!(102), Utc::now()), dec!(0.4));
        assert_eq!(long.status, PositionStatus::Closed);

        let mut short = position(Direction::Short, dec!(100), dec!(20));
        assert_eq!(short.close(dec!(102), Utc::now()), dec!(-0.4));
    }

    #[test]
    fn test_pnl_sign_matches_direction() {
        for (entry, exit) in [(dec!(100), dec!(99)), (dec!(100), dec!(101)), (dec!(50), dec!(50))] {
            for direction in [Direction::Long, Direction::Short] {
                let pnl = realized_pnl(direction, entry, exit, dec!(100));
                let expected_sign = (exit - entry) * direction.sign();
                assert_eq!(pnl.is_sign_negative() && !pnl.is_zero(), expected_sign < Decimal::ZERO);
                assert_eq!(pnl.is_zero(), expected_sign.is_zero());
            }
        }
    }

    #[test]
    fn test_close_is_once() {
        let mut p = position(Direction::Long, dec!(100), dec!(100));
        let first = p.close(dec!(99), Utc::now());
        let second = p.close(dec!(150), Utc::now());
        assert_eq!(first, second);
        assert_eq!(p.exit_price, Some(dec!(99)));
    }

    #[test]
    fn test_position_book() {
        let mut book = PositionBook::default();
        let p = position(Direction::Long, dec!(100), dec!(100));
        let id = p.id;
        book.insert(p);
        assert_eq!(book.open_count(), 1);

        let mut taken = book.take_open(id).unwrap();
        assert!(book.take_open(id).is_none());
        taken.close(dec!(101), Utc::now());
        book.archive(taken);
        assert_eq!(book.realized_total(), dec!(1));

        book.clear_closed();
        assert!(book.closed().is_empty());
    }

    #[test]
    fn test_bot_config_validation() {
        assert!(config().validate().is_ok());

        let mut bad = config();
        bad.leverage = 0;
        assert!(matches!(bad.validate(), Err(ControllerError::InvalidConfig(_))));

        let mut bad = config();
        bad.max_loss = dec!(0);
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.confidence = dec!(101);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_bot_config_wire_format() {
        let json = r#"{"exchange":"binance","symbol":"ETHUSDT","leverage":10,"positionSize":20,"maxLoss":25.5,"confidence":92}"#;
        let parsed: BotConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.position_size, dec!(20));
        assert_eq!(parsed.max_loss, dec!(25.5));
        assert_eq!(parsed.mode, ExecutionMode::Paper);

        let out = serde_json::to_value(&parsed).unwrap();
        assert_eq!(out["maxLoss"], 25.5);
    }

    #[test]
    fn test_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&BotState::RiskHalted).unwrap(),
            "\"RISK_HALTED\""
        );
    }
}
