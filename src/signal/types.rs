//! Signal types

use crate::exchange::{OrderSide, PositionSide};
use crate::feed::PriceTick;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fakeout probability above which a signal is a fakeout
pub const FAKEOUT_THRESHOLD: Decimal = dec!(85);
/// Fakeout probability above which a signal is a manipulation trap
pub const TRAP_THRESHOLD: Decimal = dec!(82);

const TAKE_PROFIT_PCT: Decimal = dec!(0.015);
const STOP_LOSS_PCT: Decimal = dec!(0.005);

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short
    pub fn sign(&self) -> Decimal {
        match self {
            Direction::Long => Decimal::ONE,
            Direction::Short => Decimal::NEGATIVE_ONE,
        }
    }

    /// Side of the order that opens a position in this direction
    pub fn order_side(&self) -> OrderSide {
        match self {
            Direction::Long => OrderSide::Buy,
            Direction::Short => OrderSide::Sell,
        }
    }

    pub fn position_side(&self) -> PositionSide {
        match self {
            Direction::Long => PositionSide::Long,
            Direction::Short => PositionSide::Short,
        }
    }
}

/// Market observation a signal is computed from
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl From<&PriceTick> for MarketSnapshot {
    fn from(tick: &PriceTick) -> Self {
        Self {
            symbol: tick.symbol.clone(),
            price: tick.price,
            timestamp: tick.timestamp,
        }
    }
}

/// Raw draws behind a signal, before classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalInputs {
    /// Confidence score in [0, 100]
    pub confidence: Decimal,
    /// Synthetic fakeout probability in [0, 100)
    pub fakeout_probability: Decimal,
    /// Large-player activity detected
    pub whale_move: bool,
    pub direction: Direction,
}

impl SignalInputs {
    pub fn is_fakeout(&self) -> bool {
        self.fakeout_probability > FAKEOUT_THRESHOLD
    }

    /// Strictly broader than `is_fakeout`
    pub fn is_manipulation_trap(&self) -> bool {
        self.fakeout_probability > TRAP_THRESHOLD || self.whale_move
    }
}

/// A scalping signal; created once per tick, never mutated
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSignal {
    pub id: Uuid,
    pub symbol: String,
    pub confidence: Decimal,
    pub direction: Direction,
    pub is_fakeout: bool,
    pub is_manipulation_trap: bool,
    pub fakeout_probability: Decimal,
    pub whale_move: bool,
    /// Price snapshot at signal time
    pub entry_price: Decimal,
    pub take_profit_price: Decimal,
    pub stop_loss_price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl TradeSignal {
    /// Classify inputs and attach fixed scalping targets (+1.5% / -0.5%, mirrored for shorts)
    pub fn new(snapshot: &MarketSnapshot, inputs: SignalInputs) -> Self {
        let entry = snapshot.price;
        let (take_profit, stop_loss) = match inputs.direction {
            Direction::Long => (
                entry * (Decimal::ONE + TAKE_PROFIT_PCT),
                entry * (Decimal::ONE - STOP_LOSS_PCT),
            ),
            Direction::Short => (
                entry * (Decimal::ONE - TAKE_PROFIT_PCT),
                entry * (Decimal::ONE + STOP_LOSS_PCT),
            ),
        };

        Self {
            id: Uuid::new_v4(),
            symbol: snapshot.symbol.clone(),
            confidence: inputs.confidence,
            direction: inputs.direction,
            is_fakeout: inputs.is_fakeout(),
            is_manipulation_trap: inputs.is_manipulation_trap(),
            fakeout_probability: inputs.fakeout_probability,
            whale_move: inputs.whale_move,
            entry_price: entry,
            take_profit_price: take_profit,
            stop_loss_price: stop_loss,
            timestamp: snapshot.timestamp,
        }
    }
}
