//! Execution types

use crate::exchange::OrderSide;
use crate::signal::Direction;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Contract quantity step used when converting notional to quantity
pub const QUANTITY_DP: u32 = 3;

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Simulated fills at the signal price snapshot
    #[default]
    Paper,
    /// Orders go through the connected exchange adapter
    Live,
}

/// Order opening a scalp position
#[derive(Debug, Clone, PartialEq)]
pub struct EntryOrder {
    pub symbol: String,
    pub direction: Direction,
    /// Position size in quote currency
    pub notional: Decimal,
    pub leverage: u32,
    /// Price snapshot taken when the signal was generated
    pub price: Decimal,
}

impl EntryOrder {
    /// `notional / price`, floored to the quantity step
    pub fn quantity(&self) -> Decimal {
        if self.price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.notional / self.price).round_dp_with_strategy(QUANTITY_DP, RoundingStrategy::ToZero)
    }
}

/// Order flattening a scalp position
#[derive(Debug, Clone, PartialEq)]
pub struct ExitOrder {
    pub symbol: String,
    /// Direction of the position being closed
    pub direction: Direction,
    /// Quantity filled on entry
    pub quantity: Decimal,
    pub price: Decimal,
}

/// A fill (executed trade)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fill {
    /// Exchange or paper order identifier
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    /// Fill price
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: DateTime<Utc>,
}
