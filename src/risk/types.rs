//! Risk management types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Reason for trading halt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HaltReason {
    /// Cumulative realized loss reached the daily ceiling
    #[serde(rename_all = "camelCase")]
    DailyLossCeiling {
        cumulative_pnl: Decimal,
        loss_ceiling: Decimal,
    },
}

/// Realized PnL for the current trading day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRiskState {
    /// Sum of realized PnL of positions closed today
    #[serde(with = "rust_decimal::serde::float")]
    pub cumulative_pnl: Decimal,
    /// Maximum tolerated loss, as a positive amount
    #[serde(with = "rust_decimal::serde::float")]
    pub loss_ceiling: Decimal,
    /// Set when the ceiling was breached; cleared only by a reset
    pub halted_since: Option<DateTime<Utc>>,
    /// Number of positions folded into `cumulative_pnl`
    pub closed_trades: u64,
    pub trading_day: NaiveDate,
}

impl DailyRiskState {
    pub fn new(loss_ceiling: Decimal) -> Self {
        Self {
            cumulative_pnl: Decimal::ZERO,
            loss_ceiling,
            halted_since: None,
            closed_trades: 0,
            trading_day: Utc::now().date_naive(),
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted_since.is_some()
    }
}
