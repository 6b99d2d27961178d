//! Daily loss ceiling

use super::{DailyRiskState, HaltReason};
use chrono::Utc;
use rust_decimal::Decimal;

/// Tracks the day's realized PnL and decides whether trading is permitted
///
/// Once the ceiling is breached the halt latches: closing profitable
/// positions afterwards does not lift it, only `reset_day` does.
#[derive(Debug, Clone)]
pub struct RiskGovernor {
    state: DailyRiskState,
}

impl RiskGovernor {
    pub fn new(loss_ceiling: Decimal) -> Self {
        Self {
            state: DailyRiskState::new(loss_ceiling.abs()),
        }
    }

    /// Trading permitted?
    pub fn permits_trading(&self) -> bool {
        !self.state.is_halted() && !self.breached()
    }

    /// `cumulative_pnl <= -loss_ceiling`
    pub fn breached(&self) -> bool {
        self.state.cumulative_pnl <= -self.state.loss_ceiling
    }

    /// Latch the halt if the ceiling is breached
    ///
    /// Returns the reason only on the check that set the halt.
    pub fn check(&mut self) -> Option<HaltReason> {
        if self.state.is_halted() || !self.breached() {
            return None;
        }
        self.state.halted_since = Some(Utc::now());
        tracing::warn!(
            cumulative_pnl = %self.state.cumulative_pnl,
            loss_ceiling = %self.state.loss_ceiling,
            "Daily loss ceiling reached, trading halted"
        );
        Some(HaltReason::DailyLossCeiling {
            cumulative_pnl: self.state.cumulative_pnl,
            loss_ceiling: self.state.loss_ceiling,
        })
    }

    /// Fold a closed position's realized PnL into the day
    pub fn record_close(&mut self, realized_pnl: Decimal) {
        self.state.cumulative_pnl += realized_pnl;
        self.state.closed_trades += 1;
    }

    /// Start a new trading day: clears PnL and any halt
    pub fn reset_day(&mut self) {
        let loss_ceiling = self.state.loss_ceiling;
        self.state = DailyRiskState::new(loss_ceiling);
        tracing::info!(%loss_ceiling, "Daily risk state reset");
    }

    /// Applies to the current day; an existing halt stays latched
    pub fn set_loss_ceiling(&mut self, loss_ceiling: Decimal) {
        self.state.loss_ceiling = loss_ceiling.abs();
    }

    pub fn state(&self) -> &DailyRiskState {
        &self.state
    }
}
