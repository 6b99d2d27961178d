//! Scalping bot
//!
//! Tick-driven controller: signal in, entry gate, paper or live execution,
//! timed exit, daily loss ceiling.

mod controller;
mod types;

pub use controller::{ControllerTiming, ScalpController};
pub use types::{
    realized_pnl, BotConfig, BotState, ControllerError, ControllerStatus, PositionBook,
    PositionStatus, ScalpPosition, TickOutcome, MAX_LEVERAGE,
};
