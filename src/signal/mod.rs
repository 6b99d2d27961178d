//! Signal generation module
//!
//! Synthesizes scalping signals from market snapshots and gates them
//! before they reach the controller

mod engine;
mod filter;
mod types;

pub use engine::{FixedSignalEngine, RandomSignalEngine, SignalEngine};
pub use filter::{FilterResult, RejectReason, SignalFilter};
pub use types::{
    Direction, MarketSnapshot, SignalInputs, TradeSignal, FAKEOUT_THRESHOLD, TRAP_THRESHOLD,
};
