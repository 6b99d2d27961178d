//! Risk management module
//!
//! Daily realized PnL tracking and the loss-ceiling trading halt

mod governor;
mod types;

pub use governor::RiskGovernor;
pub use types::{DailyRiskState, HaltReason};
