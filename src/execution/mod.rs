//! Execution engine module
//!
//! Handles order submission (paper and live modes)

mod live;
mod paper;
mod types;

pub use live::LiveEngine;
pub use paper::PaperEngine;
pub use types::{EntryOrder, ExecutionMode, ExitOrder, Fill, QUANTITY_DP};

use crate::exchange::ExchangeError;
use async_trait::async_trait;

/// Trait for execution engine implementations
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    fn mode(&self) -> ExecutionMode;
    /// Open a position at the signal snapshot
    async fn open(&self, order: &EntryOrder) -> Result<Fill, ExchangeError>;
    /// Flatten a position; `None` when there was nothing to close
    async fn close(&self, order: &ExitOrder) -> Result<Option<Fill>, ExchangeError>;
}
