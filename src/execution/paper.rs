//! Paper trading execution engine

use super::{EntryOrder, ExecutionEngine, ExecutionMode, ExitOrder, Fill};
use crate::exchange::ExchangeError;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

/// Paper trading execution engine with simulated fills
///
/// Stateless; fills live only on the positions they open or close.
#[derive(Debug, Default, Clone, Copy)]
pub struct PaperEngine;

impl PaperEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExecutionEngine for PaperEngine {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Paper
    }

    async fn open(&self, order: &EntryOrder) -> Result<Fill, ExchangeError> {
        // Immediate fill at the signal snapshot
        let fill = Fill {
            order_id: format!("PAPER-{}", Uuid::new_v4()),
            symbol: order.symbol.clone(),
            side: order.direction.order_side(),
            price: order.price,
            quantity: order.quantity(),
            timestamp: Utc::now(),
        };
        tracing::debug!(order_id = %fill.order_id, symbol = %order.symbol, "Paper entry filled");
        Ok(fill)
    }

    async fn close(&self, order: &ExitOrder) -> Result<Option<Fill>, ExchangeError> {
        let fill = Fill {
            order_id: format!("PAPER-{}", Uuid::new_v4()),
            symbol: order.symbol.clone(),
            side: order.direction.order_side().opposite(),
            price: order.price,
            quantity: order.quantity,
            timestamp: Utc::now(),
        };
        tracing::debug!(order_id = %fill.order_id, symbol = %order.symbol, "Paper exit filled");
        Ok(Some(fill))
    }
}
