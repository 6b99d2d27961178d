//! Live execution through the installed exchange adapter

use super::{EntryOrder, ExecutionEngine, ExecutionMode, ExitOrder, Fill};
use crate::exchange::{ActiveExchange, CloseOutcome, ExchangeError};
use async_trait::async_trait;
use chrono::Utc;

/// Submits market orders via whichever adapter is installed
///
/// Exits flatten the whole resident position for the symbol and side.
/// Overlapping scalps on the same side share one exchange position, so the
/// first exit closes all of them and later exits get nothing to close; their
/// local positions still close at the oracle price.
pub struct LiveEngine {
    exchange: ActiveExchange,
}

impl LiveEngine {
    pub fn new(exchange: ActiveExchange) -> Self {
        Self { exchange }
    }
}

#[async_trait]
impl ExecutionEngine for LiveEngine {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Live
    }

    async fn open(&self, order: &EntryOrder) -> Result<Fill, ExchangeError> {
        let adapter = self.exchange.get().await.ok_or(ExchangeError::NotConnected)?;
        let quantity = order.quantity();
        if quantity.is_zero() {
            return Err(ExchangeError::OrderRejected(format!(
                "position size {} is below one quantity step at {}",
                order.notional, order.price
            )));
        }

        let ack = adapter
            .open_position(
                &order.symbol,
                order.direction.order_side(),
                quantity,
                order.leverage,
            )
            .await?;

        Ok(Fill {
            order_id: ack.order_id,
            symbol: ack.symbol,
            side: ack.side,
            price: order.price,
            quantity: ack.quantity,
            timestamp: Utc::now(),
        })
    }

    async fn close(&self, order: &ExitOrder) -> Result<Option<Fill>, ExchangeError> {
        let adapter = self.exchange.get().await.ok_or(ExchangeError::NotConnected)?;
        match adapter
            .close_position(&order.symbol, order.direction.position_side())
            .await?
        {
            CloseOutcome::Closed(ack) => Ok(Some(Fill {
                order_id: ack.order_id,
                symbol: ack.symbol,
                side: ack.side,
                price: order.price,
                quantity: ack.quantity,
                timestamp: Utc::now(),
            })),
            CloseOutcome::NothingToClose => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{Credentials, ExchangeAdapter, SimulatedExchange};
    use crate::signal::Direction;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn entry(notional: rust_decimal::Decimal) -> EntryOrder {
        EntryOrder {
            symbol: "BTCUSDT".to_string(),
            direction: Direction::Long,
            notional,
            leverage: 20,
            price: dec!(43250),
        }
    }

    async fn connected() -> ActiveExchange {
        let sim = Arc::new(SimulatedExchange::new(HashMap::from([(
            "BTCUSDT".to_string(),
            dec!(43250),
        )])));
        sim.connect(Credentials::new("k", "s", true)).await.unwrap();
        let active = ActiveExchange::new();
        active.install(sim).await;
        active
    }

    #[tokio::test]
    async fn test_live_open_and_close() {
        let engine = LiveEngine::new(connected().await);

        let fill = engine.open(&entry(dec!(100))).await.unwrap();
        assert_eq!(fill.quantity, dec!(0.002));

        let exit = ExitOrder {
            symbol: "BTCUSDT".to_string(),
            direction: Direction::Long,
            quantity: fill.quantity,
            price: dec!(43300),
        };
        assert!(engine.close(&exit).await.unwrap().is_some());
        assert!(engine.close(&exit).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_live_rejects_dust_size() {
        let engine = LiveEngine::new(connected().await);
        assert!(matches!(
            engine.open(&entry(dec!(1))).await,
            Err(ExchangeError::OrderRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_live_without_exchange() {
        let engine = LiveEngine::new(ActiveExchange::new());
        assert!(matches!(
            engine.open(&entry(dec!(100))).await,
            Err(ExchangeError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_overlapping_entries_share_one_exit() {
        let engine = LiveEngine::new(connected().await);
        let first = engine.open(&entry(dec!(100))).await.unwrap();
        let second = engine.open(&entry(dec!(100))).await.unwrap();

        let exit = |quantity| ExitOrder {
            symbol: "BTCUSDT".to_string(),
            direction: Direction::Long,
            quantity,
            price: dec!(43300),
        };
        let flattened = engine.close(&exit(first.quantity)).await.unwrap().unwrap();
        assert_eq!(flattened.quantity, first.quantity + second.quantity);
        assert!(engine.close(&exit(second.quantity)).await.unwrap().is_none());
    }
}
