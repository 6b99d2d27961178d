//! Controller scenarios driven tick by tick

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use scalp_hub::exchange::{
    ActiveExchange, Credentials, ExchangeAdapter, ExchangeKind, SimulatedExchange,
};
use scalp_hub::execution::ExecutionMode;
use scalp_hub::feed::StaticPrices;
use scalp_hub::scalp::{BotConfig, BotState, ControllerTiming, ScalpController, TickOutcome};
use scalp_hub::signal::{Direction, FixedSignalEngine, SignalEngine, SignalInputs};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const NEVER: Duration = Duration::from_secs(3600);

fn bot_config(max_loss: Decimal) -> BotConfig {
    BotConfig {
        exchange: ExchangeKind::Simulated,
        symbol: "BTCUSDT".to_string(),
        leverage: 20,
        position_size: dec!(100),
        max_loss,
        confidence: dec!(90),
        mode: ExecutionMode::Paper,
    }
}

async fn connected() -> ActiveExchange {
    let sim = Arc::new(SimulatedExchange::new(HashMap::from([(
        "BTCUSDT".to_string(),
        dec!(100),
    )])));
    sim.connect(Credentials::new("demo", "demo", true))
        .await
        .unwrap();
    let active = ActiveExchange::new();
    active.install(sim).await;
    active
}

async fn controller(signals: Arc<dyn SignalEngine>) -> (ScalpController, Arc<StaticPrices>) {
    let prices = Arc::new(StaticPrices::new());
    prices.set("BTCUSDT", dec!(100)).await;
    let controller = ScalpController::new(
        ControllerTiming {
            tick_interval: NEVER,
            min_hold: NEVER,
            max_hold: NEVER,
        },
        bot_config(dec!(50)),
        connected().await,
        prices.clone(),
        signals,
    );
    (controller, prices)
}

#[tokio::test]
async fn test_loss_ceiling_halts_after_fifty_losses() {
    let (bot, prices) =
        controller(Arc::new(FixedSignalEngine::clean(Direction::Long, dec!(99)))).await;
    bot.start(bot_config(dec!(50))).await.unwrap();

    let mut opened = 0;
    for _ in 0..100 {
        prices.set("BTCUSDT", dec!(100)).await;
        match bot.tick().await {
            TickOutcome::Opened(id) => {
                opened += 1;
                // Each round trip loses exactly 1 USDT
                prices.set("BTCUSDT", dec!(99)).await;
                assert_eq!(bot.close_position(id).await.unwrap(), dec!(-1));
            }
            TickOutcome::Halted => {}
            other => panic!("unexpected tick outcome {other:?}"),
        }
    }

    assert_eq!(opened, 50);
    let status = bot.status().await;
    assert_eq!(status.state, BotState::RiskHalted);
    assert_eq!(status.cumulative_pnl, dec!(-50));
    assert_eq!(status.closed_positions, 50);
    assert!(status.risk.halted_since.is_some());
}

#[tokio::test]
async fn test_halt_survives_profitable_closes() {
    let (bot, prices) =
        controller(Arc::new(FixedSignalEngine::clean(Direction::Long, dec!(99)))).await;
    bot.start(bot_config(dec!(1))).await.unwrap();

    // Two positions open before either closes
    let TickOutcome::Opened(losing) = bot.tick().await else {
        panic!("expected a position");
    };
    let TickOutcome::Opened(winning) = bot.tick().await else {
        panic!("expected a position");
    };

    prices.set("BTCUSDT", dec!(99)).await;
    bot.close_position(losing).await.unwrap();
    assert_eq!(bot.state().await, BotState::RiskHalted);

    prices.set("BTCUSDT", dec!(110)).await;
    bot.close_position(winning).await.unwrap();
    assert!(bot.status().await.cumulative_pnl > Decimal::ZERO);

    assert_eq!(bot.state().await, BotState::RiskHalted);
    assert_eq!(bot.tick().await, TickOutcome::Halted);
}

#[tokio::test]
async fn test_gate_never_opens_on_weak_or_flagged_signals() {
    let confidences = [dec!(0), dec!(50), dec!(89.99), dec!(90), dec!(90.01), dec!(99.99)];
    let fakeout_probabilities = [dec!(0), dec!(82), dec!(83), dec!(85), dec!(86), dec!(99)];

    for confidence in confidences {
        for fakeout_probability in fakeout_probabilities {
            for whale_move in [false, true] {
                let inputs = SignalInputs {
                    confidence,
                    fakeout_probability,
                    whale_move,
                    direction: Direction::Short,
                };
                let (bot, _) = controller(Arc::new(FixedSignalEngine::new(inputs))).await;
                bot.start(bot_config(dec!(50))).await.unwrap();

                let should_open = confidence > dec!(90)
                    && !inputs.is_fakeout()
                    && !inputs.is_manipulation_trap();
                let opened = matches!(bot.tick().await, TickOutcome::Opened(_));
                assert_eq!(
                    opened, should_open,
                    "confidence={confidence} fakeout={fakeout_probability} whale={whale_move}"
                );
            }
        }
    }
}

#[tokio::test]
async fn test_entry_uses_signal_snapshot() {
    let (bot, prices) =
        controller(Arc::new(FixedSignalEngine::clean(Direction::Short, dec!(99)))).await;
    bot.start(bot_config(dec!(50))).await.unwrap();

    prices.set("BTCUSDT", dec!(250)).await;
    let TickOutcome::Opened(id) = bot.tick().await else {
        panic!("expected a position");
    };
    // A later price move does not touch the recorded entry
    prices.set("BTCUSDT", dec!(260)).await;

    let status = bot.status().await;
    let position = status.positions.iter().find(|p| p.id == id).unwrap();
    assert_eq!(position.entry_price, dec!(250));
    assert_eq!(position.take_profit, dec!(246.250));
    assert_eq!(position.stop_loss, dec!(251.250));
    assert_eq!(status.current_price, Some(dec!(260)));
}
