//! Signal engines
//!
//! The production engine is a seeded random stand-in; anything implementing
//! [`SignalEngine`] can replace it without touching the controller.

use super::{Direction, MarketSnapshot, SignalInputs, TradeSignal};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::{Mutex, PoisonError};

/// Lowest confidence the random engine samples
const CONFIDENCE_BASE: f64 = 85.0;
/// Width of the confidence range [85, 100)
const CONFIDENCE_SPAN: f64 = 15.0;
/// Probability that a tick carries a whale move
const WHALE_PROBABILITY: f64 = 0.15;

/// Market observation to trade signal
pub trait SignalEngine: Send + Sync {
    /// `None` when no signal is emitted this tick
    fn evaluate(&self, snapshot: &MarketSnapshot) -> Option<TradeSignal>;
}

fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or_default()
        .round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// Random stand-in engine
///
/// Confidence is uniform in [85, 100), fakeout probability uniform in
/// [0, 100), whale moves occur 15% of the time, direction is a coin flip
/// drawn independently of the flags.
pub struct RandomSignalEngine {
    rng: Mutex<StdRng>,
    confidence_floor: Decimal,
}

impl RandomSignalEngine {
    pub fn new(confidence_floor: Decimal) -> Self {
        Self::with_rng(StdRng::from_entropy(), confidence_floor)
    }

    /// Reproducible sequence
    pub fn seeded(seed: u64, confidence_floor: Decimal) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), confidence_floor)
    }

    fn with_rng(rng: StdRng, confidence_floor: Decimal) -> Self {
        Self {
            rng: Mutex::new(rng),
            confidence_floor,
        }
    }

    fn sample(&self) -> SignalInputs {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let confidence = to_decimal(CONFIDENCE_BASE + rng.gen::<f64>() * CONFIDENCE_SPAN);
        let fakeout_probability = to_decimal(rng.gen::<f64>() * 100.0);
        let whale_move = rng.gen_bool(WHALE_PROBABILITY);
        let direction = if rng.gen_bool(0.5) {
            Direction::Long
        } else {
            Direction::Short
        };

        SignalInputs {
            confidence,
            fakeout_probability,
            whale_move,
            direction,
        }
    }
}

impl SignalEngine for RandomSignalEngine {
    fn evaluate(&self, snapshot: &MarketSnapshot) -> Option<TradeSignal> {
        let inputs = self.sample();
        if inputs.confidence < self.confidence_floor {
            return None;
        }
        Some(TradeSignal::new(snapshot, inputs))
    }
}

/// Emits the same inputs on every tick
#[derive(Debug, Clone)]
pub struct FixedSignalEngine {
    inputs: SignalInputs,
}

impl FixedSignalEngine {
    pub fn new(inputs: SignalInputs) -> Self {
        Self { inputs }
    }

    /// High-confidence signal with no flags set
    pub fn clean(direction: Direction, confidence: Decimal) -> Self {
        Self::new(SignalInputs {
            confidence,
            fakeout_probability: Decimal::ZERO,
            whale_move: false,
            direction,
        })
    }
}

impl SignalEngine for FixedSignalEngine {
    fn evaluate(&self, snapshot: &MarketSnapshot) -> Option<TradeSignal> {
        Some(TradeSignal::new(snapshot, self.inputs))
    }
}
