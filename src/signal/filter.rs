//! Entry gate for trade signals

use super::TradeSignal;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Result of applying the entry gate to a signal
#[derive(Debug, Clone, PartialEq)]
pub enum FilterResult {
    /// Signal may open a position
    Pass,
    Reject(RejectReason),
}

/// Reason a signal did not open a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Confidence at or below the configured threshold
    LowConfidence,
    Fakeout,
    ManipulationTrap,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::LowConfidence => "low_confidence",
            RejectReason::Fakeout => "fakeout",
            RejectReason::ManipulationTrap => "manipulation_trap",
        }
    }
}

/// Opens only on `confidence > threshold` with neither flag set
#[derive(Debug, Clone, Copy)]
pub struct SignalFilter {
    threshold: Decimal,
}

impl SignalFilter {
    pub fn new(threshold: Decimal) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    pub fn apply(&self, signal: &TradeSignal) -> FilterResult {
        if signal.confidence <= self.threshold {
            return FilterResult::Reject(RejectReason::LowConfidence);
        }
        if signal.is_fakeout {
            return FilterResult::Reject(RejectReason::Fakeout);
        }
        if signal.is_manipulation_trap {
            return FilterResult::Reject(RejectReason::ManipulationTrap);
        }
        FilterResult::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{Direction, MarketSnapshot, SignalInputs};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn signal(confidence: Decimal, fakeout: bool, trap: bool) -> TradeSignal {
        let snapshot = MarketSnapshot {
            symbol: "BTCUSDT".to_string(),
            price: dec!(100),
            timestamp: Utc::now(),
        };
        let mut signal = TradeSignal::new(
            &snapshot,
            SignalInputs {
                confidence,
                fakeout_probability: Decimal::ZERO,
                whale_move: false,
                direction: Direction::Long,
            },
        );
        signal.is_fakeout = fakeout;
        signal.is_manipulation_trap = trap;
        signal
    }

    #[test]
    fn test_only_clean_confident_signals_pass() {
        let filter = SignalFilter::new(dec!(90));
        let confidences = [dec!(0), dec!(85), dec!(89.99), dec!(90), dec!(90.01), dec!(99.99), dec!(100)];

        for confidence in confidences {
            for fakeout in [false, true] {
                for trap in [false, true] {
                    let result = filter.apply(&signal(confidence, fakeout, trap));
                    let should_pass = confidence > dec!(90) && !fakeout && !trap;
                    assert_eq!(
                        result == FilterResult::Pass,
                        should_pass,
                        "confidence={confidence} fakeout={fakeout} trap={trap}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_reject_reasons() {
        let filter = SignalFilter::new(dec!(90));
        assert_eq!(
            filter.apply(&signal(dec!(90), false, false)),
            FilterResult::Reject(RejectReason::LowConfidence)
        );
        assert_eq!(
            filter.apply(&signal(dec!(95), true, true)),
            FilterResult::Reject(RejectReason::Fakeout)
        );
        assert_eq!(
            filter.apply(&signal(dec!(95), false, true)),
            FilterResult::Reject(RejectReason::ManipulationTrap)
        );
    }
}
