//! Prometheus metrics

use crate::feed::SourceKind;
use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// One price source fetch
    SourceFetch,
    /// Price lookup through signal evaluation
    TickEvaluation,
    /// Order submission round trip
    OrderSubmission,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Connected price stream subscribers
    Subscribers,
    /// Open scalp positions
    OpenPositions,
    /// Realized P&L for the trading day
    DailyPnl,
    /// 1 while the daily loss ceiling holds trading
    TradingHalted,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Feed tick broadcast, labelled by the source that served it
    FeedTick(SourceKind),
    /// Price source demoted after consecutive failures
    BreakerTrip(SourceKind),
    TradeOpened,
    TradeClosed,
    /// Signal stopped by the entry gate
    TradeRejected,
    OrderFailed,
}

fn source_label(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Exchange => "exchange",
        SourceKind::Public => "public",
        SourceKind::Cache => "cache",
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::SourceFetch => "scalphub_source_fetch_latency_ms",
        LatencyMetric::TickEvaluation => "scalphub_tick_evaluation_latency_ms",
        LatencyMetric::OrderSubmission => "scalphub_order_submission_latency_ms",
    };
    metrics::histogram!(metric_name).record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::Subscribers => "scalphub_price_subscribers",
        GaugeMetric::OpenPositions => "scalphub_open_positions",
        GaugeMetric::DailyPnl => "scalphub_daily_pnl_usd",
        GaugeMetric::TradingHalted => "scalphub_trading_halted",
    };
    metrics::gauge!(metric_name).set(value);
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    match metric {
        CounterMetric::FeedTick(kind) => {
            metrics::counter!("scalphub_feed_ticks_total", "source" => source_label(kind))
                .increment(1)
        }
        CounterMetric::BreakerTrip(kind) => {
            metrics::counter!("scalphub_breaker_trips_total", "source" => source_label(kind))
                .increment(1)
        }
        CounterMetric::TradeOpened => metrics::counter!("scalphub_trades_opened_total").increment(1),
        CounterMetric::TradeClosed => metrics::counter!("scalphub_trades_closed_total").increment(1),
        CounterMetric::TradeRejected => {
            metrics::counter!("scalphub_signals_rejected_total").increment(1)
        }
        CounterMetric::OrderFailed => metrics::counter!("scalphub_orders_failed_total").increment(1),
    }
}
