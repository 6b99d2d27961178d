//! Watch command implementation

use crate::feed::FeedEvent;
use crate::ws::{Backoff, ConnectionManager, WsConfig, WsMessage};
use clap::Args;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Price stream URL
    #[arg(short, long, default_value = "ws://127.0.0.1:5000/ws/prices")]
    pub url: String,

    /// Fixed delay between reconnection attempts
    #[arg(long, default_value_t = 3)]
    pub reconnect_secs: u64,

    /// Give up after this many failed attempts (0 = never)
    #[arg(long, default_value_t = 0)]
    pub max_reconnects: u32,
}

impl WatchArgs {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let manager = ConnectionManager::new(
            WsConfig::new(&self.url)
                .backoff(Backoff::Fixed(Duration::from_secs(self.reconnect_secs)))
                .max_reconnects(self.max_reconnects),
        );
        let (mut rx, handle) = manager.connect();

        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(WsMessage::Text(text)) => match serde_json::from_str::<FeedEvent>(&text) {
                        Ok(event) => tracing::info!(
                            symbol = %event.tick.symbol,
                            price = %event.tick.price,
                            change = %event.tick.percent_change_24h,
                            source = %event.source,
                            "Tick"
                        ),
                        Err(e) => tracing::warn!(error = %e, "Unparseable price message"),
                    },
                    Some(WsMessage::Connected) => tracing::info!(url = %self.url, "Price stream connected"),
                    Some(WsMessage::Reconnecting { attempt, delay }) => {
                        tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "Price stream reconnecting")
                    }
                    Some(WsMessage::Binary(_)) => {}
                    Some(WsMessage::Disconnected) | None => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        handle.abort();
        Ok(())
    }
}
