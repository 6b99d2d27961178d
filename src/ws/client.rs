//! Managed WebSocket connection with automatic reconnection

use super::types::{WsConfig, WsError, WsMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Keeps one WebSocket connection alive and forwards its messages
///
/// Reconnection is sequential: at most one pending reconnect delay exists
/// at any time, however often the connection fails.
pub struct ConnectionManager {
    config: WsConfig,
}

impl ConnectionManager {
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self::new(WsConfig::new(url))
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Spawn the connection task and return its message stream
    ///
    /// The task ends when the receiver is dropped, the server closes cleanly
    /// or the reconnect limit is hit.
    pub fn connect(&self) -> (mpsc::Receiver<WsMessage>, JoinHandle<Result<(), WsError>>) {
        let (tx, rx) = mpsc::channel(1024);
        let config = self.config.clone();

        let handle = tokio::spawn(async move {
            let result = Self::run(config, tx).await;
            if let Err(ref e) = result {
                tracing::error!(error = %e, "WebSocket connection loop failed");
            }
            result
        });

        (rx, handle)
    }

    async fn run(config: WsConfig, tx: mpsc::Sender<WsMessage>) -> Result<(), WsError> {
        let mut attempt = 0;

        loop {
            match Self::connect_and_stream(&config, &tx, &mut attempt).await {
                Ok(()) => {
                    tracing::info!("WebSocket connection closed cleanly");
                    let _ = tx.send(WsMessage::Disconnected).await;
                    return Ok(());
                }
                Err(e) => {
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, "WebSocket connection error");

                    if config.max_reconnect_attempts > 0 && attempt >= config.max_reconnect_attempts {
                        tracing::error!("Max reconnection attempts reached");
                        let _ = tx.send(WsMessage::Disconnected).await;
                        return Err(WsError::MaxReconnectsExceeded);
                    }
                    if tx.is_closed() {
                        tracing::info!("Receiver dropped, stopping reconnection");
                        return Ok(());
                    }

                    let delay = config.backoff.delay(attempt);
                    let _ = tx.send(WsMessage::Reconnecting { attempt, delay }).await;
                    sleep(delay).await;
                }
            }
        }
    }

    async fn connect_and_stream(
        config: &WsConfig,
        tx: &mpsc::Sender<WsMessage>,
        attempt: &mut u32,
    ) -> Result<(), WsError> {
        tracing::info!(url = %config.url, "Connecting to WebSocket");

        let (ws_stream, _response) = connect_async(&config.url)
            .await
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        tracing::info!("WebSocket connected");
        *attempt = 0;
        if tx.send(WsMessage::Connected).await.is_err() {
            return Ok(());
        }

        let mut ping_interval = tokio::time::interval(config.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut pong_deadline: Option<Instant> = None;

        loop {
            let deadline = pong_deadline;
            tokio::select! {
                msg = read.next() => {
                    let forwarded = match msg {
                        Some(Ok(Message::Text(text))) => WsMessage::Text(text),
                        Some(Ok(Message::Binary(data))) => WsMessage::Binary(data),
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                            continue;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            pong_deadline = None;
                            continue;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Received close frame");
                            return Ok(());
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(WsError::ConnectionFailed(e.to_string())),
                        None => {
                            return Err(WsError::ConnectionFailed("Stream ended unexpectedly".into()));
                        }
                    };
                    if tx.send(forwarded).await.is_err() {
                        tracing::debug!("Receiver dropped, closing connection");
                        return Ok(());
                    }
                }

                _ = async move {
                    match deadline {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending().await,
                    }
                } => {
                    return Err(WsError::PongTimeout(config.pong_timeout));
                }

                _ = ping_interval.tick() => {
                    if pong_deadline.is_none() {
                        write.send(Message::Ping(Vec::new())).await
                            .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        pong_deadline = Some(Instant::now() + config.pong_timeout);
                    }
                }
            }
        }
    }
}
