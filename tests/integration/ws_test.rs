//! `/ws/prices` against a live server

use crate::support::offline_state;
use futures_util::StreamExt;
use scalp_hub::api::{create_router, AppState};
use scalp_hub::ws::{Backoff, ConnectionManager, WsConfig, WsMessage};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn start_server() -> (SocketAddr, Arc<AppState>) {
    let state = offline_state();
    let app = create_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

async fn wait_for_subscribers(state: &AppState, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.hub.subscriber_count().await < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber never registered");
}

#[tokio::test]
async fn test_price_stream_sends_snapshot_then_ticks() {
    let (addr, state) = start_server().await;
    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/prices"))
        .await
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let Message::Text(text) = first else {
        panic!("expected a text frame");
    };
    let snapshot: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(snapshot["symbol"], "BTCUSDT");
    assert_eq!(snapshot["price"], 43250.0);
    assert!(snapshot["percentChange"].is_number());
    assert!(snapshot["volume24h"].is_number());
    assert!(snapshot["timestamp"].is_number());

    wait_for_subscribers(&state, 1).await;
    state.hub.poll_once().await;

    let next = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let Message::Text(text) = next else {
        panic!("expected a text frame");
    };
    let tick: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(tick["symbol"], "BTCUSDT");
    assert_eq!(tick["source"], "cache");
}

#[tokio::test]
async fn test_closed_socket_is_unsubscribed() {
    let (addr, state) = start_server().await;
    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/prices"))
        .await
        .unwrap();
    wait_for_subscribers(&state, 1).await;

    socket.close(None).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.hub.subscriber_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber not removed");

    // Broadcasting afterwards is harmless
    state.hub.poll_once().await;
}

#[tokio::test]
async fn test_connection_manager_receives_prices() {
    let (addr, _state) = start_server().await;
    let manager = ConnectionManager::new(
        WsConfig::new(format!("ws://{addr}/ws/prices"))
            .backoff(Backoff::Fixed(Duration::from_millis(50)))
            .max_reconnects(3),
    );
    let (mut rx, handle) = manager.connect();

    let connected = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap();
    assert_eq!(connected, Some(WsMessage::Connected));

    let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap();
    let Some(WsMessage::Text(text)) = message else {
        panic!("expected a price message, got {message:?}");
    };
    assert!(text.contains("BTCUSDT"));

    handle.abort();
}
