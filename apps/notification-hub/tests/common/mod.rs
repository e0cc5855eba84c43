#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::Router;
use futures_util::StreamExt;
use http::{Request, StatusCode};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use notification_hub::config::Config;
use notification_hub::AppState;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the client saw next on the socket, control frames aside.
#[derive(Debug)]
pub enum Frame {
    /// One text frame, split into its coalesced events.
    Events(Vec<serde_json::Value>),
    Closed,
}

/// Default configuration with production timings.
pub fn test_config() -> Config {
    Config {
        port: 0,
        ..Config::default()
    }
}

/// Configuration with heartbeat timings short enough to observe in a test.
pub fn fast_heartbeat_config(ping_interval: Duration, pong_wait: Duration) -> Config {
    Config {
        ping_interval,
        pong_wait,
        write_wait: Duration::from_secs(1),
        ..test_config()
    }
}

/// Build the full application router wired to a fresh hub.
pub fn test_app(config: Config) -> (Router, AppState) {
    let state = AppState::new(config);
    let app = notification_hub::routes::router().with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background; the returned router shares its hub.
pub async fn start_ws_server(config: Config) -> (SocketAddr, Router, AppState) {
    let (app, state) = test_app(config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    let server_app = app.clone();
    tokio::spawn(async move {
        axum::serve(listener, server_app).await.unwrap();
    });

    (addr, app, state)
}

/// Connect to `/ws` with the given query string and consume the greeting.
pub async fn connect(addr: SocketAddr, query: &str) -> WsStream {
    let url = format!("ws://{addr}/ws?{query}");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");

    match next_frame(&mut ws).await {
        Frame::Events(events) => {
            assert_eq!(events[0]["type"], "connected");
            assert_eq!(events[0]["data"]["message"], "Connected to notification service");
        }
        Frame::Closed => panic!("connection closed before greeting"),
    }
    ws
}

/// Wait until the hub reports exactly `expected` sessions.
pub async fn wait_for_connections(state: &AppState, expected: usize) {
    let result = time::timeout(Duration::from_secs(5), async {
        loop {
            if state.hub.connection_count().await.unwrap() == expected {
                return;
            }
            time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "hub never reached {expected} connections");
}

/// Read the next text frame (or close), skipping pings and pongs.
pub async fn next_frame(ws: &mut WsStream) -> Frame {
    time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let events = text
                        .split('\n')
                        .map(|line| serde_json::from_str(line).expect("parse event"))
                        .collect();
                    return Frame::Events(events);
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return Frame::Closed,
                Some(Ok(other)) => panic!("unexpected frame: {other:?}"),
            }
        }
    })
    .await
    .expect("timeout waiting for frame")
}

/// Read frames until `count` events have arrived.
pub async fn next_events(ws: &mut WsStream, count: usize) -> Vec<serde_json::Value> {
    let mut events = Vec::new();
    while events.len() < count {
        match next_frame(ws).await {
            Frame::Events(batch) => events.extend(batch),
            Frame::Closed => panic!("connection closed after {} events", events.len()),
        }
    }
    events
}

/// Assert that no text frame arrives within `window`.
pub async fn expect_silence(ws: &mut WsStream, window: Duration) {
    let res = time::timeout(window, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                other => return other,
            }
        }
    })
    .await;
    if let Ok(frame) = res {
        panic!("expected no frame, got {frame:?}");
    }
}

/// Publish through the HTTP route without going over the network.
pub async fn publish(app: &Router, body: serde_json::Value) -> StatusCode {
    let request = Request::builder()
        .method("POST")
        .uri("/api/events")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}
