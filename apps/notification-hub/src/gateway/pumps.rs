//! The two tasks that run for every live connection.
//!
//! The reader only watches for liveness; the writer owns the sink, drains the
//! outbound queue in order and sends heartbeats.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::SplitStream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::Config;

use super::events::Event;
use super::session::{OutboundMessage, OutboundReceiver};

/// Upper bound on messages folded into one text frame.
const MAX_COALESCED: usize = 64;

/// Separator between coalesced messages. Compact JSON never contains a raw
/// newline, so consumers can split on it safely.
pub const FRAME_DELIMITER: char = '\n';

#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    pub ping_interval: Duration,
    pub pong_wait: Duration,
    pub write_wait: Duration,
}

impl From<&Config> for SessionTiming {
    fn from(config: &Config) -> Self {
        Self {
            ping_interval: config.ping_interval,
            pong_wait: config.pong_wait,
            write_wait: config.write_wait,
        }
    }
}

/// Why the reader stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// Close frame or end of stream.
    ClientClosed,
    /// No pong within the pong wait.
    Timeout,
    Error,
}

/// Why the writer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEnd {
    /// The hub closed the queue (unregister, eviction or shutdown).
    QueueClosed,
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("websocket write failed: {0}")]
    Transport(#[from] axum::Error),
    #[error("websocket write timed out")]
    Timeout,
}

/// Read inbound frames until the connection dies.
///
/// Only pongs push the deadline forward; anything else the client sends is
/// read and discarded.
pub async fn read_pump(
    mut ws_rx: SplitStream<WebSocket>,
    pong_wait: Duration,
    session_id: String,
) -> ReadEnd {
    let mut deadline = Instant::now() + pong_wait;

    loop {
        match time::timeout_at(deadline, ws_rx.next()).await {
            Err(_elapsed) => {
                tracing::debug!(%session_id, "pong timeout");
                return ReadEnd::Timeout;
            }
            Ok(None) | Ok(Some(Ok(Message::Close(_)))) => return ReadEnd::ClientClosed,
            Ok(Some(Ok(Message::Pong(_)))) => deadline = Instant::now() + pong_wait,
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(e))) => {
                tracing::debug!(?e, %session_id, "ws read error");
                return ReadEnd::Error;
            }
        }
    }
}

/// Write the greeting, then queued events and heartbeats, until the queue is
/// closed or a write fails.
pub async fn write_pump<S>(
    mut ws_tx: S,
    mut queue: OutboundReceiver,
    timing: SessionTiming,
    session_id: String,
) -> WriteEnd
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    match serde_json::to_string(&Event::connected()) {
        Ok(greeting) => {
            if let Err(err) = write_frame(&mut ws_tx, Message::Text(greeting.into()), timing).await {
                tracing::debug!(%err, %session_id, "failed to send greeting");
                return WriteEnd::Error;
            }
        }
        Err(err) => tracing::error!(?err, "failed to serialize greeting"),
    }

    let mut heartbeat = time::interval_at(Instant::now() + timing.ping_interval, timing.ping_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = queue.recv() => {
                let Some(first) = message else {
                    let close = Message::Close(Some(CloseFrame {
                        code: close_code::NORMAL,
                        reason: String::new().into(),
                    }));
                    let _ = write_frame(&mut ws_tx, close, timing).await;
                    return WriteEnd::QueueClosed;
                };

                let frame = coalesce(first, &mut queue);
                if let Err(err) = write_frame(&mut ws_tx, Message::Text(frame.into()), timing).await {
                    tracing::debug!(%err, %session_id, "event write failed");
                    return WriteEnd::Error;
                }
            }

            _ = heartbeat.tick() => {
                if let Err(err) = write_frame(&mut ws_tx, Message::Ping(Bytes::new()), timing).await {
                    tracing::debug!(%err, %session_id, "ping write failed");
                    return WriteEnd::Error;
                }
            }
        }
    }
}

/// Fold whatever is already queued behind `first` into one frame.
fn coalesce(first: OutboundMessage, queue: &mut OutboundReceiver) -> String {
    let mut frame = String::from(&*first);
    for _ in 1..MAX_COALESCED {
        match queue.try_recv() {
            Ok(next) => {
                frame.push(FRAME_DELIMITER);
                frame.push_str(&next);
            }
            Err(_) => break,
        }
    }
    frame
}

/// Send one frame, giving up once `write_wait` has passed.
async fn write_frame<S>(
    ws_tx: &mut S,
    message: Message,
    timing: SessionTiming,
) -> Result<(), WriteError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    match time::timeout(timing.write_wait, ws_tx.send(message)).await {
        Ok(result) => result.map_err(WriteError::from),
        Err(_elapsed) => Err(WriteError::Timeout),
    }
}
