//! WebSocket upgrade handler and per-connection supervision.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocket;
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;

use crate::AppState;

use super::pumps::{read_pump, write_pump, SessionTiming, WriteEnd};
use super::scope::{ConnectParams, Scope};
use super::session::{Lifecycle, SessionHandle, SessionState};

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::warn!(%rejection, "websocket handshake rejected");
            return rejection.into_response();
        }
    };

    let scope = Scope::from_params(&params);
    ws.on_failed_upgrade(|err| tracing::warn!(%err, "websocket upgrade failed"))
        .on_upgrade(move |socket| handle_connection(socket, scope, state))
}

/// Register the session, run both pumps, and tear everything down once either
/// of them stops.
async fn handle_connection(socket: WebSocket, scope: Scope, state: AppState) {
    let timing = SessionTiming::from(state.config.as_ref());
    let (session, queue) = SessionHandle::new(scope, state.config.outbound_queue_capacity);
    let session_id = session.session_id.clone();
    let mut lifecycle = Lifecycle::new(session_id.clone());

    if let Err(err) = state.hub.register(session).await {
        tracing::warn!(%err, %session_id, "dropping connection");
        advance(&mut lifecycle, SessionState::Closed);
        return;
    }

    let (ws_tx, ws_rx) = socket.split();
    let mut writer = tokio::spawn(write_pump(ws_tx, queue, timing, session_id.clone()));
    let mut reader = tokio::spawn(read_pump(ws_rx, timing.pong_wait, session_id.clone()));
    advance(&mut lifecycle, SessionState::Active);

    let writer_finished = tokio::select! {
        end = &mut reader => {
            tracing::debug!(%session_id, ?end, "reader stopped");
            false
        }
        end = &mut writer => {
            tracing::debug!(%session_id, ?end, "writer stopped");
            true
        }
    };
    advance(&mut lifecycle, SessionState::Closing);

    // Closes the queue; a still-running writer drains it and sends a close frame.
    if let Err(err) = state.hub.unregister(session_id.clone()).await {
        tracing::debug!(%err, %session_id, "unregister after hub stopped");
    }

    if writer_finished {
        reader.abort();
        let _ = reader.await;
    } else {
        match writer.await {
            Ok(WriteEnd::QueueClosed) => {}
            Ok(WriteEnd::Error) => tracing::debug!(%session_id, "writer failed while draining"),
            Err(err) => tracing::warn!(?err, %session_id, "writer task failed"),
        }
    }

    advance(&mut lifecycle, SessionState::Closed);
    tracing::info!(%session_id, "gateway session ended");
}

fn advance(lifecycle: &mut Lifecycle, next: SessionState) {
    if let Err(err) = lifecycle.advance(next) {
        tracing::warn!(%err, "unexpected session transition");
    }
}
