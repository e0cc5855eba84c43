//! Publish endpoint for backend producers.

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{ApiError, FieldError};
use crate::gateway::events::{Event, PublishRequest};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/events", post(publish_event))
}

// ---------------------------------------------------------------------------
// POST /api/events
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct PublishResponse {
    pub status: &'static str,
}

/// Stamp the event and hand it to the hub. Delivery is fire-and-forget: a
/// `200` means the hub accepted the event, not that anyone received it.
#[utoipa::path(
    post,
    path = "/api/events",
    tag = "Events",
    request_body = PublishRequest,
    responses(
        (status = 200, description = "Event accepted for fan-out", body = PublishResponse),
        (status = 400, description = "Malformed event", body = crate::error::ApiErrorBody),
        (status = 503, description = "Hub not running", body = crate::error::ApiErrorBody),
    ),
)]
pub async fn publish_event(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PublishResponse>, ApiError> {
    // Parsed by hand so every malformed body maps to 400, whatever the
    // content type.
    let request: PublishRequest = serde_json::from_slice(&body).map_err(|err| {
        tracing::debug!(%err, "malformed publish body");
        ApiError::bad_request("Invalid request")
    })?;

    // Blank names are rejected, but accepted names are forwarded verbatim.
    let event_type = match request.event_type {
        Some(t) if !t.trim().is_empty() => t,
        _ => {
            return Err(ApiError::validation(vec![FieldError {
                field: "type".to_string(),
                message: "Event type is required".to_string(),
            }]));
        }
    };

    let event = Event::new(
        event_type,
        request.data.map(Value::Object).unwrap_or(Value::Null),
        request.branch_id,
        request.organization_id,
    );
    let raw = serde_json::to_string(&event)?;
    state.hub.broadcast(raw).await?;

    tracing::debug!(
        event_type = %event.event_type,
        branch_id = event.branch_id.as_deref().unwrap_or(""),
        organization_id = event.organization_id.as_deref().unwrap_or(""),
        "event published"
    );

    Ok(Json(PublishResponse {
        status: "published",
    }))
}
