pub mod events;
pub mod health;

use axum::Router;
use utoipa::OpenApi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(events::router())
        .merge(crate::gateway::server::router())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        events::publish_event,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Wire types
            crate::gateway::events::Event,
            crate::gateway::events::PublishRequest,
            // Route response types
            health::HealthResponse,
            events::PublishResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Events", description = "Event publishing"),
    )
)]
pub struct ApiDoc;
