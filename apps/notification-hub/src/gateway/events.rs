//! Event types and wire-format messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Server → Client message
// ---------------------------------------------------------------------------

/// An event delivered to connected consumers.
///
/// Serialized once per publish and shared by every session that receives it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Value,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub branch_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub organization_id: Option<String>,
    /// Assigned by the server when the event is accepted.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Build an event stamped with the current time.
    pub fn new(
        event_type: impl Into<String>,
        data: Value,
        branch_id: Option<String>,
        organization_id: Option<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            branch_id,
            organization_id,
            timestamp: Utc::now(),
        }
    }

    /// The greeting written to every new connection before queued traffic.
    pub fn connected() -> Self {
        Self::new(
            EventName::CONNECTED,
            serde_json::json!({ "message": "Connected to notification service" }),
            None,
            None,
        )
    }
}

// ---------------------------------------------------------------------------
// Publisher → Server request
// ---------------------------------------------------------------------------

/// Body of `POST /api/events`.
///
/// Unknown fields, including any publisher-supplied `timestamp`, are ignored.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishRequest {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub data: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub branch_id: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub organization_id: Option<String>,
}

/// Producers send `""` for "no branch" / "no organization".
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Event names emitted by this service and by the known producers.
pub struct EventName;

impl EventName {
    pub const CONNECTED: &'static str = "connected";
    pub const ORDER_CREATED: &'static str = "order_created";
    pub const ORDER_STATUS_UPDATED: &'static str = "order_status_updated";
    pub const PRODUCT_CREATED: &'static str = "product_created";
    pub const QR_SESSION_OPENED: &'static str = "qr_session_opened";
    pub const QR_SESSION_CLOSED: &'static str = "qr_session_closed";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ids_deserialize_as_none() {
        let req: PublishRequest = serde_json::from_str(
            r#"{"type":"order_created","data":{},"branch_id":"","organization_id":""}"#,
        )
        .unwrap();
        assert!(req.branch_id.is_none());
        assert!(req.organization_id.is_none());
    }

    #[test]
    fn publisher_timestamp_is_ignored() {
        let req: PublishRequest = serde_json::from_str(
            r#"{"type":"order_created","timestamp":"1999-01-01T00:00:00Z","branch_id":"b1"}"#,
        )
        .unwrap();
        assert_eq!(req.event_type.as_deref(), Some("order_created"));
        assert_eq!(req.branch_id.as_deref(), Some("b1"));
        assert!(req.data.is_none());
    }

    #[test]
    fn non_object_data_is_rejected() {
        let res = serde_json::from_str::<PublishRequest>(r#"{"type":"x","data":[1,2]}"#);
        assert!(res.is_err());
    }

    #[test]
    fn event_omits_absent_ids_on_the_wire() {
        let event = Event::new(EventName::ORDER_CREATED, serde_json::json!({}), None, None);
        let wire: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["type"], "order_created");
        assert!(wire.get("branch_id").is_none());
        assert!(wire.get("organization_id").is_none());
        assert!(wire["timestamp"].is_string());
    }

    #[test]
    fn event_decodes_from_its_wire_form() {
        let event = Event::new(
            EventName::ORDER_STATUS_UPDATED,
            serde_json::json!({ "order_id": "o1" }),
            Some("b1".to_string()),
            Some("org1".to_string()),
        );
        let raw = serde_json::to_string(&event).unwrap();
        let decoded: Event = serde_json::from_str(&raw).unwrap();
        assert_eq!(decoded.branch_id.as_deref(), Some("b1"));
        assert_eq!(decoded.organization_id.as_deref(), Some("org1"));
        assert_eq!(decoded.timestamp, event.timestamp);
    }

    #[test]
    fn connected_greeting_shape() {
        let wire: Value = serde_json::to_value(Event::connected()).unwrap();
        assert_eq!(wire["type"], "connected");
        assert_eq!(wire["data"]["message"], "Connected to notification service");
    }
}
