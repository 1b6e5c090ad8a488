use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{FrameKind, HEARTBEAT_TYPE};

/// Envelope for all agent WebSocket traffic.
///
/// The payload is kept as an opaque `serde_json::Value`. Only the `type`
/// field is ever looked at, to tell heartbeats apart from application
/// frames; everything else is handed to the caller as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Value);

impl Message {
    /// Builds a heartbeat frame with the given timestamp (ms since epoch).
    pub fn heartbeat(timestamp_ms: i64) -> Self {
        Self(serde_json::json!({
            "type": HEARTBEAT_TYPE,
            "timestamp": timestamp_ms,
        }))
    }

    /// Builds a heartbeat frame stamped with the current wall-clock time.
    pub fn heartbeat_now() -> Self {
        Self::heartbeat(chrono::Utc::now().timestamp_millis())
    }

    /// Decodes a text frame.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Encodes the message as a JSON text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    /// Returns the `type` discriminator, if the payload is an object with a
    /// string `type` field.
    pub fn msg_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    pub fn kind(&self) -> FrameKind {
        match self.msg_type() {
            Some(HEARTBEAT_TYPE) => FrameKind::Heartbeat,
            _ => FrameKind::Application,
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.kind() == FrameKind::Heartbeat
    }

    /// Returns a named field of an object payload.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
