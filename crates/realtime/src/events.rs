use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const NEW_PRIVATE_MESSAGE: &str = "newPrivateMessage";
pub const NEW_GROUP_MESSAGE: &str = "newGroupMessage";

/// An event delivered to every subscriber of a room, carrying the full
/// message record as its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEvent {
    pub event: String,
    pub payload: Value,
}

impl RoomEvent {
    pub fn new(event: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            event: event.into(),
            payload: serde_json::to_value(payload).unwrap_or(Value::Null),
        }
    }

    pub fn new_private_message(payload: impl Serialize) -> Self {
        Self::new(NEW_PRIVATE_MESSAGE, payload)
    }

    pub fn new_group_message(payload: impl Serialize) -> Self {
        Self::new(NEW_GROUP_MESSAGE, payload)
    }
}
