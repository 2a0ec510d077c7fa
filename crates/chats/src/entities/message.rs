use serde::{Deserialize, Serialize};

/// A message in a 1:1 conversation. Immutable once created; there is no
/// edit or delete.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub public_id: String,
    pub conversation_id: String,
    /// Public id of the sending user.
    pub sender: String,
    pub content: String,
    pub attachments: Vec<String>,
    pub created_at: String,
}

/// A message in a group chat. The chat itself is created lazily on first
/// message and is 1:1 with its group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupMessage {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub public_id: String,
    pub chat_id: i64,
    pub group_id: String,
    pub sender: String,
    pub content: String,
    pub attachments: Vec<String>,
    pub created_at: String,
}

/// Last-message preview used in conversation listings.
#[derive(Debug, Clone, Serialize)]
pub struct MessageSnippet {
    pub content: String,
    pub sender: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}
