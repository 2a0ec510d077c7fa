use serde::Serialize;

use super::MessageSnippet;

/// A 1:1 conversation. Participants are stored as a canonical ordered pair
/// (`user_a < user_b`), so there is at most one row per unordered pair.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub public_id: String,
    #[serde(skip_serializing)]
    pub user_a: i64,
    #[serde(skip_serializing)]
    pub user_b: i64,
    /// Public ids of both participants, in canonical order.
    pub participants: [String; 2],
    pub last_message_at: String,
    pub created_at: String,
}

impl Conversation {
    pub fn is_participant(&self, user_id: i64) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }
}

/// One entry of a user's conversation list: the other participant and the
/// most recent message, newest conversations first.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub other_user: OtherUser,
    pub last_message: Option<MessageSnippet>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OtherUser {
    pub id: String,
    pub display_name: Option<String>,
}
