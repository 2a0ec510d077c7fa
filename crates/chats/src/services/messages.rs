//! Message persistence and cursor pagination for both chat kinds.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::entities::{GroupMessage, Message, SendMessageRequest};
use crate::types::{ChatError, ChatResult};
use crate::DEFAULT_MESSAGE_LIMIT;

use super::conversations::load_conversation;
use super::{is_unique_violation, normalize_cursor};

/// Append a message to a 1:1 conversation. The sender must be one of the
/// two participants; the conversation's `last_message_at` is bumped to the
/// message timestamp.
pub async fn send_private_message(
    pool: &SqlitePool,
    conversation_public_id: &str,
    sender_id: i64,
    req: SendMessageRequest,
) -> ChatResult<Message> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ChatError::validation("message content is required"));
    }

    let conversation = load_conversation(pool, conversation_public_id).await?;
    if !conversation.is_participant(sender_id) {
        return Err(ChatError::NotParticipant);
    }

    let public_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let attachments_json =
        serde_json::to_string(&req.attachments).unwrap_or_else(|_| "[]".to_string());

    let mut tx = pool.begin().await?;

    let message_db_id = sqlx::query(
        "INSERT INTO messages (public_id, conversation_id, sender_id, content, attachments, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&public_id)
    .bind(conversation.id)
    .bind(sender_id)
    .bind(content)
    .bind(&attachments_json)
    .bind(&now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    sqlx::query("UPDATE conversations SET last_message_at = ? WHERE id = ?")
        .bind(&now)
        .bind(conversation.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let sender = sender_public_id(pool, sender_id).await?;

    info!(conversation = %conversation.public_id, message = %public_id, "private message sent");

    Ok(Message {
        id: message_db_id,
        public_id,
        conversation_id: conversation.public_id,
        sender,
        content: content.to_string(),
        attachments: req.attachments,
        created_at: now,
    })
}

/// Message history for a conversation, newest first. `before` pages further
/// back; a page never overlaps the previous one.
pub async fn list_private_messages(
    pool: &SqlitePool,
    conversation_public_id: &str,
    user_id: i64,
    before: Option<&str>,
    limit: Option<i64>,
) -> ChatResult<Vec<Message>> {
    let conversation = load_conversation(pool, conversation_public_id).await?;
    if !conversation.is_participant(user_id) {
        return Err(ChatError::NotParticipant);
    }

    let cursor = normalize_cursor(before)?;
    let limit = limit.unwrap_or(DEFAULT_MESSAGE_LIMIT).max(1);

    let rows = match &cursor {
        Some(cursor) => {
            sqlx::query(
                r#"
                SELECT m.id, m.public_id, m.content, m.attachments, m.created_at, u.public_id AS sender
                FROM messages m
                JOIN users u ON u.id = m.sender_id
                WHERE m.conversation_id = ? AND m.created_at < ?
                ORDER BY m.created_at DESC
                LIMIT ?
                "#,
            )
            .bind(conversation.id)
            .bind(cursor)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT m.id, m.public_id, m.content, m.attachments, m.created_at, u.public_id AS sender
                FROM messages m
                JOIN users u ON u.id = m.sender_id
                WHERE m.conversation_id = ?
                ORDER BY m.created_at DESC
                LIMIT ?
                "#,
            )
            .bind(conversation.id)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter()
        .map(|row| {
            let attachments_json: String = row.try_get("attachments")?;
            Ok(Message {
                id: row.try_get("id")?,
                public_id: row.try_get("public_id")?,
                conversation_id: conversation.public_id.clone(),
                sender: row.try_get("sender")?,
                content: row.try_get("content")?,
                attachments: serde_json::from_str(&attachments_json).unwrap_or_default(),
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}

/// Append a message to a group's chat, creating the chat on first use. The
/// sender must be a member of the group.
pub async fn send_group_message(
    pool: &SqlitePool,
    group_public_id: &str,
    sender_id: i64,
    req: SendMessageRequest,
) -> ChatResult<GroupMessage> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ChatError::validation("message content is required"));
    }

    let group_db_id = check_group_membership(pool, group_public_id, sender_id).await?;
    let chat_id = get_or_create_group_chat(pool, group_db_id).await?;

    let public_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let attachments_json =
        serde_json::to_string(&req.attachments).unwrap_or_else(|_| "[]".to_string());

    let mut tx = pool.begin().await?;

    let message_db_id = sqlx::query(
        "INSERT INTO group_messages (public_id, group_chat_id, sender_id, content, attachments, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&public_id)
    .bind(chat_id)
    .bind(sender_id)
    .bind(content)
    .bind(&attachments_json)
    .bind(&now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    sqlx::query("UPDATE group_chats SET last_message_at = ? WHERE id = ?")
        .bind(&now)
        .bind(chat_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let sender = sender_public_id(pool, sender_id).await?;

    info!(group = group_public_id, message = %public_id, "group message sent");

    Ok(GroupMessage {
        id: message_db_id,
        public_id,
        chat_id,
        group_id: group_public_id.to_string(),
        sender,
        content: content.to_string(),
        attachments: req.attachments,
        created_at: now,
    })
}

/// Group chat history, newest first. A group with no chat yet has an empty
/// history.
pub async fn list_group_messages(
    pool: &SqlitePool,
    group_public_id: &str,
    user_id: i64,
    before: Option<&str>,
    limit: Option<i64>,
) -> ChatResult<Vec<GroupMessage>> {
    let group_db_id = check_group_membership(pool, group_public_id, user_id).await?;

    let chat_id: Option<i64> = sqlx::query_scalar("SELECT id FROM group_chats WHERE group_id = ?")
        .bind(group_db_id)
        .fetch_optional(pool)
        .await?;

    let Some(chat_id) = chat_id else {
        return Ok(Vec::new());
    };

    let cursor = normalize_cursor(before)?;
    let limit = limit.unwrap_or(DEFAULT_MESSAGE_LIMIT).max(1);

    let rows = match &cursor {
        Some(cursor) => {
            sqlx::query(
                r#"
                SELECT m.id, m.public_id, m.content, m.attachments, m.created_at, u.public_id AS sender
                FROM group_messages m
                JOIN users u ON u.id = m.sender_id
                WHERE m.group_chat_id = ? AND m.created_at < ?
                ORDER BY m.created_at DESC
                LIMIT ?
                "#,
            )
            .bind(chat_id)
            .bind(cursor)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT m.id, m.public_id, m.content, m.attachments, m.created_at, u.public_id AS sender
                FROM group_messages m
                JOIN users u ON u.id = m.sender_id
                WHERE m.group_chat_id = ?
                ORDER BY m.created_at DESC
                LIMIT ?
                "#,
            )
            .bind(chat_id)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter()
        .map(|row| {
            let attachments_json: String = row.try_get("attachments")?;
            Ok(GroupMessage {
                id: row.try_get("id")?,
                public_id: row.try_get("public_id")?,
                chat_id,
                group_id: group_public_id.to_string(),
                sender: row.try_get("sender")?,
                content: row.try_get("content")?,
                attachments: serde_json::from_str(&attachments_json).unwrap_or_default(),
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}

/// Resolve a group's row id, requiring the user to be one of its members.
pub(crate) async fn check_group_membership(
    pool: &SqlitePool,
    group_public_id: &str,
    user_id: i64,
) -> ChatResult<i64> {
    let group_id: Option<i64> = sqlx::query_scalar("SELECT id FROM groups WHERE public_id = ?")
        .bind(group_public_id)
        .fetch_optional(pool)
        .await?;

    let Some(group_id) = group_id else {
        return Err(ChatError::GroupNotFound);
    };

    let membership: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM group_members WHERE group_id = ? AND user_id = ?",
    )
    .bind(group_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    if membership.is_none() {
        return Err(ChatError::NotGroupMember);
    }

    Ok(group_id)
}

/// One chat per group, created lazily. Concurrent first messages race on
/// the unique group_id index; the loser re-reads the winner's row.
async fn get_or_create_group_chat(pool: &SqlitePool, group_db_id: i64) -> ChatResult<i64> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM group_chats WHERE group_id = ?")
        .bind(group_db_id)
        .fetch_optional(pool)
        .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let now = Utc::now().to_rfc3339();
    let inserted = sqlx::query(
        "INSERT INTO group_chats (group_id, last_message_at, created_at) VALUES (?, ?, ?)",
    )
    .bind(group_db_id)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await;

    match inserted {
        Ok(result) => Ok(result.last_insert_rowid()),
        Err(err) if is_unique_violation(&err) => {
            sqlx::query_scalar("SELECT id FROM group_chats WHERE group_id = ?")
                .bind(group_db_id)
                .fetch_one(pool)
                .await
                .map_err(ChatError::from)
        }
        Err(err) => Err(err.into()),
    }
}

async fn sender_public_id(pool: &SqlitePool, sender_id: i64) -> ChatResult<String> {
    let public_id: Option<String> = sqlx::query_scalar("SELECT public_id FROM users WHERE id = ?")
        .bind(sender_id)
        .fetch_optional(pool)
        .await?;

    public_id.ok_or(ChatError::UserNotFound)
}
