//! 1:1 conversation lookup and listing.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::entities::{Conversation, ConversationSummary, MessageSnippet, OtherUser};
use crate::types::{ChatError, ChatResult};

use super::{is_unique_violation, resolve_user};

/// Order two user ids deterministically so (A, B) and (B, A) resolve to the
/// same stored pair.
fn canonical_pair(x: i64, y: i64) -> (i64, i64) {
    if x < y {
        (x, y)
    } else {
        (y, x)
    }
}

/// Find or create the conversation between the caller and another user.
///
/// Concurrent first contact from both sides races on the unique
/// (user_a, user_b) index; the loser of that race re-fetches the winner's
/// row instead of erroring, so exactly one conversation ever exists per
/// pair.
pub async fn get_or_create_conversation(
    pool: &SqlitePool,
    user_id: i64,
    other_public_id: &str,
) -> ChatResult<Conversation> {
    let other_id = resolve_user(pool, other_public_id).await?;
    if other_id == user_id {
        return Err(ChatError::validation(
            "cannot open a conversation with yourself",
        ));
    }

    let (user_a, user_b) = canonical_pair(user_id, other_id);

    if let Some(existing) = find_by_pair(pool, user_a, user_b).await? {
        return Ok(existing);
    }

    let public_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    let inserted = sqlx::query(
        "INSERT INTO conversations (public_id, user_a, user_b, last_message_at, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&public_id)
    .bind(user_a)
    .bind(user_b)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await;

    match inserted {
        Ok(_) => {
            info!(conversation = %public_id, user_a, user_b, "conversation created");
        }
        Err(err) if is_unique_violation(&err) => {
            // Lost the first-contact race; the winner's row is authoritative.
        }
        Err(err) => return Err(err.into()),
    }

    find_by_pair(pool, user_a, user_b)
        .await?
        .ok_or(ChatError::ConversationNotFound)
}

/// All conversations for a user, most recently active first, each with the
/// other participant and a last-message snippet.
pub async fn list_conversations(
    pool: &SqlitePool,
    user_id: i64,
) -> ChatResult<Vec<ConversationSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.public_id, c.last_message_at,
               u.public_id AS other_public_id, u.display_name AS other_display_name
        FROM conversations c
        JOIN users u ON u.id = CASE WHEN c.user_a = ? THEN c.user_b ELSE c.user_a END
        WHERE c.user_a = ? OR c.user_b = ?
        ORDER BY c.last_message_at DESC
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in &rows {
        let conversation_db_id: i64 = row.try_get("id")?;

        let last_message: Option<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT m.content, u.public_id, m.created_at
            FROM messages m
            JOIN users u ON u.id = m.sender_id
            WHERE m.conversation_id = ?
            ORDER BY m.created_at DESC
            LIMIT 1
            "#,
        )
        .bind(conversation_db_id)
        .fetch_optional(pool)
        .await?;

        summaries.push(ConversationSummary {
            conversation_id: row.try_get("public_id")?,
            other_user: OtherUser {
                id: row.try_get("other_public_id")?,
                display_name: row.try_get("other_display_name")?,
            },
            last_message: last_message.map(|(content, sender, created_at)| MessageSnippet {
                content,
                sender,
                created_at,
            }),
            updated_at: row.try_get("last_message_at")?,
        });
    }

    Ok(summaries)
}

/// Load a conversation by public id with participant public ids attached.
pub(crate) async fn load_conversation(
    pool: &SqlitePool,
    public_id: &str,
) -> ChatResult<Conversation> {
    let row = sqlx::query(
        r#"
        SELECT c.id, c.public_id, c.user_a, c.user_b, c.last_message_at, c.created_at,
               ua.public_id AS user_a_public_id, ub.public_id AS user_b_public_id
        FROM conversations c
        JOIN users ua ON ua.id = c.user_a
        JOIN users ub ON ub.id = c.user_b
        WHERE c.public_id = ?
        "#,
    )
    .bind(public_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(ChatError::ConversationNotFound);
    };

    Ok(Conversation {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        user_a: row.try_get("user_a")?,
        user_b: row.try_get("user_b")?,
        participants: [
            row.try_get("user_a_public_id")?,
            row.try_get("user_b_public_id")?,
        ],
        last_message_at: row.try_get("last_message_at")?,
        created_at: row.try_get("created_at")?,
    })
}

async fn find_by_pair(
    pool: &SqlitePool,
    user_a: i64,
    user_b: i64,
) -> ChatResult<Option<Conversation>> {
    let public_id: Option<String> = sqlx::query_scalar(
        "SELECT public_id FROM conversations WHERE user_a = ? AND user_b = ?",
    )
    .bind(user_a)
    .bind(user_b)
    .fetch_optional(pool)
    .await?;

    match public_id {
        Some(public_id) => load_conversation(pool, &public_id).await.map(Some),
        None => Ok(None),
    }
}
