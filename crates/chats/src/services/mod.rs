//! Business logic for conversations and messages.

pub mod conversations;
pub mod messages;

use sqlx::SqlitePool;

use crate::types::{ChatError, ChatResult};

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation)
        }
        _ => false,
    }
}

/// Resolve a user's public id to its row id.
pub(crate) async fn resolve_user(pool: &SqlitePool, public_id: &str) -> ChatResult<i64> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE public_id = ?")
        .bind(public_id)
        .fetch_optional(pool)
        .await?;

    id.ok_or(ChatError::UserNotFound)
}

/// Parse and normalize a `before` cursor to the stored timestamp format.
pub(crate) fn normalize_cursor(before: Option<&str>) -> ChatResult<Option<String>> {
    match before {
        None => Ok(None),
        Some(raw) => {
            let parsed = chrono::DateTime::parse_from_rfc3339(raw)
                .map_err(|_| ChatError::validation("before must be an RFC 3339 timestamp"))?;
            Ok(Some(parsed.with_timezone(&chrono::Utc).to_rfc3339()))
        }
    }
}
