//! Business logic for groups.
//!
//! Mutating operations follow a shared optimistic-concurrency pattern: read
//! the group head, run checks and writes in a transaction, then bump the
//! group's version with a compare-and-swap. A failed swap means another
//! mutation landed first; the operation retries from a fresh read so no
//! update is lost.

pub mod discovery;
pub mod lifecycle;
pub mod membership;

use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::entities::{GeoPoint, Group, GroupMember, GroupPrivacy, JoinRequest, MemberUser};
use crate::types::{GroupError, GroupResult};

pub(crate) const MAX_MUTATION_ATTEMPTS: u32 = 5;

/// The slice of a group row needed to start a mutation.
pub(crate) struct GroupHead {
    pub id: i64,
    pub public_id: String,
    pub privacy: GroupPrivacy,
    pub version: i64,
}

pub(crate) async fn fetch_group_head(
    pool: &SqlitePool,
    public_id: &str,
) -> GroupResult<GroupHead> {
    let row = sqlx::query("SELECT id, public_id, privacy, version FROM groups WHERE public_id = ?")
        .bind(public_id)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Err(GroupError::GroupNotFound);
    };

    let privacy_str: String = row.try_get("privacy")?;

    Ok(GroupHead {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        privacy: GroupPrivacy::parse(&privacy_str).unwrap_or(GroupPrivacy::Public),
        version: row.try_get("version")?,
    })
}

/// Compare-and-swap on the group version. Returns false when another
/// mutation committed since `expected` was read.
pub(crate) async fn commit_version(
    tx: &mut Transaction<'_, Sqlite>,
    group_id: i64,
    expected: i64,
) -> GroupResult<bool> {
    let result = sqlx::query("UPDATE groups SET version = version + 1 WHERE id = ? AND version = ?")
        .bind(group_id)
        .bind(expected)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn member_role<'e, E>(
    executor: E,
    group_id: i64,
    user_id: i64,
) -> GroupResult<Option<String>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let role: Option<String> =
        sqlx::query_scalar("SELECT role FROM group_members WHERE group_id = ? AND user_id = ?")
            .bind(group_id)
            .bind(user_id)
            .fetch_optional(executor)
            .await?;

    Ok(role)
}

pub(crate) async fn has_pending_request<'e, E>(
    executor: E,
    group_id: i64,
    user_id: i64,
) -> GroupResult<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM group_join_requests WHERE group_id = ? AND user_id = ?",
    )
    .bind(group_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.is_some())
}

pub(crate) async fn append_audit(
    tx: &mut Transaction<'_, Sqlite>,
    group_id: i64,
    action: &str,
    performed_by: i64,
    metadata: Option<serde_json::Value>,
) -> GroupResult<()> {
    let metadata_json = metadata.map(|value| value.to_string());

    sqlx::query(
        "INSERT INTO group_audit_log (group_id, action, performed_by, metadata, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(group_id)
    .bind(action)
    .bind(performed_by)
    .bind(metadata_json)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// SQLite reports lock contention between two writing transactions as an
/// error rather than waiting; those failures are safe to retry from a fresh
/// read, exactly like a failed version swap.
pub(crate) fn is_write_contention(err: &GroupError) -> bool {
    let GroupError::Database(sqlx::Error::Database(db_err)) = err else {
        return false;
    };

    matches!(db_err.code().as_deref(), Some("5") | Some("6"))
        || db_err.message().contains("database is locked")
        || db_err.message().contains("database table is locked")
}

/// Resolve a user's public id to its row id.
pub(crate) async fn resolve_user(pool: &SqlitePool, public_id: &str) -> GroupResult<i64> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE public_id = ?")
        .bind(public_id)
        .fetch_optional(pool)
        .await?;

    id.ok_or(GroupError::UserNotFound)
}

pub(crate) async fn load_group(pool: &SqlitePool, public_id: &str) -> GroupResult<Group> {
    let row = sqlx::query(
        "SELECT id, public_id, name, description, dp, privacy, tags, lat, lng, capacity, pinned_post, creator_id, version, created_at, updated_at FROM groups WHERE public_id = ?",
    )
    .bind(public_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(GroupError::GroupNotFound);
    };

    group_from_row(&row)
}

pub(crate) fn group_from_row(row: &sqlx::sqlite::SqliteRow) -> GroupResult<Group> {
    let privacy_str: String = row.try_get("privacy")?;
    let tags_json: String = row.try_get("tags")?;
    let lat: Option<f64> = row.try_get("lat")?;
    let lng: Option<f64> = row.try_get("lng")?;

    Ok(Group {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        dp: row.try_get("dp")?,
        privacy: GroupPrivacy::parse(&privacy_str).unwrap_or(GroupPrivacy::Public),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        location: match (lat, lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        },
        capacity: row.try_get("capacity")?,
        pinned_post: row.try_get("pinned_post")?,
        creator_id: row.try_get("creator_id")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Members in join order, with their public identity attached.
pub(crate) async fn load_members(
    pool: &SqlitePool,
    group_id: i64,
) -> GroupResult<Vec<GroupMember>> {
    let rows = sqlx::query(
        r#"
        SELECT gm.id, gm.user_id, gm.role, gm.joined_at, u.public_id, u.display_name
        FROM group_members gm
        JOIN users u ON u.id = gm.user_id
        WHERE gm.group_id = ?
        ORDER BY gm.joined_at ASC, gm.id ASC
        "#,
    )
    .bind(group_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(GroupMember {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                user: MemberUser {
                    id: row.try_get("public_id")?,
                    display_name: row.try_get("display_name")?,
                },
                role: row.try_get("role")?,
                joined_at: row.try_get("joined_at")?,
            })
        })
        .collect()
}

pub(crate) async fn load_member(
    pool: &SqlitePool,
    group_id: i64,
    user_id: i64,
) -> GroupResult<GroupMember> {
    let row = sqlx::query(
        r#"
        SELECT gm.id, gm.user_id, gm.role, gm.joined_at, u.public_id, u.display_name
        FROM group_members gm
        JOIN users u ON u.id = gm.user_id
        WHERE gm.group_id = ? AND gm.user_id = ?
        "#,
    )
    .bind(group_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(GroupError::MemberNotFound);
    };

    Ok(GroupMember {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        user: MemberUser {
            id: row.try_get("public_id")?,
            display_name: row.try_get("display_name")?,
        },
        role: row.try_get("role")?,
        joined_at: row.try_get("joined_at")?,
    })
}

pub(crate) async fn load_join_requests(
    pool: &SqlitePool,
    group_id: i64,
) -> GroupResult<Vec<JoinRequest>> {
    let rows = sqlx::query(
        r#"
        SELECT jr.user_id, jr.requested_at, u.public_id, u.display_name
        FROM group_join_requests jr
        JOIN users u ON u.id = jr.user_id
        WHERE jr.group_id = ?
        ORDER BY jr.requested_at ASC, jr.id ASC
        "#,
    )
    .bind(group_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(JoinRequest {
                user_id: row.try_get("user_id")?,
                user: MemberUser {
                    id: row.try_get("public_id")?,
                    display_name: row.try_get("display_name")?,
                },
                requested_at: row.try_get("requested_at")?,
            })
        })
        .collect()
}
