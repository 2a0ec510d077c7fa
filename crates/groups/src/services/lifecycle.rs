//! Group creation, retrieval, metadata updates and deletion.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::entities::{
    AuditEntry, CreateGroupRequest, Group, GroupDetail, GroupPrivacy, GroupRole,
    UpdateGroupRequest,
};
use crate::policy::{self, GroupAction};
use crate::types::{GroupError, GroupResult};

use super::{
    fetch_group_head, group_from_row, is_write_contention, load_group, load_join_requests,
    load_members, member_role, GroupHead, MAX_MUTATION_ATTEMPTS,
};

/// Create a group. The creator becomes its owner; owner is assigned exactly
/// once, here.
pub async fn create_group(
    pool: &SqlitePool,
    creator_id: i64,
    req: CreateGroupRequest,
) -> GroupResult<GroupDetail> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(GroupError::validation("group name is required"));
    }

    let public_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let privacy = req.privacy.unwrap_or(GroupPrivacy::Public);
    let tags_json = serde_json::to_string(&req.tags).unwrap_or_else(|_| "[]".to_string());
    let (lat, lng) = match req.location {
        Some(point) => (Some(point.lat), Some(point.lng)),
        None => (None, None),
    };

    let mut tx = pool.begin().await?;

    let group_id = sqlx::query(
        r#"
        INSERT INTO groups (public_id, name, description, privacy, tags, lat, lng, capacity, creator_id, version, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&public_id)
    .bind(name)
    .bind(req.description.as_deref().unwrap_or(""))
    .bind(privacy.as_str())
    .bind(&tags_json)
    .bind(lat)
    .bind(lng)
    .bind(req.capacity)
    .bind(creator_id)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    sqlx::query(
        "INSERT INTO group_members (group_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
    )
    .bind(group_id)
    .bind(creator_id)
    .bind(GroupRole::Owner.as_str())
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(group = %public_id, creator_id, "group created");
    get_group(pool, &public_id).await
}

/// Fetch a group with members and pending join requests populated.
pub async fn get_group(pool: &SqlitePool, group_public_id: &str) -> GroupResult<GroupDetail> {
    let group = load_group(pool, group_public_id).await?;
    let members = load_members(pool, group.id).await?;
    let join_requests = load_join_requests(pool, group.id).await?;

    Ok(GroupDetail {
        group,
        members,
        join_requests,
    })
}

/// Update group metadata through the fixed allow-list. Admin rank required;
/// the write carries the version compare-and-swap.
pub async fn update_group(
    pool: &SqlitePool,
    group_public_id: &str,
    actor_id: i64,
    req: UpdateGroupRequest,
) -> GroupResult<Group> {
    if req.is_empty() {
        return Err(GroupError::validation("no updatable fields provided"));
    }

    for _ in 0..MAX_MUTATION_ATTEMPTS {
        let head = fetch_group_head(pool, group_public_id).await?;
        match try_update_group(pool, &head, actor_id, &req).await {
            Ok(true) => {
                info!(group = %head.public_id, "group updated");
                return load_group(pool, group_public_id).await;
            }
            Ok(false) => continue,
            Err(err) if is_write_contention(&err) => continue,
            Err(err) => return Err(err),
        }
    }

    Err(GroupError::VersionConflict)
}

async fn try_update_group(
    pool: &SqlitePool,
    head: &GroupHead,
    actor_id: i64,
    req: &UpdateGroupRequest,
) -> GroupResult<bool> {
    let mut tx = pool.begin().await?;

    let actor_role = member_role(&mut *tx, head.id, actor_id).await?;
    policy::require_admin(actor_role.as_deref().unwrap_or(""), GroupAction::UpdateGroup)?;

    let row = sqlx::query(
        "SELECT id, public_id, name, description, dp, privacy, tags, lat, lng, capacity, pinned_post, creator_id, version, created_at, updated_at FROM groups WHERE id = ?",
    )
    .bind(head.id)
    .fetch_one(&mut *tx)
    .await?;
    let mut group = group_from_row(&row)?;

    if let Some(description) = &req.description {
        group.description = description.clone();
    }
    if let Some(dp) = &req.dp {
        group.dp = Some(dp.clone());
    }
    if let Some(privacy) = req.privacy {
        group.privacy = privacy;
    }
    if let Some(tags) = &req.tags {
        group.tags = tags.clone();
    }
    if let Some(location) = req.location {
        group.location = Some(location);
    }
    if let Some(capacity) = req.capacity {
        group.capacity = Some(capacity);
    }
    if let Some(pinned_post) = &req.pinned_post {
        group.pinned_post = Some(pinned_post.clone());
    }

    let tags_json = serde_json::to_string(&group.tags).unwrap_or_else(|_| "[]".to_string());
    let (lat, lng) = match group.location {
        Some(point) => (Some(point.lat), Some(point.lng)),
        None => (None, None),
    };

    let result = sqlx::query(
        r#"
        UPDATE groups
        SET description = ?, dp = ?, privacy = ?, tags = ?, lat = ?, lng = ?,
            capacity = ?, pinned_post = ?, updated_at = ?, version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(&group.description)
    .bind(&group.dp)
    .bind(group.privacy.as_str())
    .bind(&tags_json)
    .bind(lat)
    .bind(lng)
    .bind(group.capacity)
    .bind(&group.pinned_post)
    .bind(Utc::now().to_rfc3339())
    .bind(head.id)
    .bind(head.version)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }
    tx.commit().await?;

    Ok(true)
}

/// Hard-delete a group and its membership document (members, requests,
/// invites, audit log). Group chats and messages are deliberately left
/// behind; history survives as orphans.
pub async fn delete_group(
    pool: &SqlitePool,
    group_public_id: &str,
    actor_id: i64,
) -> GroupResult<()> {
    let head = fetch_group_head(pool, group_public_id).await?;
    let mut tx = pool.begin().await?;

    let actor_role = member_role(&mut *tx, head.id, actor_id).await?;
    policy::require_admin(actor_role.as_deref().unwrap_or(""), GroupAction::DeleteGroup)?;

    sqlx::query("DELETE FROM group_members WHERE group_id = ?")
        .bind(head.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM group_join_requests WHERE group_id = ?")
        .bind(head.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM group_invite_codes WHERE group_id = ?")
        .bind(head.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM group_audit_log WHERE group_id = ?")
        .bind(head.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM groups WHERE id = ?")
        .bind(head.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(group = %head.public_id, actor_id, "group deleted");
    Ok(())
}

/// Read the append-only audit log. Admin rank required.
pub async fn get_audit_log(
    pool: &SqlitePool,
    group_public_id: &str,
    actor_id: i64,
) -> GroupResult<Vec<AuditEntry>> {
    let head = fetch_group_head(pool, group_public_id).await?;

    let actor_role = member_role(pool, head.id, actor_id).await?;
    policy::require_admin(actor_role.as_deref().unwrap_or(""), GroupAction::ViewAuditLog)?;

    let rows: Vec<(String, Option<String>, Option<String>, String)> = sqlx::query_as(
        r#"
        SELECT a.action, u.public_id, a.metadata, a.created_at
        FROM group_audit_log a
        LEFT JOIN users u ON u.id = a.performed_by
        WHERE a.group_id = ?
        ORDER BY a.created_at ASC, a.id ASC
        "#,
    )
    .bind(head.id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(action, performed_by, metadata, created_at)| AuditEntry {
            action,
            performed_by: performed_by.unwrap_or_else(|| "unknown".to_string()),
            metadata: metadata.and_then(|raw| serde_json::from_str(&raw).ok()),
            created_at,
        })
        .collect())
}
