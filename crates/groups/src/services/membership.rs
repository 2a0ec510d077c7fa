//! Membership mutations: joining, approval, kicks, promotions and invite
//! codes. Every successful mutation appends one audit entry and commits
//! through the group version compare-and-swap.
//!
//! Each operation is split into a `try_*` body that runs once inside a
//! transaction and a public wrapper that retries from a fresh read when the
//! version swap fails or SQLite reports write contention.

use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::info;

use crate::entities::{GroupMember, GroupPrivacy, GroupRole, InviteCode};
use crate::policy::{self, GroupAction};
use crate::types::{GroupError, GroupResult};

use super::{
    append_audit, commit_version, fetch_group_head, has_pending_request, is_write_contention,
    load_member, member_role, resolve_user, GroupHead, MAX_MUTATION_ATTEMPTS,
};

/// What happened on a join call: public groups admit immediately, everything
/// else queues a request for admin approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    Requested,
}

/// Ask to join a group. Auto-admits on public groups; queues a join request
/// otherwise. A user can never hold a membership and a pending request at
/// the same time.
pub async fn request_join(
    pool: &SqlitePool,
    group_public_id: &str,
    user_id: i64,
) -> GroupResult<JoinOutcome> {
    for _ in 0..MAX_MUTATION_ATTEMPTS {
        let head = fetch_group_head(pool, group_public_id).await?;
        match try_request_join(pool, &head, user_id).await {
            Ok(Some(outcome)) => {
                info!(group = %head.public_id, user_id, outcome = ?outcome, "join requested");
                return Ok(outcome);
            }
            Ok(None) => continue,
            Err(err) if is_write_contention(&err) => continue,
            Err(err) => return Err(err),
        }
    }

    Err(GroupError::VersionConflict)
}

async fn try_request_join(
    pool: &SqlitePool,
    head: &GroupHead,
    user_id: i64,
) -> GroupResult<Option<JoinOutcome>> {
    let mut tx = pool.begin().await?;

    if member_role(&mut *tx, head.id, user_id).await?.is_some() {
        return Err(GroupError::AlreadyMember);
    }
    if has_pending_request(&mut *tx, head.id, user_id).await? {
        return Err(GroupError::DuplicateRequest);
    }

    let now = Utc::now().to_rfc3339();
    let outcome = if head.privacy == GroupPrivacy::Public {
        sqlx::query(
            "INSERT INTO group_members (group_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
        )
        .bind(head.id)
        .bind(user_id)
        .bind(GroupRole::Member.as_str())
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        append_audit(&mut tx, head.id, "join", user_id, None).await?;
        JoinOutcome::Joined
    } else {
        sqlx::query(
            "INSERT INTO group_join_requests (group_id, user_id, requested_at) VALUES (?, ?, ?)",
        )
        .bind(head.id)
        .bind(user_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        append_audit(&mut tx, head.id, "request_join", user_id, None).await?;
        JoinOutcome::Requested
    };

    if !commit_version(&mut tx, head.id, head.version).await? {
        tx.rollback().await?;
        return Ok(None);
    }
    tx.commit().await?;

    Ok(Some(outcome))
}

/// Approve a pending join request. Requires admin rank; removal from the
/// queue is idempotent.
pub async fn approve_join(
    pool: &SqlitePool,
    group_public_id: &str,
    approver_id: i64,
    target_public_id: &str,
) -> GroupResult<GroupMember> {
    let target_id = resolve_user(pool, target_public_id).await?;

    for _ in 0..MAX_MUTATION_ATTEMPTS {
        let head = fetch_group_head(pool, group_public_id).await?;
        match try_approve_join(pool, &head, approver_id, target_id, target_public_id).await {
            Ok(true) => {
                info!(group = %head.public_id, user = target_public_id, "join approved");
                return load_member(pool, head.id, target_id).await;
            }
            Ok(false) => continue,
            Err(err) if is_write_contention(&err) => continue,
            Err(err) => return Err(err),
        }
    }

    Err(GroupError::VersionConflict)
}

async fn try_approve_join(
    pool: &SqlitePool,
    head: &GroupHead,
    approver_id: i64,
    target_id: i64,
    target_public_id: &str,
) -> GroupResult<bool> {
    let mut tx = pool.begin().await?;

    let approver_role = member_role(&mut *tx, head.id, approver_id).await?;
    policy::require_admin(
        approver_role.as_deref().unwrap_or(""),
        GroupAction::ApproveJoin,
    )?;

    if member_role(&mut *tx, head.id, target_id).await?.is_some() {
        return Err(GroupError::AlreadyMember);
    }

    sqlx::query("DELETE FROM group_join_requests WHERE group_id = ? AND user_id = ?")
        .bind(head.id)
        .bind(target_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "INSERT INTO group_members (group_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
    )
    .bind(head.id)
    .bind(target_id)
    .bind(GroupRole::Member.as_str())
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await?;

    append_audit(
        &mut tx,
        head.id,
        "approve_join",
        approver_id,
        Some(json!({ "user": target_public_id })),
    )
    .await?;

    if !commit_version(&mut tx, head.id, head.version).await? {
        tx.rollback().await?;
        return Ok(false);
    }
    tx.commit().await?;

    Ok(true)
}

/// Remove a member. The actor must strictly outrank the target, so peers
/// cannot kick peers and the owner is unkickable.
pub async fn kick_member(
    pool: &SqlitePool,
    group_public_id: &str,
    actor_id: i64,
    target_public_id: &str,
) -> GroupResult<()> {
    let target_id = resolve_user(pool, target_public_id).await?;

    for _ in 0..MAX_MUTATION_ATTEMPTS {
        let head = fetch_group_head(pool, group_public_id).await?;
        match try_kick_member(pool, &head, actor_id, target_id, target_public_id).await {
            Ok(true) => {
                info!(group = %head.public_id, user = target_public_id, "member kicked");
                return Ok(());
            }
            Ok(false) => continue,
            Err(err) if is_write_contention(&err) => continue,
            Err(err) => return Err(err),
        }
    }

    Err(GroupError::VersionConflict)
}

async fn try_kick_member(
    pool: &SqlitePool,
    head: &GroupHead,
    actor_id: i64,
    target_id: i64,
    target_public_id: &str,
) -> GroupResult<bool> {
    let mut tx = pool.begin().await?;

    let actor_role = member_role(&mut *tx, head.id, actor_id).await?;
    let target_role = member_role(&mut *tx, head.id, target_id)
        .await?
        .ok_or(GroupError::MemberNotFound)?;

    policy::require_outranks(
        actor_role.as_deref().unwrap_or(""),
        &target_role,
        GroupAction::KickMember,
    )?;

    sqlx::query("DELETE FROM group_members WHERE group_id = ? AND user_id = ?")
        .bind(head.id)
        .bind(target_id)
        .execute(&mut *tx)
        .await?;

    append_audit(
        &mut tx,
        head.id,
        "kick_member",
        actor_id,
        Some(json!({ "user": target_public_id })),
    )
    .await?;

    if !commit_version(&mut tx, head.id, head.version).await? {
        tx.rollback().await?;
        return Ok(false);
    }
    tx.commit().await?;

    Ok(true)
}

/// Promote a member. The actor must strictly outrank the target; promotion
/// always sets the target role to exactly admin, regardless of prior role.
pub async fn promote_member(
    pool: &SqlitePool,
    group_public_id: &str,
    actor_id: i64,
    target_public_id: &str,
) -> GroupResult<GroupMember> {
    let target_id = resolve_user(pool, target_public_id).await?;

    for _ in 0..MAX_MUTATION_ATTEMPTS {
        let head = fetch_group_head(pool, group_public_id).await?;
        match try_promote_member(pool, &head, actor_id, target_id, target_public_id).await {
            Ok(true) => {
                info!(group = %head.public_id, user = target_public_id, "member promoted");
                return load_member(pool, head.id, target_id).await;
            }
            Ok(false) => continue,
            Err(err) if is_write_contention(&err) => continue,
            Err(err) => return Err(err),
        }
    }

    Err(GroupError::VersionConflict)
}

async fn try_promote_member(
    pool: &SqlitePool,
    head: &GroupHead,
    actor_id: i64,
    target_id: i64,
    target_public_id: &str,
) -> GroupResult<bool> {
    let mut tx = pool.begin().await?;

    let actor_role = member_role(&mut *tx, head.id, actor_id).await?;
    let target_role = member_role(&mut *tx, head.id, target_id)
        .await?
        .ok_or(GroupError::MemberNotFound)?;

    policy::require_outranks(
        actor_role.as_deref().unwrap_or(""),
        &target_role,
        GroupAction::PromoteMember,
    )?;

    sqlx::query("UPDATE group_members SET role = ? WHERE group_id = ? AND user_id = ?")
        .bind(GroupRole::Admin.as_str())
        .bind(head.id)
        .bind(target_id)
        .execute(&mut *tx)
        .await?;

    append_audit(
        &mut tx,
        head.id,
        "promote_member",
        actor_id,
        Some(json!({ "user": target_public_id })),
    )
    .await?;

    if !commit_version(&mut tx, head.id, head.version).await? {
        tx.rollback().await?;
        return Ok(false);
    }
    tx.commit().await?;

    Ok(true)
}

/// Issue a new invite code with a fixed seven-day expiry. Admin rank
/// required. Codes are reusable until expiry and never revoked.
pub async fn generate_invite(
    pool: &SqlitePool,
    group_public_id: &str,
    actor_id: i64,
) -> GroupResult<InviteCode> {
    for _ in 0..MAX_MUTATION_ATTEMPTS {
        let head = fetch_group_head(pool, group_public_id).await?;
        match try_generate_invite(pool, &head, actor_id).await {
            Ok(Some(invite)) => {
                info!(group = %head.public_id, "invite code generated");
                return Ok(invite);
            }
            Ok(None) => continue,
            Err(err) if is_write_contention(&err) => continue,
            Err(err) => return Err(err),
        }
    }

    Err(GroupError::VersionConflict)
}

async fn try_generate_invite(
    pool: &SqlitePool,
    head: &GroupHead,
    actor_id: i64,
) -> GroupResult<Option<InviteCode>> {
    let mut tx = pool.begin().await?;

    let actor_role = member_role(&mut *tx, head.id, actor_id).await?;
    policy::require_admin(
        actor_role.as_deref().unwrap_or(""),
        GroupAction::GenerateInvite,
    )?;

    let invite = InviteCode::generate(Utc::now());

    sqlx::query(
        "INSERT INTO group_invite_codes (group_id, code, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(head.id)
    .bind(&invite.code)
    .bind(&invite.created_at)
    .bind(&invite.expires_at)
    .execute(&mut *tx)
    .await?;

    append_audit(
        &mut tx,
        head.id,
        "generate_invite",
        actor_id,
        Some(json!({ "code": invite.code })),
    )
    .await?;

    if !commit_version(&mut tx, head.id, head.version).await? {
        tx.rollback().await?;
        return Ok(None);
    }
    tx.commit().await?;

    Ok(Some(invite))
}

/// Join a group by redeeming an invite code. Valid until expiry, any number
/// of times. A pending join request is absorbed into the membership.
pub async fn join_with_code(pool: &SqlitePool, user_id: i64, code: &str) -> GroupResult<String> {
    let row: Option<(String, String)> = sqlx::query_as(
        r#"
        SELECT g.public_id, gic.expires_at
        FROM group_invite_codes gic
        JOIN groups g ON g.id = gic.group_id
        WHERE gic.code = ?
        ORDER BY gic.created_at DESC
        LIMIT 1
        "#,
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;

    let Some((group_public_id, expires_at)) = row else {
        return Err(GroupError::InviteNotFound);
    };

    let expired = chrono::DateTime::parse_from_rfc3339(&expires_at)
        .map(|dt| dt.with_timezone(&Utc) < Utc::now())
        .unwrap_or(true);
    if expired {
        return Err(GroupError::InviteExpired);
    }

    for _ in 0..MAX_MUTATION_ATTEMPTS {
        let head = fetch_group_head(pool, &group_public_id).await?;
        match try_join_with_code(pool, &head, user_id, code).await {
            Ok(true) => {
                info!(group = %head.public_id, user_id, "joined via invite code");
                return Ok(group_public_id);
            }
            Ok(false) => continue,
            Err(err) if is_write_contention(&err) => continue,
            Err(err) => return Err(err),
        }
    }

    Err(GroupError::VersionConflict)
}

async fn try_join_with_code(
    pool: &SqlitePool,
    head: &GroupHead,
    user_id: i64,
    code: &str,
) -> GroupResult<bool> {
    let mut tx = pool.begin().await?;

    if member_role(&mut *tx, head.id, user_id).await?.is_some() {
        return Err(GroupError::AlreadyMember);
    }

    sqlx::query("DELETE FROM group_join_requests WHERE group_id = ? AND user_id = ?")
        .bind(head.id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "INSERT INTO group_members (group_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
    )
    .bind(head.id)
    .bind(user_id)
    .bind(GroupRole::Member.as_str())
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await?;

    append_audit(
        &mut tx,
        head.id,
        "join_via_invite",
        user_id,
        Some(json!({ "code": code })),
    )
    .await?;

    if !commit_version(&mut tx, head.id, head.version).await? {
        tx.rollback().await?;
        return Ok(false);
    }
    tx.commit().await?;

    Ok(true)
}
