use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use circleup_groups::services::{lifecycle, membership};
use circleup_groups::services::membership::JoinOutcome;
use circleup_groups::{
    AuditEntry, CreateGroupRequest, GroupDetail, GroupMember, InviteCode, UpdateGroupRequest,
};
use serde::{Deserialize, Serialize};

use crate::util::require_bearer;
use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub group: GroupDetail,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub member: GroupMember,
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub invite_code: String,
    pub expires_at: String,
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub audit_log: Vec<AuditEntry>,
}

#[derive(Debug, Deserialize)]
pub struct JoinWithCodeRequest {
    pub code: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/groups",
    tag = "Groups",
    security(("bearerAuth" = [])),
    responses(
        (status = 201, description = "Group created, creator installed as owner"),
        (status = 400, description = "Invalid group payload"),
        (status = 401, description = "Authentication required")
    )
)]
pub async fn create_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateGroupRequest>,
) -> Result<Response, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    let group = lifecycle::create_group(state.db_pool(), user.id, req).await?;

    Ok((StatusCode::CREATED, Json(GroupResponse { group })).into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/groups/{group_id}",
    tag = "Groups",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Group with members and join requests populated"),
        (status = 404, description = "Group not found")
    )
)]
pub async fn get_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
) -> Result<Json<GroupResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    state.authenticate(&token).await?;

    let group = lifecycle::get_group(state.db_pool(), &group_id).await?;

    Ok(Json(GroupResponse { group }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/groups/{group_id}",
    tag = "Groups",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Group metadata updated"),
        (status = 403, description = "Requires admin or owner"),
        (status = 404, description = "Group not found")
    )
)]
pub async fn update_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
    Json(req): Json<UpdateGroupRequest>,
) -> Result<Json<GroupResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    lifecycle::update_group(state.db_pool(), &group_id, user.id, req).await?;
    let group = lifecycle::get_group(state.db_pool(), &group_id).await?;

    Ok(Json(GroupResponse { group }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/groups/{group_id}",
    tag = "Groups",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Group deleted; chat history is left orphaned"),
        (status = 403, description = "Requires admin or owner"),
        (status = 404, description = "Group not found")
    )
)]
pub async fn delete_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    lifecycle::delete_group(state.db_pool(), &group_id, user.id).await?;

    Ok(Json(serde_json::json!({ "message": "group deleted" })))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups/{group_id}/join",
    tag = "Groups",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Joined immediately (public) or request queued (private/secret)"),
        (status = 404, description = "Group not found"),
        (status = 409, description = "Already a member or request already pending")
    )
)]
pub async fn join_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    let outcome = membership::request_join(state.db_pool(), &group_id, user.id).await?;
    let message = match outcome {
        JoinOutcome::Joined => "joined group",
        JoinOutcome::Requested => "join request submitted",
    };

    Ok(Json(serde_json::json!({ "message": message })))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups/{group_id}/approve/{user_id}",
    tag = "Groups",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Join request approved, user added as member"),
        (status = 403, description = "Requires admin or owner"),
        (status = 409, description = "User is already a member")
    )
)]
pub async fn approve_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((group_id, user_id)): Path<(String, String)>,
) -> Result<Json<MemberResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (approver, _) = state.authenticate(&token).await?;

    let member =
        membership::approve_join(state.db_pool(), &group_id, approver.id, &user_id).await?;

    Ok(Json(MemberResponse { member }))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups/{group_id}/kick/{user_id}",
    tag = "Groups",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Member removed"),
        (status = 403, description = "Actor does not outrank the target"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn kick_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((group_id, user_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = require_bearer(&headers)?;
    let (actor, _) = state.authenticate(&token).await?;

    membership::kick_member(state.db_pool(), &group_id, actor.id, &user_id).await?;

    Ok(Json(serde_json::json!({ "message": "member kicked" })))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups/{group_id}/promote/{user_id}",
    tag = "Groups",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Member promoted to admin"),
        (status = 403, description = "Actor does not outrank the target"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn promote_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((group_id, user_id)): Path<(String, String)>,
) -> Result<Json<MemberResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (actor, _) = state.authenticate(&token).await?;

    let member =
        membership::promote_member(state.db_pool(), &group_id, actor.id, &user_id).await?;

    Ok(Json(MemberResponse { member }))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups/{group_id}/invite",
    tag = "Groups",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Invite code generated with a seven-day expiry"),
        (status = 403, description = "Requires admin or owner")
    )
)]
pub async fn create_invite(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
) -> Result<Json<InviteResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (actor, _) = state.authenticate(&token).await?;

    let InviteCode {
        code, expires_at, ..
    } = membership::generate_invite(state.db_pool(), &group_id, actor.id).await?;

    Ok(Json(InviteResponse {
        invite_code: code,
        expires_at,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups/join/code",
    tag = "Groups",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Joined the group behind the invite code"),
        (status = 400, description = "Unknown or expired invite code"),
        (status = 409, description = "Already a member")
    )
)]
pub async fn join_with_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<JoinWithCodeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    let group_id = membership::join_with_code(state.db_pool(), user.id, &req.code).await?;

    Ok(Json(
        serde_json::json!({ "message": "joined group", "group_id": group_id }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/groups/{group_id}/audit",
    tag = "Groups",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Append-only audit log, oldest first"),
        (status = 403, description = "Requires admin or owner")
    )
)]
pub async fn get_audit_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (actor, _) = state.authenticate(&token).await?;

    let audit_log = lifecycle::get_audit_log(state.db_pool(), &group_id, actor.id).await?;

    Ok(Json(AuditLogResponse { audit_log }))
}
