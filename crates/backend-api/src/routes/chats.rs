use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use circleup_chats::services::{conversations, messages};
use circleup_chats::{ConversationSummary, GroupMessage, Message, SendMessageRequest};
use circleup_realtime::{Room, RoomEvent};
use serde::{Deserialize, Serialize};

use crate::util::require_bearer;
use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct GroupMessageResponse {
    pub message: GroupMessage,
}

#[derive(Debug, Serialize)]
pub struct GroupMessagesResponse {
    pub messages: Vec<GroupMessage>,
}

/// Reverse-chronological cursor. `before` is a timestamp from a previous
/// page; `limit` defaults to 50 and is not capped.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/api/v1/chats/private/{other_user_id}",
    tag = "Chats",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Existing or newly created conversation id for the pair"),
        (status = 404, description = "Other user not found")
    )
)]
pub async fn open_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(other_user_id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    let conversation =
        conversations::get_or_create_conversation(state.db_pool(), user.id, &other_user_id)
            .await?;

    Ok(Json(ConversationResponse {
        conversation_id: conversation.public_id,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/chats/private",
    tag = "Chats",
    security(("bearerAuth" = [])),
    responses((status = 200, description = "The caller's conversations, most recently active first"))
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConversationsResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    let conversations = conversations::list_conversations(state.db_pool(), user.id).await?;

    Ok(Json(ConversationsResponse { conversations }))
}

#[utoipa::path(
    post,
    path = "/api/v1/chats/private/{conversation_id}/message",
    tag = "Chats",
    security(("bearerAuth" = [])),
    responses(
        (status = 201, description = "Message persisted and fanned out to the conversation room"),
        (status = 403, description = "Sender is not a participant"),
        (status = 404, description = "Conversation not found")
    )
)]
pub async fn send_private_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Response, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    let message =
        messages::send_private_message(state.db_pool(), &conversation_id, user.id, req).await?;

    // Fan out only after the write is durable.
    state
        .rooms()
        .publish(
            &Room::private(conversation_id.as_str()),
            RoomEvent::new_private_message(&message),
        )
        .await;

    Ok((StatusCode::CREATED, Json(MessageResponse { message })).into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/chats/private/{conversation_id}/messages",
    tag = "Chats",
    security(("bearerAuth" = [])),
    params(
        ("before" = Option<String>, Query, description = "Return messages strictly older than this timestamp"),
        ("limit" = Option<i64>, Query, description = "Page size, default 50")
    ),
    responses(
        (status = 200, description = "Message history, newest first"),
        (status = 403, description = "Caller is not a participant")
    )
)]
pub async fn list_private_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    let messages = messages::list_private_messages(
        state.db_pool(),
        &conversation_id,
        user.id,
        query.before.as_deref(),
        query.limit,
    )
    .await?;

    Ok(Json(MessagesResponse { messages }))
}

#[utoipa::path(
    post,
    path = "/api/v1/chats/group/{group_id}/message",
    tag = "Chats",
    security(("bearerAuth" = [])),
    responses(
        (status = 201, description = "Message persisted and fanned out to the group room"),
        (status = 403, description = "Sender is not a group member"),
        (status = 404, description = "Group not found")
    )
)]
pub async fn send_group_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Response, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    let message = messages::send_group_message(state.db_pool(), &group_id, user.id, req).await?;

    state
        .rooms()
        .publish(
            &Room::group(group_id.as_str()),
            RoomEvent::new_group_message(&message),
        )
        .await;

    Ok((StatusCode::CREATED, Json(GroupMessageResponse { message })).into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/chats/group/{group_id}/messages",
    tag = "Chats",
    security(("bearerAuth" = [])),
    params(
        ("before" = Option<String>, Query, description = "Return messages strictly older than this timestamp"),
        ("limit" = Option<i64>, Query, description = "Page size, default 50")
    ),
    responses(
        (status = 200, description = "Group chat history, newest first; empty before the first message"),
        (status = 403, description = "Caller is not a group member")
    )
)]
pub async fn list_group_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<GroupMessagesResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    let messages = messages::list_group_messages(
        state.db_pool(),
        &group_id,
        user.id,
        query.before.as_deref(),
        query.limit,
    )
    .await?;

    Ok(Json(GroupMessagesResponse { messages }))
}
