mod docs;
mod error;
mod state;
mod util;

pub mod routes;

pub use error::{ApiError, ErrorResponse};
pub use state::AppState;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{delete, get, patch, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/healthcheck", get(routes::health::health_check))
        // User routes
        .route("/api/v1/users/register", post(routes::users::register))
        .route("/api/v1/users/login", post(routes::users::login))
        .route("/api/v1/users/refresh", post(routes::users::refresh))
        .route("/api/v1/users/logout", post(routes::users::logout))
        .route("/api/v1/users/me", get(routes::users::me))
        .route("/api/v1/users/me", patch(routes::users::update_me))
        // Group routes
        .route("/api/v1/groups", post(routes::groups::create_group))
        .route("/api/v1/groups/join/code", post(routes::groups::join_with_code))
        .route("/api/v1/groups/:group_id", get(routes::groups::get_group))
        .route("/api/v1/groups/:group_id", patch(routes::groups::update_group))
        .route(
            "/api/v1/groups/:group_id",
            delete(routes::groups::delete_group),
        )
        .route("/api/v1/groups/:group_id/join", post(routes::groups::join_group))
        .route(
            "/api/v1/groups/:group_id/approve/:user_id",
            post(routes::groups::approve_member),
        )
        .route(
            "/api/v1/groups/:group_id/kick/:user_id",
            post(routes::groups::kick_member),
        )
        .route(
            "/api/v1/groups/:group_id/promote/:user_id",
            post(routes::groups::promote_member),
        )
        .route(
            "/api/v1/groups/:group_id/invite",
            post(routes::groups::create_invite),
        )
        .route(
            "/api/v1/groups/:group_id/audit",
            get(routes::groups::get_audit_log),
        )
        // Chat routes
        .route(
            "/api/v1/chats/private",
            get(routes::chats::list_conversations),
        )
        .route(
            "/api/v1/chats/private/:other_user_id",
            post(routes::chats::open_conversation),
        )
        .route(
            "/api/v1/chats/private/:conversation_id/message",
            post(routes::chats::send_private_message),
        )
        .route(
            "/api/v1/chats/private/:conversation_id/messages",
            get(routes::chats::list_private_messages),
        )
        .route(
            "/api/v1/chats/group/:group_id/message",
            post(routes::chats::send_group_message),
        )
        .route(
            "/api/v1/chats/group/:group_id/messages",
            get(routes::chats::list_group_messages),
        )
        // Discovery routes
        .route(
            "/api/v1/recommendations/groups",
            get(routes::discovery::recommend_groups),
        )
        .route(
            "/api/v1/recommendations/users",
            get(routes::discovery::recommend_users),
        )
        .route("/api/v1/search/groups", get(routes::discovery::search_groups))
        // Realtime channel
        .route("/ws", get(routes::websocket::websocket_handler))
        // API documentation
        .route(
            "/api/docs/openapi.json",
            get(|| async { Json(docs::ApiDoc::openapi()) }),
        )
        .with_state(state)
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
