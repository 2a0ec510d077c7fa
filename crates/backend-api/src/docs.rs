use utoipa::OpenApi;

use crate::routes;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CircleUp API",
        description = "Social-community backend: groups, membership, chat and discovery"
    ),
    paths(
        routes::health::health_check,
        routes::users::register,
        routes::users::login,
        routes::users::refresh,
        routes::users::logout,
        routes::users::me,
        routes::users::update_me,
        routes::groups::create_group,
        routes::groups::get_group,
        routes::groups::update_group,
        routes::groups::delete_group,
        routes::groups::join_group,
        routes::groups::approve_member,
        routes::groups::kick_member,
        routes::groups::promote_member,
        routes::groups::create_invite,
        routes::groups::join_with_code,
        routes::groups::get_audit_log,
        routes::chats::open_conversation,
        routes::chats::list_conversations,
        routes::chats::send_private_message,
        routes::chats::list_private_messages,
        routes::chats::send_group_message,
        routes::chats::list_group_messages,
        routes::discovery::recommend_groups,
        routes::discovery::recommend_users,
        routes::discovery::search_groups,
    )
)]
pub struct ApiDoc;
