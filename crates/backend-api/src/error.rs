use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use circleup_auth::AuthError;
use circleup_chats::ChatError;
use circleup_groups::GroupError;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// The single error boundary: every domain error maps to a status code and
/// a human-readable message here.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let status = match error {
            AuthError::UserExists => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::SessionNotFound
            | AuthError::SessionExpired
            | AuthError::InvalidSession => StatusCode::UNAUTHORIZED,
            AuthError::Database(_) | AuthError::PasswordHash(_) => {
                error!(error = ?error, "auth subsystem failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, error.to_string())
    }
}

impl From<GroupError> for ApiError {
    fn from(error: GroupError) -> Self {
        let status = match error {
            GroupError::GroupNotFound | GroupError::UserNotFound | GroupError::MemberNotFound => {
                StatusCode::NOT_FOUND
            }
            GroupError::AlreadyMember
            | GroupError::DuplicateRequest
            | GroupError::VersionConflict => StatusCode::CONFLICT,
            GroupError::AdminRequired { .. } | GroupError::OutrankRequired { .. } => {
                StatusCode::FORBIDDEN
            }
            GroupError::InviteNotFound
            | GroupError::InviteExpired
            | GroupError::Validation(_) => StatusCode::BAD_REQUEST,
            GroupError::Database(_) => {
                error!(error = ?error, "group storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, error.to_string())
    }
}

impl From<ChatError> for ApiError {
    fn from(error: ChatError) -> Self {
        let status = match error {
            ChatError::ConversationNotFound
            | ChatError::GroupNotFound
            | ChatError::UserNotFound => StatusCode::NOT_FOUND,
            ChatError::NotParticipant | ChatError::NotGroupMember => StatusCode::FORBIDDEN,
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::Database(_) => {
                error!(error = ?error, "chat storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, error.to_string())
    }
}
