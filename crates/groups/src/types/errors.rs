//! Error types for group operations.

use thiserror::Error;

use crate::policy::GroupAction;

/// Result type alias for group operations
pub type GroupResult<T> = Result<T, GroupError>;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("group not found")]
    GroupNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("member not found")]
    MemberNotFound,

    #[error("user is already a member of this group")]
    AlreadyMember,

    #[error("join request is already pending")]
    DuplicateRequest,

    #[error("forbidden: {action} requires admin or owner")]
    AdminRequired { action: GroupAction },

    #[error("forbidden: {action} requires a role above {target_role}")]
    OutrankRequired {
        action: GroupAction,
        target_role: String,
    },

    #[error("invite code is invalid")]
    InviteNotFound,

    #[error("invite code has expired")]
    InviteExpired,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("group was modified concurrently, retries exhausted")]
    VersionConflict,
}

impl GroupError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
