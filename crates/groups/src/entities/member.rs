use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed role hierarchy. Higher rank outranks lower; the owner role is
/// assigned exactly once, at group creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Owner,
    Admin,
    Moderator,
    Member,
}

impl GroupRole {
    /// Privilege rank (higher number = more privilege).
    pub fn rank(&self) -> u8 {
        match self {
            GroupRole::Owner => 4,
            GroupRole::Admin => 3,
            GroupRole::Moderator => 2,
            GroupRole::Member => 1,
        }
    }

    /// Parse a stored role string. Unknown strings yield `None`, which every
    /// policy check treats as rank 0.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(GroupRole::Owner),
            "admin" => Some(GroupRole::Admin),
            "moderator" => Some(GroupRole::Moderator),
            "member" => Some(GroupRole::Member),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Owner => "owner",
            GroupRole::Admin => "admin",
            GroupRole::Moderator => "moderator",
            GroupRole::Member => "member",
        }
    }

    pub fn all() -> [GroupRole; 4] {
        [
            GroupRole::Owner,
            GroupRole::Admin,
            GroupRole::Moderator,
            GroupRole::Member,
        ]
    }
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public identity attached to membership records in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct MemberUser {
    pub id: String,
    pub display_name: Option<String>,
}

/// One row of a group's ordered member list.
#[derive(Debug, Clone, Serialize)]
pub struct GroupMember {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub user: MemberUser,
    pub role: String,
    pub joined_at: String,
}

/// A pending membership application awaiting admin+ approval. Only used for
/// non-public groups.
#[derive(Debug, Clone, Serialize)]
pub struct JoinRequest {
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub user: MemberUser,
    pub requested_at: String,
}
