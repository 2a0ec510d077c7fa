use serde::{Deserialize, Serialize};

use super::{GroupMember, JoinRequest};

/// Who can see the group and how joining works. Public groups auto-admit;
/// private and secret groups queue join requests. Secret groups are also
/// hidden from search and recommendations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GroupPrivacy {
    Public,
    Private,
    Secret,
}

impl GroupPrivacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupPrivacy::Public => "public",
            GroupPrivacy::Private => "private",
            GroupPrivacy::Secret => "secret",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(GroupPrivacy::Public),
            "private" => Some(GroupPrivacy::Private),
            "secret" => Some(GroupPrivacy::Secret),
            _ => None,
        }
    }
}

/// A geographic point (WGS84 degrees).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Group {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub public_id: String,
    pub name: String,
    pub description: String,
    pub dp: Option<String>,
    pub privacy: GroupPrivacy,
    pub tags: Vec<String>,
    pub location: Option<GeoPoint>,
    pub capacity: Option<i64>,
    pub pinned_post: Option<String>,
    #[serde(skip_serializing)]
    pub creator_id: i64,
    #[serde(skip_serializing)]
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A group with its membership document populated.
#[derive(Debug, Clone, Serialize)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: Group,
    pub members: Vec<GroupMember>,
    pub join_requests: Vec<JoinRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub privacy: Option<GroupPrivacy>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub capacity: Option<i64>,
}

/// Explicit allow-list of mutable group fields. Name and creator are
/// immutable after creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dp: Option<String>,
    #[serde(default)]
    pub privacy: Option<GroupPrivacy>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub capacity: Option<i64>,
    #[serde(default)]
    pub pinned_post: Option<String>,
}

impl UpdateGroupRequest {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.dp.is_none()
            && self.privacy.is_none()
            && self.tags.is_none()
            && self.location.is_none()
            && self.capacity.is_none()
            && self.pinned_post.is_none()
    }
}
