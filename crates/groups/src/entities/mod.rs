mod audit;
mod group;
mod invite;
mod member;

pub use audit::AuditEntry;
pub use group::{
    CreateGroupRequest, GeoPoint, Group, GroupDetail, GroupPrivacy, UpdateGroupRequest,
};
pub use invite::{InviteCode, INVITE_TTL_DAYS};
pub use member::{GroupMember, GroupRole, JoinRequest, MemberUser};
