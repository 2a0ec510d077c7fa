//! # CircleUp Groups Crate
//!
//! Core business logic for interest groups: lifecycle, membership and the
//! role hierarchy, join requests, invite codes, the per-group audit log,
//! and read-only discovery (recommendations and search).
//!
//! All mutating operations on one group are linearized through an
//! optimistic version check on the group row; concurrent mutations retry
//! against the latest state instead of overwriting each other.

pub mod entities;
pub mod policy;
pub mod services;
pub mod types;

pub use entities::{
    AuditEntry, CreateGroupRequest, GeoPoint, Group, GroupDetail, GroupMember, GroupPrivacy,
    GroupRole, InviteCode, JoinRequest, MemberUser, UpdateGroupRequest,
};
pub use policy::GroupAction;
pub use types::{GroupError, GroupResult};
