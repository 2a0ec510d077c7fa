//! Role-based authorization rules.
//!
//! Two rules cover every gated operation: admin-rank gating for group
//! administration, and the strict-outrank rule for acting on another
//! member. Unknown role strings rank as 0 and are denied, never rejected
//! with an error of their own.

use std::fmt;

use crate::entities::GroupRole;
use crate::types::{GroupError, GroupResult};

/// Minimum rank for group administration (admin or owner).
pub const ADMIN_RANK: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    ApproveJoin,
    GenerateInvite,
    UpdateGroup,
    DeleteGroup,
    ViewAuditLog,
    KickMember,
    PromoteMember,
}

impl GroupAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupAction::ApproveJoin => "approve_join",
            GroupAction::GenerateInvite => "generate_invite",
            GroupAction::UpdateGroup => "update_group",
            GroupAction::DeleteGroup => "delete_group",
            GroupAction::ViewAuditLog => "view_audit_log",
            GroupAction::KickMember => "kick_member",
            GroupAction::PromoteMember => "promote_member",
        }
    }
}

impl fmt::Display for GroupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rank of a stored role string; unknown roles carry no privilege.
pub fn rank_of(role: &str) -> u8 {
    GroupRole::parse(role).map(|r| r.rank()).unwrap_or(0)
}

/// Admin-gated actions require rank >= admin.
pub fn require_admin(actor_role: &str, action: GroupAction) -> GroupResult<()> {
    if rank_of(actor_role) >= ADMIN_RANK {
        Ok(())
    } else {
        Err(GroupError::AdminRequired { action })
    }
}

/// Acting on another member requires strictly outranking them: peers cannot
/// kick or promote peers, and nobody can act on an equal-or-higher role.
pub fn require_outranks(actor_role: &str, target_role: &str, action: GroupAction) -> GroupResult<()> {
    if rank_of(actor_role) > rank_of(target_role) {
        Ok(())
    } else {
        Err(GroupError::OutrankRequired {
            action,
            target_role: target_role.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_of_known_and_unknown_roles() {
        assert_eq!(rank_of("owner"), 4);
        assert_eq!(rank_of("admin"), 3);
        assert_eq!(rank_of("moderator"), 2);
        assert_eq!(rank_of("member"), 1);
        assert_eq!(rank_of("janitor"), 0);
        assert_eq!(rank_of(""), 0);
    }

    #[test]
    fn admin_gate_over_every_role() {
        for role in GroupRole::all() {
            let allowed = require_admin(role.as_str(), GroupAction::UpdateGroup).is_ok();
            assert_eq!(allowed, role.rank() >= ADMIN_RANK, "role {role}");
        }
        assert!(require_admin("janitor", GroupAction::DeleteGroup).is_err());
    }

    #[test]
    fn strict_outrank_over_every_role_pair() {
        for actor in GroupRole::all() {
            for target in GroupRole::all() {
                let allowed =
                    require_outranks(actor.as_str(), target.as_str(), GroupAction::KickMember)
                        .is_ok();
                assert_eq!(
                    allowed,
                    actor.rank() > target.rank(),
                    "actor {actor} target {target}"
                );
            }
        }
    }

    #[test]
    fn equal_ranks_always_deny() {
        for role in GroupRole::all() {
            assert!(require_outranks(role.as_str(), role.as_str(), GroupAction::PromoteMember)
                .is_err());
        }
    }

    #[test]
    fn unknown_actor_is_denied_without_panicking() {
        assert!(require_outranks("mystery", "member", GroupAction::KickMember).is_err());
        // An unknown target can still be acted on by any ranked role.
        assert!(require_outranks("member", "mystery", GroupAction::KickMember).is_ok());
    }

    #[test]
    fn denials_name_the_action() {
        let err = require_admin("member", GroupAction::GenerateInvite).unwrap_err();
        assert!(err.to_string().contains("generate_invite"));

        let err =
            require_outranks("admin", "owner", GroupAction::KickMember).unwrap_err();
        assert!(err.to_string().contains("kick_member"));
        assert!(err.to_string().contains("owner"));
    }
}
