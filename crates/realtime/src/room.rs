use std::fmt;

/// A named broadcast channel scoped to one conversation or one group.
///
/// Room membership is client-driven: knowing the name is enough to
/// subscribe. Authorization happens where messages are written, not at the
/// transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    Private { conversation_id: String },
    Group { group_id: String },
}

impl Room {
    pub fn private(conversation_id: impl Into<String>) -> Self {
        Self::Private {
            conversation_id: conversation_id.into(),
        }
    }

    pub fn group(group_id: impl Into<String>) -> Self {
        Self::Group {
            group_id: group_id.into(),
        }
    }

    /// Wire name of the room, e.g. `private_<conversationId>`.
    pub fn name(&self) -> String {
        match self {
            Self::Private { conversation_id } => format!("private_{conversation_id}"),
            Self::Group { group_id } => format!("group_{group_id}"),
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_names_follow_the_wire_convention() {
        assert_eq!(Room::private("c1").name(), "private_c1");
        assert_eq!(Room::group("g1").name(), "group_g1");
        assert_ne!(Room::private("x").name(), Room::group("x").name());
    }
}
