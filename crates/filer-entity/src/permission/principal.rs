//! Permission holders.

use serde::{Deserialize, Serialize};

use filer_core::types::{GroupId, UserId};

/// A user or a group that can hold folder grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Principal {
    /// A single user.
    User(UserId),
    /// A group of users.
    Group(GroupId),
}

impl Principal {
    /// The user ID, when the principal is a user.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Group(_) => None,
        }
    }

    /// The group ID, when the principal is a group.
    pub fn group_id(&self) -> Option<GroupId> {
        match self {
            Self::Group(id) => Some(*id),
            Self::User(_) => None,
        }
    }
}
