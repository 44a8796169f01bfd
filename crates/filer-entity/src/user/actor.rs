//! The authenticated identity a permission decision is made for.

use serde::{Deserialize, Serialize};

use filer_core::types::{GroupId, UserId};

use crate::permission::Principal;

/// The user performing an operation, with the flags and memberships that
/// permission resolution needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The authenticated user's ID.
    pub user_id: UserId,
    /// Superusers bypass every folder permission.
    #[serde(default)]
    pub is_superuser: bool,
    /// Staff users may use the admin surface at all.
    #[serde(default)]
    pub is_staff: bool,
    /// Groups the user belongs to.
    #[serde(default)]
    pub groups: Vec<GroupId>,
}

impl Actor {
    /// A regular staff user without group memberships.
    pub fn staff(user_id: UserId) -> Self {
        Self {
            user_id,
            is_superuser: false,
            is_staff: true,
            groups: Vec::new(),
        }
    }

    /// A superuser.
    pub fn superuser(user_id: UserId) -> Self {
        Self {
            user_id,
            is_superuser: true,
            is_staff: true,
            groups: Vec::new(),
        }
    }

    /// Add group memberships.
    pub fn with_groups(mut self, groups: impl IntoIterator<Item = GroupId>) -> Self {
        self.groups.extend(groups);
        self
    }

    /// The user principal followed by every group principal.
    pub fn principals(&self) -> Vec<Principal> {
        std::iter::once(Principal::User(self.user_id))
            .chain(self.groups.iter().copied().map(Principal::Group))
            .collect()
    }

    /// Whether a grant held by `principal` applies to this actor.
    pub fn holds(&self, principal: &Principal) -> bool {
        match principal {
            Principal::User(id) => *id == self.user_id,
            Principal::Group(id) => self.groups.contains(id),
        }
    }
}
