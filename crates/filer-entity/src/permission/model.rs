//! Folder permission grant model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use filer_core::types::{FolderId, FolderPermissionId};

use super::grant::{GrantState, PermissionScope, Right};
use super::principal::Principal;

/// A grant of rights on a folder to a principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderPermission {
    /// Unique grant identifier.
    pub id: FolderPermissionId,
    /// Folder the grant is attached to.
    pub folder_id: FolderId,
    /// The user or group receiving the grant.
    pub principal: Principal,
    /// Which nodes the grant covers.
    pub scope: PermissionScope,
    /// Decision for [`Right::Read`]; `None` inherits.
    pub can_read: Option<GrantState>,
    /// Decision for [`Right::Edit`]; `None` inherits.
    pub can_edit: Option<GrantState>,
    /// Decision for [`Right::AddChildren`]; `None` inherits.
    pub can_add_children: Option<GrantState>,
    /// When the grant was created.
    pub created_at: DateTime<Utc>,
}

impl FolderPermission {
    /// A grant with every right left to inheritance.
    pub fn new(folder_id: FolderId, principal: Principal, scope: PermissionScope) -> Self {
        Self {
            id: FolderPermissionId::new(),
            folder_id,
            principal,
            scope,
            can_read: None,
            can_edit: None,
            can_add_children: None,
            created_at: Utc::now(),
        }
    }

    /// Set the decision for `right`.
    pub fn with(mut self, right: Right, state: GrantState) -> Self {
        *self.slot(right) = Some(state);
        self
    }

    /// Allow `right`.
    pub fn allow(self, right: Right) -> Self {
        self.with(right, GrantState::Allow)
    }

    /// Deny `right`.
    pub fn deny(self, right: Right) -> Self {
        self.with(right, GrantState::Deny)
    }

    /// Allow every right.
    pub fn allow_all(self) -> Self {
        Right::ALL.into_iter().fold(self, |grant, right| grant.allow(right))
    }

    /// The stored decision for `right`.
    pub fn state(&self, right: Right) -> Option<GrantState> {
        match right {
            Right::Read => self.can_read,
            Right::Edit => self.can_edit,
            Right::AddChildren => self.can_add_children,
        }
    }

    fn slot(&mut self, right: Right) -> &mut Option<GrantState> {
        match right {
            Right::Read => &mut self.can_read,
            Right::Edit => &mut self.can_edit,
            Right::AddChildren => &mut self.can_add_children,
        }
    }
}
