//! Prefetched permission state for a set of nodes.
//!
//! A snapshot holds the ancestor chains and the actor's grants for every
//! node it was built for, so any number of decisions can be taken without
//! touching the stores again.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use filer_core::types::FolderId;
use filer_entity::folder::Folder;
use filer_entity::node::Node;
use filer_entity::permission::{FolderPermission, GrantState, Right};
use filer_entity::user::Actor;

use super::inheritance::{ChainVerdict, walk_chain};

/// Where a permission decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionSource {
    /// Enforcement is switched off; staff status decided.
    Disabled,
    /// The actor is a superuser.
    Superuser,
    /// An explicit grant on the ancestor chain decided.
    Grant,
    /// The actor owns the node.
    Owner,
    /// Staff membership decided an action on the virtual root.
    Staff,
    /// Nothing granted access.
    Denied,
}

/// A single permission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether access is granted.
    pub allowed: bool,
    /// The rule that produced the decision.
    pub source: PermissionSource,
}

impl Decision {
    fn allow(source: PermissionSource) -> Self {
        Self { allowed: true, source }
    }

    fn deny(source: PermissionSource) -> Self {
        Self { allowed: false, source }
    }
}

/// All three rights of one actor on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveRights {
    /// Read decision.
    pub read: Decision,
    /// Edit decision.
    pub edit: Decision,
    /// Add-children decision.
    pub add_children: Decision,
}

impl EffectiveRights {
    /// The decision for one right.
    pub fn get(&self, right: Right) -> Decision {
        match right {
            Right::Read => self.read,
            Right::Edit => self.edit,
            Right::AddChildren => self.add_children,
        }
    }
}

/// Permission state for one actor over a prefetched node set.
#[derive(Debug, Clone)]
pub struct PermissionSnapshot {
    actor: Actor,
    enabled: bool,
    max_depth: usize,
    chains: HashMap<FolderId, Vec<Folder>>,
    grants: HashMap<FolderId, Vec<FolderPermission>>,
}

impl PermissionSnapshot {
    /// Assemble a snapshot from prefetched chains and grants.
    pub fn new(
        actor: Actor,
        enabled: bool,
        max_depth: usize,
        chains: HashMap<FolderId, Vec<Folder>>,
        grants: Vec<FolderPermission>,
    ) -> Self {
        let mut by_folder: HashMap<FolderId, Vec<FolderPermission>> = HashMap::new();
        for grant in grants {
            by_folder.entry(grant.folder_id).or_default().push(grant);
        }
        Self {
            actor,
            enabled,
            max_depth,
            chains,
            grants: by_folder,
        }
    }

    /// A snapshot without prefetched data. Enough when enforcement is
    /// disabled, for superusers, and for decisions on the virtual root.
    pub fn empty(actor: Actor, enabled: bool, max_depth: usize) -> Self {
        Self::new(actor, enabled, max_depth, HashMap::new(), Vec::new())
    }

    /// Whether `actor` may exercise `right` on `node`.
    pub fn resolve(&self, node: &Node, right: Right) -> bool {
        self.decide(node, right).allowed
    }

    /// Decide `right` on `node`, reporting which rule decided.
    pub fn decide(&self, node: &Node, right: Right) -> Decision {
        if let Some(decision) = self.bypass() {
            return decision;
        }

        if let Some(anchor) = node.anchor_folder() {
            let Some(chain) = self.chains.get(&anchor) else {
                debug!(node = %node.node_ref(), "Ancestor chain missing from snapshot");
                return Decision::deny(PermissionSource::Denied);
            };
            match walk_chain(chain, &self.grants, &self.actor, right, self.max_depth) {
                ChainVerdict::Explicit { state, .. } => {
                    return if state == GrantState::Allow {
                        Decision::allow(PermissionSource::Grant)
                    } else {
                        Decision::deny(PermissionSource::Grant)
                    };
                }
                ChainVerdict::Corrupt => {
                    debug!(node = %node.node_ref(), "Corrupt ancestor chain resolves to deny");
                    return Decision::deny(PermissionSource::Denied);
                }
                ChainVerdict::Unset => {}
            }
        }

        let owns = node.owner_id() == Some(self.actor.user_id);
        if owns && (right != Right::AddChildren || node.is_container()) {
            Decision::allow(PermissionSource::Owner)
        } else {
            Decision::deny(PermissionSource::Denied)
        }
    }

    /// Decide `right` on the virtual root. Only staff may act there.
    pub fn decide_root(&self, _right: Right) -> Decision {
        if let Some(decision) = self.bypass() {
            return decision;
        }
        if self.actor.is_staff {
            Decision::allow(PermissionSource::Staff)
        } else {
            Decision::deny(PermissionSource::Denied)
        }
    }

    /// Whether `right` is granted on a folder, or on the root for `None`.
    pub fn resolve_container(&self, folder: Option<&Folder>, right: Right) -> bool {
        match folder {
            Some(folder) => self.resolve(&Node::Folder(folder.clone()), right),
            None => self.decide_root(right).allowed,
        }
    }

    /// All rights on `node` at once.
    pub fn effective(&self, node: &Node) -> EffectiveRights {
        EffectiveRights {
            read: self.decide(node, Right::Read),
            edit: self.decide(node, Right::Edit),
            add_children: self.decide(node, Right::AddChildren),
        }
    }

    /// Whether the actor may delete `node` itself.
    pub fn can_delete(&self, node: &Node) -> bool {
        self.resolve(node, Right::Edit)
    }

    fn bypass(&self) -> Option<Decision> {
        if !self.enabled {
            let staff = self.actor.is_staff || self.actor.is_superuser;
            return Some(Decision {
                allowed: staff,
                source: PermissionSource::Disabled,
            });
        }
        if self.actor.is_superuser {
            return Some(Decision::allow(PermissionSource::Superuser));
        }
        None
    }
}
