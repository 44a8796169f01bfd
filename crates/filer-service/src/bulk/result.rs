//! Per-item outcomes of a bulk request.

use std::fmt;

use serde::{Deserialize, Serialize};

use filer_entity::node::NodeRef;

use super::params::BulkOperation;

/// What happened to one selected item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// The item was processed (or, in a preview, would be).
    Success,
    /// The actor lacks a required right on the item, its destination or
    /// something in its subtree.
    PermissionDenied,
    /// The target location already holds a node with the same name.
    NameConflict,
    /// A folder would have been moved into its own subtree.
    CyclicMove,
    /// The request is not allowed for this selection, or the item's
    /// subtree is deeper than the store will load.
    Forbidden,
    /// The operation does not apply to this kind of node.
    NotApplicable,
    /// The item does not exist (anymore).
    NotFound,
}

impl ItemStatus {
    /// Return the status as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PermissionDenied => "permission_denied",
            Self::NameConflict => "name_conflict",
            Self::CyclicMove => "cyclic_move",
            Self::Forbidden => "forbidden",
            Self::NotApplicable => "not_applicable",
            Self::NotFound => "not_found",
        }
    }

    /// Returns `true` for [`ItemStatus::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome for one selected item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// The selected node.
    pub node: NodeRef,
    /// What happened.
    pub status: ItemStatus,
    /// Human-readable explanation for non-success outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Nodes touched by this item. For a delete preview, everything that
    /// would be removed; for a copy, the newly created nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected: Vec<NodeRef>,
    /// The selected ancestor folder this item was processed with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub covered_by: Option<NodeRef>,
}

impl ItemOutcome {
    /// A successful outcome.
    pub fn success(node: NodeRef) -> Self {
        Self {
            node,
            status: ItemStatus::Success,
            detail: None,
            affected: Vec::new(),
            covered_by: None,
        }
    }

    /// A failed outcome with an explanation.
    pub fn failed(node: NodeRef, status: ItemStatus, detail: impl Into<String>) -> Self {
        Self {
            node,
            status,
            detail: Some(detail.into()),
            affected: Vec::new(),
            covered_by: None,
        }
    }

    /// Attach the touched nodes.
    pub fn with_affected(mut self, affected: Vec<NodeRef>) -> Self {
        self.affected = affected;
        self
    }

    /// Report `node` as processed together with this outcome's item.
    pub fn covering(&self, node: NodeRef) -> Self {
        Self {
            node,
            status: self.status,
            detail: self.detail.clone(),
            affected: Vec::new(),
            covered_by: Some(self.node),
        }
    }
}

/// The complete answer to a bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResult {
    /// The requested operation.
    pub operation: BulkOperation,
    /// Whether this was a delete preview that mutated nothing.
    pub preview: bool,
    /// One outcome per distinct selected item, in selection order.
    pub items: Vec<ItemOutcome>,
    /// Number of successful items.
    pub succeeded: usize,
    /// Number of failed items.
    pub failed: usize,
}

impl BulkResult {
    /// Build a result and compute the counters.
    pub fn new(operation: BulkOperation, preview: bool, items: Vec<ItemOutcome>) -> Self {
        let succeeded = items.iter().filter(|i| i.status.is_success()).count();
        let failed = items.len() - succeeded;
        Self {
            operation,
            preview,
            items,
            succeeded,
            failed,
        }
    }

    /// The outcome for `node`, if it was selected.
    pub fn outcome(&self, node: NodeRef) -> Option<&ItemOutcome> {
        self.items.iter().find(|i| i.node == node)
    }

    /// The status for `node`, if it was selected.
    pub fn status_of(&self, node: NodeRef) -> Option<ItemStatus> {
        self.outcome(node).map(|i| i.status)
    }

    /// Returns `true` when every item succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
