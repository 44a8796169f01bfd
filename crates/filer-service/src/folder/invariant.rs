//! Tree invariant preconditions for create, rename and move.
//!
//! Two invariants hold for every stored tree:
//! - no two siblings (including children of the virtual root) share an
//!   effective name;
//! - a folder never sits inside its own subtree.
//!
//! The checks here run before a mutation is attempted. The store enforces
//! the same rules again when the change set commits.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use filer_core::result::AppResult;
use filer_core::types::FolderId;
use filer_database::store::TreeStore;
use filer_entity::folder::Folder;
use filer_entity::node::{Node, NodeRef};

/// Result of an invariant check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TreeCheck {
    /// The mutation keeps the tree valid.
    Ok,
    /// Another node already uses the name at the target location.
    NameConflict {
        /// The sibling holding the name.
        existing: NodeRef,
    },
    /// The destination is the moved folder or lies below it.
    CyclicMove,
}

impl TreeCheck {
    /// Returns `true` when the check passed.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Whether moving `node` under a folder with ancestor chain
/// `destination_chain` (destination first) would create a cycle.
pub fn is_cyclic_move(node: NodeRef, destination_chain: &[Folder]) -> bool {
    match node {
        NodeRef::Folder(id) => destination_chain.iter().any(|f| f.id == id),
        NodeRef::File(_) => false,
    }
}

/// Checks tree invariants against the store.
#[derive(Clone)]
pub struct TreeInvariantChecker {
    tree: Arc<dyn TreeStore>,
}

impl std::fmt::Debug for TreeInvariantChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeInvariantChecker").finish()
    }
}

impl TreeInvariantChecker {
    /// Creates a new checker.
    pub fn new(tree: Arc<dyn TreeStore>) -> Self {
        Self { tree }
    }

    /// Can `node` be renamed to `proposed_name` in its current parent?
    ///
    /// Matching is exact and case-sensitive; the node itself never counts
    /// as a clash.
    pub async fn check_rename(&self, node: &Node, proposed_name: &str) -> AppResult<TreeCheck> {
        self.name_check(node.parent_id(), proposed_name, Some(node.node_ref()))
            .await
    }

    /// Can `node` be moved under `destination` (`None` = virtual root)?
    pub async fn check_move(
        &self,
        node: &Node,
        destination: Option<FolderId>,
    ) -> AppResult<TreeCheck> {
        if let (Some(dest), NodeRef::Folder(_)) = (destination, node.node_ref()) {
            let chains = self.tree.ancestors_of(&[dest]).await?;
            let chain = chains.get(&dest).map(Vec::as_slice).unwrap_or_default();
            if is_cyclic_move(node.node_ref(), chain) {
                return Ok(TreeCheck::CyclicMove);
            }
        }
        self.check_move_name(node, destination).await
    }

    /// The name half of [`Self::check_move`], for callers that have already
    /// ruled out a cycle.
    pub async fn check_move_name(
        &self,
        node: &Node,
        destination: Option<FolderId>,
    ) -> AppResult<TreeCheck> {
        self.name_check(destination, node.effective_name(), Some(node.node_ref()))
            .await
    }

    /// Can a new node called `name` be placed under `parent`?
    pub async fn check_create(&self, parent: Option<FolderId>, name: &str) -> AppResult<TreeCheck> {
        self.name_check(parent, name, None).await
    }

    async fn name_check(
        &self,
        parent: Option<FolderId>,
        name: &str,
        exclude: Option<NodeRef>,
    ) -> AppResult<TreeCheck> {
        Ok(match self.tree.sibling_named(parent, name, exclude).await? {
            Some(existing) => TreeCheck::NameConflict { existing },
            None => TreeCheck::Ok,
        })
    }
}
