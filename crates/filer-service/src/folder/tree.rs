//! Tree walks: breadcrumbs and structural audits.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use filer_core::config::FilerConfig;
use filer_core::error::AppError;
use filer_core::result::AppResult;
use filer_core::types::FolderId;
use filer_database::store::TreeStore;
use filer_entity::folder::Folder;
use filer_entity::node::{Node, NodeRef};

/// Kind of structural problem found by an audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeIssueKind {
    /// Two siblings share an effective name.
    DuplicateName,
    /// A folder sits deeper than the configured limit.
    TooDeep,
    /// A folder was reached twice.
    Cycle,
}

/// One problem found by an audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeIssue {
    /// What is wrong.
    pub kind: TreeIssueKind,
    /// The offending node.
    pub node: NodeRef,
    /// Human-readable description.
    pub detail: String,
}

/// Result of [`TreeService::audit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeReport {
    /// Folders visited.
    pub folders: usize,
    /// Files visited.
    pub files: usize,
    /// Problems found.
    pub issues: Vec<TreeIssue>,
}

impl TreeReport {
    /// Returns `true` when no problem was found.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Walks folder trees.
#[derive(Clone)]
pub struct TreeService {
    tree: Arc<dyn TreeStore>,
    max_depth: usize,
}

impl std::fmt::Debug for TreeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeService")
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl TreeService {
    /// Creates a new tree service.
    pub fn new(config: &FilerConfig, tree: Arc<dyn TreeStore>) -> Self {
        Self {
            tree,
            max_depth: config.max_tree_depth,
        }
    }

    /// The path from the top-level folder down to `folder_id`, inclusive.
    pub async fn breadcrumbs(&self, folder_id: FolderId) -> AppResult<Vec<Folder>> {
        let mut chains = self.tree.ancestors_of(&[folder_id]).await?;
        let mut chain = chains
            .remove(&folder_id)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::not_found(format!("Folder {folder_id} not found")))?;
        chain.reverse();
        Ok(chain)
    }

    /// Walk everything below `root` (the whole tree for `None`) and report
    /// duplicate sibling names, over-deep folders and cycles.
    pub async fn audit(&self, root: Option<FolderId>) -> AppResult<TreeReport> {
        let mut report = TreeReport::default();
        let mut visited: HashSet<FolderId> = HashSet::new();
        let start = match root {
            Some(id) => {
                visited.insert(id);
                self.breadcrumbs(id).await?.len()
            }
            None => 0,
        };
        let mut pending: Vec<(Option<FolderId>, usize)> = vec![(root, start)];

        while let Some((parent, depth)) = pending.pop() {
            let children = self.tree.children(parent).await?;
            duplicate_names(&children, &mut report.issues);

            for child in children {
                match child {
                    Node::File(_) => report.files += 1,
                    Node::Folder(folder) => {
                        report.folders += 1;
                        let node = NodeRef::Folder(folder.id);
                        if !visited.insert(folder.id) {
                            report.issues.push(TreeIssue {
                                kind: TreeIssueKind::Cycle,
                                node,
                                detail: format!("Folder '{}' reached twice", folder.name),
                            });
                            continue;
                        }
                        if depth + 1 > self.max_depth {
                            report.issues.push(TreeIssue {
                                kind: TreeIssueKind::TooDeep,
                                node,
                                detail: format!(
                                    "Folder '{}' is deeper than {} levels",
                                    folder.name, self.max_depth
                                ),
                            });
                            continue;
                        }
                        pending.push((Some(folder.id), depth + 1));
                    }
                }
            }
        }

        if report.is_clean() {
            debug!(folders = report.folders, files = report.files, "Tree audit clean");
        } else {
            warn!(
                folders = report.folders,
                files = report.files,
                issues = report.issues.len(),
                "Tree audit found problems"
            );
        }

        Ok(report)
    }
}

fn duplicate_names(children: &[Node], issues: &mut Vec<TreeIssue>) {
    let mut first: HashMap<&str, NodeRef> = HashMap::new();
    for child in children {
        if let Some(existing) = first.get(child.effective_name()) {
            issues.push(TreeIssue {
                kind: TreeIssueKind::DuplicateName,
                node: child.node_ref(),
                detail: format!("'{}' is also used by {existing}", child.effective_name()),
            });
        } else {
            first.insert(child.effective_name(), child.node_ref());
        }
    }
}
