//! Store traits consumed by the permission resolver and the services.
//!
//! The core never talks to a concrete backend. It receives an
//! `Arc<dyn TreeStore>` and an `Arc<dyn GrantStore>` at construction time;
//! [`crate::repositories`] implements them over PostgreSQL and
//! [`crate::memory`] keeps everything in process.

use std::collections::HashMap;

use async_trait::async_trait;

use filer_core::error::AppError;
use filer_core::result::AppResult;
use filer_core::types::{FileId, FolderId, FolderPermissionId};
use filer_entity::file::File;
use filer_entity::folder::{Folder, Subtree};
use filer_entity::node::{Node, NodeRef};
use filer_entity::permission::{FolderPermission, Principal};

/// Read and write access to the folder/file hierarchy.
#[async_trait]
pub trait TreeStore: Send + Sync + 'static {
    /// Load a single folder.
    async fn folder(&self, id: FolderId) -> AppResult<Option<Folder>>;

    /// Load a single file.
    async fn file(&self, id: FileId) -> AppResult<Option<File>>;

    /// Load many folders in one round-trip. Unknown ids are skipped.
    async fn folders(&self, ids: &[FolderId]) -> AppResult<Vec<Folder>>;

    /// Load many files in one round-trip. Unknown ids are skipped.
    async fn files(&self, ids: &[FileId]) -> AppResult<Vec<File>>;

    /// Ancestor chains for many folders in one round-trip.
    ///
    /// Each chain starts with the folder itself and ends at a root-level
    /// folder. Unknown ids are absent from the map. A chain whose last
    /// element repeats an earlier one signals a cycle in the stored data.
    async fn ancestors_of(&self, ids: &[FolderId]) -> AppResult<HashMap<FolderId, Vec<Folder>>>;

    /// Direct children of a folder (`None` = virtual root), ordered by
    /// effective name.
    async fn children(&self, parent: Option<FolderId>) -> AppResult<Vec<Node>>;

    /// A folder together with all of its descendants.
    ///
    /// Fails with a `Validation` error when the subtree reaches deeper than
    /// the store's depth limit; a partial subtree is never returned.
    async fn descendants(&self, id: FolderId) -> AppResult<Option<Subtree>>;

    /// The node under `parent` whose effective name equals `name`, ignoring
    /// `exclude`.
    async fn sibling_named(
        &self,
        parent: Option<FolderId>,
        name: &str,
        exclude: Option<NodeRef>,
    ) -> AppResult<Option<NodeRef>>;

    /// Apply a change set atomically.
    ///
    /// Either every change becomes visible or none does. Sibling name
    /// clashes fail with a `Conflict` error, vanished nodes with
    /// `NotFound`.
    async fn apply(&self, changes: ChangeSet) -> AppResult<()>;

    /// Load a single node of either kind.
    async fn node(&self, node: NodeRef) -> AppResult<Option<Node>> {
        Ok(match node {
            NodeRef::Folder(id) => self.folder(id).await?.map(Node::Folder),
            NodeRef::File(id) => self.file(id).await?.map(Node::File),
        })
    }

    /// Load a mixed selection of nodes, at most one round-trip per kind.
    ///
    /// The result is keyed by reference; missing nodes are absent.
    async fn nodes(&self, refs: &[NodeRef]) -> AppResult<HashMap<NodeRef, Node>> {
        let folder_ids: Vec<FolderId> = refs.iter().filter_map(NodeRef::as_folder).collect();
        let file_ids: Vec<FileId> = refs.iter().filter_map(NodeRef::as_file).collect();

        let mut out = HashMap::with_capacity(refs.len());
        if !folder_ids.is_empty() {
            for folder in self.folders(&folder_ids).await? {
                out.insert(NodeRef::Folder(folder.id), Node::Folder(folder));
            }
        }
        if !file_ids.is_empty() {
            for file in self.files(&file_ids).await? {
                out.insert(NodeRef::File(file.id), Node::File(file));
            }
        }
        Ok(out)
    }
}

/// Access to folder permission grants.
#[async_trait]
pub trait GrantStore: Send + Sync + 'static {
    /// Grants on any of `folder_ids` held by any of `principals`, in one
    /// round-trip.
    async fn grants_for(
        &self,
        folder_ids: &[FolderId],
        principals: &[Principal],
    ) -> AppResult<Vec<FolderPermission>>;

    /// Every grant attached to a folder.
    async fn for_folder(&self, folder_id: FolderId) -> AppResult<Vec<FolderPermission>>;

    /// Store a new grant. The folder must exist.
    async fn create(&self, grant: FolderPermission) -> AppResult<FolderPermission>;

    /// Remove a grant. Returns `false` when it did not exist.
    async fn delete(&self, id: FolderPermissionId) -> AppResult<bool>;
}

/// A single mutation inside a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Store a new folder.
    InsertFolder(Folder),
    /// Overwrite an existing folder (rename, move, owner change).
    UpdateFolder(Folder),
    /// Remove a folder and everything below it.
    DeleteFolder(FolderId),
    /// Store a new file.
    InsertFile(File),
    /// Overwrite an existing file.
    UpdateFile(File),
    /// Remove a file.
    DeleteFile(FileId),
}

impl Change {
    /// The node this change targets.
    pub fn target(&self) -> NodeRef {
        match self {
            Self::InsertFolder(f) | Self::UpdateFolder(f) => NodeRef::Folder(f.id),
            Self::DeleteFolder(id) => NodeRef::Folder(*id),
            Self::InsertFile(f) | Self::UpdateFile(f) => NodeRef::File(f.id),
            Self::DeleteFile(id) => NodeRef::File(*id),
        }
    }

    /// The parent whose children must be re-checked for name clashes, if
    /// the change can introduce one.
    pub fn placed_under(&self) -> Option<Option<FolderId>> {
        match self {
            Self::InsertFolder(f) | Self::UpdateFolder(f) => Some(f.parent_id),
            Self::InsertFile(f) | Self::UpdateFile(f) => Some(f.folder_id),
            Self::DeleteFolder(_) | Self::DeleteFile(_) => None,
        }
    }
}

/// An ordered list of changes applied as one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Create an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change.
    pub fn push(&mut self, change: Change) -> &mut Self {
        self.changes.push(change);
        self
    }

    /// Append a folder insert.
    pub fn insert_folder(mut self, folder: Folder) -> Self {
        self.changes.push(Change::InsertFolder(folder));
        self
    }

    /// Append a folder update.
    pub fn update_folder(mut self, folder: Folder) -> Self {
        self.changes.push(Change::UpdateFolder(folder));
        self
    }

    /// Append a recursive folder delete.
    pub fn delete_folder(mut self, id: FolderId) -> Self {
        self.changes.push(Change::DeleteFolder(id));
        self
    }

    /// Append a file insert.
    pub fn insert_file(mut self, file: File) -> Self {
        self.changes.push(Change::InsertFile(file));
        self
    }

    /// Append a file update.
    pub fn update_file(mut self, file: File) -> Self {
        self.changes.push(Change::UpdateFile(file));
        self
    }

    /// Append a file delete.
    pub fn delete_file(mut self, id: FileId) -> Self {
        self.changes.push(Change::DeleteFile(id));
        self
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Iterate over the changes in order.
    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    /// Distinct parents that received a new or updated child.
    pub fn touched_parents(&self) -> Vec<Option<FolderId>> {
        let mut parents: Vec<Option<FolderId>> = Vec::new();
        for parent in self.changes.iter().filter_map(Change::placed_under) {
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
        parents
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

/// The error [`TreeStore::descendants`] returns for a subtree deeper than
/// the store allows.
pub fn subtree_too_deep(folder: FolderId, max_depth: impl std::fmt::Display) -> AppError {
    AppError::validation(format!(
        "Folder {folder} has descendants more than {max_depth} levels down"
    ))
}

/// Order nodes by effective name, case-insensitively with exact-case ties.
pub fn sort_by_name(nodes: &mut [Node]) {
    nodes.sort_by(|a, b| {
        a.effective_name()
            .to_lowercase()
            .cmp(&b.effective_name().to_lowercase())
            .then_with(|| a.effective_name().cmp(b.effective_name()))
    });
}
