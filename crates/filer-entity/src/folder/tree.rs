//! A folder together with everything below it.

use serde::{Deserialize, Serialize};

use filer_core::types::FolderId;

use crate::file::File;
use crate::node::NodeRef;

use super::model::Folder;

/// A folder and its complete subtree, as loaded in one store round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtree {
    /// The folder the subtree hangs from.
    pub root: Folder,
    /// Descendant folders (excluding `root`), parents before children.
    pub folders: Vec<Folder>,
    /// Files in `root` and in every descendant folder.
    pub files: Vec<File>,
}

impl Subtree {
    /// IDs of `root` and all descendant folders.
    pub fn folder_ids(&self) -> Vec<FolderId> {
        std::iter::once(self.root.id)
            .chain(self.folders.iter().map(|f| f.id))
            .collect()
    }

    /// Every node in the subtree, root first.
    pub fn node_refs(&self) -> Vec<NodeRef> {
        self.folder_ids()
            .into_iter()
            .map(NodeRef::Folder)
            .chain(self.files.iter().map(|f| NodeRef::File(f.id)))
            .collect()
    }

    /// Total number of nodes including the root.
    pub fn node_count(&self) -> usize {
        1 + self.folders.len() + self.files.len()
    }
}
