//! Node references and the closed Folder/File variant.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use filer_core::error::AppError;
use filer_core::types::{FileId, FolderId, UserId};

use crate::file::File;
use crate::folder::Folder;

/// Discriminant of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A folder.
    Folder,
    /// A file.
    File,
}

impl NodeKind {
    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::File => "file",
        }
    }
}

/// A typed reference to a folder or a file.
///
/// Textual form is `folder-<uuid>` or `file-<uuid>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum NodeRef {
    /// Reference to a folder.
    Folder(FolderId),
    /// Reference to a file.
    File(FileId),
}

impl NodeRef {
    /// The kind of node referenced.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Folder(_) => NodeKind::Folder,
            Self::File(_) => NodeKind::File,
        }
    }

    /// The folder ID, if this references a folder.
    pub fn as_folder(&self) -> Option<FolderId> {
        match self {
            Self::Folder(id) => Some(*id),
            Self::File(_) => None,
        }
    }

    /// The file ID, if this references a file.
    pub fn as_file(&self) -> Option<FileId> {
        match self {
            Self::File(id) => Some(*id),
            Self::Folder(_) => None,
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Folder(id) => write!(f, "folder-{id}"),
            Self::File(id) => write!(f, "file-{id}"),
        }
    }
}

impl FromStr for NodeRef {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::validation(format!("Invalid node reference: '{s}'"));
        let (kind, id) = s.split_once('-').ok_or_else(invalid)?;
        match kind {
            "folder" => id.parse().map(Self::Folder).map_err(|_| invalid()),
            "file" => id.parse().map(Self::File).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

impl From<FolderId> for NodeRef {
    fn from(id: FolderId) -> Self {
        Self::Folder(id)
    }
}

impl From<FileId> for NodeRef {
    fn from(id: FileId) -> Self {
        Self::File(id)
    }
}

/// A folder or a file, loaded from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    /// A folder node.
    Folder(Folder),
    /// A file node.
    File(File),
}

impl Node {
    /// Typed reference to this node.
    pub fn node_ref(&self) -> NodeRef {
        match self {
            Self::Folder(f) => NodeRef::Folder(f.id),
            Self::File(f) => NodeRef::File(f.id),
        }
    }

    /// The kind of this node.
    pub fn kind(&self) -> NodeKind {
        self.node_ref().kind()
    }

    /// Whether this node can hold children.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Folder(_))
    }

    /// Name used for display, sorting and sibling uniqueness.
    pub fn effective_name(&self) -> &str {
        match self {
            Self::Folder(f) => &f.name,
            Self::File(f) => f.effective_name(),
        }
    }

    /// The parent folder, `None` for root-level nodes.
    pub fn parent_id(&self) -> Option<FolderId> {
        match self {
            Self::Folder(f) => f.parent_id,
            Self::File(f) => f.folder_id,
        }
    }

    /// The folder whose permissions govern this node: the folder itself,
    /// or the folder containing a file. `None` for unfiled files.
    pub fn anchor_folder(&self) -> Option<FolderId> {
        match self {
            Self::Folder(f) => Some(f.id),
            Self::File(f) => f.folder_id,
        }
    }

    /// The owner, if any.
    pub fn owner_id(&self) -> Option<UserId> {
        match self {
            Self::Folder(f) => f.owner_id,
            Self::File(f) => f.owner_id,
        }
    }

    /// Last modification time.
    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            Self::Folder(f) => f.updated_at,
            Self::File(f) => f.updated_at,
        }
    }

    /// Size in bytes; folders report zero.
    pub fn size_bytes(&self) -> i64 {
        match self {
            Self::Folder(_) => 0,
            Self::File(f) => f.size_bytes,
        }
    }
}

impl From<Folder> for Node {
    fn from(folder: Folder) -> Self {
        Self::Folder(folder)
    }
}

impl From<File> for Node {
    fn from(file: File) -> Self {
        Self::File(file)
    }
}
