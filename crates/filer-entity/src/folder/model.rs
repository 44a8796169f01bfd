//! Folder entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use filer_core::types::{FolderId, UserId};

/// A folder in the file hierarchy.
///
/// Folders whose `parent_id` is `None` are children of the virtual root,
/// which itself is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Folder {
    /// Unique folder identifier.
    pub id: FolderId,
    /// Parent folder ID (null for root-level folders).
    pub parent_id: Option<FolderId>,
    /// Folder name.
    pub name: String,
    /// The folder owner, if any.
    pub owner_id: Option<UserId>,
    /// When the folder was created.
    pub created_at: DateTime<Utc>,
    /// When the folder was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Folder {
    /// Build a new, not yet stored folder.
    pub fn new(
        name: impl Into<String>,
        parent_id: Option<FolderId>,
        owner_id: Option<UserId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: FolderId::new(),
            parent_id,
            name: name.into(),
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }
}
