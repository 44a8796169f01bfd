//! File entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use filer_core::types::{FileId, FolderId, UserId};

use super::image::ImageInfo;

/// A file stored in Filer.
///
/// Files without a folder ("unfiled") live at root level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    /// Unique file identifier.
    pub id: FileId,
    /// The folder containing this file, if any.
    pub folder_id: Option<FolderId>,
    /// Explicit display name. `None` or blank falls back to `original_filename`.
    pub name: Option<String>,
    /// Name of the file as uploaded.
    pub original_filename: String,
    /// MIME type of the file.
    pub mime_type: Option<String>,
    /// File size in bytes.
    pub size_bytes: i64,
    /// Opaque reference to the stored content.
    pub content_ref: String,
    /// Whether the file is publicly served.
    pub is_public: bool,
    /// The file owner, if any.
    pub owner_id: Option<UserId>,
    /// Image dimensions and focal point, for image-capable files.
    pub image: Option<ImageInfo>,
    /// When the file was created.
    pub created_at: DateTime<Utc>,
    /// When the file was last updated.
    pub updated_at: DateTime<Utc>,
}

impl File {
    /// Build a new, not yet stored, non-image file.
    pub fn new(
        original_filename: impl Into<String>,
        folder_id: Option<FolderId>,
        owner_id: Option<UserId>,
    ) -> Self {
        let original_filename = original_filename.into();
        let now = Utc::now();
        Self {
            id: FileId::new(),
            folder_id,
            name: None,
            content_ref: original_filename.clone(),
            original_filename,
            mime_type: None,
            size_bytes: 0,
            is_public: true,
            owner_id,
            image: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach image metadata, turning this into an image file.
    pub fn with_image(mut self, image: ImageInfo) -> Self {
        self.image = Some(image);
        if self.mime_type.is_none() {
            self.mime_type = Some("image/jpeg".to_string());
        }
        self
    }

    /// The name used for display, sorting and sibling uniqueness.
    pub fn effective_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.original_filename,
        }
    }
}

/// Insert `suffix` before the extension of `filename`.
///
/// `photo.jpg` + `test` gives `phototest.jpg`; names without an extension
/// (and dot-files such as `.env`) get the suffix appended.
pub fn insert_suffix(filename: &str, suffix: &str) -> String {
    match split_extension(filename) {
        (base, Some(ext)) => format!("{base}{suffix}.{ext}"),
        (base, None) => format!("{base}{suffix}"),
    }
}

fn split_extension(filename: &str) -> (&str, Option<&str>) {
    match filename.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() && !ext.is_empty() => (base, Some(ext)),
        _ => (filename, None),
    }
}
