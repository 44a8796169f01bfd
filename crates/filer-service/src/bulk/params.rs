//! Bulk operation kinds and their parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use filer_core::error::AppError;
use filer_core::result::AppResult;
use filer_core::types::FolderId;

use super::resize::ResizeSpec;

/// The bulk actions offered on a selection of folders and files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperation {
    /// Relocate items under another folder.
    Move,
    /// Duplicate items under another folder.
    Copy,
    /// Give every item the same new name.
    Rename,
    /// Two-phase recursive delete.
    Delete,
    /// Mark files as publicly served.
    SetPublic,
    /// Mark files as private.
    SetPrivate,
    /// Resize image files.
    Resize,
}

impl BulkOperation {
    /// All operations.
    pub const ALL: [Self; 7] = [
        Self::Move,
        Self::Copy,
        Self::Rename,
        Self::Delete,
        Self::SetPublic,
        Self::SetPrivate,
        Self::Resize,
    ];

    /// Return the operation as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Copy => "copy",
            Self::Rename => "rename",
            Self::Delete => "delete",
            Self::SetPublic => "set_public",
            Self::SetPrivate => "set_private",
            Self::Resize => "resize",
        }
    }

    /// Whether a selected folder carries its whole subtree with it.
    pub fn is_recursive(&self) -> bool {
        matches!(self, Self::Move | Self::Copy | Self::Delete)
    }
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BulkOperation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == normalized)
            .ok_or_else(|| AppError::validation(format!("Unknown bulk operation: '{s}'")))
    }
}

/// Where moved or copied items go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Destination {
    /// The virtual root.
    Root,
    /// A stored folder.
    Folder(FolderId),
}

impl Destination {
    /// The destination folder ID, `None` for the root.
    pub fn folder_id(&self) -> Option<FolderId> {
        match self {
            Self::Root => None,
            Self::Folder(id) => Some(*id),
        }
    }
}

impl From<FolderId> for Destination {
    fn from(folder: FolderId) -> Self {
        Self::Folder(folder)
    }
}

impl From<Option<FolderId>> for Destination {
    fn from(folder: Option<FolderId>) -> Self {
        folder.map_or(Self::Root, Self::Folder)
    }
}

/// Phase of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePhase {
    /// Report what would be removed; change nothing.
    Preview,
    /// Remove.
    Confirmed,
}

/// Parameters of a bulk request. Which fields are required depends on the
/// operation; see [`BulkParams::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkParams {
    /// Target of move and copy.
    #[serde(default)]
    pub destination: Option<Destination>,
    /// Suffix inserted into copied file names.
    #[serde(default)]
    pub suffix: Option<String>,
    /// New name for rename.
    #[serde(default)]
    pub name: Option<String>,
    /// Delete phase.
    #[serde(default)]
    pub phase: Option<DeletePhase>,
    /// Target width for resize.
    #[serde(default)]
    pub width: Option<u32>,
    /// Target height for resize.
    #[serde(default)]
    pub height: Option<u32>,
    /// Crop to the exact target box.
    #[serde(default)]
    pub crop: bool,
    /// Allow upscaling.
    #[serde(default)]
    pub upscale: bool,
}

impl BulkParams {
    /// Parameters for move or copy to `destination`.
    pub fn to(destination: impl Into<Destination>) -> Self {
        Self {
            destination: Some(destination.into()),
            ..Self::default()
        }
    }

    /// Parameters for rename.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Parameters for delete.
    pub fn delete(phase: DeletePhase) -> Self {
        Self {
            phase: Some(phase),
            ..Self::default()
        }
    }

    /// Parameters for resize.
    pub fn resize(spec: ResizeSpec) -> Self {
        Self {
            width: Some(spec.width),
            height: Some(spec.height),
            crop: spec.crop,
            upscale: spec.upscale,
            ..Self::default()
        }
    }

    /// Set the copy suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Check that everything `operation` needs is present.
    ///
    /// A failure here aborts the whole request before any item is touched.
    pub fn validate(&self, operation: BulkOperation) -> AppResult<()> {
        match operation {
            BulkOperation::Move | BulkOperation::Copy => {
                if self.destination.is_none() {
                    return Err(AppError::validation(format!(
                        "A destination is required for {operation}"
                    )));
                }
            }
            BulkOperation::Rename => match self.name.as_deref() {
                Some(name) if !name.trim().is_empty() => {
                    if name.contains('/') {
                        return Err(AppError::validation("Names cannot contain '/'"));
                    }
                }
                _ => return Err(AppError::validation("A non-blank name is required for rename")),
            },
            BulkOperation::Delete => {
                if self.phase.is_none() {
                    return Err(AppError::validation(
                        "Delete requires an explicit preview or confirmed phase",
                    ));
                }
            }
            BulkOperation::Resize => {
                self.resize_spec()?;
            }
            BulkOperation::SetPublic | BulkOperation::SetPrivate => {}
        }
        Ok(())
    }

    /// The resize request, validated.
    pub fn resize_spec(&self) -> AppResult<ResizeSpec> {
        match (self.width, self.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Ok(ResizeSpec {
                width,
                height,
                crop: self.crop,
                upscale: self.upscale,
            }),
            _ => Err(AppError::validation(
                "Resize requires a positive width and height",
            )),
        }
    }
}
