//! Sorting types for directory listings.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

/// Keys a directory listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Effective name, case-insensitive.
    Name,
    /// Owner identifier.
    Owner,
    /// Last modification time.
    Modified,
    /// File size (folders sort as zero).
    Size,
}

impl SortKey {
    /// Return the key as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Owner => "owner",
            Self::Modified => "modified",
            Self::Size => "size",
        }
    }
}

/// A sort specification consisting of a key and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    /// Key to sort by.
    pub key: SortKey,
    /// Sort direction.
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortField {
    /// Create a new sort field.
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Create an ascending sort on the given key.
    pub fn asc(key: SortKey) -> Self {
        Self::new(key, SortDirection::Asc)
    }

    /// Create a descending sort on the given key.
    pub fn desc(key: SortKey) -> Self {
        Self::new(key, SortDirection::Desc)
    }
}

impl Default for SortField {
    fn default() -> Self {
        Self::asc(SortKey::Name)
    }
}

/// Parses `order_by` style specs: `name`, `-modified`, `size`.
impl FromStr for SortField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (direction, key) = match s.strip_prefix('-') {
            Some(rest) => (SortDirection::Desc, rest),
            None => (SortDirection::Asc, s),
        };
        let key = match key.trim().to_lowercase().as_str() {
            "name" => SortKey::Name,
            "owner" => SortKey::Owner,
            "modified" => SortKey::Modified,
            "size" => SortKey::Size,
            _ => {
                return Err(AppError::validation(format!(
                    "Invalid sort key: '{s}'. Expected one of: name, owner, modified, size"
                )));
            }
        };
        Ok(Self::new(key, direction))
    }
}
