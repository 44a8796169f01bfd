//! Rights, grant states and grant scopes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A right that can be resolved on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Right {
    /// See the node and its content.
    Read,
    /// Change, move or delete the node.
    Edit,
    /// Create nodes inside a folder.
    AddChildren,
}

impl Right {
    /// Every right, in resolution order.
    pub const ALL: [Right; 3] = [Right::Read, Right::Edit, Right::AddChildren];

    /// Return the right as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Edit => "edit",
            Self::AddChildren => "add_children",
        }
    }
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An explicit decision stored on a grant. Absence means "inherit".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantState {
    /// Explicitly allowed.
    Allow,
    /// Explicitly denied.
    Deny,
}

impl GrantState {
    /// Map the stored nullable boolean form.
    pub fn from_flag(flag: Option<bool>) -> Option<Self> {
        flag.map(|allowed| if allowed { Self::Allow } else { Self::Deny })
    }

    /// Stored nullable boolean form.
    pub fn to_flag(state: Option<Self>) -> Option<bool> {
        state.map(|s| s == Self::Allow)
    }

    /// Combine two decisions found at the same level: deny wins.
    pub fn merge(self, other: Self) -> Self {
        if self == Self::Deny || other == Self::Deny {
            Self::Deny
        } else {
            Self::Allow
        }
    }
}

/// Which nodes a grant attached to a folder covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionScope {
    /// Only the folder itself (and the files directly inside it).
    This,
    /// The folder and all of its descendants until overridden.
    Children,
}

impl PermissionScope {
    /// Return the scope as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::This => "this",
            Self::Children => "children",
        }
    }

    /// Whether a grant of this scope applies at a level of the ancestor
    /// walk. `at_anchor` is true for the node's own governing folder.
    pub fn applies(&self, at_anchor: bool) -> bool {
        match self {
            Self::This => at_anchor,
            Self::Children => true,
        }
    }
}

impl fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PermissionScope {
    type Err = filer_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "this" => Ok(Self::This),
            "children" => Ok(Self::Children),
            _ => Err(filer_core::AppError::validation(format!(
                "Invalid permission scope: '{s}'. Expected one of: this, children"
            ))),
        }
    }
}
