//! Folder permission and bulk operation settings.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Behaviour switches for the permission resolver and the bulk engine.
///
/// Passed explicitly into the resolver and services at construction time.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct FilerConfig {
    /// Whether folder permissions are enforced. When disabled every staff
    /// actor may do everything and non-staff actors nothing.
    #[serde(default = "default_enable_permissions")]
    pub enable_permissions: bool,

    /// Page size for directory listings.
    #[serde(default = "default_paginate_by")]
    #[validate(range(min = 1, max = 1000))]
    pub paginate_by: u64,

    /// Upper bound on ancestor-chain length. Longer chains are treated as
    /// corrupt and resolve to deny.
    #[serde(default = "default_max_tree_depth")]
    #[validate(range(min = 1, max = 4096))]
    pub max_tree_depth: usize,

    /// Suffix used by copy when the request does not name one.
    #[serde(default)]
    pub default_copy_suffix: String,
}

impl Default for FilerConfig {
    fn default() -> Self {
        Self {
            enable_permissions: default_enable_permissions(),
            paginate_by: default_paginate_by(),
            max_tree_depth: default_max_tree_depth(),
            default_copy_suffix: String::new(),
        }
    }
}

fn default_enable_permissions() -> bool {
    true
}

fn default_paginate_by() -> u64 {
    100
}

fn default_max_tree_depth() -> usize {
    256
}
