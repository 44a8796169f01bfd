//! Folder permission domain entities.

pub mod grant;
pub mod model;
pub mod principal;

pub use grant::{GrantState, PermissionScope, Right};
pub use model::FolderPermission;
pub use principal::Principal;
