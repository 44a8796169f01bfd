//! Folder management, tree walks and tree invariant checks.

pub mod invariant;
pub mod service;
pub mod tree;

pub use invariant::{TreeCheck, TreeInvariantChecker, is_cyclic_move};
pub use service::FolderService;
pub use tree::{TreeIssue, TreeIssueKind, TreeReport, TreeService};
