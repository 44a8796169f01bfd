//! # filer-service
//!
//! Business logic service layer for Filer: the tree invariant checker,
//! the bulk operation engine and the folder service.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod bulk;
pub mod context;
pub mod folder;

pub use bulk::{BulkEngine, BulkOperation, BulkParams, BulkResult, ItemStatus};
pub use context::RequestContext;
pub use folder::{FolderService, TreeCheck, TreeInvariantChecker, TreeService};
