//! Bulk operations over mixed selections of folders and files.

pub mod engine;
pub mod params;
pub mod resize;
pub mod result;

pub use engine::BulkEngine;
pub use params::{BulkOperation, BulkParams, DeletePhase, Destination};
pub use resize::{ResizeSpec, resize};
pub use result::{BulkResult, ItemOutcome, ItemStatus};
