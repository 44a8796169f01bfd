//! Convenience result type alias for Filer.

use crate::error::AppError;

/// A specialized `Result` type for Filer operations.
pub type AppResult<T> = Result<T, AppError>;
