//! # filer-core
//!
//! Core crate for Filer. Contains the unified error system, typed
//! identifiers, pagination and sorting types, and configuration schemas.
//!
//! This crate has **no** internal dependencies on other Filer crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
