//! File domain entities.

pub mod image;
pub mod model;

pub use image::{ImageInfo, SubjectLocation};
pub use model::{File, insert_suffix};
