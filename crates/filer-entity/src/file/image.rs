//! Image metadata carried by image-capable files.

use std::fmt;

use serde::{Deserialize, Serialize};

use filer_core::error::AppError;

/// Pixel dimensions and focal point of an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Focal point used to bias crops.
    pub subject_location: Option<SubjectLocation>,
}

impl ImageInfo {
    /// Image without a focal point.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            subject_location: None,
        }
    }

    /// Set the focal point.
    pub fn with_subject_location(mut self, location: SubjectLocation) -> Self {
        self.subject_location = Some(location);
        self
    }
}

/// A focal point on an image, written as `"x,y"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectLocation {
    /// Horizontal coordinate in pixels.
    pub x: u32,
    /// Vertical coordinate in pixels.
    pub y: u32,
}

impl SubjectLocation {
    /// Create a focal point.
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Parse the textual form against the bounds of `image`.
    ///
    /// Blank input means "no focal point". Coordinates may be fractional
    /// and are truncated; negative or out-of-bounds points are rejected.
    pub fn parse(text: &str, image: &ImageInfo) -> Result<Option<Self>, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let (x, y) = text.split_once(',').ok_or_else(|| {
            AppError::validation(format!("Invalid subject location '{text}': expected 'x,y'"))
        })?;
        let x = parse_coordinate(x, text)?;
        let y = parse_coordinate(y, text)?;

        if x < 0.0 || y < 0.0 || x > f64::from(image.width) || y > f64::from(image.height) {
            return Err(AppError::validation(format!(
                "Subject location '{text}' is outside of the image ({}x{})",
                image.width, image.height
            )));
        }

        Ok(Some(Self::new(x.trunc() as u32, y.trunc() as u32)))
    }
}

fn parse_coordinate(raw: &str, text: &str) -> Result<f64, AppError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AppError::validation(format!("Invalid subject location '{text}'")))
}

impl fmt::Display for SubjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}
