//! Resize geometry: target dimensions and subject location mapping.
//!
//! Only the metadata is computed here; producing pixels is the job of the
//! thumbnail backend.

use serde::{Deserialize, Serialize};

use filer_entity::file::{ImageInfo, SubjectLocation};

/// Requested resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeSpec {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Fill the target box exactly, cropping around the subject.
    #[serde(default)]
    pub crop: bool,
    /// Allow scaling above the original size.
    #[serde(default)]
    pub upscale: bool,
}

impl ResizeSpec {
    /// Fit inside `width` x `height` without cropping or upscaling.
    pub fn fit(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            crop: false,
            upscale: false,
        }
    }

    /// Fill `width` x `height` exactly, cropping the overflow.
    pub fn fill(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            crop: true,
            upscale: false,
        }
    }

    /// Permit upscaling.
    pub fn with_upscale(mut self) -> Self {
        self.upscale = true;
        self
    }
}

/// Compute the image metadata after applying `spec`.
///
/// Returns `None` when the source or target has a zero dimension.
pub fn resize(image: &ImageInfo, spec: &ResizeSpec) -> Option<ImageInfo> {
    if image.width == 0 || image.height == 0 || spec.width == 0 || spec.height == 0 {
        return None;
    }
    let (w, h) = (f64::from(image.width), f64::from(image.height));

    if spec.crop {
        let (tw, th) = if spec.upscale {
            (spec.width, spec.height)
        } else {
            (spec.width.min(image.width), spec.height.min(image.height))
        };
        let (tw_f, th_f) = (f64::from(tw), f64::from(th));
        let scale = (tw_f / w).max(th_f / h);

        let subject = image.subject_location.map(|loc| {
            let x = f64::from(loc.x) * scale - (w * scale - tw_f) / 2.0;
            let y = f64::from(loc.y) * scale - (h * scale - th_f) / 2.0;
            if (0.0..=tw_f).contains(&x) && (0.0..=th_f).contains(&y) {
                SubjectLocation::new(to_pixels(x), to_pixels(y))
            } else {
                SubjectLocation::new(to_pixels(tw_f / 2.0), to_pixels(th_f / 2.0))
            }
        });

        return Some(ImageInfo {
            width: tw,
            height: th,
            subject_location: subject,
        });
    }

    let mut scale = (f64::from(spec.width) / w).min(f64::from(spec.height) / h);
    if scale > 1.0 && !spec.upscale {
        scale = 1.0;
    }

    Some(ImageInfo {
        width: to_pixels(w * scale).max(1),
        height: to_pixels(h * scale).max(1),
        subject_location: image.subject_location.map(|loc| {
            SubjectLocation::new(
                to_pixels(f64::from(loc.x) * scale),
                to_pixels(f64::from(loc.y) * scale),
            )
        }),
    })
}

/// Round half away from zero and clamp into `u32`.
fn to_pixels(value: f64) -> u32 {
    let rounded = value.round();
    if rounded <= 0.0 {
        0
    } else if rounded >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        rounded as u32
    }
}
