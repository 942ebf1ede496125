//! Effective image resolution.

use serde::{Deserialize, Serialize};

use super::margins::POINTS_PER_INCH;
use crate::backend::{ImageInfo, ObjectRef};

/// Images printing below this resolution are flagged.
pub const MIN_IMAGE_DPI: f64 = 300.0;

/// An image placement below [`MIN_IMAGE_DPI`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowDpiImage {
    pub page: u32,
    pub xref: ObjectRef,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub dpi: f64,
    pub colorspace: String,
}

/// Lowest resolution of an image over all of its placements.
///
/// Each placement contributes `min(width dpi, height dpi)`. Placements with
/// a non-positive displayed size are skipped; `None` when none is usable.
pub fn effective_dpi(pixel_width: u32, pixel_height: u32, rects: &[(f64, f64)]) -> Option<f64> {
    rects
        .iter()
        .filter(|(w, h)| *w > 0.0 && *h > 0.0)
        .map(|&(w, h)| {
            let dpi_w = f64::from(pixel_width) * POINTS_PER_INCH / w;
            let dpi_h = f64::from(pixel_height) * POINTS_PER_INCH / h;
            dpi_w.min(dpi_h)
        })
        .reduce(f64::min)
}

/// Evaluate one image on one page; `Some` when it is under the floor.
pub fn evaluate(page: u32, image: &ImageInfo, rects: &[(f64, f64)]) -> Option<LowDpiImage> {
    let dpi = effective_dpi(image.pixel_width, image.pixel_height, rects)?;
    if dpi >= MIN_IMAGE_DPI {
        return None;
    }
    Some(LowDpiImage {
        page,
        xref: image.handle,
        pixel_width: image.pixel_width,
        pixel_height: image.pixel_height,
        dpi,
        colorspace: image.colorspace.clone(),
    })
}
