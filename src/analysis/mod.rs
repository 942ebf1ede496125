//! Page geometry, margin, font and image checks.
//!
//! Every function here is pure: it reads from a [`DocumentAccessor`] or
//! plain values and never fails.
//!
//! [`DocumentAccessor`]: crate::backend::DocumentAccessor

pub mod fonts;
pub mod geometry;
pub mod images;
pub mod margins;
pub mod thresholds;

pub use fonts::{FontRef, FontStatus, FontViolation};
pub use geometry::content_bbox;
pub use images::{LowDpiImage, MIN_IMAGE_DPI};
pub use margins::{Margins, MarginViolation};
pub use thresholds::MarginThresholds;
