//! Margin classification for bound pages.
//!
//! In a bound book the gutter alternates sides: odd (recto) pages bind on
//! the left, even (verso) pages on the right.

use serde::{Deserialize, Serialize};

use crate::backend::BBox;

/// Points per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// Convert points to inches.
pub fn pt_to_in(pt: f64) -> f64 {
    pt / POINTS_PER_INCH
}

/// Content-to-edge distances of one page, in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
    /// Margin on the binding side
    pub inside: f64,
    /// Margin on the fore-edge side
    pub outside: f64,
}

/// Which physical side of the page the binding is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSide {
    Left,
    Right,
}

impl BindingSide {
    /// Binding side for a 1-based page number.
    pub fn for_page(page: u32) -> Self {
        if page % 2 == 1 {
            BindingSide::Left
        } else {
            BindingSide::Right
        }
    }
}

/// Classify the margins around `content` on a `page_width` × `page_height`
/// page (points, origin top-left).
pub fn classify(content: &BBox, page_width: f64, page_height: f64, page: u32) -> Margins {
    let left = pt_to_in(content.x0);
    let right = pt_to_in(page_width - content.x1);
    let (inside, outside) = match BindingSide::for_page(page) {
        BindingSide::Left => (left, right),
        BindingSide::Right => (right, left),
    };

    Margins {
        top: pt_to_in(content.y0),
        bottom: pt_to_in(page_height - content.y1),
        inside,
        outside,
    }
}

/// A page whose margins broke the policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginViolation {
    pub page: u32,
    pub margins: Margins,
}
