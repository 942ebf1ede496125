//! Minimum margin policy.
//!
//! Top, bottom and outside margins are fixed. The inside (gutter) margin
//! grows with page count because thicker books lose more paper to the
//! binding.

use serde::{Deserialize, Serialize};

use super::margins::Margins;

/// Fixed minimum for top, bottom and outside margins, in inches.
pub const EDGE_MARGIN_IN: f64 = 0.25;

/// Gutter tiers as (max page count, minimum inside margin in inches).
const GUTTER_TIERS: [(u32, f64); 3] = [(150, 0.375), (300, 0.5), (500, 0.625)];

/// Gutter for books past the last tier.
const GUTTER_MAX_IN: f64 = 0.75;

/// Minimum margins, in inches, that every page must meet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginThresholds {
    pub top: f64,
    pub bottom: f64,
    pub outside: f64,
    pub inside: f64,
}

impl MarginThresholds {
    /// Thresholds for a book of `page_count` pages.
    pub fn for_page_count(page_count: u32) -> Self {
        Self {
            top: EDGE_MARGIN_IN,
            bottom: EDGE_MARGIN_IN,
            outside: EDGE_MARGIN_IN,
            inside: gutter_for(page_count),
        }
    }

    /// True when any side of `margins` is strictly below its threshold.
    pub fn is_violated_by(&self, margins: &Margins) -> bool {
        margins.top < self.top
            || margins.bottom < self.bottom
            || margins.outside < self.outside
            || margins.inside < self.inside
    }
}

fn gutter_for(page_count: u32) -> f64 {
    GUTTER_TIERS
        .iter()
        .find(|(max_pages, _)| page_count <= *max_pages)
        .map_or(GUTTER_MAX_IN, |(_, inside)| *inside)
}
