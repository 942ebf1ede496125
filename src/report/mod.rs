//! Preflight report and its rendering.
//!
//! Per-page findings are gathered into a [`PageTally`], tallies are merged
//! in page order, and the final tally is folded into a [`Report`] together
//! with the document-level checks.

mod json;
mod tally;
mod text;

pub use json::{to_json, JsonFormat};
pub use tally::PageTally;
pub use text::{to_text, verdict};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::{FontViolation, LowDpiImage, MarginThresholds, MarginViolation, Margins};
use crate::backend::DocumentInfo;
use crate::options::TrimSize;

/// First-page size compared against the expected trim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimCheck {
    pub width_in: f64,
    pub height_in: f64,
    pub expected: Option<TrimSize>,
    /// `true` when no trim was expected
    pub matches: bool,
}

/// Number of pages sharing one size (points, rounded to 0.001).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSizeCount {
    pub width_pt: f64,
    pub height_pt: f64,
    pub count: usize,
}

/// A page whose content could not be fully read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageAnomaly {
    pub page: u32,
    pub reason: String,
}

impl PageAnomaly {
    pub fn new(page: u32, reason: impl Into<String>) -> Self {
        Self {
            page,
            reason: reason.into(),
        }
    }
}

/// Smallest observed value of one margin and the page it was seen on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginExtreme {
    pub value: f64,
    pub page: u32,
}

impl MarginExtreme {
    /// The smaller of two extremes; the earlier page wins a tie.
    fn min(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(a), Some(b)) => {
                if b.value < a.value || (b.value == a.value && b.page < a.page) {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (a, None) => a,
            (None, b) => b,
        }
    }
}

/// Worst margin per side over all analysed pages. A side is `None` when no
/// page had content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorstMargins {
    pub top: Option<MarginExtreme>,
    pub bottom: Option<MarginExtreme>,
    pub inside: Option<MarginExtreme>,
    pub outside: Option<MarginExtreme>,
}

impl WorstMargins {
    /// Worst margins of a single page.
    pub fn from_page(page: u32, margins: &Margins) -> Self {
        let at = |value| Some(MarginExtreme { value, page });
        Self {
            top: at(margins.top),
            bottom: at(margins.bottom),
            inside: at(margins.inside),
            outside: at(margins.outside),
        }
    }

    /// Side-wise minimum of two records.
    pub fn combine(self, other: Self) -> Self {
        Self {
            top: MarginExtreme::min(self.top, other.top),
            bottom: MarginExtreme::min(self.bottom, other.bottom),
            inside: MarginExtreme::min(self.inside, other.inside),
            outside: MarginExtreme::min(self.outside, other.outside),
        }
    }
}

/// A check that failed. The failure count is the number of these, not the
/// number of offending rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    TrimMismatch,
    InconsistentPageSizes,
    FontsNotEmbedded,
    LowDpiImages,
    MarginViolations,
    UnreadableContent,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCategory::TrimMismatch => "trim_mismatch",
            FailureCategory::InconsistentPageSizes => "inconsistent_page_sizes",
            FailureCategory::FontsNotEmbedded => "fonts_not_embedded",
            FailureCategory::LowDpiImages => "low_dpi_images",
            FailureCategory::MarginViolations => "margin_violations",
            FailureCategory::UnreadableContent => "unreadable_content",
        };
        f.write_str(name)
    }
}

/// Full result of a preflight run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Path or label of the checked document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub info: DocumentInfo,
    pub page_count: u32,
    pub encrypted: bool,
    pub trim: TrimCheck,
    /// Distinct page sizes, most common first
    pub page_sizes: Vec<PageSizeCount>,
    pub annotations: usize,
    pub form_fields: usize,
    pub unique_fonts: usize,
    pub fonts_not_embedded: Vec<FontViolation>,
    pub dpi_threshold: f64,
    pub low_dpi_images: Vec<LowDpiImage>,
    pub thresholds: MarginThresholds,
    pub worst_margins: WorstMargins,
    pub margin_violations: Vec<MarginViolation>,
    /// Pages whose content could not be read; their margins are unchecked
    #[serde(default)]
    pub unreadable_pages: Vec<PageAnomaly>,
    pub failures: Vec<FailureCategory>,
    pub passed: bool,
}

impl Report {
    /// Number of failing categories.
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Process exit code: 0 on pass, 1 when any category failed.
    pub fn exit_code(&self) -> i32 {
        if self.passed {
            0
        } else {
            1
        }
    }

    /// Attach a source label.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}
