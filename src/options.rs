//! Preflight options and configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analysis::geometry::MIN_BLOCK_SIZE_PT;
use crate::analysis::margins::pt_to_in;
use crate::error::{Error, Result};

/// Expected trim size of the printed book, in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimSize {
    pub width_in: f64,
    pub height_in: f64,
}

impl TrimSize {
    /// Allowed deviation on each axis, in inches.
    pub const TOLERANCE: f64 = 1e-3;

    pub fn new(width_in: f64, height_in: f64) -> Self {
        Self {
            width_in,
            height_in,
        }
    }

    /// Parse a `WxH` string such as `5.5x8.5` (separator is case-insensitive).
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidTrim(s.to_string());
        let lower = s.trim().to_ascii_lowercase();
        let (w, h) = lower.split_once('x').ok_or_else(invalid)?;
        let width_in: f64 = w.trim().parse().map_err(|_| invalid())?;
        let height_in: f64 = h.trim().parse().map_err(|_| invalid())?;

        let usable = |v: f64| v.is_finite() && v > 0.0;
        if !usable(width_in) || !usable(height_in) {
            return Err(invalid());
        }
        Ok(Self::new(width_in, height_in))
    }

    /// Whether a page of `width_pt` × `height_pt` matches this trim.
    pub fn matches(&self, width_pt: f64, height_pt: f64) -> bool {
        (pt_to_in(width_pt) - self.width_in).abs() <= Self::TOLERANCE
            && (pt_to_in(height_pt) - self.height_in).abs() <= Self::TOLERANCE
    }
}

impl FromStr for TrimSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TrimSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width_in, self.height_in)
    }
}

/// Options for a preflight run.
#[derive(Debug, Clone, PartialEq)]
pub struct PreflightOptions {
    /// Trim size the first page must match, if any
    pub expected_trim: Option<TrimSize>,

    /// Analyse pages and fonts on the rayon thread pool
    pub parallel: bool,

    /// Blocks this small (points) on either axis are ignored
    pub min_block_size_pt: f64,
}

impl PreflightOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the first page to match `trim`.
    pub fn with_trim(mut self, trim: TrimSize) -> Self {
        self.expected_trim = Some(trim);
        self
    }

    /// Set or clear the expected trim.
    pub fn with_expected_trim(mut self, trim: Option<TrimSize>) -> Self {
        self.expected_trim = trim;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set the degenerate-block filter size in points.
    pub fn with_min_block_size(mut self, pt: f64) -> Self {
        self.min_block_size_pt = pt;
        self
    }
}

impl Default for PreflightOptions {
    fn default() -> Self {
        Self {
            expected_trim: None,
            parallel: true,
            min_block_size_pt: MIN_BLOCK_SIZE_PT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_parse() {
        assert_eq!(TrimSize::parse("5.5x8.5").unwrap(), TrimSize::new(5.5, 8.5));
        assert_eq!(TrimSize::parse("6X9").unwrap(), TrimSize::new(6.0, 9.0));
        assert_eq!(" 8.5 x 11 ".parse::<TrimSize>().unwrap(), TrimSize::new(8.5, 11.0));
    }

    #[test]
    fn test_trim_parse_rejects_malformed() {
        for bad in ["", "5.5", "5.5x", "x8.5", "axb", "0x8.5", "-5x8", "inf x 2", "5.5x8.5x2"] {
            let err = TrimSize::parse(bad).unwrap_err();
            assert!(matches!(err, Error::InvalidTrim(_)), "{}", bad);
        }
    }

    #[test]
    fn test_trim_matches_within_tolerance() {
        let trim = TrimSize::new(5.5, 8.5);
        assert!(trim.matches(396.0, 612.0));
        assert!(trim.matches(396.05, 612.0));
        assert!(!trim.matches(396.1, 612.0));
        assert!(!trim.matches(612.0, 792.0));
    }

    #[test]
    fn test_trim_display() {
        assert_eq!(TrimSize::new(5.5, 8.5).to_string(), "5.5x8.5");
        assert_eq!(TrimSize::new(6.0, 9.0).to_string(), "6x9");
    }

    #[test]
    fn test_options_builder() {
        let options = PreflightOptions::new()
            .with_trim(TrimSize::new(6.0, 9.0))
            .sequential()
            .with_min_block_size(1.0);

        assert_eq!(options.expected_trim, Some(TrimSize::new(6.0, 9.0)));
        assert!(!options.parallel);
        assert_eq!(options.min_block_size_pt, 1.0);
    }

    #[test]
    fn test_default_options() {
        let options = PreflightOptions::default();
        assert_eq!(options.expected_trim, None);
        assert!(options.parallel);
        assert_eq!(options.min_block_size_pt, 0.25);
    }
}
