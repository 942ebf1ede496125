//! # podcheck
//!
//! Print-on-demand preflight checks for PDF books.
//!
//! The library loads a PDF, lays out each page's content, and checks the
//! things a paperback printer rejects: wrong trim size, mixed page sizes,
//! fonts without embedded glyph data, images below 300 DPI, and content too
//! close to the page edges or the binding.
//!
//! ## Quick Start
//!
//! ```no_run
//! use podcheck::{check_file, report, TrimSize};
//!
//! fn main() -> podcheck::Result<()> {
//!     let report = check_file("book.pdf", Some(TrimSize::new(5.5, 8.5)))?;
//!     print!("{}", report::to_text(&report));
//!     println!("{}", report::verdict(&report));
//!     std::process::exit(report.exit_code());
//! }
//! ```
//!
//! ## Checks
//!
//! - **Trim**: first page size against the expected trim, within 0.001in
//! - **Page sizes**: every page must share one size
//! - **Fonts**: simple and composite (Type0) fonts must embed glyph data
//! - **Images**: lowest effective DPI over all placements must reach 300
//! - **Margins**: content box against minimums tiered by page count, with
//!   the gutter alternating between odd and even pages
//!
//! Pages are analysed in parallel with Rayon.

pub mod analysis;
pub mod backend;
pub mod detect;
pub mod error;
pub mod options;
pub mod preflight;
pub mod report;

// Re-export commonly used types
pub use backend::{
    BBox, BlockKind, ContentBlock, DocumentAccessor, DocumentInfo, FontUse, ImageInfo,
    LopdfBackend, MemoryDocument, MemoryPage, ObjectRef,
};
pub use detect::{is_pdf_bytes, sniff_header, PdfHeader};
pub use error::{Error, Result};
pub use options::{PreflightOptions, TrimSize};
pub use preflight::{run, run_with_options};
pub use report::{FailureCategory, JsonFormat, PageAnomaly, Report};

use std::io::Read;
use std::path::Path;

/// Check a PDF file against an optional trim size.
///
/// # Example
///
/// ```no_run
/// use podcheck::check_file;
///
/// let report = check_file("book.pdf", None).unwrap();
/// println!("failing checks: {}", report.failure_count());
/// ```
pub fn check_file<P: AsRef<Path>>(path: P, expected_trim: Option<TrimSize>) -> Result<Report> {
    Preflight::new()
        .with_expected_trim(expected_trim)
        .check(path)
}

/// Check a PDF held in memory.
pub fn check_bytes(data: &[u8], expected_trim: Option<TrimSize>) -> Result<Report> {
    Preflight::new()
        .with_expected_trim(expected_trim)
        .check_bytes(data)
}

/// Check a PDF read from `reader`.
pub fn check_reader<R: Read>(reader: R, expected_trim: Option<TrimSize>) -> Result<Report> {
    Preflight::new()
        .with_expected_trim(expected_trim)
        .check_reader(reader)
}

/// Builder for preflight runs.
///
/// # Example
///
/// ```no_run
/// use podcheck::{Preflight, TrimSize};
///
/// let report = Preflight::new()
///     .with_trim(TrimSize::parse("6x9")?)
///     .sequential()
///     .check("book.pdf")?;
/// # Ok::<(), podcheck::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Preflight {
    options: PreflightOptions,
}

impl Preflight {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the first page to match `trim`.
    pub fn with_trim(mut self, trim: TrimSize) -> Self {
        self.options = self.options.with_trim(trim);
        self
    }

    /// Set or clear the expected trim.
    pub fn with_expected_trim(mut self, trim: Option<TrimSize>) -> Self {
        self.options = self.options.with_expected_trim(trim);
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.options = self.options.sequential();
        self
    }

    /// Set the degenerate-block filter size in points.
    pub fn with_min_block_size(mut self, pt: f64) -> Self {
        self.options = self.options.with_min_block_size(pt);
        self
    }

    /// Options this builder will run with.
    pub fn options(&self) -> &PreflightOptions {
        &self.options
    }

    /// Load and check a PDF file. The report's source is the path.
    pub fn check<P: AsRef<Path>>(&self, path: P) -> Result<Report> {
        let path = path.as_ref();
        let backend = LopdfBackend::load_file(path)?;
        Ok(self
            .check_document(&backend.snapshot())
            .with_source(path.display().to_string()))
    }

    /// Load and check a PDF from bytes.
    pub fn check_bytes(&self, data: &[u8]) -> Result<Report> {
        let backend = LopdfBackend::load_bytes(data)?;
        Ok(self.check_document(&backend.snapshot()))
    }

    /// Load and check a PDF from a reader.
    pub fn check_reader<R: Read>(&self, reader: R) -> Result<Report> {
        let backend = LopdfBackend::load_reader(reader)?;
        Ok(self.check_document(&backend.snapshot()))
    }

    /// Check an already loaded document.
    pub fn check_document<A: DocumentAccessor + ?Sized>(&self, doc: &A) -> Report {
        run_with_options(doc, &self.options)
    }
}
