//! Document accessor abstraction layer.
//!
//! The analysis never touches raw PDF bytes. It reads everything through
//! [`DocumentAccessor`], which exposes page geometry, laid-out content
//! blocks, font and image usage, and a generic key lookup on indirect
//! objects. Every lookup is total: failures come back as `None` or an empty
//! sequence, never as an error.

mod content;
mod lopdf_backend;
mod memory;
mod metrics;

pub use lopdf_backend::LopdfBackend;
pub use memory::{MemoryDocument, MemoryImage, MemoryPage};

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Handle to an indirect object: object number plus generation.
///
/// Rendered and parsed in the textual `<n> <generation> R` form, which is
/// also how it serializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectRef {
    pub number: u32,
    pub generation: u16,
}

impl ObjectRef {
    pub const fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }

    /// Parse a raw value that must be exactly one indirect reference.
    ///
    /// `None` for absent values, the literal `null`, and anything malformed.
    pub fn parse_raw(raw: Option<&str>) -> Option<Self> {
        let raw = raw?.trim();
        if raw.is_empty() || raw == "null" {
            return None;
        }
        let caps = exact_ref_pattern().captures(raw)?;
        Self::from_captures(&caps)
    }

    /// Find the first indirect reference anywhere inside a raw value, e.g.
    /// the single entry of a `[12 0 R]` array.
    pub fn find_in(raw: &str) -> Option<Self> {
        let caps = embedded_ref_pattern().captures(raw)?;
        Self::from_captures(&caps)
    }

    fn from_captures(caps: &regex::Captures<'_>) -> Option<Self> {
        let number = caps.get(1)?.as_str().parse().ok()?;
        let generation = caps.get(2)?.as_str().parse().ok()?;
        Some(Self::new(number, generation))
    }
}

fn exact_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)\s+(\d+)\s+R$").expect("valid reference regex"))
}

fn embedded_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)\s+(\d+)\s+R").expect("valid reference regex"))
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

impl FromStr for ObjectRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_raw(Some(s)).ok_or_else(|| format!("not an indirect reference: {}", s))
    }
}

impl TryFrom<String> for ObjectRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObjectRef> for String {
    fn from(value: ObjectRef) -> Self {
        value.to_string()
    }
}

impl From<(u32, u16)> for ObjectRef {
    fn from((number, generation): (u32, u16)) -> Self {
        Self::new(number, generation)
    }
}

/// Axis-aligned rectangle in points, origin top-left, y growing downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Kind of laid-out content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Image,
}

/// A laid-out block as returned by the accessor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub kind: BlockKind,
    pub bbox: BBox,
}

impl ContentBlock {
    pub fn text(bbox: BBox) -> Self {
        Self {
            kind: BlockKind::Text,
            bbox,
        }
    }

    pub fn image(bbox: BBox) -> Self {
        Self {
            kind: BlockKind::Image,
            bbox,
        }
    }
}

/// A font referenced by a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontUse {
    pub handle: ObjectRef,
    /// Display name, usually the BaseFont
    pub name: String,
}

/// An image XObject referenced by a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub handle: ObjectRef,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub colorspace: String,
}

/// Descriptive metadata, when the accessor can supply it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub pdf_version: Option<String>,
    pub producer: Option<String>,
    pub creator: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

/// Read-only view of a loaded document.
///
/// Page numbers are 1-based. Sizes are in points (1/72 inch). The trait is
/// `Sync` so pages can be analysed from several threads at once.
pub trait DocumentAccessor: Sync {
    /// Number of pages.
    fn page_count(&self) -> u32;

    /// Whether the file was encrypted.
    fn is_encrypted(&self) -> bool;

    /// Page width and height in points.
    fn page_box(&self, page: u32) -> (f64, f64);

    /// Laid-out text and image blocks on a page.
    fn content_blocks(&self, page: u32) -> Vec<ContentBlock>;

    /// Fonts referenced from a page's resources.
    fn fonts_used(&self, page: u32) -> Vec<FontUse>;

    /// Raw textual value of `key` on an indirect object, or `None` when the
    /// object or key does not exist.
    fn object_key(&self, handle: ObjectRef, key: &str) -> Option<String>;

    /// Image XObjects referenced by a page.
    fn images_used(&self, page: u32) -> Vec<ImageInfo>;

    /// Displayed (width, height) in points of every placement of `image`
    /// on `page`.
    fn placement_rects(&self, page: u32, image: ObjectRef) -> Vec<(f64, f64)>;

    /// Number of non-widget annotations on a page.
    fn annotations(&self, page: u32) -> usize;

    /// Number of form field widgets on a page.
    fn form_fields(&self, page: u32) -> usize;

    /// Problems met while reading a page's content, such as a stream that
    /// would not decode. Checks on such a page are incomplete.
    fn page_anomalies(&self, _page: u32) -> Vec<String> {
        Vec::new()
    }

    /// Descriptive metadata.
    fn info(&self) -> DocumentInfo {
        DocumentInfo::default()
    }
}
