//! In-memory document accessor.
//!
//! Holds an already-extracted layout: page boxes, blocks, font and image
//! usage, and a flat table of indirect-object keys. Useful for drivers that
//! run their own extraction, and for tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ContentBlock, DocumentAccessor, DocumentInfo, FontUse, ImageInfo, ObjectRef};
use crate::error::{Error, Result};

/// An image on a [`MemoryPage`] together with its placements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryImage {
    pub info: ImageInfo,
    /// Displayed (width, height) in points, one entry per placement
    #[serde(default)]
    pub placements: Vec<(f64, f64)>,
}

/// A single page of a [`MemoryDocument`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPage {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
    #[serde(default)]
    pub fonts: Vec<FontUse>,
    #[serde(default)]
    pub images: Vec<MemoryImage>,
    #[serde(default)]
    pub annotations: usize,
    #[serde(default)]
    pub form_fields: usize,
    /// Content that could not be read
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<String>,
}

impl MemoryPage {
    /// Create an empty page of the given size in points.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            blocks: Vec::new(),
            fonts: Vec::new(),
            images: Vec::new(),
            annotations: 0,
            form_fields: 0,
            anomalies: Vec::new(),
        }
    }

    /// Create an empty page from a size in inches.
    pub fn inches(width: f64, height: f64) -> Self {
        Self::new(width * 72.0, height * 72.0)
    }

    pub fn with_block(mut self, block: ContentBlock) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn with_font(mut self, handle: ObjectRef, name: impl Into<String>) -> Self {
        self.fonts.push(FontUse {
            handle,
            name: name.into(),
        });
        self
    }

    /// Add an image drawn at each of `placements`.
    pub fn with_image(mut self, info: ImageInfo, placements: Vec<(f64, f64)>) -> Self {
        self.images.push(MemoryImage { info, placements });
        self
    }

    pub fn with_annotations(mut self, annotations: usize, form_fields: usize) -> Self {
        self.annotations = annotations;
        self.form_fields = form_fields;
        self
    }

    pub fn with_anomaly(mut self, anomaly: impl Into<String>) -> Self {
        self.anomalies.push(anomaly.into());
        self
    }
}

/// A fully in-memory [`DocumentAccessor`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDocument {
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub info: DocumentInfo,
    pub pages: Vec<MemoryPage>,
    /// Raw key values per indirect object
    #[serde(default)]
    pub objects: BTreeMap<ObjectRef, BTreeMap<String, String>>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a document snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Other(format!("invalid snapshot: {}", e)))
    }

    pub fn add_page(&mut self, page: MemoryPage) {
        self.pages.push(page);
    }

    pub fn with_page(mut self, page: MemoryPage) -> Self {
        self.add_page(page);
        self
    }

    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    /// Set a raw key value on an indirect object.
    pub fn set_key(&mut self, handle: ObjectRef, key: impl Into<String>, raw: impl Into<String>) {
        self.objects
            .entry(handle)
            .or_default()
            .insert(key.into(), raw.into());
    }

    fn page(&self, page: u32) -> Option<&MemoryPage> {
        let index = usize::try_from(page).ok()?.checked_sub(1)?;
        self.pages.get(index)
    }
}

impl DocumentAccessor for MemoryDocument {
    fn page_count(&self) -> u32 {
        u32::try_from(self.pages.len()).unwrap_or(u32::MAX)
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn page_box(&self, page: u32) -> (f64, f64) {
        self.page(page)
            .map(|p| (p.width, p.height))
            .unwrap_or((0.0, 0.0))
    }

    fn content_blocks(&self, page: u32) -> Vec<ContentBlock> {
        self.page(page).map(|p| p.blocks.clone()).unwrap_or_default()
    }

    fn fonts_used(&self, page: u32) -> Vec<FontUse> {
        self.page(page).map(|p| p.fonts.clone()).unwrap_or_default()
    }

    fn object_key(&self, handle: ObjectRef, key: &str) -> Option<String> {
        self.objects.get(&handle)?.get(key).cloned()
    }

    fn images_used(&self, page: u32) -> Vec<ImageInfo> {
        self.page(page)
            .map(|p| p.images.iter().map(|img| img.info.clone()).collect())
            .unwrap_or_default()
    }

    fn placement_rects(&self, page: u32, image: ObjectRef) -> Vec<(f64, f64)> {
        self.page(page)
            .map(|p| {
                p.images
                    .iter()
                    .filter(|img| img.info.handle == image)
                    .flat_map(|img| img.placements.iter().copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn annotations(&self, page: u32) -> usize {
        self.page(page).map_or(0, |p| p.annotations)
    }

    fn form_fields(&self, page: u32) -> usize {
        self.page(page).map_or(0, |p| p.form_fields)
    }

    fn page_anomalies(&self, page: u32) -> Vec<String> {
        self.page(page).map(|p| p.anomalies.clone()).unwrap_or_default()
    }

    fn info(&self) -> DocumentInfo {
        self.info.clone()
    }
}
