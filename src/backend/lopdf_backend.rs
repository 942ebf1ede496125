//! Document loading backed by lopdf.
//!
//! [`LopdfBackend`] parses a PDF file and extracts everything the analysis
//! needs into a [`MemoryDocument`] snapshot: page boxes, laid-out blocks,
//! font and image usage, annotation counts, and the keys of every indirect
//! dictionary in textual form. All file and object-graph work happens here,
//! once, before analysis starts.
//!
//! Encrypted files are opened with the empty user password, which is how
//! owner-password-only files (print restrictions, no open password) read.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use lopdf::encryption::{self, DecryptionError};
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use super::content::{name_of, number, resolve, resolve_dict, stream_content, LayoutWalker};
use super::{BBox, DocumentInfo, MemoryDocument, MemoryImage, MemoryPage, ObjectRef};
use crate::detect::sniff_header;
use crate::error::{Error, Result};

/// Page attributes may be inherited through at most this many `Parent` hops.
const MAX_INHERIT_DEPTH: usize = 32;

/// Letter, used when a page has no readable box.
const DEFAULT_PAGE_BOX: BBox = BBox::new(0.0, 0.0, 612.0, 792.0);

/// A PDF loaded through `lopdf`.
pub struct LopdfBackend {
    doc: LopdfDocument,
    version: String,
    encrypted: bool,
}

impl LopdfBackend {
    /// Load from a file path.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::load_bytes(&data)
    }

    /// Load from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        let header = sniff_header(data)?;
        let mut doc = LopdfDocument::load_mem(data)?;
        let encrypted = doc.is_encrypted();
        if encrypted {
            decrypt_with_empty_password(&mut doc)?;
        }
        if doc.get_pages().is_empty() {
            return Err(Error::NoPages);
        }
        Ok(Self {
            doc,
            version: header.version,
            encrypted,
        })
    }

    /// Load from a reader.
    pub fn load_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::load_bytes(&data)
    }

    /// Direct access to the underlying `lopdf::Document`.
    pub fn raw_doc(&self) -> &LopdfDocument {
        &self.doc
    }

    /// Whether the file was encrypted. The loaded document is already
    /// decrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// PDF version from the file header.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Extract the analysis snapshot.
    pub fn snapshot(&self) -> MemoryDocument {
        let pages: Vec<MemoryPage> = self
            .doc
            .get_pages()
            .into_iter()
            .map(|(number, id)| self.extract_page(number, id))
            .collect();

        log::info!(
            "extracted {} pages, {} indirect dictionaries",
            pages.len(),
            self.doc.objects.len()
        );

        MemoryDocument {
            encrypted: self.encrypted,
            info: self.extract_info(),
            pages,
            objects: self.extract_objects(),
        }
    }

    fn extract_page(&self, number: u32, page_id: ObjectId) -> MemoryPage {
        let frame = self.page_frame(page_id);
        let rotation = self.rotation(page_id);
        let resources = self
            .inherited(page_id, b"Resources")
            .and_then(|r| resolve_dict(&self.doc, r));

        let mut anomalies = Vec::new();
        let content = self.page_content(page_id, &mut anomalies);
        let mut layout = LayoutWalker::new(&self.doc, frame).walk_page(&content, resources);
        anomalies.append(&mut layout.anomalies);
        for anomaly in &anomalies {
            log::warn!("page {}: {}", number, anomaly);
        }

        let blocks = layout
            .blocks
            .into_iter()
            .map(|mut block| {
                block.bbox = rotate(block.bbox, rotation, frame.width(), frame.height());
                block
            })
            .collect();
        let (width, height) = if rotation % 180 == 0 {
            (frame.width(), frame.height())
        } else {
            (frame.height(), frame.width())
        };

        let images = layout
            .images
            .into_iter()
            .map(|info| {
                let placements = layout
                    .placements
                    .iter()
                    .filter(|(handle, _)| *handle == info.handle)
                    .map(|(_, size)| *size)
                    .collect();
                MemoryImage { info, placements }
            })
            .collect();

        let (annotations, form_fields) = self.annotation_counts(page_id);

        MemoryPage {
            width,
            height,
            blocks,
            fonts: layout.fonts,
            images,
            annotations,
            form_fields,
            anomalies,
        }
    }

    /// Look up a page attribute, following `Parent` links for inheritable keys.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut node = self.doc.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_INHERIT_DEPTH {
            if let Ok(value) = node.get(key) {
                return Some(value);
            }
            let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
            node = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }

    /// CropBox, falling back to MediaBox, normalized to x0<x1, y0<y1.
    fn page_frame(&self, page_id: ObjectId) -> BBox {
        [b"CropBox".as_slice(), b"MediaBox".as_slice()]
            .into_iter()
            .find_map(|key| self.inherited(page_id, key).and_then(|b| self.rect(b)))
            .unwrap_or(DEFAULT_PAGE_BOX)
    }

    /// Clockwise display rotation: 0, 90, 180 or 270.
    fn rotation(&self, page_id: ObjectId) -> u32 {
        let degrees = self
            .inherited(page_id, b"Rotate")
            .and_then(|r| resolve(&self.doc, r))
            .and_then(number)
            .unwrap_or(0.0) as i64;
        if degrees % 90 != 0 {
            log::debug!("ignoring /Rotate {}", degrees);
            return 0;
        }
        degrees.rem_euclid(360) as u32
    }

    fn rect(&self, obj: &Object) -> Option<BBox> {
        let items = resolve(&self.doc, obj)?.as_array().ok()?;
        if items.len() < 4 {
            return None;
        }
        let mut v = [0.0f64; 4];
        for (slot, item) in v.iter_mut().zip(items) {
            *slot = resolve(&self.doc, item).and_then(number)?;
        }
        let rect = BBox::new(v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3]));
        (rect.width() > 0.0 && rect.height() > 0.0).then_some(rect)
    }

    /// Decompressed page content, concatenating content arrays. Streams
    /// that cannot be read are left out and noted in `anomalies`.
    fn page_content(&self, page_id: ObjectId, anomalies: &mut Vec<String>) -> Vec<u8> {
        let Some(contents) = self
            .doc
            .get_dictionary(page_id)
            .ok()
            .and_then(|page| page.get(b"Contents").ok())
        else {
            return Vec::new();
        };

        let streams: Vec<&Object> = match resolve(&self.doc, contents) {
            Some(Object::Array(arr)) => arr.iter().collect(),
            Some(other) => vec![other],
            None => {
                anomalies.push("missing content stream".to_string());
                return Vec::new();
            }
        };

        let mut content = Vec::new();
        for obj in streams {
            match resolve(&self.doc, obj) {
                Some(Object::Stream(s)) => match stream_content(s) {
                    Ok(data) => {
                        content.extend_from_slice(&data);
                        content.push(b' ');
                    }
                    Err(e) => anomalies.push(format!("content stream: {}", e)),
                },
                Some(Object::Null) => {}
                _ => anomalies.push("content entry is not a stream".to_string()),
            }
        }
        content
    }

    /// (annotations, form field widgets) on a page.
    fn annotation_counts(&self, page_id: ObjectId) -> (usize, usize) {
        let annots = self
            .doc
            .get_dictionary(page_id)
            .ok()
            .and_then(|page| page.get(b"Annots").ok())
            .and_then(|a| resolve(&self.doc, a))
            .and_then(|a| a.as_array().ok());

        let mut annotations = 0;
        let mut widgets = 0;
        for annot in annots.into_iter().flatten() {
            let Some(dict) = resolve_dict(&self.doc, annot) else {
                continue;
            };
            let subtype = dict.get(b"Subtype").ok().and_then(name_of);
            if subtype.as_deref() == Some("Widget") {
                widgets += 1;
            } else {
                annotations += 1;
            }
        }
        (annotations, widgets)
    }

    fn extract_info(&self) -> DocumentInfo {
        let mut info = DocumentInfo {
            pdf_version: Some(self.version.clone()),
            ..DocumentInfo::default()
        };

        let dict = self
            .doc
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|i| resolve_dict(&self.doc, i));
        if let Some(dict) = dict {
            info.producer = get_string_from_dict(dict, b"Producer");
            info.creator = get_string_from_dict(dict, b"Creator");
            info.created =
                get_string_from_dict(dict, b"CreationDate").and_then(|d| parse_pdf_date(&d));
        }
        info
    }

    /// Textual key/value table for every indirect dictionary or stream.
    fn extract_objects(&self) -> BTreeMap<ObjectRef, BTreeMap<String, String>> {
        self.doc
            .objects
            .iter()
            .filter_map(|(id, obj)| {
                let dict = match obj {
                    Object::Dictionary(d) => d,
                    Object::Stream(s) => &s.dict,
                    _ => return None,
                };
                let keys = dict
                    .iter()
                    .map(|(k, v)| (String::from_utf8_lossy(k).to_string(), describe(v)))
                    .collect();
                Some((ObjectRef::from(*id), keys))
            })
            .collect()
    }
}

/// Decrypt every string and stream with the key for the empty user password.
fn decrypt_with_empty_password(doc: &mut LopdfDocument) -> Result<()> {
    let err = match doc.decrypt("") {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    // lopdf only decrypts crypt-filter (V4) files itself; V1 and V2 files
    // have no /CF and use RC4 throughout.
    let version = doc
        .get_encrypted()
        .ok()
        .and_then(|dict| dict.get(b"V").ok())
        .and_then(|v| v.as_i64().ok())
        .unwrap_or(0);
    if !matches!(version, 1 | 2) {
        log::debug!("cannot decrypt (V={}): {}", version, err);
        return Err(Error::Encrypted);
    }

    let key = encryption::get_encryption_key(doc, "", true).map_err(|e| {
        log::debug!("cannot derive the empty-password key: {}", e);
        Error::Encrypted
    })?;
    let encrypt_id = doc.trailer.get(b"Encrypt").and_then(Object::as_reference).ok();
    for (&id, obj) in doc.objects.iter_mut() {
        if Some(id) != encrypt_id {
            decrypt_rc4(&key, id, obj);
        }
    }
    doc.trailer.remove(b"Encrypt");
    Ok(())
}

/// Decrypt the strings and stream data of one indirect object in place.
fn decrypt_rc4(key: &[u8], id: ObjectId, obj: &mut Object) {
    let plain = match encryption::decrypt_object(key, id, &*obj, false) {
        Ok(plain) => Some(plain),
        Err(DecryptionError::NotDecryptable) => None,
        Err(e) => {
            log::debug!("object {:?}: {}", id, e);
            None
        }
    };
    match obj {
        Object::String(bytes, _) => {
            if let Some(plain) = plain {
                *bytes = plain;
            }
        }
        Object::Stream(stream) => {
            if let Some(plain) = plain {
                stream.set_content(plain);
            }
            for (_, value) in stream.dict.iter_mut() {
                decrypt_rc4(key, id, value);
            }
        }
        Object::Array(items) => {
            for item in items.iter_mut() {
                decrypt_rc4(key, id, item);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                decrypt_rc4(key, id, value);
            }
        }
        _ => {}
    }
}

/// Map a y-down box on the unrotated page into the displayed orientation.
fn rotate(bbox: BBox, rotation: u32, width: f64, height: f64) -> BBox {
    let corner = |x: f64, y: f64| match rotation {
        90 => (height - y, x),
        180 => (width - x, height - y),
        270 => (y, width - x),
        _ => (x, y),
    };
    let (ax, ay) = corner(bbox.x0, bbox.y0);
    let (bx, by) = corner(bbox.x1, bbox.y1);
    BBox::new(ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
}

/// Render a raw object value the way it is written in a PDF file.
fn describe(obj: &Object) -> String {
    match obj {
        Object::Null => "null".to_string(),
        Object::Integer(i) => i.to_string(),
        Object::Real(r) => r.to_string(),
        Object::Name(n) => format!("/{}", String::from_utf8_lossy(n)),
        Object::String(bytes, _) => format!("({})", String::from_utf8_lossy(bytes)),
        Object::Reference((number, generation)) => format!("{} {} R", number, generation),
        Object::Array(items) => {
            let inner: Vec<String> = items.iter().map(describe).collect();
            format!("[{}]", inner.join(" "))
        }
        Object::Dictionary(d) => describe_dict(d),
        Object::Stream(s) => format!("{} stream", describe_dict(&s.dict)),
        other => format!("{:?}", other),
    }
}

fn describe_dict(dict: &Dictionary) -> String {
    let entries: Vec<String> = dict
        .iter()
        .map(|(k, v)| format!("/{} {}", String::from_utf8_lossy(k), describe(v)))
        .collect();
    format!("<<{}>>", entries.join(" "))
}

/// Helper to get a string from a PDF dictionary.
fn get_string_from_dict(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => {
            // UTF-16BE with BOM, otherwise UTF-8 or Latin-1
            if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
                let utf16: Vec<u16> = bytes[2..]
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&utf16).ok()
            } else {
                String::from_utf8(bytes.clone())
                    .ok()
                    .or_else(|| Some(bytes.iter().map(|&b| b as char).collect()))
            }
        }
        other => name_of(other),
    }
}

/// Parse a PDF date string (D:YYYYMMDDHHmmSS...).
fn parse_pdf_date(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let s = s.strip_prefix("D:").unwrap_or(s);
    if s.len() < 4 {
        return None;
    }

    let field = |range: std::ops::Range<usize>, default: u32| {
        s.get(range).and_then(|v| v.parse().ok()).unwrap_or(default)
    };
    let year: i32 = s.get(0..4)?.parse().ok()?;

    chrono::NaiveDate::from_ymd_opt(year, field(4..6, 1), field(6..8, 1))
        .and_then(|date| date.and_hms_opt(field(8..10, 0), field(10..12, 0), field(12..14, 0)))
        .map(|dt| chrono::DateTime::from_naive_utc_and_offset(dt, chrono::Utc))
}
