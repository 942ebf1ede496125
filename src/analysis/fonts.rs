//! Font embedding resolution.
//!
//! A simple font points straight at its FontDescriptor. A composite (Type0)
//! font points at one descendant font, which owns the descriptor. The
//! descriptor counts as embedded when it carries any glyph program.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backend::{DocumentAccessor, ObjectRef};

/// Descriptor keys holding an embedded glyph program.
pub const FONT_FILE_KEYS: [&str; 3] = ["FontFile", "FontFile2", "FontFile3"];

/// Composite fonts may delegate once; descendants never nest further.
const MAX_DESCENDANT_DEPTH: u8 = 1;

/// Where a font keeps its descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontLink {
    /// Descriptor reference, `None` when absent or malformed.
    Simple(Option<ObjectRef>),
    /// Type0 font delegating to a descendant.
    Composite(DescendantLink),
}

/// The DescendantFonts entry of a Type0 font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescendantLink {
    Missing,
    /// Present but without any indirect reference in it.
    Unparsable(String),
    Font(ObjectRef),
}

impl DescendantLink {
    fn from_raw(raw: Option<String>) -> Self {
        match raw {
            None => DescendantLink::Missing,
            Some(raw) if raw.trim().is_empty() || raw.trim() == "null" => DescendantLink::Missing,
            Some(raw) => match ObjectRef::find_in(&raw) {
                Some(handle) => DescendantLink::Font(handle),
                None => DescendantLink::Unparsable(raw),
            },
        }
    }
}

impl FontLink {
    /// Read the link of the font object at `handle`.
    pub fn load<A: DocumentAccessor + ?Sized>(doc: &A, handle: ObjectRef) -> Self {
        let subtype = doc.object_key(handle, "Subtype");
        if subtype.as_deref().map(str::trim) == Some("/Type0") {
            FontLink::Composite(DescendantLink::from_raw(
                doc.object_key(handle, "DescendantFonts"),
            ))
        } else {
            FontLink::Simple(ObjectRef::parse_raw(
                doc.object_key(handle, "FontDescriptor").as_deref(),
            ))
        }
    }
}

/// A font as referenced by the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontRef {
    pub handle: ObjectRef,
    pub name: String,
    pub link: FontLink,
}

impl FontRef {
    pub fn load<A: DocumentAccessor + ?Sized>(
        doc: &A,
        handle: ObjectRef,
        name: impl Into<String>,
    ) -> Self {
        Self {
            handle,
            name: name.into(),
            link: FontLink::load(doc, handle),
        }
    }
}

/// Outcome of resolving one font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontStatus {
    pub embedded: bool,
    pub reason: String,
}

impl FontStatus {
    fn missing(reason: impl Into<String>) -> Self {
        Self {
            embedded: false,
            reason: reason.into(),
        }
    }
}

/// A font without embedded glyph data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontViolation {
    pub xref: ObjectRef,
    pub name: String,
    pub reason: String,
}

/// Decide whether `font` carries embedded glyph data. Never fails: every
/// broken link becomes a not-embedded status with a reason.
pub fn resolve<A: DocumentAccessor + ?Sized>(doc: &A, font: &FontRef) -> FontStatus {
    resolve_link(doc, &font.link, 0)
}

fn resolve_link<A: DocumentAccessor + ?Sized>(doc: &A, link: &FontLink, depth: u8) -> FontStatus {
    match link {
        FontLink::Simple(Some(descriptor)) => descriptor_status(doc, *descriptor),
        FontLink::Simple(None) if depth == 0 => FontStatus::missing("missing FontDescriptor"),
        FontLink::Simple(None) => FontStatus::missing("Descendant font missing FontDescriptor"),
        FontLink::Composite(_) if depth >= MAX_DESCENDANT_DEPTH => {
            FontStatus::missing("nested Type0 descendant")
        }
        FontLink::Composite(DescendantLink::Missing) => {
            FontStatus::missing("Type0 missing DescendantFonts")
        }
        FontLink::Composite(DescendantLink::Unparsable(raw)) => {
            FontStatus::missing(format!("cannot parse DescendantFonts: {}", raw))
        }
        FontLink::Composite(DescendantLink::Font(descendant)) => {
            resolve_link(doc, &FontLink::load(doc, *descendant), depth + 1)
        }
    }
}

fn descriptor_status<A: DocumentAccessor + ?Sized>(doc: &A, descriptor: ObjectRef) -> FontStatus {
    FontStatus {
        embedded: has_font_file(doc, descriptor),
        reason: format!("FontDescriptor xref={}", descriptor.number),
    }
}

fn has_font_file<A: DocumentAccessor + ?Sized>(doc: &A, descriptor: ObjectRef) -> bool {
    FONT_FILE_KEYS.iter().any(|key| {
        doc.object_key(descriptor, key)
            .is_some_and(|v| !v.trim().is_empty() && v.trim() != "null")
    })
}

/// Resolve every distinct font once and return the ones not embedded,
/// ordered by handle.
pub fn find_unembedded<A: DocumentAccessor + ?Sized>(
    doc: &A,
    fonts: &BTreeMap<ObjectRef, String>,
    parallel: bool,
) -> Vec<FontViolation> {
    let check = |(handle, name): (&ObjectRef, &String)| {
        let font = FontRef::load(doc, *handle, name.as_str());
        let status = resolve(doc, &font);
        (!status.embedded).then(|| FontViolation {
            xref: font.handle,
            name: font.name,
            reason: status.reason,
        })
    };

    if parallel {
        // rayon collect keeps the map order
        fonts.par_iter().filter_map(check).collect()
    } else {
        fonts.iter().filter_map(check).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryDocument;

    fn r(n: u32) -> ObjectRef {
        ObjectRef::new(n, 0)
    }

    fn status(doc: &MemoryDocument, n: u32) -> FontStatus {
        resolve(doc, &FontRef::load(doc, r(n), "F"))
    }

    #[test]
    fn test_simple_font_with_each_font_file_key() {
        for key in FONT_FILE_KEYS {
            let mut doc = MemoryDocument::new();
            doc.set_key(r(1), "Subtype", "/TrueType");
            doc.set_key(r(1), "FontDescriptor", "2 0 R");
            doc.set_key(r(2), key, "3 0 R");
            let s = status(&doc, 1);
            assert!(s.embedded, "{}", key);
            assert_eq!(s.reason, "FontDescriptor xref=2");
        }
    }

    #[test]
    fn test_simple_font_descriptor_without_glyphs() {
        let mut doc = MemoryDocument::new();
        doc.set_key(r(1), "Subtype", "/Type1");
        doc.set_key(r(1), "FontDescriptor", "7 0 R");
        doc.set_key(r(7), "FontFile2", "null");
        let s = status(&doc, 1);
        assert!(!s.embedded);
        assert_eq!(s.reason, "FontDescriptor xref=7");
    }

    #[test]
    fn test_simple_font_missing_or_malformed_descriptor() {
        for raw in [None, Some("null"), Some("garbage"), Some("[2 0 R]")] {
            let mut doc = MemoryDocument::new();
            doc.set_key(r(1), "Subtype", "/Type1");
            if let Some(raw) = raw {
                doc.set_key(r(1), "FontDescriptor", raw);
            }
            let s = status(&doc, 1);
            assert!(!s.embedded);
            assert_eq!(s.reason, "missing FontDescriptor");
        }
    }

    #[test]
    fn test_type0_resolves_through_descendant() {
        let mut doc = MemoryDocument::new();
        doc.set_key(r(1), "Subtype", "/Type0");
        doc.set_key(r(1), "DescendantFonts", "[5 0 R]");
        doc.set_key(r(5), "Subtype", "/CIDFontType2");
        doc.set_key(r(5), "FontDescriptor", "6 0 R");
        doc.set_key(r(6), "FontFile2", "8 0 R");
        let s = status(&doc, 1);
        assert!(s.embedded);
        assert_eq!(s.reason, "FontDescriptor xref=6");
    }

    #[test]
    fn test_type0_missing_descendant() {
        let mut doc = MemoryDocument::new();
        doc.set_key(r(1), "Subtype", "/Type0");
        let s = status(&doc, 1);
        assert!(!s.embedded);
        assert_eq!(s.reason, "Type0 missing DescendantFonts");

        doc.set_key(r(1), "DescendantFonts", "null");
        assert_eq!(status(&doc, 1).reason, "Type0 missing DescendantFonts");
    }

    #[test]
    fn test_type0_unparsable_descendant() {
        let mut doc = MemoryDocument::new();
        doc.set_key(r(1), "Subtype", "/Type0");
        doc.set_key(r(1), "DescendantFonts", "[<<...>>]");
        let s = status(&doc, 1);
        assert!(!s.embedded);
        assert_eq!(s.reason, "cannot parse DescendantFonts: [<<...>>]");
    }

    #[test]
    fn test_descendant_without_descriptor() {
        let mut doc = MemoryDocument::new();
        doc.set_key(r(1), "Subtype", "/Type0");
        doc.set_key(r(1), "DescendantFonts", "[5 0 R]");
        let s = status(&doc, 1);
        assert!(!s.embedded);
        assert_eq!(s.reason, "Descendant font missing FontDescriptor");
    }

    #[test]
    fn test_nested_type0_stops_at_depth_one() {
        let mut doc = MemoryDocument::new();
        doc.set_key(r(1), "Subtype", "/Type0");
        doc.set_key(r(1), "DescendantFonts", "[1 0 R]");
        let s = status(&doc, 1);
        assert!(!s.embedded);
        assert_eq!(s.reason, "nested Type0 descendant");
    }

    #[test]
    fn test_find_unembedded_orders_by_handle() {
        let mut doc = MemoryDocument::new();
        for n in [3, 9, 12] {
            doc.set_key(r(n), "Subtype", "/Type1");
        }
        doc.set_key(r(9), "FontDescriptor", "10 0 R");
        doc.set_key(r(10), "FontFile", "11 0 R");

        let fonts: BTreeMap<_, _> = [(r(12), "Zapf"), (r(3), "Helvetica"), (r(9), "Garamond")]
            .into_iter()
            .map(|(h, n)| (h, n.to_string()))
            .collect();

        let sequential = find_unembedded(&doc, &fonts, false);
        let parallel = find_unembedded(&doc, &fonts, true);
        assert_eq!(sequential, parallel);
        assert_eq!(
            sequential.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
            vec!["Helvetica", "Zapf"]
        );
        assert_eq!(sequential[0].xref, r(3));
    }
}
