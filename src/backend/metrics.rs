//! Glyph advance widths from font dictionaries.
//!
//! Simple fonts carry `/FirstChar` and `/Widths` (with `/MissingWidth` on
//! the descriptor for codes outside the range). Composite fonts carry the
//! `/W` ranges and `/DW` default on their descendant. Widths are in
//! thousandths of an em. A font with neither falls back to an estimate.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object};

use super::content::{number, resolve, resolve_dict, subtype_is};

/// Advance used when a font has no width table, in thousandths of an em.
const ESTIMATED_WIDTH: f64 = 500.0;

/// `/DW` when a descendant font omits it.
const DEFAULT_CID_WIDTH: f64 = 1000.0;

/// Widths of one font, keyed by character code.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FontMetrics {
    /// 1 for simple fonts, 2 for composite fonts
    pub bytes_per_glyph: usize,
    widths: BTreeMap<u32, f64>,
    /// Width of codes missing from `widths`, `None` to estimate
    default_width: Option<f64>,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self::estimated(1)
    }
}

impl FontMetrics {
    pub fn estimated(bytes_per_glyph: usize) -> Self {
        Self {
            bytes_per_glyph,
            widths: BTreeMap::new(),
            default_width: None,
        }
    }

    /// Read the widths of a font dictionary.
    pub fn load(doc: &Document, font: &Dictionary) -> Self {
        if subtype_is(font, b"Type0") {
            Self::load_composite(doc, font)
        } else {
            Self::load_simple(doc, font)
        }
    }

    fn load_simple(doc: &Document, font: &Dictionary) -> Self {
        let mut metrics = Self::estimated(1);
        let first_char = get_number(doc, font, b"FirstChar").unwrap_or(0.0).max(0.0) as u32;
        if let Some(widths) = get_array(doc, font, b"Widths") {
            for (code, width) in (first_char..).zip(widths) {
                if let Some(w) = resolve(doc, width).and_then(number) {
                    metrics.widths.insert(code, w);
                }
            }
        }
        if !metrics.widths.is_empty() {
            metrics.default_width = font
                .get(b"FontDescriptor")
                .ok()
                .and_then(|d| resolve_dict(doc, d))
                .and_then(|d| get_number(doc, d, b"MissingWidth"));
        }
        metrics
    }

    fn load_composite(doc: &Document, font: &Dictionary) -> Self {
        let mut metrics = Self::estimated(2);
        let descendant = get_array(doc, font, b"DescendantFonts")
            .and_then(|fonts| fonts.first())
            .and_then(|d| resolve_dict(doc, d));
        let Some(descendant) = descendant else {
            return metrics;
        };

        metrics.default_width =
            Some(get_number(doc, descendant, b"DW").unwrap_or(DEFAULT_CID_WIDTH));
        if let Some(w) = get_array(doc, descendant, b"W") {
            metrics.widths = parse_cid_widths(doc, w);
        }
        metrics
    }

    /// Whether the font has real widths.
    pub fn is_measured(&self) -> bool {
        self.default_width.is_some() || !self.widths.is_empty()
    }

    /// Width of `code` in thousandths of an em.
    pub fn width(&self, code: u32) -> f64 {
        self.widths
            .get(&code)
            .copied()
            .or(self.default_width)
            .unwrap_or(ESTIMATED_WIDTH)
    }

    /// Character codes of a shown string.
    pub fn codes<'b>(&self, bytes: &'b [u8]) -> impl Iterator<Item = u32> + 'b {
        bytes
            .chunks(self.bytes_per_glyph.max(1))
            .map(|chunk| chunk.iter().fold(0u32, |code, &b| (code << 8) | u32::from(b)))
    }
}

/// Parse a `/W` array: `c [w1 w2 ...]` runs and `c_first c_last w` ranges.
fn parse_cid_widths(doc: &Document, items: &[Object]) -> BTreeMap<u32, f64> {
    let mut widths = BTreeMap::new();
    let mut i = 0;
    while i < items.len() {
        let Some(first) = resolve(doc, &items[i]).and_then(number) else {
            break;
        };
        let first = first.max(0.0) as u32;
        match items.get(i + 1).and_then(|o| resolve(doc, o)) {
            Some(Object::Array(run)) => {
                for (code, w) in (first..).zip(run) {
                    if let Some(w) = resolve(doc, w).and_then(number) {
                        widths.insert(code, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(w)) = (
                    number(last),
                    items.get(i + 2).and_then(|o| resolve(doc, o)).and_then(number),
                ) else {
                    break;
                };
                // ranges this wide are malformed
                let last = (last.max(0.0) as u32).min(first.saturating_add(0xFFFF));
                for code in first..=last {
                    widths.insert(code, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

fn get_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    dict.get(key).ok().and_then(|o| resolve(doc, o)).and_then(number)
}

fn get_array<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a [Object]> {
    match resolve(doc, dict.get(key).ok()?)? {
        Object::Array(items) => Some(items.as_slice()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_simple_widths_from_first_char() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Subtype" => "Type1",
            "FirstChar" => 65,
            "Widths" => vec![722.into(), 667.into()],
        };
        let metrics = FontMetrics::load(&doc, &font);
        assert_eq!(metrics.bytes_per_glyph, 1);
        assert!(metrics.is_measured());
        assert_eq!(metrics.width(65), 722.0);
        assert_eq!(metrics.width(66), 667.0);
        // outside the table, no MissingWidth
        assert_eq!(metrics.width(90), ESTIMATED_WIDTH);
    }

    #[test]
    fn test_missing_width_from_descriptor() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Subtype" => "TrueType",
            "FirstChar" => 32,
            "Widths" => vec![250.into()],
            "FontDescriptor" => dictionary! { "MissingWidth" => 600 },
        };
        let metrics = FontMetrics::load(&doc, &font);
        assert_eq!(metrics.width(32), 250.0);
        assert_eq!(metrics.width(33), 600.0);
    }

    #[test]
    fn test_font_without_widths_is_estimated() {
        let doc = Document::with_version("1.5");
        let metrics = FontMetrics::load(&doc, &dictionary! { "Subtype" => "Type1" });
        assert!(!metrics.is_measured());
        assert_eq!(metrics.width(65), ESTIMATED_WIDTH);
    }

    #[test]
    fn test_composite_widths() {
        let mut doc = Document::with_version("1.5");
        let descendant = doc.add_object(dictionary! {
            "Subtype" => "CIDFontType2",
            "DW" => 800,
            "W" => vec![
                1.into(),
                vec![Object::Integer(500), Object::Integer(600)].into(),
                10.into(),
                12.into(),
                300.into(),
            ],
        });
        let font = dictionary! {
            "Subtype" => "Type0",
            "DescendantFonts" => vec![descendant.into()],
        };
        let metrics = FontMetrics::load(&doc, &font);
        assert_eq!(metrics.bytes_per_glyph, 2);
        assert_eq!(metrics.width(1), 500.0);
        assert_eq!(metrics.width(2), 600.0);
        assert_eq!(metrics.width(11), 300.0);
        assert_eq!(metrics.width(3), 800.0);
    }

    #[test]
    fn test_composite_default_width() {
        let mut doc = Document::with_version("1.5");
        let descendant = doc.add_object(dictionary! { "Subtype" => "CIDFontType0" });
        let font = dictionary! {
            "Subtype" => "Type0",
            "DescendantFonts" => vec![descendant.into()],
        };
        assert_eq!(FontMetrics::load(&doc, &font).width(7), 1000.0);
    }

    #[test]
    fn test_codes_by_glyph_size() {
        let simple = FontMetrics::estimated(1);
        assert_eq!(simple.codes(b"AB").collect::<Vec<_>>(), vec![65, 66]);
        let composite = FontMetrics::estimated(2);
        assert_eq!(
            composite.codes(&[0x01, 0x02, 0x00, 0x41]).collect::<Vec<_>>(),
            vec![0x0102, 0x41]
        );
    }
}
