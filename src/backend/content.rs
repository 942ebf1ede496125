//! Content stream interpretation for block geometry and image placements.
//!
//! Walks page (and form XObject) operators tracking the CTM and text state
//! closely enough to place text runs and images on the page. Text runs are
//! measured with the font's width table when it has one.

use std::collections::{HashMap, HashSet};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};

use super::metrics::FontMetrics;
use super::{BBox, ContentBlock, FontUse, ImageInfo, ObjectRef};

const ASCENT_EM: f64 = 0.8;
const DESCENT_EM: f64 = 0.2;
/// Nested form XObjects deeper than this are not entered.
const MAX_FORM_DEPTH: usize = 8;

const UNIT_SQUARE: [(f64, f64); 4] = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];

/// Every content stream operator. Anything else outside `BX`/`EX` means the
/// bytes are not content.
const OPERATORS: &[&str] = &[
    "b", "B", "b*", "B*", "BDC", "BI", "BMC", "BT", "BX", "c", "cm", "CS", "cs", "d", "d0", "d1",
    "Do", "DP", "EI", "EMC", "ET", "EX", "f", "F", "f*", "G", "g", "gs", "h", "i", "ID", "j", "J",
    "K", "k", "l", "m", "M", "MP", "n", "q", "Q", "re", "RG", "rg", "ri", "s", "S", "SC", "sc",
    "SCN", "scn", "sh", "T*", "Tc", "Td", "TD", "Tf", "Tj", "TJ", "TL", "Tm", "Tr", "Ts", "Tw",
    "Tz", "v", "w", "W", "W*", "y", "'", "\"",
];

/// Affine transform in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        if operands.len() < 6 {
            return None;
        }
        Some(Matrix {
            a: number(&operands[0])?,
            b: number(&operands[1])?,
            c: number(&operands[2])?,
            d: number(&operands[3])?,
            e: number(&operands[4])?,
            f: number(&operands[5])?,
        })
    }

    fn translation(tx: f64, ty: f64) -> Matrix {
        Matrix {
            e: tx,
            f: ty,
            ..Matrix::IDENTITY
        }
    }

    /// `self` followed by `other`.
    fn concat(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }
}

/// Graphics state entries that `q`/`Q` save and restore.
#[derive(Debug, Clone, Copy)]
struct GraphicsState {
    ctm: Matrix,
    font_size: f64,
    leading: f64,
    h_scale: f64,
    char_spacing: f64,
    word_spacing: f64,
    /// Index into the walker's font metrics
    font: Option<usize>,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            font_size: 12.0,
            leading: 0.0,
            h_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            font: None,
        }
    }
}

/// Everything extracted from one page's content.
#[derive(Debug, Default)]
pub(crate) struct PageLayout {
    pub blocks: Vec<ContentBlock>,
    pub fonts: Vec<FontUse>,
    pub images: Vec<ImageInfo>,
    /// (image, displayed width and height in points) per `Do`
    pub placements: Vec<(ObjectRef, (f64, f64))>,
    /// Content that could not be read, so its geometry is missing
    pub anomalies: Vec<String>,
}

/// Interprets content streams of a single page.
pub(crate) struct LayoutWalker<'a> {
    doc: &'a Document,
    /// Page box in default user space
    frame: BBox,
    layout: PageLayout,
    seen_fonts: HashSet<ObjectRef>,
    seen_images: HashSet<ObjectRef>,
    metrics: Vec<FontMetrics>,
    metrics_by_font: HashMap<ObjectRef, usize>,
}

impl<'a> LayoutWalker<'a> {
    pub fn new(doc: &'a Document, frame: BBox) -> Self {
        Self {
            doc,
            frame,
            layout: PageLayout::default(),
            seen_fonts: HashSet::new(),
            seen_images: HashSet::new(),
            metrics: Vec::new(),
            metrics_by_font: HashMap::new(),
        }
    }

    pub fn walk_page(mut self, content: &[u8], resources: Option<&'a Dictionary>) -> PageLayout {
        self.register_resources(resources);
        self.walk(content, resources, Matrix::IDENTITY, 0);
        self.layout
    }

    /// Record content that could not be interpreted.
    fn anomaly(&mut self, message: impl Into<String>) {
        self.layout.anomalies.push(message.into());
    }

    /// Record every font and image a resource dictionary declares, drawn or not.
    fn register_resources(&mut self, resources: Option<&'a Dictionary>) {
        if let Some(fonts) = sub_dictionary(self.doc, resources, b"Font") {
            for (name, obj) in fonts.iter() {
                let Object::Reference(id) = obj else {
                    log::debug!(
                        "skipping inline font dictionary /{}",
                        String::from_utf8_lossy(name)
                    );
                    continue;
                };
                let handle = ObjectRef::from(*id);
                if !self.seen_fonts.insert(handle) {
                    continue;
                }
                let display = resolve_dict(self.doc, obj)
                    .and_then(|font| font.get(b"BaseFont").ok())
                    .and_then(name_of)
                    .unwrap_or_else(|| String::from_utf8_lossy(name).to_string());
                self.layout.fonts.push(FontUse {
                    handle,
                    name: display,
                });
            }
        }

        if let Some(xobjects) = sub_dictionary(self.doc, resources, b"XObject") {
            for (_, obj) in xobjects.iter() {
                if let (Object::Reference(id), Some(Object::Stream(stream))) =
                    (obj, resolve(self.doc, obj))
                {
                    if subtype_is(&stream.dict, b"Image") {
                        self.register_image(ObjectRef::from(*id), stream);
                    }
                }
            }
        }
    }

    fn register_image(&mut self, handle: ObjectRef, stream: &Stream) {
        if !self.seen_images.insert(handle) {
            return;
        }
        let dim = |key: &[u8]| {
            stream
                .dict
                .get(key)
                .ok()
                .and_then(|o| resolve(self.doc, o))
                .and_then(number)
                .filter(|v| *v >= 1.0)
                .map(|v| v as u32)
        };
        let (Some(pixel_width), Some(pixel_height)) = (dim(b"Width"), dim(b"Height")) else {
            log::debug!("image {} has no usable pixel dimensions", handle);
            return;
        };
        let colorspace = stream
            .dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|cs| resolve(self.doc, cs))
            .and_then(|cs| match cs {
                Object::Array(items) => items.first().and_then(name_of),
                other => name_of(other),
            })
            .unwrap_or_default();
        self.layout.images.push(ImageInfo {
            handle,
            pixel_width,
            pixel_height,
            colorspace,
        });
    }

    fn walk(&mut self, content: &[u8], resources: Option<&'a Dictionary>, base: Matrix, depth: usize) {
        let operations = match Content::decode(content) {
            Ok(c) => c.operations,
            Err(e) => {
                self.anomaly(format!("unreadable content stream: {}", e));
                return;
            }
        };
        if let Some(problem) = check_operators(content, &operations) {
            self.anomaly(format!("unreadable content stream: {}", problem));
            return;
        }

        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut gs = GraphicsState::new(base);
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in &operations {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => stack.push(gs),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        gs.ctm = m.concat(&gs.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let Some(Object::Name(font)) = operands.first() {
                        gs.font = self.select_font(resources, font);
                    }
                    if let Some(size) = operands.get(1).and_then(number) {
                        gs.font_size = size;
                    }
                }
                "TL" => {
                    if let Some(leading) = operands.first().and_then(number) {
                        gs.leading = leading;
                    }
                }
                "Tc" => {
                    if let Some(spacing) = operands.first().and_then(number) {
                        gs.char_spacing = spacing;
                    }
                }
                "Tw" => {
                    if let Some(spacing) = operands.first().and_then(number) {
                        gs.word_spacing = spacing;
                    }
                }
                "Tz" => {
                    if let Some(scale) = operands.first().and_then(number) {
                        gs.h_scale = scale / 100.0;
                    }
                }
                "Td" | "TD" => {
                    if let (Some(tx), Some(ty)) = (
                        operands.first().and_then(number),
                        operands.get(1).and_then(number),
                    ) {
                        if op.operator == "TD" {
                            gs.leading = -ty;
                        }
                        tlm = Matrix::translation(tx, ty).concat(&tlm);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translation(0.0, -gs.leading).concat(&tlm);
                    tm = tlm;
                }
                "Tj" | "'" | "\"" => {
                    if op.operator != "Tj" {
                        tlm = Matrix::translation(0.0, -gs.leading).concat(&tlm);
                        tm = tlm;
                    }
                    if op.operator == "\"" {
                        if let (Some(aw), Some(ac)) = (
                            operands.first().and_then(number),
                            operands.get(1).and_then(number),
                        ) {
                            gs.word_spacing = aw;
                            gs.char_spacing = ac;
                        }
                    }
                    let index = if op.operator == "\"" { 2 } else { 0 };
                    if let Some(Object::String(bytes, _)) = operands.get(index) {
                        let (advance, visible) = self.run_advance(bytes, &gs);
                        self.show_text(&mut tm, &gs, advance, visible);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let mut advance = 0.0;
                        let mut visible = false;
                        for item in items {
                            match item {
                                Object::String(bytes, _) => {
                                    let (w, v) = self.run_advance(bytes, &gs);
                                    advance += w;
                                    visible |= v;
                                }
                                other => {
                                    if let Some(adjust) = number(other) {
                                        advance -= adjust / 1000.0 * gs.font_size * gs.h_scale;
                                    }
                                }
                            }
                        }
                        self.show_text(&mut tm, &gs, advance, visible);
                    }
                }
                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.draw_xobject(resources, name, gs.ctm, depth);
                    }
                }
                _ => {}
            }
        }
    }

    /// Horizontal advance of a shown string in text space, and whether it
    /// has any visible glyph.
    fn run_advance(&self, bytes: &[u8], gs: &GraphicsState) -> (f64, bool) {
        let fallback = FontMetrics::default();
        let metrics = gs.font.and_then(|i| self.metrics.get(i)).unwrap_or(&fallback);
        let single_byte = metrics.bytes_per_glyph == 1;

        let mut advance = 0.0;
        for code in metrics.codes(bytes) {
            advance += metrics.width(code) / 1000.0 * gs.font_size + gs.char_spacing;
            if single_byte && code == 32 {
                advance += gs.word_spacing;
            }
        }
        let visible = if single_byte {
            bytes.iter().any(|b| !b.is_ascii_whitespace())
        } else {
            !bytes.is_empty()
        };
        (advance * gs.h_scale, visible)
    }

    fn show_text(&mut self, tm: &mut Matrix, gs: &GraphicsState, advance: f64, visible: bool) {
        let size = gs.font_size;
        if visible && advance != 0.0 {
            let trm = tm.concat(&gs.ctm);
            let corners = [
                (0.0, -DESCENT_EM * size),
                (advance, -DESCENT_EM * size),
                (0.0, ASCENT_EM * size),
                (advance, ASCENT_EM * size),
            ];
            let bbox = self.to_page(&trm, &corners);
            self.layout.blocks.push(ContentBlock::text(bbox));
        }
        *tm = Matrix::translation(advance, 0.0).concat(tm);
    }

    fn draw_xobject(
        &mut self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
        ctm: Matrix,
        depth: usize,
    ) {
        let Some(entry) =
            sub_dictionary(self.doc, resources, b"XObject").and_then(|x| x.get(name).ok())
        else {
            log::debug!("XObject /{} not in resources", String::from_utf8_lossy(name));
            return;
        };
        let Some(Object::Stream(stream)) = resolve(self.doc, entry) else {
            return;
        };

        if subtype_is(&stream.dict, b"Image") {
            let bbox = self.to_page(&ctm, &UNIT_SQUARE);
            self.layout.blocks.push(ContentBlock::image(bbox));
            if let Object::Reference(id) = entry {
                let handle = ObjectRef::from(*id);
                self.register_image(handle, stream);
                self.layout
                    .placements
                    .push((handle, (bbox.width(), bbox.height())));
            }
        } else if subtype_is(&stream.dict, b"Form") {
            if depth >= MAX_FORM_DEPTH {
                log::debug!("form XObject nesting deeper than {}", MAX_FORM_DEPTH);
                return;
            }
            let matrix = stream
                .dict
                .get(b"Matrix")
                .ok()
                .and_then(|m| m.as_array().ok())
                .and_then(|items| Matrix::from_operands(items))
                .unwrap_or(Matrix::IDENTITY);
            let form_resources = stream
                .dict
                .get(b"Resources")
                .ok()
                .and_then(|r| resolve_dict(self.doc, r))
                .or(resources);
            self.register_resources(form_resources);
            match stream_content(stream) {
                Ok(content) => self.walk(&content, form_resources, matrix.concat(&ctm), depth + 1),
                Err(e) => self.anomaly(format!(
                    "form XObject /{}: {}",
                    String::from_utf8_lossy(name),
                    e
                )),
            }
        }
    }

    /// Metrics of the font named `font` in `resources`, loaded once per
    /// indirect font.
    fn select_font(&mut self, resources: Option<&'a Dictionary>, font: &[u8]) -> Option<usize> {
        let entry = sub_dictionary(self.doc, resources, b"Font")?.get(font).ok()?;
        let handle = match entry {
            Object::Reference(id) => Some(ObjectRef::from(*id)),
            _ => None,
        };
        if let Some(index) = handle.and_then(|h| self.metrics_by_font.get(&h)) {
            return Some(*index);
        }

        let metrics = FontMetrics::load(self.doc, resolve_dict(self.doc, entry)?);
        if !metrics.is_measured() {
            log::debug!(
                "font /{} has no widths, estimating",
                String::from_utf8_lossy(font)
            );
        }
        let index = self.metrics.len();
        self.metrics.push(metrics);
        if let Some(handle) = handle {
            self.metrics_by_font.insert(handle, index);
        }
        Some(index)
    }

    /// Bounding box of `points` under `m`, in top-left page coordinates.
    fn to_page(&self, m: &Matrix, points: &[(f64, f64)]) -> BBox {
        let mut out = BBox::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for &(x, y) in points {
            let (ux, uy) = m.apply(x, y);
            let px = ux - self.frame.x0;
            let py = self.frame.y1 - uy;
            out = out.union(&BBox::new(px, py, px, py));
        }
        out
    }
}

/// The parser stops quietly at the first thing it cannot read, so a stream
/// that is not content comes back as no operations or as unknown ones.
fn check_operators(content: &[u8], operations: &[Operation]) -> Option<String> {
    if operations.is_empty() {
        return content
            .iter()
            .any(|b| !b.is_ascii_whitespace())
            .then(|| "no operators".to_string());
    }
    let mut compat = 0usize;
    for op in operations {
        match op.operator.as_str() {
            "BX" => compat += 1,
            "EX" => compat = compat.saturating_sub(1),
            other if compat == 0 && !OPERATORS.contains(&other) => {
                return Some(format!("unknown operator {:?}", other));
            }
            _ => {}
        }
    }
    None
}

/// Decoded bytes of a stream. Unfiltered streams are returned as stored.
pub(crate) fn stream_content(stream: &Stream) -> Result<Vec<u8>, String> {
    if stream.dict.get(b"Filter").is_err() {
        return Ok(stream.content.clone());
    }
    let data = stream
        .decompressed_content()
        .map_err(|e| format!("undecodable stream: {}", e))?;
    // a corrupt Flate stream decodes to nothing rather than failing
    if data.is_empty() && !stream.content.is_empty() {
        return Err("undecodable stream: no data after decoding".to_string());
    }
    Ok(data)
}

pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

pub(crate) fn name_of(obj: &Object) -> Option<String> {
    match obj {
        Object::Name(n) => Some(String::from_utf8_lossy(n).to_string()),
        _ => None,
    }
}

/// Follow one level of indirection.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Dictionary behind `obj`, including a stream's dictionary.
pub(crate) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

fn sub_dictionary<'a>(
    doc: &'a Document,
    resources: Option<&'a Dictionary>,
    key: &[u8],
) -> Option<&'a Dictionary> {
    resources?
        .get(key)
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
}

pub(crate) fn subtype_is(dict: &Dictionary, subtype: &[u8]) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n.as_slice() == subtype)
}
