use crate::error::Result;
use crate::geometry::{BBox, Matrix};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;

/// US Letter, used when a page has no readable MediaBox
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);
/// Advance for glyphs missing from a font's Widths array, in text space units
const DEFAULT_GLYPH_WIDTH: f32 = 0.5;
/// A TJ adjustment beyond this (thousandths of an em) is treated as a word break
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// One shown string with its resolved font and placement on the page.
#[derive(Debug, Clone)]
pub struct TextRun {
    pub text: String,
    pub font_name: String,
    /// Font size scaled by the text rendering matrix
    pub size: f32,
    /// Non-whitespace glyphs in `text`
    pub glyphs: usize,
    pub x0: f32,
    pub x1: f32,
    pub baseline: f32,
}

/// Raw geometry of a single page: its text runs in content-stream order plus figure regions.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// 1-based page number
    pub number: u32,
    pub width: f32,
    /// Top edge of the MediaBox
    pub height: f32,
    pub runs: Vec<TextRun>,
    pub figures: Vec<BBox>,
}

pub fn is_bold_font(font_name: &str) -> bool {
    let font_lower = font_name.to_lowercase();
    font_lower.contains("bold") || font_lower.contains("black")
}

// Interpret every page's content stream. Any undecodable page fails the whole document.
pub fn extract_pages(doc: &Document) -> Result<Vec<PageContent>> {
    let mut pages = Vec::new();

    for (number, page_id) in doc.get_pages() {
        let fonts = page_fonts(doc, page_id);
        let content = Content::decode(&doc.get_page_content(page_id)?)?;
        let (width, height) = media_box(doc, page_id);

        let mut interpreter = Interpreter::new(&fonts);
        interpreter.run(&content.operations);

        pages.push(PageContent {
            number,
            width,
            height,
            runs: interpreter.runs,
            figures: interpreter.figures,
        });
    }

    Ok(pages)
}

/// Enough of a font dictionary to turn shown bytes into text and advances.
#[derive(Debug, Clone, Default)]
struct FontMetrics {
    base_name: String,
    first_char: i64,
    widths: Vec<f32>,
    two_byte: bool,
    /// Type0 advances by CID, from the descendant's `/W`
    cid_widths: HashMap<u32, f32>,
    /// Descendant `/DW`
    default_width: f32,
    /// Byte to character for simple fonts, empty for Type0
    encoding: Vec<Option<char>>,
    to_unicode: HashMap<u32, String>,
}

impl FontMetrics {
    fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let base_name = font
            .get(b"BaseFont")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default();
        let two_byte =
            font.get(b"Subtype").ok().and_then(|o| o.as_name().ok()) == Some(b"Type0".as_slice());
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);
        let widths = font
            .get(b"Widths")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .map(|items| {
                items
                    .iter()
                    .map(|w| resolve(doc, w).and_then(number).unwrap_or(0.0))
                    .collect()
            })
            .unwrap_or_default();

        let (cid_widths, default_width) = if two_byte {
            cid_widths(doc, font)
        } else {
            (HashMap::new(), 0.0)
        };
        let encoding = if two_byte {
            Vec::new()
        } else {
            simple_encoding(doc, font)
        };

        Self {
            base_name,
            first_char,
            widths,
            two_byte,
            cid_widths,
            default_width,
            encoding,
            to_unicode: to_unicode_map(doc, font),
        }
    }

    fn glyph_width(&self, code: u32) -> f32 {
        let width = if self.two_byte {
            self.cid_widths.get(&code).copied().unwrap_or(self.default_width)
        } else {
            let index = i64::from(code) - self.first_char;
            usize::try_from(index)
                .ok()
                .and_then(|i| self.widths.get(i))
                .map_or(0.0, |w| w / 1000.0)
        };
        if width > 0.0 {
            width
        } else {
            DEFAULT_GLYPH_WIDTH
        }
    }

    /// Character codes in a shown string: big-endian pairs for Type0 (Identity-H), bytes otherwise.
    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes.chunks(2).map(code_of).collect()
        } else {
            bytes.iter().map(|&b| u32::from(b)).collect()
        }
    }

    fn push_text(&self, code: u32, text: &mut String) {
        if let Some(mapped) = self.to_unicode.get(&code) {
            text.push_str(mapped);
        } else if self.two_byte {
            text.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
        } else if self.encoding.is_empty() {
            // no font dictionary at all: read the byte as Latin-1
            text.extend(u8::try_from(code).ok().map(char::from));
        } else {
            let mapped = usize::try_from(code).ok().and_then(|i| self.encoding.get(i));
            text.extend(mapped.copied().flatten());
        }
    }
}

/// Upper bound on codes expanded from a single CMap or `/W` range
const MAX_CODE_RANGE: u32 = 0xFFFF;

const BASE_ENCODINGS: [&str; 4] = [
    "StandardEncoding",
    "WinAnsiEncoding",
    "MacRomanEncoding",
    "MacExpertEncoding",
];

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

fn utf16_text(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|unit| unit.iter().fold(0u16, |acc, b| (acc << 8) | u16::from(*b)))
        .collect()
}

// Base table from lopdf's named encodings, then `/Differences` applied on top
fn simple_encoding(doc: &Document, font: &Dictionary) -> Vec<Option<char>> {
    let (base, differences) = match font.get(b"Encoding").ok().and_then(|o| resolve(doc, o)) {
        Some(Object::Dictionary(dict)) => (
            dict.get(b"BaseEncoding")
                .and_then(Object::as_name_str)
                .unwrap_or("StandardEncoding"),
            dict.get(b"Differences")
                .ok()
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok()),
        ),
        Some(Object::Name(name)) => (std::str::from_utf8(name).unwrap_or_default(), None),
        _ => ("StandardEncoding", None),
    };
    let base = if BASE_ENCODINGS.contains(&base) {
        base
    } else {
        "StandardEncoding"
    };

    let mut table: Vec<Option<char>> = (0u8..=255)
        .map(|byte| Document::decode_text(Some(base), &[byte]).chars().next())
        .collect();

    let mut code = 0usize;
    for item in differences.into_iter().flatten() {
        match item {
            Object::Integer(start) => code = usize::try_from(*start).unwrap_or(usize::MAX),
            Object::Name(name) => {
                if let Some(slot) = table.get_mut(code) {
                    *slot = glyph_char(&String::from_utf8_lossy(name));
                }
                code = code.saturating_add(1);
            }
            _ => {}
        }
    }
    table
}

fn glyph_char(name: &str) -> Option<char> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(c);
    }
    let from_hex = name
        .strip_prefix("uni")
        .or_else(|| name.strip_prefix('u'))
        .filter(|hex| (4..=6).contains(&hex.len()))
        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
        .and_then(char::from_u32);
    if from_hex.is_some() {
        return from_hex;
    }

    let c = match name {
        "space" | "nbspace" => ' ',
        "exclam" => '!',
        "quotedbl" => '"',
        "numbersign" => '#',
        "dollar" => '$',
        "percent" => '%',
        "ampersand" => '&',
        "quotesingle" => '\'',
        "parenleft" => '(',
        "parenright" => ')',
        "asterisk" => '*',
        "plus" => '+',
        "comma" => ',',
        "hyphen" | "minus" => '-',
        "period" => '.',
        "slash" => '/',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "colon" => ':',
        "semicolon" => ';',
        "less" => '<',
        "equal" => '=',
        "greater" => '>',
        "question" => '?',
        "at" => '@',
        "bracketleft" => '[',
        "backslash" => '\\',
        "bracketright" => ']',
        "underscore" => '_',
        "bullet" => '\u{2022}',
        "endash" => '\u{2013}',
        "emdash" => '\u{2014}',
        "quoteleft" => '\u{2018}',
        "quoteright" => '\u{2019}',
        "quotedblleft" => '\u{201C}',
        "quotedblright" => '\u{201D}',
        "ellipsis" => '\u{2026}',
        "periodcentered" => '\u{B7}',
        "section" => '\u{A7}',
        "degree" => '\u{B0}',
        "copyright" => '\u{A9}',
        "registered" => '\u{AE}',
        "fi" => '\u{FB01}',
        "fl" => '\u{FB02}',
        "agrave" => '\u{E0}',
        "adieresis" => '\u{E4}',
        "ccedilla" => '\u{E7}',
        "egrave" => '\u{E8}',
        "eacute" => '\u{E9}',
        "ntilde" => '\u{F1}',
        "odieresis" => '\u{F6}',
        "udieresis" => '\u{FC}',
        "germandbls" => '\u{DF}',
        _ => return None,
    };
    Some(c)
}

// `/W` entries are either `c [w1 w2 ...]` or `c_first c_last w`
fn cid_widths(doc: &Document, font: &Dictionary) -> (HashMap<u32, f32>, f32) {
    let mut widths = HashMap::new();
    let Some(descendant) = font
        .get(b"DescendantFonts")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
        .and_then(|fonts| fonts.first())
        .and_then(|o| resolve_dict(doc, o))
    else {
        return (widths, 1.0);
    };

    let default_width = descendant
        .get(b"DW")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(number)
        .unwrap_or(1000.0)
        / 1000.0;

    let items = descendant
        .get(b"W")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
        .map(Vec::as_slice)
        .unwrap_or_default();
    let value = |i: usize| items.get(i).and_then(|o| resolve(doc, o));

    let mut i = 0;
    while let Some(first) = value(i).and_then(number) {
        let first = first as u32;
        match value(i + 1) {
            Some(Object::Array(list)) => {
                for (cid, w) in (first..).zip(list) {
                    if let Some(w) = resolve(doc, w).and_then(number) {
                        widths.insert(cid, w / 1000.0);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(w)) = (number(last), value(i + 2).and_then(number)) else {
                    break;
                };
                let last = (last as u32).min(first.saturating_add(MAX_CODE_RANGE));
                for cid in first..=last {
                    widths.insert(cid, w / 1000.0);
                }
                i += 3;
            }
            None => break,
        }
    }
    (widths, default_width)
}

// bfchar and bfrange sections of a ToUnicode CMap. The CMap is PostScript-shaped, so after
// dropping comments lopdf's content parser reads each section as one operation.
fn to_unicode_map(doc: &Document, font: &Dictionary) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    let Some(stream) = font
        .get(b"ToUnicode")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_stream().ok())
    else {
        return map;
    };
    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let Ok(cmap) = Content::decode(&strip_comments(&data)) else {
        log::debug!("unreadable ToUnicode CMap, falling back to the font encoding");
        return map;
    };

    for op in &cmap.operations {
        match op.operator.as_str() {
            "endbfchar" => {
                for pair in op.operands.chunks_exact(2) {
                    if let [Object::String(src, _), Object::String(dst, _)] = pair {
                        map.insert(code_of(src), utf16_text(dst));
                    }
                }
            }
            "endbfrange" => {
                for entry in op.operands.chunks_exact(3) {
                    let [Object::String(lo, _), Object::String(hi, _), dst] = entry else {
                        continue;
                    };
                    let (lo, hi) = (code_of(lo), code_of(hi));
                    if hi < lo || hi - lo > MAX_CODE_RANGE {
                        continue;
                    }
                    match dst {
                        Object::String(start, _) => {
                            let mut units = utf16_units(start);
                            for code in lo..=hi {
                                map.insert(code, String::from_utf16_lossy(&units));
                                if let Some(last) = units.last_mut() {
                                    *last = last.wrapping_add(1);
                                }
                            }
                        }
                        Object::Array(targets) => {
                            for (code, target) in (lo..=hi).zip(targets) {
                                if let Object::String(dst, _) = target {
                                    map.insert(code, utf16_text(dst));
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    map
}

fn strip_comments(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut in_comment = false;
    for &byte in data {
        match byte {
            b'\r' | b'\n' => {
                in_comment = false;
                out.push(byte);
            }
            b'%' => in_comment = true,
            _ if !in_comment => out.push(byte),
            _ => {}
        }
    }
    out
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn numbers(operands: &[Object]) -> Option<Vec<f32>> {
    operands.iter().map(number).collect()
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, object).and_then(|o| o.as_dict().ok())
}

// Page attributes such as Resources and MediaBox may live on any ancestor Pages node
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..64 {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value);
        }
        node = resolve_dict(doc, node.get(b"Parent").ok()?)?;
    }
    None
}

fn media_box(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    inherited(doc, page_id, b"MediaBox")
        .and_then(|o| o.as_array().ok())
        .and_then(|values| {
            let corners: Vec<f32> = values
                .iter()
                .filter_map(|v| resolve(doc, v).and_then(number))
                .collect();
            match corners.as_slice() {
                [x0, _, x1, y1] => Some(((x1 - x0).abs(), *y1)),
                _ => None,
            }
        })
        .filter(|(width, height)| *width > 0.0 && *height > 0.0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

fn page_fonts(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, FontMetrics> {
    let mut fonts = HashMap::new();
    let Some(resources) = inherited(doc, page_id, b"Resources").and_then(|o| o.as_dict().ok())
    else {
        return fonts;
    };
    let Some(font_dict) = resources.get(b"Font").ok().and_then(|o| resolve_dict(doc, o)) else {
        return fonts;
    };

    for (name, value) in font_dict.iter() {
        if let Some(font) = resolve_dict(doc, value) {
            fonts.insert(name.clone(), FontMetrics::from_dict(doc, font));
        }
    }
    fonts
}

#[derive(Debug, Clone)]
struct TextState {
    font: Vec<u8>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: Vec::new(),
            size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

struct Interpreter<'a> {
    fonts: &'a HashMap<Vec<u8>, FontMetrics>,
    ctm: Matrix,
    state: TextState,
    saved: Vec<(Matrix, TextState)>,
    tm: Matrix,
    tlm: Matrix,
    runs: Vec<TextRun>,
    figures: Vec<BBox>,
}

impl<'a> Interpreter<'a> {
    fn new(fonts: &'a HashMap<Vec<u8>, FontMetrics>) -> Self {
        Self {
            fonts,
            ctm: Matrix::IDENTITY,
            state: TextState::default(),
            saved: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            runs: Vec::new(),
            figures: Vec::new(),
        }
    }

    fn run(&mut self, operations: &[Operation]) {
        for op in operations {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => self.saved.push((self.ctm, self.state.clone())),
                "Q" => {
                    if let Some((ctm, state)) = self.saved.pop() {
                        self.ctm = ctm;
                        self.state = state;
                    }
                }
                "cm" => {
                    if let Some([a, b, c, d, e, f]) = numbers(operands).as_deref() {
                        self.ctm = Matrix::new(*a, *b, *c, *d, *e, *f).then(&self.ctm);
                    }
                }
                "BT" => {
                    self.tm = Matrix::IDENTITY;
                    self.tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let [name, size] = operands {
                        if let Ok(name) = name.as_name() {
                            self.state.font = name.to_vec();
                        }
                        if let Some(size) = number(size) {
                            self.state.size = size;
                        }
                    }
                }
                "Tc" => self.set_state(operands, |s, v| s.char_spacing = v),
                "Tw" => self.set_state(operands, |s, v| s.word_spacing = v),
                "Tz" => self.set_state(operands, |s, v| s.h_scale = v / 100.0),
                "TL" => self.set_state(operands, |s, v| s.leading = v),
                "Ts" => self.set_state(operands, |s, v| s.rise = v),
                "Td" | "TD" => {
                    if let Some([tx, ty]) = numbers(operands).as_deref() {
                        if op.operator == "TD" {
                            self.state.leading = -ty;
                        }
                        self.move_line(*tx, *ty);
                    }
                }
                "Tm" => {
                    if let Some([a, b, c, d, e, f]) = numbers(operands).as_deref() {
                        self.tlm = Matrix::new(*a, *b, *c, *d, *e, *f);
                        self.tm = self.tlm;
                    }
                }
                "T*" => self.move_line(0.0, -self.state.leading),
                "Tj" => self.show(operands),
                "TJ" => {
                    if let Some(Ok(items)) = operands.first().map(Object::as_array) {
                        self.show(items);
                    }
                }
                "'" => {
                    self.move_line(0.0, -self.state.leading);
                    self.show(operands);
                }
                "\"" => {
                    if let [aw, ac, text] = operands {
                        self.state.word_spacing = number(aw).unwrap_or(0.0);
                        self.state.char_spacing = number(ac).unwrap_or(0.0);
                        self.move_line(0.0, -self.state.leading);
                        self.show(std::slice::from_ref(text));
                    }
                }
                "Do" => {
                    let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]
                        .map(|(x, y)| self.ctm.apply(x, y));
                    self.figures.push(BBox::from_points(&corners));
                }
                _ => {}
            }
        }
    }

    fn set_state(&mut self, operands: &[Object], apply: impl FnOnce(&mut TextState, f32)) {
        if let Some(value) = operands.first().and_then(number) {
            apply(&mut self.state, value);
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn advance(&mut self, tx: f32) {
        self.tm = Matrix::translate(tx, 0.0).then(&self.tm);
    }

    fn origin(&self) -> (f32, f32) {
        Matrix::translate(0.0, self.state.rise)
            .then(&self.tm)
            .then(&self.ctm)
            .apply(0.0, 0.0)
    }

    fn show(&mut self, parts: &[Object]) {
        let fonts = self.fonts;
        let fallback = FontMetrics::default();
        let font = fonts.get(&self.state.font).unwrap_or(&fallback);

        let start = self.origin();
        let size = self.state.size * self.tm.then(&self.ctm).vertical_scale();
        let mut text = String::new();
        let mut glyphs = 0;

        for part in parts {
            match part {
                Object::String(bytes, _) => {
                    for code in font.codes(bytes) {
                        let mut tx = font.glyph_width(code) * self.state.size + self.state.char_spacing;
                        if code == 32 && !font.two_byte {
                            tx += self.state.word_spacing;
                        }
                        self.advance(tx * self.state.h_scale);
                        let shown = text.len();
                        font.push_text(code, &mut text);
                        if text[shown..].chars().any(|c| !c.is_whitespace()) {
                            glyphs += 1;
                        }
                    }
                }
                other => {
                    if let Some(adjust) = number(other) {
                        self.advance(-adjust / 1000.0 * self.state.size * self.state.h_scale);
                        if adjust < -TJ_SPACE_THRESHOLD && !text.is_empty() && !text.ends_with(' ') {
                            text.push(' ');
                        }
                    }
                }
            }
        }

        if glyphs == 0 {
            return;
        }
        let end = self.origin();
        self.runs.push(TextRun {
            text,
            font_name: font.base_name.clone(),
            size,
            glyphs,
            x0: start.0.min(end.0),
            x1: start.0.max(end.0),
            baseline: start.1,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream, StringFormat};

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    fn interpret(operations: Vec<Operation>) -> (Vec<TextRun>, Vec<BBox>) {
        let mut fonts = HashMap::new();
        fonts.insert(
            b"F1".to_vec(),
            FontMetrics {
                base_name: "Helvetica-Bold".to_string(),
                ..FontMetrics::default()
            },
        );
        let mut interpreter = Interpreter::new(&fonts);
        interpreter.run(&operations);
        (interpreter.runs, interpreter.figures)
    }

    #[test]
    fn bold_detection_uses_font_name() {
        assert!(is_bold_font("ABCDEF+Arial-BoldMT"));
        assert!(is_bold_font("Helvetica-Black"));
        assert!(!is_bold_font("Times-Roman"));
    }

    #[test]
    fn tracks_text_position_and_scale() {
        let (runs, _) = interpret(vec![
            op("cm", vec![2.into(), 0.into(), 0.into(), 2.into(), 0.into(), 0.into()]),
            op("BT", vec![]),
            op("Tf", vec!["F1".into(), 10.into()]),
            op("Td", vec![50.into(), 300.into()]),
            op("Tj", vec![Object::string_literal("Intro")]),
            op("ET", vec![]),
        ]);

        assert_eq!(runs.len(), 1);
        let run = &runs[0];
        assert_eq!(run.text, "Intro");
        assert_eq!(run.font_name, "Helvetica-Bold");
        assert_eq!(run.size, 20.0);
        assert_eq!(run.glyphs, 5);
        assert_eq!(run.x0, 100.0);
        assert_eq!(run.baseline, 600.0);
        // five glyphs at half an em of a 10pt font, doubled by the CTM
        assert_eq!(run.x1, 150.0);
    }

    #[test]
    fn leading_moves_to_next_line() {
        let (runs, _) = interpret(vec![
            op("BT", vec![]),
            op("Tf", vec!["F1".into(), 12.into()]),
            op("TL", vec![14.into()]),
            op("Td", vec![72.into(), 700.into()]),
            op("Tj", vec![Object::string_literal("First line")]),
            op("T*", vec![]),
            op("Tj", vec![Object::string_literal("Second line")]),
            op("ET", vec![]),
        ]);

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].baseline, 700.0);
        assert_eq!(runs[1].baseline, 686.0);
        assert_eq!(runs[1].x0, 72.0);
    }

    #[test]
    fn tj_gap_becomes_space() {
        let (runs, _) = interpret(vec![
            op("BT", vec![]),
            op("Tf", vec!["F1".into(), 12.into()]),
            op(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Hello"),
                    Object::Integer(-400),
                    Object::string_literal("World"),
                ])],
            ),
            op("ET", vec![]),
        ]);

        assert_eq!(runs[0].text, "Hello World");
        assert_eq!(runs[0].glyphs, 10);
    }

    #[test]
    fn blank_strings_are_not_runs() {
        let (runs, _) = interpret(vec![
            op("BT", vec![]),
            op("Tj", vec![Object::string_literal("   ")]),
            op("ET", vec![]),
        ]);
        assert!(runs.is_empty());
    }

    #[test]
    fn xobject_placement_yields_figure() {
        let (_, figures) = interpret(vec![
            op("q", vec![]),
            op("cm", vec![200.into(), 0.into(), 0.into(), 100.into(), 50.into(), 400.into()]),
            op("Do", vec!["Im0".into()]),
            op("Q", vec![]),
        ]);
        assert_eq!(figures, vec![BBox::new(50.0, 400.0, 250.0, 500.0)]);
    }

    // One US Letter page showing `shown` in font F1 at 10pt from (72, 700)
    fn single_page(doc: &mut Document, font: ObjectId, shown: Object) {
        let pages_id = doc.new_object_id();
        let content = Content {
            operations: vec![
                op("BT", vec![]),
                op("Tf", vec!["F1".into(), 10.into()]),
                op("Td", vec![72.into(), 700.into()]),
                op("Tj", vec![shown]),
                op("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font } },
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
    }

    #[test]
    fn type0_text_goes_through_to_unicode() {
        let cmap = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Adobe-Identity-UCS def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
% glyph ids of the subset
2 beginbfchar
<0024> <0049>
<0025> <006E>
endbfchar
1 beginbfrange
<0026> <0026> <0074>
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end
";
        let mut doc = Document::with_version("1.5");
        let to_unicode = doc.add_object(Stream::new(dictionary! {}, cmap.to_vec()));
        let descendant = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => "ABCDEF+Inter-Bold",
            "DW" => 1000,
            "W" => vec![
                36.into(),
                Object::Array(vec![600.into(), 550.into()]),
                38.into(),
                38.into(),
                300.into(),
            ],
        });
        let font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "ABCDEF+Inter-Bold",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![descendant.into()],
            "ToUnicode" => to_unicode,
        });
        let glyphs = vec![0x00, 0x24, 0x00, 0x25, 0x00, 0x26, 0x00, 0x24, 0x00, 0x25, 0x00, 0x26];
        single_page(&mut doc, font, Object::String(glyphs, StringFormat::Hexadecimal));

        let pages = extract_pages(&doc).unwrap();
        let run = &pages[0].runs[0];
        assert_eq!(run.text, "IntInt");
        assert_eq!(run.glyphs, 6);
        assert_eq!(run.font_name, "ABCDEF+Inter-Bold");
        assert_eq!(run.x0, 72.0);
        // twice (0.6 + 0.55 + 0.3) em at 10pt, taken from /W
        assert!((run.x1 - 101.0).abs() < 1e-3, "x1 = {}", run.x1);
    }

    #[test]
    fn differences_override_base_encoding() {
        let mut doc = Document::with_version("1.5");
        let font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
            "Encoding" => dictionary! {
                "Type" => "Encoding",
                "BaseEncoding" => "WinAnsiEncoding",
                "Differences" => vec![
                    65.into(),
                    "bullet".into(),
                    "fi".into(),
                    "uni00E9".into(),
                ],
            },
        });
        single_page(&mut doc, font, Object::string_literal(b"ABC D\x96".to_vec()));

        let pages = extract_pages(&doc).unwrap();
        let run = &pages[0].runs[0];
        assert_eq!(run.text, "\u{2022}\u{FB01}\u{E9} D\u{2013}");
        assert_eq!(run.glyphs, 5);
    }

    #[test]
    fn glyph_names_resolve_to_characters() {
        assert_eq!(glyph_char("A"), Some('A'));
        assert_eq!(glyph_char("uni2014"), Some('\u{2014}'));
        assert_eq!(glyph_char("u1F600"), Some('\u{1F600}'));
        assert_eq!(glyph_char("udieresis"), Some('\u{FC}'));
        assert_eq!(glyph_char("period"), Some('.'));
        assert_eq!(glyph_char("g123"), None);
    }
}
