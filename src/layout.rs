use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::font_utils::{self, is_bold_font, PageContent, TextRun};
use crate::geometry::BBox;
use crate::{NUMBERING_PREFIX, NUMERIC_LINE};
use lopdf::Document;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Section names that hint a line is a heading
pub const HEADING_CUES: [&str; 12] = [
    "introduction",
    "background",
    "conclusion",
    "summary",
    "abstract",
    "overview",
    "references",
    "discussion",
    "results",
    "acknowledgments",
    "appendix",
    "table of contents",
];

// pdfminer-style grouping margins, as fractions of the font size / line height
const LINE_BASELINE_TOLERANCE: f32 = 0.5;
const LINE_CHAR_MARGIN: f32 = 3.0;
const WORD_MARGIN: f32 = 0.1;
const BOX_LINE_MARGIN: f32 = 0.5;

/// One text line on one page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutRecord {
    pub text: String,
    /// Mean glyph size of the line
    pub font_size: f32,
    pub is_bold: bool,
    pub starts_with_number: bool,
    pub bbox: BBox,
    /// 1-based
    pub page: u32,
    pub page_width: f32,
    pub word_count: usize,
    pub numbering_depth: usize,
    pub proximity_to_top: f32,
    pub box_overlap: bool,
    pub semantic_cue: bool,
}

impl LayoutRecord {
    pub fn y0(&self) -> f32 {
        self.bbox.y0
    }

    pub fn indentation(&self) -> f32 {
        self.bbox.x0
    }
}

/// The training extractor keeps every line; inference drops numeric rows,
/// stacked table rows and tiny boxed labels before anything else sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    Training,
    Inference,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentLayout {
    pub records: Vec<LayoutRecord>,
    /// Text-box and figure regions per page, used only for overlap testing
    pub regions: BTreeMap<u32, Vec<BBox>>,
}

pub fn extract_layout(
    path: &Path,
    mode: ExtractionMode,
    config: &ExtractionConfig,
) -> Result<DocumentLayout> {
    let doc = Document::load(path)?;
    layout_from_document(&doc, mode, config)
}

pub fn layout_from_document(
    doc: &Document,
    mode: ExtractionMode,
    config: &ExtractionConfig,
) -> Result<DocumentLayout> {
    let pages = font_utils::extract_pages(doc)?;
    Ok(layout_from_pages(&pages, mode, config))
}

pub fn layout_from_pages(
    pages: &[PageContent],
    mode: ExtractionMode,
    config: &ExtractionConfig,
) -> DocumentLayout {
    let mut layout = DocumentLayout::default();

    for page in pages {
        let boxes = group_boxes(group_lines(&page.runs));
        let regions: Vec<BBox> = boxes
            .iter()
            .map(|b| b.bbox)
            .chain(page.figures.iter().copied())
            .collect();

        let mut prev_y: Option<f32> = None;
        for text_box in &boxes {
            for line in &text_box.lines {
                let text = line.text.trim();
                if text.chars().filter(|c| !c.is_whitespace()).count() < config.min_line_chars {
                    continue;
                }
                if mode == ExtractionMode::Inference && NUMERIC_LINE.is_match(text) {
                    continue;
                }

                // the line's own box is one of the regions
                let box_overlap = regions
                    .iter()
                    .any(|region| line.bbox.overlaps(region, config.box_margin));
                let record = build_record(text, line, page, box_overlap);

                if mode == ExtractionMode::Inference {
                    if record.font_size < config.small_font_size
                        && record.word_count <= config.small_word_count
                        && record.box_overlap
                    {
                        continue;
                    }
                    if let Some(y) = prev_y {
                        if (y - record.y0()).abs() < config.stacked_line_tolerance {
                            continue;
                        }
                    }
                    prev_y = Some(record.y0());
                }

                layout.records.push(record);
            }
        }

        layout.regions.insert(page.number, regions);
    }

    layout
}

fn build_record(text: &str, line: &TextLine, page: &PageContent, box_overlap: bool) -> LayoutRecord {
    let proximity_to_top = if page.height > 0.0 {
        (line.bbox.y0 / page.height).clamp(0.0, 1.0)
    } else {
        0.0
    };

    LayoutRecord {
        text: text.to_string(),
        font_size: line.font_size(),
        is_bold: line.bold,
        starts_with_number: starts_with_number(text),
        bbox: line.bbox,
        page: page.number,
        page_width: page.width,
        word_count: text.split_whitespace().count(),
        numbering_depth: numbering_depth(text),
        proximity_to_top,
        box_overlap,
        semantic_cue: has_semantic_cue(text),
    }
}

pub fn starts_with_number(text: &str) -> bool {
    text.chars()
        .take(3)
        .find(|c| !c.is_whitespace())
        .map_or(false, |c| c.is_ascii_digit())
}

/// Segments in a leading "1.2.3" prefix, 0 when the line is not numbered.
pub fn numbering_depth(text: &str) -> usize {
    NUMBERING_PREFIX
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(0, |m| m.as_str().matches('.').count() + 1)
}

pub fn has_semantic_cue(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    HEADING_CUES.iter().any(|cue| lower.contains(cue))
}

#[derive(Debug, Clone)]
struct TextLine {
    text: String,
    bbox: BBox,
    baseline: f32,
    max_size: f32,
    weighted_size: f32,
    glyphs: usize,
    bold: bool,
}

impl TextLine {
    fn start(run: &TextRun) -> Self {
        Self {
            text: run.text.clone(),
            bbox: run_bbox(run),
            baseline: run.baseline,
            max_size: run.size,
            weighted_size: run.size * run.glyphs as f32,
            glyphs: run.glyphs,
            bold: is_bold_font(&run.font_name),
        }
    }

    fn accepts(&self, run: &TextRun) -> bool {
        let size = self.max_size.max(run.size);
        (run.baseline - self.baseline).abs() <= LINE_BASELINE_TOLERANCE * size
            && run.x0 >= self.bbox.x0 - LINE_BASELINE_TOLERANCE * size
            && run.x0 - self.bbox.x1 <= LINE_CHAR_MARGIN * size
    }

    fn push(&mut self, run: &TextRun) {
        let gap = run.x0 - self.bbox.x1;
        if gap > WORD_MARGIN * run.size && !self.text.ends_with(' ') && !run.text.starts_with(' ') {
            self.text.push(' ');
        }
        self.text.push_str(&run.text);
        self.bbox = self.bbox.union(&run_bbox(run));
        self.max_size = self.max_size.max(run.size);
        self.weighted_size += run.size * run.glyphs as f32;
        self.glyphs += run.glyphs;
        self.bold |= is_bold_font(&run.font_name);
    }

    fn font_size(&self) -> f32 {
        if self.glyphs == 0 {
            self.max_size
        } else {
            self.weighted_size / self.glyphs as f32
        }
    }
}

fn run_bbox(run: &TextRun) -> BBox {
    BBox::new(run.x0, run.baseline, run.x1, run.baseline + run.size)
}

fn group_lines(runs: &[TextRun]) -> Vec<TextLine> {
    let mut lines = Vec::new();
    let mut current: Option<TextLine> = None;

    for run in runs {
        match current.as_mut() {
            Some(line) if line.accepts(run) => line.push(run),
            _ => {
                if let Some(line) = current.replace(TextLine::start(run)) {
                    lines.push(line);
                }
            }
        }
    }
    lines.extend(current);
    lines
}

#[derive(Debug, Clone)]
struct TextBox {
    bbox: BBox,
    lines: Vec<TextLine>,
}

impl TextBox {
    fn accepts(&self, line: &TextLine) -> bool {
        let Some(last) = self.lines.last() else {
            return false;
        };
        let height = last.bbox.height().max(line.bbox.height());
        let gap = last.bbox.y0 - line.bbox.y1;
        gap <= BOX_LINE_MARGIN * height && gap >= -height && line.bbox.overlaps_horizontally(&self.bbox)
    }
}

fn group_boxes(lines: Vec<TextLine>) -> Vec<TextBox> {
    let mut boxes: Vec<TextBox> = Vec::new();

    for line in lines {
        match boxes.last_mut() {
            Some(text_box) if text_box.accepts(&line) => {
                text_box.bbox = text_box.bbox.union(&line.bbox);
                text_box.lines.push(line);
            }
            _ => boxes.push(TextBox {
                bbox: line.bbox,
                lines: vec![line],
            }),
        }
    }
    boxes
}
