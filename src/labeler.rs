use crate::features::{FeatureVector, GapTracker};
use crate::layout::LayoutRecord;
use crate::outline::HeadingLevel;
use crate::title::is_title_line;
use std::collections::HashSet;

/// A record that received a provisional heading level, with the vector it trains on.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledLine {
    pub text: String,
    pub page: u32,
    pub level: HeadingLevel,
    pub features: FeatureVector,
}

/// Labeling state carried from one record to the next; starts fresh on every page.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageState {
    page: u32,
    previous: Option<HeadingLevel>,
    gaps: GapTracker,
}

impl PageState {
    fn for_page(page: u32) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }
}

/// Label every record of one document. Unlabeled records are dropped, never emitted.
pub fn label_document(records: &[LayoutRecord], title_lines: &[String]) -> Vec<LabeledLine> {
    let uniform = is_uniform_font(records);
    let (_, labeled) = records.iter().fold(
        (PageState::default(), Vec::new()),
        |(state, mut labeled), record| {
            let (state, line) = step(state, record, uniform, title_lines);
            labeled.extend(line);
            (state, labeled)
        },
    );
    labeled
}

/// True when every line shares one font size (to a tenth of a point).
pub fn is_uniform_font(records: &[LayoutRecord]) -> bool {
    let sizes: HashSet<i64> = records
        .iter()
        .map(|r| (f64::from(r.font_size) * 10.0).round() as i64)
        .collect();
    sizes.len() == 1
}

pub fn step(
    state: PageState,
    record: &LayoutRecord,
    uniform: bool,
    title_lines: &[String],
) -> (PageState, Option<LabeledLine>) {
    let mut state = if state.page == record.page {
        state
    } else {
        PageState::for_page(record.page)
    };

    if is_title_line(record, title_lines) {
        return (state, None);
    }

    let Some(level) = candidate_level(record, uniform, state.previous) else {
        return (state, None);
    };

    let mut text = record.text.clone();
    if level == HeadingLevel::H3 {
        if !record.is_bold {
            return (state, None);
        }
        text = strip_short_colon_tail(&text);
    }

    let features = FeatureVector::from_record(record, state.gaps.gap(record));
    state.gaps.mark(record);
    state.previous = Some(level);

    let line = LabeledLine {
        text,
        page: record.page,
        level,
        features,
    };
    (state, Some(line))
}

fn candidate_level(
    record: &LayoutRecord,
    uniform: bool,
    previous: Option<HeadingLevel>,
) -> Option<HeadingLevel> {
    if !uniform {
        return if record.font_size > 14.0 && record.word_count <= 12 && record.proximity_to_top > 0.5
        {
            Some(HeadingLevel::H1)
        } else if record.font_size > 13.0 && record.word_count <= 15 {
            Some(HeadingLevel::H2)
        } else if record.font_size > 12.0 {
            Some(HeadingLevel::H3)
        } else {
            None
        };
    }

    let indentation = record.indentation();
    match (record.starts_with_number, indentation < 100.0) {
        (true, true) => Some(match record.numbering_depth {
            1 => HeadingLevel::H1,
            2 => HeadingLevel::H2,
            _ => HeadingLevel::H3,
        }),
        (false, _) if indentation < 100.0 => Some(HeadingLevel::H1),
        (false, _) if indentation < 150.0 => Some(HeadingLevel::H2),
        (false, _) => Some(HeadingLevel::H3),
        // numbered but deeply indented: one level below whatever came before, if anything
        (true, false) => previous.and_then(HeadingLevel::child),
    }
}

// "Results: see appendix" -> "Results"; longer tails are part of the heading
fn strip_short_colon_tail(text: &str) -> String {
    match text.split_once(':') {
        Some((head, tail)) if tail.split_whitespace().count() <= 3 => head.trim().to_string(),
        _ => text.to_string(),
    }
}
