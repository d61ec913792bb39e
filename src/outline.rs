use crate::config::AssemblyConfig;
use crate::layout::LayoutRecord;
use crate::NUMERIC_LINE;
use serde::{Deserialize, Serialize};
use std::fmt;

const BULLET_CHARS: [char; 7] = ['•', '‣', '∙', '●', '◦', '▪', '*'];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

impl HeadingLevel {
    /// The level one step deeper, if there is one.
    pub fn child(self) -> Option<HeadingLevel> {
        match self {
            HeadingLevel::H1 => Some(HeadingLevel::H2),
            HeadingLevel::H2 => Some(HeadingLevel::H3),
            HeadingLevel::H3 => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HeadingLevel::H1 => "H1",
            HeadingLevel::H2 => "H2",
            HeadingLevel::H3 => "H3",
        }
    }
}

impl fmt::Display for HeadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: HeadingLevel,
    pub text: String,
    /// 0-based
    pub page: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Outline {
    pub title: String,
    pub outline: Vec<Heading>,
}

/// A line strong enough to be a heading regardless of what the classifier says:
/// above the font floor and either bold or numbered.
pub fn is_heading_candidate(record: &LayoutRecord, config: &AssemblyConfig) -> bool {
    record.font_size >= config.min_font_size && (record.is_bold || record.starts_with_number)
}

/// Filter classifier output down to the emitted outline, keeping document order.
pub fn assemble_outline(
    records: &[LayoutRecord],
    levels: &[HeadingLevel],
    config: &AssemblyConfig,
) -> Vec<Heading> {
    records
        .iter()
        .zip(levels)
        .filter_map(|(record, level)| {
            let text = record.text.as_str();
            if text.chars().count() < config.min_text_chars || NUMERIC_LINE.is_match(text) {
                return None;
            }
            if !is_heading_candidate(record, config) {
                return None;
            }

            let text = clean_heading_text(truncate_at_colon(text, config.colon_tail_chars));
            if text.is_empty() {
                return None;
            }
            Some(Heading {
                level: *level,
                text,
                page: record.page.saturating_sub(1),
            })
        })
        .collect()
}

// A colon at the very end ("Budget:") is kept; anything after an earlier colon is dropped
fn truncate_at_colon(text: &str, tail_chars: usize) -> &str {
    match text.find(':') {
        Some(index) if text[index..].chars().count() > tail_chars => text[..index].trim(),
        _ => text,
    }
}

pub fn clean_heading_text(text: &str) -> String {
    text.trim()
        .trim_start_matches(|c: char| BULLET_CHARS.contains(&c))
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;
    use pretty_assertions::assert_eq;

    fn rec(text: &str, page: u32, size: f32, bold: bool) -> LayoutRecord {
        LayoutRecord {
            text: text.to_string(),
            font_size: size,
            is_bold: bold,
            starts_with_number: crate::layout::starts_with_number(text),
            bbox: BBox::new(72.0, 500.0, 300.0, 500.0 + size),
            page,
            page_width: 612.0,
            word_count: text.split_whitespace().count(),
            numbering_depth: crate::layout::numbering_depth(text),
            proximity_to_top: 0.6,
            box_overlap: false,
            semantic_cue: false,
        }
    }

    fn assemble(records: &[LayoutRecord]) -> Vec<Heading> {
        let levels = vec![HeadingLevel::H1; records.len()];
        assemble_outline(records, &levels, &AssemblyConfig::default())
    }

    fn texts(headings: &[Heading]) -> Vec<&str> {
        headings.iter().map(|h| h.text.as_str()).collect()
    }

    #[test]
    fn numeric_lines_never_reach_outline() {
        let headings = assemble(&[rec("12.5%", 1, 14.0, true), rec("(3.2) - 4/5", 1, 14.0, true)]);
        assert!(headings.is_empty());
    }

    #[test]
    fn weak_lines_are_filtered() {
        let headings = assemble(&[
            rec("Abc", 1, 14.0, true),
            rec("Small bold note", 1, 9.5, true),
            rec("Large but plain", 1, 16.0, false),
            rec("2 Numbered plain", 1, 12.0, false),
            rec("Bold heading", 1, 12.0, true),
        ]);
        assert_eq!(texts(&headings), vec!["2 Numbered plain", "Bold heading"]);
    }

    #[test]
    fn colon_truncation_keeps_trailing_colon() {
        let headings = assemble(&[
            rec("Scope: overview of work", 1, 12.0, true),
            rec("Budget:", 1, 12.0, true),
            rec("Phase A:1", 1, 12.0, true),
        ]);
        assert_eq!(texts(&headings), vec!["Scope", "Budget:", "Phase A:1"]);
    }

    #[test]
    fn bullets_are_stripped() {
        let headings = assemble(&[rec("• Key findings", 1, 12.0, true), rec("** Notes", 1, 12.0, true)]);
        assert_eq!(texts(&headings), vec!["Key findings", "Notes"]);
    }

    #[test]
    fn pages_are_zero_based_and_order_is_kept() {
        let records = vec![
            rec("First Bold", 1, 12.0, true),
            rec("Second Bold", 1, 12.0, true),
            rec("Third Bold", 3, 12.0, true),
        ];
        let levels = vec![HeadingLevel::H1, HeadingLevel::H2, HeadingLevel::H1];
        let headings = assemble_outline(&records, &levels, &AssemblyConfig::default());
        assert_eq!(
            headings,
            vec![
                Heading { level: HeadingLevel::H1, text: "First Bold".into(), page: 0 },
                Heading { level: HeadingLevel::H2, text: "Second Bold".into(), page: 0 },
                Heading { level: HeadingLevel::H1, text: "Third Bold".into(), page: 2 },
            ]
        );
    }

    #[test]
    fn outline_serializes_with_two_keys() {
        let outline = Outline {
            title: "Report".to_string(),
            outline: vec![Heading {
                level: HeadingLevel::H2,
                text: "Scope".to_string(),
                page: 1,
            }],
        };
        let json = serde_json::to_string(&outline).unwrap();
        assert_eq!(
            json,
            r#"{"title":"Report","outline":[{"level":"H2","text":"Scope","page":1}]}"#
        );
    }

    #[test]
    fn child_levels() {
        assert_eq!(HeadingLevel::H1.child(), Some(HeadingLevel::H2));
        assert_eq!(HeadingLevel::H3.child(), None);
    }
}
