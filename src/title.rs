use crate::config::{TitleConfig, TitleParams};
use crate::layout::LayoutRecord;

/// Lines on page 1 that make up the document title, top to bottom for the strict variant
/// and in extraction order for the permissive one.
pub fn detect_title_lines(
    records: &[LayoutRecord],
    params: &TitleParams,
    config: &TitleConfig,
) -> Vec<String> {
    let mut first_page: Vec<&LayoutRecord> = records.iter().filter(|r| r.page == 1).collect();
    if first_page.is_empty() {
        return Vec::new();
    }

    let max_size = first_page
        .iter()
        .map(|r| r.font_size)
        .fold(f32::MIN, f32::max);
    let top_threshold = first_page.iter().map(|r| r.y0()).fold(f32::MIN, f32::max) * config.top_ratio;

    if params.max_line_gap.is_some() {
        first_page.sort_by(|a, b| b.y0().total_cmp(&a.y0()));
    }

    let mut lines = Vec::new();
    let mut prev_y0: Option<f32> = None;

    for record in first_page {
        if (record.font_size - max_size).abs() > params.size_tolerance {
            continue;
        }
        if record.y0() <= top_threshold {
            continue;
        }
        if let Some((low, high)) = params.centering {
            let width = config.assumed_page_width.unwrap_or(record.page_width);
            let ratio = record.bbox.center_x() / width;
            if ratio < low || ratio > high {
                continue;
            }
        }
        if let (Some(max_gap), Some(prev)) = (params.max_line_gap, prev_y0) {
            if (prev - record.y0()).abs() > max_gap {
                break;
            }
        }

        lines.push(record.text.trim().to_string());
        prev_y0 = Some(record.y0());
    }

    lines
}

pub fn join_title(lines: &[String]) -> String {
    lines.join(" ").trim().to_string()
}

pub fn is_title_line(record: &LayoutRecord, title_lines: &[String]) -> bool {
    record.page == 1 && title_lines.iter().any(|line| line == record.text.trim())
}
