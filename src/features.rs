use crate::layout::LayoutRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const FEATURE_COUNT: usize = 11;

/// Column order shared by training and inference.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "font_size",
    "is_bold",
    "starts_with_number",
    "y0",
    "numbering_depth",
    "word_count",
    "proximity_to_top",
    "box_overlap",
    "indentation",
    "semantic_cue",
    "vertical_gap",
];

/// Tag persisted with every model so a vector layout change can never be silently mixed
/// with an artifact trained on another one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FeatureSchema {
    LayoutV1,
}

impl FeatureSchema {
    pub const CURRENT: FeatureSchema = FeatureSchema::LayoutV1;

    pub fn width(&self) -> usize {
        match self {
            FeatureSchema::LayoutV1 => FEATURE_COUNT,
        }
    }
}

impl fmt::Display for FeatureSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureSchema::LayoutV1 => write!(f, "layout-v1/{}", self.width()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn from_record(record: &LayoutRecord, vertical_gap: f32) -> Self {
        Self([
            f64::from(record.font_size),
            flag(record.is_bold),
            flag(record.starts_with_number),
            f64::from(record.y0()),
            record.numbering_depth as f64,
            record.word_count as f64,
            f64::from(record.proximity_to_top),
            flag(record.box_overlap),
            f64::from(record.indentation()),
            flag(record.semantic_cue),
            f64::from(vertical_gap),
        ])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl AsRef<[f64]> for FeatureVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Distance from the last heading seen on the current page; resets on a page change.
#[derive(Debug, Clone, Copy, Default)]
pub struct GapTracker {
    last: Option<(u32, f32)>,
}

impl GapTracker {
    pub fn gap(&self, record: &LayoutRecord) -> f32 {
        match self.last {
            Some((page, y0)) if page == record.page => (record.y0() - y0).abs(),
            _ => 0.0,
        }
    }

    pub fn mark(&mut self, record: &LayoutRecord) {
        self.last = Some((record.page, record.y0()));
    }
}

/// Inference-side vectors. No labels exist yet, so the gap is measured from the previous
/// line on the page that `is_candidate` accepts as a plausible heading.
pub fn inference_features<F>(records: &[LayoutRecord], is_candidate: F) -> Vec<FeatureVector>
where
    F: Fn(&LayoutRecord) -> bool,
{
    records
        .iter()
        .scan(GapTracker::default(), |tracker, record| {
            let vector = FeatureVector::from_record(record, tracker.gap(record));
            if is_candidate(record) {
                tracker.mark(record);
            }
            Some(vector)
        })
        .collect()
}
