use crate::error::{OutlineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable constants for every pipeline stage. Any subset can be overridden from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutlineConfig {
    pub extraction: ExtractionConfig,
    pub title: TitleConfig,
    pub assembly: AssemblyConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Lines with fewer non-whitespace characters than this are never recorded
    pub min_line_chars: usize,
    /// Inference only: a line this close (in y) to the previous kept line is dropped
    pub stacked_line_tolerance: f32,
    /// Inference only: small, short, box-overlapping lines are dropped
    pub small_font_size: f32,
    pub small_word_count: usize,
    /// Slack used when testing a line against text-box/figure regions
    pub box_margin: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_line_chars: 3,
            stacked_line_tolerance: 5.0,
            small_font_size: 8.5,
            small_word_count: 3,
            box_margin: 2.0,
        }
    }
}

/// Parameters of one title-detector variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TitleParams {
    /// Allowed distance from the largest font size on page 1
    pub size_tolerance: f32,
    /// Horizontal midpoint ratio band, `None` disables the centering check
    pub centering: Option<(f32, f32)>,
    /// Largest y0 jump allowed between consecutive title lines, `None` disables contiguity
    pub max_line_gap: Option<f32>,
}

impl TitleParams {
    /// High-recall variant used while labeling a training corpus.
    pub fn permissive() -> Self {
        Self {
            size_tolerance: 0.2,
            centering: None,
            max_line_gap: None,
        }
    }

    /// High-precision variant used at inference.
    pub fn strict() -> Self {
        Self {
            size_tolerance: 1.0,
            centering: Some((0.25, 0.75)),
            max_line_gap: Some(50.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TitleConfig {
    pub training: TitleParams,
    pub inference: TitleParams,
    /// Title lines must sit above this fraction of the highest y0 on page 1
    pub top_ratio: f32,
    /// Width used for the centering ratio. `None` measures each page's MediaBox.
    pub assumed_page_width: Option<f32>,
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            training: TitleParams::permissive(),
            inference: TitleParams::strict(),
            top_ratio: 0.65,
            assumed_page_width: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssemblyConfig {
    pub min_text_chars: usize,
    pub min_font_size: f32,
    /// A colon within this many characters of the end does not truncate the heading
    pub colon_tail_chars: usize,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            min_text_chars: 4,
            min_font_size: 10.0,
            colon_tail_chars: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub min_samples_split: Vec<usize>,
    pub cv_folds: usize,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 150],
            max_depth: vec![10, 15],
            min_samples_split: vec![2, 5],
            cv_folds: 3,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl OutlineConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: OutlineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.training;
        if t.n_estimators.is_empty() || t.max_depth.is_empty() || t.min_samples_split.is_empty() {
            return Err(OutlineError::InvalidConfig(
                "training grid must list at least one value per parameter".to_string(),
            ));
        }
        if t.n_estimators.contains(&0) {
            return Err(OutlineError::InvalidConfig(
                "n_estimators must be positive".to_string(),
            ));
        }
        if t.cv_folds < 2 {
            return Err(OutlineError::InvalidConfig(format!(
                "cv_folds must be at least 2, got {}",
                t.cv_folds
            )));
        }
        if !(0.0..1.0).contains(&t.test_fraction) {
            return Err(OutlineError::InvalidConfig(format!(
                "test_fraction must be in [0, 1), got {}",
                t.test_fraction
            )));
        }
        if let Some(width) = self.title.assumed_page_width {
            if width <= 0.0 {
                return Err(OutlineError::InvalidConfig(format!(
                    "assumed_page_width must be positive, got {width}"
                )));
            }
        }
        Ok(())
    }
}
