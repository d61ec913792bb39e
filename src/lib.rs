//! Recover a document title and an H1/H2/H3 outline from a PDF's text layout.
//!
//! Training labels lines with layout heuristics and fits a random forest on them; inference
//! runs that forest over every line and keeps the confident, heading-shaped ones.

use once_cell::sync::Lazy;
use regex::Regex;

pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod font_utils;
pub mod forest;
pub mod geometry;
pub mod labeler;
pub mod layout;
pub mod outline;
pub mod pipeline;
pub mod title;

pub use classifier::{LabelEncoder, Model};
pub use config::OutlineConfig;
pub use error::{OutlineError, Result};
pub use layout::{ExtractionMode, LayoutRecord};
pub use outline::{Heading, HeadingLevel, Outline};

/// Lines made only of digits, whitespace and `. ( ) % + - /`: table cells, statistics.
pub static NUMERIC_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d\s.()%+\-/]+$").unwrap());

/// A leading section number such as "2.3.1 " or "4)".
pub static NUMBERING_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(\.\d+)*)(\s+|[).])").unwrap());
