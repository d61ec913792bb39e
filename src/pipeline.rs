//! Per-document training and inference passes, and the folder-level batch drivers around them.
//!
//! A document that fails to parse is logged and skipped; only an empty training corpus or an
//! unusable output location stops a batch.

use crate::classifier::Model;
use crate::config::OutlineConfig;
use crate::error::Result;
use crate::features::{inference_features, FeatureVector};
use crate::labeler::{label_document, LabeledLine};
use crate::layout::{layout_from_document, ExtractionMode, LayoutRecord};
use crate::outline::{assemble_outline, is_heading_candidate, HeadingLevel, Outline};
use crate::title::{detect_title_lines, is_title_line, join_title};
use anyhow::Context;
use lopdf::Document;
use std::fs;
use std::path::{Path, PathBuf};

/// Parallel feature and label columns aggregated over a corpus.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub features: Vec<FeatureVector>,
    pub labels: Vec<HeadingLevel>,
}

impl TrainingSet {
    pub fn push_lines(&mut self, lines: Vec<LabeledLine>) {
        for line in lines {
            self.features.push(line.features);
            self.labels.push(line.level);
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Training pass over one document: permissive title, then heuristic labels.
pub fn label_pdf_document(doc: &Document, config: &OutlineConfig) -> Result<Vec<LabeledLine>> {
    let layout = layout_from_document(doc, ExtractionMode::Training, &config.extraction)?;
    let title_lines = detect_title_lines(&layout.records, &config.title.training, &config.title);
    Ok(label_document(&layout.records, &title_lines))
}

pub fn label_pdf(path: &Path, config: &OutlineConfig) -> Result<Vec<LabeledLine>> {
    let doc = Document::load(path)?;
    label_pdf_document(&doc, config)
}

/// Inference pass over one document.
pub fn outline_from_document(
    doc: &Document,
    model: &Model,
    config: &OutlineConfig,
) -> Result<Outline> {
    let layout = layout_from_document(doc, ExtractionMode::Inference, &config.extraction)?;
    let title_lines = detect_title_lines(&layout.records, &config.title.inference, &config.title);
    let title = join_title(&title_lines);

    let records: Vec<LayoutRecord> = layout
        .records
        .into_iter()
        .filter(|record| !is_title_line(record, &title_lines))
        .collect();
    if records.is_empty() {
        log::debug!("no body lines, outline left empty");
        return Ok(Outline {
            title,
            outline: Vec::new(),
        });
    }

    let features = inference_features(&records, |r| is_heading_candidate(r, &config.assembly));
    let levels = model.predict(&features)?;
    let outline = assemble_outline(&records, &levels, &config.assembly);

    Ok(Outline { title, outline })
}

pub fn detect_outline(path: &Path, model: &Model, config: &OutlineConfig) -> Result<Outline> {
    let doc = Document::load(path)?;
    outline_from_document(&doc, model, config)
}

/// `.pdf` files directly inside `dir`, sorted by name.
pub fn pdf_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "pdf") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn collect_training_set(dir: &Path, config: &OutlineConfig) -> anyhow::Result<TrainingSet> {
    let mut set = TrainingSet::default();
    for path in pdf_files(dir)? {
        match label_pdf(&path, config) {
            Ok(lines) => {
                log::info!("{}: {} labeled lines", path.display(), lines.len());
                set.push_lines(lines);
            }
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }
    }
    Ok(set)
}

/// Train over every PDF in `dir` and persist the model. Returns `None`, without writing
/// anything, when no document produced a single labeled line.
pub fn train_from_folder(
    dir: &Path,
    model_path: &Path,
    config: &OutlineConfig,
) -> anyhow::Result<Option<Model>> {
    let set = collect_training_set(dir, config)?;
    if set.is_empty() {
        log::error!(
            "No labeled lines found under {}, no model written",
            dir.display()
        );
        return Ok(None);
    }

    log::info!("Training on {} labeled lines", set.len());
    let model = Model::train(&set.features, &set.labels, &config.training)?;
    model
        .save(model_path)
        .with_context(|| format!("Failed to write model to {}", model_path.display()))?;
    Ok(Some(model))
}

/// Counts reported by [`extract_folder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: usize,
    pub skipped: usize,
}

/// Write `<stem>.json` into `output` for every PDF in `input`.
pub fn extract_folder(
    input: &Path,
    output: &Path,
    model: &Model,
    config: &OutlineConfig,
) -> anyhow::Result<BatchSummary> {
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let mut summary = BatchSummary::default();
    for path in pdf_files(input)? {
        match process_one(&path, output, model, config) {
            Ok(out_path) => {
                log::info!("Saved {}", out_path.display());
                summary.written += 1;
            }
            Err(e) => {
                log::warn!("{:#}", e);
                summary.skipped += 1;
            }
        }
    }
    Ok(summary)
}

fn process_one(
    path: &Path,
    output: &Path,
    model: &Model,
    config: &OutlineConfig,
) -> anyhow::Result<PathBuf> {
    let outline = detect_outline(path, model, config)
        .with_context(|| format!("Failed to process {}", path.display()))?;
    let out_path = output_path(path, output);
    write_outline(&outline, &out_path)?;
    Ok(out_path)
}

pub fn output_path(pdf: &Path, output_dir: &Path) -> PathBuf {
    let mut name = pdf.file_stem().unwrap_or(pdf.as_os_str()).to_os_string();
    name.push(".json");
    output_dir.join(name)
}

pub fn write_outline(outline: &Outline, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(outline)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
