use crate::config::TrainingConfig;
use crate::error::{OutlineError, Result};
use crate::features::{FeatureSchema, FeatureVector, FEATURE_NAMES};
use crate::forest::{ForestParams, RandomForest};
use crate::outline::HeadingLevel;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Maps heading levels to dense class indices, in sorted order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<HeadingLevel>,
}

impl LabelEncoder {
    pub fn fit(labels: &[HeadingLevel]) -> Self {
        let classes: BTreeSet<HeadingLevel> = labels.iter().copied().collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    /// Fit on `labels` and encode them in one pass.
    pub fn fit_transform(labels: &[HeadingLevel]) -> (Self, Vec<usize>) {
        let encoder = Self::fit(labels);
        let index: BTreeMap<HeadingLevel, usize> = encoder
            .classes
            .iter()
            .enumerate()
            .map(|(i, level)| (*level, i))
            .collect();
        let encoded = labels.iter().map(|level| index[level]).collect();
        (encoder, encoded)
    }

    pub fn classes(&self) -> &[HeadingLevel] {
        &self.classes
    }

    pub fn transform(&self, level: HeadingLevel) -> Option<usize> {
        self.classes.binary_search(&level).ok()
    }

    pub fn inverse_transform(&self, index: usize) -> Option<HeadingLevel> {
        self.classes.get(index).copied()
    }
}

/// The persisted classifier: forest, label encoder and the vector layout they were trained on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    schema: FeatureSchema,
    feature_names: Vec<String>,
    classifier: RandomForest,
    encoder: LabelEncoder,
    params: ForestParams,
    /// Hold-out accuracy, absent when the corpus was too small to hold anything out
    accuracy: Option<f64>,
}

impl Model {
    /// Grid-search the forest parameters with stratified k-fold cross-validation on a seeded
    /// training split, refit the winner and score it on the hold-out split.
    pub fn train(
        features: &[FeatureVector],
        labels: &[HeadingLevel],
        config: &TrainingConfig,
    ) -> Result<Model> {
        if features.is_empty() || labels.is_empty() {
            return Err(OutlineError::EmptyTrainingSet);
        }
        debug_assert_eq!(features.len(), labels.len());

        let (encoder, encoded) = LabelEncoder::fit_transform(labels);
        let n_classes = encoder.classes().len();

        let (train_idx, test_idx) = split_indices(features.len(), config.test_fraction, config.seed);
        let train_rows: Vec<FeatureVector> = train_idx.iter().map(|&i| features[i]).collect();
        let train_labels: Vec<usize> = train_idx.iter().map(|&i| encoded[i]).collect();

        let grid = parameter_grid(config);
        if grid.is_empty() {
            return Err(OutlineError::InvalidConfig(
                "training grid must list at least one value per parameter".to_string(),
            ));
        }
        let params = select_params(&train_rows, &train_labels, n_classes, &grid, config);
        log::debug!("selected forest parameters {params:?} from {} candidates", grid.len());

        let classifier = RandomForest::fit(&train_rows, &train_labels, n_classes, params, config.seed);

        let accuracy = if test_idx.is_empty() {
            None
        } else {
            let test_rows: Vec<FeatureVector> = test_idx.iter().map(|&i| features[i]).collect();
            let test_labels: Vec<usize> = test_idx.iter().map(|&i| encoded[i]).collect();
            Some(classifier.accuracy(&test_rows, &test_labels))
        };

        match accuracy {
            Some(acc) => log::info!(
                "trained on {} lines, hold-out accuracy {:.4} over {} lines",
                train_idx.len(),
                acc,
                test_idx.len()
            ),
            None => log::info!(
                "trained on {} lines, corpus too small for a hold-out split",
                train_idx.len()
            ),
        }

        Ok(Model {
            schema: FeatureSchema::CURRENT,
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            classifier,
            encoder,
            params,
            accuracy,
        })
    }

    pub fn predict(&self, features: &[FeatureVector]) -> Result<Vec<HeadingLevel>> {
        features
            .iter()
            .map(|row| {
                let class = self.classifier.predict(row.as_slice());
                self.encoder
                    .inverse_transform(class)
                    .ok_or(OutlineError::UnknownClass(class))
            })
            .collect()
    }

    pub fn params(&self) -> ForestParams {
        self.params
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.accuracy
    }

    pub fn encoder(&self) -> &LabelEncoder {
        &self.encoder
    }

    /// Write the artifact next to `path` first, then move it over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        file.persist(path).map_err(|e| e.error)?;
        log::info!("model written to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Model> {
        let load_error = |reason: String| OutlineError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| load_error(e.to_string()))?;
        let model: Model =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| load_error(e.to_string()))?;

        model.check_schema()?;
        if model.encoder.classes().is_empty()
            || model.classifier.n_classes() != model.encoder.classes().len()
        {
            return Err(load_error(format!(
                "classifier has {} classes but the encoder knows {}",
                model.classifier.n_classes(),
                model.encoder.classes().len()
            )));
        }
        Ok(model)
    }

    fn check_schema(&self) -> Result<()> {
        let names_match = self.feature_names.iter().map(String::as_str).eq(FEATURE_NAMES);
        if self.schema != FeatureSchema::CURRENT
            || !names_match
            || self.classifier.n_features() != FeatureSchema::CURRENT.width()
        {
            return Err(OutlineError::SchemaMismatch {
                expected: FeatureSchema::CURRENT.to_string(),
                found: format!(
                    "{} with {} features [{}]",
                    self.schema,
                    self.classifier.n_features(),
                    self.feature_names.join(", ")
                ),
            });
        }
        Ok(())
    }
}

// Seeded shuffle, then the first ceil(n * fraction) indices are held out. At least one
// index always stays on the training side.
fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    if n < 2 || test_fraction <= 0.0 {
        return (indices, Vec::new());
    }
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_test = ((n as f64 * test_fraction).ceil() as usize).min(n - 1);
    let train = indices.split_off(n_test);
    (train, indices)
}

/// Every combination of the configured values, ordered by max_depth, then
/// min_samples_split, then n_estimators.
pub fn parameter_grid(config: &TrainingConfig) -> Vec<ForestParams> {
    let mut grid = Vec::new();
    for &max_depth in &config.max_depth {
        for &min_samples_split in &config.min_samples_split {
            for &n_estimators in &config.n_estimators {
                grid.push(ForestParams {
                    n_estimators,
                    max_depth,
                    min_samples_split,
                });
            }
        }
    }
    grid
}

// Fold index per row: rows are ranked by (class, position) and dealt round-robin, so every
// class is spread evenly over the folds.
fn stratified_folds(labels: &[usize], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by_key(|&i| (labels[i], i));
    let mut folds = vec![0; labels.len()];
    for (rank, &i) in order.iter().enumerate() {
        folds[i] = rank % k;
    }
    folds
}

fn select_params(
    rows: &[FeatureVector],
    labels: &[usize],
    n_classes: usize,
    grid: &[ForestParams],
    config: &TrainingConfig,
) -> ForestParams {
    let k = config.cv_folds;
    if grid.len() == 1 || rows.len() < k {
        return grid[0];
    }

    let folds = stratified_folds(labels, k);
    let jobs: Vec<(usize, usize)> = (0..grid.len())
        .flat_map(|g| (0..k).map(move |f| (g, f)))
        .collect();

    let scores: Vec<(usize, f64)> = jobs
        .par_iter()
        .map(|&(g, fold)| {
            let (mut fit_rows, mut fit_labels) = (Vec::new(), Vec::new());
            let (mut val_rows, mut val_labels) = (Vec::new(), Vec::new());
            for (i, row) in rows.iter().enumerate() {
                if folds[i] == fold {
                    val_rows.push(*row);
                    val_labels.push(labels[i]);
                } else {
                    fit_rows.push(*row);
                    fit_labels.push(labels[i]);
                }
            }
            let forest = RandomForest::fit(&fit_rows, &fit_labels, n_classes, grid[g], config.seed);
            (g, forest.accuracy(&val_rows, &val_labels))
        })
        .collect();

    let mut means = vec![0.0; grid.len()];
    for (g, score) in scores {
        means[g] += score / k as f64;
    }
    for (params, mean) in grid.iter().zip(&means) {
        log::debug!("cv accuracy {mean:.4} for {params:?}");
    }

    let best = means
        .iter()
        .enumerate()
        .fold(0, |best, (i, &m)| if m > means[best] { i } else { best });
    grid[best]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_COUNT;
    use pretty_assertions::assert_eq;

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            n_estimators: vec![5, 10],
            max_depth: vec![4],
            min_samples_split: vec![2],
            cv_folds: 3,
            test_fraction: 0.2,
            seed: 42,
        }
    }

    // H1 lines are big, H2 medium, H3 small; everything else is constant
    fn corpus() -> (Vec<FeatureVector>, Vec<HeadingLevel>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..60 {
            let (size, level) = match i % 3 {
                0 => (20.0, HeadingLevel::H1),
                1 => (15.0, HeadingLevel::H2),
                _ => (12.5, HeadingLevel::H3),
            };
            let mut row = [0.0; FEATURE_COUNT];
            row[0] = size + (i % 5) as f64 * 0.1;
            row[3] = 700.0 - i as f64;
            features.push(FeatureVector(row));
            labels.push(level);
        }
        (features, labels)
    }

    #[test]
    fn encoder_sorts_classes() {
        let (encoder, encoded) =
            LabelEncoder::fit_transform(&[HeadingLevel::H3, HeadingLevel::H1, HeadingLevel::H3]);
        assert_eq!(encoder.classes(), &[HeadingLevel::H1, HeadingLevel::H3]);
        assert_eq!(encoded, vec![1, 0, 1]);
        assert_eq!(encoder.transform(HeadingLevel::H2), None);
        assert_eq!(encoder.inverse_transform(1), Some(HeadingLevel::H3));
        assert_eq!(encoder.inverse_transform(2), None);
    }

    #[test]
    fn grid_order_and_size() {
        let config = TrainingConfig::default();
        let grid = parameter_grid(&config);
        assert_eq!(grid.len(), 8);
        assert_eq!(
            grid[0],
            ForestParams {
                n_estimators: 100,
                max_depth: 10,
                min_samples_split: 2
            }
        );
        assert_eq!(grid[1].n_estimators, 150);
        assert_eq!(grid[2].min_samples_split, 5);
        assert_eq!(grid[4].max_depth, 15);
    }

    #[test]
    fn split_keeps_one_training_row() {
        let (train, test) = split_indices(1, 0.2, 42);
        assert_eq!((train, test), (vec![0], vec![]));

        let (train, test) = split_indices(10, 0.2, 42);
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        let (train, test) = split_indices(2, 0.9, 42);
        assert_eq!((train.len(), test.len()), (1, 1));
    }

    #[test]
    fn folds_spread_each_class() {
        let labels = vec![0, 0, 0, 1, 1, 1];
        let folds = stratified_folds(&labels, 3);
        assert_eq!(folds, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn empty_training_set_is_rejected() {
        let err = Model::train(&[], &[], &small_config()).unwrap_err();
        assert!(matches!(err, OutlineError::EmptyTrainingSet));
    }

    #[test]
    fn trained_model_learns_font_bands() {
        let (features, labels) = corpus();
        let model = Model::train(&features, &labels, &small_config()).unwrap();
        assert_eq!(model.params().max_depth, 4);
        assert!(model.accuracy().unwrap() > 0.9);
        assert_eq!(model.predict(&features[..3]).unwrap(), labels[..3].to_vec());
    }

    #[test]
    fn tiny_corpus_trains_without_holdout() {
        let features = vec![FeatureVector([1.0; FEATURE_COUNT])];
        let model = Model::train(&features, &[HeadingLevel::H2], &small_config()).unwrap();
        assert_eq!(model.accuracy(), None);
        assert_eq!(model.predict(&features).unwrap(), vec![HeadingLevel::H2]);
    }

    #[test]
    fn predictions_are_decoded_by_the_encoder() {
        let (features, labels) = corpus();
        let mut model = Model::train(&features, &labels, &small_config()).unwrap();
        let decoded: Vec<HeadingLevel> = features
            .iter()
            .map(|row| {
                let class = model.classifier.predict(row.as_slice());
                model.encoder().inverse_transform(class).unwrap()
            })
            .collect();
        assert_eq!(model.predict(&features).unwrap(), decoded);

        // an encoder that lost classes cannot decode the forest's votes
        model.encoder = LabelEncoder::fit(&[HeadingLevel::H1]);
        let err = model.predict(&features).unwrap_err();
        assert!(matches!(err, OutlineError::UnknownClass(class) if class > 0));
    }

    #[test]
    fn save_and_load_preserve_model() {
        let (features, labels) = corpus();
        let model = Model::train(&features, &labels, &small_config()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.json");

        model.save(&path).unwrap();
        let loaded = Model::load(&path).unwrap();
        assert_eq!(loaded.predict(&features).unwrap(), model.predict(&features).unwrap());
        assert_eq!(loaded.encoder(), model.encoder());
    }

    #[test]
    fn load_rejects_other_feature_layout() {
        let (features, labels) = corpus();
        let model = Model::train(&features, &labels, &small_config()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        model.save(&path).unwrap();

        let mut json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        json["feature_names"][10] = serde_json::Value::from("line_spacing");
        fs::write(&path, json.to_string()).unwrap();

        let err = Model::load(&path).unwrap_err();
        assert!(matches!(err, OutlineError::SchemaMismatch { .. }));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Model::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, OutlineError::ModelLoad { .. }));
    }
}
