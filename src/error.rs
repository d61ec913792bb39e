use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, OutlineError>;

#[derive(Debug, thiserror::Error)]
pub enum OutlineError {
    /// The PDF could not be decoded by lopdf
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// No heuristic label survived across the whole corpus
    #[error("no labeled lines found in the training corpus")]
    EmptyTrainingSet,

    #[error("feature schema mismatch: model expects {expected}, got {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("failed to load model from {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    /// The forest voted for a class index the label encoder never saw
    #[error("classifier predicted class {0}, which the label encoder does not know")]
    UnknownClass(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
