use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationReport;

/// The main error type for mangalabel operations.
#[derive(Debug, Error)]
pub enum MangalabelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No annotation record or image found for '{image_id}'")]
    ImageNotFound { image_id: String },

    #[error("Annotation '{annotation_id}' not found on image '{image_id}'")]
    AnnotationNotFound {
        image_id: String,
        annotation_id: String,
    },

    #[error("Corrupt annotation record {path}: {message}")]
    CorruptRecord { path: PathBuf, message: String },

    #[error("Invalid request field '{field}': {message}")]
    InvalidRequest { field: String, message: String },

    #[error("Storage failure at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize annotation record for {path}: {source}")]
    RecordWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read image dimensions from {path}: {source}")]
    ImageDimensionRead {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to parse tag manifest {path}: {source}")]
    TagManifestParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid tag manifest {path}: {message}")]
    TagManifestInvalid { path: PathBuf, message: String },

    #[error("Tagger returned {actual} probabilities but the label table has {expected} entries")]
    ProbabilityMismatch { expected: usize, actual: usize },

    #[error("Failed to parse settings from {path}: {source}")]
    SettingsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Validation failed with {error_count} error(s) and {warning_count} warning(s)")]
    ValidationFailed {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },
}
