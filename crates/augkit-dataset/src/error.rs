//! Error types for dataset discovery, label parsing and loading.

use std::path::PathBuf;

use augkit_image::ImageError;
use augkit_pipeline::ProcessorError;
use thiserror::Error;

/// Error type for dataset operations.
///
/// Loading is atomic: the first error aborts the whole call and no partially
/// loaded dataset is returned.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Error when reading a directory fails.
    #[error("Failed to read directory: {path}")]
    DirectoryReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error when a configured root does not exist or is not a directory.
    #[error("Dataset root not found: {path}")]
    RootNotFound { path: PathBuf },

    /// Error when a label file lacks the expected keypoint field.
    #[error("Field '{field}' not found in label file: {path}")]
    FieldNotFound { path: PathBuf, field: String },

    /// Error when a label file cannot be opened or read.
    #[error("Failed to open label file: {path}")]
    LabelOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error when a label file is not valid JSON.
    #[error("Failed to parse label file: {path}")]
    LabelParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Error when the keypoint field holds something other than up to 21
    /// `(x, y, z)` triplets.
    #[error("Invalid keypoints in {path}: {reason}")]
    InvalidKeypoints { path: PathBuf, reason: String },

    /// Error when decoding or resizing an image fails.
    #[error("Failed to open image: {path}")]
    ImageOpenFailed {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    /// Error when an image has no label with the same stem, or vice versa.
    #[error("No matching image/label partner for: {path}")]
    UnpairedFile { path: PathBuf },

    /// Error when the number of images and label files differ.
    #[error("Found {images} images but {labels} label files")]
    CountMismatch { images: usize, labels: usize },

    /// Error when a file has no stem (filename without extension).
    #[error("File has no stem: {path}")]
    NoFileStem { path: PathBuf },

    /// Error when path components contain invalid UTF-8.
    #[error("Path contains invalid UTF-8: {path}")]
    InvalidUtf8Path { path: PathBuf },

    /// Error when no image was found under any root.
    #[error("No samples found in {roots:?}")]
    NoSamples { roots: Vec<PathBuf> },

    /// Error when samples assembled into one array disagree on shape.
    #[error("Inconsistent sample shape: expected {expected:?}, got {actual:?}")]
    InconsistentShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Error when a batch is requested for an empty sample list.
    #[error("Cannot build a batch from zero samples")]
    EmptyBatch,

    /// Error when the loader configuration is unusable, such as a zero image size.
    #[error("Invalid dataset configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Error raised by the augmentation pipeline for one sample.
    #[error("Augmentation failed for sample {index}")]
    Augmentation {
        index: usize,
        #[source]
        source: ProcessorError,
    },
}

/// A specialized `Result` type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;
