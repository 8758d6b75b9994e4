//! Error types for image buffers and image-library operations.

use std::path::PathBuf;

use thiserror::Error;

/// ImageError covers all failures of buffer construction and image I/O.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to open image at '{}': {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to decode image bytes: {source}")]
    Decode {
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode image: {source}")]
    Encode {
        #[source]
        source: image::ImageError,
    },

    #[error("failed to save image to '{}': {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("unsupported channel count: {channels} (supported: 1, 3, 4)")]
    UnsupportedChannelCount { channels: usize },

    #[error("channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("data length mismatch: expected {expected}, got {actual}")]
    DataLengthMismatch { expected: usize, actual: usize },

    #[error("image has no pixels: {height}x{width}")]
    EmptyImage { height: usize, width: usize },

    #[error(
        "region [{y1}..{y2}, {x1}..{x2}] does not fit inside a {height}x{width} image"
    )]
    RegionOutOfBounds {
        x1: usize,
        y1: usize,
        x2: usize,
        y2: usize,
        height: usize,
        width: usize,
    },
}

/// Result type alias for ImageError
pub type ImageResult<T> = Result<T, ImageError>;
