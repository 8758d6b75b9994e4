//! Error types for processors and pipelines.

use augkit_image::ImageError;
use thiserror::Error;

/// Error raised by a [`Processor`](crate::Processor) at construction or call time.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// An input array does not meet a hard shape precondition.
    #[error("{processor}: {reason}")]
    Shape {
        processor: &'static str,
        reason: String,
    },

    /// Construction parameters are invalid.
    #[error("invalid configuration for {processor}: {reason}")]
    Config {
        processor: &'static str,
        reason: String,
    },

    /// Failure inside the image library (decode, encode, I/O).
    #[error(transparent)]
    Image(#[from] ImageError),
}

impl ProcessorError {
    pub(crate) fn shape(processor: &'static str, reason: impl Into<String>) -> Self {
        Self::Shape {
            processor,
            reason: reason.into(),
        }
    }

    pub(crate) fn config(processor: &'static str, reason: impl Into<String>) -> Self {
        Self::Config {
            processor,
            reason: reason.into(),
        }
    }

    pub fn is_shape(&self) -> bool {
        matches!(self, Self::Shape { .. })
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

/// A specialized `Result` type for processor operations.
pub type ProcessorResult<T> = Result<T, ProcessorError>;
