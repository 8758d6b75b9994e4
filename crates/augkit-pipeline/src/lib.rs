//! Composable, probability-gated processors and sequential pipelines for
//! image and keypoint augmentation.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod processor;
pub mod processors;
pub mod sample;

// Re-export commonly used types
pub use config::{PipelineConfig, ProcessorConfig, ProcessorKind, ResizeFilter};
pub use error::{ProcessorError, ProcessorResult};
pub use pipeline::Pipeline;
pub use processor::{Probabilistic, Processor, ProcessorExt};
pub use sample::{BoundingBox, Keypoint, Sample};
