//! Hand-keypoint dataset loading: stem-aligned file discovery, label parsing,
//! eager and lazy loaders, and burn batching.

pub mod batch;
pub mod dataset;
pub mod discovery;
pub mod error;
pub mod label;
pub mod loader;

// Re-export commonly used types
pub use batch::{KeypointBatch, KeypointBatcher};
pub use dataset::HandKeypointsDataset;
pub use discovery::{discover_pairs, FilePair};
pub use error::{DatasetError, DatasetResult};
pub use label::{load_keypoints, KeypointRecord, NUM_KEYPOINTS};
pub use loader::{stack_samples, HandKeypoints, HandKeypointsConfig, KeypointArrays, Split};
