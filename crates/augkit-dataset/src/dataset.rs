//! Lazy dataset view with per-index seeded augmentation.

use std::sync::Arc;

use augkit_pipeline::{Pipeline, Sample};
use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    discovery::FilePair,
    error::{DatasetError, DatasetResult},
    loader::{HandKeypoints, HandKeypointsConfig},
};

/// Hand-keypoint samples loaded on access.
///
/// Index `i` is augmented with an `StdRng` seeded from `seed + i`, so the
/// sample returned for an index does not depend on access order or on the
/// worker thread that loads it.
pub struct HandKeypointsDataset {
    loader: HandKeypoints,
    pairs: Vec<FilePair>,
    pipeline: Option<Arc<Pipeline>>,
    seed: u64,
}

impl HandKeypointsDataset {
    pub fn new(config: HandKeypointsConfig) -> DatasetResult<Self> {
        let loader = HandKeypoints::new(config)?;
        let pairs = loader.load_paths()?;
        Ok(Self {
            loader,
            pairs,
            pipeline: None,
            seed: 0,
        })
    }

    /// Augments every sample with `pipeline`, using `seed` as the base seed.
    pub fn with_pipeline(mut self, pipeline: impl Into<Arc<Pipeline>>, seed: u64) -> Self {
        self.pipeline = Some(pipeline.into());
        self.seed = seed;
        self
    }

    pub fn pairs(&self) -> &[FilePair] {
        &self.pairs
    }

    /// Like [`Dataset::get`] but reports why a sample could not be produced.
    pub fn try_get(&self, index: usize) -> DatasetResult<Option<Sample>> {
        let Some(pair) = self.pairs.get(index) else {
            return Ok(None);
        };
        let sample = self.loader.load_sample(pair)?;
        let sample = match &self.pipeline {
            Some(pipeline) => {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(index as u64));
                pipeline
                    .run(sample, &mut rng)
                    .map_err(|source| DatasetError::Augmentation { index, source })?
            }
            None => sample,
        };
        Ok(Some(sample))
    }
}

impl Dataset<Sample> for HandKeypointsDataset {
    fn get(&self, index: usize) -> Option<Sample> {
        match self.try_get(index) {
            Ok(sample) => sample,
            Err(error) => {
                tracing::warn!(index, %error, "failed to load sample");
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}
