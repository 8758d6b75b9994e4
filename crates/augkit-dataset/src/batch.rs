//! Tensor batches for burn data loaders.

use std::marker::PhantomData;

use augkit_pipeline::Sample;
use burn::{
    data::dataloader::batcher::Batcher,
    tensor::{backend::Backend, Tensor, TensorData},
};

use crate::{
    error::{DatasetError, DatasetResult},
    label::NUM_KEYPOINTS,
    loader::stack_samples,
};

/// A batch of equally sized images and, for labelled data, their keypoints.
#[derive(Debug, Clone)]
pub struct KeypointBatch<B: Backend> {
    /// `[N, H, W, C]`
    pub images: Tensor<B, 4>,
    /// `[N, 21, 3]`
    pub keypoints: Option<Tensor<B, 3>>,
}

impl<B: Backend> KeypointBatch<B> {
    /// Stacks `samples`; they must share one image shape and either all or
    /// none carry 21 keypoints.
    pub fn from_samples(samples: &[Sample], device: &B::Device) -> DatasetResult<Self> {
        let first = samples.first().ok_or(DatasetError::EmptyBatch)?;
        let (height, width, channels) = first.image.dims();
        let arrays = stack_samples(samples, [height, width, channels])?;

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(arrays.images, [arrays.len, height, width, channels]),
            device,
        );
        let keypoints = arrays.keypoints.map(|keypoints| {
            Tensor::<B, 3>::from_data(
                TensorData::new(keypoints, [arrays.len, NUM_KEYPOINTS, 3]),
                device,
            )
        });
        Ok(Self { images, keypoints })
    }
}

/// Batcher turning samples into a [`KeypointBatch`].
#[derive(Clone, Default)]
pub struct KeypointBatcher<B: Backend> {
    _phantom: PhantomData<B>,
}

impl<B: Backend> KeypointBatcher<B> {
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B: Backend> Batcher<B, Sample, KeypointBatch<B>> for KeypointBatcher<B> {
    fn batch(&self, items: Vec<Sample>, device: &B::Device) -> KeypointBatch<B> {
        KeypointBatch::from_samples(&items, device)
            .expect("Samples in a batch must share one shape")
    }
}
