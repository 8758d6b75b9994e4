//! `augkit`: composable, seed-reproducible augmentation for images with
//! keypoint and box annotations.
//!
//! ```no_run
//! use augkit::pipeline::{
//!     processors::{AddOcclusion, ExpandImage, RandomImageCrop, ResizeImage},
//!     Pipeline, ProcessorExt,
//! };
//! use augkit::image::BGR_IMAGENET_MEAN;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new()
//!     .add(ExpandImage::new(BGR_IMAGENET_MEAN)?.with_probability(0.5)?)
//!     .add(RandomImageCrop::new())
//!     .add(AddOcclusion::default().with_probability(0.5)?)
//!     .add(ResizeImage::new((300, 300))?);
//! let sample = augkit::pipeline::processors::LoadImage::default().load("hand.jpg")?;
//! let augmented = pipeline.run_seeded(sample, 42)?;
//! # let _ = augmented;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "dataset")]
#[doc(inline)]
pub use augkit_dataset as dataset;
#[doc(inline)]
pub use augkit_image as image;
#[doc(inline)]
pub use augkit_pipeline as pipeline;
