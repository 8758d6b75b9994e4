//! Alpha-channel background substitution for RGBA renders.
//!
//! The input must carry exactly four channels. The output is a 3-channel
//! [`PixelType::F32`] image computed as `alpha * fg + (1 - alpha) * bg` and is
//! not clamped; cast downstream if 8-bit pixels are needed.

use std::{path::PathBuf, sync::Arc};

use augkit_image::{
    convert_color, load_image, resize_image, ColorConversion, FilterType, ImageBuffer, PixelType,
};
use rand::{seq::IndexedRandom, Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ProcessorError, ProcessorResult},
    processor::Processor,
    sample::Sample,
};

/// Range the alpha channel is stored in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlphaScale {
    /// `[0, 255]`
    #[default]
    Byte,
    /// `[0, 1]`
    Unit,
}

impl AlphaScale {
    fn normalize(self, alpha: f32) -> f32 {
        match self {
            Self::Byte => alpha / 255.0,
            Self::Unit => alpha,
        }
    }
}

/// Channel order the background pool should be delivered in. Files decode as
/// RGB.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorModel {
    #[default]
    Rgb,
    Bgr,
}

/// Splits an RGBA buffer into its colour planes and a normalised alpha mask.
fn split_foreground(
    processor: &'static str,
    image: &ImageBuffer,
    scale: AlphaScale,
) -> ProcessorResult<(ImageBuffer, Vec<f32>)> {
    if image.channels() != 4 {
        return Err(ProcessorError::shape(
            processor,
            format!(
                "image has {} channels but compositing needs a 4th alpha channel",
                image.channels()
            ),
        ));
    }
    let (foreground, alpha) = image.split_alpha()?;
    let alpha = alpha.into_iter().map(|a| scale.normalize(a)).collect();
    Ok((foreground, alpha))
}

/// Blends `foreground` over `background` with a per-pixel mask in `[0, 1]`.
///
/// Both images must be 3-channel with identical height and width, and
/// `alpha` must hold one value per pixel.
pub fn alpha_composite(
    foreground: &ImageBuffer,
    alpha: &[f32],
    background: &ImageBuffer,
) -> ProcessorResult<ImageBuffer> {
    let (height, width, channels) = foreground.dims();
    if background.dims() != (height, width, channels) {
        return Err(ProcessorError::shape(
            "alpha_composite",
            format!(
                "foreground is {:?} but background is {:?}",
                foreground.dims(),
                background.dims()
            ),
        ));
    }
    if alpha.len() != height * width {
        return Err(ProcessorError::shape(
            "alpha_composite",
            format!("alpha mask has {} values for {height}x{width} pixels", alpha.len()),
        ));
    }
    let data = foreground
        .as_slice()
        .chunks_exact(channels)
        .zip(background.as_slice().chunks_exact(channels))
        .zip(alpha)
        .flat_map(|((fg, bg), &a)| {
            fg.iter()
                .zip(bg)
                .map(move |(&f, &b)| a * f + (1.0 - a) * b)
        })
        .collect();
    Ok(ImageBuffer::from_raw(height, width, channels, data)?.with_pixel_type(PixelType::F32))
}

fn random_color(rng: &mut dyn RngCore) -> [f32; 3] {
    [
        f32::from(rng.random::<u8>()),
        f32::from(rng.random::<u8>()),
        f32::from(rng.random::<u8>()),
    ]
}

/// Composites over a solid colour, random per call when none is configured.
#[derive(Debug, Clone, Default)]
pub struct AddPlainBackground {
    color: Option<[f32; 3]>,
    alpha_scale: AlphaScale,
}

impl AddPlainBackground {
    pub fn new(color: Option<[f32; 3]>) -> Self {
        Self {
            color,
            alpha_scale: AlphaScale::default(),
        }
    }

    pub fn with_alpha_scale(mut self, alpha_scale: AlphaScale) -> Self {
        self.alpha_scale = alpha_scale;
        self
    }
}

impl Processor for AddPlainBackground {
    fn process(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let (foreground, alpha) = split_foreground(self.name(), &sample.image, self.alpha_scale)?;
        let color = match self.color {
            Some(color) => color,
            None => random_color(rng),
        };
        let background = ImageBuffer::filled(foreground.height(), foreground.width(), &color)?;
        let image = alpha_composite(&foreground, &alpha, &background)?;
        Ok(sample.with_image(image))
    }
}

/// A background pool entry: decoded on demand or already in memory.
#[derive(Debug, Clone)]
pub enum BackgroundSource {
    Path(PathBuf),
    Image(Arc<ImageBuffer>),
}

/// Composites over a random square patch cut from a random pool image.
///
/// A pool image smaller than `box_size` on either side falls back to a random
/// solid colour. The patch is resized to the foreground size when the two
/// differ.
#[derive(Debug, Clone)]
pub struct AddCroppedBackground {
    pool: Vec<BackgroundSource>,
    box_size: usize,
    color_model: ColorModel,
    alpha_scale: AlphaScale,
}

impl AddCroppedBackground {
    pub fn new<P: Into<PathBuf>>(
        paths: impl IntoIterator<Item = P>,
        box_size: usize,
    ) -> ProcessorResult<Self> {
        Self::from_sources(
            paths
                .into_iter()
                .map(|p| BackgroundSource::Path(p.into()))
                .collect(),
            box_size,
        )
    }

    pub fn from_images(images: Vec<ImageBuffer>, box_size: usize) -> ProcessorResult<Self> {
        Self::from_sources(
            images
                .into_iter()
                .map(|image| BackgroundSource::Image(Arc::new(image)))
                .collect(),
            box_size,
        )
    }

    pub fn from_sources(pool: Vec<BackgroundSource>, box_size: usize) -> ProcessorResult<Self> {
        if pool.is_empty() {
            return Err(ProcessorError::config(
                "AddCroppedBackground",
                "background pool is empty",
            ));
        }
        if box_size == 0 {
            return Err(ProcessorError::config(
                "AddCroppedBackground",
                "box_size must be positive",
            ));
        }
        Ok(Self {
            pool,
            box_size,
            color_model: ColorModel::default(),
            alpha_scale: AlphaScale::default(),
        })
    }

    pub fn with_color_model(mut self, color_model: ColorModel) -> Self {
        self.color_model = color_model;
        self
    }

    pub fn with_alpha_scale(mut self, alpha_scale: AlphaScale) -> Self {
        self.alpha_scale = alpha_scale;
        self
    }

    fn load_background(&self, source: &BackgroundSource) -> ProcessorResult<ImageBuffer> {
        let image = match source {
            BackgroundSource::Path(path) => load_image(path, 3)?,
            BackgroundSource::Image(image) => {
                if image.channels() != 3 {
                    return Err(ProcessorError::shape(
                        self.name(),
                        format!("background has {} channels, expected 3", image.channels()),
                    ));
                }
                ImageBuffer::clone(image)
            }
        };
        Ok(match self.color_model {
            ColorModel::Rgb => image,
            ColorModel::Bgr => convert_color(&image, ColorConversion::RgbToBgr)?,
        })
    }

    /// Cuts a random `box_size` square, or `None` when the image is too small.
    fn crop_patch(
        &self,
        background: &ImageBuffer,
        rng: &mut dyn RngCore,
    ) -> ProcessorResult<Option<ImageBuffer>> {
        let (height, width, _) = background.dims();
        if self.box_size > height || self.box_size > width {
            return Ok(None);
        }
        let x_min = rng.random_range(0..=width - self.box_size);
        let y_min = rng.random_range(0..=height - self.box_size);
        let patch = background.crop(x_min, y_min, x_min + self.box_size, y_min + self.box_size)?;
        Ok(Some(patch))
    }
}

impl Processor for AddCroppedBackground {
    fn process(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let (foreground, alpha) = split_foreground(self.name(), &sample.image, self.alpha_scale)?;
        let (height, width, _) = foreground.dims();

        // pool is non-empty by construction
        let Some(source) = self.pool.choose(rng) else {
            return Err(ProcessorError::config(self.name(), "background pool is empty"));
        };
        let background = self.load_background(source)?;
        let background = match self.crop_patch(&background, rng)? {
            Some(patch) if patch.height() == height && patch.width() == width => patch,
            Some(patch) => resize_image(&patch, (height, width), FilterType::Triangle)?,
            None => {
                tracing::debug!(
                    box_size = self.box_size,
                    background = ?background.dims(),
                    "background smaller than crop box, using a plain colour"
                );
                ImageBuffer::filled(height, width, &random_color(rng))?
            }
        };

        let image = alpha_composite(&foreground, &alpha, &background)?;
        Ok(sample.with_image(image))
    }
}
