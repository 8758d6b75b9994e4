//! In-memory `[H, W, C]` image representation shared by every processor.
//!
//! Pixels are stored row-major (HWC) as `f32` regardless of the logical pixel
//! type. [`PixelType::U8`] marks buffers whose values are integral and lie in
//! `[0, 255]`; [`PixelType::F32`] marks buffers produced by arithmetic stages
//! (normalisation, mean subtraction, compositing) where no range is implied.

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{ImageError, ImageResult};

/// Logical element type of an [`ImageBuffer`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    /// Integral values in `[0, 255]`.
    #[default]
    U8,
    /// Unconstrained floating point values.
    F32,
}

/// A 3D `[height, width, channels]` image with `channels` in `{1, 3, 4}`.
///
/// When `channels == 4` the last channel is an alpha mask; whether it spans
/// `[0, 255]` or `[0, 1]` is stated by the processor that consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    data: Vec<f32>,
    height: usize,
    width: usize,
    channels: usize,
    pixel_type: PixelType,
}

impl ImageBuffer {
    /// Wraps raw HWC data, validating the channel count and length.
    pub fn from_raw(
        height: usize,
        width: usize,
        channels: usize,
        data: Vec<f32>,
    ) -> ImageResult<Self> {
        check_channels(channels)?;
        let expected = height * width * channels;
        if data.len() != expected {
            return Err(ImageError::DataLengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            height,
            width,
            channels,
            pixel_type: PixelType::U8,
        })
    }

    /// Builds a buffer from 8-bit HWC data.
    pub fn from_u8(height: usize, width: usize, channels: usize, data: &[u8]) -> ImageResult<Self> {
        Self::from_raw(
            height,
            width,
            channels,
            data.iter().map(|&v| f32::from(v)).collect(),
        )
    }

    /// Creates a buffer whose every pixel equals `color`; the channel count is
    /// `color.len()`.
    pub fn filled(height: usize, width: usize, color: &[f32]) -> ImageResult<Self> {
        let channels = color.len();
        check_channels(channels)?;
        let mut data = Vec::with_capacity(height * width * channels);
        for _ in 0..height * width {
            data.extend_from_slice(color);
        }
        Self::from_raw(height, width, channels, data)
    }

    pub fn zeros(height: usize, width: usize, channels: usize) -> ImageResult<Self> {
        check_channels(channels)?;
        Self::from_raw(height, width, channels, vec![0.0; height * width * channels])
    }

    /// Converts a decoded image, forcing `channels` (1, 3 or 4).
    pub fn from_dynamic(image: DynamicImage, channels: usize) -> ImageResult<Self> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let raw = match channels {
            1 => image.into_luma8().into_raw(),
            3 => image.into_rgb8().into_raw(),
            4 => image.into_rgba8().into_raw(),
            other => return Err(ImageError::UnsupportedChannelCount { channels: other }),
        };
        Self::from_u8(height, width, channels, &raw)
    }

    /// Converts to an 8-bit [`DynamicImage`], rounding and clamping to `[0, 255]`.
    pub fn to_dynamic(&self) -> ImageResult<DynamicImage> {
        let raw: Vec<u8> = self
            .data
            .iter()
            .map(|v| v.round().clamp(0.0, 255.0) as u8)
            .collect();
        let (w, h) = (self.width as u32, self.height as u32);
        let mismatch = || ImageError::DataLengthMismatch {
            expected: self.height * self.width * self.channels,
            actual: self.data.len(),
        };
        Ok(match self.channels {
            1 => DynamicImage::ImageLuma8(GrayImage::from_raw(w, h, raw).ok_or_else(mismatch)?),
            3 => DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, raw).ok_or_else(mismatch)?),
            4 => DynamicImage::ImageRgba8(RgbaImage::from_raw(w, h, raw).ok_or_else(mismatch)?),
            other => return Err(ImageError::UnsupportedChannelCount { channels: other }),
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// `(height, width, channels)`
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    pub fn with_pixel_type(mut self, pixel_type: PixelType) -> Self {
        self.pixel_type = pixel_type;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<f32> {
        self.data
    }

    #[inline]
    fn offset(&self, y: usize, x: usize) -> usize {
        (y * self.width + x) * self.channels
    }

    /// Channel values of the pixel at row `y`, column `x`.
    ///
    /// # Panics
    /// Panics when `(y, x)` lies outside the image.
    pub fn pixel(&self, y: usize, x: usize) -> &[f32] {
        let start = self.offset(y, x);
        &self.data[start..start + self.channels]
    }

    /// Mutable counterpart of [`pixel`](Self::pixel).
    pub fn pixel_mut(&mut self, y: usize, x: usize) -> &mut [f32] {
        let start = self.offset(y, x);
        let channels = self.channels;
        &mut self.data[start..start + channels]
    }

    /// Applies `f` to every element. The result is marked [`PixelType::F32`].
    pub fn map(mut self, f: impl Fn(f32) -> f32) -> Self {
        self.data.iter_mut().for_each(|v| *v = f(*v));
        self.pixel_type = PixelType::F32;
        self
    }

    /// Applies `f(channel_index, value)` to every element.
    pub fn map_channels(mut self, f: impl Fn(usize, f32) -> f32) -> Self {
        let channels = self.channels;
        for pixel in self.data.chunks_exact_mut(channels) {
            for (c, v) in pixel.iter_mut().enumerate() {
                *v = f(c, *v);
            }
        }
        self.pixel_type = PixelType::F32;
        self
    }

    /// Copies the half-open region `[y1, y2) x [x1, x2)` into a new buffer.
    pub fn crop(&self, x1: usize, y1: usize, x2: usize, y2: usize) -> ImageResult<Self> {
        if x1 > x2 || y1 > y2 || x2 > self.width || y2 > self.height {
            return Err(ImageError::RegionOutOfBounds {
                x1,
                y1,
                x2,
                y2,
                height: self.height,
                width: self.width,
            });
        }
        let (height, width) = (y2 - y1, x2 - x1);
        if height == 0 || width == 0 {
            return Err(ImageError::EmptyImage { height, width });
        }
        let mut data = Vec::with_capacity(height * width * self.channels);
        for y in y1..y2 {
            let start = self.offset(y, x1);
            data.extend_from_slice(&self.data[start..start + width * self.channels]);
        }
        Ok(Self {
            data,
            height,
            width,
            channels: self.channels,
            pixel_type: self.pixel_type,
        })
    }

    /// Overwrites the region starting at `(top, left)` with `source`.
    pub fn paste(&mut self, source: &ImageBuffer, top: usize, left: usize) -> ImageResult<()> {
        if source.channels != self.channels {
            return Err(ImageError::ChannelMismatch {
                expected: self.channels,
                actual: source.channels,
            });
        }
        let (y2, x2) = (top + source.height, left + source.width);
        if y2 > self.height || x2 > self.width {
            return Err(ImageError::RegionOutOfBounds {
                x1: left,
                y1: top,
                x2,
                y2,
                height: self.height,
                width: self.width,
            });
        }
        let row_len = source.width * source.channels;
        for row in 0..source.height {
            let dst = self.offset(top + row, left);
            let src = row * row_len;
            self.data[dst..dst + row_len].copy_from_slice(&source.data[src..src + row_len]);
        }
        Ok(())
    }

    /// Builds a new buffer from the channels listed in `order`.
    pub fn select_channels(&self, order: &[usize]) -> ImageResult<Self> {
        check_channels(order.len())?;
        if let Some(&bad) = order.iter().find(|&&c| c >= self.channels) {
            return Err(ImageError::ChannelMismatch {
                expected: self.channels,
                actual: bad + 1,
            });
        }
        let mut data = Vec::with_capacity(self.height * self.width * order.len());
        for pixel in self.data.chunks_exact(self.channels) {
            data.extend(order.iter().map(|&c| pixel[c]));
        }
        Ok(Self {
            data,
            height: self.height,
            width: self.width,
            channels: order.len(),
            pixel_type: self.pixel_type,
        })
    }

    /// Splits a 4-channel image into its 3-channel colour part and its alpha
    /// plane (one value per pixel, unscaled).
    pub fn split_alpha(&self) -> ImageResult<(ImageBuffer, Vec<f32>)> {
        if self.channels != 4 {
            return Err(ImageError::ChannelMismatch {
                expected: 4,
                actual: self.channels,
            });
        }
        let color = self.select_channels(&[0, 1, 2])?;
        let alpha = self.data.chunks_exact(4).map(|px| px[3]).collect();
        Ok((color, alpha))
    }
}

fn check_channels(channels: usize) -> ImageResult<()> {
    match channels {
        1 | 3 | 4 => Ok(()),
        other => Err(ImageError::UnsupportedChannelCount { channels: other }),
    }
}
