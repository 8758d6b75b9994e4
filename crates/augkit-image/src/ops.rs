//! Thin bindings to the `image` and `imageproc` crates expressed over
//! [`ImageBuffer`]: decoding, resizing, colour conversion, encoding and polygon
//! rasterisation.

use std::{io::Cursor, path::Path};

use image::{
    codecs::jpeg::JpegEncoder, imageops, ExtendedColorType, ImageBuffer as RawBuffer,
    ImageFormat, Luma, Rgb, Rgba,
};
use imageproc::{
    drawing::{draw_polygon_mut, Canvas},
    point::Point,
};
use serde::{Deserialize, Serialize};

pub use image::imageops::FilterType;

use crate::{
    buffer::{ImageBuffer, PixelType},
    error::{ImageError, ImageResult},
};

pub const BGR_IMAGENET_MEAN: [f32; 3] = [104.0, 117.0, 123.0];
pub const RGB_IMAGENET_MEAN: [f32; 3] = [123.0, 117.0, 104.0];

/// Colour-space conversions supported by [`convert_color`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorConversion {
    BgrToRgb,
    RgbToBgr,
    RgbToGray,
    BgrToGray,
    GrayToRgb,
    RgbaToRgb,
    BgraToBgr,
}

/// Decodes an encoded image (any format the `image` crate was built with).
pub fn decode(bytes: &[u8], channels: usize) -> ImageResult<ImageBuffer> {
    let image = image::load_from_memory(bytes).map_err(|source| ImageError::Decode { source })?;
    ImageBuffer::from_dynamic(image, channels)
}

/// Loads and decodes the image at `path` with the requested channel count.
pub fn load_image<P: AsRef<Path>>(path: P, channels: usize) -> ImageResult<ImageBuffer> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| ImageError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    ImageBuffer::from_dynamic(image, channels)
}

/// Writes `image` to `path`; the format follows the file extension.
pub fn write_image<P: AsRef<Path>>(path: P, image: &ImageBuffer) -> ImageResult<()> {
    let path = path.as_ref();
    image
        .to_dynamic()?
        .save(path)
        .map_err(|source| ImageError::Save {
            path: path.to_path_buf(),
            source,
        })
}

/// Encodes `image` (1 or 3 channels) as JPEG at the given quality.
pub fn encode_jpeg(image: &ImageBuffer, quality: u8) -> ImageResult<Vec<u8>> {
    let color_type = match image.channels() {
        1 => ExtendedColorType::L8,
        3 => ExtendedColorType::Rgb8,
        other => {
            return Err(ImageError::ChannelMismatch {
                expected: 3,
                actual: other,
            })
        }
    };
    let dynamic = image.to_dynamic()?;
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode(
            dynamic.as_bytes(),
            image.width() as u32,
            image.height() as u32,
            color_type,
        )
        .map_err(|source| ImageError::Encode { source })?;
    Ok(bytes)
}

/// Decodes JPEG bytes produced by [`encode_jpeg`].
pub fn decode_jpeg(bytes: &[u8], channels: usize) -> ImageResult<ImageBuffer> {
    let image = image::load(Cursor::new(bytes), ImageFormat::Jpeg)
        .map_err(|source| ImageError::Decode { source })?;
    ImageBuffer::from_dynamic(image, channels)
}

/// Round-trips `image` through JPEG at `quality`.
///
/// [`PixelType::U8`] buffers are encoded as they are. Float buffers are
/// stretched from their value range onto `[0, 255]` first and mapped back
/// after decoding, so normalised or mean-shifted images keep their scale.
pub fn recompress_jpeg(image: &ImageBuffer, quality: u8) -> ImageResult<ImageBuffer> {
    match image.pixel_type() {
        PixelType::U8 => decode_jpeg(&encode_jpeg(image, quality)?, image.channels()),
        PixelType::F32 => {
            let range = UnitRange::of(image);
            let scaled: Vec<f32> = range.to_unit(image).into_iter().map(|v| v * 255.0).collect();
            let stretched =
                ImageBuffer::from_raw(image.height(), image.width(), image.channels(), scaled)?;
            let decoded = decode_jpeg(&encode_jpeg(&stretched, quality)?, image.channels())?;
            let unit = decoded.as_slice().iter().map(|v| v / 255.0).collect();
            let data = range.restore(unit, PixelType::F32);
            Ok(ImageBuffer::from_raw(image.height(), image.width(), image.channels(), data)?
                .with_pixel_type(PixelType::F32))
        }
    }
}

/// Affine map of a buffer's value range onto `[0, 1]`, the range the `image`
/// crate clamps float samples to.
struct UnitRange {
    lo: f32,
    span: f32,
}

impl UnitRange {
    fn of(image: &ImageBuffer) -> Self {
        let (lo, hi) = image
            .as_slice()
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let span = if hi > lo { hi - lo } else { 1.0 };
        Self { lo, span }
    }

    fn to_unit(&self, image: &ImageBuffer) -> Vec<f32> {
        image.as_slice().iter().map(|v| (v - self.lo) / self.span).collect()
    }

    fn restore(&self, unit: Vec<f32>, pixel_type: PixelType) -> Vec<f32> {
        unit.into_iter()
            .map(|v| {
                let value = v * self.span + self.lo;
                match pixel_type {
                    PixelType::U8 => value.round(),
                    PixelType::F32 => value,
                }
            })
            .collect()
    }
}

/// Resizes to `(height, width)` with the given filter.
///
/// The buffer is mapped onto `[0, 1]` for filtering and back, so filter
/// overshoot is bounded by the input's own value range.
pub fn resize_image(
    image: &ImageBuffer,
    size: (usize, usize),
    filter: FilterType,
) -> ImageResult<ImageBuffer> {
    let (height, width) = size;
    if height == 0 || width == 0 {
        return Err(ImageError::EmptyImage { height, width });
    }
    if image.is_empty() {
        return Err(ImageError::EmptyImage {
            height: image.height(),
            width: image.width(),
        });
    }
    let range = UnitRange::of(image);
    let unit = range.to_unit(image);

    let (w, h) = (image.width() as u32, image.height() as u32);
    let (nw, nh) = (width as u32, height as u32);
    let mismatch = || ImageError::DataLengthMismatch {
        expected: image.height() * image.width() * image.channels(),
        actual: image.as_slice().len(),
    };
    let resized = match image.channels() {
        1 => {
            let raw = RawBuffer::<Luma<f32>, _>::from_raw(w, h, unit).ok_or_else(mismatch)?;
            imageops::resize(&raw, nw, nh, filter).into_raw()
        }
        3 => {
            let raw = RawBuffer::<Rgb<f32>, _>::from_raw(w, h, unit).ok_or_else(mismatch)?;
            imageops::resize(&raw, nw, nh, filter).into_raw()
        }
        4 => {
            let raw = RawBuffer::<Rgba<f32>, _>::from_raw(w, h, unit).ok_or_else(mismatch)?;
            imageops::resize(&raw, nw, nh, filter).into_raw()
        }
        other => return Err(ImageError::UnsupportedChannelCount { channels: other }),
    };

    let pixel_type = image.pixel_type();
    let data = range.restore(resized, pixel_type);
    Ok(ImageBuffer::from_raw(height, width, image.channels(), data)?.with_pixel_type(pixel_type))
}

/// Rotates the hue of a 3-channel image by `degrees` with
/// [`imageops::huerotate`].
///
/// Values are mapped onto `[0, 1]` and back like [`resize_image`]. The
/// rotation keeps the channel sum of every pixel, so grays stay put and
/// results are clamped to the input's value range.
pub fn rotate_hue(image: &ImageBuffer, degrees: i32) -> ImageResult<ImageBuffer> {
    if image.channels() != 3 {
        return Err(ImageError::ChannelMismatch {
            expected: 3,
            actual: image.channels(),
        });
    }
    let range = UnitRange::of(image);
    let (w, h) = (image.width() as u32, image.height() as u32);
    let raw = RawBuffer::<Rgb<f32>, _>::from_raw(w, h, range.to_unit(image)).ok_or_else(|| {
        ImageError::DataLengthMismatch {
            expected: image.height() * image.width() * 3,
            actual: image.as_slice().len(),
        }
    })?;
    let rotated = imageops::huerotate(&raw, degrees).into_raw();

    let pixel_type = image.pixel_type();
    let data = range.restore(rotated, pixel_type);
    Ok(ImageBuffer::from_raw(image.height(), image.width(), 3, data)?.with_pixel_type(pixel_type))
}

/// Converts between channel layouts. Gray uses ITU-R BT.601 luma weights.
pub fn convert_color(image: &ImageBuffer, conversion: ColorConversion) -> ImageResult<ImageBuffer> {
    let expect = |expected: usize| {
        if image.channels() == expected {
            Ok(())
        } else {
            Err(ImageError::ChannelMismatch {
                expected,
                actual: image.channels(),
            })
        }
    };
    match conversion {
        ColorConversion::BgrToRgb | ColorConversion::RgbToBgr => {
            expect(3)?;
            image.select_channels(&[2, 1, 0])
        }
        ColorConversion::RgbaToRgb | ColorConversion::BgraToBgr => {
            expect(4)?;
            image.select_channels(&[0, 1, 2])
        }
        ColorConversion::GrayToRgb => {
            expect(1)?;
            image.select_channels(&[0, 0, 0])
        }
        ColorConversion::RgbToGray | ColorConversion::BgrToGray => {
            expect(3)?;
            let [r, g, b] = if conversion == ColorConversion::RgbToGray {
                [0, 1, 2]
            } else {
                [2, 1, 0]
            };
            let data = image
                .as_slice()
                .chunks_exact(3)
                .map(|px| 0.299 * px[r] + 0.587 * px[g] + 0.114 * px[b])
                .collect();
            Ok(ImageBuffer::from_raw(image.height(), image.width(), 1, data)?
                .with_pixel_type(PixelType::F32))
        }
    }
}

impl Canvas for ImageBuffer {
    type Pixel = Rgba<f32>;

    fn dimensions(&self) -> (u32, u32) {
        (self.width() as u32, self.height() as u32)
    }

    fn get_pixel(&self, x: u32, y: u32) -> Self::Pixel {
        let mut out = [0.0; 4];
        let pixel = self.pixel(y as usize, x as usize);
        out[..pixel.len()].copy_from_slice(pixel);
        Rgba(out)
    }

    fn draw_pixel(&mut self, x: u32, y: u32, color: Self::Pixel) {
        let channels = self.channels();
        self.pixel_mut(y as usize, x as usize)
            .copy_from_slice(&color.0[..channels]);
    }
}

/// Fills the polygon with the given RGB colour in place. Vertices outside the
/// image are clipped. Gray images receive the colour's luma, alpha channels
/// are set to 255.
pub fn draw_filled_polygon(image: &mut ImageBuffer, vertices: &[(i32, i32)], color: [f32; 3]) {
    if image.is_empty() {
        return;
    }
    let mut points: Vec<Point<i32>> = vertices.iter().map(|&(x, y)| Point::new(x, y)).collect();
    // imageproc expects an open polygon
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    let fill = match image.channels() {
        1 => {
            let luma = 0.299 * color[0] + 0.587 * color[1] + 0.114 * color[2];
            Rgba([luma, 0.0, 0.0, 0.0])
        }
        _ => Rgba([color[0], color[1], color[2], 255.0]),
    };
    match points.as_slice() {
        [] => {}
        [single] => {
            let (x, y) = (single.x, single.y);
            if x >= 0 && y >= 0 && (x as usize) < image.width() && (y as usize) < image.height() {
                image.draw_pixel(x as u32, y as u32, fill);
            }
        }
        polygon => draw_polygon_mut(image, polygon, fill),
    }
}
