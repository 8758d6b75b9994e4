//! Pixel-value processors: casting, normalisation, mean shifts and colour
//! jitter. None of these touch annotations.

use augkit_image::{
    convert_color, ops::recompress_jpeg, rotate_hue, ColorConversion, ImageBuffer, PixelType,
};
use rand::{seq::IndexedRandom, Rng, RngCore};

use crate::{
    error::{ProcessorError, ProcessorResult},
    processor::{uniform, Processor},
    sample::Sample,
};

fn require_channels(processor: &'static str, image: &ImageBuffer, expected: usize) -> ProcessorResult<()> {
    if image.channels() == expected {
        Ok(())
    } else {
        Err(ProcessorError::shape(
            processor,
            format!(
                "expected a {expected}-channel image, got {} channels",
                image.channels()
            ),
        ))
    }
}

/// Casts the image to the given pixel type. Casting to [`PixelType::U8`]
/// rounds and clamps to `[0, 255]`.
#[derive(Debug, Clone)]
pub struct CastImage {
    pixel_type: PixelType,
}

impl CastImage {
    pub fn new(pixel_type: PixelType) -> Self {
        Self { pixel_type }
    }
}

impl Processor for CastImage {
    fn process(&self, sample: Sample, _rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let image = match self.pixel_type {
            PixelType::U8 => sample
                .image
                .clone()
                .map(|v| v.round().clamp(0.0, 255.0))
                .with_pixel_type(PixelType::U8),
            PixelType::F32 => sample.image.clone().with_pixel_type(PixelType::F32),
        };
        Ok(sample.with_image(image))
    }
}

fn check_mean(processor: &'static str, mean: &[f32]) -> ProcessorResult<()> {
    if mean.is_empty() {
        Err(ProcessorError::config(processor, "mean must not be empty"))
    } else {
        Ok(())
    }
}

fn shift_by_mean(
    processor: &'static str,
    image: &ImageBuffer,
    mean: &[f32],
    sign: f32,
) -> ProcessorResult<ImageBuffer> {
    require_channels(processor, image, mean.len())?;
    Ok(image.clone().map_channels(|c, v| v + sign * mean[c]))
}

/// Subtracts a channel-wise mean.
#[derive(Debug, Clone)]
pub struct SubtractMeanImage {
    mean: Vec<f32>,
}

impl SubtractMeanImage {
    pub fn new(mean: impl Into<Vec<f32>>) -> ProcessorResult<Self> {
        let mean = mean.into();
        check_mean("SubtractMeanImage", &mean)?;
        Ok(Self { mean })
    }
}

impl Processor for SubtractMeanImage {
    fn process(&self, sample: Sample, _rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let image = shift_by_mean(self.name(), &sample.image, &self.mean, -1.0)?;
        Ok(sample.with_image(image))
    }
}

/// Adds a channel-wise mean back.
#[derive(Debug, Clone)]
pub struct AddMeanImage {
    mean: Vec<f32>,
}

impl AddMeanImage {
    pub fn new(mean: impl Into<Vec<f32>>) -> ProcessorResult<Self> {
        let mean = mean.into();
        check_mean("AddMeanImage", &mean)?;
        Ok(Self { mean })
    }
}

impl Processor for AddMeanImage {
    fn process(&self, sample: Sample, _rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let image = shift_by_mean(self.name(), &sample.image, &self.mean, 1.0)?;
        Ok(sample.with_image(image))
    }
}

/// Divides every value by 255.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeImage;

impl Processor for NormalizeImage {
    fn process(&self, sample: Sample, _rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let image = sample.image.clone().map(|v| v / 255.0);
        Ok(sample.with_image(image))
    }
}

/// Multiplies every value by 255.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenormalizeImage;

impl Processor for DenormalizeImage {
    fn process(&self, sample: Sample, _rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let image = sample.image.clone().map(|v| v * 255.0);
        Ok(sample.with_image(image))
    }
}

fn check_range(processor: &'static str, lower: f32, upper: f32) -> ProcessorResult<()> {
    if lower.is_finite() && upper.is_finite() && 0.0 <= lower && lower <= upper {
        Ok(())
    } else {
        Err(ProcessorError::config(
            processor,
            format!("expected 0 <= lower <= upper (got {lower}, {upper})"),
        ))
    }
}

/// Scales saturation by a factor drawn from `[lower, upper)`, blending each
/// pixel with its luma.
#[derive(Debug, Clone)]
pub struct RandomSaturation {
    lower: f32,
    upper: f32,
}

impl RandomSaturation {
    pub fn new(lower: f32, upper: f32) -> ProcessorResult<Self> {
        check_range("RandomSaturation", lower, upper)?;
        Ok(Self { lower, upper })
    }
}

impl Processor for RandomSaturation {
    fn process(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        require_channels(self.name(), &sample.image, 3)?;
        let factor = uniform(rng, self.lower.into(), self.upper.into()) as f32;
        let gray = convert_color(&sample.image, ColorConversion::RgbToGray)?;
        let mut image = sample.image.clone().with_pixel_type(PixelType::F32);
        for (pixel, &luma) in image
            .as_mut_slice()
            .chunks_exact_mut(3)
            .zip(gray.as_slice())
        {
            pixel.iter_mut().for_each(|v| *v = luma + factor * (*v - luma));
        }
        Ok(sample.with_image(image))
    }
}

/// Adds a delta drawn from `[-max_delta, max_delta)` to every value.
#[derive(Debug, Clone)]
pub struct RandomBrightness {
    max_delta: f32,
}

impl RandomBrightness {
    pub const DEFAULT_MAX_DELTA: f32 = 32.0;

    pub fn new(max_delta: f32) -> ProcessorResult<Self> {
        if !(max_delta.is_finite() && max_delta >= 0.0) {
            return Err(ProcessorError::config(
                "RandomBrightness",
                format!("max_delta must be non-negative (got {max_delta})"),
            ));
        }
        Ok(Self { max_delta })
    }
}

impl Default for RandomBrightness {
    fn default() -> Self {
        Self {
            max_delta: Self::DEFAULT_MAX_DELTA,
        }
    }
}

impl Processor for RandomBrightness {
    fn process(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let delta = uniform(rng, -f64::from(self.max_delta), self.max_delta.into()) as f32;
        let image = sample.image.clone().map(|v| v + delta);
        Ok(sample.with_image(image))
    }
}

/// Scales each channel's deviation from its mean by a factor drawn from
/// `[lower, upper)`.
#[derive(Debug, Clone)]
pub struct RandomContrast {
    lower: f32,
    upper: f32,
}

impl RandomContrast {
    pub fn new(lower: f32, upper: f32) -> ProcessorResult<Self> {
        check_range("RandomContrast", lower, upper)?;
        Ok(Self { lower, upper })
    }
}

impl Default for RandomContrast {
    fn default() -> Self {
        Self {
            lower: 0.5,
            upper: 1.5,
        }
    }
}

impl Processor for RandomContrast {
    fn process(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let factor = uniform(rng, self.lower.into(), self.upper.into()) as f32;
        let channels = sample.image.channels();
        let pixels = (sample.image.height() * sample.image.width()).max(1) as f32;
        let mut means = vec![0.0f32; channels];
        for pixel in sample.image.as_slice().chunks_exact(channels) {
            for (mean, v) in means.iter_mut().zip(pixel) {
                *mean += v / pixels;
            }
        }
        let image = sample
            .image
            .clone()
            .map_channels(|c, v| (v - means[c]) * factor + means[c]);
        Ok(sample.with_image(image))
    }
}

/// Rotates hue by a whole number of degrees drawn from `[-max_delta, max_delta]`.
#[derive(Debug, Clone)]
pub struct RandomHue {
    max_delta: f32,
}

impl RandomHue {
    pub const DEFAULT_MAX_DELTA: f32 = 18.0;

    pub fn new(max_delta: f32) -> ProcessorResult<Self> {
        if !(0.0..=180.0).contains(&max_delta) {
            return Err(ProcessorError::config(
                "RandomHue",
                format!("max_delta must be in [0, 180] degrees (got {max_delta})"),
            ));
        }
        Ok(Self { max_delta })
    }
}

impl Default for RandomHue {
    fn default() -> Self {
        Self {
            max_delta: Self::DEFAULT_MAX_DELTA,
        }
    }
}

impl Processor for RandomHue {
    fn process(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        require_channels(self.name(), &sample.image, 3)?;
        let degrees = uniform(rng, -f64::from(self.max_delta), self.max_delta.into()).round();
        let image = sample.image.clone().with_pixel_type(PixelType::F32);
        let image = rotate_hue(&image, degrees as i32)?;
        Ok(sample.with_image(image))
    }
}

/// Re-encodes the image as JPEG at a quality drawn from `[lower, upper]`.
///
/// The pixel type and value scale of the input are kept.
#[derive(Debug, Clone)]
pub struct RandomImageQuality {
    lower: u8,
    upper: u8,
}

impl RandomImageQuality {
    pub fn new(lower: u8, upper: u8) -> ProcessorResult<Self> {
        if !(1 <= lower && lower <= upper && upper <= 100) {
            return Err(ProcessorError::config(
                "RandomImageQuality",
                format!("expected 1 <= lower <= upper <= 100 (got {lower}, {upper})"),
            ));
        }
        Ok(Self { lower, upper })
    }
}

impl Processor for RandomImageQuality {
    fn process(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let channels = sample.image.channels();
        if channels == 4 {
            return Err(ProcessorError::shape(
                self.name(),
                "JPEG cannot carry an alpha channel",
            ));
        }
        let quality = rng.random_range(self.lower..=self.upper);
        let image = recompress_jpeg(&sample.image, quality)?;
        Ok(sample.with_image(image))
    }
}

/// Swaps colour channels with a permutation chosen uniformly from a set.
#[derive(Debug, Clone)]
pub struct RandomLightingNoise {
    permutations: Vec<[usize; 3]>,
}

impl RandomLightingNoise {
    pub const DEFAULT_PROBABILITY: f64 = 0.5;

    pub fn new() -> Self {
        Self {
            permutations: vec![
                [0, 1, 2],
                [0, 2, 1],
                [1, 0, 2],
                [1, 2, 0],
                [2, 0, 1],
                [2, 1, 0],
            ],
        }
    }

    pub fn with_permutations(permutations: Vec<[usize; 3]>) -> ProcessorResult<Self> {
        if permutations.is_empty() {
            return Err(ProcessorError::config(
                "RandomLightingNoise",
                "permutation set must not be empty",
            ));
        }
        for permutation in &permutations {
            let mut sorted = *permutation;
            sorted.sort_unstable();
            if sorted != [0, 1, 2] {
                return Err(ProcessorError::config(
                    "RandomLightingNoise",
                    format!("{permutation:?} is not a permutation of [0, 1, 2]"),
                ));
            }
        }
        Ok(Self { permutations })
    }
}

impl Default for RandomLightingNoise {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for RandomLightingNoise {
    fn process(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        require_channels(self.name(), &sample.image, 3)?;
        let Some(permutation) = self.permutations.choose(rng) else {
            return Ok(sample);
        };
        let image = sample.image.select_channels(permutation)?;
        Ok(sample.with_image(image))
    }
}

/// Converts the image to another colour layout.
#[derive(Debug, Clone)]
pub struct ConvertColor {
    conversion: ColorConversion,
}

impl ConvertColor {
    pub fn new(conversion: ColorConversion) -> Self {
        Self { conversion }
    }
}

impl Processor for ConvertColor {
    fn process(&self, sample: Sample, _rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let image = convert_color(&sample.image, self.conversion)
            .map_err(|e| ProcessorError::shape(self.name(), e.to_string()))?;
        Ok(sample.with_image(image))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};
    use rstest::*;

    use super::*;
    use crate::Pipeline;

    fn rgb(data: &[u8], height: usize, width: usize) -> Sample {
        Sample::new(ImageBuffer::from_u8(height, width, 3, data).unwrap())
    }

    fn gradient() -> Sample {
        let data: Vec<u8> = (0..48).map(|v| (v * 5) as u8).collect();
        rgb(&data, 4, 4)
    }

    #[test]
    fn normalize_then_denormalize_restores_values() {
        let pipeline = Pipeline::new().add(NormalizeImage).add(DenormalizeImage);
        let input = gradient();
        let output = pipeline.run_seeded(input.clone(), 0).unwrap();
        for (a, b) in output.image.as_slice().iter().zip(input.image.as_slice()) {
            assert_relative_eq!(a, b, epsilon = 1e-4);
        }
    }

    #[test]
    fn mean_shift_round_trips() {
        let mean = augkit_image::BGR_IMAGENET_MEAN;
        let pipeline = Pipeline::new()
            .add(SubtractMeanImage::new(mean).unwrap())
            .add(AddMeanImage::new(mean).unwrap());
        let input = gradient();
        let output = pipeline.run_seeded(input.clone(), 0).unwrap();
        for (a, b) in output.image.as_slice().iter().zip(input.image.as_slice()) {
            assert_relative_eq!(a, b, epsilon = 1e-4);
        }
    }

    #[test]
    fn mean_length_must_match_channels() {
        let mut rng = StdRng::seed_from_u64(0);
        let gray = Sample::new(ImageBuffer::zeros(2, 2, 1).unwrap());
        let err = SubtractMeanImage::new([1.0, 2.0, 3.0])
            .unwrap()
            .process(gray, &mut rng)
            .unwrap_err();
        assert!(err.is_shape());
        assert!(SubtractMeanImage::new(Vec::<f32>::new()).unwrap_err().is_config());
    }

    #[test]
    fn cast_to_u8_rounds_and_clamps() {
        let mut rng = StdRng::seed_from_u64(0);
        let sample = Sample::new(ImageBuffer::from_raw(1, 1, 3, vec![-4.0, 12.6, 300.0]).unwrap());
        let cast = CastImage::new(PixelType::U8).process(sample, &mut rng).unwrap();
        assert_eq!(cast.image.as_slice(), &[0.0, 13.0, 255.0]);
        assert_eq!(cast.image.pixel_type(), PixelType::U8);
    }

    #[rstest]
    #[case(0.5, 0.5)]
    #[case(1.0, 1.0)]
    #[case(2.0, 2.0)]
    fn saturation_with_fixed_factor_blends_with_luma(#[case] lower: f32, #[case] upper: f32) {
        let mut rng = StdRng::seed_from_u64(3);
        let input = rgb(&[200, 100, 50], 1, 1);
        let luma = 0.299 * 200.0 + 0.587 * 100.0 + 0.114 * 50.0;
        let output = RandomSaturation::new(lower, upper)
            .unwrap()
            .process(input, &mut rng)
            .unwrap();
        for (v, original) in output.image.as_slice().iter().zip([200.0, 100.0, 50.0]) {
            assert_relative_eq!(*v, luma + lower * (original - luma), epsilon = 1e-3);
        }
    }

    #[test]
    fn brightness_shifts_all_values_equally() {
        let mut rng = StdRng::seed_from_u64(11);
        let input = gradient();
        let output = RandomBrightness::default()
            .process(input.clone(), &mut rng)
            .unwrap();
        let delta = output.image.as_slice()[0] - input.image.as_slice()[0];
        assert!(delta.abs() <= RandomBrightness::DEFAULT_MAX_DELTA);
        for (a, b) in output.image.as_slice().iter().zip(input.image.as_slice()) {
            assert_relative_eq!(a - b, delta, epsilon = 1e-3);
        }
    }

    #[test]
    fn contrast_preserves_channel_means() {
        let mut rng = StdRng::seed_from_u64(2);
        let input = gradient();
        let output = RandomContrast::default().process(input.clone(), &mut rng).unwrap();
        let mean = |s: &Sample| s.image.as_slice().iter().step_by(3).sum::<f32>() / 16.0;
        assert_relative_eq!(mean(&output), mean(&input), epsilon = 1e-2);
    }

    #[test]
    fn hue_rotation_keeps_grays_gray() {
        let mut rng = StdRng::seed_from_u64(5);
        let input = rgb(&[90, 90, 90], 1, 1);
        let output = RandomHue::default().process(input, &mut rng).unwrap();
        for v in output.image.as_slice() {
            assert_relative_eq!(*v, 90.0, epsilon = 1e-2);
        }
        assert!(RandomHue::new(200.0).unwrap_err().is_config());
    }

    #[test]
    fn lighting_noise_permutes_channels() {
        let mut rng = StdRng::seed_from_u64(0);
        let noise = RandomLightingNoise::with_permutations(vec![[2, 0, 1]]).unwrap();
        let output = noise.process(rgb(&[1, 2, 3], 1, 1), &mut rng).unwrap();
        assert_eq!(output.image.as_slice(), &[3.0, 1.0, 2.0]);
    }

    #[test]
    fn lighting_noise_rejects_bad_permutation_sets() {
        assert!(RandomLightingNoise::with_permutations(Vec::new())
            .unwrap_err()
            .is_config());
        assert!(RandomLightingNoise::with_permutations(vec![[0, 0, 1]])
            .unwrap_err()
            .is_config());
    }

    #[test]
    fn image_quality_keeps_shape_and_rejects_alpha() {
        let mut rng = StdRng::seed_from_u64(0);
        let quality = RandomImageQuality::new(30, 60).unwrap();
        let output = quality.process(gradient(), &mut rng).unwrap();
        assert_eq!(output.image.dims(), (4, 4, 3));

        let rgba = Sample::new(ImageBuffer::zeros(4, 4, 4).unwrap());
        assert!(quality.process(rgba, &mut rng).unwrap_err().is_shape());
        assert!(RandomImageQuality::new(0, 50).unwrap_err().is_config());
    }

    #[test]
    fn image_quality_keeps_normalized_scale() {
        let pipeline = Pipeline::new()
            .add(NormalizeImage)
            .add(RandomImageQuality::new(90, 100).unwrap());
        let input = gradient();
        let output = pipeline.run_seeded(input.clone(), 4).unwrap();

        assert_eq!(output.image.pixel_type(), PixelType::F32);
        let max_error = output
            .image
            .as_slice()
            .iter()
            .zip(input.image.as_slice())
            .map(|(a, b)| (a - b / 255.0).abs())
            .fold(0.0f32, f32::max);
        assert!(max_error < 0.1, "max error {max_error}");
    }

    #[test]
    fn convert_color_reports_shape_errors() {
        let mut rng = StdRng::seed_from_u64(0);
        let convert = ConvertColor::new(ColorConversion::BgrToRgb);
        let output = convert.process(rgb(&[1, 2, 3], 1, 1), &mut rng).unwrap();
        assert_eq!(output.image.as_slice(), &[3.0, 2.0, 1.0]);

        let gray = Sample::new(ImageBuffer::zeros(1, 1, 1).unwrap());
        assert!(convert.process(gray, &mut rng).unwrap_err().is_shape());
    }
}
