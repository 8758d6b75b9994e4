//! Stochastic geometric augmentation: constrained random cropping, canvas
//! expansion and polygonal occlusion.
//!
//! Crop and expansion move keypoints and boxes together with the pixels.
//! Occlusion only paints pixels, so annotations are left untouched.

use std::f64::consts::TAU;

use augkit_image::{draw_filled_polygon, ImageBuffer};
use rand::{seq::IndexedRandom, Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ProcessorError, ProcessorResult},
    processor::{uniform, Processor},
    sample::{BoundingBox, Sample},
};

/// How a crop is chosen for one call of [`RandomImageCrop`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CropMode {
    /// Keep the whole image.
    Identity,
    /// Sample a patch whose best overlap with the sample's boxes lies within
    /// `[min_iou, max_iou]`. Missing bounds are unconstrained; with both
    /// missing this is a plain random crop.
    Overlap {
        min_iou: Option<f32>,
        max_iou: Option<f32>,
    },
}

impl CropMode {
    pub const fn random() -> Self {
        Self::Overlap {
            min_iou: None,
            max_iou: None,
        }
    }

    pub const fn min_iou(threshold: f32) -> Self {
        Self::Overlap {
            min_iou: Some(threshold),
            max_iou: None,
        }
    }

    fn accepts(&self, best_overlap: f32) -> bool {
        match *self {
            Self::Identity => true,
            Self::Overlap { min_iou, max_iou } => {
                min_iou.is_none_or(|min| best_overlap >= min)
                    && max_iou.is_none_or(|max| best_overlap <= max)
            }
        }
    }
}

/// Integer crop rectangle, half-open: columns `x1..x2`, rows `y1..y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x1: usize,
    pub y1: usize,
    pub x2: usize,
    pub y2: usize,
}

impl CropRect {
    pub fn width(&self) -> usize {
        self.x2 - self.x1
    }

    pub fn height(&self) -> usize {
        self.y2 - self.y1
    }

    pub fn as_box(&self) -> BoundingBox {
        BoundingBox::new(self.x1 as f32, self.y1 as f32, self.x2 as f32, self.y2 as f32)
    }
}

/// Crops a random patch covering 30-100% of each side with aspect ratio
/// `h / w` in `[0.5, 2]`.
///
/// Each call picks a [`CropMode`] uniformly. Identity returns the input as is.
/// Otherwise up to [`MAX_TRIALS`](Self::MAX_TRIALS) rectangles are drawn; the
/// first one that satisfies the aspect bound, and, when the sample has boxes,
/// the mode's overlap bound and keeps at least one box centre, is used.
/// Exhausting the trials returns the input unchanged.
#[derive(Debug, Clone)]
pub struct RandomImageCrop {
    modes: Vec<CropMode>,
}

impl RandomImageCrop {
    pub const MAX_TRIALS: usize = 50;
    pub const MIN_SCALE: f64 = 0.3;
    pub const MIN_ASPECT: f64 = 0.5;
    pub const MAX_ASPECT: f64 = 2.0;

    pub fn new() -> Self {
        Self {
            modes: vec![
                CropMode::Identity,
                CropMode::min_iou(0.1),
                CropMode::min_iou(0.3),
                CropMode::min_iou(0.7),
                CropMode::min_iou(0.9),
                CropMode::random(),
            ],
        }
    }

    pub fn with_modes(modes: Vec<CropMode>) -> ProcessorResult<Self> {
        if modes.is_empty() {
            return Err(ProcessorError::config(
                "RandomImageCrop",
                "at least one crop mode is required",
            ));
        }
        for mode in &modes {
            if let CropMode::Overlap { min_iou, max_iou } = *mode {
                let in_unit = |v: Option<f32>| v.is_none_or(|v| (0.0..=1.0).contains(&v));
                if !in_unit(min_iou) || !in_unit(max_iou) {
                    return Err(ProcessorError::config(
                        "RandomImageCrop",
                        format!("IoU bounds must lie in [0, 1] (got {mode:?})"),
                    ));
                }
                if let (Some(min), Some(max)) = (min_iou, max_iou) {
                    if min > max {
                        return Err(ProcessorError::config(
                            "RandomImageCrop",
                            format!("min_iou {min} exceeds max_iou {max}"),
                        ));
                    }
                }
            }
        }
        Ok(Self { modes })
    }

    pub fn modes(&self) -> &[CropMode] {
        &self.modes
    }

    /// Runs the bounded trial search for one mode. `None` means every trial
    /// was rejected.
    pub fn sample_rect(
        &self,
        height: usize,
        width: usize,
        boxes: Option<&[BoundingBox]>,
        mode: CropMode,
        rng: &mut dyn RngCore,
    ) -> Option<CropRect> {
        if height == 0 || width == 0 {
            return None;
        }
        let (h_full, w_full) = (height as f64, width as f64);
        let boxes = boxes.filter(|b| !b.is_empty());

        for _ in 0..Self::MAX_TRIALS {
            let w = uniform(rng, Self::MIN_SCALE * w_full, w_full);
            let h = uniform(rng, Self::MIN_SCALE * h_full, h_full);

            let aspect = h / w;
            if !(Self::MIN_ASPECT..=Self::MAX_ASPECT).contains(&aspect) {
                continue;
            }

            let left = uniform(rng, 0.0, w_full - w);
            let top = uniform(rng, 0.0, h_full - h);
            let rect = CropRect {
                x1: left as usize,
                y1: top as usize,
                x2: ((left + w) as usize).min(width),
                y2: ((top + h) as usize).min(height),
            };
            if rect.width() == 0 || rect.height() == 0 {
                continue;
            }

            if let Some(boxes) = boxes {
                let region = rect.as_box();
                let best = boxes
                    .iter()
                    .map(|b| b.iou(&region))
                    .fold(0.0f32, f32::max);
                if !mode.accepts(best) {
                    continue;
                }
                let keeps_any = boxes.iter().any(|b| {
                    let (cx, cy) = b.center();
                    region.contains_point(cx, cy)
                });
                if !keeps_any {
                    continue;
                }
            }

            return Some(rect);
        }
        None
    }

    fn apply_crop(sample: Sample, rect: CropRect) -> ProcessorResult<Sample> {
        let image = sample.image.crop(rect.x1, rect.y1, rect.x2, rect.y2)?;
        let mut sample = sample.with_image(image);
        let region = rect.as_box();
        if let Some(boxes) = sample.boxes.take() {
            let (w, h) = (rect.width() as f32, rect.height() as f32);
            let kept = boxes
                .into_iter()
                .filter(|b| {
                    let (cx, cy) = b.center();
                    region.contains_point(cx, cy)
                })
                .map(|b| b.translate(-region.x_min, -region.y_min).clip(w, h))
                .collect();
            sample.boxes = Some(kept);
        }
        if let Some(keypoints) = sample.keypoints.as_mut() {
            keypoints
                .iter_mut()
                .for_each(|k| *k = k.translate(-region.x_min, -region.y_min));
        }
        Ok(sample)
    }
}

impl Default for RandomImageCrop {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for RandomImageCrop {
    fn process(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let Some(&mode) = self.modes.choose(rng) else {
            return Ok(sample);
        };
        if mode == CropMode::Identity {
            return Ok(sample);
        }
        let (height, width, _) = sample.image.dims();
        match self.sample_rect(height, width, sample.boxes.as_deref(), mode, rng) {
            Some(rect) => Self::apply_crop(sample, rect),
            None => {
                tracing::debug!(?mode, "crop trials exhausted, keeping the full image");
                Ok(sample)
            }
        }
    }
}

/// Zoom-out: places the image at a random offset on a canvas up to 4x larger
/// filled with a channel-wise mean colour.
#[derive(Debug, Clone)]
pub struct ExpandImage {
    mean: Vec<f32>,
    min_ratio: f64,
    max_ratio: f64,
}

impl ExpandImage {
    pub const DEFAULT_PROBABILITY: f64 = 0.5;

    pub fn new(mean: impl Into<Vec<f32>>) -> ProcessorResult<Self> {
        Self::with_ratio_range(mean, 1.0, 4.0)
    }

    pub fn with_ratio_range(
        mean: impl Into<Vec<f32>>,
        min_ratio: f64,
        max_ratio: f64,
    ) -> ProcessorResult<Self> {
        let mean = mean.into();
        if mean.is_empty() {
            return Err(ProcessorError::config("ExpandImage", "mean must not be empty"));
        }
        if !(min_ratio.is_finite() && max_ratio.is_finite() && 1.0 <= min_ratio && min_ratio <= max_ratio) {
            return Err(ProcessorError::config(
                "ExpandImage",
                format!("expected 1 <= min_ratio <= max_ratio (got {min_ratio}, {max_ratio})"),
            ));
        }
        Ok(Self {
            mean,
            min_ratio,
            max_ratio,
        })
    }
}

impl Processor for ExpandImage {
    fn process(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let (height, width, channels) = sample.image.dims();
        if channels != self.mean.len() {
            return Err(ProcessorError::shape(
                self.name(),
                format!(
                    "mean has {} values but the image has {channels} channels",
                    self.mean.len()
                ),
            ));
        }
        let ratio = uniform(rng, self.min_ratio, self.max_ratio);
        let (h, w) = (height as f64, width as f64);
        let left = uniform(rng, 0.0, w * ratio - w);
        let top = uniform(rng, 0.0, h * ratio - h);

        let canvas_h = ((h * ratio) as usize).max(height);
        let canvas_w = ((w * ratio) as usize).max(width);
        let top = (top as usize).min(canvas_h - height);
        let left = (left as usize).min(canvas_w - width);

        let mut canvas = ImageBuffer::filled(canvas_h, canvas_w, &self.mean)?
            .with_pixel_type(sample.image.pixel_type());
        canvas.paste(&sample.image, top, left)?;

        let mut sample = sample.with_image(canvas);
        sample.translate_annotations(left as f32, top as f32);
        Ok(sample)
    }
}

/// Vertices of a synthetic occluder together with the angles they were
/// generated at.
#[derive(Debug, Clone, PartialEq)]
pub struct OcclusionPolygon {
    pub center: (f64, f64),
    /// Generation angle of each vertex, strictly increasing.
    pub angles: Vec<f64>,
    pub vertices: Vec<(i32, i32)>,
}

/// Paints a random star-shaped polygon of solid random colour over the image.
#[derive(Debug, Clone)]
pub struct AddOcclusion {
    max_radius_scale: f64,
}

impl AddOcclusion {
    pub const DEFAULT_PROBABILITY: f64 = 0.5;
    pub const DEFAULT_MAX_RADIUS_SCALE: f64 = 0.5;
    pub const MIN_VERTICES: usize = 3;
    pub const MAX_VERTICES: usize = 6;

    /// Each vertex lies at a distance drawn from
    /// `[0, max(H, W) * max_radius_scale)` from the polygon centre.
    pub fn new(max_radius_scale: f64) -> ProcessorResult<Self> {
        if !(max_radius_scale.is_finite() && max_radius_scale > 0.0) {
            return Err(ProcessorError::config(
                "AddOcclusion",
                format!("max_radius_scale must be positive (got {max_radius_scale})"),
            ));
        }
        Ok(Self { max_radius_scale })
    }

    /// Draws the occluder geometry for an image of the given size.
    pub fn sample_polygon(
        &self,
        height: usize,
        width: usize,
        rng: &mut dyn RngCore,
    ) -> OcclusionPolygon {
        let max_distance = height.max(width) as f64 * self.max_radius_scale;
        let num_vertices = rng.random_range(Self::MIN_VERTICES..=Self::MAX_VERTICES);
        let angle_step = TAU / num_vertices as f64;
        let initial_angle = uniform(rng, 0.0, TAU);
        let center = (
            rng.random::<f64>() * width as f64,
            rng.random::<f64>() * height as f64,
        );

        let mut angles = Vec::with_capacity(num_vertices);
        let mut vertices = Vec::with_capacity(num_vertices);
        for index in 0..num_vertices {
            let angle = initial_angle + index as f64 * angle_step;
            let radius = uniform(rng, 0.0, max_distance);
            let (sin, cos) = angle.sin_cos();
            angles.push(angle);
            vertices.push((
                (center.0 + radius * cos) as i32,
                (center.1 + radius * sin) as i32,
            ));
        }
        OcclusionPolygon {
            center,
            angles,
            vertices,
        }
    }
}

impl Default for AddOcclusion {
    fn default() -> Self {
        Self {
            max_radius_scale: Self::DEFAULT_MAX_RADIUS_SCALE,
        }
    }
}

impl Processor for AddOcclusion {
    fn process(&self, sample: Sample, rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let (height, width, _) = sample.image.dims();
        let polygon = self.sample_polygon(height, width, rng);
        let color = [
            f32::from(rng.random::<u8>()),
            f32::from(rng.random::<u8>()),
            f32::from(rng.random::<u8>()),
        ];
        let mut sample = sample;
        draw_filled_polygon(&mut sample.image, &polygon.vertices, color);
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};
    use rstest::*;

    use super::*;
    use crate::sample::Keypoint;

    fn numbered(height: usize, width: usize) -> ImageBuffer {
        let data = (0..height * width * 3).map(|v| v as f32).collect();
        ImageBuffer::from_raw(height, width, 3, data).unwrap()
    }

    #[rstest]
    #[case(100, 100)]
    #[case(37, 211)]
    #[case(480, 640)]
    #[case(3, 2)]
    fn crop_rectangles_stay_inside_the_image(#[case] height: usize, #[case] width: usize) {
        let crop = RandomImageCrop::new();
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..200 {
            if let Some(rect) = crop.sample_rect(height, width, None, CropMode::random(), &mut rng) {
                assert!(rect.x1 < rect.x2 && rect.x2 <= width, "{rect:?}");
                assert!(rect.y1 < rect.y2 && rect.y2 <= height, "{rect:?}");
                let min_w = (RandomImageCrop::MIN_SCALE * width as f64).floor() as usize;
                let min_h = (RandomImageCrop::MIN_SCALE * height as f64).floor() as usize;
                assert!(rect.width() >= min_w && rect.height() >= min_h, "{rect:?}");
            }
        }
    }

    #[test]
    fn crop_aspect_holds_on_large_images() {
        let crop = RandomImageCrop::new();
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..200 {
            let rect = crop
                .sample_rect(1000, 1000, None, CropMode::random(), &mut rng)
                .expect("large square images always find a crop");
            let aspect = rect.height() as f64 / rect.width() as f64;
            assert!((0.49..=2.01).contains(&aspect), "aspect {aspect} for {rect:?}");
        }
    }

    #[test]
    fn identity_mode_returns_input_unchanged() {
        let crop = RandomImageCrop::with_modes(vec![CropMode::Identity]).unwrap();
        let sample = Sample::new(numbered(10, 10));
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(crop.process(sample.clone(), &mut rng).unwrap(), sample);
    }

    #[test]
    fn exhausted_trials_return_input_unchanged() {
        // a box that no 30%+ crop can overlap with IoU >= 0.99 while the image
        // is much larger than the box
        let crop = RandomImageCrop::with_modes(vec![CropMode::min_iou(0.99)]).unwrap();
        let sample = Sample::new(numbered(100, 100))
            .with_boxes(vec![BoundingBox::new(0.0, 0.0, 2.0, 2.0)]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(crop.process(sample.clone(), &mut rng).unwrap(), sample);
    }

    #[test]
    fn crop_moves_pixels_and_keypoints_together() {
        let crop = RandomImageCrop::with_modes(vec![CropMode::random()]).unwrap();
        let image = numbered(50, 60);
        let sample = Sample::new(image.clone()).with_keypoints(vec![Keypoint::new(30.0, 20.0, 1.0)]);
        let mut rng = StdRng::seed_from_u64(4);
        let out = crop.process(sample, &mut rng).unwrap();

        let (h, w, _) = out.image.dims();
        assert!(h <= 50 && w <= 60 && (h, w) != (50, 60));
        // locate the crop origin from the first pixel's value
        let first = out.image.pixel(0, 0)[0] as usize / 3;
        let (y1, x1) = (first / 60, first % 60);
        assert_eq!(out.image.pixel(h - 1, w - 1), image.pixel(y1 + h - 1, x1 + w - 1));
        let kp = out.keypoints.unwrap()[0];
        assert_eq!((kp.x, kp.y, kp.z), (30.0 - x1 as f32, 20.0 - y1 as f32, 1.0));
    }

    #[test]
    fn overlap_modes_check_boxes() {
        let crop = RandomImageCrop::with_modes(vec![CropMode::min_iou(0.5)]).unwrap();
        let boxes = vec![BoundingBox::new(10.0, 10.0, 90.0, 90.0)];
        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..50 {
            if let Some(rect) =
                crop.sample_rect(100, 100, Some(&boxes), CropMode::min_iou(0.5), &mut rng)
            {
                assert!(boxes[0].iou(&rect.as_box()) >= 0.5);
                let (cx, cy) = boxes[0].center();
                assert!(rect.as_box().contains_point(cx, cy));
            }
        }
    }

    #[test]
    fn cropped_boxes_are_shifted_and_clipped() {
        let crop = RandomImageCrop::with_modes(vec![CropMode::random()]).unwrap();
        let sample = Sample::new(numbered(100, 100))
            .with_boxes(vec![BoundingBox::new(20.0, 20.0, 80.0, 80.0)]);
        let mut rng = StdRng::seed_from_u64(8);
        let out = crop.process(sample, &mut rng).unwrap();
        let (h, w, _) = out.image.dims();
        for b in out.boxes.unwrap() {
            assert!(b.x_min >= 0.0 && b.y_min >= 0.0);
            assert!(b.x_max <= w as f32 && b.y_max <= h as f32);
        }
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![CropMode::Overlap { min_iou: Some(0.8), max_iou: Some(0.2) }])]
    #[case(vec![CropMode::min_iou(1.5)])]
    fn invalid_crop_modes_are_config_errors(#[case] modes: Vec<CropMode>) {
        assert!(RandomImageCrop::with_modes(modes).unwrap_err().is_config());
    }

    #[test]
    fn expansion_by_two_places_the_image_inside_a_mean_canvas() {
        let mean = [104.0, 117.0, 123.0];
        let expand = ExpandImage::with_ratio_range(mean, 2.0, 2.0).unwrap();
        let image = ImageBuffer::filled(100, 100, &[1.0, 2.0, 3.0]).unwrap();
        let sample = Sample::new(image).with_keypoints(vec![Keypoint::new(5.0, 6.0, 0.0)]);
        let mut rng = StdRng::seed_from_u64(12);
        let out = expand.process(sample, &mut rng).unwrap();

        assert_eq!(out.image.dims(), (200, 200, 3));
        let kp = out.keypoints.unwrap()[0];
        let (left, top) = ((kp.x - 5.0) as usize, (kp.y - 6.0) as usize);
        assert!(left + 100 <= 200 && top + 100 <= 200);
        for y in 0..200 {
            for x in 0..200 {
                let inside = (top..top + 100).contains(&y) && (left..left + 100).contains(&x);
                let expected: &[f32] = if inside { &[1.0, 2.0, 3.0] } else { &mean };
                assert_eq!(out.image.pixel(y, x), expected, "pixel ({y}, {x})");
            }
        }
    }

    #[test]
    fn expansion_never_shrinks_and_checks_channels() {
        let expand = ExpandImage::new([0.0, 0.0, 0.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let out = expand
                .process(Sample::new(numbered(7, 9)), &mut rng)
                .unwrap();
            let (h, w, _) = out.image.dims();
            assert!((7..=28).contains(&h) && (9..=36).contains(&w));
        }
        let gray = Sample::new(ImageBuffer::zeros(4, 4, 1).unwrap());
        assert!(expand.process(gray, &mut rng).unwrap_err().is_shape());
        assert!(ExpandImage::with_ratio_range([0.0], 0.5, 2.0)
            .unwrap_err()
            .is_config());
    }

    #[test]
    fn occlusion_polygons_are_star_shaped() {
        let occlusion = AddOcclusion::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let polygon = occlusion.sample_polygon(64, 128, &mut rng);
            let n = polygon.vertices.len();
            assert!((AddOcclusion::MIN_VERTICES..=AddOcclusion::MAX_VERTICES).contains(&n));
            assert_eq!(polygon.angles.len(), n);
            assert!(polygon.angles.windows(2).all(|w| w[0] < w[1]));
            let span = polygon.angles[n - 1] - polygon.angles[0];
            assert!(span < TAU);
            let reach = 128.0 * AddOcclusion::DEFAULT_MAX_RADIUS_SCALE + 2.0;
            for &(x, y) in &polygon.vertices {
                let (dx, dy) = (x as f64 - polygon.center.0, y as f64 - polygon.center.1);
                assert!(dx.hypot(dy) <= reach);
            }
        }
    }

    #[test]
    fn occlusion_paints_in_place_and_keeps_annotations() {
        let occlusion = AddOcclusion::new(1.0).unwrap();
        let image = ImageBuffer::filled(32, 32, &[0.0, 0.0, 0.0]).unwrap();
        let sample = Sample::new(image).with_keypoints(vec![Keypoint::new(1.0, 1.0, 1.0)]);
        let mut rng = StdRng::seed_from_u64(5);
        let mut changed = false;
        for _ in 0..10 {
            let out = occlusion.process(sample.clone(), &mut rng).unwrap();
            assert_eq!(out.image.dims(), (32, 32, 3));
            assert_eq!(out.keypoints, sample.keypoints);
            changed |= out.image != sample.image;
        }
        assert!(changed);
        assert!(AddOcclusion::new(0.0).unwrap_err().is_config());
    }
}
