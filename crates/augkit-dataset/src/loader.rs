//! Eager hand-keypoint loader.
//!
//! [`HandKeypoints::load_data`] decodes every image, resizes it to the
//! configured size and, for the training split, attaches the keypoints of the
//! label file with the same stem. Keypoint coordinates are rescaled together
//! with the image.

use std::path::PathBuf;

use augkit_image::{load_image, resize_image, FilterType};
use augkit_pipeline::Sample;
use burn::config::Config;
use serde::{Deserialize, Serialize};

use crate::{
    discovery::{discover_pairs, FilePair},
    error::{DatasetError, DatasetResult},
    label::{load_keypoints, NUM_KEYPOINTS},
};

/// Dataset partition. Only [`Split::Train`] loads labels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Split {
    #[default]
    Train,
    Validation,
    Test,
}

impl Split {
    pub fn has_labels(self) -> bool {
        self == Self::Train
    }
}

mod defaults {
    use super::Split;

    pub const fn image_size() -> [usize; 3] {
        [300, 300, 3]
    }

    pub const fn split() -> Split {
        Split::Train
    }

    pub fn image_extension() -> String {
        "jpg".into()
    }

    pub fn label_extension() -> String {
        "json".into()
    }

    pub fn keypoint_field() -> String {
        "hand_pts".into()
    }
}

/// Configuration for [`HandKeypoints`].
///
/// Only `roots` is required in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandKeypointsConfig {
    /// Directories holding image/label pairs side by side.
    pub roots: Vec<PathBuf>,

    /// `[height, width, channels]` every image is resized to.
    #[serde(default = "defaults::image_size")]
    pub image_size: [usize; 3],

    #[serde(default = "defaults::split")]
    pub split: Split,

    #[serde(default = "defaults::image_extension")]
    pub image_extension: String,

    #[serde(default = "defaults::label_extension")]
    pub label_extension: String,

    /// JSON field holding the keypoints.
    #[serde(default = "defaults::keypoint_field")]
    pub keypoint_field: String,
}

impl Config for HandKeypointsConfig {}

impl HandKeypointsConfig {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            image_size: defaults::image_size(),
            split: defaults::split(),
            image_extension: defaults::image_extension(),
            label_extension: defaults::label_extension(),
            keypoint_field: defaults::keypoint_field(),
        }
    }

    pub fn with_image_size(mut self, image_size: [usize; 3]) -> Self {
        self.image_size = image_size;
        self
    }

    pub fn with_split(mut self, split: Split) -> Self {
        self.split = split;
        self
    }

    pub fn with_image_extension(mut self, extension: String) -> Self {
        self.image_extension = extension;
        self
    }

    pub fn with_label_extension(mut self, extension: String) -> Self {
        self.label_extension = extension;
        self
    }

    pub fn with_keypoint_field(mut self, field: String) -> Self {
        self.keypoint_field = field;
        self
    }
}

/// Fixed-shape arrays assembled from a loaded dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointArrays {
    /// `[N, H, W, C]`, row-major.
    pub images: Vec<f32>,
    /// `[N, 21, 3]`, row-major; `None` outside the training split.
    pub keypoints: Option<Vec<f32>>,
    pub len: usize,
    pub image_size: [usize; 3],
}

/// Loader for hand-pose datasets of `<stem>.jpg` + `<stem>.json` pairs.
#[derive(Debug, Clone)]
pub struct HandKeypoints {
    config: HandKeypointsConfig,
}

impl HandKeypoints {
    pub fn new(config: HandKeypointsConfig) -> DatasetResult<Self> {
        let [height, width, channels] = config.image_size;
        if height == 0 || width == 0 {
            return Err(DatasetError::InvalidConfig {
                reason: format!("image size must be non-zero (got {height}x{width})"),
            });
        }
        if !matches!(channels, 1 | 3 | 4) {
            return Err(DatasetError::InvalidConfig {
                reason: format!("channels must be 1, 3 or 4 (got {channels})"),
            });
        }
        if config.roots.is_empty() {
            return Err(DatasetError::InvalidConfig {
                reason: "at least one root directory is required".to_string(),
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &HandKeypointsConfig {
        &self.config
    }

    /// Discovers the files of the configured split, sorted by stem.
    pub fn load_paths(&self) -> DatasetResult<Vec<FilePair>> {
        let labels = self
            .config
            .split
            .has_labels()
            .then_some(self.config.label_extension.as_str());
        discover_pairs(&self.config.roots, &self.config.image_extension, labels)
    }

    /// Loads a single pair: the resized image plus, when a label path is
    /// present, its rescaled keypoints.
    pub fn load_sample(&self, pair: &FilePair) -> DatasetResult<Sample> {
        let [height, width, channels] = self.config.image_size;
        let image_error = |source| DatasetError::ImageOpenFailed {
            path: pair.image.clone(),
            source,
        };
        let image = load_image(&pair.image, channels).map_err(image_error)?;
        let (sx, sy) = (
            width as f32 / image.width() as f32,
            height as f32 / image.height() as f32,
        );
        let image = resize_image(&image, (height, width), FilterType::Triangle).map_err(image_error)?;

        let mut sample = Sample::new(image);
        if let Some(label) = &pair.label {
            let record = load_keypoints(label, &self.config.keypoint_field)?;
            sample = sample.with_keypoints(record.iter().map(|k| k.scale(sx, sy)).collect());
        }
        Ok(sample)
    }

    /// Loads every sample of the split, failing as a whole on the first error.
    pub fn load_data(&self) -> DatasetResult<Vec<Sample>> {
        let pairs = self.load_paths()?;
        let samples = pairs
            .iter()
            .map(|pair| self.load_sample(pair))
            .collect::<DatasetResult<Vec<_>>>()?;
        tracing::info!(
            samples = samples.len(),
            split = ?self.config.split,
            "loaded hand keypoint dataset"
        );
        Ok(samples)
    }

    /// Loads the split into `[N, H, W, C]` and `[N, 21, 3]` arrays.
    pub fn load_arrays(&self) -> DatasetResult<KeypointArrays> {
        let samples = self.load_data()?;
        stack_samples(&samples, self.config.image_size)
    }
}

/// Packs samples into fixed-shape arrays, checking every image against
/// `image_size` and every keypoint set against `[21, 3]`.
pub fn stack_samples(samples: &[Sample], image_size: [usize; 3]) -> DatasetResult<KeypointArrays> {
    let [height, width, channels] = image_size;
    let labelled = samples.first().is_some_and(|s| s.keypoints.is_some());
    let mut images = Vec::with_capacity(samples.len() * height * width * channels);
    let mut keypoints = labelled.then(|| Vec::with_capacity(samples.len() * NUM_KEYPOINTS * 3));

    for sample in samples {
        let (h, w, c) = sample.image.dims();
        if [h, w, c] != image_size {
            return Err(DatasetError::InconsistentShape {
                expected: image_size.to_vec(),
                actual: vec![h, w, c],
            });
        }
        images.extend_from_slice(sample.image.as_slice());

        match (keypoints.as_mut(), sample.keypoints.as_deref()) {
            (Some(out), Some(points)) if points.len() == NUM_KEYPOINTS => {
                out.extend(points.iter().flat_map(|k| [k.x, k.y, k.z]));
            }
            (None, None) => {}
            (_, points) => {
                return Err(DatasetError::InconsistentShape {
                    expected: if labelled { vec![NUM_KEYPOINTS, 3] } else { Vec::new() },
                    actual: points.map_or_else(Vec::new, |p| vec![p.len(), 3]),
                });
            }
        }
    }

    Ok(KeypointArrays {
        images,
        keypoints,
        len: samples.len(),
        image_size,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{fs, path::Path};

    use augkit_image::{write_image, ImageBuffer};
    use augkit_pipeline::Keypoint;
    use serde_json::json;

    use super::*;

    /// Writes `<stem>.png` filled with `value` and `<stem>.json` whose first
    /// keypoint is `(value, value, 1)`.
    pub(crate) fn write_pair(dir: &Path, stem: &str, value: f32, size: (usize, usize)) {
        let image = ImageBuffer::filled(size.0, size.1, &[value, value, value]).unwrap();
        write_image(dir.join(format!("{stem}.png")), &image).unwrap();
        let label = json!({ "hand_pts": [[value, value, 1.0]] });
        fs::write(dir.join(format!("{stem}.json")), label.to_string()).unwrap();
    }

    pub(crate) fn png_config(dir: &Path, size: [usize; 3]) -> HandKeypointsConfig {
        HandKeypointsConfig::new(vec![dir.to_path_buf()])
            .with_image_size(size)
            .with_image_extension("png".to_string())
    }

    #[test]
    fn samples_align_by_stem_not_listing_order() {
        let dir = tempfile::tempdir().unwrap();
        // created out of order so directory listing order differs from stems
        for (stem, value) in [("c", 30.0), ("a", 10.0), ("d", 40.0), ("b", 20.0)] {
            write_pair(dir.path(), stem, value, (8, 8));
        }
        let loader = HandKeypoints::new(png_config(dir.path(), [8, 8, 3])).unwrap();
        let samples = loader.load_data().unwrap();

        assert_eq!(samples.len(), 4);
        for (sample, expected) in samples.iter().zip([10.0, 20.0, 30.0, 40.0]) {
            assert_eq!(sample.image.pixel(0, 0), &[expected, expected, expected]);
            let keypoints = sample.keypoints.as_ref().unwrap();
            assert_eq!(keypoints.len(), NUM_KEYPOINTS);
            assert_eq!(keypoints[0], Keypoint::new(expected, expected, 1.0));
            assert_eq!(keypoints[20], Keypoint::default());
        }
    }

    #[test]
    fn resizing_rescales_keypoints() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "hand", 40.0, (10, 20));
        let loader = HandKeypoints::new(png_config(dir.path(), [5, 5, 3])).unwrap();
        let sample = loader.load_data().unwrap().remove(0);
        assert_eq!(sample.image.dims(), (5, 5, 3));
        assert_eq!(sample.keypoints.unwrap()[0], Keypoint::new(10.0, 20.0, 1.0));
    }

    #[test]
    fn non_training_splits_carry_images_only() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "a", 1.0, (4, 4));
        write_pair(dir.path(), "b", 2.0, (4, 4));
        // a stray image without a label is fine outside training
        write_image(
            dir.path().join("c.png"),
            &ImageBuffer::zeros(4, 4, 3).unwrap(),
        )
        .unwrap();
        let config = png_config(dir.path(), [4, 4, 3]).with_split(Split::Test);
        let samples = HandKeypoints::new(config).unwrap().load_data().unwrap();
        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|s| s.keypoints.is_none()));
    }

    #[test]
    fn missing_keypoint_field_fails_the_whole_load() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "a", 1.0, (4, 4));
        write_pair(dir.path(), "b", 2.0, (4, 4));
        fs::write(dir.path().join("b.json"), r#"{ "joints": [] }"#).unwrap();
        let err = HandKeypoints::new(png_config(dir.path(), [4, 4, 3]))
            .unwrap()
            .load_data()
            .unwrap_err();
        assert!(matches!(err, DatasetError::FieldNotFound { ref field, .. } if field == "hand_pts"));
    }

    #[test]
    fn undecodable_image_is_an_image_error() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "a", 1.0, (4, 4));
        fs::write(dir.path().join("a.png"), b"not an image").unwrap();
        let err = HandKeypoints::new(png_config(dir.path(), [4, 4, 3]))
            .unwrap()
            .load_data()
            .unwrap_err();
        assert!(matches!(err, DatasetError::ImageOpenFailed { .. }));
    }

    #[test]
    fn unequal_counts_fail_instead_of_misaligning() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "a", 1.0, (4, 4));
        write_pair(dir.path(), "b", 2.0, (4, 4));
        fs::remove_file(dir.path().join("b.json")).unwrap();
        let err = HandKeypoints::new(png_config(dir.path(), [4, 4, 3]))
            .unwrap()
            .load_data()
            .unwrap_err();
        assert!(matches!(err, DatasetError::CountMismatch { images: 2, labels: 1 }));
    }

    #[test]
    fn optional_config_fields_default_when_loaded_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        fs::write(&path, json!({ "roots": ["data/train"] }).to_string()).unwrap();

        let loaded = HandKeypointsConfig::load(&path).unwrap();
        assert_eq!(loaded, HandKeypointsConfig::new(vec![PathBuf::from("data/train")]));
        assert_eq!(loaded.split, Split::Train);
        assert_eq!(loaded.label_extension, "json");
    }

    #[test]
    fn default_config_reads_jpeg_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let image = ImageBuffer::filled(12, 16, &[120.0, 60.0, 30.0]).unwrap();
        write_image(dir.path().join("0001.jpg"), &image).unwrap();
        let flat: Vec<f64> = (0..63).map(f64::from).collect();
        fs::write(
            dir.path().join("0001.json"),
            json!({ "hand_pts": flat }).to_string(),
        )
        .unwrap();

        let config = HandKeypointsConfig::new(vec![dir.path().to_path_buf()]);
        assert_eq!(config.image_size, [300, 300, 3]);
        assert_eq!(config.keypoint_field, "hand_pts");
        let arrays = HandKeypoints::new(config).unwrap().load_arrays().unwrap();
        assert_eq!(arrays.len, 1);
        assert_eq!(arrays.images.len(), 300 * 300 * 3);
        assert_eq!(arrays.keypoints.unwrap().len(), NUM_KEYPOINTS * 3);
    }

    #[test]
    fn stacking_rejects_mismatched_shapes() {
        let samples = vec![
            Sample::new(ImageBuffer::zeros(2, 2, 3).unwrap()),
            Sample::new(ImageBuffer::zeros(3, 2, 3).unwrap()),
        ];
        assert!(matches!(
            stack_samples(&samples, [2, 2, 3]).unwrap_err(),
            DatasetError::InconsistentShape { .. }
        ));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = HandKeypointsConfig::new(vec![PathBuf::from(".")]).with_image_size([0, 10, 3]);
        assert!(matches!(
            HandKeypoints::new(config).unwrap_err(),
            DatasetError::InvalidConfig { .. }
        ));
    }
}
