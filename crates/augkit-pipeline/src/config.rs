//! JSON-backed pipeline configuration.
//!
//! ```json
//! {
//!   "processors": [
//!     { "type": "RandomContrast" },
//!     { "type": "ExpandImage", "mean": [104, 117, 123] },
//!     { "type": "RandomImageCrop" },
//!     { "type": "ResizeImage", "size": [300, 300], "probability": 1.0 }
//!   ],
//!   "seed": 7
//! }
//! ```

use std::path::PathBuf;

use augkit_image::{ColorConversion, FilterType, PixelType};
use burn::config::Config;
use serde::{Deserialize, Serialize};

use crate::{
    error::ProcessorResult,
    pipeline::Pipeline,
    processor::{Probabilistic, Processor},
    processors::{
        AddCroppedBackground, AddMeanImage, AddOcclusion, AddPlainBackground, AlphaScale,
        CastImage, ColorModel, ConvertColor, CropMode, DenormalizeImage, ExpandImage,
        NormalizeImage, RandomBrightness, RandomContrast, RandomHue, RandomImageCrop,
        RandomImageQuality, RandomLightingNoise, RandomSaturation, ResizeImage,
        SubtractMeanImage, WriteImage,
    },
    sample::Sample,
};

/// Resampling filter names accepted in configuration files.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

fn default_saturation_lower() -> f32 {
    0.3
}

fn default_saturation_upper() -> f32 {
    1.5
}

fn default_brightness_delta() -> f32 {
    RandomBrightness::DEFAULT_MAX_DELTA
}

fn default_contrast_lower() -> f32 {
    0.5
}

fn default_contrast_upper() -> f32 {
    1.5
}

fn default_hue_delta() -> f32 {
    RandomHue::DEFAULT_MAX_DELTA
}

fn default_quality_lower() -> u8 {
    30
}

fn default_quality_upper() -> u8 {
    100
}

fn default_min_ratio() -> f64 {
    1.0
}

fn default_max_ratio() -> f64 {
    4.0
}

fn default_radius_scale() -> f64 {
    AddOcclusion::DEFAULT_MAX_RADIUS_SCALE
}

/// Every processor that can be declared in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProcessorKind {
    CastImage {
        pixel_type: PixelType,
    },
    SubtractMeanImage {
        mean: Vec<f32>,
    },
    AddMeanImage {
        mean: Vec<f32>,
    },
    NormalizeImage,
    DenormalizeImage,
    RandomSaturation {
        #[serde(default = "default_saturation_lower")]
        lower: f32,
        #[serde(default = "default_saturation_upper")]
        upper: f32,
    },
    RandomBrightness {
        #[serde(default = "default_brightness_delta")]
        max_delta: f32,
    },
    RandomContrast {
        #[serde(default = "default_contrast_lower")]
        lower: f32,
        #[serde(default = "default_contrast_upper")]
        upper: f32,
    },
    RandomHue {
        #[serde(default = "default_hue_delta")]
        max_delta: f32,
    },
    RandomImageQuality {
        #[serde(default = "default_quality_lower")]
        lower: u8,
        #[serde(default = "default_quality_upper")]
        upper: u8,
    },
    RandomLightingNoise {
        #[serde(default)]
        permutations: Option<Vec<[usize; 3]>>,
    },
    ConvertColor {
        conversion: ColorConversion,
    },
    ResizeImage {
        /// `[height, width]`
        size: [usize; 2],
        #[serde(default)]
        filter: ResizeFilter,
    },
    RandomImageCrop {
        #[serde(default)]
        modes: Option<Vec<CropMode>>,
    },
    ExpandImage {
        mean: Vec<f32>,
        #[serde(default = "default_min_ratio")]
        min_ratio: f64,
        #[serde(default = "default_max_ratio")]
        max_ratio: f64,
    },
    AddOcclusion {
        #[serde(default = "default_radius_scale")]
        max_radius_scale: f64,
    },
    AddPlainBackground {
        #[serde(default)]
        color: Option<[f32; 3]>,
        #[serde(default)]
        alpha_scale: AlphaScale,
    },
    AddCroppedBackground {
        paths: Vec<PathBuf>,
        box_size: usize,
        #[serde(default)]
        color_model: ColorModel,
        #[serde(default)]
        alpha_scale: AlphaScale,
    },
    WriteImage {
        path: PathBuf,
    },
}

impl ProcessorKind {
    /// Gate applied when a configuration entry leaves `probability` unset.
    pub fn default_probability(&self) -> Option<f64> {
        match self {
            Self::ExpandImage { .. } => Some(ExpandImage::DEFAULT_PROBABILITY),
            Self::AddOcclusion { .. } => Some(AddOcclusion::DEFAULT_PROBABILITY),
            Self::RandomLightingNoise { .. } => Some(RandomLightingNoise::DEFAULT_PROBABILITY),
            _ => None,
        }
    }
}

/// One pipeline stage: the processor plus an optional probability gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    #[serde(flatten)]
    pub kind: ProcessorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

impl ProcessorConfig {
    pub fn new(kind: ProcessorKind) -> Self {
        Self {
            kind,
            probability: None,
        }
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = Some(probability);
        self
    }

    /// The explicit probability, else the processor's default gate.
    pub fn effective_probability(&self) -> Option<f64> {
        self.probability.or_else(|| self.kind.default_probability())
    }

    pub fn build(&self) -> ProcessorResult<Box<dyn Processor>> {
        let probability = self.effective_probability();
        match &self.kind {
            ProcessorKind::CastImage { pixel_type } => gate(CastImage::new(*pixel_type), probability),
            ProcessorKind::SubtractMeanImage { mean } => {
                gate(SubtractMeanImage::new(mean.clone())?, probability)
            }
            ProcessorKind::AddMeanImage { mean } => gate(AddMeanImage::new(mean.clone())?, probability),
            ProcessorKind::NormalizeImage => gate(NormalizeImage, probability),
            ProcessorKind::DenormalizeImage => gate(DenormalizeImage, probability),
            ProcessorKind::RandomSaturation { lower, upper } => {
                gate(RandomSaturation::new(*lower, *upper)?, probability)
            }
            ProcessorKind::RandomBrightness { max_delta } => {
                gate(RandomBrightness::new(*max_delta)?, probability)
            }
            ProcessorKind::RandomContrast { lower, upper } => {
                gate(RandomContrast::new(*lower, *upper)?, probability)
            }
            ProcessorKind::RandomHue { max_delta } => gate(RandomHue::new(*max_delta)?, probability),
            ProcessorKind::RandomImageQuality { lower, upper } => {
                gate(RandomImageQuality::new(*lower, *upper)?, probability)
            }
            ProcessorKind::RandomLightingNoise { permutations } => {
                let noise = match permutations {
                    Some(permutations) => RandomLightingNoise::with_permutations(permutations.clone())?,
                    None => RandomLightingNoise::new(),
                };
                gate(noise, probability)
            }
            ProcessorKind::ConvertColor { conversion } => {
                gate(ConvertColor::new(*conversion), probability)
            }
            ProcessorKind::ResizeImage { size, filter } => gate(
                ResizeImage::with_filter((size[0], size[1]), (*filter).into())?,
                probability,
            ),
            ProcessorKind::RandomImageCrop { modes } => {
                let crop = match modes {
                    Some(modes) => RandomImageCrop::with_modes(modes.clone())?,
                    None => RandomImageCrop::new(),
                };
                gate(crop, probability)
            }
            ProcessorKind::ExpandImage {
                mean,
                min_ratio,
                max_ratio,
            } => gate(
                ExpandImage::with_ratio_range(mean.clone(), *min_ratio, *max_ratio)?,
                probability,
            ),
            ProcessorKind::AddOcclusion { max_radius_scale } => {
                gate(AddOcclusion::new(*max_radius_scale)?, probability)
            }
            ProcessorKind::AddPlainBackground { color, alpha_scale } => gate(
                AddPlainBackground::new(*color).with_alpha_scale(*alpha_scale),
                probability,
            ),
            ProcessorKind::AddCroppedBackground {
                paths,
                box_size,
                color_model,
                alpha_scale,
            } => gate(
                AddCroppedBackground::new(paths.iter().cloned(), *box_size)?
                    .with_color_model(*color_model)
                    .with_alpha_scale(*alpha_scale),
                probability,
            ),
            ProcessorKind::WriteImage { path } => gate(WriteImage::new(path.clone()), probability),
        }
    }
}

impl From<ProcessorKind> for ProcessorConfig {
    fn from(kind: ProcessorKind) -> Self {
        Self::new(kind)
    }
}

fn gate<P: Processor + 'static>(
    processor: P,
    probability: Option<f64>,
) -> ProcessorResult<Box<dyn Processor>> {
    Ok(match probability {
        Some(probability) => Box::new(Probabilistic::new(processor, probability)?),
        None => Box::new(processor),
    })
}

const fn default_seed() -> u64 {
    42
}

/// Declarative pipeline: ordered stages plus the base seed used by
/// [`augment`](Self::augment).
///
/// `seed` may be left out of configuration files and defaults to 42.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub processors: Vec<ProcessorConfig>,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Config for PipelineConfig {}

impl PipelineConfig {
    pub fn new(processors: Vec<ProcessorConfig>) -> Self {
        Self {
            processors,
            seed: default_seed(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(&self) -> ProcessorResult<Pipeline> {
        self.processors.iter().map(ProcessorConfig::build).collect()
    }

    /// Builds the pipeline and runs it over `samples` with per-sample seeds
    /// derived from [`seed`](Self::seed).
    pub fn augment(&self, samples: Vec<Sample>) -> ProcessorResult<Vec<Sample>> {
        self.build()?.run_many(samples, self.seed)
    }
}

#[cfg(test)]
mod tests {
    use augkit_image::ImageBuffer;

    use super::*;

    #[test]
    fn parses_tagged_processors_with_defaults() {
        let json = r#"{
            "processors": [
                { "type": "NormalizeImage" },
                { "type": "RandomContrast" },
                { "type": "ExpandImage", "mean": [104, 117, 123] },
                { "type": "RandomImageCrop", "probability": 0.25 },
                { "type": "ResizeImage", "size": [32, 48], "filter": "Nearest" }
            ]
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.seed, 42);
        assert_eq!(config.processors.len(), 5);
        assert_eq!(config.processors[0].kind, ProcessorKind::NormalizeImage);
        assert_eq!(
            config.processors[1].kind,
            ProcessorKind::RandomContrast {
                lower: 0.5,
                upper: 1.5
            }
        );
        assert_eq!(config.processors[2].effective_probability(), Some(0.5));
        assert_eq!(config.processors[3].effective_probability(), Some(0.25));
        assert_eq!(config.processors[4].effective_probability(), None);

        let pipeline = config.build().unwrap();
        assert_eq!(
            pipeline.names(),
            vec!["NormalizeImage", "RandomContrast", "ExpandImage", "RandomImageCrop", "ResizeImage"]
        );
    }

    #[test]
    fn configured_pipeline_runs_reproducibly() {
        let config = PipelineConfig::new(vec![
            ProcessorKind::ExpandImage {
                mean: vec![0.0, 0.0, 0.0],
                min_ratio: 1.0,
                max_ratio: 2.0,
            }
            .into(),
            ProcessorKind::RandomImageCrop { modes: None }.into(),
            ProcessorKind::ResizeImage {
                size: [16, 16],
                filter: ResizeFilter::Triangle,
            }
            .into(),
        ])
        .with_seed(3);
        let samples = vec![
            Sample::new(ImageBuffer::filled(20, 30, &[10.0, 20.0, 30.0]).unwrap());
            4
        ];

        let first = config.augment(samples.clone()).unwrap();
        let second = config.augment(samples).unwrap();
        assert_eq!(first, second);
        assert!(first.iter().all(|s| s.image.dims() == (16, 16, 3)));
    }

    #[test]
    fn invalid_entries_fail_at_build_time() {
        let gated_writer = PipelineConfig::new(vec![ProcessorConfig::new(ProcessorKind::WriteImage {
            path: "out.png".into(),
        })
        .with_probability(0.5)]);
        assert!(gated_writer.build().unwrap_err().is_config());

        let empty_noise = PipelineConfig::new(vec![ProcessorKind::RandomLightingNoise {
            permutations: Some(Vec::new()),
        }
        .into()]);
        assert!(empty_noise.build().unwrap_err().is_config());

        let bad_probability = PipelineConfig::new(vec![
            ProcessorConfig::new(ProcessorKind::NormalizeImage).with_probability(1.5),
        ]);
        assert!(bad_probability.build().unwrap_err().is_config());
    }

    #[test]
    fn saves_and_loads_through_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        let config = PipelineConfig::new(vec![
            ProcessorKind::AddOcclusion {
                max_radius_scale: 0.25,
            }
            .into(),
            ProcessorKind::RandomImageCrop {
                modes: Some(vec![CropMode::Identity, CropMode::min_iou(0.3)]),
            }
            .into(),
        ])
        .with_seed(9);

        config.save(&path).unwrap();
        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded.seed, 9);
        assert_eq!(loaded.processors, config.processors);
    }

    #[test]
    fn seed_defaults_when_missing_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"processors":[{"type":"NormalizeImage"}]}"#).unwrap();

        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded.seed, 42);
        assert_eq!(loaded, PipelineConfig::new(vec![ProcessorKind::NormalizeImage.into()]));
    }
}
