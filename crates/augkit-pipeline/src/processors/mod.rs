//! Concrete processors, grouped by what they touch.

pub mod compositing;
pub mod geometric;
pub mod io;
pub mod photometric;
pub mod resize;

pub use compositing::{
    alpha_composite, AddCroppedBackground, AddPlainBackground, AlphaScale, BackgroundSource,
    ColorModel,
};
pub use geometric::{AddOcclusion, CropMode, CropRect, ExpandImage, OcclusionPolygon, RandomImageCrop};
pub use io::{LoadImage, WriteImage};
pub use photometric::{
    AddMeanImage, CastImage, ConvertColor, DenormalizeImage, NormalizeImage, RandomBrightness,
    RandomContrast, RandomHue, RandomImageQuality, RandomLightingNoise, RandomSaturation,
    SubtractMeanImage,
};
pub use resize::{ResizeImage, ResizeImages};
