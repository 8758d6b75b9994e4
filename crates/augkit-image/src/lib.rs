pub mod buffer;
pub mod error;
pub mod ops;

pub use buffer::{ImageBuffer, PixelType};
pub use error::{ImageError, ImageResult};
pub use ops::{
    convert_color, decode, draw_filled_polygon, load_image, resize_image, rotate_hue, write_image,
    ColorConversion, FilterType, BGR_IMAGENET_MEAN, RGB_IMAGENET_MEAN,
};
