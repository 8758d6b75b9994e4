use augkit_image::{resize_image, FilterType, ImageBuffer};
use rand::RngCore;

use crate::{
    error::{ProcessorError, ProcessorResult},
    processor::Processor,
    sample::Sample,
};

/// Resizes the image to `(height, width)` and rescales keypoints and boxes by
/// `(new_w / W, new_h / H)`.
#[derive(Debug, Clone)]
pub struct ResizeImage {
    size: (usize, usize),
    filter: FilterType,
}

impl ResizeImage {
    pub fn new(size: (usize, usize)) -> ProcessorResult<Self> {
        Self::with_filter(size, FilterType::Triangle)
    }

    pub fn with_filter(size: (usize, usize), filter: FilterType) -> ProcessorResult<Self> {
        if size.0 == 0 || size.1 == 0 {
            return Err(ProcessorError::config(
                "ResizeImage",
                format!("target size must be non-zero (got {}x{})", size.0, size.1),
            ));
        }
        Ok(Self { size, filter })
    }

    pub fn size(&self) -> (usize, usize) {
        self.size
    }

    pub fn resize(&self, image: &ImageBuffer) -> ProcessorResult<ImageBuffer> {
        Ok(resize_image(image, self.size, self.filter)?)
    }
}

impl Processor for ResizeImage {
    fn process(&self, sample: Sample, _rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        let (height, width, _) = sample.image.dims();
        if height == 0 || width == 0 {
            return Err(ProcessorError::shape(self.name(), "cannot resize an empty image"));
        }
        let image = self.resize(&sample.image)?;
        let sx = self.size.1 as f32 / width as f32;
        let sy = self.size.0 as f32 / height as f32;
        let mut sample = sample.with_image(image);
        sample.scale_annotations(sx, sy);
        Ok(sample)
    }
}

/// Batch form of [`ResizeImage`] over a list of bare images.
#[derive(Debug, Clone)]
pub struct ResizeImages {
    inner: ResizeImage,
}

impl ResizeImages {
    pub fn new(size: (usize, usize)) -> ProcessorResult<Self> {
        Ok(Self {
            inner: ResizeImage::new(size)?,
        })
    }

    pub fn apply(&self, images: &[ImageBuffer]) -> ProcessorResult<Vec<ImageBuffer>> {
        images.iter().map(|image| self.inner.resize(image)).collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::sample::{BoundingBox, Keypoint};

    #[test]
    fn resize_scales_annotations_with_the_image() {
        let image = ImageBuffer::filled(100, 200, &[50.0, 60.0, 70.0]).unwrap();
        let sample = Sample::new(image)
            .with_keypoints(vec![Keypoint::new(100.0, 50.0, 2.0)])
            .with_boxes(vec![BoundingBox::new(20.0, 10.0, 40.0, 30.0)]);
        let mut rng = StdRng::seed_from_u64(0);
        let out = ResizeImage::new((50, 50))
            .unwrap()
            .process(sample, &mut rng)
            .unwrap();

        assert_eq!(out.image.dims(), (50, 50, 3));
        assert_eq!(out.image.pixel(10, 10), &[50.0, 60.0, 70.0]);
        let kp = out.keypoints.unwrap()[0];
        assert_relative_eq!(kp.x, 25.0);
        assert_relative_eq!(kp.y, 25.0);
        assert_relative_eq!(kp.z, 2.0);
        assert_eq!(out.boxes.unwrap()[0], BoundingBox::new(5.0, 5.0, 10.0, 15.0));
    }

    #[test]
    fn batch_resize_keeps_order() {
        let images = vec![
            ImageBuffer::filled(4, 4, &[1.0]).unwrap(),
            ImageBuffer::filled(8, 2, &[2.0]).unwrap(),
        ];
        let resized = ResizeImages::new((3, 5)).unwrap().apply(&images).unwrap();
        assert_eq!(resized.len(), 2);
        assert!(resized.iter().all(|image| image.dims() == (3, 5, 1)));
        assert_eq!(resized[1].as_slice()[0], 2.0);
    }

    #[test]
    fn zero_size_is_a_config_error() {
        assert!(ResizeImage::new((0, 10)).unwrap_err().is_config());
    }
}
