//! Image file endpoints: [`LoadImage`] starts a sample from disk and
//! [`WriteImage`] stores the current image as a terminal stage.

use std::path::{Path, PathBuf};

use augkit_image::{load_image, write_image};
use rand::RngCore;

use crate::{
    error::{ProcessorError, ProcessorResult},
    processor::Processor,
    sample::Sample,
};

/// Decodes files into fresh samples with a fixed channel count.
#[derive(Debug, Clone, Copy)]
pub struct LoadImage {
    channels: usize,
}

impl LoadImage {
    pub fn new(channels: usize) -> ProcessorResult<Self> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(ProcessorError::config(
                "LoadImage",
                format!("channels must be 1, 3 or 4 (got {channels})"),
            ));
        }
        Ok(Self { channels })
    }

    pub fn load(&self, path: impl AsRef<Path>) -> ProcessorResult<Sample> {
        Ok(Sample::new(load_image(path, self.channels)?))
    }
}

impl Default for LoadImage {
    fn default() -> Self {
        Self { channels: 3 }
    }
}

/// Writes the current image to `path` and passes the sample through.
///
/// Terminal: it cannot be wrapped in a probability gate.
#[derive(Debug, Clone)]
pub struct WriteImage {
    path: PathBuf,
}

impl WriteImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Processor for WriteImage {
    fn process(&self, sample: Sample, _rng: &mut dyn RngCore) -> ProcessorResult<Sample> {
        write_image(&self.path, &sample.image)?;
        tracing::debug!(path = %self.path.display(), "image written");
        Ok(sample)
    }

    fn is_terminal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use augkit_image::ImageBuffer;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::processor::ProcessorExt;

    #[test]
    fn written_images_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let image = ImageBuffer::filled(3, 4, &[12.0, 34.0, 56.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let writer = WriteImage::new(&path);
        let passed = writer.process(Sample::new(image.clone()), &mut rng).unwrap();
        assert_eq!(passed.image, image);

        let loaded = LoadImage::default().load(&path).unwrap();
        assert_eq!(loaded.image, image);
        assert_eq!(LoadImage::new(1).unwrap().load(&path).unwrap().image.channels(), 1);
    }

    #[test]
    fn writer_is_terminal_and_cannot_be_gated() {
        assert!(WriteImage::new("x.png").is_terminal());
        assert!(WriteImage::new("x.png").with_probability(0.5).unwrap_err().is_config());
    }

    #[test]
    fn loading_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let err = LoadImage::default().load(dir.path().join("missing.jpg")).unwrap_err();
        assert!(matches!(err, ProcessorError::Image(_)));
        assert!(LoadImage::new(2).unwrap_err().is_config());
    }
}
