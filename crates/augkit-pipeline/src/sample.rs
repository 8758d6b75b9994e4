//! The unit of data threaded through a pipeline.

use augkit_image::ImageBuffer;
use serde::{Deserialize, Serialize};

/// A single annotated point. For hand-pose data `z` carries depth or
/// visibility depending on the label source.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Keypoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn translate(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z,
        }
    }

    pub fn scale(self, sx: f32, sy: f32) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
            z: self.z,
        }
    }
}

/// Axis-aligned box in pixel coordinates, `min <= max` on both axes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub const fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y_max - self.y_min).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x > self.x_min && x < self.x_max && y > self.y_min && y < self.y_max
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let w = self.x_max.min(other.x_max) - self.x_min.max(other.x_min);
        let h = self.y_max.min(other.y_max) - self.y_min.max(other.y_min);
        w.max(0.0) * h.max(0.0)
    }

    /// Intersection over union (Jaccard overlap); zero when both boxes are empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    pub fn translate(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x_min + dx, self.y_min + dy, self.x_max + dx, self.y_max + dy)
    }

    pub fn scale(self, sx: f32, sy: f32) -> Self {
        Self::new(self.x_min * sx, self.y_min * sy, self.x_max * sx, self.y_max * sy)
    }

    /// Clamps the box into `[0, width] x [0, height]`.
    pub fn clip(self, width: f32, height: f32) -> Self {
        Self::new(
            self.x_min.clamp(0.0, width),
            self.y_min.clamp(0.0, height),
            self.x_max.clamp(0.0, width),
            self.y_max.clamp(0.0, height),
        )
    }
}

/// An image plus its optional annotations.
///
/// `image` is always present. Processors that do not explicitly drop an
/// annotation field must carry it through with its length unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub image: ImageBuffer,
    pub keypoints: Option<Vec<Keypoint>>,
    pub boxes: Option<Vec<BoundingBox>>,
}

impl Sample {
    pub fn new(image: ImageBuffer) -> Self {
        Self {
            image,
            keypoints: None,
            boxes: None,
        }
    }

    pub fn with_keypoints(mut self, keypoints: Vec<Keypoint>) -> Self {
        self.keypoints = Some(keypoints);
        self
    }

    pub fn with_boxes(mut self, boxes: Vec<BoundingBox>) -> Self {
        self.boxes = Some(boxes);
        self
    }

    /// Replaces the image, keeping annotations.
    pub fn with_image(mut self, image: ImageBuffer) -> Self {
        self.image = image;
        self
    }

    /// Translates every keypoint and box by `(dx, dy)`.
    pub fn translate_annotations(&mut self, dx: f32, dy: f32) {
        if let Some(keypoints) = self.keypoints.as_mut() {
            keypoints.iter_mut().for_each(|k| *k = k.translate(dx, dy));
        }
        if let Some(boxes) = self.boxes.as_mut() {
            boxes.iter_mut().for_each(|b| *b = b.translate(dx, dy));
        }
    }

    /// Scales every keypoint and box by `(sx, sy)`.
    pub fn scale_annotations(&mut self, sx: f32, sy: f32) {
        if let Some(keypoints) = self.keypoints.as_mut() {
            keypoints.iter_mut().for_each(|k| *k = k.scale(sx, sy));
        }
        if let Some(boxes) = self.boxes.as_mut() {
            boxes.iter_mut().for_each(|b| *b = b.scale(sx, sy));
        }
    }
}
