//! Padding ragged batches into fixed-shape tensors.

use crate::{
    common::*,
    record::{DenseBatch, Sample},
};

/// The value of the class and box fields of unused box slots.
pub const NO_OBJECT: i64 = -1;

/// What to do when an image carries more boxes than the batch has slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Keep the leading boxes in annotation order and drop the rest.
    Truncate,
    /// Fail the batch.
    Error,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        Self::Truncate
    }
}

/// Converts ragged samples into a [DenseBatch].
#[derive(Debug, Clone)]
pub struct Densifier {
    max_boxes: usize,
    overflow: OverflowPolicy,
}

impl Densifier {
    pub fn new(max_boxes: usize, overflow: OverflowPolicy) -> Result<Self> {
        ensure!(max_boxes > 0, "max_boxes must be positive");
        Ok(Self {
            max_boxes,
            overflow,
        })
    }

    pub fn max_boxes(&self) -> usize {
        self.max_boxes
    }

    pub fn forward(&self, samples: Vec<Sample>) -> Result<DenseBatch> {
        let batch_size = samples.len();
        ensure!(batch_size > 0, "cannot densify an empty batch");

        let (width, height) = samples[0].image.dimensions();
        let (height, width) = (height as usize, width as usize);
        let max_boxes = self.max_boxes;

        let mut images = Array4::<f32>::zeros((batch_size, height, width, 3));
        let mut boxes = Array3::<f32>::from_elem((batch_size, max_boxes, 4), NO_OBJECT as f32);
        let mut classes = Array2::<i64>::from_elem((batch_size, max_boxes), NO_OBJECT);

        for (index, sample) in samples.iter().enumerate() {
            let Sample {
                image,
                classes: sample_classes,
                boxes: sample_boxes,
            } = sample;

            ensure!(
                image.dimensions() == (width as u32, height as u32),
                "images in a batch must have identical sizes, but get {:?} and {:?}",
                (width, height),
                image.dimensions()
            );
            ensure!(
                sample_classes.len() == sample_boxes.len(),
                "the number of classes ({}) and boxes ({}) mismatch",
                sample_classes.len(),
                sample_boxes.len()
            );

            let num_boxes = sample_boxes.len();
            if num_boxes > max_boxes {
                match self.overflow {
                    OverflowPolicy::Truncate => {
                        warn!(
                            "an image has {} boxes, keeping the first {}",
                            num_boxes, max_boxes
                        );
                    }
                    OverflowPolicy::Error => {
                        bail!(
                            "an image has {} boxes, exceeding the limit {}",
                            num_boxes,
                            max_boxes
                        );
                    }
                }
            }

            let mut dst = images.index_axis_mut(ndarray::Axis(0), index);
            for (x, y, pixel) in image.enumerate_pixels() {
                let [r, g, b] = pixel.0;
                dst[[y as usize, x as usize, 0]] = r as f32;
                dst[[y as usize, x as usize, 1]] = g as f32;
                dst[[y as usize, x as usize, 2]] = b as f32;
            }

            izip!(sample_classes, sample_boxes)
                .take(max_boxes)
                .enumerate()
                .for_each(|(slot, (&class, coords))| {
                    classes[[index, slot]] = class as i64;
                    coords.iter().enumerate().for_each(|(field, &value)| {
                        boxes[[index, slot, field]] = value as f32;
                    });
                });
        }

        Ok(DenseBatch {
            images,
            boxes,
            classes,
        })
    }
}
