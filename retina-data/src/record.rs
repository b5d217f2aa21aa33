//! Data records flowing through the pipeline.

use crate::common::*;

/// A box in ratio units attached to a class code.
pub type RatioLabel = Label<TLBR<f64>, usize>;

/// One image of the annotation file with its retained annotations.
///
/// `labels` and `boxes` are index-aligned. The boxes are in the source
/// `rel_yxyx` layout, i.e. `[y_min, x_min, y_max, x_max]` in ratio units.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub image_path: PathBuf,
    pub labels: Vec<String>,
    pub boxes: Vec<[f64; 4]>,
}

/// A decoded image along with encoded classes and boxes in the training format.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub image: RgbImage,
    pub classes: Vec<usize>,
    pub boxes: Vec<[f64; 4]>,
}

impl Sample {
    pub fn size(&self) -> HW<f64> {
        let (width, height) = self.image.dimensions();
        HW::from_hw([height as f64, width as f64])
    }

    pub fn num_boxes(&self) -> usize {
        self.boxes.len()
    }

    /// Interpret the boxes stored in `format` as ratio labels.
    pub fn to_ratio_labels(&self, format: BoxFormat) -> Result<Vec<RatioLabel>> {
        ensure!(
            self.classes.len() == self.boxes.len(),
            "the number of classes ({}) and boxes ({}) mismatch",
            self.classes.len(),
            self.boxes.len()
        );
        let size = self.size();

        izip!(&self.classes, &self.boxes)
            .map(|(&class, &coords)| -> Result<_> {
                let rect = format.to_ratio_tlbr(coords, &size)?;
                Ok(Label { rect, class })
            })
            .try_collect()
    }

    /// Build a sample from an image and ratio labels, storing boxes in `format`.
    pub fn from_ratio_labels(
        image: RgbImage,
        labels: &[RatioLabel],
        format: BoxFormat,
    ) -> Result<Self> {
        let (width, height) = image.dimensions();
        let size = HW::from_hw([height as f64, width as f64]);
        let pairs: Vec<(usize, [f64; 4])> = labels
            .iter()
            .map(|label| -> Result<_> {
                let coords = format.from_ratio_tlbr(&label.rect, &size)?;
                Ok((label.class, coords))
            })
            .try_collect()?;
        let (classes, boxes) = pairs.into_iter().unzip();

        Ok(Self {
            image,
            classes,
            boxes,
        })
    }
}

/// A batch whose images may carry different numbers of boxes.
#[derive(Debug, Clone, PartialEq)]
pub struct RaggedBatch {
    pub samples: Vec<Sample>,
}

impl RaggedBatch {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A batch padded to a fixed number of boxes per image.
///
/// Unused box slots hold [NO_OBJECT](crate::NO_OBJECT) in every field.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseBatch {
    /// Pixel values in `[0, 255]` with shape `[batch, height, width, 3]`.
    pub images: Array4<f32>,
    /// Box coordinates with shape `[batch, max_boxes, 4]`.
    pub boxes: Array3<f32>,
    /// Class codes with shape `[batch, max_boxes]`.
    pub classes: Array2<i64>,
}

impl DenseBatch {
    pub fn batch_size(&self) -> usize {
        self.images.shape()[0]
    }

    pub fn max_boxes(&self) -> usize {
        self.classes.shape()[1]
    }

    /// Number of occupied box slots per image.
    pub fn num_objects(&self) -> Vec<usize> {
        self.classes
            .outer_iter()
            .map(|row| row.iter().filter(|&&class| class >= 0).count())
            .collect()
    }
}
