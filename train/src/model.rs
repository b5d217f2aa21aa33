//! The interface of the detection model collaborator.

use crate::{common::*, config::Config};

/// What the data pipeline promises the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub num_classes: usize,
    pub bbox_format: BoxFormat,
    /// The input shape in `[height, width, channels]`.
    pub input_shape: [usize; 3],
}

impl ModelSpec {
    pub fn from_config(config: &Config, num_classes: usize) -> Self {
        Self {
            num_classes,
            bbox_format: config.dataset.target_box_format,
            input_shape: config.preprocessor.target_shape,
        }
    }
}

/// The two loss terms of a detection step.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LossOutput {
    pub classification: f64,
    pub box_regression: f64,
}

impl LossOutput {
    pub fn total(&self) -> f64 {
        self.classification + self.box_regression
    }
}

/// The undecoded network output of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPredictions {
    /// Class logits with shape `[batch, anchors, classes]`.
    pub class_logits: Array3<f32>,
    /// Box regression outputs with shape `[batch, anchors, 4]`.
    pub box_deltas: Array3<f32>,
}

impl RawPredictions {
    pub fn batch_size(&self) -> usize {
        self.class_logits.shape()[0]
    }
}

/// The surviving detections of one image after decoding.
///
/// `boxes`, `classes` and `confidence` are index-aligned.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Detections {
    /// Boxes in the model box format.
    pub boxes: Vec<[f32; 4]>,
    pub classes: Vec<usize>,
    pub confidence: Vec<f32>,
}

impl Detections {
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// A trainable detector.
pub trait DetectionModel {
    /// Run one optimization step on a batch.
    fn train_step(&mut self, batch: &DenseBatch) -> Result<LossOutput>;

    /// Compute the losses of a batch without updating weights.
    fn evaluate_step(&mut self, batch: &DenseBatch) -> Result<LossOutput>;

    /// Run the network on images with shape `[batch, height, width, 3]`.
    fn predict(&mut self, images: &Array4<f32>) -> Result<RawPredictions>;

    /// Turn raw predictions into per-image detections.
    ///
    /// `reference_shape` is the `[batch, height, width, channels]` shape of
    /// the input the predictions were computed on.
    fn decode(&self, raw: &RawPredictions, reference_shape: [usize; 4])
        -> Result<Vec<Detections>>;
}

/// Builds the detector for a [ModelSpec].
pub trait ModelFactory {
    type Model: DetectionModel;

    fn build(&self, spec: &ModelSpec) -> Result<Self::Model>;
}
