//! Persisting the trained model and its labels.

use crate::{
    common::*,
    config::ExportConfig,
    model::{DetectionModel, Detections},
};
use retina_data::processor::{ResizeWithPad, ResizeWithPadInit};

/// The preprocessing placed in front of an exported model.
///
/// It takes one raw image of any size and produces a batch of one image
/// resized to the model input with its aspect ratio kept, padded at the
/// bottom and right.
#[derive(Debug, Clone)]
pub struct InferencePreprocessing {
    resize: ResizeWithPad,
    target_shape: [usize; 3],
}

impl InferencePreprocessing {
    pub fn new(target_shape: [usize; 3]) -> Result<Self> {
        let [h, w, c] = target_shape;
        ensure!(c == 3, "only 3-channel input is supported");
        let resize = ResizeWithPadInit {
            target_size: HW::from_hw([h.try_into()?, w.try_into()?]),
        }
        .build()?;

        Ok(Self {
            resize,
            target_shape,
        })
    }

    pub fn target_shape(&self) -> [usize; 3] {
        self.target_shape
    }

    /// The shape of the batch produced by [forward](Self::forward).
    pub fn batch_shape(&self) -> [usize; 4] {
        let [h, w, c] = self.target_shape;
        [1, h, w, c]
    }

    pub fn forward(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let image = self.resize.forward_image(image)?;
        let [h, w, c] = self.target_shape;
        let pixels: Vec<f32> = image.into_raw().into_iter().map(f32::from).collect();
        let batch = Array4::from_shape_vec((1, h, w, c), pixels)?;
        Ok(batch)
    }
}

/// Detect objects on a raw image, the way the exported artifact does.
pub fn detect<M>(
    model: &mut M,
    preprocessing: &InferencePreprocessing,
    image: &RgbImage,
) -> Result<Detections>
where
    M: DetectionModel,
{
    let input = preprocessing.forward(image)?;
    let raw = model.predict(&input)?;
    let mut detections = model.decode(&raw, preprocessing.batch_shape())?;
    ensure!(
        detections.len() == 1,
        "expect detections of one image, but get {}",
        detections.len()
    );
    Ok(detections.remove(0))
}

/// Writes a trained model into a deployable artifact.
pub trait ModelExporter<M> {
    /// Serialize `model` with `preprocessing` composed in front of it to `path`.
    fn export(&self, model: M, preprocessing: &InferencePreprocessing, path: &Path) -> Result<()>;
}

/// Export `model` to `<output_dir>/<model_name>.<extension>`.
pub fn export_model<M, X>(
    exporter: &X,
    model: M,
    config: &ExportConfig,
    output_dir: &Path,
    target_shape: [usize; 3],
) -> Result<PathBuf>
where
    X: ModelExporter<M>,
{
    fs::create_dir_all(output_dir).with_context(|| {
        format!(
            "failed to create output directory '{}'",
            output_dir.display()
        )
    })?;
    let preprocessing = InferencePreprocessing::new(target_shape)?;
    let path = config.model_path(output_dir);

    exporter
        .export(model, &preprocessing, &path)
        .with_context(|| format!("failed to export model to '{}'", path.display()))?;
    info!("model exported to '{}'", path.display());

    Ok(path)
}

/// Write the class names, one per line, next to the model artifact.
pub fn save_labels(
    vocabulary: &Vocabulary,
    config: &ExportConfig,
    output_dir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).with_context(|| {
        format!(
            "failed to create output directory '{}'",
            output_dir.display()
        )
    })?;
    let path = config.labels_path(output_dir);
    vocabulary.save_as(&path)?;
    info!("labels saved to '{}'", path.display());
    Ok(path)
}
