//! The libtorch backend running a pretrained TorchScript detector.
//!
//! The script module is expected to expose these methods.
//!
//! - `compute_loss(images, boxes, classes) -> (classification, box_regression)`
//! - `forward(images) -> (class_logits, box_deltas)`
//! - `decode_predictions(class_logits, box_deltas, reference) -> (boxes, confidence, classes, num_detections)`
//! - `export_quantized(path, target_shape)`
//!
//! Images are NHWC float tensors with pixel values in `[0, 255]`.

use crate::{
    common::*,
    export::{InferencePreprocessing, ModelExporter},
    model::{DetectionModel, Detections, LossOutput, ModelFactory, ModelSpec, RawPredictions},
};
use tch::{
    nn::{self, OptimizerConfig as _},
    Device, IValue, Kind, Tensor, TrainableCModule,
};

/// The variable prefix of the feature extractor.
const BACKBONE_PREFIX: &str = "backbone.";

/// Loads the detector from a TorchScript file.
#[derive(Debug, Clone)]
pub struct TorchScriptFactory {
    pub module_file: PathBuf,
    pub device: Device,
    pub learning_rate: f64,
    pub momentum: f64,
    pub clip_norm: f64,
    pub freeze_backbone: bool,
}

impl TorchScriptFactory {
    pub fn from_config(config: &crate::config::TrainingConfig, device: Device) -> Self {
        Self {
            module_file: config.module_file.clone(),
            device,
            learning_rate: config.learning_rate.raw(),
            momentum: config.momentum.raw(),
            clip_norm: config.clip_norm.raw(),
            freeze_backbone: config.freeze_backbone,
        }
    }
}

impl ModelFactory for TorchScriptFactory {
    type Model = TorchScriptModel;

    fn build(&self, spec: &ModelSpec) -> Result<Self::Model> {
        info!("loading detector from '{}'", self.module_file.display());

        let vs = nn::VarStore::new(self.device);
        let module = TrainableCModule::load(&self.module_file, vs.root()).with_context(|| {
            format!(
                "failed to load TorchScript module '{}'",
                self.module_file.display()
            )
        })?;

        // check the head matches the vocabulary
        let num_classes = match module.inner.method_is("num_classes", &[] as &[IValue])? {
            IValue::Int(num) => num as usize,
            other => bail!("num_classes() returns {:?} instead of an integer", other),
        };
        ensure!(
            num_classes == spec.num_classes,
            "the module predicts {} classes, but the vocabulary has {}",
            num_classes,
            spec.num_classes
        );

        if self.freeze_backbone {
            let mut num_frozen = 0;
            for (name, var) in vs.variables() {
                if name.starts_with(BACKBONE_PREFIX) {
                    let _ = var.set_requires_grad(false);
                    num_frozen += 1;
                }
            }
            info!("froze {} backbone variables", num_frozen);
        }

        let optimizer = nn::Sgd {
            momentum: self.momentum,
            dampening: 0.0,
            wd: 0.0,
            nesterov: false,
        }
        .build(&vs, self.learning_rate)?;

        Ok(TorchScriptModel {
            vs,
            module,
            optimizer,
            clip_norm: self.clip_norm,
            spec: spec.clone(),
        })
    }
}

/// A TorchScript detector with its optimizer.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TorchScriptModel {
    #[derivative(Debug = "ignore")]
    vs: nn::VarStore,
    #[derivative(Debug = "ignore")]
    module: TrainableCModule,
    #[derivative(Debug = "ignore")]
    optimizer: nn::Optimizer,
    clip_norm: f64,
    spec: ModelSpec,
}

impl TorchScriptModel {
    fn device(&self) -> Device {
        self.vs.device()
    }

    fn batch_tensors(&self, batch: &DenseBatch) -> Result<[Tensor; 3]> {
        let device = self.device();
        let DenseBatch {
            images,
            boxes,
            classes,
        } = batch;

        let images = to_tensor(images.as_standard_layout().as_slice(), images.shape())?;
        let boxes = to_tensor(boxes.as_standard_layout().as_slice(), boxes.shape())?;
        let classes = to_tensor(classes.as_standard_layout().as_slice(), classes.shape())?;

        Ok([
            images.to_device(device),
            boxes.to_device(device),
            classes.to_device(device),
        ])
    }

    fn compute_loss(&self, batch: &DenseBatch) -> Result<(Tensor, Tensor)> {
        let [images, boxes, classes] = self.batch_tensors(batch)?;
        let output = self.module.inner.method_is(
            "compute_loss",
            &[
                IValue::Tensor(images),
                IValue::Tensor(boxes),
                IValue::Tensor(classes),
            ],
        )?;
        let [classification, box_regression] = tensor_tuple::<2>(output, "compute_loss")?;
        Ok((classification, box_regression))
    }
}

impl DetectionModel for TorchScriptModel {
    fn train_step(&mut self, batch: &DenseBatch) -> Result<LossOutput> {
        self.module.set_train();
        let (classification, box_regression) = self.compute_loss(batch)?;
        let total = &classification + &box_regression;
        self.optimizer
            .backward_step_clip_norm(&total, self.clip_norm);

        Ok(LossOutput {
            classification: f64::from(&classification),
            box_regression: f64::from(&box_regression),
        })
    }

    fn evaluate_step(&mut self, batch: &DenseBatch) -> Result<LossOutput> {
        self.module.set_eval();
        let (classification, box_regression) = tch::no_grad(|| self.compute_loss(batch))?;

        Ok(LossOutput {
            classification: f64::from(&classification),
            box_regression: f64::from(&box_regression),
        })
    }

    fn predict(&mut self, images: &Array4<f32>) -> Result<RawPredictions> {
        self.module.set_eval();
        let device = self.device();
        let images = to_tensor(images.as_standard_layout().as_slice(), images.shape())?
            .to_device(device);

        let [class_logits, box_deltas] = tch::no_grad(|| -> Result<_> {
            let output = self
                .module
                .inner
                .method_is("forward", &[IValue::Tensor(images)])?;
            tensor_tuple::<2>(output, "forward")
        })?;

        Ok(RawPredictions {
            class_logits: to_array3(&class_logits)?,
            box_deltas: to_array3(&box_deltas)?,
        })
    }

    fn decode(
        &self,
        raw: &RawPredictions,
        reference_shape: [usize; 4],
    ) -> Result<Vec<Detections>> {
        let device = self.device();
        let RawPredictions {
            class_logits,
            box_deltas,
        } = raw;
        let class_logits = to_tensor(
            class_logits.as_standard_layout().as_slice(),
            class_logits.shape(),
        )?
        .to_device(device);
        let box_deltas =
            to_tensor(box_deltas.as_standard_layout().as_slice(), box_deltas.shape())?
                .to_device(device);
        let reference_shape: Vec<i64> = reference_shape.iter().map(|&d| d as i64).collect();
        let reference = Tensor::ones(&reference_shape, (Kind::Float, device));

        let [boxes, confidence, classes, num_detections] = tch::no_grad(|| -> Result<_> {
            let output = self.module.inner.method_is(
                "decode_predictions",
                &[
                    IValue::Tensor(class_logits),
                    IValue::Tensor(box_deltas),
                    IValue::Tensor(reference),
                ],
            )?;
            tensor_tuple::<4>(output, "decode_predictions")
        })?;

        let (batch_size, max_detections) = match boxes.size().as_slice() {
            &[b, n, 4] => (b as usize, n as usize),
            other => bail!("unexpected decoded box shape {:?}", other),
        };
        let boxes = Vec::<f32>::from(&boxes.to_kind(Kind::Float).reshape(&[-1]));
        let confidence = Vec::<f32>::from(&confidence.to_kind(Kind::Float).reshape(&[-1]));
        let classes = Vec::<i64>::from(&classes.to_kind(Kind::Int64).reshape(&[-1]));
        let num_detections = Vec::<i64>::from(&num_detections.to_kind(Kind::Int64).reshape(&[-1]));
        ensure!(
            num_detections.len() == batch_size,
            "decoded detection counts mismatch the batch size"
        );

        let detections = num_detections
            .iter()
            .enumerate()
            .map(|(index, &count)| {
                let begin = index * max_detections;
                let end = begin + (count.max(0) as usize).min(max_detections);
                Detections {
                    boxes: (begin..end)
                        .map(|slot| {
                            let b = &boxes[slot * 4..slot * 4 + 4];
                            [b[0], b[1], b[2], b[3]]
                        })
                        .collect(),
                    classes: classes[begin..end].iter().map(|&c| c as usize).collect(),
                    confidence: confidence[begin..end].to_vec(),
                }
            })
            .collect();

        debug!(
            "decoded predictions of {} images in {} format",
            batch_size, self.spec.bbox_format
        );
        Ok(detections)
    }
}

/// Exports through the module's own quantizing converter.
#[derive(Debug, Clone, Default)]
pub struct TorchScriptExporter;

impl ModelExporter<TorchScriptModel> for TorchScriptExporter {
    fn export(
        &self,
        model: TorchScriptModel,
        preprocessing: &InferencePreprocessing,
        path: &Path,
    ) -> Result<()> {
        let path = path
            .to_str()
            .ok_or_else(|| format_err!("non UTF-8 path '{}'", path.display()))?;
        let target_shape = preprocessing
            .target_shape()
            .iter()
            .map(|&d| d as i64)
            .collect();

        model.module.inner.method_is(
            "export_quantized",
            &[IValue::String(path.to_string()), IValue::IntList(target_shape)],
        )?;
        Ok(())
    }
}

fn to_tensor<T>(data: Option<&[T]>, shape: &[usize]) -> Result<Tensor>
where
    T: tch::kind::Element,
{
    let data = data.ok_or_else(|| format_err!("the array is not contiguous"))?;
    let shape: Vec<i64> = shape.iter().map(|&d| d as i64).collect();
    Ok(Tensor::of_slice(data).view(shape.as_slice()))
}

fn to_array3(tensor: &Tensor) -> Result<Array3<f32>> {
    let shape = match tensor.size().as_slice() {
        &[a, b, c] => (a as usize, b as usize, c as usize),
        other => bail!("expect a 3D tensor, but get shape {:?}", other),
    };
    let data = Vec::<f32>::from(&tensor.to_kind(Kind::Float).reshape(&[-1]));
    Ok(Array3::from_shape_vec(shape, data)?)
}

fn tensor_tuple<const N: usize>(value: IValue, method: &str) -> Result<[Tensor; N]> {
    let values = match value {
        IValue::Tuple(values) => values,
        other => bail!("{}() returns {:?} instead of a tuple", method, other),
    };
    ensure!(
        values.len() == N,
        "{}() returns {} values, but {} are expected",
        method,
        values.len(),
        N
    );

    let tensors: Vec<Tensor> = values
        .into_iter()
        .map(|value| match value {
            IValue::Tensor(tensor) => Ok(tensor),
            other => Err(format_err!("{}() returns a non-tensor {:?}", method, other)),
        })
        .try_collect()?;
    tensors
        .try_into()
        .map_err(|_| format_err!("{}() returns a malformed tuple", method))
}
