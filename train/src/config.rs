//! Training program configuration format.

use crate::common::*;
use retina_data::OverflowPolicy;

pub use dataset::*;
pub use export::*;
pub use preprocessor::*;
pub use training::*;

/// The main training configuration.
///
/// Every section can be omitted, in which case its defaults apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub preprocessor: PreprocessorConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = fs::read_to_string(path)?;
        let config: Self = json5::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check constraints that the field types alone cannot express.
    pub fn validate(&self) -> Result<()> {
        let DatasetConfig { train_split, .. } = self.dataset;
        ensure!(
            train_split > 0.0 && train_split < 1.0,
            "train_split must be within (0, 1), but get {}",
            train_split
        );

        let [_, _, channels] = self.preprocessor.target_shape;
        ensure!(channels == 3, "only 3-channel input is supported");

        let (lo, hi) = self.preprocessor.jitter_scale;
        ensure!(
            lo > 0.0 && lo <= hi,
            "invalid jitter scale range ({}, {})",
            lo,
            hi
        );

        ensure!(
            !self.export.model_name.is_empty(),
            "model_name must not be empty"
        );
        Ok(())
    }
}

mod dataset {
    use super::*;

    /// Dataset options.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct DatasetConfig {
        /// The ordered class names. Annotations of other classes are ignored.
        pub labels: Vec<String>,
        /// The box layout of the annotation file.
        pub source_box_format: BoxFormat,
        /// The box layout the model is trained on.
        pub target_box_format: BoxFormat,
        /// The fraction of images used for training. The rest is split
        /// evenly into validation and test.
        pub train_split: R64,
        /// The capacity of the shuffle buffer.
        pub shuffle_buffer: NonZeroUsize,
        /// The seed of shuffling and augmentation. Drawn from entropy if unset.
        pub seed: Option<u64>,
    }

    impl Default for DatasetConfig {
        fn default() -> Self {
            Self {
                labels: vec!["orange_triangle".into(), "blue_star".into()],
                source_box_format: BoxFormat::RelYxyx,
                target_box_format: BoxFormat::RelYxyx,
                train_split: r64(0.8),
                shuffle_buffer: NonZeroUsize::new(64).unwrap(),
                seed: None,
            }
        }
    }
}

mod preprocessor {
    use super::*;

    /// Data preprocessing options.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct PreprocessorConfig {
        /// The model input shape in `[height, width, channels]`.
        pub target_shape: [usize; 3],
        /// The number of box slots per image.
        pub max_boxes: NonZeroUsize,
        /// What to do with images having more than `max_boxes` boxes.
        pub overflow_policy: OverflowPolicy,
        /// The number of parallel workers per stage. Defaults to the number of CPUs.
        pub num_workers: Option<NonZeroUsize>,
        /// The number of batches prepared ahead.
        pub prefetch: Option<NonZeroUsize>,
        /// The probability to flip a training image horizontally.
        pub flip_prob: Ratio,
        /// The pair of minimum and maximum scaling factor of the jittered resize.
        pub jitter_scale: (R64, R64),
    }

    impl PreprocessorConfig {
        pub fn image_size(&self) -> Result<HW<u32>> {
            let [h, w, _] = self.target_shape;
            ensure!(h > 0 && w > 0, "target height and width must be positive");
            Ok(HW::from_hw([h.try_into()?, w.try_into()?]))
        }
    }

    impl Default for PreprocessorConfig {
        fn default() -> Self {
            Self {
                target_shape: [384, 384, 3],
                max_boxes: NonZeroUsize::new(32).unwrap(),
                overflow_policy: OverflowPolicy::default(),
                num_workers: None,
                prefetch: None,
                flip_prob: Ratio::half(),
                jitter_scale: (r64(0.85), r64(1.3)),
            }
        }
    }
}

mod training {
    use super::*;

    /// Optimization options.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct TrainingConfig {
        /// The number of images per batch on each replica.
        pub batch_size: NonZeroUsize,
        /// The number of model replicas trained in sync.
        pub replicas: NonZeroUsize,
        /// The number of epochs unless overridden on the command line.
        pub epochs: NonZeroUsize,
        pub learning_rate: R64,
        pub momentum: R64,
        /// The maximum global norm of the gradients.
        pub clip_norm: R64,
        /// Keep the backbone weights fixed.
        pub freeze_backbone: bool,
        /// The TorchScript module with the pretrained detector.
        pub module_file: PathBuf,
    }

    impl TrainingConfig {
        /// The batch size across all replicas.
        pub fn global_batch_size(&self) -> usize {
            self.batch_size.get() * self.replicas.get()
        }
    }

    impl Default for TrainingConfig {
        fn default() -> Self {
            Self {
                batch_size: NonZeroUsize::new(16).unwrap(),
                replicas: NonZeroUsize::new(1).unwrap(),
                epochs: NonZeroUsize::new(crate::args::DEFAULT_EPOCHS).unwrap(),
                learning_rate: r64(0.01),
                momentum: r64(0.9),
                clip_norm: r64(10.0),
                freeze_backbone: true,
                module_file: PathBuf::from("retinanet_efficientnetv2_b0.pt"),
            }
        }
    }
}

mod export {
    use super::*;

    /// Artifact naming options.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct ExportConfig {
        pub model_name: String,
        pub labels_file: String,
        pub extension: String,
    }

    impl ExportConfig {
        /// The path of the model artifact under `dir`.
        pub fn model_path(&self, dir: &Path) -> PathBuf {
            dir.join(format!("{}.{}", self.model_name, self.extension))
        }

        pub fn labels_path(&self, dir: &Path) -> PathBuf {
            dir.join(&self.labels_file)
        }
    }

    impl Default for ExportConfig {
        fn default() -> Self {
            Self {
                model_name: "detection".into(),
                labels_file: label::LABELS_FILE_NAME.into(),
                extension: "tflite".into(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.dataset.labels, vec!["orange_triangle", "blue_star"]);
        assert_eq!(config.dataset.source_box_format, BoxFormat::RelYxyx);
        assert_eq!(config.preprocessor.target_shape, [384, 384, 3]);
        assert_eq!(config.preprocessor.max_boxes.get(), 32);
        assert_eq!(config.training.global_batch_size(), 16);
        assert_eq!(config.training.epochs.get(), 200);
        assert_eq!(
            config.export.model_path(Path::new("out")),
            PathBuf::from("out/detection.tflite")
        );
        assert_eq!(
            config.export.labels_path(Path::new("out")),
            PathBuf::from("out/labels.txt")
        );
        config.validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.json5");
        fs::write(
            &path,
            r#"{
                // comments are allowed
                dataset: { labels: ["cat"], seed: 3 },
                preprocessor: { overflow_policy: "error", flip_prob: 0.25 },
                training: { batch_size: 4 },
            }"#,
        )
        .unwrap();

        let config = Config::open(&path).unwrap();
        assert_eq!(config.dataset.labels, vec!["cat"]);
        assert_eq!(config.dataset.seed, Some(3));
        assert_eq!(config.dataset.train_split, r64(0.8));
        assert_eq!(config.preprocessor.overflow_policy, OverflowPolicy::Error);
        assert_eq!(config.preprocessor.flip_prob.to_f64(), 0.25);
        assert_eq!(config.training.batch_size.get(), 4);
        assert_eq!(config.export, ExportConfig::default());
    }

    #[test]
    fn reject_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.json5");

        fs::write(&path, "{ dataset: { train_split: 1.5 } }").unwrap();
        assert!(Config::open(&path).is_err());

        fs::write(&path, "{ preprocessor: { flip_prob: 2.0 } }").unwrap();
        assert!(Config::open(&path).is_err());

        fs::write(&path, "{ dataset: { source_box_format: \"polar\" } }").unwrap();
        assert!(Config::open(&path).is_err());
    }
}
