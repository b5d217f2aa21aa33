use super::{Augmentation, DatasetPartition, PartitionKind, Partitions, Pipeline};
use crate::{
    annotation::Annotations,
    common::*,
    dense::{Densifier, OverflowPolicy},
    processor::{
        JitteredResizeInit, RandomHorizontalFlipInit, RecordLoader, ResizeWithPadInit,
    },
    ratio::Ratio,
    split::{buffered_shuffle, SplitSizes},
};

/// The default number of prefetched batches per partition.
pub const DEFAULT_PREFETCH: usize = 2;

/// Options of [DatasetBuilder].
#[derive(Debug, Clone)]
pub struct DatasetBuilderInit {
    /// The class names used to encode labels.
    pub vocabulary: Arc<Vocabulary>,
    /// The model input size.
    pub image_size: HW<u32>,
    /// The box layout of the annotations.
    pub source_format: BoxFormat,
    /// The box layout the model expects.
    pub target_format: BoxFormat,
    /// The fraction of records going to the train partition.
    pub train_split: R64,
    /// The number of images per batch.
    pub batch_size: usize,
    /// The capacity of the shuffle buffer.
    pub shuffle_buffer: usize,
    /// The number of box slots per image in dense batches.
    pub max_boxes: usize,
    /// What to do with images carrying more than `max_boxes` boxes.
    pub overflow: OverflowPolicy,
    /// The probability to flip a training image.
    pub flip_prob: Ratio,
    /// The scale range of the jittered resize on training images.
    pub jitter_scale: (R64, R64),
    /// The number of parallel workers per stage. Defaults to the number of CPUs.
    pub num_workers: Option<usize>,
    /// The number of prefetched batches. Defaults to [DEFAULT_PREFETCH].
    pub prefetch: Option<usize>,
    /// The seed of the shuffle and augmentation. Drawn from entropy if unset.
    pub seed: Option<u64>,
}

impl DatasetBuilderInit {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            vocabulary,
            image_size: HW::from_hw([384, 384]),
            source_format: BoxFormat::RelYxyx,
            target_format: BoxFormat::RelYxyx,
            train_split: r64(0.8),
            batch_size: 16,
            shuffle_buffer: 64,
            max_boxes: 32,
            overflow: OverflowPolicy::default(),
            flip_prob: Ratio::half(),
            jitter_scale: (r64(0.85), r64(1.3)),
            num_workers: None,
            prefetch: None,
            seed: None,
        }
    }

    pub fn build(self) -> Result<DatasetBuilder> {
        let Self {
            vocabulary,
            image_size,
            source_format,
            target_format,
            train_split,
            batch_size,
            shuffle_buffer,
            max_boxes,
            overflow,
            flip_prob,
            jitter_scale,
            num_workers,
            prefetch,
            seed,
        } = self;

        ensure!(batch_size > 0, "batch_size must be positive");
        ensure!(shuffle_buffer > 0, "shuffle_buffer must be positive");
        ensure!(
            train_split > 0.0 && train_split < 1.0,
            "train_split must be within (0, 1), but get {}",
            train_split
        );
        let num_workers = match num_workers {
            Some(0) => bail!("num_workers must be positive"),
            Some(n) => n,
            None => num_cpus::get(),
        };
        let prefetch = match prefetch {
            Some(0) => bail!("prefetch must be positive"),
            Some(n) => n,
            None => DEFAULT_PREFETCH,
        };

        let loader = RecordLoader::new(vocabulary, image_size, source_format, target_format)?;
        let densifier = Densifier::new(max_boxes, overflow)?;
        let train_augmentation = Augmentation::Train {
            flip: RandomHorizontalFlipInit { prob: flip_prob }.build()?,
            jitter: JitteredResizeInit {
                target_size: image_size,
                scale_range: jitter_scale,
            }
            .build()?,
        };
        let eval_augmentation = Augmentation::Eval {
            pad: ResizeWithPadInit {
                target_size: image_size,
            }
            .build()?,
        };

        Ok(DatasetBuilder {
            pipeline: Arc::new(Pipeline {
                loader,
                densifier,
                num_workers,
                prefetch,
                seed,
            }),
            train_split: train_split.raw(),
            batch_size,
            shuffle_buffer,
            train_augmentation: Arc::new(train_augmentation),
            eval_augmentation: Arc::new(eval_augmentation),
        })
    }
}

/// Assembles, shuffles and splits annotation records into [Partitions].
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    pipeline: Arc<Pipeline>,
    train_split: f64,
    batch_size: usize,
    shuffle_buffer: usize,
    train_augmentation: Arc<Augmentation>,
    eval_augmentation: Arc<Augmentation>,
}

impl DatasetBuilder {
    pub fn build(&self, annotations: Annotations) -> Result<Partitions> {
        let records = Arc::new(annotations.into_records()?);
        let num_records = records.len();

        // shuffle once, keeping the order for all later passes
        let order = {
            let mut rng = match self.pipeline.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            buffered_shuffle(0..num_records, self.shuffle_buffer, &mut rng)
        };
        let sizes = SplitSizes::new(num_records, self.train_split)?;

        let partition = |kind: PartitionKind, range: Range<usize>| {
            let augmentation = match kind {
                PartitionKind::Train => self.train_augmentation.clone(),
                PartitionKind::Validation | PartitionKind::Test => {
                    self.eval_augmentation.clone()
                }
            };
            let partition = DatasetPartition::new(
                kind,
                records.clone(),
                order[range].to_vec(),
                self.batch_size,
                self.pipeline.clone(),
                augmentation,
            );
            info!(
                "{} partition has {} records in batches of {}",
                kind,
                partition.len(),
                partition.batch_size()
            );
            partition
        };

        Ok(Partitions {
            train: partition(PartitionKind::Train, sizes.train_range()),
            validation: partition(PartitionKind::Validation, sizes.validation_range()),
            test: partition(PartitionKind::Test, sizes.test_range()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AnnotationRecord;

    fn vocabulary() -> Arc<Vocabulary> {
        Arc::new(Vocabulary::new(["orange_triangle", "blue_star"]).unwrap())
    }

    fn annotations(num_records: usize) -> Annotations {
        let records = (0..num_records)
            .map(|index| AnnotationRecord {
                image_path: PathBuf::from(format!("{}.png", index)),
                labels: vec!["blue_star".into()],
                boxes: vec![[0.1, 0.1, 0.5, 0.5]],
            })
            .collect();
        Annotations::from_records(records)
    }

    #[test]
    fn split_ten_records() {
        let builder = DatasetBuilderInit {
            seed: Some(42),
            ..DatasetBuilderInit::new(vocabulary())
        }
        .build()
        .unwrap();
        let partitions = builder.build(annotations(10)).unwrap();

        assert_eq!(partitions.train.len(), 8);
        assert_eq!(partitions.validation.len(), 1);
        assert_eq!(partitions.test.len(), 1);
        assert_eq!(partitions.train.batch_size(), 8);
        assert_eq!(partitions.validation.batch_size(), 1);
        assert_eq!(partitions.train.num_batches(), 1);

        let mut all: Vec<_> = partitions
            .train
            .indices()
            .iter()
            .chain(partitions.validation.indices())
            .chain(partitions.test.indices())
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn seeded_split_is_reproducible() {
        let init = DatasetBuilderInit {
            seed: Some(7),
            ..DatasetBuilderInit::new(vocabulary())
        };
        let lhs = init.clone().build().unwrap().build(annotations(50)).unwrap();
        let rhs = init.build().unwrap().build(annotations(50)).unwrap();
        assert_eq!(lhs.train.indices(), rhs.train.indices());
        assert_eq!(lhs.test.indices(), rhs.test.indices());
    }

    #[test]
    fn empty_annotations_give_empty_partitions() {
        let builder = DatasetBuilderInit::new(vocabulary()).build().unwrap();
        let partitions = builder.build(annotations(0)).unwrap();
        for partition in partitions.iter() {
            assert!(partition.is_empty());
            assert_eq!(partition.batch_size(), 0);
            assert_eq!(partition.num_batches(), 0);
        }
    }

    #[test]
    fn reject_bad_options() {
        let init = || DatasetBuilderInit::new(vocabulary());
        assert!(DatasetBuilderInit {
            batch_size: 0,
            ..init()
        }
        .build()
        .is_err());
        assert!(DatasetBuilderInit {
            train_split: r64(1.0),
            ..init()
        }
        .build()
        .is_err());
        assert!(DatasetBuilderInit {
            prefetch: Some(0),
            ..init()
        }
        .build()
        .is_err());
        assert!(DatasetBuilderInit {
            max_boxes: 0,
            ..init()
        }
        .build()
        .is_err());
    }
}
