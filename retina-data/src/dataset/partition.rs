use super::prefetch;
use crate::{
    common::*,
    dense::Densifier,
    processor::{JitteredResize, RandomHorizontalFlip, RecordLoader, ResizeWithPad},
    record::{AnnotationRecord, DenseBatch, RatioLabel, Sample},
    split::{batch_sizes, effective_batch_size},
};

/// The role of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionKind {
    Train,
    Validation,
    Test,
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Train => "train",
            Self::Validation => "validation",
            Self::Test => "test",
        };
        f.write_str(name)
    }
}

/// The train, validation and test partitions of a dataset.
#[derive(Debug)]
pub struct Partitions {
    pub train: DatasetPartition,
    pub validation: DatasetPartition,
    pub test: DatasetPartition,
}

impl Partitions {
    pub fn iter(&self) -> impl Iterator<Item = &DatasetPartition> {
        [&self.train, &self.validation, &self.test].into_iter()
    }
}

/// Stages shared by all partitions.
#[derive(Debug)]
pub(crate) struct Pipeline {
    pub loader: RecordLoader,
    pub densifier: Densifier,
    pub num_workers: usize,
    pub prefetch: usize,
    pub seed: Option<u64>,
}

impl Pipeline {
    /// The random generator for augmenting batch `batch_index` of pass `pass`.
    fn augment_rng(&self, pass: usize, batch_index: usize) -> StdRng {
        match self.seed {
            Some(seed) => {
                let seed = seed
                    ^ (pass as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
                    ^ (batch_index as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        }
    }
}

/// Partition-specific image transformations.
#[derive(Debug)]
pub(crate) enum Augmentation {
    /// Random flip followed by a jittered resize.
    Train {
        flip: RandomHorizontalFlip,
        jitter: JitteredResize,
    },
    /// Deterministic aspect-preserving resize.
    Eval { pad: ResizeWithPad },
}

impl Augmentation {
    fn forward<R>(&self, sample: Sample, format: BoxFormat, rng: &mut R) -> Result<Sample>
    where
        R: Rng + ?Sized,
    {
        // inverted boxes have no region for the geometry to act on
        let labels: Vec<RatioLabel> = sample
            .to_ratio_labels(format)?
            .into_iter()
            .filter(|label| {
                let keep = label.rect.h() >= 0.0 && label.rect.w() >= 0.0;
                if !keep {
                    debug!("drop inverted box {:?}", label.rect.tlbr());
                }
                keep
            })
            .collect();
        let image = sample.image;

        let (image, labels) = match self {
            Self::Train { flip, jitter } => {
                let (image, labels) = flip.forward(image, labels, rng);
                jitter.forward(image, labels, rng)?
            }
            Self::Eval { pad } => pad.forward(image, labels)?,
        };

        Sample::from_ratio_labels(image, &labels, format)
    }
}

/// A fixed, ordered subset of records that can be streamed as dense batches.
///
/// Every call to [stream](DatasetPartition::stream) starts a new pass over the
/// same records in the same order.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DatasetPartition {
    kind: PartitionKind,
    #[derivative(Debug = "ignore")]
    records: Arc<Vec<AnnotationRecord>>,
    indices: Arc<Vec<usize>>,
    batch_size: usize,
    #[derivative(Debug = "ignore")]
    pipeline: Arc<Pipeline>,
    augmentation: Arc<Augmentation>,
    passes: AtomicUsize,
}

impl DatasetPartition {
    pub(crate) fn new(
        kind: PartitionKind,
        records: Arc<Vec<AnnotationRecord>>,
        indices: Vec<usize>,
        batch_size: usize,
        pipeline: Arc<Pipeline>,
        augmentation: Arc<Augmentation>,
    ) -> Self {
        let batch_size = effective_batch_size(batch_size, indices.len());

        Self {
            kind,
            records,
            indices: Arc::new(indices),
            batch_size,
            pipeline,
            augmentation,
            passes: AtomicUsize::new(0),
        }
    }

    pub fn kind(&self) -> PartitionKind {
        self.kind
    }

    /// The number of records.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Indices of the records into the assembled record list, in stream order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// The batch size clamped to the partition size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_batches(&self) -> usize {
        batch_sizes(self.len(), self.batch_size).len()
    }

    /// The number of passes started so far.
    pub fn num_passes(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }

    /// Start a new pass over the partition.
    ///
    /// Nothing happens until the returned stream is polled. The stream ends
    /// after the first error.
    pub fn stream(&self) -> BoxStream<'static, Result<DenseBatch>> {
        let pass = self.passes.fetch_add(1, Ordering::SeqCst);

        if self.batch_size == 0 {
            return stream::empty().boxed();
        }

        let kind = self.kind;
        let records = self.records.clone();
        let indices = self.indices.clone();
        let batch_size = self.batch_size;
        let pipeline = self.pipeline.clone();
        let augmentation = self.augmentation.clone();
        let depth = pipeline.prefetch;

        let stream = stream::once(async move {
            debug!("start pass {} on {} partition", pass, kind);
            let num_workers = pipeline.num_workers;
            let format = pipeline.loader.target_format();

            // load records in parallel
            let stream = {
                let pipeline = pipeline.clone();

                stream::iter((*indices).clone()).par_map(num_workers, move |index| {
                    let pipeline = pipeline.clone();
                    let records = records.clone();

                    move || {
                        let _span = trace_span!("load", index).entered();
                        pipeline.loader.load(&records[index])
                    }
                })
            };

            // group into batches and augment
            let stream = {
                let pipeline = pipeline.clone();

                stream.chunks(batch_size).enumerate().par_map(
                    num_workers,
                    move |(batch_index, results)| {
                        let pipeline = pipeline.clone();
                        let augmentation = augmentation.clone();

                        move || -> Result<Vec<Sample>> {
                            let _span = trace_span!("augment", batch_index).entered();
                            let samples: Vec<Sample> = results.into_iter().try_collect()?;
                            let mut rng = pipeline.augment_rng(pass, batch_index);

                            samples
                                .into_iter()
                                .map(|sample| augmentation.forward(sample, format, &mut rng))
                                .try_collect()
                        }
                    },
                )
            };

            // pad to dense tensors
            stream.par_map(num_workers, move |result: Result<Vec<Sample>>| {
                let pipeline = pipeline.clone();

                move || {
                    let _span = trace_span!("densify").entered();
                    pipeline.densifier.forward(result?)
                }
            })
        })
        .flatten();

        prefetch(stream, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{JitteredResizeInit, RandomHorizontalFlipInit, ResizeWithPadInit};
    use image::Rgb;

    fn sample() -> Sample {
        Sample {
            image: RgbImage::from_pixel(8, 8, Rgb([7, 7, 7])),
            classes: vec![0, 1],
            boxes: vec![[0.6, 0.1, 0.2, 0.4], [0.25, 0.25, 0.75, 0.5]],
        }
    }

    #[test]
    fn eval_augmentation_drops_inverted_boxes() {
        let augmentation = Augmentation::Eval {
            pad: ResizeWithPadInit {
                target_size: HW::from_hw([8, 8]),
            }
            .build()
            .unwrap(),
        };
        let mut rng = StdRng::seed_from_u64(0);
        let out = augmentation
            .forward(sample(), BoxFormat::RelYxyx, &mut rng)
            .unwrap();

        assert_eq!(out.classes, vec![1]);
        assert_eq!(out.boxes, vec![[0.25, 0.25, 0.75, 0.5]]);
    }

    #[test]
    fn train_augmentation_drops_inverted_boxes() {
        let augmentation = Augmentation::Train {
            flip: RandomHorizontalFlipInit::default().build().unwrap(),
            jitter: JitteredResizeInit {
                target_size: HW::from_hw([8, 8]),
                scale_range: (r64(1.0), r64(1.0)),
            }
            .build()
            .unwrap(),
        };

        for seed in 0..4 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = augmentation
                .forward(sample(), BoxFormat::RelYxyx, &mut rng)
                .unwrap();
            assert_eq!(out.classes, vec![1]);
        }
    }
}
