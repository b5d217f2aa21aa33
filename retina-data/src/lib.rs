//! Dataset preparation for bounding-box detection training.
//!
//! The pipeline reads a JSON-lines annotation file, assembles ragged
//! per-image records, splits them into train, validation and test partitions
//! and turns each partition into a lazy, prefetching stream of dense batches.

mod common;

pub mod annotation;
pub mod dataset;
pub mod dense;
pub mod processor;
pub mod ratio;
pub mod record;
pub mod split;

pub use annotation::{load_annotations, parse_annotations, Annotations};
pub use dataset::{
    DatasetBuilder, DatasetBuilderInit, DatasetPartition, PartitionKind, Partitions,
};
pub use dense::{Densifier, OverflowPolicy, NO_OBJECT};
pub use ratio::Ratio;
pub use record::{AnnotationRecord, DenseBatch, RaggedBatch, RatioLabel, Sample};
pub use split::SplitSizes;
