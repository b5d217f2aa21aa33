//! Partition sizing, batch-size clamping and the one-time shuffle.

use crate::common::*;

/// Record counts of the train, validation and test partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SplitSizes {
    pub train: usize,
    pub validation: usize,
    pub test: usize,
}

impl SplitSizes {
    /// Split `num_records` with `train_split` of them used for training and the
    /// rest shared evenly, rounding down, between validation and test.
    pub fn new(num_records: usize, train_split: f64) -> Result<Self> {
        ensure!(
            train_split > 0.0 && train_split < 1.0,
            "train_split must be within (0.0, 1.0), but get {}",
            train_split
        );
        let total = num_records as f64;

        let train = snapped_floor(train_split * total).min(num_records);
        let validation = snapped_floor((1.0 - train_split) * 0.5 * total).min(num_records - train);
        let test = num_records - train - validation;

        Ok(Self {
            train,
            validation,
            test,
        })
    }

    pub fn total(&self) -> usize {
        self.train + self.validation + self.test
    }

    pub fn train_range(&self) -> Range<usize> {
        0..self.train
    }

    pub fn validation_range(&self) -> Range<usize> {
        self.train..(self.train + self.validation)
    }

    pub fn test_range(&self) -> Range<usize> {
        (self.train + self.validation)..self.total()
    }
}

/// Round down, treating values a few ulps below an integer as that integer.
///
/// `(1.0 - 0.8) * 0.5 * 10.0` evaluates to `0.9999999999999998`.
fn snapped_floor(value: f64) -> usize {
    let snapped = value * (1.0 + 8.0 * f64::EPSILON);
    snapped.floor().max(0.0) as usize
}

/// The batch size used for a partition of `partition_size` records.
pub fn effective_batch_size(batch_size: usize, partition_size: usize) -> usize {
    batch_size.min(partition_size)
}

/// Sizes of the consecutive batches of a partition.
pub fn batch_sizes(partition_size: usize, batch_size: usize) -> Vec<usize> {
    let batch_size = effective_batch_size(batch_size, partition_size);
    if batch_size == 0 {
        return vec![];
    }
    let num_full = partition_size / batch_size;
    let rem = partition_size % batch_size;

    let mut sizes = vec![batch_size; num_full];
    if rem > 0 {
        sizes.push(rem);
    }
    sizes
}

/// Shuffle `items` through a buffer holding at most `buffer_size` items.
///
/// The buffer is filled first. Each following input item replaces a
/// uniformly chosen buffered item, which is emitted. The remaining buffered
/// items are emitted in uniformly random order. A buffer at least as large
/// as the input gives a uniform permutation.
pub fn buffered_shuffle<T, I, R>(items: I, buffer_size: usize, rng: &mut R) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    R: Rng + ?Sized,
{
    let buffer_size = buffer_size.max(1);
    let mut buffer = Vec::with_capacity(buffer_size);
    let mut output = vec![];

    for item in items {
        if buffer.len() < buffer_size {
            buffer.push(item);
            continue;
        }
        let slot = rng.gen_range(0..buffer.len());
        output.push(mem::replace(&mut buffer[slot], item));
    }

    while !buffer.is_empty() {
        let slot = rng.gen_range(0..buffer.len());
        output.push(buffer.swap_remove(slot));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_ten_records() {
        let sizes = SplitSizes::new(10, 0.8).unwrap();
        assert_eq!(
            sizes,
            SplitSizes {
                train: 8,
                validation: 1,
                test: 1
            }
        );
        assert_eq!(sizes.train_range(), 0..8);
        assert_eq!(sizes.validation_range(), 8..9);
        assert_eq!(sizes.test_range(), 9..10);
    }

    #[test]
    fn split_empty() {
        let sizes = SplitSizes::new(0, 0.8).unwrap();
        assert_eq!(sizes.total(), 0);
        assert!(sizes.train_range().is_empty());
        assert!(sizes.validation_range().is_empty());
        assert!(sizes.test_range().is_empty());
    }

    #[test]
    fn split_ranges_are_disjoint_and_exhaustive() {
        let splits = [0.01, 0.1, 0.25, 0.5, 0.7, 0.8, 0.9, 0.95, 0.99];

        for num_records in 0..300 {
            for &train_split in &splits {
                let sizes = SplitSizes::new(num_records, train_split).unwrap();
                assert_eq!(sizes.total(), num_records);

                let train = sizes.train_range();
                let validation = sizes.validation_range();
                let test = sizes.test_range();
                assert_eq!(train.start, 0);
                assert_eq!(train.end, validation.start);
                assert_eq!(validation.end, test.start);
                assert_eq!(test.end, num_records);

                let expect_train = (train_split * num_records as f64).floor() as usize;
                assert!(sizes.train == expect_train || sizes.train == expect_train + 1);
                assert!(sizes.validation <= sizes.test + 1);
            }
        }
    }

    #[test]
    fn split_rejects_bad_ratio() {
        assert!(SplitSizes::new(10, 0.0).is_err());
        assert!(SplitSizes::new(10, 1.0).is_err());
        assert!(SplitSizes::new(10, -0.5).is_err());
        assert!(SplitSizes::new(10, f64::NAN).is_err());
    }

    #[test]
    fn batch_size_is_clamped() {
        assert_eq!(effective_batch_size(64, 3), 3);
        assert_eq!(batch_sizes(3, 64), vec![3]);
        assert_eq!(batch_sizes(0, 64), Vec::<usize>::new());
        assert_eq!(batch_sizes(10, 4), vec![4, 4, 2]);
        assert_eq!(batch_sizes(8, 4), vec![4, 4]);
    }

    #[test]
    fn batch_sizes_sum_to_partition() {
        for partition_size in 0..100 {
            for batch_size in 1..20 {
                let sizes = batch_sizes(partition_size, batch_size);
                let effective = effective_batch_size(batch_size, partition_size);
                assert_eq!(sizes.iter().sum::<usize>(), partition_size);
                assert!(sizes.iter().all(|&size| size > 0 && size <= effective));
            }
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        for buffer_size in [1, 4, 64, 1000] {
            let mut shuffled = buffered_shuffle(0..200, buffer_size, &mut rng);
            shuffled.sort_unstable();
            assert_eq!(shuffled, (0..200).collect::<Vec<_>>());
        }
    }

    #[test]
    fn shuffle_is_reproducible_with_seed() {
        let lhs = buffered_shuffle(0..100, 16, &mut StdRng::seed_from_u64(42));
        let rhs = buffered_shuffle(0..100, 16, &mut StdRng::seed_from_u64(42));
        assert_eq!(lhs, rhs);
        assert_ne!(lhs, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_with_unit_buffer_keeps_order() {
        let mut rng = StdRng::seed_from_u64(0);
        let shuffled = buffered_shuffle(0..10, 1, &mut rng);
        assert_eq!(shuffled, (0..10).collect::<Vec<_>>());
    }
}
