//! Deterministic training/evaluation partitioning
//!
//! The first `floor(n * (1 - fraction))` records train, the rest evaluate.
//! Input order is preserved and nothing is shuffled.

/// Training and evaluation halves of a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<T> {
    pub training: Vec<T>,
    pub evaluation: Vec<T>,
}

/// Number of records kept for training
pub fn training_size(len: usize, evaluation_fraction: f64) -> usize {
    let size = (len as f64 * (1.0 - evaluation_fraction)).floor();
    if size <= 0.0 {
        0
    } else {
        (size as usize).min(len)
    }
}

/// Split `dataset` into an ordered training prefix and evaluation suffix
pub fn split<T>(mut dataset: Vec<T>, evaluation_fraction: f64) -> Partition<T> {
    let at = training_size(dataset.len(), evaluation_fraction);
    let evaluation = dataset.split_off(at);
    Partition {
        training: dataset,
        evaluation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hundred_rows_quarter_fraction() {
        let partition = split((0..100).collect::<Vec<_>>(), 0.25);
        assert_eq!(partition.training.len(), 75);
        assert_eq!(partition.evaluation.len(), 25);
        assert_eq!(partition.training[0], 0);
        assert_eq!(partition.evaluation[0], 75);
    }

    #[test]
    fn tiny_inputs_may_leave_a_side_empty() {
        let partition = split(vec![1], 0.25);
        assert!(partition.training.is_empty());
        assert_eq!(partition.evaluation, vec![1]);

        let partition = split(Vec::<u8>::new(), 0.25);
        assert!(partition.training.is_empty());
        assert!(partition.evaluation.is_empty());
    }

    #[test]
    fn full_fraction_evaluates_everything() {
        let partition = split((0..10).collect::<Vec<_>>(), 1.0);
        assert!(partition.training.is_empty());
        assert_eq!(partition.evaluation.len(), 10);
    }

    proptest! {
        #[test]
        fn partition_sizes_follow_floor_rule(
            len in 5usize..2_000,
            fraction in 0.001f64..=1.0,
        ) {
            let dataset: Vec<usize> = (0..len).collect();
            let partition = split(dataset, fraction);

            let expected_training = (len as f64 * (1.0 - fraction)).floor() as usize;
            prop_assert_eq!(partition.training.len(), expected_training);
            prop_assert_eq!(partition.evaluation.len(), len - expected_training);
        }

        #[test]
        fn partition_is_disjoint_and_order_preserving(
            len in 0usize..500,
            fraction in 0.001f64..=1.0,
        ) {
            let dataset: Vec<usize> = (0..len).collect();
            let partition = split(dataset.clone(), fraction);

            let mut rejoined = partition.training.clone();
            rejoined.extend_from_slice(&partition.evaluation);
            prop_assert_eq!(rejoined, dataset);
        }
    }
}
