use prism_columnar::{Column, Table};
use prism_dataset::{BucketsDescription, ColumnQuantization, Histogram};
use prism_privacy::{
    decompose, histogram_scale, laplace_variance, DyadicInterval, DyadicTree,
    NumericDyadicDecomposition,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn decomposition_tiles_the_range(start in 0u64..5000, len in 0u64..5000) {
        let end = start + len;
        let nodes = decompose(start..end);
        let mut cursor = start;
        for node in &nodes {
            prop_assert_eq!(node.start(), cursor);
            prop_assert_eq!(node.start() % node.len(), 0);
            cursor = node.end();
        }
        prop_assert_eq!(cursor, end);
        let bound = 2 * (64 - len.leading_zeros()) as usize;
        prop_assert!(nodes.len() <= bound.max(1));
    }

    #[test]
    fn node_weight_is_the_sum_of_its_children(
        counts in prop::collection::vec(0u64..100, 1..200),
        level in 1u32..8,
        index in 0u64..64,
    ) {
        let tree = DyadicTree::from_leaves(&counts);
        let node = DyadicInterval::new(level, index);
        let [left, right] = node.children().unwrap();
        prop_assert_eq!(tree.weight(node), tree.weight(left) + tree.weight(right));
    }

    #[test]
    fn range_sums_match_plain_counts(
        counts in prop::collection::vec(0u64..1000, 1..300),
        a in 0usize..300,
        b in 0usize..300,
    ) {
        let tree = DyadicTree::from_leaves(&counts);
        let (lo, hi) = (a.min(b).min(counts.len()), a.max(b).min(counts.len()));
        let expected: u64 = counts[lo..hi].iter().sum();
        prop_assert_eq!(tree.range_sum(lo as u64..hi as u64), expected);
    }

    #[test]
    fn bucket_nodes_recover_public_histograms(
        values in prop::collection::vec(0.0f64..50.0, 0..200),
        bucket_count in 1usize..12,
    ) {
        let quantization = ColumnQuantization::new(0.5, 0.0, 50.0).unwrap();
        let buckets = BucketsDescription::new(0.0, 50.0, bucket_count).unwrap();
        let decomposition = NumericDyadicDecomposition::new(quantization, buckets).unwrap();

        let mut leaves = vec![0u64; decomposition.leaf_count()];
        for value in &values {
            if let Some(leaf) = quantization.interval_index(*value) {
                leaves[leaf] += 1;
            }
        }
        let table = Table::with_all_rows(vec![Column::doubles("v", values)]).unwrap();
        let public = decomposition.histogram_sketch("v").scan(&table).unwrap();

        let tree = DyadicTree::from_leaves(&leaves);
        for bucket in 0..bucket_count {
            let from_nodes: u64 = decomposition
                .bucket_nodes(bucket)
                .into_iter()
                .map(|node| tree.weight(node))
                .sum();
            prop_assert_eq!(from_nodes, public.counts[bucket]);
        }
        prop_assert_eq!(leaves.iter().sum::<u64>(), public.in_range());
    }

    #[test]
    fn prefix_nodes_recover_running_totals(
        values in prop::collection::vec(0.0f64..50.0, 0..200),
        bucket_count in 1usize..12,
    ) {
        // Buckets cover only part of the quantized domain.
        let quantization = ColumnQuantization::new(0.5, 0.0, 50.0).unwrap();
        let buckets = BucketsDescription::new(10.0, 40.0, bucket_count).unwrap();
        let decomposition = NumericDyadicDecomposition::new(quantization, buckets).unwrap();

        let mut leaves = vec![0u64; decomposition.leaf_count()];
        for value in &values {
            if let Some(leaf) = quantization.interval_index(*value) {
                leaves[leaf] += 1;
            }
        }
        let table = Table::with_all_rows(vec![Column::doubles("v", values)]).unwrap();
        let public = decomposition.histogram_sketch("v").scan(&table).unwrap();

        let tree = DyadicTree::from_leaves(&leaves);
        let mut running = 0;
        for bucket in 0..bucket_count {
            running += public.counts[bucket];
            let from_nodes: u64 = decomposition
                .prefix_nodes(bucket)
                .into_iter()
                .map(|node| tree.weight(node))
                .sum();
            prop_assert_eq!(from_nodes, running);
        }
    }
}

#[test]
fn deeper_levels_never_get_less_noise() {
    let quantization = ColumnQuantization::new(1.0, 0.0, 1023.0).unwrap();
    let buckets = BucketsDescription::new(0.0, 1024.0, 4).unwrap();
    let decomposition = NumericDyadicDecomposition::new(quantization, buckets).unwrap();
    assert_eq!(decomposition.levels(), 11);

    // Finer quantization means a deeper tree and more noise per node.
    let finer = NumericDyadicDecomposition::new(
        ColumnQuantization::new(0.25, 0.0, 1023.0).unwrap(),
        buckets,
    )
    .unwrap();
    assert!(finer.levels() > decomposition.levels());
    assert!(
        laplace_variance(histogram_scale(finer.levels(), 0.5))
            > laplace_variance(histogram_scale(decomposition.levels(), 0.5))
    );
}

#[test]
fn empty_leaf_vectors_weigh_nothing() {
    let tree = DyadicTree::from_leaves(&[]);
    assert_eq!(tree.total(), 0);
    assert_eq!(tree.range_sum(0..10), 0);
    assert_eq!(Histogram::zero(0).in_range(), 0);
}
