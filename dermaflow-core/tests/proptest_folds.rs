//! Property-based tests for the k-fold splitter.

use dermaflow_core::training::KFold;
use proptest::prelude::*;

proptest! {
    /// Every row lands in exactly one held-out fold.
    #[test]
    fn folds_partition_the_rows(
        n in 2usize..200,
        k in 2usize..10,
        seed in any::<u64>(),
        shuffle in any::<bool>(),
    ) {
        prop_assume!(k <= n);
        let folds = KFold::new(k, shuffle, seed).split(n).unwrap();
        prop_assert_eq!(folds.len(), k);

        let mut heldout: Vec<usize> = folds
            .iter()
            .flat_map(|(_, h)| h.iter().copied())
            .collect();
        heldout.sort_unstable();
        prop_assert_eq!(heldout, (0..n).collect::<Vec<_>>());
    }

    /// Train and held-out indices of one fold never overlap, and together
    /// cover all rows.
    #[test]
    fn train_and_heldout_are_complementary(
        n in 2usize..120,
        k in 2usize..8,
        seed in any::<u64>(),
    ) {
        prop_assume!(k <= n);
        let folds = KFold::new(k, true, seed).split(n).unwrap();
        for (train, heldout) in folds {
            prop_assert_eq!(train.len() + heldout.len(), n);
            let mut all: Vec<usize> = train.iter().chain(heldout.iter()).copied().collect();
            all.sort_unstable();
            prop_assert_eq!(all, (0..n).collect::<Vec<_>>());
        }
    }

    /// Fold sizes differ by at most one row.
    #[test]
    fn fold_sizes_are_balanced(
        n in 2usize..200,
        k in 2usize..10,
        seed in any::<u64>(),
    ) {
        prop_assume!(k <= n);
        let folds = KFold::new(k, true, seed).split(n).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|(_, h)| h.len()).collect();
        let min = sizes.iter().min().unwrap();
        let max = sizes.iter().max().unwrap();
        prop_assert!(max - min <= 1);
    }

    /// The same seed reproduces the same assignment; shuffling off ignores
    /// the seed entirely.
    #[test]
    fn seed_determinism(
        n in 2usize..120,
        k in 2usize..8,
        seed in any::<u64>(),
        other_seed in any::<u64>(),
    ) {
        prop_assume!(k <= n);
        let a = KFold::new(k, true, seed).split(n).unwrap();
        let b = KFold::new(k, true, seed).split(n).unwrap();
        prop_assert_eq!(a, b);

        let c = KFold::new(k, false, seed).split(n).unwrap();
        let d = KFold::new(k, false, other_seed).split(n).unwrap();
        prop_assert_eq!(c, d);
    }
}
