//! Splitting identifier lists into size-bounded batches

/// Split `items` into consecutive batches of at most `batch_size` elements.
///
/// The last batch may be shorter. An empty input yields no batches, and a
/// `batch_size` at least as large as the input yields exactly one.
///
/// # Panics
///
/// Panics if `batch_size` is zero.
pub fn split<T: Clone>(items: &[T], batch_size: usize) -> Vec<Vec<T>> {
    assert!(batch_size > 0, "batch size must be positive");
    items.chunks(batch_size).map(<[T]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_evenly() {
        assert_eq!(
            split(&ids(&["a", "b", "c", "d"]), 2),
            vec![ids(&["a", "b"]), ids(&["c", "d"])]
        );
    }

    #[test]
    fn oversized_batch_yields_single_batch() {
        assert_eq!(
            split(&ids(&["a", "b", "c", "d"]), 5),
            vec![ids(&["a", "b", "c", "d"])]
        );
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(split::<String>(&[], 2).is_empty());
    }

    #[test]
    fn last_batch_is_shorter() {
        let batches = split(&ids(&["a", "b", "c"]), 2);
        assert_eq!(batches, vec![ids(&["a", "b"]), ids(&["c"])]);
    }

    #[test]
    #[should_panic(expected = "batch size must be positive")]
    fn zero_batch_size_panics() {
        split(&ids(&["a"]), 0);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Batch count is ceil(N/B), every batch fits, and order is preserved
            #[test]
            fn split_partitions_input(
                items in prop::collection::vec("[a-z0-9-]{1,12}", 0..300),
                batch_size in 1usize..64
            ) {
                let batches = split(&items, batch_size);

                prop_assert_eq!(batches.len(), items.len().div_ceil(batch_size));
                prop_assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= batch_size));

                let rejoined: Vec<String> = batches.into_iter().flatten().collect();
                prop_assert_eq!(rejoined, items);
            }
        }
    }
}
