//! Set difference between the destination and the source.

use index_sync_shared::{IdentifierSet, RecordId};

/// Default number of sample identifiers logged per side of a diff.
pub const DIFF_SAMPLE_SIZE: usize = 10;

/// What a run has to change in the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// In the source but not in the destination.
    pub additions: IdentifierSet,
    /// In the destination but not in the source.
    pub removals: IdentifierSet,
    /// In both.
    pub common: usize,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    /// Up to `n` additions, in ascending order for stable logs.
    pub fn sample_additions(&self, n: usize) -> Vec<&RecordId> {
        sample(&self.additions, n)
    }

    /// Up to `n` removals, in ascending order for stable logs.
    pub fn sample_removals(&self, n: usize) -> Vec<&RecordId> {
        sample(&self.removals, n)
    }
}

/// Compute which identifiers to add and which to remove.
///
/// `additions` is `source_ids - destination_ids` and `removals` is
/// `destination_ids - source_ids`. The two are disjoint and neither input
/// is modified.
pub fn diff(destination_ids: &IdentifierSet, source_ids: &IdentifierSet) -> SyncPlan {
    let additions: IdentifierSet = source_ids.difference(destination_ids).cloned().collect();
    let removals: IdentifierSet = destination_ids.difference(source_ids).cloned().collect();
    let common = source_ids.len() - additions.len();

    SyncPlan {
        additions,
        removals,
        common,
    }
}

fn sample(ids: &IdentifierSet, n: usize) -> Vec<&RecordId> {
    let mut sorted: Vec<&RecordId> = ids.iter().collect();
    sorted.sort_by(|a, b| natural_cmp(a.as_str(), b.as_str()));
    sorted.truncate(n);
    sorted
}

/// Numeric identifiers sort by value, everything else lexically after them.
///
/// A total order: numeric ids that share a value ("7", "07") fall back to
/// their text.
pub(crate) fn natural_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<i128>(), b.parse::<i128>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(values: &[i64]) -> IdentifierSet {
        values.iter().copied().map(RecordId::from).collect()
    }

    #[test]
    fn test_diff_basic() {
        let plan = diff(&ids(&[2, 3, 4]), &ids(&[1, 2, 3]));

        assert_eq!(plan.additions, ids(&[1]));
        assert_eq!(plan.removals, ids(&[4]));
        assert_eq!(plan.common, 2);
    }

    #[test]
    fn test_diff_empty_destination_adds_everything() {
        let plan = diff(&ids(&[]), &ids(&[1, 2, 3]));

        assert_eq!(plan.additions, ids(&[1, 2, 3]));
        assert!(plan.removals.is_empty());
    }

    #[test]
    fn test_diff_empty_source_removes_everything() {
        let plan = diff(&ids(&[5, 6]), &ids(&[]));

        assert!(plan.additions.is_empty());
        assert_eq!(plan.removals, ids(&[5, 6]));
        assert_eq!(plan.common, 0);
    }

    #[test]
    fn test_identical_sets_need_nothing() {
        let plan = diff(&ids(&[1, 2]), &ids(&[1, 2]));
        assert!(plan.is_empty());
        assert_eq!(plan.common, 2);
    }

    #[test]
    fn test_samples_are_sorted_and_bounded() {
        let plan = diff(&ids(&[]), &ids(&[30, 4, 200, 1, 15]));

        let sample: Vec<&str> = plan.sample_additions(3).into_iter().map(RecordId::as_str).collect();
        assert_eq!(sample, vec!["1", "4", "15"]);
        assert!(plan.sample_removals(10).is_empty());
    }

    #[test]
    fn test_natural_order_with_mixed_ids() {
        let mut ids = vec!["10", "1a", "9", "07", "7", "b", "-3"];
        ids.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(ids, vec!["-3", "07", "7", "9", "10", "1a", "b"]);
    }

    proptest! {
        #[test]
        fn prop_diff_partitions_the_union(
            dest in proptest::collection::hash_set(0i64..200, 0..100),
            src in proptest::collection::hash_set(0i64..200, 0..100),
        ) {
            let dest: IdentifierSet = dest.into_iter().map(RecordId::from).collect();
            let src: IdentifierSet = src.into_iter().map(RecordId::from).collect();

            let plan = diff(&dest, &src);

            prop_assert!(plan.additions.is_disjoint(&plan.removals));
            prop_assert!(plan.additions.iter().all(|id| src.contains(id) && !dest.contains(id)));
            prop_assert!(plan.removals.iter().all(|id| dest.contains(id) && !src.contains(id)));

            // Applying the plan to the destination yields the source.
            let applied: IdentifierSet = dest
                .difference(&plan.removals)
                .cloned()
                .chain(plan.additions.iter().cloned())
                .collect();
            prop_assert_eq!(applied, src.clone());
            prop_assert_eq!(plan.common + plan.additions.len(), src.len());
        }

        #[test]
        fn prop_natural_order_is_transitive(
            a in "0?[0-9]{1,2}a?",
            b in "0?[0-9]{1,2}a?",
            c in "0?[0-9]{1,2}a?",
        ) {
            use std::cmp::Ordering::Greater;

            if natural_cmp(&a, &b) != Greater && natural_cmp(&b, &c) != Greater {
                prop_assert_ne!(natural_cmp(&a, &c), Greater);
            }
            prop_assert_eq!(natural_cmp(&a, &b), natural_cmp(&b, &a).reverse());
        }
    }
}
