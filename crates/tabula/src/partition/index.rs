//! Composite partition keys.

use super::spec::ParentCondition;

/// Separator between per-parent bucket indices in a composite key.
pub const KEY_SEPARATOR: &str = "-";

/// One cell of the Cartesian product of parent buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PartitionKey {
    pub key: String,
    /// Position of the chosen bucket within each parent's bucket list.
    pub buckets: Vec<usize>,
}

/// Every combination of parent buckets, first parent varying slowest.
pub(crate) fn enumerate(parents: &[ParentCondition]) -> Vec<PartitionKey> {
    if parents.is_empty() || parents.iter().any(|p| p.buckets.is_empty()) {
        return Vec::new();
    }

    let mut keys = Vec::new();
    let mut cursor = vec![0usize; parents.len()];
    loop {
        let key = parents
            .iter()
            .zip(&cursor)
            .map(|(parent, &b)| parent.buckets[b].index.to_string())
            .collect::<Vec<_>>()
            .join(KEY_SEPARATOR);
        keys.push(PartitionKey {
            key,
            buckets: cursor.clone(),
        });

        // Odometer increment from the last parent.
        let mut level = parents.len();
        loop {
            if level == 0 {
                return keys;
            }
            level -= 1;
            cursor[level] += 1;
            if cursor[level] < parents[level].buckets.len() {
                break;
            }
            cursor[level] = 0;
        }
    }
}

/// Composite keys for `parents`, e.g. `"1-2"`.
pub fn composite_keys(parents: &[ParentCondition]) -> Vec<String> {
    enumerate(parents).into_iter().map(|k| k.key).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::spec::{Bucket, ConditionKind, Predicate};

    fn parent(field: &str, buckets: u32) -> ParentCondition {
        ParentCondition {
            field: field.to_string(),
            kind: ConditionKind::Set,
            buckets: (1..=buckets)
                .map(|index| Bucket {
                    index,
                    predicates: vec![Predicate::set_of([index.to_string()])],
                })
                .collect(),
        }
    }

    #[test]
    fn test_cartesian_product() {
        let keys = composite_keys(&[parent("a", 2), parent("b", 3)]);
        assert_eq!(keys, vec!["1-1", "1-2", "1-3", "2-1", "2-2", "2-3"]);
    }

    #[test]
    fn test_single_parent_and_empty() {
        assert_eq!(composite_keys(&[parent("a", 3)]), vec!["1", "2", "3"]);
        assert!(composite_keys(&[]).is_empty());
        assert!(composite_keys(&[parent("a", 2), parent("b", 0)]).is_empty());
    }

    #[test]
    fn test_bucket_positions() {
        let keys = enumerate(&[parent("a", 2), parent("b", 2), parent("c", 2)]);
        assert_eq!(keys.len(), 8);
        assert_eq!(keys[5].key, "2-1-2");
        assert_eq!(keys[5].buckets, vec![1, 0, 1]);
    }
}
