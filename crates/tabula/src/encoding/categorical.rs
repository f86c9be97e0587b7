//! Category bookkeeping for one-hot, label and frequency-interval encodings.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A category's sub-interval `[lower, upper)` of the unit interval.
///
/// `category` is `None` for the null category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryInterval {
    pub category: Option<String>,
    pub lower: f64,
    pub upper: f64,
    /// Representative value (interval midpoint).
    pub midpoint: f64,
    /// Noise scale for the fuzzy variant: width / 6.
    pub std: f64,
}

impl CategoryInterval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Distinct non-null categories in lexicographic order.
pub(crate) fn sorted_categories(values: &[Option<String>]) -> Vec<String> {
    let mut categories: Vec<String> = values.iter().flatten().cloned().collect();
    categories.sort();
    categories.dedup();
    categories
}

/// Partition [0, 1] by relative frequency, most frequent category first.
///
/// Equal counts keep first-appearance order. Bounds are cumulative counts over
/// the total, so the last upper bound is exactly 1.
pub(crate) fn frequency_intervals(values: &[Option<String>]) -> Vec<CategoryInterval> {
    let mut counts: IndexMap<Option<&str>, usize> = IndexMap::new();
    for value in values {
        *counts.entry(value.as_deref()).or_insert(0) += 1;
    }

    let mut ordered: Vec<(Option<&str>, usize)> = counts.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1));

    let total = values.len() as f64;
    let mut cumulative = 0usize;
    ordered
        .into_iter()
        .map(|(category, count)| {
            let lower = cumulative as f64 / total;
            cumulative += count;
            let upper = cumulative as f64 / total;
            CategoryInterval {
                category: category.map(str::to_string),
                lower,
                upper,
                midpoint: (lower + upper) / 2.0,
                std: (upper - lower) / 6.0,
            }
        })
        .collect()
}

/// Interval containing `value` after clipping it to [0, 1].
pub(crate) fn lookup_interval(intervals: &[CategoryInterval], value: f64) -> Option<&CategoryInterval> {
    if intervals.is_empty() || value.is_nan() {
        return None;
    }
    let x = value.clamp(0.0, 1.0);
    let idx = intervals.partition_point(|iv| iv.upper <= x);
    intervals.get(idx.min(intervals.len() - 1))
}
