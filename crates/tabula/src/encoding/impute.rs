//! Fill statistics for null imputation.

use std::cmp::Ordering;

use crate::metadata::NullPolicy;

/// Fill value for `policy` over the observed (non-`NaN`) values.
///
/// Returns `None` for [`NullPolicy::Ignore`] and when a statistic has no data.
/// `round` rounds statistic-derived values (integer and datetime fields).
pub(crate) fn fill_value(values: &[f64], policy: NullPolicy, round: bool) -> Option<f64> {
    let observed: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();

    let fill = match policy {
        NullPolicy::Ignore => return None,
        NullPolicy::Fixed(v) => return Some(v),
        _ if observed.is_empty() => return None,
        NullPolicy::Mean => observed.iter().sum::<f64>() / observed.len() as f64,
        NullPolicy::Median => median(observed),
        NullPolicy::Mode => mode(observed),
    };

    Some(if round { fill.round() } else { fill })
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Most frequent value; ties go to the smallest.
fn mode(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mut best = values[0];
    let mut best_count = 0;
    let mut i = 0;
    while i < values.len() {
        let mut j = i;
        while j < values.len() && values[j] == values[i] {
            j += 1;
        }
        if j - i > best_count {
            best_count = j - i;
            best = values[i];
        }
        i = j;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics() {
        let values = [1.0, 2.0, 2.0, f64::NAN, 7.0];
        assert_eq!(fill_value(&values, NullPolicy::Mean, false), Some(3.0));
        assert_eq!(fill_value(&values, NullPolicy::Median, false), Some(2.0));
        assert_eq!(fill_value(&values, NullPolicy::Mode, false), Some(2.0));
        assert_eq!(fill_value(&values, NullPolicy::Fixed(-1.0), false), Some(-1.0));
        assert_eq!(fill_value(&values, NullPolicy::Ignore, false), None);
    }

    #[test]
    fn test_mode_tie_goes_to_smallest() {
        assert_eq!(fill_value(&[3.0, 1.0, 3.0, 1.0], NullPolicy::Mode, false), Some(1.0));
    }

    #[test]
    fn test_rounding_and_empty() {
        assert_eq!(fill_value(&[1.0, 2.0], NullPolicy::Mean, true), Some(2.0));
        assert_eq!(fill_value(&[f64::NAN], NullPolicy::Mean, false), None);
        assert_eq!(fill_value(&[], NullPolicy::Fixed(4.0), false), Some(4.0));
    }
}
