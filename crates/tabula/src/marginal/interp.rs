//! Tabulated CDFs with linear interpolation in both directions.

use serde::{Deserialize, Serialize};

/// Monotone `(x, u)` pairs describing a CDF.
///
/// Pairs are kept sorted by `u` (ties broken by `x`), which for a valid CDF is
/// also sorted by `x`, so one table serves both the forward and inverse maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdfTable {
    x: Vec<f64>,
    u: Vec<f64>,
}

impl CdfTable {
    /// Build a table; `None` unless there are at least two finite pairs.
    pub(crate) fn new(x: Vec<f64>, u: Vec<f64>) -> Option<Self> {
        if x.len() != u.len() || x.len() < 2 {
            return None;
        }
        if x.iter().chain(&u).any(|v| !v.is_finite()) {
            return None;
        }

        let mut pairs: Vec<(f64, f64)> = u.into_iter().zip(x).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        let (u, x) = pairs.into_iter().unzip();
        Some(Self { x, u })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Support of the table.
    pub fn range(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    /// Forward map, flat outside the tabulated range.
    pub fn cdf(&self, value: f64) -> f64 {
        self.interpolate_x(value, &self.u).clamp(0.0, 1.0)
    }

    /// Inverse map, clamped to the tabulated range.
    pub fn ppf(&self, q: f64) -> f64 {
        let last = self.u.len() - 1;
        if q <= self.u[0] {
            return self.x[0];
        }
        if q >= self.u[last] {
            return self.x[last];
        }
        let i = self.u.partition_point(|&u| u < q);
        let (u0, u1) = (self.u[i - 1], self.u[i]);
        let (x0, x1) = (self.x[i - 1], self.x[i]);
        if u1 == u0 {
            x1
        } else {
            x0 + (q - u0) / (u1 - u0) * (x1 - x0)
        }
    }

    /// Slope of the piecewise-linear CDF at `value`; zero outside the range.
    pub fn slope(&self, value: f64) -> f64 {
        let (lo, hi) = self.range();
        if value < lo || value > hi {
            return 0.0;
        }
        let i = self.x.partition_point(|&x| x <= value).clamp(1, self.x.len() - 1);
        let dx = self.x[i] - self.x[i - 1];
        if dx <= 0.0 {
            0.0
        } else {
            (self.u[i] - self.u[i - 1]) / dx
        }
    }

    /// Interpolate `ys` (aligned with the table's `x`) at `value`.
    pub(crate) fn interpolate_x(&self, value: f64, ys: &[f64]) -> f64 {
        let last = self.x.len() - 1;
        let i = self.x.partition_point(|&x| x <= value);
        if i == 0 {
            return ys[0];
        }
        if i > last {
            return ys[last];
        }
        let (x0, x1) = (self.x[i - 1], self.x[i]);
        let (y0, y1) = (ys[i - 1], ys[i]);
        if x1 == x0 {
            y1
        } else {
            y0 + (value - x0) / (x1 - x0) * (y1 - y0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_degenerate_input() {
        assert!(CdfTable::new(vec![1.0], vec![0.5]).is_none());
        assert!(CdfTable::new(vec![1.0, 2.0], vec![0.5]).is_none());
        assert!(CdfTable::new(vec![1.0, f64::NAN], vec![0.0, 1.0]).is_none());
    }

    #[test]
    fn test_forward_and_inverse() {
        let table = CdfTable::new(vec![0.0, 1.0, 3.0], vec![0.0, 0.5, 1.0]).unwrap();
        assert_eq!(table.cdf(0.5), 0.25);
        assert_eq!(table.cdf(2.0), 0.75);
        assert_eq!(table.cdf(-10.0), 0.0);
        assert_eq!(table.cdf(10.0), 1.0);
        assert_eq!(table.ppf(0.25), 0.5);
        assert_eq!(table.ppf(0.75), 2.0);
        assert_eq!(table.ppf(1.5), 3.0);
        assert_eq!(table.slope(2.0), 0.25);
        assert_eq!(table.slope(4.0), 0.0);
    }

    #[test]
    fn test_sorted_by_u() {
        let table = CdfTable::new(vec![3.0, 0.0, 1.0], vec![1.0, 0.0, 0.5]).unwrap();
        assert_eq!(table.range(), (0.0, 3.0));
        assert_eq!(table.ppf(0.5), 1.0);
    }
}
