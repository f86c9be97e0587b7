//! Rank correlation estimation and positive semi-definite repair.

use std::f64::consts::PI;

use nalgebra::{Cholesky, DMatrix, SymmetricEigen};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TabulaError};
use crate::table::NumericTable;

/// Smallest eigenvalue kept when repairing a correlation matrix.
pub(crate) const PSD_EPSILON: f64 = f32::EPSILON as f64;

/// Eigenvalues above `-PSD_TOLERANCE` count as non-negative.
const PSD_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    #[default]
    Kendall,
    Spearman,
    /// Product-moment, used without any mapping.
    Pearson,
}

impl CorrelationMethod {
    /// Raw coefficient over pairwise-complete observations.
    pub fn coefficient(&self, x: &[f64], y: &[f64]) -> f64 {
        match self {
            CorrelationMethod::Kendall => kendall_tau(x, y),
            CorrelationMethod::Spearman => spearman_rho(x, y),
            CorrelationMethod::Pearson => pearson_r(x, y),
        }
    }

    /// Map a coefficient to its Pearson equivalent under a Gaussian copula.
    pub fn to_pearson(&self, rho: f64) -> f64 {
        match self {
            CorrelationMethod::Kendall => (rho * PI / 2.0).sin(),
            CorrelationMethod::Spearman => 2.0 * (rho * PI / 6.0).sin(),
            CorrelationMethod::Pearson => rho,
        }
    }
}

fn complete_pairs(x: &[f64], y: &[f64]) -> Vec<(f64, f64)> {
    x.iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .collect()
}

/// Pairs tied within consecutive runs of equal items.
fn tied_pairs<T: PartialEq>(sorted: impl Iterator<Item = T>) -> u64 {
    let mut total = 0u64;
    let mut run = 0u64;
    let mut previous: Option<T> = None;
    for item in sorted {
        if previous.as_ref() == Some(&item) {
            run += 1;
        } else {
            total += run * (run + 1) / 2;
            run = 0;
        }
        previous = Some(item);
    }
    total + run * (run + 1) / 2
}

/// Bottom-up merge sort returning the number of inversions.
fn sort_counting_swaps(values: &mut Vec<f64>) -> u64 {
    let n = values.len();
    let mut buffer = vec![0.0; n];
    let mut swaps = 0u64;
    let mut width = 1;
    while width < n {
        let mut start = 0;
        while start < n {
            let mid = (start + width).min(n);
            let end = (start + 2 * width).min(n);
            let (mut i, mut j, mut k) = (start, mid, start);
            while i < mid && j < end {
                if values[j] < values[i] {
                    buffer[k] = values[j];
                    swaps += (mid - i) as u64;
                    j += 1;
                } else {
                    buffer[k] = values[i];
                    i += 1;
                }
                k += 1;
            }
            buffer[k..k + (mid - i)].copy_from_slice(&values[i..mid]);
            k += mid - i;
            buffer[k..k + (end - j)].copy_from_slice(&values[j..end]);
            start += 2 * width;
        }
        std::mem::swap(values, &mut buffer);
        width *= 2;
    }
    swaps
}

/// Kendall's tau-b in `O(n log n)` (Knight's algorithm). Undefined values are 0.
pub fn kendall_tau(x: &[f64], y: &[f64]) -> f64 {
    let mut pairs = complete_pairs(x, y);
    let n = pairs.len() as u64;
    if n < 2 {
        return 0.0;
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let n0 = (n * (n - 1) / 2) as f64;
    let n1 = tied_pairs(pairs.iter().map(|p| p.0)) as f64;
    let n3 = tied_pairs(pairs.iter().copied()) as f64;

    let mut ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    let swaps = sort_counting_swaps(&mut ys) as f64;
    let n2 = tied_pairs(ys.iter().copied()) as f64;

    let denominator = ((n0 - n1) * (n0 - n2)).sqrt();
    if denominator <= 0.0 {
        return 0.0;
    }
    ((n0 - n1 - n2 + n3 - 2.0 * swaps) / denominator).clamp(-1.0, 1.0)
}

/// Average ranks (1-based), ties sharing the mean of their positions.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// Spearman's rho: Pearson correlation of average ranks.
pub fn spearman_rho(x: &[f64], y: &[f64]) -> f64 {
    let (a, b): (Vec<f64>, Vec<f64>) = complete_pairs(x, y).into_iter().unzip();
    pearson_complete(&average_ranks(&a), &average_ranks(&b))
}

/// Pearson product-moment correlation. Undefined values are 0.
pub fn pearson_r(x: &[f64], y: &[f64]) -> f64 {
    let (a, b): (Vec<f64>, Vec<f64>) = complete_pairs(x, y).into_iter().unzip();
    pearson_complete(&a, &b)
}

fn pearson_complete(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if x.len() < 2 {
        return 0.0;
    }
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    let r = sxy / (sxx * syy).sqrt();
    if r.is_finite() { r.clamp(-1.0, 1.0) } else { 0.0 }
}

/// Symmetric, unit-diagonal, positive semi-definite correlation matrix over
/// named channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    channels: Vec<String>,
    /// Row-major.
    values: Vec<f64>,
}

impl CorrelationMatrix {
    pub fn identity(channels: Vec<String>) -> Self {
        let d = channels.len();
        let matrix = DMatrix::<f64>::identity(d, d);
        Self::from_matrix(channels, &matrix)
    }

    /// Estimate over every channel of `table`, map to Pearson equivalents and
    /// repair to a valid correlation matrix.
    pub fn estimate(table: &NumericTable, method: CorrelationMethod) -> Result<Self> {
        let channels = table.channel_names();
        let columns: Vec<&[f64]> = table.columns().map(|(_, values)| values).collect();
        let d = columns.len();

        let pairs: Vec<(usize, usize)> = (0..d)
            .flat_map(|i| (i + 1..d).map(move |j| (i, j)))
            .collect();
        let coefficients: Vec<f64> = pairs
            .par_iter()
            .map(|&(i, j)| {
                let rho = method.to_pearson(method.coefficient(columns[i], columns[j]));
                if rho.is_finite() { rho.clamp(-1.0, 1.0) } else { 0.0 }
            })
            .collect();

        let mut matrix = DMatrix::<f64>::identity(d, d);
        for (&(i, j), &rho) in pairs.iter().zip(&coefficients) {
            matrix[(i, j)] = rho;
            matrix[(j, i)] = rho;
        }

        let repaired = repair_psd(matrix)?;
        Ok(Self::from_matrix(channels, &repaired))
    }

    pub(crate) fn from_matrix(channels: Vec<String>, matrix: &DMatrix<f64>) -> Self {
        let d = channels.len();
        let values = (0..d)
            .flat_map(|i| (0..d).map(move |j| (i, j)))
            .map(|(i, j)| matrix[(i, j)])
            .collect();
        Self { channels, values }
    }

    pub fn dim(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn index_of(&self, channel: &str) -> Option<usize> {
        self.channels.iter().position(|c| c == channel)
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.dim() + j]
    }

    /// Entry for two channels by name.
    pub fn between(&self, a: &str, b: &str) -> Option<f64> {
        Some(self.get(self.index_of(a)?, self.index_of(b)?))
    }

    pub fn to_matrix(&self) -> DMatrix<f64> {
        let d = self.dim();
        DMatrix::from_row_slice(d, d, &self.values)
    }

    /// Smallest eigenvalue; `1.0` for an empty matrix.
    pub fn min_eigenvalue(&self) -> f64 {
        if self.dim() == 0 {
            return 1.0;
        }
        SymmetricEigen::new(self.to_matrix())
            .eigenvalues
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }

    pub fn is_valid(&self) -> bool {
        let d = self.dim();
        let symmetric = (0..d).all(|i| {
            (0..d).all(|j| (self.get(i, j) - self.get(j, i)).abs() < 1e-12)
        });
        let unit_diagonal = (0..d).all(|i| (self.get(i, i) - 1.0).abs() < 1e-12);
        symmetric && unit_diagonal && self.min_eigenvalue() >= -PSD_TOLERANCE
    }
}

/// Return `matrix` if it factors, otherwise clip its eigenvalues to
/// [`PSD_EPSILON`], rebuild and rescale to unit diagonal.
pub(crate) fn repair_psd(matrix: DMatrix<f64>) -> Result<DMatrix<f64>> {
    let d = matrix.nrows();
    if d == 0 {
        return Ok(matrix);
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(TabulaError::fit_failure(
            "correlation matrix",
            "non-finite coefficient",
        ));
    }
    if Cholesky::new(matrix.clone()).is_some() {
        return Ok(matrix);
    }

    let eigen = SymmetricEigen::new(matrix);
    let before = eigen.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
    let clipped = eigen.eigenvalues.map(|l| l.max(PSD_EPSILON));
    let rebuilt =
        &eigen.eigenvectors * DMatrix::from_diagonal(&clipped) * eigen.eigenvectors.transpose();

    let scale: Vec<f64> = (0..d).map(|i| rebuilt[(i, i)].sqrt()).collect();
    let mut repaired = DMatrix::<f64>::identity(d, d);
    for i in 0..d {
        for j in (i + 1)..d {
            let v = 0.5 * (rebuilt[(i, j)] + rebuilt[(j, i)]) / (scale[i] * scale[j]);
            let v = v.clamp(-1.0, 1.0);
            repaired[(i, j)] = v;
            repaired[(j, i)] = v;
        }
    }

    if repaired.iter().any(|v| !v.is_finite()) {
        return Err(TabulaError::fit_failure(
            "correlation matrix",
            "repair produced non-finite entries",
        ));
    }
    let after = SymmetricEigen::new(repaired.clone())
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    if after < -PSD_TOLERANCE {
        return Err(TabulaError::fit_failure(
            "correlation matrix",
            format!("minimum eigenvalue {:.3e} after repair", after),
        ));
    }
    debug!(dim = d, before, after, "repaired correlation matrix");
    Ok(repaired)
}

/// A factor `L` with `L Lᵀ = matrix`: Cholesky when possible, otherwise the
/// eigen factor with negative eigenvalues clipped to zero.
pub(crate) fn sampling_factor(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    if matrix.nrows() == 0 {
        return matrix.clone();
    }
    if let Some(cholesky) = Cholesky::new(matrix.clone()) {
        return cholesky.l();
    }
    let eigen = SymmetricEigen::new(matrix.clone());
    let roots = eigen.eigenvalues.map(|l| l.max(0.0).sqrt());
    eigen.eigenvectors * DMatrix::from_diagonal(&roots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kendall_matches_pairwise_definition() {
        assert!((kendall_tau(&[1.0, 2.0, 3.0, 4.0, 5.0], &[3.0, 4.0, 1.0, 2.0, 5.0]) - 0.2).abs() < 1e-12);
        assert!((kendall_tau(&[1.0, 1.0, 2.0, 3.0], &[1.0, 2.0, 2.0, 3.0]) - 0.8).abs() < 1e-12);
        let x = [1.0, 2.0, 2.0, 3.0, 4.0, 4.0];
        let y = [2.0, 1.0, 3.0, 3.0, 5.0, 4.0];
        assert!((kendall_tau(&x, &y) - 0.7412493166611012).abs() < 1e-12);
    }

    #[test]
    fn test_kendall_extremes_and_degenerate() {
        let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let doubled: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        let reversed: Vec<f64> = x.iter().rev().copied().collect();
        assert_eq!(kendall_tau(&x, &doubled), 1.0);
        assert_eq!(kendall_tau(&x, &reversed), -1.0);
        assert_eq!(kendall_tau(&x, &vec![3.0; 50]), 0.0);
        assert_eq!(kendall_tau(&[1.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_pairwise_complete_observations() {
        let x = [1.0, 2.0, f64::NAN, 4.0];
        let y = [2.0, 4.0, 100.0, 8.0];
        assert!((pearson_r(&x, &y) - 1.0).abs() < 1e-12);
        assert!((spearman_rho(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_spearman_average_ranks() {
        assert_eq!(average_ranks(&[10.0, 20.0, 20.0, 5.0]), vec![2.0, 3.5, 3.5, 1.0]);
        let rho = spearman_rho(&[1.0, 1.0, 2.0, 3.0], &[1.0, 2.0, 2.0, 3.0]);
        assert!((rho - 0.8333333333333334).abs() < 1e-12);
    }

    #[test]
    fn test_sine_maps() {
        assert!((CorrelationMethod::Kendall.to_pearson(1.0) - 1.0).abs() < 1e-12);
        assert!((CorrelationMethod::Spearman.to_pearson(1.0) - 1.0).abs() < 1e-12);
        assert_eq!(CorrelationMethod::Pearson.to_pearson(0.3), 0.3);
        assert_eq!(CorrelationMethod::Kendall.to_pearson(0.0), 0.0);
    }

    #[test]
    fn test_repair_restores_psd() {
        // Pairwise-consistent but jointly impossible.
        let matrix = DMatrix::from_row_slice(3, 3, &[1.0, 0.9, -0.9, 0.9, 1.0, 0.9, -0.9, 0.9, 1.0]);
        let repaired = repair_psd(matrix).unwrap();
        let corr = CorrelationMatrix::from_matrix(vec!["a".into(), "b".into(), "c".into()], &repaired);
        assert!(corr.is_valid());
        assert!(corr.get(0, 1) > 0.0);
        assert!(corr.get(0, 2) < 0.0);
    }

    #[test]
    fn test_estimate_perfectly_dependent_channels() {
        let x: Vec<f64> = (0..40).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        let table = NumericTable::from_columns(vec![("x", x), ("y", y)]).unwrap();
        let corr = CorrelationMatrix::estimate(&table, CorrelationMethod::Kendall).unwrap();
        assert!(corr.is_valid());
        assert!(corr.between("x", "y").unwrap() > 0.999);
    }

    #[test]
    fn test_sampling_factor_reconstructs() {
        let matrix = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let factor = sampling_factor(&matrix);
        let product = &factor * factor.transpose();
        assert!((product - matrix).abs().max() < 1e-9);
    }
}
