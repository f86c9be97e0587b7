//! Gaussian kernel density estimate, tabulated on a grid.

use rayon::prelude::*;

use super::family::MarginalParams;
use super::interp::CdfTable;

/// Preferred grid spacing.
const GRID_STEP: f64 = 0.01;
const MIN_GRID_POINTS: usize = 200;
pub(crate) const DEFAULT_MAX_GRID_POINTS: usize = 10_000;

/// Fit a KDE with Scott's bandwidth and integrate it to a CDF table.
pub(crate) fn fit_kde(sorted: &[f64], max_points: usize) -> Option<MarginalParams> {
    let n = sorted.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mean = sorted.iter().sum::<f64>() / nf;
    let ss = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    let sample_std = (ss / (nf - 1.0)).sqrt();
    let std = (ss / nf).sqrt();
    if !(sample_std > 0.0) {
        return None;
    }

    let bandwidth = sample_std * nf.powf(-0.2);
    let lower = sorted[0] - 5.0 * std;
    let upper = sorted[n - 1] + 5.0 * std;
    let grid = build_grid(lower, upper, max_points.max(MIN_GRID_POINTS));

    let norm = 1.0 / (nf * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let density: Vec<f64> = grid
        .par_iter()
        .map(|&g| {
            sorted
                .iter()
                .map(|x| {
                    let z = (g - x) / bandwidth;
                    (-0.5 * z * z).exp()
                })
                .sum::<f64>()
                * norm
        })
        .collect();

    let mut cumulative = Vec::with_capacity(grid.len());
    let mut total = 0.0;
    cumulative.push(0.0);
    for i in 1..grid.len() {
        total += 0.5 * (density[i] + density[i - 1]) * (grid[i] - grid[i - 1]);
        cumulative.push(total);
    }
    if !(total > 0.0) || !total.is_finite() {
        return None;
    }
    let u = cumulative.iter().map(|c| c / total).collect();
    let density = density.iter().map(|d| d / total).collect();

    Some(MarginalParams::GaussianKde {
        bandwidth,
        table: CdfTable::new(grid, u)?,
        density,
    })
}

/// `GRID_STEP` spacing when it fits in `[MIN_GRID_POINTS, max_points]`,
/// otherwise an evenly spaced grid of the nearest bound.
fn build_grid(lower: f64, upper: f64, max_points: usize) -> Vec<f64> {
    let span = upper - lower;
    let stepped = (span / GRID_STEP).ceil() as usize + 1;
    if (MIN_GRID_POINTS..=max_points).contains(&stepped) {
        return (0..stepped)
            .map(|i| (lower + i as f64 * GRID_STEP).min(upper))
            .collect();
    }
    let count = stepped.clamp(MIN_GRID_POINTS, max_points);
    let step = span / (count - 1) as f64;
    (0..count).map(|i| lower + i as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_bounds() {
        let grid = build_grid(0.0, 5.0, DEFAULT_MAX_GRID_POINTS);
        assert_eq!(grid.len(), 501);
        assert_eq!(grid[0], 0.0);
        assert!((grid[500] - 5.0).abs() < 1e-9);

        assert_eq!(build_grid(0.0, 0.5, DEFAULT_MAX_GRID_POINTS).len(), MIN_GRID_POINTS);
        assert_eq!(build_grid(0.0, 1e6, DEFAULT_MAX_GRID_POINTS).len(), DEFAULT_MAX_GRID_POINTS);
    }

    #[test]
    fn test_kde_integrates_to_one() {
        let data = vec![1.0, 1.5, 2.0, 2.2, 3.0, 7.0, 7.5, 8.0];
        let params = fit_kde(&data, DEFAULT_MAX_GRID_POINTS).unwrap();
        assert!(params.cdf(-100.0) < 1e-9);
        assert!((params.cdf(100.0) - 1.0).abs() < 1e-9);

        let q = params.cdf(2.0);
        assert!((params.ppf(q) - 2.0).abs() < 0.02);
        // Bimodal data leaves a trough between the clusters.
        assert!(params.pdf(5.0) < params.pdf(2.0));
    }

    #[test]
    fn test_kde_needs_spread() {
        assert!(fit_kde(&[1.0], DEFAULT_MAX_GRID_POINTS).is_none());
        assert!(fit_kde(&[2.0, 2.0, 2.0], DEFAULT_MAX_GRID_POINTS).is_none());
    }
}
