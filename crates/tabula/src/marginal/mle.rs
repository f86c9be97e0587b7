//! Maximum-likelihood fits for the parametric families.

use statrs::function::gamma::ln_gamma;

use super::family::{DistributionFamily, MarginalParams};
use super::optimize::NelderMead;

/// Sample summary shared by the per-family fits.
#[derive(Debug, Clone)]
pub(crate) struct Summary {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub skewness: f64,
}

impl Summary {
    /// Summarize ascending, finite, non-empty data.
    pub fn of_sorted(sorted: &[f64]) -> Self {
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let var = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        let skewness = if std > 0.0 {
            sorted.iter().map(|x| ((x - mean) / std).powi(3)).sum::<f64>() / n
        } else {
            0.0
        };
        Self {
            mean,
            std,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median: median_of_sorted(sorted),
            skewness,
        }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

pub(crate) fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Fit one parametric family to ascending, non-constant data.
pub(crate) fn fit_parametric(
    family: DistributionFamily,
    sorted: &[f64],
    summary: &Summary,
) -> Option<MarginalParams> {
    if summary.std <= 0.0 {
        return None;
    }
    let params = match family {
        DistributionFamily::Gaussian => MarginalParams::Gaussian {
            loc: summary.mean,
            scale: summary.std,
        },
        DistributionFamily::Laplace => {
            let scale =
                sorted.iter().map(|x| (x - summary.median).abs()).sum::<f64>() / sorted.len() as f64;
            MarginalParams::Laplace {
                loc: summary.median,
                scale,
            }
        }
        DistributionFamily::Uniform => MarginalParams::Uniform {
            loc: summary.min,
            scale: summary.range(),
        },
        DistributionFamily::LogLaplace => fit_loglaplace(sorted, summary)?,
        DistributionFamily::Gamma => fit_gamma(sorted, summary)?,
        DistributionFamily::Beta => fit_beta(sorted, summary)?,
        DistributionFamily::StudentT => fit_student_t(sorted, summary)?,
        _ => return None,
    };
    is_valid(&params).then_some(params)
}

fn is_valid(params: &MarginalParams) -> bool {
    params
        .summary()
        .iter()
        .all(|(name, v)| v.is_finite() && (*name == "loc" || *v > 0.0))
}

/// Location strictly below the sample minimum, parametrized on the log scale.
fn loc_below(summary: &Summary, t: f64) -> f64 {
    summary.min - summary.range() * t.clamp(-30.0, 10.0).exp()
}

fn start_offset(summary: &Summary, loc: f64) -> f64 {
    ((summary.min - loc) / summary.range()).max(1e-6).ln()
}

/// Laplace on `ln(x - loc)`; the location is profiled out numerically.
fn fit_loglaplace(sorted: &[f64], summary: &Summary) -> Option<MarginalParams> {
    let profile = |loc: f64| -> Option<(f64, f64, f64)> {
        let logs: Vec<f64> = sorted.iter().map(|x| (x - loc).ln()).collect();
        if logs.iter().any(|v| !v.is_finite()) {
            return None;
        }
        // Already ascending since `sorted` is.
        let m = median_of_sorted(&logs);
        let b = logs.iter().map(|y| (y - m).abs()).sum::<f64>() / logs.len() as f64;
        if b <= 0.0 {
            return None;
        }
        let nll = logs
            .iter()
            .map(|y| (2.0 * b).ln() + (y - m).abs() / b + y)
            .sum::<f64>();
        Some((nll, m, b))
    };

    let (best, _) = NelderMead::default().minimize(
        |p| profile(loc_below(summary, p[0])).map_or(f64::INFINITY, |(nll, _, _)| nll),
        &[(0.01f64).ln()],
        &[1.0],
    );
    let loc = loc_below(summary, best[0]);
    let (_, m, b) = profile(loc)?;
    Some(MarginalParams::LogLaplace {
        c: 1.0 / b,
        loc,
        scale: m.exp(),
    })
}

fn fit_gamma(sorted: &[f64], summary: &Summary) -> Option<MarginalParams> {
    let g = summary.skewness;
    let mut loc0 = if g > 0.05 {
        let k = 4.0 / (g * g);
        summary.mean - k * summary.std * g / 2.0
    } else {
        summary.min - summary.std
    };
    if loc0 >= summary.min {
        loc0 = summary.min - 0.01 * summary.range();
    }
    let offset = summary.mean - loc0;
    let shape0 = (offset / summary.std).powi(2).clamp(0.1, 1e4);
    let scale0 = summary.std.powi(2) / offset;

    let nll = |p: &[f64]| {
        let (k, s, loc) = (p[0].exp(), p[1].exp(), loc_below(summary, p[2]));
        let norm = ln_gamma(k) + k * s.ln();
        sorted
            .iter()
            .map(|x| {
                let y = x - loc;
                norm - (k - 1.0) * y.ln() + y / s
            })
            .sum::<f64>()
    };
    let (best, _) = NelderMead::default().minimize(
        nll,
        &[shape0.ln(), scale0.ln(), start_offset(summary, loc0)],
        &[0.5, 0.5, 0.5],
    );
    Some(MarginalParams::Gamma {
        shape: best[0].exp(),
        loc: loc_below(summary, best[2]),
        scale: best[1].exp(),
    })
}

fn fit_beta(sorted: &[f64], summary: &Summary) -> Option<MarginalParams> {
    let bounds = |p: &[f64]| {
        let lo = loc_below(summary, p[2]);
        let hi = summary.max + summary.range() * p[3].clamp(-30.0, 10.0).exp();
        (lo, hi - lo)
    };

    let start = [0.0, 0.0, (0.01f64).ln(), (0.01f64).ln()];
    let (loc0, scale0) = bounds(&start);
    let m = (summary.mean - loc0) / scale0;
    let v = (summary.std / scale0).powi(2);
    let common = (m * (1.0 - m) / v - 1.0).max(0.1);
    let a0 = (m * common).max(0.05);
    let b0 = ((1.0 - m) * common).max(0.05);

    let nll = |p: &[f64]| {
        let (a, b) = (p[0].exp(), p[1].exp());
        let (loc, scale) = bounds(p);
        let norm = ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b) + scale.ln();
        sorted
            .iter()
            .map(|x| {
                let z = (x - loc) / scale;
                norm - (a - 1.0) * z.ln() - (b - 1.0) * (1.0 - z).ln()
            })
            .sum::<f64>()
    };
    let (best, _) = NelderMead {
        max_iterations: 2000,
        ..NelderMead::default()
    }
    .minimize(nll, &[a0.ln(), b0.ln(), start[2], start[3]], &[0.5, 0.5, 0.5, 0.5]);

    let (loc, scale) = bounds(&best);
    Some(MarginalParams::Beta {
        a: best[0].exp(),
        b: best[1].exp(),
        loc,
        scale,
    })
}

fn fit_student_t(sorted: &[f64], summary: &Summary) -> Option<MarginalParams> {
    let df0: f64 = 5.0;
    let scale0 = summary.std * ((df0 - 2.0) / df0).sqrt();

    let nll = |p: &[f64]| {
        let (df, loc, s) = (p[0].exp(), p[1], p[2].exp());
        let norm = ln_gamma(df / 2.0) - ln_gamma((df + 1.0) / 2.0)
            + 0.5 * (df * std::f64::consts::PI).ln()
            + s.ln();
        sorted
            .iter()
            .map(|x| {
                let z = (x - loc) / s;
                norm + (df + 1.0) / 2.0 * (z * z / df).ln_1p()
            })
            .sum::<f64>()
    };
    let (best, _) = NelderMead::default().minimize(
        nll,
        &[df0.ln(), summary.median, scale0.ln()],
        &[0.5, 0.1 * summary.std, 0.5],
    );
    Some(MarginalParams::StudentT {
        df: best[0].exp().min(1e6),
        loc: best[1],
        scale: best[2].exp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{Distribution, Gamma as GammaDist, Normal};

    fn sorted(mut v: Vec<f64>) -> Vec<f64> {
        v.sort_by(f64::total_cmp);
        v
    }

    #[test]
    fn test_summary() {
        let data = sorted(vec![1.0, 2.0, 3.0, 4.0]);
        let s = Summary::of_sorted(&data);
        assert_eq!(s.mean, 2.5);
        assert_eq!(s.median, 2.5);
        assert_eq!(s.range(), 3.0);
        assert!((s.std - 1.25f64.sqrt()).abs() < 1e-12);
        assert!(s.skewness.abs() < 1e-12);
    }

    #[test]
    fn test_gaussian_and_laplace_closed_forms() {
        let data = sorted(vec![1.0, 2.0, 3.0, 4.0, 10.0]);
        let s = Summary::of_sorted(&data);
        let g = fit_parametric(DistributionFamily::Gaussian, &data, &s).unwrap();
        assert_eq!(g, MarginalParams::Gaussian { loc: 4.0, scale: s.std });

        let l = fit_parametric(DistributionFamily::Laplace, &data, &s).unwrap();
        // |x - 3| = 2, 1, 0, 1, 7
        assert_eq!(l, MarginalParams::Laplace { loc: 3.0, scale: 2.2 });
    }

    #[test]
    fn test_gamma_recovers_shape() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let dist = GammaDist::new(3.0, 2.0).unwrap();
        let data = sorted((0..2000).map(|_| dist.sample(&mut rng)).collect());
        let s = Summary::of_sorted(&data);
        let fitted = fit_parametric(DistributionFamily::Gamma, &data, &s).unwrap();
        let MarginalParams::Gamma { shape, loc, scale } = fitted else {
            panic!("expected gamma");
        };
        assert!(loc < s.min);
        // Mean of the fitted law should match the sample mean.
        assert!((loc + shape * scale - s.mean).abs() < 0.25);
    }

    #[test]
    fn test_student_t_centers_on_median() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let dist = Normal::new(7.0, 1.5).unwrap();
        let data = sorted((0..1000).map(|_| dist.sample(&mut rng)).collect());
        let s = Summary::of_sorted(&data);
        let fitted = fit_parametric(DistributionFamily::StudentT, &data, &s).unwrap();
        let MarginalParams::StudentT { loc, scale, .. } = fitted else {
            panic!("expected student t");
        };
        assert!((loc - 7.0).abs() < 0.3);
        assert!(scale > 0.5 && scale < 3.0);
    }

    #[test]
    fn test_bounded_families_cover_sample() {
        let data = sorted((1..=50).map(|i| (i as f64 / 51.0).powi(2)).collect());
        let s = Summary::of_sorted(&data);
        for family in [DistributionFamily::Beta, DistributionFamily::LogLaplace] {
            let params = fit_parametric(family, &data, &s).unwrap();
            for &x in &data {
                let u = params.cdf(x);
                assert!(u > 0.0 && u < 1.0 + 1e-12, "{} at {}: {}", family, x, u);
            }
        }
    }

    #[test]
    fn test_constant_data_not_fitted() {
        let data = vec![2.0; 5];
        let s = Summary::of_sorted(&data);
        assert!(fit_parametric(DistributionFamily::Gaussian, &data, &s).is_none());
    }
}
