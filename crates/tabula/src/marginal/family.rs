//! Distribution families and their evaluation.

use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, Continuous, ContinuousCDF, Gamma, Normal, StudentsT};

use super::interp::CdfTable;

static STANDARD_NORMAL: Lazy<Normal> = Lazy::new(|| Normal::new(0.0, 1.0).unwrap());

/// Quantiles are kept this far from 0 and 1 for families with unbounded support.
const QUANTILE_EPSILON: f64 = 1e-12;

/// Standard normal CDF.
pub(crate) fn norm_cdf(z: f64) -> f64 {
    STANDARD_NORMAL.cdf(z)
}

/// Standard normal inverse CDF.
pub(crate) fn norm_ppf(q: f64) -> f64 {
    STANDARD_NORMAL.inverse_cdf(q.clamp(QUANTILE_EPSILON, 1.0 - QUANTILE_EPSILON))
}

/// Candidate distribution shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionFamily {
    Beta,
    Gamma,
    Gaussian,
    StudentT,
    Laplace,
    LogLaplace,
    Uniform,
    Empirical,
    GaussianKde,
    Degenerate,
}

impl DistributionFamily {
    pub fn is_parametric(&self) -> bool {
        !matches!(
            self,
            DistributionFamily::Empirical
                | DistributionFamily::GaussianKde
                | DistributionFamily::Degenerate
        )
    }
}

impl fmt::Display for DistributionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistributionFamily::Beta => "beta",
            DistributionFamily::Gamma => "gamma",
            DistributionFamily::Gaussian => "gaussian",
            DistributionFamily::StudentT => "student_t",
            DistributionFamily::Laplace => "laplace",
            DistributionFamily::LogLaplace => "loglaplace",
            DistributionFamily::Uniform => "uniform",
            DistributionFamily::Empirical => "empirical",
            DistributionFamily::GaussianKde => "gaussian_kde",
            DistributionFamily::Degenerate => "degenerate",
        };
        write!(f, "{}", name)
    }
}

/// A fitted family with its parameters.
///
/// Parametric families use a location/scale convention: the standard shape is
/// evaluated at `z = (x - loc) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum MarginalParams {
    Beta { a: f64, b: f64, loc: f64, scale: f64 },
    Gamma { shape: f64, loc: f64, scale: f64 },
    Gaussian { loc: f64, scale: f64 },
    StudentT { df: f64, loc: f64, scale: f64 },
    Laplace { loc: f64, scale: f64 },
    LogLaplace { c: f64, loc: f64, scale: f64 },
    Uniform { loc: f64, scale: f64 },
    Empirical { table: CdfTable },
    GaussianKde { bandwidth: f64, table: CdfTable, density: Vec<f64> },
    Degenerate { value: f64 },
}

impl MarginalParams {
    pub fn family(&self) -> DistributionFamily {
        match self {
            MarginalParams::Beta { .. } => DistributionFamily::Beta,
            MarginalParams::Gamma { .. } => DistributionFamily::Gamma,
            MarginalParams::Gaussian { .. } => DistributionFamily::Gaussian,
            MarginalParams::StudentT { .. } => DistributionFamily::StudentT,
            MarginalParams::Laplace { .. } => DistributionFamily::Laplace,
            MarginalParams::LogLaplace { .. } => DistributionFamily::LogLaplace,
            MarginalParams::Uniform { .. } => DistributionFamily::Uniform,
            MarginalParams::Empirical { .. } => DistributionFamily::Empirical,
            MarginalParams::GaussianKde { .. } => DistributionFamily::GaussianKde,
            MarginalParams::Degenerate { .. } => DistributionFamily::Degenerate,
        }
    }

    /// Cumulative distribution function.
    pub fn cdf(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        match self {
            MarginalParams::Beta { a, b, loc, scale } => {
                let z = (x - loc) / scale;
                if z <= 0.0 {
                    0.0
                } else if z >= 1.0 {
                    1.0
                } else {
                    Beta::new(*a, *b).map(|d| d.cdf(z)).unwrap_or(f64::NAN)
                }
            }
            MarginalParams::Gamma { shape, loc, scale } => {
                let z = (x - loc) / scale;
                if z <= 0.0 {
                    0.0
                } else {
                    Gamma::new(*shape, 1.0).map(|d| d.cdf(z)).unwrap_or(f64::NAN)
                }
            }
            MarginalParams::Gaussian { loc, scale } => norm_cdf((x - loc) / scale),
            MarginalParams::StudentT { df, loc, scale } => StudentsT::new(0.0, 1.0, *df)
                .map(|d| d.cdf((x - loc) / scale))
                .unwrap_or(f64::NAN),
            MarginalParams::Laplace { loc, scale } => {
                let z = (x - loc) / scale;
                if z < 0.0 {
                    0.5 * z.exp()
                } else {
                    1.0 - 0.5 * (-z).exp()
                }
            }
            MarginalParams::LogLaplace { c, loc, scale } => {
                let z = (x - loc) / scale;
                if z <= 0.0 {
                    0.0
                } else if z < 1.0 {
                    0.5 * z.powf(*c)
                } else {
                    1.0 - 0.5 * z.powf(-c)
                }
            }
            MarginalParams::Uniform { loc, scale } => ((x - loc) / scale).clamp(0.0, 1.0),
            MarginalParams::Empirical { table } | MarginalParams::GaussianKde { table, .. } => {
                table.cdf(x)
            }
            MarginalParams::Degenerate { value } => {
                if x < *value {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }

    /// Probability density function. The degenerate family reports its point mass.
    pub fn pdf(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        match self {
            MarginalParams::Beta { a, b, loc, scale } => {
                let z = (x - loc) / scale;
                if z <= 0.0 || z >= 1.0 {
                    0.0
                } else {
                    Beta::new(*a, *b).map(|d| d.pdf(z) / scale).unwrap_or(f64::NAN)
                }
            }
            MarginalParams::Gamma { shape, loc, scale } => {
                let z = (x - loc) / scale;
                if z <= 0.0 {
                    0.0
                } else {
                    Gamma::new(*shape, 1.0).map(|d| d.pdf(z) / scale).unwrap_or(f64::NAN)
                }
            }
            MarginalParams::Gaussian { loc, scale } => STANDARD_NORMAL.pdf((x - loc) / scale) / scale,
            MarginalParams::StudentT { df, loc, scale } => StudentsT::new(0.0, 1.0, *df)
                .map(|d| d.pdf((x - loc) / scale) / scale)
                .unwrap_or(f64::NAN),
            MarginalParams::Laplace { loc, scale } => {
                0.5 * (-((x - loc) / scale).abs()).exp() / scale
            }
            MarginalParams::LogLaplace { c, loc, scale } => {
                let z = (x - loc) / scale;
                if z <= 0.0 {
                    0.0
                } else if z < 1.0 {
                    0.5 * c * z.powf(c - 1.0) / scale
                } else {
                    0.5 * c * z.powf(-c - 1.0) / scale
                }
            }
            MarginalParams::Uniform { loc, scale } => {
                let z = (x - loc) / scale;
                if (0.0..=1.0).contains(&z) { 1.0 / scale } else { 0.0 }
            }
            MarginalParams::Empirical { table } => table.slope(x),
            MarginalParams::GaussianKde { table, density, .. } => table.interpolate_x(x, density),
            MarginalParams::Degenerate { value } => {
                if x == *value {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Percent point function (inverse CDF). `q` is clipped to [0, 1].
    pub fn ppf(&self, q: f64) -> f64 {
        if q.is_nan() {
            return f64::NAN;
        }
        let q = q.clamp(0.0, 1.0);
        let open = q.clamp(QUANTILE_EPSILON, 1.0 - QUANTILE_EPSILON);
        match self {
            MarginalParams::Beta { a, b, loc, scale } => {
                if q <= 0.0 {
                    return *loc;
                }
                if q >= 1.0 {
                    return loc + scale;
                }
                Beta::new(*a, *b)
                    .map(|d| loc + scale * d.inverse_cdf(open))
                    .unwrap_or(f64::NAN)
            }
            MarginalParams::Gamma { shape, loc, scale } => {
                if q <= 0.0 {
                    return *loc;
                }
                Gamma::new(*shape, 1.0)
                    .map(|d| loc + scale * d.inverse_cdf(open))
                    .unwrap_or(f64::NAN)
            }
            MarginalParams::Gaussian { loc, scale } => loc + scale * norm_ppf(open),
            MarginalParams::StudentT { df, loc, scale } => StudentsT::new(0.0, 1.0, *df)
                .map(|d| loc + scale * d.inverse_cdf(open))
                .unwrap_or(f64::NAN),
            MarginalParams::Laplace { loc, scale } => {
                if open < 0.5 {
                    loc + scale * (2.0 * open).ln()
                } else {
                    loc - scale * (2.0 * (1.0 - open)).ln()
                }
            }
            MarginalParams::LogLaplace { c, loc, scale } => {
                if q <= 0.0 {
                    return *loc;
                }
                let z = if open < 0.5 {
                    (2.0 * open).powf(1.0 / c)
                } else {
                    (2.0 * (1.0 - open)).powf(-1.0 / c)
                };
                loc + scale * z
            }
            MarginalParams::Uniform { loc, scale } => loc + scale * q,
            MarginalParams::Empirical { table } | MarginalParams::GaussianKde { table, .. } => {
                table.ppf(q)
            }
            MarginalParams::Degenerate { value } => *value,
        }
    }

    /// Parameters as `(name, value)` pairs, for display.
    pub fn summary(&self) -> Vec<(&'static str, f64)> {
        match self {
            MarginalParams::Beta { a, b, loc, scale } => {
                vec![("a", *a), ("b", *b), ("loc", *loc), ("scale", *scale)]
            }
            MarginalParams::Gamma { shape, loc, scale } => {
                vec![("shape", *shape), ("loc", *loc), ("scale", *scale)]
            }
            MarginalParams::Gaussian { loc, scale }
            | MarginalParams::Laplace { loc, scale }
            | MarginalParams::Uniform { loc, scale } => vec![("loc", *loc), ("scale", *scale)],
            MarginalParams::StudentT { df, loc, scale } => {
                vec![("df", *df), ("loc", *loc), ("scale", *scale)]
            }
            MarginalParams::LogLaplace { c, loc, scale } => {
                vec![("c", *c), ("loc", *loc), ("scale", *scale)]
            }
            MarginalParams::Empirical { table } => vec![("points", table.len() as f64)],
            MarginalParams::GaussianKde { bandwidth, table, .. } => {
                vec![("bandwidth", *bandwidth), ("points", table.len() as f64)]
            }
            MarginalParams::Degenerate { value } => vec![("value", *value)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} vs {}", a, b);
    }

    #[test]
    fn test_ppf_inverts_cdf() {
        let families = vec![
            MarginalParams::Beta { a: 2.0, b: 5.0, loc: 1.0, scale: 3.0 },
            MarginalParams::Gamma { shape: 2.5, loc: -1.0, scale: 2.0 },
            MarginalParams::Gaussian { loc: 10.0, scale: 2.0 },
            MarginalParams::StudentT { df: 4.0, loc: 0.5, scale: 1.5 },
            MarginalParams::Laplace { loc: -2.0, scale: 0.5 },
            MarginalParams::LogLaplace { c: 3.0, loc: 0.0, scale: 2.0 },
            MarginalParams::Uniform { loc: 5.0, scale: 10.0 },
        ];
        for params in families {
            for q in [0.05, 0.3, 0.5, 0.8, 0.95] {
                let x = params.ppf(q);
                assert_close(params.cdf(x), q, 1e-6);
            }
        }
    }

    #[test]
    fn test_closed_forms() {
        let laplace = MarginalParams::Laplace { loc: 0.0, scale: 1.0 };
        assert_close(laplace.cdf(0.0), 0.5, 1e-12);
        assert_close(laplace.pdf(0.0), 0.5, 1e-12);

        let loglaplace = MarginalParams::LogLaplace { c: 2.0, loc: 0.0, scale: 1.0 };
        assert_close(loglaplace.cdf(0.5), 0.125, 1e-12);
        assert_close(loglaplace.cdf(2.0), 1.0 - 0.125, 1e-12);
        assert_eq!(loglaplace.cdf(-1.0), 0.0);

        let uniform = MarginalParams::Uniform { loc: 2.0, scale: 4.0 };
        assert_eq!(uniform.pdf(3.0), 0.25);
        assert_eq!(uniform.pdf(7.0), 0.0);
    }

    #[test]
    fn test_degenerate_is_a_step() {
        let d = MarginalParams::Degenerate { value: 3.0 };
        assert_eq!(d.cdf(2.9), 0.0);
        assert_eq!(d.cdf(3.0), 1.0);
        assert_eq!(d.ppf(0.01), 3.0);
        assert_eq!(d.ppf(0.99), 3.0);
    }

    #[test]
    fn test_standard_normal_helpers() {
        assert_close(norm_cdf(0.0), 0.5, 1e-12);
        assert_close(norm_ppf(0.975), 1.959964, 1e-5);
        assert!(norm_ppf(0.0).is_finite());
        assert!(norm_ppf(1.0).is_finite());
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&MarginalParams::Gaussian { loc: 1.0, scale: 2.0 }).unwrap();
        assert_eq!(json, r#"{"family":"gaussian","loc":1.0,"scale":2.0}"#);
    }
}
