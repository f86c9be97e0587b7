//! One-sample Kolmogorov–Smirnov test.

use serde::{Deserialize, Serialize};

/// KS statistic and asymptotic p-value of a fitted marginal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoodnessOfFit {
    pub statistic: f64,
    pub p_value: f64,
}

impl GoodnessOfFit {
    fn rejected() -> Self {
        Self {
            statistic: f64::INFINITY,
            p_value: 0.0,
        }
    }
}

/// Test ascending `sorted` data against `cdf`.
pub(crate) fn ks_test(sorted: &[f64], cdf: impl Fn(f64) -> f64) -> GoodnessOfFit {
    let n = sorted.len();
    if n == 0 {
        return GoodnessOfFit::rejected();
    }
    let nf = n as f64;

    let mut d: f64 = 0.0;
    for (i, &x) in sorted.iter().enumerate() {
        let f = cdf(x);
        if !f.is_finite() {
            return GoodnessOfFit::rejected();
        }
        let above = (i + 1) as f64 / nf - f;
        let below = f - i as f64 / nf;
        d = d.max(above).max(below);
    }

    let root = nf.sqrt();
    let lambda = (root + 0.12 + 0.11 / root) * d;
    GoodnessOfFit {
        statistic: d,
        p_value: kolmogorov_q(lambda),
    }
}

/// Complementary Kolmogorov distribution `Q(λ) = 2 Σ (-1)^(j-1) exp(-2 j² λ²)`.
fn kolmogorov_q(lambda: f64) -> f64 {
    let a2 = -2.0 * lambda * lambda;
    let mut sign = 2.0;
    let mut sum = 0.0;
    let mut previous = 0.0;

    for j in 1..=100 {
        let jf = j as f64;
        let term = sign * (a2 * jf * jf).exp();
        sum += term;
        if term.abs() <= 0.001 * previous || term.abs() <= 1e-8 * sum {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        previous = term.abs();
    }
    // Series did not converge: λ is tiny and the fit is indistinguishable.
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_uniform_sample() {
        let sample: Vec<f64> = (0..100).map(|i| (i as f64 + 0.5) / 100.0).collect();
        let gof = ks_test(&sample, |x| x.clamp(0.0, 1.0));
        assert!((gof.statistic - 0.005).abs() < 1e-12);
        assert!(gof.p_value > 0.99);
    }

    #[test]
    fn test_shifted_sample_rejected() {
        let sample: Vec<f64> = (0..200).map(|i| 0.5 + i as f64 / 400.0).collect();
        let gof = ks_test(&sample, |x| x.clamp(0.0, 1.0));
        assert!(gof.statistic >= 0.5 - 1e-9);
        assert!(gof.p_value < 1e-6);
    }

    #[test]
    fn test_non_finite_cdf_is_rejection() {
        let gof = ks_test(&[1.0, 2.0], |_| f64::NAN);
        assert_eq!(gof.p_value, 0.0);
        assert!(gof.statistic.is_infinite());
    }

    #[test]
    fn test_kolmogorov_reference_values() {
        // Q(1.0) ≈ 0.27, Q(1.36) ≈ 0.05.
        assert!((kolmogorov_q(1.0) - 0.26999967).abs() < 1e-6);
        assert!((kolmogorov_q(1.358) - 0.05).abs() < 1e-3);
    }
}
