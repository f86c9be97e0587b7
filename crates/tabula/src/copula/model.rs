//! A fitted Gaussian copula and its (conditional) sampler.

use std::fmt::Write as _;

use indexmap::IndexMap;
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TabulaError};
use crate::marginal::{FittedMarginal, MarginalParams, norm_cdf, norm_ppf};
use crate::table::NumericTable;

use super::correlation::{CorrelationMatrix, CorrelationMethod, PSD_EPSILON, sampling_factor};

/// Fixed channel values for conditional sampling, in original channel units.
pub type Conditions = IndexMap<String, f64>;

/// Marginals plus correlation over an ordered set of channels.
///
/// Built once by a fit and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopulaModel {
    field_order: Vec<String>,
    marginals: IndexMap<String, FittedMarginal>,
    correlation: CorrelationMatrix,
    method: CorrelationMethod,
    fitted: bool,
}

impl CopulaModel {
    pub(crate) fn new(
        marginals: IndexMap<String, FittedMarginal>,
        correlation: CorrelationMatrix,
        method: CorrelationMethod,
    ) -> Self {
        let field_order: Vec<String> = marginals.keys().cloned().collect();
        let fitted = marginals.values().all(|m| m.is_fitted());
        Self {
            field_order,
            marginals,
            correlation,
            method,
            fitted,
        }
    }

    /// `false` when any channel's marginal could not be fitted.
    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn field_order(&self) -> &[String] {
        &self.field_order
    }

    pub fn marginals(&self) -> &IndexMap<String, FittedMarginal> {
        &self.marginals
    }

    pub fn marginal(&self, channel: &str) -> Option<&FittedMarginal> {
        self.marginals.get(channel)
    }

    pub fn correlation(&self) -> &CorrelationMatrix {
        &self.correlation
    }

    pub fn method(&self) -> CorrelationMethod {
        self.method
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.marginals.contains_key(channel)
    }

    /// Channels whose marginal fit failed.
    pub fn failed_channels(&self) -> Vec<&str> {
        self.marginals
            .iter()
            .filter(|(_, m)| !m.is_fitted())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn ensure_fitted(&self) -> Result<()> {
        if self.fitted {
            Ok(())
        } else {
            Err(TabulaError::NotFitted(format!(
                "marginals failed for {}",
                self.failed_channels().join(", ")
            )))
        }
    }

    fn params(&self, index: usize) -> Result<&MarginalParams> {
        let name = &self.field_order[index];
        self.marginals
            .get(name)
            .and_then(|m| m.params())
            .ok_or_else(|| TabulaError::NotFitted(format!("marginal for '{}'", name)))
    }

    /// Precompute the conditional normal for a fixed set of conditioned channels.
    pub fn plan(&self, conditioned: &[String]) -> Result<ConditionalPlan> {
        self.ensure_fitted()?;
        let mut fixed = Vec::with_capacity(conditioned.len());
        for name in conditioned {
            let index = self
                .correlation
                .index_of(name)
                .ok_or_else(|| TabulaError::UnknownField(name.clone()))?;
            if !fixed.contains(&index) {
                fixed.push(index);
            }
        }
        let free: Vec<usize> = (0..self.field_order.len())
            .filter(|i| !fixed.contains(i))
            .collect();

        let sigma = self.correlation.to_matrix();
        let block = |rows: &[usize], cols: &[usize]| {
            DMatrix::from_fn(rows.len(), cols.len(), |r, c| sigma[(rows[r], cols[c])])
        };
        let s11 = block(&free, &free);

        if fixed.is_empty() {
            return Ok(ConditionalPlan {
                factor: sampling_factor(&s11),
                gain: DMatrix::zeros(free.len(), 0),
                free,
                fixed,
            });
        }

        let s12 = block(&free, &fixed);
        let s22 = block(&fixed, &fixed);
        let s22_inv = match s22.clone().try_inverse() {
            Some(inv) => inv,
            None => s22
                .pseudo_inverse(PSD_EPSILON)
                .map_err(|e| TabulaError::fit_failure("conditional covariance", e))?,
        };
        let gain = &s12 * s22_inv;
        let mut conditional = &s11 - &gain * s12.transpose();
        conditional = (&conditional + conditional.transpose()) * 0.5;

        Ok(ConditionalPlan {
            factor: sampling_factor(&conditional),
            gain,
            free,
            fixed,
        })
    }

    /// Normal scores of fixed values, clipped away from 0 and 1.
    fn condition_scores(&self, plan: &ConditionalPlan, values: &[f64]) -> Result<DVector<f64>> {
        if values.len() != plan.fixed.len() {
            return Err(TabulaError::ShapeMismatch {
                context: "condition values".to_string(),
                expected: plan.fixed.len(),
                found: values.len(),
            });
        }
        let mut scores = DVector::zeros(values.len());
        for (k, (&index, &value)) in plan.fixed.iter().zip(values).enumerate() {
            let u = self.params(index)?.cdf(value).clamp(PSD_EPSILON, 1.0 - PSD_EPSILON);
            scores[k] = norm_ppf(u);
        }
        Ok(scores)
    }

    /// Draw `n` rows with the plan's channels fixed at `values` (original units).
    pub fn sample_with_plan<R: Rng + ?Sized>(
        &self,
        plan: &ConditionalPlan,
        values: &[f64],
        n: usize,
        rng: &mut R,
    ) -> Result<NumericTable> {
        self.ensure_fitted()?;
        let scores = self.condition_scores(plan, values)?;
        let mean = &plan.gain * &scores;

        let mut table = NumericTable::zeros(&self.field_order, n);
        for (&index, &value) in plan.fixed.iter().zip(values) {
            if let Some(column) = table.column_mut(&self.field_order[index]) {
                column.fill(value);
            }
        }

        let free_params = plan
            .free
            .iter()
            .map(|&i| self.params(i))
            .collect::<Result<Vec<_>>>()?;
        let width = plan.free.len();
        let mut noise = DVector::<f64>::zeros(width);
        for row in 0..n {
            for e in noise.iter_mut() {
                *e = rng.sample(StandardNormal);
            }
            let z = &mean + &plan.factor * &noise;
            for (k, (&index, params)) in plan.free.iter().zip(&free_params).enumerate() {
                let u = norm_cdf(z[k]);
                table.set(row, &self.field_order[index], params.ppf(u))?;
            }
        }
        Ok(table)
    }

    /// Draw `n` rows, unconditionally or with `conditions` held fixed.
    ///
    /// Conditioned channels are echoed unchanged in every row; `NaN` condition
    /// values are ignored.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        n: usize,
        conditions: &Conditions,
        rng: &mut R,
    ) -> Result<NumericTable> {
        self.ensure_fitted()?;
        let (names, values): (Vec<String>, Vec<f64>) = conditions
            .iter()
            .filter(|(_, v)| !v.is_nan())
            .map(|(k, &v)| (k.clone(), v))
            .unzip();
        // Condition keys are unique, so plan order matches `names`.
        let plan = self.plan(&names)?;
        self.sample_with_plan(&plan, &values, n, rng)
    }

    /// Human-readable summary of marginals and correlation.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Gaussian copula over {} channels ({:?})", self.field_order.len(), self.method);
        for (name, marginal) in &self.marginals {
            match marginal.params() {
                Some(params) => {
                    let detail: Vec<String> = params
                        .summary()
                        .iter()
                        .map(|(k, v)| format!("{}={:.4}", k, v))
                        .collect();
                    let _ = write!(out, "  {:<24} {:<12} {}", name, params.family().to_string(), detail.join(" "));
                    if let Some(gof) = marginal.goodness() {
                        let _ = write!(out, "  (KS={:.4}, p={:.3})", gof.statistic, gof.p_value);
                    }
                    let _ = writeln!(out);
                }
                None => {
                    let _ = writeln!(out, "  {:<24} unfitted", name);
                }
            }
        }
        let d = self.correlation.dim();
        if d > 0 {
            let _ = writeln!(out, "Correlation:");
            for i in 0..d {
                let row: Vec<String> = (0..d)
                    .map(|j| format!("{:>6.3}", self.correlation.get(i, j)))
                    .collect();
                let _ = writeln!(out, "  {:<24} {}", self.correlation.channels()[i], row.join(" "));
            }
        }
        out
    }
}

/// Conditional normal for one set of conditioned channels.
///
/// Free scores are `gain · z_fixed + factor · ε` with `ε ~ N(0, I)`.
#[derive(Debug, Clone)]
pub struct ConditionalPlan {
    free: Vec<usize>,
    fixed: Vec<usize>,
    gain: DMatrix<f64>,
    factor: DMatrix<f64>,
}

impl ConditionalPlan {
    /// Model indices of the sampled channels.
    pub fn free(&self) -> &[usize] {
        &self.free
    }

    /// Model indices of the conditioned channels, in plan order.
    pub fn fixed(&self) -> &[usize] {
        &self.fixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copula::correlation::pearson_r;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn model(rho: f64) -> CopulaModel {
        let mut marginals = IndexMap::new();
        marginals.insert(
            "a".to_string(),
            FittedMarginal::from_params(MarginalParams::Gaussian { loc: 0.0, scale: 1.0 }),
        );
        marginals.insert(
            "b".to_string(),
            FittedMarginal::from_params(MarginalParams::Gaussian { loc: 10.0, scale: 2.0 }),
        );
        let corr = DMatrix::from_row_slice(2, 2, &[1.0, rho, rho, 1.0]);
        let correlation = CorrelationMatrix::from_matrix(vec!["a".into(), "b".into()], &corr);
        CopulaModel::new(marginals, correlation, CorrelationMethod::Kendall)
    }

    #[test]
    fn test_unconditional_sample_shape_and_dependence() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let sample = model(0.8).sample(2000, &Conditions::new(), &mut rng).unwrap();
        assert_eq!(sample.row_count(), 2000);
        assert_eq!(sample.channel_names(), vec!["a", "b"]);
        let r = pearson_r(sample.column("a").unwrap(), sample.column("b").unwrap());
        assert!((r - 0.8).abs() < 0.05, "r = {}", r);
    }

    #[test]
    fn test_conditions_are_echoed() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut conditions = Conditions::new();
        conditions.insert("a".into(), 1.5);
        let sample = model(0.9).sample(500, &conditions, &mut rng).unwrap();
        assert!(sample.column("a").unwrap().iter().all(|&v| v == 1.5));
        // E[b | a = 1.5] = 10 + 2 * 0.9 * 1.5
        let b = sample.column("b").unwrap();
        let mean = b.iter().sum::<f64>() / b.len() as f64;
        assert!((mean - 12.7).abs() < 0.15, "mean = {}", mean);
    }

    #[test]
    fn test_unknown_condition_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut conditions = Conditions::new();
        conditions.insert("zzz".into(), 0.0);
        let err = model(0.1).sample(1, &conditions, &mut rng).unwrap_err();
        assert!(matches!(err, TabulaError::UnknownField(_)));
    }

    #[test]
    fn test_nan_condition_ignored() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut conditions = Conditions::new();
        conditions.insert("a".into(), f64::NAN);
        let sample = model(0.1).sample(10, &conditions, &mut rng).unwrap();
        assert!(sample.column("a").unwrap().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_unfitted_model_refuses_to_sample() {
        let mut marginals = IndexMap::new();
        marginals.insert("a".to_string(), FittedMarginal::unfitted(0));
        let model = CopulaModel::new(
            marginals,
            CorrelationMatrix::identity(vec!["a".into()]),
            CorrelationMethod::Kendall,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let err = model.sample(1, &Conditions::new(), &mut rng).unwrap_err();
        assert!(matches!(err, TabulaError::NotFitted(_)));
        assert_eq!(model.failed_channels(), vec!["a"]);
    }

    #[test]
    fn test_fully_conditioned_plan() {
        let m = model(0.5);
        let plan = m.plan(&["a".to_string(), "b".to_string()]).unwrap();
        assert!(plan.free().is_empty());
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let table = m.sample_with_plan(&plan, &[0.0, 9.0], 3, &mut rng).unwrap();
        assert_eq!(table.column("b").unwrap(), &[9.0, 9.0, 9.0]);
    }

    #[test]
    fn test_describe_lists_channels() {
        let text = model(0.25).describe();
        assert!(text.contains("gaussian"));
        assert!(text.contains(" 0.250"));
    }
}
