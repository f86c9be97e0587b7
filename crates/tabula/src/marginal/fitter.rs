//! Marginal selection by maximum likelihood and Kolmogorov–Smirnov testing.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{Result, TabulaError};

use super::family::{DistributionFamily, MarginalParams};
use super::interp::CdfTable;
use super::kde::{DEFAULT_MAX_GRID_POINTS, fit_kde};
use super::ks::{GoodnessOfFit, ks_test};
use super::mle::{Summary, fit_parametric};

/// Families tried, in order, when no override is given.
pub const PARAMETRIC_CANDIDATES: [DistributionFamily; 7] = [
    DistributionFamily::Beta,
    DistributionFamily::Gamma,
    DistributionFamily::Gaussian,
    DistributionFamily::StudentT,
    DistributionFamily::Laplace,
    DistributionFamily::LogLaplace,
    DistributionFamily::Uniform,
];

/// A candidate must have a KS p-value above this to be accepted.
pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginalFitterConfig {
    pub significance: f64,
    /// Restrict selection to these families; the best KS statistic wins with
    /// no significance gate.
    pub candidates: Option<Vec<DistributionFamily>>,
    pub kde_max_points: usize,
}

impl Default for MarginalFitterConfig {
    fn default() -> Self {
        Self {
            significance: DEFAULT_SIGNIFICANCE,
            candidates: None,
            kde_max_points: DEFAULT_MAX_GRID_POINTS,
        }
    }
}

/// Chooses and fits a 1-D distribution for a column.
#[derive(Debug, Clone, Default)]
pub struct MarginalFitter {
    config: MarginalFitterConfig,
}

impl MarginalFitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MarginalFitterConfig) -> Self {
        Self { config }
    }

    /// Restrict selection to `candidates`.
    pub fn with_candidates(mut self, candidates: Vec<DistributionFamily>) -> Self {
        self.config.candidates = Some(candidates);
        self
    }

    pub fn config(&self) -> &MarginalFitterConfig {
        &self.config
    }

    /// Fit a marginal to `values`. Non-finite values are ignored.
    ///
    /// Never fails: a column that cannot be fitted yields an unfitted marginal.
    pub fn fit(&self, values: &[f64]) -> FittedMarginal {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);
        let n_obs = sorted.len();

        if n_obs == 0 {
            warn!("no finite observations; marginal left unfitted");
            return FittedMarginal::unfitted(0);
        }
        if sorted[0] == sorted[n_obs - 1] {
            trace!(value = sorted[0], "constant column, using degenerate marginal");
            return FittedMarginal {
                params: Some(MarginalParams::Degenerate { value: sorted[0] }),
                goodness: None,
                n_obs,
            };
        }

        let summary = Summary::of_sorted(&sorted);
        match &self.config.candidates {
            Some(candidates) => self.fit_restricted(&sorted, &summary, candidates),
            None => self.fit_open(&sorted, &summary),
        }
    }

    fn fit_open(&self, sorted: &[f64], summary: &Summary) -> FittedMarginal {
        let mut best: Option<(MarginalParams, GoodnessOfFit)> = None;
        for family in PARAMETRIC_CANDIDATES {
            let Some((params, gof)) = self.try_family(family, sorted, summary) else {
                continue;
            };
            let better = best.as_ref().is_none_or(|(_, b)| gof.statistic < b.statistic);
            if gof.p_value > self.config.significance && better {
                best = Some((params, gof));
            }
        }

        if let Some((params, gof)) = best {
            debug!(family = %params.family(), ks = gof.statistic, p = gof.p_value, "selected marginal");
            return FittedMarginal::with_goodness(params, gof, sorted.len());
        }

        debug!("no parametric family accepted, falling back to kernel density");
        match self.try_family(DistributionFamily::GaussianKde, sorted, summary) {
            Some((params, gof)) => FittedMarginal::with_goodness(params, gof, sorted.len()),
            None => {
                warn!("kernel density fit failed; marginal left unfitted");
                FittedMarginal::unfitted(sorted.len())
            }
        }
    }

    fn fit_restricted(
        &self,
        sorted: &[f64],
        summary: &Summary,
        candidates: &[DistributionFamily],
    ) -> FittedMarginal {
        let mut best: Option<(MarginalParams, GoodnessOfFit)> = None;
        for &family in candidates {
            let Some((params, gof)) = self.try_family(family, sorted, summary) else {
                continue;
            };
            if best.as_ref().is_none_or(|(_, b)| gof.statistic < b.statistic) {
                best = Some((params, gof));
            }
        }

        match best {
            Some((params, gof)) => FittedMarginal::with_goodness(params, gof, sorted.len()),
            None => {
                warn!(?candidates, "no candidate family could be fitted");
                FittedMarginal::unfitted(sorted.len())
            }
        }
    }

    fn try_family(
        &self,
        family: DistributionFamily,
        sorted: &[f64],
        summary: &Summary,
    ) -> Option<(MarginalParams, GoodnessOfFit)> {
        let params = match family {
            DistributionFamily::GaussianKde => fit_kde(sorted, self.config.kde_max_points),
            DistributionFamily::Empirical => empirical(sorted),
            DistributionFamily::Degenerate => None,
            parametric => fit_parametric(parametric, sorted, summary),
        };
        let Some(params) = params else {
            trace!(%family, "fit failed");
            return None;
        };
        let gof = ks_test(sorted, |x| params.cdf(x));
        trace!(%family, ks = gof.statistic, p = gof.p_value, "candidate");
        Some((params, gof))
    }
}

/// Step CDF through the order statistics, anchored at `(min, 0)`.
fn empirical(sorted: &[f64]) -> Option<MarginalParams> {
    let n = sorted.len() as f64;
    let x = std::iter::once(sorted[0]).chain(sorted.iter().copied()).collect();
    let u = (0..=sorted.len()).map(|i| i as f64 / n).collect();
    CdfTable::new(x, u).map(|table| MarginalParams::Empirical { table })
}

/// The outcome of fitting one channel.
///
/// An unfitted marginal carries no parameters; transforming through it fails
/// with [`TabulaError::NotFitted`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedMarginal {
    params: Option<MarginalParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    goodness: Option<GoodnessOfFit>,
    #[serde(default)]
    n_obs: usize,
}

impl FittedMarginal {
    pub fn unfitted(n_obs: usize) -> Self {
        Self {
            params: None,
            goodness: None,
            n_obs,
        }
    }

    /// Wrap pre-fitted parameters, bypassing selection.
    pub fn from_params(params: MarginalParams) -> Self {
        Self {
            params: Some(params),
            goodness: None,
            n_obs: 0,
        }
    }

    fn with_goodness(params: MarginalParams, goodness: GoodnessOfFit, n_obs: usize) -> Self {
        Self {
            params: Some(params),
            goodness: Some(goodness),
            n_obs,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    pub fn family(&self) -> Option<DistributionFamily> {
        self.params.as_ref().map(|p| p.family())
    }

    pub fn params(&self) -> Option<&MarginalParams> {
        self.params.as_ref()
    }

    pub fn goodness(&self) -> Option<&GoodnessOfFit> {
        self.goodness.as_ref()
    }

    /// Finite observations the marginal was fitted on.
    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    fn require(&self) -> Result<&MarginalParams> {
        self.params
            .as_ref()
            .ok_or_else(|| TabulaError::NotFitted("marginal has no fitted distribution".into()))
    }

    pub fn cdf(&self, values: &[f64]) -> Result<Vec<f64>> {
        let params = self.require()?;
        Ok(values.iter().map(|&x| params.cdf(x)).collect())
    }

    pub fn pdf(&self, values: &[f64]) -> Result<Vec<f64>> {
        let params = self.require()?;
        Ok(values.iter().map(|&x| params.pdf(x)).collect())
    }

    pub fn ppf(&self, quantiles: &[f64]) -> Result<Vec<f64>> {
        let params = self.require()?;
        Ok(quantiles.iter().map(|&q| params.ppf(q)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{Distribution, Normal};

    fn normal_sample(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let dist = Normal::new(50.0, 10.0).unwrap();
        (0..n).map(|_| dist.sample(&mut rng)).collect()
    }

    #[test]
    fn test_normal_data_gets_accepted_family() {
        let fitted = MarginalFitter::new().fit(&normal_sample(500, 3));
        assert!(fitted.is_fitted());
        let gof = fitted.goodness().unwrap();
        assert!(gof.p_value > DEFAULT_SIGNIFICANCE);
        assert!(fitted.family().unwrap().is_parametric());
    }

    #[test]
    fn test_bimodal_falls_back_to_kde() {
        let mut values = normal_sample(400, 1);
        values.extend(normal_sample(400, 2).iter().map(|v| v + 200.0));
        let fitted = MarginalFitter::new().fit(&values);
        assert_eq!(fitted.family(), Some(DistributionFamily::GaussianKde));
    }

    #[test]
    fn test_constant_column_is_degenerate() {
        let fitted = MarginalFitter::new().fit(&[4.0, 4.0, f64::NAN, 4.0]);
        assert_eq!(fitted.family(), Some(DistributionFamily::Degenerate));
        assert_eq!(fitted.n_obs(), 3);
        assert_eq!(fitted.ppf(&[0.1, 0.9]).unwrap(), vec![4.0, 4.0]);
    }

    #[test]
    fn test_empty_column_is_unfitted() {
        let fitted = MarginalFitter::new().fit(&[f64::NAN]);
        assert!(!fitted.is_fitted());
        assert!(matches!(fitted.cdf(&[1.0]), Err(TabulaError::NotFitted(_))));
    }

    #[test]
    fn test_restricted_candidates_skip_significance() {
        let values: Vec<f64> = (0..100).map(|i| (i as f64).powi(3)).collect();
        let fitted = MarginalFitter::new()
            .with_candidates(vec![DistributionFamily::Gaussian])
            .fit(&values);
        assert_eq!(fitted.family(), Some(DistributionFamily::Gaussian));
    }

    #[test]
    fn test_empirical_stays_in_range() {
        let values = vec![3.0, 1.0, 2.0, 2.0, 5.0];
        let fitted = MarginalFitter::new()
            .with_candidates(vec![DistributionFamily::Empirical])
            .fit(&values);
        assert_eq!(fitted.family(), Some(DistributionFamily::Empirical));
        let quantiles = fitted.ppf(&[0.0, 0.5, 1.0]).unwrap();
        assert_eq!(quantiles[0], 1.0);
        assert_eq!(quantiles[2], 5.0);
        assert!((1.0..=5.0).contains(&quantiles[1]));
        assert_eq!(fitted.cdf(&[2.0]).unwrap(), vec![0.6]);
    }

    #[test]
    fn test_pre_fitted_marginal() {
        let fitted = FittedMarginal::from_params(MarginalParams::Uniform { loc: 0.0, scale: 2.0 });
        assert_eq!(fitted.cdf(&[1.0]).unwrap(), vec![0.5]);
        assert_eq!(fitted.pdf(&[1.0]).unwrap(), vec![0.5]);
        assert!(fitted.goodness().is_none());
    }
}
