//! Fitting entry point for the Gaussian copula.

use indexmap::IndexMap;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, TabulaError};
use crate::marginal::{
    DEFAULT_SIGNIFICANCE, DistributionFamily, FittedMarginal, MarginalFitter,
    MarginalFitterConfig, MarginalParams,
};
use crate::table::NumericTable;

use super::correlation::{CorrelationMatrix, CorrelationMethod};
use super::model::{Conditions, CopulaModel};

/// Caller-supplied marginal for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarginalOverride {
    /// Select among these families only.
    Candidates(Vec<DistributionFamily>),
    /// Use these parameters as-is.
    Fitted(MarginalParams),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopulaConfig {
    pub correlation: CorrelationMethod,
    /// KS p-value below which a parametric candidate is rejected.
    pub significance: f64,
    /// Per-channel marginal overrides. Channels absent from a fitted table are ignored.
    pub marginal_overrides: IndexMap<String, MarginalOverride>,
}

impl Default for CopulaConfig {
    fn default() -> Self {
        Self {
            correlation: CorrelationMethod::default(),
            significance: DEFAULT_SIGNIFICANCE,
            marginal_overrides: IndexMap::new(),
        }
    }
}

impl CopulaConfig {
    pub fn with_correlation(mut self, method: CorrelationMethod) -> Self {
        self.correlation = method;
        self
    }

    pub fn with_override(mut self, channel: impl Into<String>, marginal: MarginalOverride) -> Self {
        self.marginal_overrides.insert(channel.into(), marginal);
        self
    }
}

/// Learns a [`CopulaModel`] from a numeric table and samples from it.
#[derive(Debug, Clone, Default)]
pub struct GaussianCopula {
    config: CopulaConfig,
    model: Option<CopulaModel>,
}

impl GaussianCopula {
    pub fn new(config: CopulaConfig) -> Self {
        Self {
            config,
            model: None,
        }
    }

    /// Wrap a previously fitted model.
    pub fn from_model(config: CopulaConfig, model: CopulaModel) -> Self {
        Self {
            config,
            model: Some(model),
        }
    }

    pub fn config(&self) -> &CopulaConfig {
        &self.config
    }

    pub fn model(&self) -> Option<&CopulaModel> {
        self.model.as_ref()
    }

    pub fn into_model(self) -> Option<CopulaModel> {
        self.model
    }

    /// Fit marginals for every channel and the correlation across them.
    ///
    /// Failed marginals do not make this return an error: the model comes back
    /// with `is_fitted() == false` and the caller decides whether to go on.
    /// Calling `fit` twice is [`TabulaError::AlreadyFitted`].
    pub fn fit(&mut self, table: &NumericTable) -> Result<&CopulaModel> {
        if self.model.is_some() {
            return Err(TabulaError::AlreadyFitted);
        }
        if table.is_empty() || table.column_count() == 0 {
            return Err(TabulaError::EmptyData(
                "cannot fit a copula on an empty table".to_string(),
            ));
        }

        let fitter = MarginalFitter::with_config(MarginalFitterConfig {
            significance: self.config.significance,
            ..MarginalFitterConfig::default()
        });
        let columns: Vec<(&str, &[f64])> = table.columns().collect();
        let fitted: Vec<FittedMarginal> = columns
            .par_iter()
            .map(|&(name, values)| match self.config.marginal_overrides.get(name) {
                Some(MarginalOverride::Fitted(params)) => FittedMarginal::from_params(params.clone()),
                Some(MarginalOverride::Candidates(families)) => {
                    fitter.clone().with_candidates(families.clone()).fit(values)
                }
                None => fitter.fit(values),
            })
            .collect();

        let marginals: IndexMap<String, FittedMarginal> = columns
            .iter()
            .map(|(name, _)| name.to_string())
            .zip(fitted)
            .collect();
        for (name, marginal) in &marginals {
            match marginal.family() {
                Some(family) => debug!(channel = %name, %family, "fitted marginal"),
                None => warn!(channel = %name, "marginal could not be fitted"),
            }
        }

        let correlation = CorrelationMatrix::estimate(table, self.config.correlation)?;
        let model = CopulaModel::new(marginals, correlation, self.config.correlation);
        info!(
            channels = model.field_order().len(),
            rows = table.row_count(),
            fitted = model.is_fitted(),
            "fitted gaussian copula"
        );
        Ok(self.model.insert(model))
    }

    /// Draw `n` rows, optionally conditioned on fixed channel values.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        n: usize,
        conditions: &Conditions,
        rng: &mut R,
    ) -> Result<NumericTable> {
        self.model
            .as_ref()
            .ok_or_else(|| TabulaError::NotFitted("copula has not been fitted".to_string()))?
            .sample(n, conditions, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copula::pearson_r;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{Distribution, Normal};

    fn linear_table(n: usize) -> NumericTable {
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let dist = Normal::new(5.0, 2.0).unwrap();
        let x: Vec<f64> = (0..n).map(|_| dist.sample(&mut rng)).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        NumericTable::from_columns(vec![("x", x), ("y", y)]).unwrap()
    }

    #[test]
    fn test_perfect_linear_dependence_survives() {
        let mut copula = GaussianCopula::default();
        let model = copula.fit(&linear_table(300)).unwrap();
        assert!(model.is_fitted());
        assert!(model.correlation().between("x", "y").unwrap() > 0.999);

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let sample = copula.sample(500, &Conditions::new(), &mut rng).unwrap();
        let r = pearson_r(sample.column("x").unwrap(), sample.column("y").unwrap());
        assert!(r > 0.99, "r = {}", r);
    }

    #[test]
    fn test_sample_before_fit_fails() {
        let copula = GaussianCopula::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = copula.sample(1, &Conditions::new(), &mut rng).unwrap_err();
        assert!(matches!(err, TabulaError::NotFitted(_)));
    }

    #[test]
    fn test_refit_is_rejected() {
        let mut copula = GaussianCopula::default();
        copula.fit(&linear_table(50)).unwrap();
        assert!(matches!(copula.fit(&linear_table(50)), Err(TabulaError::AlreadyFitted)));
    }

    #[test]
    fn test_overrides() {
        let config = CopulaConfig::default()
            .with_override("x", MarginalOverride::Candidates(vec![DistributionFamily::Uniform]))
            .with_override(
                "y",
                MarginalOverride::Fitted(MarginalParams::Gaussian { loc: 0.0, scale: 1.0 }),
            )
            .with_override("absent", MarginalOverride::Candidates(vec![]));
        let mut copula = GaussianCopula::new(config);
        let model = copula.fit(&linear_table(100)).unwrap();
        assert_eq!(model.marginal("x").unwrap().family(), Some(DistributionFamily::Uniform));
        assert_eq!(
            model.marginal("y").unwrap().params(),
            Some(&MarginalParams::Gaussian { loc: 0.0, scale: 1.0 })
        );
    }

    #[test]
    fn test_constant_channel_is_uncorrelated() {
        let table = NumericTable::from_columns(vec![
            ("x", (0..30).map(|i| i as f64).collect()),
            ("k", vec![1.0; 30]),
        ])
        .unwrap();
        let mut copula = GaussianCopula::default();
        let model = copula.fit(&table).unwrap();
        assert_eq!(model.correlation().between("x", "k"), Some(0.0));
        assert_eq!(
            model.marginal("k").unwrap().family(),
            Some(DistributionFamily::Degenerate)
        );
    }

    #[test]
    fn test_override_config_from_json() {
        let config: CopulaConfig = serde_json::from_str(
            r#"{"correlation": "spearman", "marginal_overrides": {"a": ["gaussian", "gaussian_kde"], "b": {"family": "uniform", "loc": 0.0, "scale": 1.0}}}"#,
        )
        .unwrap();
        assert_eq!(config.correlation, CorrelationMethod::Spearman);
        assert_eq!(
            config.marginal_overrides["a"],
            MarginalOverride::Candidates(vec![DistributionFamily::Gaussian, DistributionFamily::GaussianKde])
        );
        assert!(matches!(config.marginal_overrides["b"], MarginalOverride::Fitted(_)));
    }
}
