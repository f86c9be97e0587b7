//! Gaussian copula: rank correlation, marginal fitting and conditional sampling.

mod correlation;
mod engine;
mod model;

pub use correlation::{CorrelationMatrix, CorrelationMethod, kendall_tau, pearson_r, spearman_rho};
pub use engine::{CopulaConfig, GaussianCopula, MarginalOverride};
pub use model::{ConditionalPlan, Conditions, CopulaModel};
