//! One-dimensional marginal distributions: candidate families, maximum-likelihood
//! fitting, Kolmogorov–Smirnov selection and nonparametric fallbacks.

mod family;
mod fitter;
mod interp;
mod kde;
mod ks;
mod mle;
mod optimize;

pub use family::{DistributionFamily, MarginalParams};
pub(crate) use family::{norm_cdf, norm_ppf};
pub use fitter::{
    DEFAULT_SIGNIFICANCE, FittedMarginal, MarginalFitter, MarginalFitterConfig,
    PARAMETRIC_CANDIDATES,
};
pub use interp::CdfTable;
pub use ks::GoodnessOfFit;
