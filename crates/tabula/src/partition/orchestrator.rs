//! Per-partition copulas and row-wise conditional resampling.

use std::collections::HashMap;

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::copula::{ConditionalPlan, CopulaConfig, CopulaModel, GaussianCopula};
use crate::encoding::{EncodingMap, fill_value, value_channel_name};
use crate::error::{Result, TabulaError};
use crate::metadata::FieldType;
use crate::rng;
use crate::table::{DataTable, NumericTable};

use super::index::enumerate;
use super::selector::{select_raw, select_synthetic};
use super::spec::{ConditionalSettings, ConditionalSpec, CovariateSelection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionState {
    /// No training row matched; skipped when sampling.
    Empty,
    /// The copula could not be fitted; skipped when sampling.
    Failed,
    Fitted,
}

/// One cell of a spec's parent-bucket product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partition {
    key: String,
    buckets: Vec<usize>,
    n_rows: usize,
    /// Channels conditioned on when resampling a row.
    covariates: Vec<String>,
    state: PartitionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<CopulaModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

impl Partition {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> PartitionState {
        self.state
    }

    /// Training rows the partition matched.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn covariates(&self) -> &[String] {
        &self.covariates
    }

    pub fn model(&self) -> Option<&CopulaModel> {
        self.model.as_ref()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    fn empty(key: String, buckets: Vec<usize>) -> Self {
        Self {
            key,
            buckets,
            n_rows: 0,
            covariates: Vec::new(),
            state: PartitionState::Empty,
            model: None,
            failure: None,
        }
    }
}

/// The partitions of one conditional spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionGroup {
    name: String,
    spec: ConditionalSpec,
    children: Vec<String>,
    child_channels: Vec<String>,
    partitions: Vec<Partition>,
}

impl PartitionGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &ConditionalSpec {
        &self.spec
    }

    /// Child fields, resolved against the encoded fields.
    pub fn children(&self) -> &[String] {
        &self.children
    }

    pub fn child_channels(&self) -> &[String] {
        &self.child_channels
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn partition(&self, key: &str) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.key == key)
    }
}

/// Outcome of fitting every partition, as `<spec>/<key>` labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitReport {
    pub fitted: Vec<String>,
    pub empty: Vec<String>,
    pub failed: Vec<String>,
}

impl FitReport {
    pub fn total(&self) -> usize {
        self.fitted.len() + self.empty.len() + self.failed.len()
    }
}

/// Fits one copula per partition of the parent variables and rewrites the
/// child channels of a global sample from them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionOrchestrator {
    config: CopulaConfig,
    groups: Vec<PartitionGroup>,
}

impl PartitionOrchestrator {
    pub fn new(config: CopulaConfig) -> Self {
        Self {
            config,
            groups: Vec::new(),
        }
    }

    pub fn groups(&self) -> &[PartitionGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&PartitionGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Fit every enabled spec.
    ///
    /// `raw` must be the table `encoded` was produced from, row for row:
    /// partitions are selected on raw parent values and fitted on the
    /// matching encoded rows. Partitions whose copula fails are recorded as
    /// failed and the fit goes on.
    pub fn fit(
        &mut self,
        settings: &ConditionalSettings,
        raw: &DataTable,
        encoded: &NumericTable,
        encodings: &EncodingMap,
    ) -> Result<FitReport> {
        if !self.groups.is_empty() {
            return Err(TabulaError::AlreadyFitted);
        }
        if raw.row_count() != encoded.row_count() {
            return Err(TabulaError::ShapeMismatch {
                context: "partition training rows".to_string(),
                expected: raw.row_count(),
                found: encoded.row_count(),
            });
        }

        let mut report = FitReport::default();
        for (name, spec) in settings.iter() {
            if !spec.enabled {
                debug!(spec = name, "conditional spec disabled");
                continue;
            }
            let group = self.fit_group(name, spec, raw, encoded, encodings, &mut report)?;
            self.groups.push(group);
        }

        info!(
            fitted = report.fitted.len(),
            empty = report.empty.len(),
            failed = report.failed.len(),
            "fitted partitions"
        );
        Ok(report)
    }

    fn fit_group(
        &self,
        name: &str,
        spec: &ConditionalSpec,
        raw: &DataTable,
        encoded: &NumericTable,
        encodings: &EncodingMap,
        report: &mut FitReport,
    ) -> Result<PartitionGroup> {
        let parents = spec.parent_fields();
        for parent in &parents {
            encodings.require(parent)?;
        }
        let children = spec.resolve_children(&encodings.field_names())?;
        let child_channels = encodings.channels_of(&children)?;

        let candidates: Vec<String> = match &spec.covariates {
            CovariateSelection::Unconditioned => Vec::new(),
            CovariateSelection::Fields(fields) => encodings.channels_of(fields)?,
            CovariateSelection::CorrelationThreshold(_) => {
                let others: Vec<String> = encodings
                    .field_names()
                    .into_iter()
                    .filter(|f| !children.contains(f) && !parents.contains(f))
                    .collect();
                encodings.channels_of(&others)?
            }
        };
        let mut model_channels = child_channels.clone();
        for channel in candidates {
            if !model_channels.contains(&channel) {
                model_channels.push(channel);
            }
        }
        let candidates = &model_channels[child_channels.len()..];

        let mut partitions = Vec::new();
        for key in enumerate(&spec.parents) {
            let label = format!("{}/{}", name, key.key);
            let rows = select_raw(raw, &spec.parents, &key.buckets)?;
            if rows.is_empty() {
                debug!(partition = %label, "no matching rows");
                report.empty.push(label);
                partitions.push(Partition::empty(key.key, key.buckets));
                continue;
            }

            let mut table = encoded.select_rows(&rows).select_columns(&model_channels)?;
            reimpute_children(&mut table, &children, encodings)?;

            let mut copula = GaussianCopula::new(self.config.clone());
            let outcome = match copula.fit(&table) {
                Ok(model) if model.is_fitted() => Ok(()),
                Ok(model) => Err(format!(
                    "marginals failed for {}",
                    model.failed_channels().join(", ")
                )),
                Err(e) if e.is_recoverable() => Err(e.to_string()),
                Err(e) => return Err(e),
            };

            let mut partition = Partition {
                key: key.key,
                buckets: key.buckets,
                n_rows: rows.len(),
                covariates: Vec::new(),
                state: PartitionState::Fitted,
                model: None,
                failure: None,
            };
            match outcome {
                Ok(()) => {
                    let model = copula.into_model();
                    if let Some(model) = &model {
                        partition.covariates =
                            select_covariates(model, &spec.covariates, &child_channels, candidates);
                    }
                    trace!(partition = %label, rows = rows.len(), covariates = ?partition.covariates, "fitted partition");
                    partition.model = model;
                    report.fitted.push(label);
                }
                Err(reason) => {
                    warn!(partition = %label, %reason, "partition skipped");
                    partition.state = PartitionState::Failed;
                    partition.failure = Some(reason);
                    report.failed.push(label);
                }
            }
            partitions.push(partition);
        }

        Ok(PartitionGroup {
            name: name.to_string(),
            spec: spec.clone(),
            children,
            child_channels,
            partitions,
        })
    }

    /// Rewrite the child channels of `global` row by row.
    ///
    /// Each fitted partition re-selects its rows on the encoded sample, then
    /// draws every selected row from its own copula, conditioned on that
    /// row's covariate values. Specs apply in order, each seeing the rows
    /// the previous ones rewrote.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        global: &NumericTable,
        encodings: &EncodingMap,
        rng: &mut R,
    ) -> Result<NumericTable> {
        let mut out = global.clone();
        for group in &self.groups {
            for partition in &group.partitions {
                // Drawn for skipped partitions too, so later seeds do not shift.
                let seed = rng.next_u64();
                let model = match (&partition.state, &partition.model) {
                    (PartitionState::Fitted, Some(model)) => model,
                    _ => continue,
                };
                let rows = select_synthetic(&out, encodings, &group.spec.parents, &partition.buckets)?;
                if rows.is_empty() {
                    trace!(spec = %group.name, partition = %partition.key, "no sampled rows");
                    continue;
                }

                let drawn = resample_rows(
                    model,
                    &partition.covariates,
                    &group.child_channels,
                    &out,
                    &rows,
                    seed,
                )?;
                for (&row, values) in rows.iter().zip(drawn) {
                    for (channel, value) in group.child_channels.iter().zip(values) {
                        out.set(row, channel, value)?;
                    }
                }
                debug!(spec = %group.name, partition = %partition.key, rows = rows.len(), "resampled rows");
            }
        }
        Ok(out)
    }
}

/// Covariates for one fitted partition.
fn select_covariates(
    model: &CopulaModel,
    selection: &CovariateSelection,
    children: &[String],
    candidates: &[String],
) -> Vec<String> {
    match selection {
        CovariateSelection::Unconditioned => Vec::new(),
        CovariateSelection::Fields(_) => candidates.to_vec(),
        CovariateSelection::CorrelationThreshold(threshold) => {
            let correlation = model.correlation();
            candidates
                .iter()
                .filter(|c| {
                    children.iter().any(|child| {
                        correlation
                            .between(c, child)
                            .is_some_and(|r| r.abs() >= *threshold)
                    })
                })
                .cloned()
                .collect()
        }
    }
}

/// Draw the child channels of `rows`, one row at a time.
///
/// Rows are grouped by which covariates are observed (non-`NaN`); each group
/// shares one conditional plan. Row `r` uses stream `r` of `seed`.
fn resample_rows(
    model: &CopulaModel,
    covariates: &[String],
    children: &[String],
    sample: &NumericTable,
    rows: &[usize],
    seed: u64,
) -> Result<Vec<Vec<f64>>> {
    let columns = covariates
        .iter()
        .map(|c| sample.require(c))
        .collect::<Result<Vec<_>>>()?;

    let mut plans: HashMap<Vec<bool>, ConditionalPlan> = HashMap::new();
    let mut jobs = Vec::with_capacity(rows.len());
    for &row in rows {
        let observed: Vec<bool> = columns.iter().map(|col| !col[row].is_nan()).collect();
        if !plans.contains_key(&observed) {
            let names: Vec<String> = covariates
                .iter()
                .zip(&observed)
                .filter_map(|(name, &seen)| seen.then(|| name.clone()))
                .collect();
            plans.insert(observed.clone(), model.plan(&names)?);
        }
        let values: Vec<f64> = columns
            .iter()
            .map(|col| col[row])
            .filter(|v| !v.is_nan())
            .collect();
        jobs.push((row, observed, values));
    }
    trace!(rows = rows.len(), plans = plans.len(), "conditional plans");

    jobs.par_iter()
        .map(|(row, observed, values)| {
            let plan = &plans[observed];
            let mut rng = rng::stream(seed, *row as u64);
            let drawn = model.sample_with_plan(plan, values, 1, &mut rng)?;
            children
                .iter()
                .map(|c| drawn.require(c).map(|col| col[0]))
                .collect::<Result<Vec<f64>>>()
        })
        .collect()
}

/// Recompute statistic-based fills of numeric children over the partition's
/// own rows.
fn reimpute_children(table: &mut NumericTable, children: &[String], encodings: &EncodingMap) -> Result<()> {
    for field in children {
        let encoding = encodings.require(field)?;
        if encoding.kind.is_categorical() || !encoding.null.imputed || !encoding.null.policy.is_statistic() {
            continue;
        }
        let Some(null_channel) = encoding.null_channel() else {
            continue;
        };
        let value_channel = value_channel_name(field);
        let nulls: Vec<bool> = table.require(&null_channel)?.iter().map(|&v| v > 0.5).collect();
        let observed: Vec<f64> = table
            .require(&value_channel)?
            .iter()
            .zip(&nulls)
            .filter(|(_, null)| !**null)
            .map(|(&v, _)| v)
            .collect();
        let round = matches!(encoding.original_type, FieldType::Integer | FieldType::DateTime);
        let Some(fill) = fill_value(&observed, encoding.null.policy, round) else {
            continue;
        };
        if let Some(column) = table.column_mut(&value_channel) {
            for (value, _) in column.iter_mut().zip(&nulls).filter(|(_, null)| **null) {
                *value = fill;
            }
        }
        trace!(field = %field, fill, "re-imputed within partition");
    }
    Ok(())
}
