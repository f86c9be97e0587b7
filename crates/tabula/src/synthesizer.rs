//! The end-to-end pipeline: encode, fit, sample, decode.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::copula::{Conditions, CopulaConfig, CopulaModel, GaussianCopula};
use crate::encoding::{EncoderConfig, EncodingMap, FieldEncoder};
use crate::error::{Result, TabulaError};
use crate::metadata::MetadataSet;
use crate::partition::{ConditionalSettings, FitReport, PartitionOrchestrator};
use crate::rng::{SeedScope, SynthRng};
use crate::table::{DataTable, SourceMetadata};

/// Version tag written into saved models.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Everything that shapes a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesizerConfig {
    pub encoder: EncoderConfig,
    pub copula: CopulaConfig,
    pub conditional: ConditionalSettings,
    /// Share of rows used for training. The remainder is held out as the
    /// control table.
    pub training_fraction: f64,
    /// Reseed the caller's generator for the duration of `fit`.
    pub seed: Option<u64>,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig::default(),
            copula: CopulaConfig::default(),
            conditional: ConditionalSettings::default(),
            training_fraction: 1.0,
            seed: None,
        }
    }
}

impl SynthesizerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.training_fraction > 0.0 && self.training_fraction <= 1.0) {
            return Err(TabulaError::Config(format!(
                "training_fraction must be in (0, 1], got {}",
                self.training_fraction
            )));
        }
        if !(self.copula.significance > 0.0 && self.copula.significance < 1.0) {
            return Err(TabulaError::Config(format!(
                "significance must be in (0, 1), got {}",
                self.copula.significance
            )));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SynthesizerConfig = serde_json::from_str(json)
            .map_err(|e| TabulaError::Config(format!("invalid synthesizer config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TabulaError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: SynthesizerConfig = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            TabulaError::Config(format!(
                "invalid synthesizer config in '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }
}

/// Fits a [`FittedSynthesizer`] from a table.
///
/// # Example
///
/// ```no_run
/// # use tabula::{DataTable, MetadataSet, Synthesizer, SynthesizerConfig, Conditions, rng};
/// # fn example(table: &DataTable, metadata: &MetadataSet) -> tabula::Result<()> {
/// let mut rng = rng::seeded(42);
/// let fitted = Synthesizer::new(SynthesizerConfig::default()).fit(table, metadata, &mut rng)?;
/// let synthesis = fitted.sample(1000, &Conditions::new(), &mut rng)?;
/// println!("{} synthetic rows", synthesis.table.row_count());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    config: SynthesizerConfig,
}

impl Synthesizer {
    pub fn new(config: SynthesizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    /// Encode `table`, hold out the control rows, then fit the global copula
    /// and every enabled partition.
    ///
    /// With `seed` set, `rng` is reseeded for the fit and restored afterwards.
    pub fn fit(
        &self,
        table: &DataTable,
        metadata: &MetadataSet,
        rng: &mut SynthRng,
    ) -> Result<FittedSynthesizer> {
        self.config.validate()?;
        match self.config.seed {
            Some(seed) => {
                let mut scoped = SeedScope::new(rng, seed);
                self.fit_with(table, metadata, &mut scoped)
            }
            None => self.fit_with(table, metadata, rng),
        }
    }

    fn fit_with(
        &self,
        table: &DataTable,
        metadata: &MetadataSet,
        rng: &mut SynthRng,
    ) -> Result<FittedSynthesizer> {
        let encoder = FieldEncoder::with_config(self.config.encoder.clone());
        let prepared = encoder.prepare(table)?;
        if prepared.is_empty() {
            return Err(TabulaError::EmptyData("no rows to fit".to_string()));
        }

        let (training, control) = split_control(&prepared, self.config.training_fraction, rng);
        if let Some(control) = &control {
            debug!(training = training.row_count(), control = control.row_count(), "held out control rows");
        }

        let (encoded, encodings) = encoder.encode(&training, metadata, rng)?;

        let mut copula = GaussianCopula::new(self.config.copula.clone());
        let model = copula.fit(&encoded)?.clone();
        if !model.is_fitted() {
            return Err(TabulaError::fit_failure(
                "global copula",
                format!("marginals failed for {}", model.failed_channels().join(", ")),
            ));
        }

        let mut partitions = PartitionOrchestrator::new(self.config.copula.clone());
        let report = partitions.fit(&self.config.conditional, &training, &encoded, &encodings)?;

        info!(
            rows = training.row_count(),
            fields = encodings.len(),
            channels = encoded.column_count(),
            partitions = report.fitted.len(),
            "fitted synthesizer"
        );

        Ok(FittedSynthesizer {
            format_version: MODEL_FORMAT_VERSION,
            encodings,
            model,
            partitions,
            report,
            training_rows: training.row_count(),
            source: None,
            fitted_at: Utc::now(),
            control,
        })
    }
}

/// Random training/control split. `fraction >= 1` keeps every row.
fn split_control<R: Rng + ?Sized>(
    table: &DataTable,
    fraction: f64,
    rng: &mut R,
) -> (DataTable, Option<DataTable>) {
    let n = table.row_count();
    if fraction >= 1.0 || n < 2 {
        return (table.clone(), None);
    }
    let keep = ((n as f64 * fraction).round() as usize).clamp(1, n - 1);
    let mut rows: Vec<usize> = (0..n).collect();
    rows.shuffle(rng);
    let (train, held) = rows.split_at_mut(keep);
    train.sort_unstable();
    held.sort_unstable();
    (table.select_rows(train), Some(table.select_rows(held)))
}

/// Output of one sampling call.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    /// Decoded draws from the global copula.
    pub table: DataTable,
    /// The same draws with children rewritten per partition, when
    /// conditional specs were fitted.
    pub conditional: Option<DataTable>,
}

/// A fitted pipeline, ready to sample and persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedSynthesizer {
    format_version: u32,
    encodings: EncodingMap,
    model: CopulaModel,
    partitions: PartitionOrchestrator,
    report: FitReport,
    training_rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<SourceMetadata>,
    fitted_at: DateTime<Utc>,
    #[serde(skip)]
    control: Option<DataTable>,
}

impl FittedSynthesizer {
    pub fn encodings(&self) -> &EncodingMap {
        &self.encodings
    }

    pub fn model(&self) -> &CopulaModel {
        &self.model
    }

    pub fn partitions(&self) -> &PartitionOrchestrator {
        &self.partitions
    }

    pub fn report(&self) -> &FitReport {
        &self.report
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    pub fn fitted_at(&self) -> DateTime<Utc> {
        self.fitted_at
    }

    pub fn source(&self) -> Option<&SourceMetadata> {
        self.source.as_ref()
    }

    /// Attach provenance of the training file.
    pub fn with_source(mut self, source: SourceMetadata) -> Self {
        self.source = Some(source);
        self
    }

    /// Rows held out of training. Not persisted.
    pub fn control(&self) -> Option<&DataTable> {
        self.control.as_ref()
    }

    /// Draw `n` rows.
    ///
    /// `conditions` are keyed by channel name (see [`EncodingMap::channel_names`])
    /// and apply to the global draw; partition resampling then rewrites the
    /// child channels of each row.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        n: usize,
        conditions: &Conditions,
        rng: &mut R,
    ) -> Result<Synthesis> {
        let global = self.model.sample(n, conditions, rng)?;
        let table = self.encodings.decode(&global)?;
        let conditional = if self.partitions.is_empty() {
            None
        } else {
            let rewritten = self.partitions.sample(&global, &self.encodings, rng)?;
            Some(self.encodings.decode(&rewritten)?)
        };
        debug!(rows = n, conditional = conditional.is_some(), "sampled synthesizer");
        Ok(Synthesis { table, conditional })
    }

    /// Save the fitted pipeline as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    TabulaError::Persistence(format!(
                        "Failed to create directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let file = File::create(path).map_err(|e| {
            TabulaError::Persistence(format!("Failed to create file '{}': {}", path.display(), e))
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(|e| {
            TabulaError::Persistence(format!("Failed to serialize model: {}", e))
        })?;

        debug!(path = %path.display(), "saved model");
        Ok(())
    }

    /// Load a pipeline written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path).map_err(|e| {
            TabulaError::Persistence(format!("Failed to open file '{}': {}", path.display(), e))
        })?;
        let fitted: FittedSynthesizer = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            TabulaError::Persistence(format!("Failed to parse model '{}': {}", path.display(), e))
        })?;

        if fitted.format_version != MODEL_FORMAT_VERSION {
            return Err(TabulaError::Persistence(format!(
                "model '{}' has format version {}, expected {}",
                path.display(),
                fitted.format_version,
                MODEL_FORMAT_VERSION
            )));
        }
        Ok(fitted)
    }
}
