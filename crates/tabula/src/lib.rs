//! Tabula: Gaussian-copula synthesis of realistic tabular data.
//!
//! A table is encoded into numeric channels, each channel gets a fitted
//! marginal distribution, and a Gaussian copula over the channels captures
//! how they move together. Samples are drawn in copula space and decoded back
//! into typed values. Optional conditional specs fit one copula per
//! partition of parent variables and redraw the child fields of each sampled
//! row from its partition.
//!
//! # Core Principles
//!
//! - **Reversible encoding**: every encoding records what it needs to decode
//! - **Explicit randomness**: every fit and sample call takes its generator
//! - **Persistable models**: a fitted pipeline is a single JSON document
//!
//! # Example
//!
//! ```no_run
//! use tabula::{Conditions, MetadataSet, Parser, Synthesizer, SynthesizerConfig, rng};
//!
//! let metadata = MetadataSet::load("fields.json").unwrap();
//! let (table, source) = Parser::new().parse_file("patients.csv", &metadata).unwrap();
//!
//! let mut rng = rng::seeded(7);
//! let fitted = Synthesizer::new(SynthesizerConfig::default())
//!     .fit(&table, &metadata, &mut rng)
//!     .unwrap()
//!     .with_source(source);
//!
//! let synthesis = fitted.sample(500, &Conditions::new(), &mut rng).unwrap();
//! println!("Rows: {}", synthesis.table.row_count());
//! ```

pub mod copula;
pub mod encoding;
pub mod error;
pub mod marginal;
pub mod metadata;
pub mod partition;
pub mod rng;
pub mod table;

mod synthesizer;

pub use crate::synthesizer::{
    FittedSynthesizer, MODEL_FORMAT_VERSION, Synthesis, Synthesizer, SynthesizerConfig,
};
pub use copula::{Conditions, CopulaConfig, CopulaModel, CorrelationMatrix, CorrelationMethod, GaussianCopula};
pub use encoding::{EncoderConfig, EncodingMap, FieldEncoder, FieldEncoding};
pub use error::{ErrorCategory, Result, TabulaError};
pub use marginal::{DistributionFamily, FittedMarginal, MarginalFitter};
pub use metadata::{CategoricalEncoding, FieldMetadata, FieldType, MetadataSet, NullPolicy};
pub use partition::{ConditionalSettings, ConditionalSpec, FitReport, PartitionOrchestrator};
pub use rng::SynthRng;
pub use table::{CsvWriter, DataTable, NumericTable, Parser, SourceMetadata, Value};
