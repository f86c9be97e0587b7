//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tabula: Gaussian-copula synthetic tabular data
#[derive(Parser)]
#[command(name = "tabula")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Inputs shared by `fit` and `synth`.
#[derive(clap::Args, Debug, Clone)]
pub struct FitArgs {
    /// Path to the training data (CSV/TSV)
    #[arg(value_name = "DATA")]
    pub data: PathBuf,

    /// Field metadata (JSON)
    #[arg(short, long)]
    pub metadata: PathBuf,

    /// Conditional specs (JSON)
    #[arg(long)]
    pub conditional: Option<PathBuf>,

    /// Synthesizer configuration (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the held-out control rows here
    #[arg(long)]
    pub control_output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit a synthesizer and save the model
    Fit {
        #[command(flatten)]
        args: FitArgs,

        /// Output path for the model (default: <data>.model.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Seed for a reproducible fit
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Draw synthetic rows from a saved model
    Sample {
        /// Path to the model file
        #[arg(value_name = "MODEL")]
        model: PathBuf,

        /// Number of rows to draw
        #[arg(short = 'n', long)]
        rows: usize,

        /// Output path for the synthetic table (.csv or .tsv)
        #[arg(short, long)]
        output: PathBuf,

        /// Output path for the partition-conditioned table
        #[arg(long)]
        conditional_output: Option<PathBuf>,

        /// Hold a channel fixed, e.g. `age.value=42` (repeatable)
        #[arg(long = "condition", value_name = "CHANNEL=VALUE", value_parser = parse_condition)]
        conditions: Vec<(String, f64)>,

        /// Seed for reproducible sampling
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Fit and sample in one step
    Synth {
        #[command(flatten)]
        args: FitArgs,

        /// Number of rows to draw
        #[arg(short = 'n', long)]
        rows: usize,

        /// Output path for the synthetic table (.csv or .tsv)
        #[arg(short, long)]
        output: PathBuf,

        /// Output path for the partition-conditioned table
        #[arg(long)]
        conditional_output: Option<PathBuf>,

        /// Also save the fitted model here
        #[arg(long)]
        save_model: Option<PathBuf>,

        /// Seed for reproducible fit and sampling
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show the marginals, correlation and partitions of a model
    Inspect {
        /// Path to the model file
        #[arg(value_name = "MODEL")]
        model: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: InspectFormat,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum InspectFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for InspectFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(InspectFormat::Text),
            "json" => Ok(InspectFormat::Json),
            _ => Err(format!("Unknown format: {}. Use text or json.", s)),
        }
    }
}

impl std::fmt::Display for InspectFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InspectFormat::Text => write!(f, "text"),
            InspectFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse `CHANNEL=VALUE`.
pub fn parse_condition(s: &str) -> Result<(String, f64), String> {
    let (channel, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected CHANNEL=VALUE, got '{}'", s))?;
    let channel = channel.trim();
    if channel.is_empty() {
        return Err(format!("missing channel name in '{}'", s));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", value.trim()))?;
    Ok((channel.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_condition() {
        assert_eq!(parse_condition("age.value=42").unwrap(), ("age.value".to_string(), 42.0));
        assert_eq!(parse_condition(" x = -1.5 ").unwrap(), ("x".to_string(), -1.5));
        assert!(parse_condition("age.value").is_err());
        assert!(parse_condition("=3").is_err());
        assert!(parse_condition("x=abc").is_err());
    }

    #[test]
    fn test_sample_arguments() {
        let cli = Cli::try_parse_from([
            "tabula", "sample", "model.json", "-n", "10", "-o", "out.csv",
            "--condition", "a.value=1", "--condition", "b.value=2", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Sample { rows, conditions, .. } => {
                assert_eq!(rows, 10);
                assert_eq!(conditions.len(), 2);
            }
            _ => panic!("expected sample"),
        }
    }
}
