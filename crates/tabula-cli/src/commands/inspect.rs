//! Inspect command - show what a saved model learned.

use std::path::PathBuf;

use colored::Colorize;
use tabula::encoding::{EncodingParams, FieldEncoding, NULL_CATEGORY};
use tabula::partition::PartitionState;
use tabula::FittedSynthesizer;

use crate::cli::InspectFormat;

pub fn run(
    model: PathBuf,
    format: InspectFormat,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !model.exists() {
        return Err(format!("Model file not found: {}", model.display()).into());
    }
    let fitted = FittedSynthesizer::load(&model)?;

    match format {
        InspectFormat::Json => print_json(&fitted)?,
        InspectFormat::Text => print_text(&fitted, verbose),
    }
    Ok(())
}

fn print_json(fitted: &FittedSynthesizer) -> Result<(), Box<dyn std::error::Error>> {
    let model = fitted.model();
    let marginals: serde_json::Map<String, serde_json::Value> = model
        .marginals()
        .iter()
        .map(|(channel, marginal)| {
            let entry = serde_json::json!({
                "family": marginal.family().map(|f| f.to_string()),
                "parameters": marginal.params().map(|p| {
                    p.summary()
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), serde_json::Value::from(v)))
                        .collect::<serde_json::Map<_, _>>()
                }),
                "ks_statistic": marginal.goodness().map(|g| g.statistic),
                "p_value": marginal.goodness().map(|g| g.p_value),
                "observations": marginal.n_obs(),
            });
            (channel.clone(), entry)
        })
        .collect();

    let correlation = model.correlation();
    let matrix: Vec<Vec<f64>> = (0..correlation.dim())
        .map(|i| (0..correlation.dim()).map(|j| correlation.get(i, j)).collect())
        .collect();

    let partitions: Vec<serde_json::Value> = fitted
        .partitions()
        .groups()
        .iter()
        .map(|group| {
            serde_json::json!({
                "name": group.name(),
                "children": group.children(),
                "partitions": group.partitions().iter().map(|p| serde_json::json!({
                    "key": p.key(),
                    "state": p.state(),
                    "rows": p.n_rows(),
                    "covariates": p.covariates(),
                    "failure": p.failure(),
                })).collect::<Vec<_>>(),
            })
        })
        .collect();

    let summary = serde_json::json!({
        "source": fitted.source().map(|s| &s.file),
        "fitted_at": fitted.fitted_at(),
        "training_rows": fitted.training_rows(),
        "fields": fitted.encodings().iter().map(|(name, e)| (name.to_string(), field_json(e))).collect::<serde_json::Map<_, _>>(),
        "marginals": marginals,
        "correlation": {
            "method": model.method(),
            "channels": correlation.channels(),
            "matrix": matrix,
        },
        "partition_groups": partitions,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn field_json(encoding: &FieldEncoding) -> serde_json::Value {
    serde_json::json!({
        "type": encoding.original_type,
        "encoding": encoding.kind,
        "channels": encoding.channel_names(),
        "categories": categories(encoding),
        "has_null": encoding.null.has_null,
    })
}

/// Category names in encoding order, with the null category named.
fn categories(encoding: &FieldEncoding) -> Option<Vec<String>> {
    let name = |c: &Option<String>| c.clone().unwrap_or_else(|| NULL_CATEGORY.to_string());
    match &encoding.params {
        EncodingParams::OneHot { categories } => Some(categories.clone()),
        EncodingParams::Label { categories } => Some(categories.iter().map(name).collect()),
        EncodingParams::Frequency { intervals } => {
            Some(intervals.iter().map(|iv| name(&iv.category)).collect())
        }
        EncodingParams::Identity | EncodingParams::Datetime { .. } => None,
    }
}

fn print_text(fitted: &FittedSynthesizer, verbose: bool) {
    match fitted.source() {
        Some(source) => println!(
            "{} {} ({} rows, {})",
            "Model of".cyan().bold(),
            source.file.white(),
            source.row_count,
            source.hash
        ),
        None => println!("{}", "Model".cyan().bold()),
    }
    println!(
        "Fitted {} on {} training rows",
        fitted.fitted_at().format("%Y-%m-%d %H:%M:%S UTC"),
        fitted.training_rows()
    );
    println!();

    println!("{}", "Fields:".yellow().bold());
    for (field, encoding) in fitted.encodings().iter() {
        let nulls = if encoding.null.has_null { " +nulls" } else { "" };
        println!(
            "  {:20} {:10} {:?}{}",
            field,
            format!("{:?}", encoding.original_type),
            encoding.kind,
            nulls
        );
        if verbose {
            if let Some(categories) = categories(encoding) {
                println!("    categories: {}", categories.join(", "));
            }
        }
    }
    println!();

    println!("{}", fitted.model().describe());

    for group in fitted.partitions().groups() {
        println!(
            "{} {} (children: {})",
            "Partitions of".yellow().bold(),
            group.name(),
            group.children().join(", ")
        );
        for partition in group.partitions() {
            let state = match partition.state() {
                PartitionState::Fitted => "fitted".green(),
                PartitionState::Empty => "empty".yellow(),
                PartitionState::Failed => "failed".red(),
            };
            print!("  {:10} {:8} {:>6} rows", partition.key(), state, partition.n_rows());
            if !partition.covariates().is_empty() {
                print!("  given {}", partition.covariates().join(", "));
            }
            if let Some(reason) = partition.failure() {
                print!("  ({})", reason);
            }
            println!();
        }
    }
}
