//! Fit command - fit a synthesizer and save the model.

use std::path::PathBuf;

use colored::Colorize;
use tabula::{
    ConditionalSettings, FittedSynthesizer, MetadataSet, Parser, SynthRng, Synthesizer,
    SynthesizerConfig,
};

use crate::cli::FitArgs;

use super::{default_model_path, make_rng, write_table};

pub fn run(
    args: FitArgs,
    output: Option<PathBuf>,
    seed: Option<u64>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = make_rng(seed);
    let fitted = fit_model(&args, &mut rng, verbose)?;

    let output_path = output.unwrap_or_else(|| default_model_path(&args.data));
    fitted.save(&output_path)?;

    println!();
    println!(
        "{} {}",
        "Saved to".green().bold(),
        output_path.display().to_string().white()
    );
    println!(
        "Run {} to draw synthetic rows",
        format!("tabula sample {} -n 1000 -o synthetic.csv", output_path.display())
            .cyan()
            .bold()
    );
    Ok(())
}

/// Load the inputs named by `args`, fit, and report.
pub(crate) fn fit_model(
    args: &FitArgs,
    rng: &mut SynthRng,
    verbose: bool,
) -> Result<FittedSynthesizer, Box<dyn std::error::Error>> {
    if !args.data.exists() {
        return Err(format!("File not found: {}", args.data.display()).into());
    }

    let metadata = MetadataSet::load(&args.metadata)?;
    let mut config = match &args.config {
        Some(path) => SynthesizerConfig::load(path)?,
        None => SynthesizerConfig::default(),
    };
    if let Some(path) = &args.conditional {
        config.conditional = ConditionalSettings::load(path)?;
    }

    println!(
        "{} {}",
        "Fitting".cyan().bold(),
        args.data.display().to_string().white()
    );

    let (table, source) = Parser::new().parse_file(&args.data, &metadata)?;
    if source.coerced_cells > 0 {
        println!(
            "{} {} cells did not match their declared type and were read as null",
            "Warning:".yellow().bold(),
            source.coerced_cells
        );
    }

    let fitted = Synthesizer::new(config).fit(&table, &metadata, rng)?.with_source(source);

    if verbose {
        println!();
        println!("{}", "Fields:".yellow().bold());
        for (field, encoding) in fitted.encodings().iter() {
            println!(
                "  {:20} {:10} {} channel(s)",
                field,
                format!("{:?}", encoding.original_type),
                encoding.channels.len()
            );
        }
        println!();
    }

    let model = fitted.model();
    println!(
        "Fitted {} channels from {} rows",
        model.field_order().len().to_string().white().bold(),
        fitted.training_rows().to_string().white().bold()
    );

    let report = fitted.report();
    if report.total() > 0 {
        println!(
            "Partitions: {} fitted, {} empty, {} failed",
            report.fitted.len().to_string().green(),
            report.empty.len().to_string().yellow(),
            report.failed.len().to_string().red()
        );
        for label in &report.failed {
            println!("  {} {}", "failed".red(), label);
        }
    }

    if let Some(path) = &args.control_output {
        match fitted.control() {
            Some(control) => write_table(control, path, fitted.encodings())?,
            None => println!(
                "{}",
                "training_fraction is 1; no control rows to write".yellow()
            ),
        }
    }

    Ok(fitted)
}
