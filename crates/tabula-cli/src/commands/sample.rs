//! Sample command - draw synthetic rows from a saved model.

use std::path::PathBuf;

use colored::Colorize;
use tabula::{Conditions, FittedSynthesizer};

use super::{make_rng, write_synthesis};

pub fn run(
    model: PathBuf,
    rows: usize,
    output: PathBuf,
    conditional_output: Option<PathBuf>,
    conditions: Vec<(String, f64)>,
    seed: Option<u64>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !model.exists() {
        return Err(format!(
            "Model file not found: {}\nRun 'tabula fit' first.",
            model.display()
        )
        .into());
    }

    let fitted = FittedSynthesizer::load(&model)?;
    let conditions: Conditions = conditions.into_iter().collect();

    println!(
        "{} {} rows from {}",
        "Sampling".cyan().bold(),
        rows.to_string().white().bold(),
        model.display().to_string().white()
    );
    if verbose && !conditions.is_empty() {
        for (channel, value) in &conditions {
            println!("  {} {} = {}", "fixed".yellow(), channel, value);
        }
    }

    let mut rng = make_rng(seed);
    let synthesis = fitted.sample(rows, &conditions, &mut rng)?;
    write_synthesis(
        &synthesis,
        &output,
        conditional_output.as_deref(),
        fitted.encodings(),
    )
}
