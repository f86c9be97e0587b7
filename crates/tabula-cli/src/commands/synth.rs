//! Synth command - fit and sample in one step.

use std::path::PathBuf;

use colored::Colorize;
use tabula::Conditions;

use crate::cli::FitArgs;

use super::fit::fit_model;
use super::{make_rng, write_synthesis};

pub fn run(
    args: FitArgs,
    rows: usize,
    output: PathBuf,
    conditional_output: Option<PathBuf>,
    save_model: Option<PathBuf>,
    seed: Option<u64>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = make_rng(seed);
    let fitted = fit_model(&args, &mut rng, verbose)?;

    if let Some(path) = &save_model {
        fitted.save(path)?;
        println!(
            "{} {}",
            "Saved model to".green().bold(),
            path.display().to_string().white()
        );
    }

    println!();
    println!(
        "{} {} rows",
        "Sampling".cyan().bold(),
        rows.to_string().white().bold()
    );
    let synthesis = fitted.sample(rows, &Conditions::new(), &mut rng)?;
    write_synthesis(
        &synthesis,
        &output,
        conditional_output.as_deref(),
        fitted.encodings(),
    )
}
