//! Example: Fit a synthesizer on a CSV file and print a few synthetic rows.
//!
//! Usage:
//!   cargo run --example synthesize -- <data.csv> <fields.json> [rows]
//!
//! Example:
//!   cargo run --example synthesize -- patients.csv fields.json 20

use std::env;
use std::path::Path;

use tabula::{Conditions, CsvWriter, MetadataSet, Parser, Synthesizer, SynthesizerConfig, rng};

fn main() -> tabula::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: cargo run --example synthesize -- <data.csv> <fields.json> [rows]");
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);
    if !path.exists() {
        eprintln!("Error: File not found: {}", path.display());
        std::process::exit(1);
    }
    let rows: usize = args.get(3).and_then(|r| r.parse().ok()).unwrap_or(10);

    let metadata = MetadataSet::load(&args[2])?;
    let (table, source) = Parser::new().parse_file(path, &metadata)?;
    println!(
        "Parsed {} ({} rows, {} columns)",
        source.file, source.row_count, source.column_count
    );

    let mut rng = rng::seeded(42);
    let fitted = Synthesizer::new(SynthesizerConfig::default()).fit(&table, &metadata, &mut rng)?;
    println!();
    println!("{}", fitted.model().describe());

    let synthesis = fitted.sample(rows, &Conditions::new(), &mut rng)?;
    CsvWriter::new().write(&synthesis.table, std::io::stdout())?;

    Ok(())
}
