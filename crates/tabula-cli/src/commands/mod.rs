//! CLI command implementations.

pub mod fit;
pub mod inspect;
pub mod sample;
pub mod synth;

use std::path::{Path, PathBuf};

use colored::Colorize;
use tabula::encoding::EncodingParams;
use tabula::{CsvWriter, DataTable, EncodingMap, Synthesis, SynthRng, rng};

/// A seeded generator, or one from entropy.
pub(crate) fn make_rng(seed: Option<u64>) -> SynthRng {
    seed.map(rng::seeded).unwrap_or_else(rng::from_entropy)
}

/// Tab-delimited for `.tsv` paths, comma otherwise, with each datetime
/// field rendered in its fitted format.
pub(crate) fn writer_for(path: &Path, encodings: &EncodingMap) -> CsvWriter {
    let tsv = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("tsv"));
    let mut writer = CsvWriter::new().with_delimiter(if tsv { b'\t' } else { b',' });
    for (field, encoding) in encodings.iter() {
        if let EncodingParams::Datetime { format, .. } = &encoding.params {
            writer = writer.with_datetime_format(field, format.clone());
        }
    }
    writer
}

pub(crate) fn write_table(
    table: &DataTable,
    path: &Path,
    encodings: &EncodingMap,
) -> Result<(), Box<dyn std::error::Error>> {
    writer_for(path, encodings).write_path(table, path)?;
    println!(
        "{} {} rows to {}",
        "Wrote".green().bold(),
        table.row_count().to_string().white().bold(),
        path.display().to_string().white()
    );
    Ok(())
}

/// Write the unconditional table and, when requested and present, the
/// partition-conditioned one.
pub(crate) fn write_synthesis(
    synthesis: &Synthesis,
    output: &Path,
    conditional_output: Option<&Path>,
    encodings: &EncodingMap,
) -> Result<(), Box<dyn std::error::Error>> {
    write_table(&synthesis.table, output, encodings)?;
    match (conditional_output, &synthesis.conditional) {
        (Some(path), Some(table)) => write_table(table, path, encodings)?,
        (Some(_), None) => println!(
            "{}",
            "No conditional specs in this model; skipping conditional output".yellow()
        ),
        (None, Some(_)) => println!(
            "Conditional table drawn; pass {} to keep it",
            "--conditional-output".cyan()
        ),
        (None, None) => {}
    }
    Ok(())
}

/// `<data>.model.json` next to the data file.
pub(crate) fn default_model_path(data: &Path) -> PathBuf {
    let mut p = data.to_path_buf();
    let stem = p.file_stem().unwrap_or_default().to_string_lossy().into_owned();
    p.set_file_name(format!("{}.model.json", stem));
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_path() {
        assert_eq!(
            default_model_path(Path::new("data/patients.csv")),
            PathBuf::from("data/patients.model.json")
        );
    }

    #[test]
    fn test_writer_delimiter_follows_extension() {
        let table = DataTable::from_columns(vec![("a", vec![1i64.into()]), ("b", vec![2i64.into()])]).unwrap();
        let mut out = Vec::new();
        writer_for(Path::new("x.TSV"), &EncodingMap::default())
            .write(&table, &mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a\tb\n1\t2\n");
    }

    #[test]
    fn test_write_table_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let table = DataTable::from_columns(vec![("a", vec![1i64.into(), 2i64.into()])]).unwrap();
        write_table(&table, &path, &EncodingMap::default()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\n1\n2\n");
    }
}
