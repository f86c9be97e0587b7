//! Fuzz target for frequency-interval decoding.
//!
//! Encoding arbitrary categories and decoding arbitrary channel values must
//! never panic, and every in-range value must decode to a known category.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tabula::{
    CategoricalEncoding, DataTable, FieldEncoder, FieldMetadata, FieldType, MetadataSet,
    NumericTable, Value, rng,
};

#[derive(Debug, Arbitrary)]
struct Input {
    categories: Vec<Option<String>>,
    probes: Vec<f64>,
}

fuzz_target!(|input: Input| {
    if input.categories.is_empty() || input.categories.len() > 1_000 || input.probes.len() > 1_000 {
        return;
    }

    let values: Vec<Value> = input.categories.iter().map(|c| Value::from(c.as_deref())).collect();
    let Ok(table) = DataTable::from_columns(vec![("field", values)]) else {
        return;
    };
    let metadata = MetadataSet::new().with_field(
        "field",
        FieldMetadata::new(FieldType::String).with_encoding(CategoricalEncoding::FrequencyInterval),
    );
    let mut rng = rng::seeded(0);
    let Ok((_, encodings)) = FieldEncoder::new().encode(&table, &metadata, &mut rng) else {
        return;
    };

    let Ok(mut probe) = NumericTable::from_columns(vec![("field.value", input.probes.clone())]) else {
        return;
    };
    if let Some(encoding) = encodings.get("field") {
        if let Some(null) = encoding.null_channel() {
            let _ = probe.push_column(null, vec![0.0; input.probes.len()]);
        }
    }

    if let Ok(decoded) = encodings.decode(&probe) {
        let known: Vec<Value> = input.categories.iter().map(|c| Value::from(c.as_deref())).collect();
        for (row, &p) in input.probes.iter().enumerate() {
            if (0.0..1.0).contains(&p) {
                if let Some(value) = decoded.get(row, "field") {
                    assert!(value.is_null() || known.contains(value));
                }
            }
        }
    }
});
