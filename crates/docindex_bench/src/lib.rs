//! Benchmark utilities.

use docindex_core::FieldRecord;
use rand::Rng;

/// Generate a random lowercase value of the given length.
pub fn random_value(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

/// Generate `fields` records for one document, every fourth one sharded.
pub fn document_records(document_id: &str, fields: usize, value_len: usize) -> Vec<FieldRecord> {
    (0..fields)
        .map(|i| {
            let record = FieldRecord::new(
                document_id,
                "profile",
                format!("field_{i}"),
                random_value(value_len),
            );
            if i % 4 == 0 {
                record.with_shard("region", "eu")
            } else {
                record
            }
        })
        .collect()
}

/// Generate records for `count` documents named `doc-{n}`.
pub fn batch_records(count: usize, fields: usize, value_len: usize) -> Vec<FieldRecord> {
    (0..count)
        .flat_map(|n| document_records(&format!("doc-{n:06}"), fields, value_len))
        .collect()
}
