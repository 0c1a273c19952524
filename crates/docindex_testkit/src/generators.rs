//! Property-based test generators using proptest.
//!
//! Strategies produce valid input only: non-blank document ids, non-blank
//! field names and non-blank shard values.

use docindex_core::{DocumentUpdate, FieldRecord};
use proptest::prelude::*;

/// Strategy for document ids.
pub fn document_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("doc-[a-z0-9]{1,6}").expect("Invalid regex")
}

/// Strategy for field names from a small vocabulary, so batches collide.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["name", "age", "city", "tag", "status"]).prop_map(String::from)
}

/// Strategy for parent paths.
pub fn parent_path_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["", "profile", "profile/address"]).prop_map(String::from)
}

/// Strategy for field values, including the bytes the codec escapes.
pub fn field_value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => prop::string::string_regex("[a-m]{1,4}").expect("Invalid regex"),
        1 => prop::string::string_regex("[\\x00\\x01a-c]{1,4}").expect("Invalid regex"),
        1 => Just(String::new()),
    ]
}

/// Strategy for the field records of one document.
pub fn field_records_strategy(document_id: String) -> impl Strategy<Value = Vec<FieldRecord>> {
    prop::collection::vec(
        (
            parent_path_strategy(),
            field_name_strategy(),
            field_value_strategy(),
            prop::option::of(prop::sample::select(vec!["eu", "us", "apac"])),
        ),
        0..6,
    )
    .prop_map(move |fields| {
        fields
            .into_iter()
            .map(|(parent, field, value, shard)| {
                let record = FieldRecord::new(document_id.clone(), parent, field, value);
                match shard {
                    Some(region) => record.with_shard("region", region),
                    None => record,
                }
            })
            .collect()
    })
}

/// Strategy for one document update.
pub fn document_update_strategy() -> impl Strategy<Value = DocumentUpdate> {
    document_id_strategy().prop_flat_map(|id| {
        field_records_strategy(id.clone()).prop_map(move |fields| DocumentUpdate {
            document_id: id.clone(),
            fields,
        })
    })
}

/// Strategy for a batch of updates over distinct documents.
pub fn document_batch_strategy(max_docs: usize) -> impl Strategy<Value = Vec<DocumentUpdate>> {
    prop::collection::vec(document_update_strategy(), 1..=max_docs.max(1)).prop_map(|mut batch| {
        let mut seen = std::collections::HashSet::new();
        batch.retain(|u| seen.insert(u.document_id.clone()));
        batch
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
