//! Property tests comparing the stored index with what the records imply.

use docindex_core::{ApplyStats, DocumentUpdate};
use docindex_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

const NS: &str = "model";

/// (parent, field, value, shard value) tuples one document should be
/// findable by.
fn expected(update: &DocumentUpdate) -> BTreeSet<(String, String, String, Option<String>)> {
    let mut out = BTreeSet::new();
    for r in &update.fields {
        if !r.value.is_empty() {
            out.insert((r.parent_path.clone(), r.field_name.clone(), r.value.clone(), None));
        }
        for shard in &r.shard_keys {
            out.insert((
                r.parent_path.clone(),
                r.field_name.clone(),
                r.value.clone(),
                Some(shard.value.clone()),
            ));
        }
    }
    out
}

fn check_ancestors_match_postings(index: &TestIndex, batch: &[DocumentUpdate]) -> Result<(), TestCaseError> {
    let keys = index.posting_keys(NS);
    for update in batch {
        let own: Vec<Vec<u8>> = keys
            .iter()
            .filter(|k| {
                docindex_core::index::codec::decode_posting(k)
                    .map(|p| p.selfid == update.document_id)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        let ancestor = index.ancestor(NS, &update.document_id).unwrap_or_default();
        prop_assert_eq!(ancestor, own);
    }
    Ok(())
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn full_update_stores_exactly_the_desired_postings(batch in document_batch_strategy(4)) {
        let index = TestIndex::new();
        index.apply_documents(NS, batch.clone(), false, false).unwrap();

        let want: usize = batch.iter().map(|u| expected(u).len()).sum();
        prop_assert_eq!(index.postings(NS).len(), want);
        check_ancestors_match_postings(&index, &batch)?;

        let version = index.version();
        let again: ApplyStats = index.apply_documents(NS, batch, false, false).unwrap();
        prop_assert!(again.is_noop());
        prop_assert_eq!(index.version(), version);
    }

    #[test]
    fn second_full_update_replaces_the_first(
        first in document_batch_strategy(3),
        second in document_batch_strategy(3),
    ) {
        let index = TestIndex::new();
        index.apply_documents(NS, first.clone(), false, false).unwrap();
        index.apply_documents(NS, second.clone(), false, false).unwrap();

        let second_ids: BTreeSet<&str> = second.iter().map(|u| u.document_id.as_str()).collect();
        let untouched: Vec<DocumentUpdate> = first
            .into_iter()
            .filter(|u| !second_ids.contains(u.document_id.as_str()))
            .collect();

        let want: usize = second.iter().chain(&untouched).map(|u| expected(u).len()).sum();
        prop_assert_eq!(index.postings(NS).len(), want);
        check_ancestors_match_postings(&index, &second)?;
        check_ancestors_match_postings(&index, &untouched)?;
    }

    #[test]
    fn full_delete_empties_every_document(batch in document_batch_strategy(4)) {
        let index = TestIndex::new();
        index.apply_documents(NS, batch.clone(), false, false).unwrap();

        let deletes = batch
            .iter()
            .map(|u| DocumentUpdate::new(u.document_id.clone()))
            .collect();
        index.apply_documents(NS, deletes, false, true).unwrap();

        prop_assert!(index.postings(NS).is_empty());
        for update in &batch {
            prop_assert!(index.ancestor(NS, &update.document_id).is_none());
        }
    }
}
