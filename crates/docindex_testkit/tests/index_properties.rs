//! End-to-end behaviour of index maintenance and queries.

use docindex_core::{Condition, CoreError, DocumentUpdate, FieldRecord, Operator, Query};
use docindex_testkit::prelude::*;

const NS: &str = "acme";

fn record(doc: &str, field: &str, value: &str) -> FieldRecord {
    FieldRecord::new(doc, "", field, value)
}

fn ids(index: &TestIndex, field: &str, op: Operator, value: &str) -> Vec<String> {
    index
        .query_keys(NS, &Query::new("", Condition::new(field, op, value)))
        .unwrap()
        .ids
}

#[test]
fn reindexing_identical_records_changes_nothing() {
    let index = TestIndex::new();
    let first = index
        .apply_index(NS, vec![record("d1", "name", "alice")], false, false)
        .unwrap();
    assert_eq!(first.postings_added, 1);
    assert_eq!(first.ancestors_written, 1);

    let keys = index.posting_keys(NS);
    let ancestor = index.ancestor(NS, "d1");
    let version = index.version();

    let second = index
        .apply_index(NS, vec![record("d1", "name", "alice")], false, false)
        .unwrap();
    assert!(second.is_noop());
    assert_eq!(index.version(), version);
    assert_eq!(index.posting_keys(NS), keys);
    assert_eq!(index.ancestor(NS, "d1"), ancestor);
    assert_eq!(keys.len(), 1);
}

#[test]
fn partial_update_leaves_other_fields() {
    let index = TestIndex::new();
    index
        .apply_index(
            NS,
            vec![record("d1", "a", "old"), record("d1", "b", "kept")],
            false,
            false,
        )
        .unwrap();

    index
        .apply_index(NS, vec![record("d1", "a", "new")], true, false)
        .unwrap();

    assert_eq!(ids(&index, "a", Operator::Eq, "new"), vec!["d1"]);
    assert!(ids(&index, "a", Operator::Eq, "old").is_empty());
    assert_eq!(ids(&index, "b", Operator::Eq, "kept"), vec!["d1"]);
    assert_eq!(index.ancestor(NS, "d1").unwrap().len(), 2);
}

#[test]
fn full_delete_removes_postings_and_ancestor() {
    let index = TestIndex::new();
    index
        .apply_index(
            NS,
            vec![record("d1", "name", "alice"), record("d1", "age", "30")],
            false,
            false,
        )
        .unwrap();

    let stats = index
        .apply_documents(NS, vec![DocumentUpdate::new("d1")], false, true)
        .unwrap();
    assert_eq!(stats.postings_removed, 2);
    assert_eq!(stats.ancestors_deleted, 1);

    assert!(ids(&index, "name", Operator::Eq, "alice").is_empty());
    assert!(ids(&index, "age", Operator::Ge, "").is_empty());
    assert!(index.ancestor(NS, "d1").is_none());
    assert!(index.postings(NS).is_empty());
}

#[test]
fn full_update_with_no_values_clears_document() {
    let index = TestIndex::new();
    index
        .apply_index(NS, vec![record("d1", "name", "alice")], false, false)
        .unwrap();
    index
        .apply_index(NS, vec![record("d1", "name", "")], false, false)
        .unwrap();
    assert!(index.ancestor(NS, "d1").is_none());
    assert!(index.postings(NS).is_empty());
}

#[test]
fn ge_and_lt_ranges_over_stored_postings() {
    let index = TestIndex::new();
    index
        .apply_index(
            NS,
            vec![
                record("da", "word", "a"),
                record("dm", "word", "m"),
                record("dz", "word", "z"),
            ],
            false,
            false,
        )
        .unwrap();

    assert_eq!(ids(&index, "word", Operator::Ge, "m"), vec!["dm", "dz"]);
    assert_eq!(ids(&index, "word", Operator::Lt, "m"), vec!["da"]);
    assert_eq!(ids(&index, "word", Operator::Gt, "m"), vec!["dz"]);
    assert_eq!(ids(&index, "word", Operator::Le, "m"), vec!["da", "dm"]);
}

#[test]
fn bounded_range_with_range_condition() {
    let index = TestIndex::new();
    let records = ["b", "d", "f", "h"]
        .iter()
        .map(|v| record(&format!("d{v}"), "k", v))
        .collect();
    index.apply_index(NS, records, false, false).unwrap();

    let query = Query::new("", "k gt b".parse().unwrap()).range("k le f".parse().unwrap());
    assert_eq!(index.query_keys(NS, &query).unwrap().ids, vec!["dd", "df"]);
}

#[test]
fn forward_match_finds_prefixes() {
    let index = TestIndex::new();
    index
        .apply_index(
            NS,
            vec![
                record("d1", "city", "Oslo"),
                record("d2", "city", "Osaka"),
                record("d3", "city", "Bergen"),
            ],
            false,
            false,
        )
        .unwrap();
    assert_eq!(ids(&index, "city", Operator::ForwardMatch, "Os"), vec!["d2", "d1"]);
}

#[test]
fn parent_paths_separate_scopes() {
    let index = TestIndex::new();
    index
        .apply_index(
            NS,
            vec![
                FieldRecord::new("d1", "home", "city", "oslo"),
                FieldRecord::new("d2", "work", "city", "oslo"),
            ],
            false,
            false,
        )
        .unwrap();
    let query = Query::new("work", Condition::new("city", Operator::Eq, "oslo"));
    assert_eq!(index.query_keys(NS, &query).unwrap().ids, vec!["d2"]);
}

#[test]
fn scope_separator_cannot_merge_scopes() {
    let index = TestIndex::new();
    index
        .apply_index(NS, vec![FieldRecord::new("d2", "a", "b.c", "v")], false, false)
        .unwrap();

    for (parent, field) in [("a\u{1F}b", "c"), ("a", "b\u{1F}c")] {
        let err = index
            .apply_index(NS, vec![FieldRecord::new("d1", parent, field, "v")], false, false)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));

        let query = Query::new(parent, Condition::new(field, Operator::Eq, "v"));
        assert!(matches!(
            index.query_keys(NS, &query),
            Err(CoreError::Validation { .. })
        ));
    }

    assert!(index.ancestor(NS, "d1").is_none());
    let query = Query::new("a", Condition::new("b.c", Operator::Eq, "v"));
    assert_eq!(index.query_keys(NS, &query).unwrap().ids, vec!["d2"]);
}

#[test]
fn shard_queries_need_exact_shard() {
    let index = TestIndex::new();
    index
        .apply_index(
            NS,
            vec![
                record("d1", "title", "rust").with_shard("region", "eu"),
                record("d2", "title", "rust").with_shard("region", "us"),
            ],
            false,
            false,
        )
        .unwrap();

    let base = Query::new("", Condition::new("title", Operator::Eq, "rust"));
    let eu = base.clone().shard("region", "eu");
    assert_eq!(index.query_keys(NS, &eu).unwrap().ids, vec!["d1"]);
    assert_eq!(index.query_keys(NS, &base).unwrap().ids, vec!["d1", "d2"]);

    let blank = base.shard("region", " ");
    assert!(index.query_keys(NS, &blank).unwrap_err().is_validation());
}

#[test]
fn cursor_pages_two_two_one() {
    let index = TestIndex::new();
    let records = (1..=5).map(|i| record(&format!("d{i}"), "tag", "x")).collect();
    index.apply_index(NS, records, false, false).unwrap();

    let query = Query::new("", Condition::new("tag", Operator::Eq, "x")).limit(2);
    let first = index.query_keys(NS, &query).unwrap();
    assert_eq!(first.ids, vec!["d1", "d2"]);
    assert!(first.next_cursor.is_some());

    let second = index
        .query_keys(NS, &query.clone().cursor(first.next_cursor))
        .unwrap();
    assert_eq!(second.ids, vec!["d3", "d4"]);
    assert!(second.next_cursor.is_some());

    let third = index
        .query_keys(NS, &query.clone().cursor(second.next_cursor))
        .unwrap();
    assert_eq!(third.ids, vec!["d5"]);
    assert!(third.next_cursor.is_none());
}

#[test]
fn malformed_cursor_is_rejected() {
    let index = TestIndex::new();
    let query = Query::new("", Condition::new("tag", Operator::Eq, "x"))
        .cursor(Some("not-hex".to_string()));
    assert!(matches!(
        index.query_keys(NS, &query),
        Err(CoreError::Validation { .. })
    ));
}

#[test]
fn list_table_pages_through_postings() {
    let index = TestIndex::new();
    let records = (1..=3).map(|i| record(&format!("d{i}"), "n", &i.to_string())).collect();
    index.apply_index(NS, records, false, false).unwrap();

    let first = index.list_table(NS, "index", None, None, Some(2)).unwrap();
    assert_eq!(first.entries.len(), 2);
    let rest = index
        .list_table(NS, "index", None, first.next_cursor.as_deref(), Some(2))
        .unwrap();
    assert_eq!(rest.entries.len(), 1);
    assert!(rest.next_cursor.is_none());

    let ancestors = index
        .list_table(NS, "ancestor", Some(b"d2".as_slice()), None, None)
        .unwrap();
    assert_eq!(ancestors.entries.len(), 1);

    let sequences = index.list_table(NS, "sequence", None, None, None).unwrap();
    assert_eq!(sequences.entries.len(), 1);
}

#[test]
fn table_entries_serialize_to_json() {
    let index = TestIndex::new();
    index
        .apply_index(NS, vec![record("d1", "name", "alice")], false, false)
        .unwrap();
    let page = index.list_table(NS, "shard", None, None, None).unwrap();
    assert!(page.entries.is_empty());

    let page = index.list_table(NS, "index", None, None, None).unwrap();
    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["entries"][0]["entry"]["kind"], "posting");
    assert_eq!(json["entries"][0]["entry"]["document_id"], "d1");
}
