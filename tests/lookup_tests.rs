//! Tests for lookup resolution
//!
//! These tests verify:
//! - Full table keys resolve to the table
//! - Index keys (full or partition only) resolve to that index
//! - Partition-only table lookups need `many`
//! - Empty values and unknown fields are rejected

use dynatable::condition::{Condition, Key};
use dynatable::error::TableError;
use dynatable::lookup::{resolve, Lookup};
use dynatable::schema::{Index, TableSchema};
use dynatable::Value;

// =============================================================================
// Helper Functions
// =============================================================================

fn sorted_schema() -> TableSchema {
    TableSchema::new("events", "id")
        .with_sort_key("sort")
        .with_index(Index::new("owner", Some("created")))
        .with_index(Index::new("email", None).keys_only())
}

fn simple_schema() -> TableSchema {
    TableSchema::new("users", "id").with_index(Index::new("email", None))
}

// =============================================================================
// Table Lookups
// =============================================================================

#[test]
fn test_full_key_is_table_lookup() {
    let schema = sorted_schema();
    let key = Key::new().with("id", "a").with("sort", 1);

    assert_eq!(resolve(&schema, &key, false).unwrap(), Lookup::Table);
    assert_eq!(resolve(&schema, &key, true).unwrap(), Lookup::Table);
}

#[test]
fn test_field_set_decides_not_values() {
    let schema = sorted_schema();
    for (id, sort) in [("a", 1), ("zzz", -5), ("x", 0)] {
        let key = Key::new().with("id", id).with("sort", sort);
        assert_eq!(resolve(&schema, &key, false).unwrap(), Lookup::Table);
    }
}

#[test]
fn test_partition_only_table_lookup_needs_many() {
    let schema = sorted_schema();
    let key = Key::new().with("id", "a");

    assert_eq!(resolve(&schema, &key, true).unwrap(), Lookup::Table);

    let err = resolve(&schema, &key, false).unwrap_err();
    assert!(matches!(err, TableError::MissingSortKey { ref sort_key } if sort_key == "sort"));
}

#[test]
fn test_sort_key_condition_is_table_lookup() {
    let schema = sorted_schema();
    let key = Key::new()
        .with("id", "a")
        .with("sort", Condition::between(1, 5));

    assert_eq!(resolve(&schema, &key, true).unwrap(), Lookup::Table);
}

// =============================================================================
// Index Lookups
// =============================================================================

#[test]
fn test_full_index_key_is_index_lookup() {
    let schema = sorted_schema();
    let key = Key::new().with("owner", "u1").with("created", 10);

    match resolve(&schema, &key, true).unwrap() {
        Lookup::Index(index) => assert_eq!(index.name, "owner-created-index"),
        other => panic!("expected index lookup, got {:?}", other),
    }
}

#[test]
fn test_index_partition_alone_is_index_lookup() {
    let schema = sorted_schema();

    let key = Key::new().with("owner", "u1");
    match resolve(&schema, &key, false).unwrap() {
        Lookup::Index(index) => assert_eq!(index.name, "owner-created-index"),
        other => panic!("expected index lookup, got {:?}", other),
    }

    let key = Key::new().with("email", "a@example.com");
    match resolve(&schema, &key, false).unwrap() {
        Lookup::Index(index) => {
            assert_eq!(index.name, "email-index");
            assert!(index.keys_only);
        }
        other => panic!("expected index lookup, got {:?}", other),
    }
}

#[test]
fn test_table_key_wins_over_index() {
    // Table has only a partition key; the single field matches it exactly
    let schema = simple_schema();
    let key = Key::new().with("id", "a");
    assert_eq!(resolve(&schema, &key, false).unwrap(), Lookup::Table);
}

#[test]
fn test_first_matching_index_wins() {
    let schema = TableSchema::new("t", "id")
        .with_index(Index::new("tag", None).named("first"))
        .with_index(Index::new("tag", Some("at")).named("second"));
    let key = Key::new().with("tag", "x");

    match resolve(&schema, &key, true).unwrap() {
        Lookup::Index(index) => assert_eq!(index.name, "first"),
        other => panic!("expected index lookup, got {:?}", other),
    }
}

#[test]
fn test_default_index_names() {
    assert_eq!(Index::new("a", None).name, "a-index");
    assert_eq!(Index::new("a", Some("b")).name, "a-b-index");
    assert_eq!(Index::new("a", Some("b")).named("custom").name, "custom");
}

// =============================================================================
// Rejections
// =============================================================================

#[test]
fn test_empty_values_rejected() {
    let schema = sorted_schema();

    for empty in [Value::Null, Value::from(""), Value::List(vec![])] {
        let key = Key::new().with("id", empty).with("sort", 1);
        let err = resolve(&schema, &key, false).unwrap_err();
        assert!(matches!(err, TableError::EmptyKeyValue { ref field } if field == "id"));
        assert!(err.is_validation());
    }
}

#[test]
fn test_zero_and_false_are_valid_keys() {
    let schema = sorted_schema();
    let key = Key::new().with("id", false).with("sort", 0);
    assert_eq!(resolve(&schema, &key, false).unwrap(), Lookup::Table);
}

#[test]
fn test_unknown_single_field() {
    let schema = sorted_schema();
    let key = Key::new().with("color", "red");

    let err = resolve(&schema, &key, true).unwrap_err();
    assert!(matches!(err, TableError::UnknownKeyField { ref field } if field == "color"));
}

#[test]
fn test_mismatched_field_pair() {
    let schema = sorted_schema();
    let key = Key::new().with("id", "a").with("color", "red");

    let err = resolve(&schema, &key, true).unwrap_err();
    match err {
        TableError::KeyFieldsMismatch { got, expected } => {
            assert_eq!(got, vec!["color".to_string(), "id".to_string()]);
            assert_eq!(expected, vec!["id".to_string(), "sort".to_string()]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_empty_fragment_rejected() {
    let schema = sorted_schema();
    let err = resolve(&schema, &Key::new(), true).unwrap_err();
    assert!(matches!(err, TableError::KeyFieldsMismatch { .. }));
}
