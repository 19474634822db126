//! Tests for QueryCursor and page tokens
//!
//! These tests verify:
//! - Lazy fetching (no fetch before first access, one fetch per page)
//! - Resumption from every split point
//! - Empty intermediate pages
//! - Resume and page token validation

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dynatable::cursor::QueryCursor;
use dynatable::token::{decode_page_token, encode_page_token};
use dynatable::{
    record, Key, LocalStorage, QueryOptions, Record, Result, ResultPage, Table, TableError,
    TableSchema, Value,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn numbered(n: usize) -> Vec<Record> {
    (0..n).map(|i| record! { "n" => i as i64 }).collect()
}

/// Fetch function serving `records` in pages of `size`; tokens are offsets
fn paged(records: Vec<Record>, size: usize) -> impl FnMut(Option<&str>) -> Result<ResultPage> {
    move |token: Option<&str>| {
        let start: usize = token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + size).min(records.len());
        let next = (end < records.len()).then(|| end.to_string());
        Ok(ResultPage::new(records[start..end].to_vec(), next))
    }
}

fn drain(cursor: &mut QueryCursor<'_>, n: usize) -> Vec<Record> {
    (0..n).map(|_| cursor.next().unwrap().unwrap()).collect()
}

// =============================================================================
// Laziness Tests
// =============================================================================

#[test]
fn test_no_fetch_before_access() {
    let cursor = QueryCursor::new(paged(numbered(5), 2));
    assert_eq!(cursor.pages_fetched(), 0);
}

#[test]
fn test_is_at_end_fetches_once() {
    let mut cursor = QueryCursor::new(paged(numbered(5), 2));
    for _ in 0..10 {
        assert!(!cursor.is_at_end().unwrap());
    }
    assert_eq!(cursor.pages_fetched(), 1);
}

#[test]
fn test_each_page_fetched_once() {
    let mut cursor = QueryCursor::new(paged(numbered(7), 3));
    let all: Vec<Record> = cursor.by_ref().map(|r| r.unwrap()).collect();

    assert_eq!(all, numbered(7));
    assert_eq!(cursor.pages_fetched(), 3);
    assert!(cursor.is_at_end().unwrap());
    assert_eq!(cursor.pages_fetched(), 3);
}

#[test]
fn test_current_and_advance() {
    let mut cursor = QueryCursor::new(paged(numbered(2), 1));

    assert_eq!(cursor.current().unwrap(), &record! { "n" => 0 });
    assert_eq!(cursor.current().unwrap(), &record! { "n" => 0 });
    cursor.advance().unwrap();
    assert_eq!(cursor.current().unwrap(), &record! { "n" => 1 });
    cursor.advance().unwrap();

    assert!(cursor.is_at_end().unwrap());
    assert!(matches!(cursor.current(), Err(TableError::CursorExhausted)));
    cursor.advance().unwrap();
    assert!(cursor.is_at_end().unwrap());
}

#[test]
fn test_empty_result() {
    let mut cursor = QueryCursor::new(paged(Vec::new(), 3));
    assert!(cursor.is_at_end().unwrap());
    assert!(cursor.next().is_none());
    assert_eq!(cursor.resume_token().unwrap(), None);
}

#[test]
fn test_empty_intermediate_page_is_skipped() {
    let fetch = |token: Option<&str>| {
        Ok(match token {
            None => ResultPage::new(vec![record! { "n" => 1 }], Some("p1".to_string())),
            Some("p1") => ResultPage::new(Vec::new(), Some("p2".to_string())),
            Some(_) => ResultPage::new(vec![record! { "n" => 2 }], None),
        })
    };
    let cursor = QueryCursor::new(fetch);
    let all: Vec<Record> = cursor.map(|r| r.unwrap()).collect();
    assert_eq!(all, vec![record! { "n" => 1 }, record! { "n" => 2 }]);
}

#[test]
fn test_fetch_error_ends_iteration() {
    let fetch = |token: Option<&str>| match token {
        None => Ok(ResultPage::new(vec![record! { "n" => 1 }], Some("p1".to_string()))),
        Some(_) => Err(TableError::Backend("boom".to_string())),
    };
    let mut cursor = QueryCursor::new(fetch);

    assert!(cursor.next().unwrap().is_ok());
    assert!(matches!(cursor.next(), Some(Err(TableError::Backend(_)))));
    assert!(cursor.next().is_none());
}

// =============================================================================
// Resumption Tests
// =============================================================================

#[test]
fn test_resume_at_every_split_point() {
    let records = numbered(7);

    for k in 0..=records.len() {
        let mut cursor = QueryCursor::new(paged(records.clone(), 3));
        let consumed = drain(&mut cursor, k);
        assert_eq!(consumed, records[..k].to_vec());

        let token = cursor.resume_token().unwrap();
        if k == records.len() {
            assert_eq!(token, None);
            continue;
        }

        let resumed = QueryCursor::resume(paged(records.clone(), 3), token.as_deref()).unwrap();
        let rest: Vec<Record> = resumed.map(|r| r.unwrap()).collect();
        assert_eq!(rest, records[k..].to_vec(), "split at {}", k);
    }
}

#[test]
fn test_resume_token_format() {
    let mut cursor = QueryCursor::new(paged(numbered(5), 2));
    assert_eq!(cursor.resume_token().unwrap().as_deref(), Some("@0"));

    drain(&mut cursor, 1);
    assert_eq!(cursor.resume_token().unwrap().as_deref(), Some("@1"));

    drain(&mut cursor, 2);
    assert_eq!(cursor.resume_token().unwrap().as_deref(), Some("2@1"));
}

#[test]
fn test_resume_from_none_starts_over() {
    let cursor = QueryCursor::resume(paged(numbered(3), 2), None).unwrap();
    assert_eq!(cursor.map(|r| r.unwrap()).collect::<Vec<_>>(), numbered(3));

    let cursor = QueryCursor::resume(paged(numbered(3), 2), Some("")).unwrap();
    assert_eq!(cursor.map(|r| r.unwrap()).collect::<Vec<_>>(), numbered(3));
}

#[test]
fn test_invalid_resume_tokens() {
    for bad in ["no-delimiter", "abc@", "abc@x", "@-1"] {
        let result = QueryCursor::resume(paged(numbered(3), 2), Some(bad));
        assert!(
            matches!(result, Err(TableError::InvalidResumeToken(_))),
            "token {:?}",
            bad
        );
    }
}

#[test]
fn test_table_cursor_resumes_across_pages() {
    let schema = TableSchema::new("events", "id").with_sort_key("sort");
    let table = Table::new(Arc::new(LocalStorage::new()), schema);
    for sort in 0..10 {
        table.create(record! { "id" => "a", "sort" => sort }).unwrap();
    }
    let key = Key::new().with("id", "a");
    let options = QueryOptions::new().reverse().limit(4);

    let full: Vec<Record> = table.get_all(&key, options).map(|r| r.unwrap()).collect();
    assert_eq!(full.len(), 10);
    assert_eq!(full[0]["sort"], Value::from(9));

    for k in [0, 3, 4, 5, 9] {
        let mut cursor = table.get_all(&key, options);
        drain(&mut cursor, k);
        let token = cursor.resume_token().unwrap();

        let resumed = table.get_all_from(&key, options, token.as_deref()).unwrap();
        let rest: Vec<Record> = resumed.map(|r| r.unwrap()).collect();
        assert_eq!(rest, full[k..].to_vec(), "split at {}", k);
    }
}

#[test]
fn test_scan_all_visits_every_record() {
    let schema = TableSchema::new("users", "id");
    let table = Table::new(Arc::new(LocalStorage::new()), schema);
    for i in 0..5 {
        table.create(record! { "id" => format!("u{}", i) }).unwrap();
    }

    let mut cursor = table.scan_all(Some(2));
    let all: Vec<Record> = cursor.by_ref().map(|r| r.unwrap()).collect();
    assert_eq!(all.len(), 5);
    assert_eq!(cursor.pages_fetched(), 3);

    let mut cursor = table.scan_all(Some(2));
    drain(&mut cursor, 3);
    let token = cursor.resume_token().unwrap();
    let rest: Vec<Record> = table
        .scan_all_from(Some(2), token.as_deref())
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(rest, all[3..].to_vec());
}

// =============================================================================
// Page Token Tests
// =============================================================================

#[test]
fn test_page_token_round_trip() {
    assert_eq!(encode_page_token(None).unwrap(), None);
    assert_eq!(decode_page_token(None).unwrap(), None);

    let position = record! {
        "id" => "user/1?x=y",
        "sort" => 42,
        "score" => 1.5,
        "tags" => Value::string_set(["a", "b"]),
    };
    let token = encode_page_token(Some(&position)).unwrap().unwrap();
    assert!(token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    assert_eq!(decode_page_token(Some(&token)).unwrap(), Some(position));
}

#[test]
fn test_page_token_has_no_padding() {
    // Lengths covering every base64 remainder
    for id in ["a", "ab", "abc", "abcd"] {
        let position = record! { "id" => id };
        let token = encode_page_token(Some(&position)).unwrap().unwrap();
        assert!(!token.contains('='), "token {:?}", token);
        assert_eq!(decode_page_token(Some(&token)).unwrap(), Some(position));
    }
}

#[test]
fn test_invalid_page_tokens() {
    let not_an_object = URL_SAFE_NO_PAD.encode(b"[1, 2]");
    let not_json = URL_SAFE_NO_PAD.encode(b"{oops");
    let too_long = "A".repeat(20_000);

    for bad in ["", "***", not_an_object.as_str(), not_json.as_str(), too_long.as_str()] {
        assert!(
            matches!(decode_page_token(Some(bad)), Err(TableError::InvalidPaginationToken(_))),
            "token {:?}",
            bad
        );
    }
}
