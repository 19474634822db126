//! Tests for the value, condition and update model
//!
//! These tests verify:
//! - Value ordering and JSON form
//! - Condition rendering and in-memory matching
//! - Update rendering and application
//! - Config defaults, builder and validation
//! - Observer events and backoff schedule

use std::sync::Arc;
use std::time::Duration;

use dynatable::backoff::ExponentialBackoff;
use dynatable::update::ActionKind;
use dynatable::{
    record, Condition, Config, Key, LocalStorage, Number, QueryObserver, QueryOptions, Table,
    TableError, TableSchema, Update, Value,
};
use parking_lot::Mutex;

// =============================================================================
// Value Tests
// =============================================================================

#[test]
fn test_numbers_compare_by_value() {
    assert_eq!(Number::Int(1), Number::Float(1.0));
    assert!(Number::Int(2) > Number::Float(1.5));
    assert!(Value::from(-3) < Value::from(2.5));
    assert_eq!(Number::Int(i64::MAX).add(Number::Int(1)), Number::Float(i64::MAX as f64 + 1.0));
}

#[test]
fn test_large_ints_compare_exactly_with_floats() {
    let big = 1i64 << 53;
    let float = Number::Float(big as f64);

    // big + 1 is not representable as f64 and rounds down to big
    assert_eq!(Number::Int(big), float);
    assert!(Number::Int(big + 1) > float);
    assert!(float < Number::Int(big + 1));
    assert_eq!(Number::Int(big + 1).cmp(&Number::Int(big)), std::cmp::Ordering::Greater);

    assert!(Number::Int(i64::MAX) < Number::Float(9.3e18));
    assert!(Number::Int(i64::MIN) > Number::Float(-9.3e18));
    assert!(Number::Int(2) < Number::Float(2.5));
    assert!(Number::Int(-2) > Number::Float(-2.5));
    assert_eq!(Number::Float(-0.0), Number::Float(0.0));

    let set: std::collections::BTreeSet<Number> =
        [Number::Int(big + 1), float, Number::Int(big)].into_iter().collect();
    assert_eq!(set.len(), 2);
}

#[test]
fn test_cross_kind_order_is_total() {
    let mut values = vec![
        Value::from("b"),
        Value::from(10),
        Value::Null,
        Value::from(true),
        Value::from("a"),
        Value::from(2),
    ];
    values.sort();
    assert_eq!(
        values,
        vec![
            Value::Null,
            Value::from(true),
            Value::from(2),
            Value::from(10),
            Value::from("a"),
            Value::from("b"),
        ]
    );
}

#[test]
fn test_empty_key_values() {
    assert!(Value::Null.is_empty_key());
    assert!(Value::from("").is_empty_key());
    assert!(Value::List(vec![]).is_empty_key());
    assert!(!Value::from(0).is_empty_key());
    assert!(!Value::from(false).is_empty_key());
    assert!(!Value::from("x").is_empty_key());
}

#[test]
fn test_json_form() {
    let value = Value::Map(record! {
        "tags" => Value::string_set(["b", "a"]),
        "n" => 3,
    });
    assert_eq!(
        value.to_json(),
        serde_json::json!({ "n": 3, "tags": { "$type": "set", "elements": ["a", "b"] } })
    );
    assert_eq!(Value::from_json(value.to_json()).unwrap(), value);
}

#[test]
fn test_json_tagged_sets() {
    let empty = serde_json::json!({ "$type": "set", "elements": [] });
    assert_eq!(Value::from_json(empty).unwrap(), Value::StringSet(Default::default()));

    let numbers = serde_json::json!({ "$type": "set", "elements": [2, 1.5] });
    assert_eq!(
        Value::from_json(numbers).unwrap(),
        Value::number_set([Number::Float(1.5), Number::Int(2)])
    );

    let mixed = serde_json::json!({ "$type": "set", "elements": ["a", 1] });
    assert!(matches!(Value::from_json(mixed), Err(TableError::Serialization(_))));
}

// =============================================================================
// Condition Tests
// =============================================================================

#[test]
fn test_condition_expressions() {
    let between = Condition::between(1, 9);
    assert_eq!(between.expression("sort"), "#sort BETWEEN :sort_min AND :sort_max");
    assert_eq!(
        between.expression_values("sort"),
        vec![
            (":sort_min".to_string(), Value::from(1)),
            (":sort_max".to_string(), Value::from(9)),
        ]
    );

    assert_eq!(Condition::LessThan(Value::from(1)).expression("t"), "#t < :t");
    assert_eq!(Condition::GreaterOrEqual(Value::from(1)).expression("t"), "#t >= :t");
    assert_eq!(Condition::begins_with("ab").expression("t"), "begins_with(#t, :t)");
}

#[test]
fn test_condition_matching() {
    let between = Condition::between(2, 4);
    assert!(between.matches(Some(&Value::from(2))));
    assert!(between.matches(Some(&Value::from(4))));
    assert!(!between.matches(Some(&Value::from(5))));
    assert!(!between.matches(None));
    // Different kinds never match
    assert!(!between.matches(Some(&Value::from("3"))));

    let prefix = Condition::begins_with("img/");
    assert!(prefix.matches(Some(&Value::from("img/a.png"))));
    assert!(!prefix.matches(Some(&Value::from("doc/img/"))));
    assert!(!prefix.matches(Some(&Value::from(1))));
}

#[test]
fn test_key_split() {
    let key = Key::new().with("id", "a").with("sort", Condition::between(1, 2));

    let (literals, conditions) = key.split();
    assert_eq!(literals, record! { "id" => "a" });
    assert_eq!(conditions.len(), 1);
    assert_eq!(key.predicate_fields(), vec!["sort".to_string()]);
    assert_eq!(key.to_record(), None);

    let plain = Key::from(record! { "id" => "a" });
    assert_eq!(plain.to_record(), Some(record! { "id" => "a" }));
}

// =============================================================================
// Update Tests
// =============================================================================

#[test]
fn test_update_actions() {
    let action = Update::from(7).to_action();
    assert_eq!(action.action, ActionKind::Put);
    assert_eq!(action.value, Some(Value::from(7)));

    let action = Update::Remove.to_action();
    assert_eq!(action.action, ActionKind::Delete);
    assert_eq!(action.value, None);

    let action = Update::add_to_string_set(["a"]).to_action();
    assert_eq!(action.action, ActionKind::Add);
    assert_eq!(action.value, Some(Value::string_set(["a"])));
    assert_eq!(action.action.as_str(), "ADD");
}

#[test]
fn test_update_apply() {
    let mut record = record! { "n" => 1.5, "list" => Value::List(vec![Value::from(1)]) };

    Update::increment(1).apply(&mut record, "n").unwrap();
    assert_eq!(record["n"], Value::from(2.5));

    Update::add_to_list([2, 3]).apply(&mut record, "list").unwrap();
    assert_eq!(
        record["list"],
        Value::List(vec![Value::from(1), Value::from(2), Value::from(3)])
    );

    let err = Update::increment(1).apply(&mut record, "list").unwrap_err();
    assert!(matches!(err, TableError::TypeMismatch { ref expected, .. } if expected == "a number"));

    let err = Update::add_to_number_set([1]).apply(&mut record, "n").unwrap_err();
    assert!(matches!(err, TableError::TypeMismatch { .. }));
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_config_defaults() {
    let config = Config::default();
    assert_eq!(config.snapshot_path, None);
    assert_eq!(config.table_prefix, "");
    assert_eq!(config.batch_get_chunk_size, 100);
    assert_eq!(config.backoff_initial, Duration::from_millis(50));
    assert_eq!(config.backoff_max, Duration::from_secs(5));
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation() {
    let config = Config::builder().batch_get_chunk_size(0).build();
    assert!(matches!(config.validate(), Err(TableError::Config(_))));

    let config = Config::builder()
        .backoff_initial(Duration::from_secs(2))
        .backoff_max(Duration::from_secs(1))
        .build();
    assert!(matches!(config.validate(), Err(TableError::Config(_))));
}

// =============================================================================
// Backoff Tests
// =============================================================================

#[test]
fn test_backoff_doubles_up_to_cap() {
    let mut backoff = ExponentialBackoff::new(Duration::from_millis(1), Duration::from_millis(3));
    assert_eq!(backoff.next_delay(), Duration::from_millis(1));

    backoff.sleep();
    assert_eq!(backoff.next_delay(), Duration::from_millis(2));
    backoff.sleep();
    assert_eq!(backoff.next_delay(), Duration::from_millis(3));
    backoff.sleep_when(false);
    assert_eq!(backoff.attempts(), 2);
}

// =============================================================================
// Observer Tests
// =============================================================================

#[derive(Default)]
struct RecordingObserver {
    timers: Mutex<Vec<String>>,
    counters: Mutex<Vec<(String, u64)>>,
}

impl QueryObserver for RecordingObserver {
    fn timer(&self, operation: &str, _elapsed_ms: u64) {
        self.timers.lock().push(operation.to_string());
    }

    fn counter(&self, counter: &str, increment: u64) {
        self.counters.lock().push((counter.to_string(), increment));
    }
}

#[test]
fn test_observer_receives_timers_and_counters() {
    let observer = Arc::new(RecordingObserver::default());
    let schema = TableSchema::new("users", "id");
    let table = Table::new(Arc::new(LocalStorage::new()), schema).with_observer(observer.clone());

    table.create(record! { "id" => "a" }).unwrap();
    table.create(record! { "id" => "b" }).unwrap();
    table.get(&Key::new().with("id", "a")).unwrap();
    table
        .get_many(&Key::new().with("id", "a"), QueryOptions::new(), None)
        .unwrap();
    table.item_count().unwrap();

    assert_eq!(
        *observer.timers.lock(),
        vec!["db_create", "db_create", "db_get", "db_get_many", "db_describe"]
    );
    let counters = observer.counters.lock();
    assert!(counters.contains(&("db_create:users".to_string(), 1)));
    assert!(counters.contains(&("db_get:users".to_string(), 1)));
    assert!(counters.contains(&("db_get_many_items".to_string(), 1)));
    assert!(counters.contains(&("db_describe:users".to_string(), 1)));
}
