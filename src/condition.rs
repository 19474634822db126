//! Condition Module
//!
//! Key fragments and the non-equality predicates they may carry.
//!
//! A key fragment maps field names to either a literal (equality) or a
//! [`Condition`]. Conditions are only valid on the sort key of whatever is
//! being queried; that is checked by the storage layer before every query.

use std::collections::{BTreeMap, BTreeSet};
use std::mem;

use crate::value::{Number, Record, Value};

/// A non-equality predicate on a sort key
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `low <= value <= high`
    Between(Value, Value),
    LessThan(Value),
    LessOrEqual(Value),
    GreaterThan(Value),
    GreaterOrEqual(Value),
    /// String prefix match
    BeginsWith(String),
}

impl Condition {
    pub fn between(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Condition::Between(low.into(), high.into())
    }

    pub fn begins_with(prefix: impl Into<String>) -> Self {
        Condition::BeginsWith(prefix.into())
    }

    /// Render the key-condition expression fragment for `field`.
    ///
    /// Field names are always referenced through `#field` placeholders.
    pub fn expression(&self, field: &str) -> String {
        match self {
            Condition::Between(..) => {
                format!("#{f} BETWEEN :{f}_min AND :{f}_max", f = field)
            }
            Condition::LessThan(_) => format!("#{f} < :{f}", f = field),
            Condition::LessOrEqual(_) => format!("#{f} <= :{f}", f = field),
            Condition::GreaterThan(_) => format!("#{f} > :{f}", f = field),
            Condition::GreaterOrEqual(_) => format!("#{f} >= :{f}", f = field),
            Condition::BeginsWith(_) => format!("begins_with(#{f}, :{f})", f = field),
        }
    }

    /// Render the placeholder values referenced by [`Condition::expression`]
    pub fn expression_values(&self, field: &str) -> Vec<(String, Value)> {
        match self {
            Condition::Between(low, high) => vec![
                (format!(":{}_min", field), low.clone()),
                (format!(":{}_max", field), high.clone()),
            ],
            Condition::LessThan(v)
            | Condition::LessOrEqual(v)
            | Condition::GreaterThan(v)
            | Condition::GreaterOrEqual(v) => vec![(format!(":{}", field), v.clone())],
            Condition::BeginsWith(prefix) => {
                vec![(format!(":{}", field), Value::String(prefix.clone()))]
            }
        }
    }

    /// Evaluate against a record's field value (in-memory engine).
    ///
    /// A missing field or a value of a different kind never matches.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match self {
            Condition::Between(low, high) => {
                same_kind(value, low) && same_kind(value, high) && low <= value && value <= high
            }
            Condition::LessThan(bound) => same_kind(value, bound) && value < bound,
            Condition::LessOrEqual(bound) => same_kind(value, bound) && value <= bound,
            Condition::GreaterThan(bound) => same_kind(value, bound) && value > bound,
            Condition::GreaterOrEqual(bound) => same_kind(value, bound) && value >= bound,
            Condition::BeginsWith(prefix) => value
                .as_str()
                .map(|s| s.starts_with(prefix.as_str()))
                .unwrap_or(false),
        }
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    mem::discriminant(a) == mem::discriminant(b)
}

/// A value in a key fragment: equality literal or predicate
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Literal(Value),
    Predicate(Condition),
}

impl KeyValue {
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            KeyValue::Literal(v) => Some(v),
            KeyValue::Predicate(_) => None,
        }
    }
}

impl From<Condition> for KeyValue {
    fn from(c: Condition) -> Self {
        KeyValue::Predicate(c)
    }
}

macro_rules! literal_key_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for KeyValue {
                fn from(v: $t) -> Self {
                    KeyValue::Literal(Value::from(v))
                }
            }
        )*
    };
}

literal_key_value!(Value, &str, String, i64, i32, f64, bool, Number);

/// A key fragment: 1–2 fields identifying a key, an index key, or a partition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Key {
    fields: BTreeMap<String, KeyValue>,
}

impl Key {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder style)
    pub fn with(mut self, field: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<KeyValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&KeyValue> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &KeyValue)> {
        self.fields.iter()
    }

    /// The set of field names in this fragment
    pub fn field_names(&self) -> BTreeSet<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Split into equality literals and predicates
    pub fn split(&self) -> (Record, BTreeMap<String, Condition>) {
        let mut literals = Record::new();
        let mut conditions = BTreeMap::new();
        for (field, value) in &self.fields {
            match value {
                KeyValue::Literal(v) => {
                    literals.insert(field.clone(), v.clone());
                }
                KeyValue::Predicate(c) => {
                    conditions.insert(field.clone(), c.clone());
                }
            }
        }
        (literals, conditions)
    }

    /// Fields carrying predicates, in name order
    pub fn predicate_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, v)| matches!(v, KeyValue::Predicate(_)))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// The literal record, or `None` if any field carries a predicate
    pub fn to_record(&self) -> Option<Record> {
        self.fields
            .iter()
            .map(|(k, v)| v.as_literal().map(|v| (k.clone(), v.clone())))
            .collect()
    }
}

impl From<Record> for Key {
    fn from(record: Record) -> Self {
        Self {
            fields: record
                .into_iter()
                .map(|(k, v)| (k, KeyValue::Literal(v)))
                .collect(),
        }
    }
}

impl From<&Record> for Key {
    fn from(record: &Record) -> Self {
        Key::from(record.clone())
    }
}
