//! Value Module
//!
//! Field values stored in records.
//!
//! ## Ordering
//! `Value` has a total order so records can be sorted by any field and used
//! as map keys (batch reads dedupe on whole key records):
//! - values of the same kind compare naturally
//! - values of different kinds compare by kind rank (the variant order below)
//!
//! ## Snapshot Form
//! Values map onto plain JSON, except sets, which are tagged:
//! ```text
//! {"$type": "set", "elements": [...]}
//! ```

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Result, TableError};

/// A record: field name → value, ordered by field name
pub type Record = BTreeMap<String, Value>;

/// Tag marking a set in the JSON form
const SET_TYPE_TAG: &str = "set";

/// A numeric value
///
/// Integers and floats compare by numeric value, so `Int(1) == Float(1.0)`.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Numeric value as a float
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// Add two numbers, staying integral while the sum fits in an i64
    pub fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => match a.checked_add(b) {
                Some(sum) => Number::Int(sum),
                None => Number::Float(a as f64 + b as f64),
            },
            (a, b) => Number::Float(a.as_f64() + b.as_f64()),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(b),
            (Number::Int(a), Number::Float(b)) => cmp_int_float(*a, *b),
            (Number::Float(a), Number::Int(b)) => cmp_int_float(*b, *a).reverse(),
            (Number::Float(a), Number::Float(b)) if a == b => Ordering::Equal,
            (Number::Float(a), Number::Float(b)) => a.total_cmp(b),
        }
    }
}

/// Exact comparison of an integer with a float (no lossy `i64 -> f64`)
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    // 2^63, the first float above every i64
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;

    if f.is_nan() {
        // Same placement as f64::total_cmp
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if f >= LIMIT {
        return Ordering::Less;
    }
    if f < -LIMIT {
        return Ordering::Greater;
    }

    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal if f > whole => Ordering::Less,
        Ordering::Equal if f < whole => Ordering::Greater,
        ordering => ordering,
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}

impl From<i64> for Number {
    fn from(v: i64) -> Self {
        Number::Int(v)
    }
}

impl From<i32> for Number {
    fn from(v: i32) -> Self {
        Number::Int(v as i64)
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Number::Float(v)
    }
}

/// A field value
///
/// Variant order is the cross-kind sort order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "serde_json::Value", try_from = "serde_json::Value")]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    StringSet(BTreeSet<String>),
    NumberSet(BTreeSet<Number>),
}

impl Value {
    /// Build a string set from anything yielding strings
    pub fn string_set<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::StringSet(elements.into_iter().map(Into::into).collect())
    }

    /// Build a number set from anything yielding numbers
    pub fn number_set<I, N>(elements: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Number>,
    {
        Value::NumberSet(elements.into_iter().map(Into::into).collect())
    }

    /// Short kind name, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::StringSet(_) => "string set",
            Value::NumberSet(_) => "number set",
        }
    }

    /// Whether this value cannot identify a key (null or an empty string/container).
    ///
    /// Zero and `false` are valid key values.
    pub fn is_empty_key(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Map(m) => m.is_empty(),
            Value::StringSet(s) => s.is_empty(),
            Value::NumberSet(s) => s.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert into the JSON form used by snapshots and tokens
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => json!(s),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::StringSet(set) => json!({
                "$type": SET_TYPE_TAG,
                "elements": set.iter().collect::<Vec<_>>(),
            }),
            Value::NumberSet(set) => json!({
                "$type": SET_TYPE_TAG,
                "elements": set.iter().map(|n| number_to_json(*n)).collect::<Vec<_>>(),
            }),
        }
    }

    /// Restore a value from its JSON form
    ///
    /// Tagged sets come back as string or number sets depending on their
    /// elements; an empty tagged set is read as an empty string set.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(number_from_json(&n)?),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(Value::from_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            serde_json::Value::Object(mut map) => {
                if map.get("$type").and_then(|t| t.as_str()) == Some(SET_TYPE_TAG) {
                    let elements = map.remove("elements").unwrap_or(serde_json::Value::Null);
                    return set_from_json(elements);
                }
                Value::Map(
                    map.into_iter()
                        .map(|(k, v)| Ok((k, Value::from_json(v)?)))
                        .collect::<Result<BTreeMap<_, _>>>()?,
                )
            }
        })
    }
}

fn number_to_json(n: Number) -> serde_json::Value {
    match n {
        Number::Int(i) => json!(i),
        // NaN and infinities have no JSON form
        Number::Float(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
    }
}

fn number_from_json(n: &serde_json::Number) -> Result<Number> {
    if let Some(i) = n.as_i64() {
        return Ok(Number::Int(i));
    }
    n.as_f64()
        .map(Number::Float)
        .ok_or_else(|| TableError::Serialization(format!("unrepresentable number: {}", n)))
}

fn set_from_json(elements: serde_json::Value) -> Result<Value> {
    let serde_json::Value::Array(elements) = elements else {
        return Err(TableError::Serialization(
            "tagged set is missing its 'elements' array".to_string(),
        ));
    };

    if elements.iter().all(|e| e.is_string()) {
        let set = elements
            .into_iter()
            .filter_map(|e| match e {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect();
        return Ok(Value::StringSet(set));
    }

    let mut set = BTreeSet::new();
    for element in elements {
        match element {
            serde_json::Value::Number(n) => {
                set.insert(number_from_json(&n)?);
            }
            other => {
                return Err(TableError::Serialization(format!(
                    "mixed element types in tagged set: {}",
                    other
                )))
            }
        }
    }
    Ok(Value::NumberSet(set))
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        value.to_json()
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = TableError;

    fn try_from(json: serde_json::Value) -> Result<Self> {
        Value::from_json(json)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(Number::Int(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(Number::Int(v as i64))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(Number::Float(v))
    }
}

impl From<Number> for Value {
    fn from(v: Number) -> Self {
        Value::Number(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

/// Build a [`Record`] from `field => value` pairs.
///
/// ```
/// use dynatable::record;
///
/// let r = record! { "id" => "a", "v" => 1 };
/// assert_eq!(r.len(), 2);
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::value::Record::new() };
    ($($field:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::value::Record::new();
        $( record.insert(::std::string::String::from($field), $crate::value::Value::from($value)); )+
        record
    }};
}
