//! Update Module
//!
//! Mutations applied by `update` calls.
//!
//! Each field in an update map carries one [`Update`]:
//! - `Put` overwrites the field (what a plain value means)
//! - `Remove` deletes the field from the record
//! - the remaining operators are deltas against the current value
//!
//! Every operator renders to a backend-native [`AttributeAction`] and can be
//! applied to an in-memory record. Applying a container operator to a field
//! holding a different kind of value fails instead of coercing.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, TableError};
use crate::value::{Number, Record, Value};

/// Field name → update
pub type Updates = BTreeMap<String, Update>;

/// A single-field mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Overwrite the field
    Put(Value),

    /// Delete the field
    Remove,

    /// Add to a number (a missing field counts as 0)
    Increment(Number),

    AddToStringSet(BTreeSet<String>),
    AddToNumberSet(BTreeSet<Number>),

    /// Append to a list
    AddToList(Vec<Value>),

    RemoveFromStringSet(BTreeSet<String>),
    RemoveFromNumberSet(BTreeSet<Number>),
}

/// Action verb of a backend attribute update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Put,
    Add,
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Put => "PUT",
            ActionKind::Add => "ADD",
            ActionKind::Delete => "DELETE",
        }
    }
}

/// Backend-native rendering of an [`Update`]
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeAction {
    pub action: ActionKind,
    pub value: Option<Value>,
}

impl Update {
    pub fn increment(delta: impl Into<Number>) -> Self {
        Update::Increment(delta.into())
    }

    pub fn add_to_string_set<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Update::AddToStringSet(elements.into_iter().map(Into::into).collect())
    }

    pub fn add_to_number_set<I, N>(elements: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Number>,
    {
        Update::AddToNumberSet(elements.into_iter().map(Into::into).collect())
    }

    pub fn add_to_list<I, V>(elements: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Update::AddToList(elements.into_iter().map(Into::into).collect())
    }

    pub fn remove_from_string_set<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Update::RemoveFromStringSet(elements.into_iter().map(Into::into).collect())
    }

    pub fn remove_from_number_set<I, N>(elements: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Number>,
    {
        Update::RemoveFromNumberSet(elements.into_iter().map(Into::into).collect())
    }

    /// Reject operators the backend cannot express (empty deltas)
    pub fn validate(&self, field: &str) -> Result<()> {
        let empty = match self {
            Update::AddToStringSet(s) | Update::RemoveFromStringSet(s) => s.is_empty(),
            Update::AddToNumberSet(s) | Update::RemoveFromNumberSet(s) => s.is_empty(),
            Update::AddToList(l) => l.is_empty(),
            Update::Put(_) | Update::Remove | Update::Increment(_) => false,
        };
        if empty {
            return Err(TableError::InvalidUpdate {
                field: field.to_string(),
                reason: "no elements given".to_string(),
            });
        }
        Ok(())
    }

    /// Render as a backend attribute update
    pub fn to_action(&self) -> AttributeAction {
        let (action, value) = match self {
            Update::Put(v) => (ActionKind::Put, Some(v.clone())),
            Update::Remove => (ActionKind::Delete, None),
            Update::Increment(n) => (ActionKind::Add, Some(Value::Number(*n))),
            Update::AddToStringSet(s) => (ActionKind::Add, Some(Value::StringSet(s.clone()))),
            Update::AddToNumberSet(s) => (ActionKind::Add, Some(Value::NumberSet(s.clone()))),
            Update::AddToList(l) => (ActionKind::Add, Some(Value::List(l.clone()))),
            Update::RemoveFromStringSet(s) => {
                (ActionKind::Delete, Some(Value::StringSet(s.clone())))
            }
            Update::RemoveFromNumberSet(s) => {
                (ActionKind::Delete, Some(Value::NumberSet(s.clone())))
            }
        };
        AttributeAction { action, value }
    }

    /// Apply to an in-memory record
    pub fn apply(&self, record: &mut Record, field: &str) -> Result<()> {
        match self {
            Update::Put(v) => {
                record.insert(field.to_string(), v.clone());
            }
            Update::Remove => {
                record.remove(field);
            }
            Update::Increment(delta) => {
                let current = match record.get(field) {
                    None => Number::Int(0),
                    Some(Value::Number(n)) => *n,
                    Some(other) => return Err(mismatch(field, "a number", other)),
                };
                record.insert(field.to_string(), Value::Number(current.add(*delta)));
            }
            Update::AddToStringSet(elements) => {
                let mut set = existing_string_set(record, field)?;
                set.extend(elements.iter().cloned());
                record.insert(field.to_string(), Value::StringSet(set));
            }
            Update::RemoveFromStringSet(elements) => {
                let mut set = existing_string_set(record, field)?;
                set.retain(|e| !elements.contains(e));
                record.insert(field.to_string(), Value::StringSet(set));
            }
            Update::AddToNumberSet(elements) => {
                let mut set = existing_number_set(record, field)?;
                set.extend(elements.iter().copied());
                record.insert(field.to_string(), Value::NumberSet(set));
            }
            Update::RemoveFromNumberSet(elements) => {
                let mut set = existing_number_set(record, field)?;
                set.retain(|e| !elements.contains(e));
                record.insert(field.to_string(), Value::NumberSet(set));
            }
            Update::AddToList(elements) => {
                let mut list = match record.get(field) {
                    None => Vec::new(),
                    Some(Value::List(l)) => l.clone(),
                    Some(other) => return Err(mismatch(field, "a list", other)),
                };
                list.extend(elements.iter().cloned());
                record.insert(field.to_string(), Value::List(list));
            }
        }
        Ok(())
    }
}

fn existing_string_set(record: &Record, field: &str) -> Result<BTreeSet<String>> {
    match record.get(field) {
        None => Ok(BTreeSet::new()),
        Some(Value::StringSet(s)) => Ok(s.clone()),
        Some(other) => Err(mismatch(field, "a string set", other)),
    }
}

fn existing_number_set(record: &Record, field: &str) -> Result<BTreeSet<Number>> {
    match record.get(field) {
        None => Ok(BTreeSet::new()),
        Some(Value::NumberSet(s)) => Ok(s.clone()),
        Some(other) => Err(mismatch(field, "a number set", other)),
    }
}

fn mismatch(field: &str, expected: &str, found: &Value) -> TableError {
    TableError::TypeMismatch {
        field: field.to_string(),
        expected: expected.to_string(),
        found: found.kind().to_string(),
    }
}

macro_rules! put_update {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Update {
                fn from(v: $t) -> Self {
                    Update::Put(Value::from(v))
                }
            }
        )*
    };
}

put_update!(Value, &str, String, i64, i32, f64, bool, Number);
