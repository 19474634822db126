//! Table and index descriptors
//!
//! Both are built once at startup and never change afterwards.

use std::collections::BTreeSet;

use crate::condition::Key;
use crate::error::{Result, TableError};
use crate::value::Record;

/// A secondary index over a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub partition_key: String,
    pub sort_key: Option<String>,

    /// Index holds key attributes only
    pub keys_only: bool,
}

impl Index {
    /// Index named `{partition_key}[-{sort_key}]-index`
    pub fn new(partition_key: impl Into<String>, sort_key: Option<&str>) -> Self {
        let partition_key = partition_key.into();
        let name = match sort_key {
            Some(sort_key) => format!("{}-{}-index", partition_key, sort_key),
            None => format!("{}-index", partition_key),
        };
        Self {
            name,
            partition_key,
            sort_key: sort_key.map(str::to_string),
            keys_only: false,
        }
    }

    /// Override the default name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Mark as a keys-only index
    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    pub fn key_names(&self) -> BTreeSet<&str> {
        std::iter::once(self.partition_key.as_str())
            .chain(self.sort_key.as_deref())
            .collect()
    }
}

/// Shape of a table: name, primary key, indexes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub partition_key: String,
    pub sort_key: Option<String>,
    pub indexes: Vec<Index>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_key: partition_key.into(),
            sort_key: None,
            indexes: Vec::new(),
        }
    }

    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Primary key fields, partition key first
    pub fn key_fields(&self) -> Vec<String> {
        std::iter::once(self.partition_key.clone())
            .chain(self.sort_key.clone())
            .collect()
    }

    pub fn key_names(&self) -> BTreeSet<&str> {
        std::iter::once(self.partition_key.as_str())
            .chain(self.sort_key.as_deref())
            .collect()
    }

    /// Pull the primary key out of a complete record
    pub fn extract_key(&self, record: &Record) -> Result<Record> {
        let mut key = Record::new();
        for field in self.key_fields() {
            let value = record
                .get(&field)
                .ok_or_else(|| TableError::MissingKeyField { field: field.clone() })?;
            if value.is_empty_key() {
                return Err(TableError::EmptyKeyValue { field });
            }
            key.insert(field, value.clone());
        }
        Ok(key)
    }

    /// Check that `key` is exactly a full primary key of literal values
    pub fn validate_key(&self, key: &Key, operation: &str) -> Result<Record> {
        if key.field_names() != self.key_names() {
            return Err(TableError::KeyFieldsMismatch {
                got: key.iter().map(|(k, _)| k.clone()).collect(),
                expected: self.key_names().into_iter().map(str::to_string).collect(),
            });
        }
        let record = key.to_record().ok_or_else(|| TableError::PredicateNotAllowed {
            operation: operation.to_string(),
            fields: key.predicate_fields(),
        })?;
        if let Some((field, _)) = record.iter().find(|(_, v)| v.is_empty_key()) {
            return Err(TableError::EmptyKeyValue {
                field: field.clone(),
            });
        }
        Ok(record)
    }
}
