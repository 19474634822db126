//! Lookup resolution
//!
//! Decides whether a caller's key fragment addresses the table itself or one
//! of its indexes. Only the set of field names matters, never the values
//! (beyond rejecting empty ones).
//!
//! ## Rules (first match wins)
//! 1. fields == table key fields → table lookup
//! 2. fields == an index's key fields, or the single field is an index's
//!    partition key → that index, in declaration order
//! 3. the single field is the table partition key → table lookup, only when
//!    many results are allowed
//! 4. anything else fails

use crate::condition::{Key, KeyValue};
use crate::error::{Result, TableError};
use crate::schema::{Index, TableSchema};

/// Physical access path for a key fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'s> {
    Table,
    Index(&'s Index),
}

/// Resolve `key` against `schema`.
///
/// `many` allows a partition-only table lookup (a range of records).
pub fn resolve<'s>(schema: &'s TableSchema, key: &Key, many: bool) -> Result<Lookup<'s>> {
    for (field, value) in key.iter() {
        if let KeyValue::Literal(v) = value {
            if v.is_empty_key() {
                return Err(TableError::EmptyKeyValue {
                    field: field.clone(),
                });
            }
        }
    }

    let fields = key.field_names();
    let table_keys = schema.key_names();
    if fields == table_keys {
        return Ok(Lookup::Table);
    }

    let single = if fields.len() == 1 {
        fields.iter().next().copied()
    } else {
        None
    };

    if let Some(index) = schema
        .indexes
        .iter()
        .find(|index| fields == index.key_names() || single == Some(index.partition_key.as_str()))
    {
        return Ok(Lookup::Index(index));
    }

    let Some(field) = single else {
        return Err(TableError::KeyFieldsMismatch {
            got: fields.into_iter().map(str::to_string).collect(),
            expected: table_keys.into_iter().map(str::to_string).collect(),
        });
    };

    if field == schema.partition_key {
        if !many {
            return Err(TableError::MissingSortKey {
                sort_key: schema.sort_key.clone().unwrap_or_default(),
            });
        }
        return Ok(Lookup::Table);
    }

    Err(TableError::UnknownKeyField {
        field: field.to_string(),
    })
}
