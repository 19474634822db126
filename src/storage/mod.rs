//! Storage Module
//!
//! The operation set every backend implements, plus helpers shared by the
//! backends.
//!
//! ## Backends
//! - [`LocalStorage`]: process memory, optional JSON snapshot file
//! - [`RemoteStorage`]: translation onto a [`DynamoClient`] wire client
//!
//! ## Pagination
//! Backends speak in *positions*: the record-shaped key of the last item on
//! a page. A position is opaque above this layer; the table façade only
//! turns it into a portable string (see [`crate::token`]).
//!
//! ## Ordering
//! With a sort key, results come back ascending by that field (descending
//! when `reverse`). Without one, any order is fine as long as it is stable
//! across the pages of one query. `limit` bounds one page, never the total.

mod local;
mod snapshot;
pub mod remote;

pub use local::{LocalStorage, Tables};
pub use remote::{DynamoClient, RemoteStorage};
pub use snapshot::{JsonFileSnapshot, SnapshotStore};

use std::collections::BTreeMap;

use crate::cancel::Cancel;
use crate::condition::Key;
use crate::error::{Result, TableError};
use crate::update::Updates;
use crate::value::Record;

/// id → record (or `None` when no record has that key)
pub type BatchResult = BTreeMap<String, Option<Record>>;

/// One page as a backend returns it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,

    /// Position of the last record when more may follow
    pub next_position: Option<Record>,
}

impl Page {
    pub fn new(records: Vec<Record>, next_position: Option<Record>) -> Self {
        Self {
            records,
            next_position,
        }
    }
}

/// Parameters of a `query` / `query_index` call
#[derive(Debug, Clone, Copy)]
pub struct Query<'a> {
    /// Key fragment: equality literals, plus at most a predicate on `sort_key`
    pub key: &'a Key,

    /// Field that orders results and may carry a predicate
    pub sort_key: Option<&'a str>,

    pub reverse: bool,

    pub limit: Option<usize>,

    /// Resume strictly after this position
    pub pagination_token: Option<&'a Record>,
}

impl<'a> Query<'a> {
    pub fn new(key: &'a Key) -> Self {
        Self {
            key,
            sort_key: None,
            reverse: false,
            limit: None,
            pagination_token: None,
        }
    }
}

/// Index-specific parameters of a `query_index` call
#[derive(Debug, Clone, Copy)]
pub struct IndexQuery<'a> {
    pub index_name: &'a str,

    /// Index projects key attributes only
    pub keys_only: bool,

    /// Key fields of the underlying table (always projected)
    pub table_key_fields: &'a [String],
}

/// The storage contract
///
/// Implementations must be interchangeable: same ordering, filtering and
/// pagination behavior for the same calls.
pub trait TableStorage: Send + Sync {
    /// Fetch one record by its full primary key
    fn get_item(&self, table: &str, key: &Record) -> Result<Option<Record>>;

    /// Fetch many records by full primary key.
    ///
    /// Ids that name the same key are fetched once and share the result.
    /// `cancel` is polled between backend round-trips.
    fn batch_get_item(
        &self,
        table: &str,
        keys: &BTreeMap<String, Record>,
        table_key_fields: &[String],
        cancel: &Cancel,
    ) -> Result<BatchResult>;

    /// Query the table by partition (and optionally a sort-key predicate)
    fn query(&self, table: &str, query: &Query<'_>) -> Result<Page>;

    /// Query a secondary index
    fn query_index(&self, table: &str, index: &IndexQuery<'_>, query: &Query<'_>) -> Result<Page>;

    /// Store a complete record under `key`, replacing any previous one
    fn put(&self, table: &str, key: &Record, record: &Record) -> Result<()>;

    /// Apply `updates` to the record at `key` (creating it from the key if
    /// absent) and return the record as it is afterwards
    fn update(&self, table: &str, key: &Record, updates: &Updates) -> Result<Record>;

    /// Remove the record at `key`, returning it if it existed
    fn delete(&self, table: &str, key: &Record) -> Result<Option<Record>>;

    /// Read the table in storage order
    fn scan(&self, table: &str, limit: Option<usize>, pagination_token: Option<&Record>) -> Result<Page>;

    /// Number of records in the table
    fn item_count(&self, table: &str) -> Result<u64>;
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Check that only `sort_key` carries a predicate in `key`
pub fn validate_only_sort_key(key: &Key, sort_key: Option<&str>) -> Result<()> {
    let offending: Vec<String> = key
        .predicate_fields()
        .into_iter()
        .filter(|field| Some(field.as_str()) != sort_key)
        .collect();
    if !offending.is_empty() {
        return Err(TableError::ConditionOnNonSortKey {
            sort_key: sort_key.map(str::to_string),
            fields: offending,
        });
    }
    Ok(())
}

/// Keep only `fields` of `record`; `None` if any of them is missing
pub fn project_key(record: &Record, fields: &[String]) -> Option<Record> {
    fields
        .iter()
        .map(|f| record.get(f).map(|v| (f.clone(), v.clone())))
        .collect()
}

/// Deduplicated batch read: unique keys plus the ids that asked for each
#[derive(Debug, Default)]
pub struct BatchPlan {
    /// Unique keys, in first-requested order
    pub unique_keys: Vec<Record>,

    ids_by_key: BTreeMap<Record, Vec<String>>,

    all_ids: Vec<String>,
}

impl BatchPlan {
    pub fn new(keys: &BTreeMap<String, Record>, table_key_fields: &[String]) -> Result<Self> {
        let mut plan = BatchPlan::default();
        for (id, key) in keys {
            let key = project_key(key, table_key_fields).ok_or_else(|| {
                let missing = table_key_fields
                    .iter()
                    .find(|f| !key.contains_key(f.as_str()))
                    .cloned()
                    .unwrap_or_default();
                TableError::MissingKeyField { field: missing }
            })?;
            let ids = plan.ids_by_key.entry(key.clone()).or_default();
            if ids.is_empty() {
                plan.unique_keys.push(key);
            }
            ids.push(id.clone());
            plan.all_ids.push(id.clone());
        }
        Ok(plan)
    }

    /// Ids that requested the key of `record`
    pub fn ids_for(&self, record: &Record, table_key_fields: &[String]) -> &[String] {
        project_key(record, table_key_fields)
            .and_then(|key| self.ids_by_key.get(&key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Fan found records out to every requesting id; unmatched ids get `None`
    pub fn fan_out(&self, found: &BTreeMap<String, Record>) -> BatchResult {
        self.all_ids
            .iter()
            .map(|id| (id.clone(), found.get(id).cloned()))
            .collect()
    }
}
