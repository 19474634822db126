//! Local in-memory engine
//!
//! Implements the storage contract over plain record lists, reproducing the
//! remote store's ordering, filtering and pagination without an ordered index.
//!
//! ## Concurrency
//! One exclusive lock per engine guards every mutation and every multi-record
//! read, so each call sees one consistent state and read-modify-write
//! sequences (`update`) have a single linearization point. `get_item` and
//! `batch_get_item` take no lock of their own; they are layered on `query`,
//! which does.
//!
//! ## Pagination
//! There is no backend cursor, so each matching record gets a synthetic
//! position: the query's key fields plus either the sort-key value or, with
//! no sort key, its offset in the filtered sequence. A resumed query drops
//! every record at or before the incoming position under the current
//! direction, then applies `limit`.
//!
//! Index positions also carry the table key, which orders records sharing
//! a sort value, so a page boundary inside such a run loses nothing.
//!
//! Offset positions (no sort key, and `scan`) are only meaningful while no
//! write changes which records precede them. A write between two pages can
//! skip or repeat records.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::cancel::Cancel;
use crate::config::Config;
use crate::condition::{Condition, Key};
use crate::error::{Result, TableError};
use crate::update::Updates;
use crate::value::{Number, Record, Value};

use super::snapshot::{JsonFileSnapshot, SnapshotStore};
use super::{validate_only_sort_key, BatchPlan, BatchResult, IndexQuery, Page, Query, TableStorage};

/// Table name → records, in insertion order
pub type Tables = BTreeMap<String, Vec<Record>>;

/// Position field used when there is no sort key to order by
const OFFSET_FIELD: &str = "offset";

/// In-memory storage backend
pub struct LocalStorage {
    /// All tables; the engine-wide lock
    tables: Mutex<Tables>,

    /// Where state is persisted after each mutation, if anywhere
    snapshot: Option<Box<dyn SnapshotStore>>,
}

impl LocalStorage {
    /// Create an empty engine that lives only in memory
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::new()),
            snapshot: None,
        }
    }

    /// Create an engine from config (JSON snapshot file if one is configured)
    pub fn open(config: &Config) -> Self {
        match &config.snapshot_path {
            Some(path) => Self::with_snapshot(JsonFileSnapshot::new(path)),
            None => Self::new(),
        }
    }

    /// Create an engine backed by `store`.
    ///
    /// A missing or unreadable snapshot is logged and the engine starts
    /// empty; the next mutation overwrites the snapshot with a clean copy.
    pub fn with_snapshot(store: impl SnapshotStore + 'static) -> Self {
        let tables = match store.load() {
            Ok(Some(tables)) => {
                tracing::debug!(tables = tables.len(), "loaded snapshot");
                tables
            }
            Ok(None) => Tables::new(),
            Err(e) => {
                tracing::warn!(
                    "Error loading snapshot, the next write will overwrite it with a clean copy: {}",
                    e
                );
                Tables::new()
            }
        };

        Self {
            tables: Mutex::new(tables),
            snapshot: Some(Box::new(store)),
        }
    }

    /// Names of all tables holding (or having held) records
    pub fn table_names(&self) -> Vec<String> {
        self.tables.lock().keys().cloned().collect()
    }

    /// Write the state out (called with the lock held, so saves are ordered)
    fn persist(&self, tables: &Tables) {
        if let Some(store) = &self.snapshot {
            if let Err(e) = store.save(tables) {
                tracing::warn!("Failed to save snapshot: {}", e);
            }
        }
    }

    /// Run `query` against the table, or against `index` when querying one.
    ///
    /// An index with a sort key is sparse: records without that field are
    /// not in it.
    fn query_locked(
        tables: &Tables,
        table: &str,
        index: Option<&IndexQuery<'_>>,
        query: &Query<'_>,
    ) -> Result<Page> {
        validate_only_sort_key(query.key, query.sort_key)?;
        if query.limit == Some(0) {
            return Err(TableError::InvalidLimit(0));
        }
        let (literals, conditions) = query.key.split();
        let sparse_field = index.and(query.sort_key);

        let records = tables.get(table).map(Vec::as_slice).unwrap_or(&[]);
        let mut filtered: Vec<&Record> = records
            .iter()
            .filter(|r| sparse_field.map_or(true, |f| r.contains_key(f)))
            .filter(|r| query_matches(r, &literals, &conditions))
            .collect();

        let ordering = PositionOrdering::new(query, index);
        if ordering.sorted {
            // Stable; the table key breaks ties within an index
            filtered.sort_by(|a, b| ordering.sort_values(a).cmp(&ordering.sort_values(b)));
        }
        if query.reverse {
            filtered.reverse();
        }

        let positions: Vec<Record> = filtered
            .iter()
            .enumerate()
            .map(|(i, r)| ordering.position_of(i, r))
            .collect();

        let start = match query.pagination_token {
            Some(token) => {
                let token_key = ordering.orderable(token)?;
                let mut skipped = 0;
                for position in &positions {
                    if !ordering.before_or_equal(&ordering.orderable(position)?, &token_key) {
                        break;
                    }
                    skipped += 1;
                }
                skipped
            }
            None => 0,
        };

        let remaining = filtered.len() - start;
        let (end, next_position) = match query.limit {
            Some(limit) if limit < remaining => {
                let end = start + limit;
                (end, Some(positions[end - 1].clone()))
            }
            _ => (filtered.len(), None),
        };

        let records = filtered[start..end].iter().map(|r| (*r).clone()).collect();
        Ok(Page::new(records, next_position))
    }

    fn find_index(records: &[Record], key: &Record) -> Option<usize> {
        records.iter().position(|r| eq_matches(r, key))
    }
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStorage for LocalStorage {
    // Not locked here: query takes the lock
    fn get_item(&self, table: &str, key: &Record) -> Result<Option<Record>> {
        let key = Key::from(key);
        let page = self.query(table, &Query::new(&key))?;
        Ok(page.records.into_iter().next())
    }

    fn batch_get_item(
        &self,
        table: &str,
        keys: &BTreeMap<String, Record>,
        table_key_fields: &[String],
        cancel: &Cancel,
    ) -> Result<BatchResult> {
        let plan = BatchPlan::new(keys, table_key_fields)?;
        let mut found = BTreeMap::new();
        for key in &plan.unique_keys {
            if cancel.is_cancelled() {
                return Err(TableError::BatchGetCancelled { resolved: found });
            }
            if let Some(record) = self.get_item(table, key)? {
                for id in plan.ids_for(&record, table_key_fields) {
                    found.insert(id.clone(), record.clone());
                }
            }
        }
        Ok(plan.fan_out(&found))
    }

    fn query(&self, table: &str, query: &Query<'_>) -> Result<Page> {
        let tables = self.tables.lock();
        Self::query_locked(&tables, table, None, query)
    }

    fn query_index(&self, table: &str, index: &IndexQuery<'_>, query: &Query<'_>) -> Result<Page> {
        let page = {
            let tables = self.tables.lock();
            Self::query_locked(&tables, table, Some(index), query)?
        };
        if !index.keys_only {
            return Ok(page);
        }

        // The records here are complete; a real keys-only index would not
        // hold the other attributes, so drop them.
        let mut retain: Vec<&str> = query.key.iter().map(|(k, _)| k.as_str()).collect();
        retain.extend(query.sort_key);
        retain.extend(index.table_key_fields.iter().map(String::as_str));

        let records = page
            .records
            .into_iter()
            .map(|record| {
                record
                    .into_iter()
                    .filter(|(field, _)| retain.contains(&field.as_str()))
                    .collect()
            })
            .collect();
        Ok(Page::new(records, page.next_position))
    }

    fn put(&self, table: &str, key: &Record, record: &Record) -> Result<()> {
        let mut tables = self.tables.lock();
        let records = tables.entry(table.to_string()).or_default();
        match Self::find_index(records, key) {
            Some(i) => records[i] = record.clone(),
            None => records.push(record.clone()),
        }
        self.persist(&tables);
        Ok(())
    }

    fn update(&self, table: &str, key: &Record, updates: &Updates) -> Result<Record> {
        let mut tables = self.tables.lock();
        let records = tables.entry(table.to_string()).or_default();
        let index = Self::find_index(records, key);

        // Apply to a copy; the stored record only changes if every update applies
        let mut record = match index {
            Some(i) => records[i].clone(),
            None => key.clone(),
        };
        for (field, update) in updates {
            update.apply(&mut record, field)?;
        }

        match index {
            Some(i) => records[i] = record.clone(),
            None => records.push(record.clone()),
        }
        self.persist(&tables);
        Ok(record)
    }

    fn delete(&self, table: &str, key: &Record) -> Result<Option<Record>> {
        let mut tables = self.tables.lock();
        let removed = tables.get_mut(table).and_then(|records| {
            Self::find_index(records, key).map(|i| records.remove(i))
        });
        if removed.is_some() {
            self.persist(&tables);
        }
        Ok(removed)
    }

    fn scan(&self, table: &str, limit: Option<usize>, pagination_token: Option<&Record>) -> Result<Page> {
        if limit == Some(0) {
            return Err(TableError::InvalidLimit(0));
        }
        let tables = self.tables.lock();
        let records = tables.get(table).map(Vec::as_slice).unwrap_or(&[]);

        let start = match pagination_token {
            Some(token) => offset_from(token)?.min(records.len()),
            None => 0,
        };
        let remaining = &records[start..];

        let (items, next_position) = match limit {
            Some(limit) if limit < remaining.len() => {
                let mut next = Record::new();
                next.insert(OFFSET_FIELD.to_string(), Value::from((start + limit) as i64));
                (&remaining[..limit], Some(next))
            }
            _ => (remaining, None),
        };
        Ok(Page::new(items.to_vec(), next_position))
    }

    fn item_count(&self, table: &str) -> Result<u64> {
        let tables = self.tables.lock();
        Ok(tables.get(table).map(|r| r.len() as u64).unwrap_or(0))
    }
}

// =============================================================================
// Private Helpers
// =============================================================================

fn eq_matches(record: &Record, key: &Record) -> bool {
    key.iter().all(|(k, v)| record.get(k) == Some(v))
}

fn query_matches(record: &Record, literals: &Record, conditions: &BTreeMap<String, Condition>) -> bool {
    eq_matches(record, literals)
        && conditions
            .iter()
            .all(|(field, condition)| condition.matches(record.get(field)))
}

fn offset_from(token: &Record) -> Result<usize> {
    match token.get(OFFSET_FIELD) {
        Some(Value::Number(Number::Int(i))) if *i >= 0 => Ok(*i as usize),
        _ => Err(TableError::InvalidPaginationToken(format!(
            "expected a non-negative '{}' position",
            OFFSET_FIELD
        ))),
    }
}

/// How positions are built and compared for one query
struct PositionOrdering<'q> {
    /// Query key fields other than the ordering field, in name order
    partition_fields: Vec<&'q str>,

    /// Sort key, or the synthetic offset field
    second_field: &'q str,

    /// Table key fields ordering records with equal sort values (index queries)
    tie_fields: Vec<&'q str>,

    /// Whether `second_field` is a real sort key
    sorted: bool,

    /// Compare descending (only when reversing a sorted query)
    descending: bool,
}

impl<'q> PositionOrdering<'q> {
    fn new(query: &Query<'q>, index: Option<&IndexQuery<'q>>) -> Self {
        let second_field = query.sort_key.unwrap_or(OFFSET_FIELD);
        let partition_fields: Vec<&'q str> = query
            .key
            .iter()
            .map(|(k, _)| k.as_str())
            .filter(|k| *k != second_field)
            .collect();
        let tie_fields = match (index, query.sort_key) {
            (Some(index), Some(_)) => index
                .table_key_fields
                .iter()
                .map(String::as_str)
                .filter(|f| *f != second_field && !partition_fields.contains(f))
                .collect(),
            _ => Vec::new(),
        };
        Self {
            partition_fields,
            second_field,
            tie_fields,
            sorted: query.sort_key.is_some(),
            descending: query.reverse && query.sort_key.is_some(),
        }
    }

    /// (sort value, tie values...) of a record, for sorting
    fn sort_values<'r>(&self, record: &'r Record) -> Vec<Option<&'r Value>> {
        std::iter::once(&self.second_field)
            .chain(&self.tie_fields)
            .map(|f| record.get(*f))
            .collect()
    }

    fn position_of(&self, offset: usize, record: &Record) -> Record {
        let mut position: Record = self
            .partition_fields
            .iter()
            .filter_map(|f| record.get(*f).map(|v| (f.to_string(), v.clone())))
            .collect();
        let second = if self.sorted {
            record.get(self.second_field).cloned().unwrap_or(Value::Null)
        } else {
            Value::from(offset as i64)
        };
        position.insert(self.second_field.to_string(), second);
        for field in &self.tie_fields {
            let value = record.get(*field).cloned().unwrap_or(Value::Null);
            position.insert(field.to_string(), value);
        }
        position
    }

    /// (partition values..., second value, tie values...) for comparison
    fn orderable<'r>(&self, position: &'r Record) -> Result<Vec<&'r Value>> {
        self.partition_fields
            .iter()
            .chain(std::iter::once(&self.second_field))
            .chain(&self.tie_fields)
            .map(|field| {
                position.get(*field).ok_or_else(|| {
                    TableError::InvalidPaginationToken(format!(
                        "position is missing field '{}'",
                        field
                    ))
                })
            })
            .collect()
    }

    fn before_or_equal(&self, a: &[&Value], b: &[&Value]) -> bool {
        let ordering = a.cmp(b);
        if self.descending {
            ordering != Ordering::Less
        } else {
            ordering != Ordering::Greater
        }
    }
}
