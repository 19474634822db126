//! Table Module
//!
//! The top-level API over one table.
//!
//! ## Responsibilities
//! - Resolve key fragments to table or index access ([`crate::lookup`])
//! - Validate keys before any backend call
//! - Turn backend positions into portable page tokens and back
//! - Drive [`QueryCursor`]s for whole-result iteration
//! - Report timers and counters to the injected [`QueryObserver`]
//!
//! ```text
//! caller ──► Table ──► resolve ──► TableStorage ──► LocalStorage | RemoteStorage
//!              ▲                        │
//!              └── ResultPage ◄── token ◄┘ (position record)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backoff::ExponentialBackoff;
use crate::cancel::Cancel;
use crate::condition::Key;
use crate::cursor::QueryCursor;
use crate::error::{Result, TableError};
use crate::lookup::{resolve, Lookup};
use crate::observer::{NoopObserver, QueryObserver, Timed};
use crate::page::ResultPage;
use crate::schema::TableSchema;
use crate::storage::{BatchResult, IndexQuery, Query, TableStorage};
use crate::token::{decode_page_token, encode_page_token};
use crate::update::Updates;
use crate::value::Record;

/// Ordering and page size of a multi-record read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub reverse: bool,

    /// Records per page; `None` lets the backend decide
    pub limit: Option<usize>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Access to one table through a storage backend
pub struct Table {
    schema: TableSchema,
    storage: Arc<dyn TableStorage>,
    observer: Arc<dyn QueryObserver>,

    /// Template schedule for `del_many` rounds
    backoff: ExponentialBackoff,
}

impl Table {
    pub fn new(storage: Arc<dyn TableStorage>, schema: TableSchema) -> Self {
        Self {
            schema,
            storage,
            observer: Arc::new(NoopObserver),
            backoff: ExponentialBackoff::default(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn QueryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    fn count_call(&self, operation: &str) {
        self.observer
            .counter(&format!("{}:{}", operation, self.schema.name), 1);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get one record by its primary key or by an index key
    pub fn get(&self, key: &Key) -> Result<Option<Record>> {
        let _timed = Timed::start(&self.observer, "db_get");
        self.count_call("db_get");

        match resolve(&self.schema, key, false)? {
            Lookup::Table => {
                let record = self.literal_key(key, "get")?;
                self.storage.get_item(&self.schema.name, &record)
            }
            Lookup::Index(index) => {
                let table_key_fields = self.schema.key_fields();
                let index_query = IndexQuery {
                    index_name: &index.name,
                    keys_only: index.keys_only,
                    table_key_fields: &table_key_fields,
                };
                let query = Query {
                    sort_key: index.sort_key.as_deref(),
                    limit: Some(1),
                    ..Query::new(key)
                };
                let page = self
                    .storage
                    .query_index(&self.schema.name, &index_query, &query)?;
                Ok(page.records.into_iter().next())
            }
        }
    }

    /// Get many records by primary key; ids map to the record or `None`
    pub fn batch_get(&self, keys: &BTreeMap<String, Key>) -> Result<BatchResult> {
        self.batch_get_until(keys, &Cancel::never())
    }

    /// List form of [`Table::batch_get`]: results come back in input order
    pub fn batch_get_list(&self, keys: &[Key]) -> Result<Vec<Option<Record>>> {
        let ids: Vec<String> = (0..keys.len()).map(|i| format!("k{}", i)).collect();
        let by_id: BTreeMap<String, Key> = ids.iter().cloned().zip(keys.iter().cloned()).collect();
        let mut result = self.batch_get(&by_id)?;
        Ok(ids
            .iter()
            .map(|id| result.remove(id).flatten())
            .collect())
    }

    /// [`Table::batch_get`] that gives up once `cancel` fires.
    ///
    /// On cancellation the ids resolved so far come back in
    /// [`TableError::BatchGetCancelled`].
    pub fn batch_get_until(&self, keys: &BTreeMap<String, Key>, cancel: &Cancel) -> Result<BatchResult> {
        let _timed = Timed::start(&self.observer, "db_batch_get");
        self.count_call("db_batch_get");

        let mut records = BTreeMap::new();
        for (id, key) in keys {
            if let Lookup::Index(index) = resolve(&self.schema, key, false)? {
                return Err(TableError::IndexLookupNotAllowed {
                    operation: "batch_get".to_string(),
                    index: index.name.clone(),
                });
            }
            records.insert(id.clone(), self.literal_key(key, "batch_get")?);
        }
        if records.is_empty() {
            return Ok(BatchResult::new());
        }

        self.storage.batch_get_item(
            &self.schema.name,
            &records,
            &self.schema.key_fields(),
            cancel,
        )
    }

    /// Get one page of records matching a partition (or index) key
    pub fn get_many(
        &self,
        key: &Key,
        options: QueryOptions,
        pagination_token: Option<&str>,
    ) -> Result<ResultPage> {
        let _timed = Timed::start(&self.observer, "db_get_many");
        self.count_call("db_get_many");
        validate_limit(options.limit)?;

        let lookup = resolve(&self.schema, key, true)?;
        let position = decode_page_token(pagination_token)?;
        let table_key_fields = self.schema.key_fields();

        let page = match lookup {
            Lookup::Table => {
                let query = Query {
                    key,
                    sort_key: self.schema.sort_key.as_deref(),
                    reverse: options.reverse,
                    limit: options.limit,
                    pagination_token: position.as_ref(),
                };
                self.storage.query(&self.schema.name, &query)?
            }
            Lookup::Index(index) => {
                let index_query = IndexQuery {
                    index_name: &index.name,
                    keys_only: index.keys_only,
                    table_key_fields: &table_key_fields,
                };
                let query = Query {
                    key,
                    sort_key: index.sort_key.as_deref(),
                    reverse: options.reverse,
                    limit: options.limit,
                    pagination_token: position.as_ref(),
                };
                self.storage
                    .query_index(&self.schema.name, &index_query, &query)?
            }
        };

        self.observer
            .counter("db_get_many_items", page.records.len() as u64);
        tracing::debug!(
            table = %self.schema.name,
            records = page.records.len(),
            more = page.next_position.is_some(),
            "get_many"
        );
        let next_page_token = encode_page_token(page.next_position.as_ref())?;
        Ok(ResultPage::new(page.records, next_page_token))
    }

    /// Iterate over every record matching `key`, page by page.
    ///
    /// Iterating a large result takes a while; bound the loop with a deadline.
    pub fn get_all(&self, key: &Key, options: QueryOptions) -> QueryCursor<'_> {
        let key = key.clone();
        QueryCursor::new(move |token| self.get_many(&key, options, token))
    }

    /// [`Table::get_all`] continuing from a cursor resume token
    pub fn get_all_from(
        &self,
        key: &Key,
        options: QueryOptions,
        resume_token: Option<&str>,
    ) -> Result<QueryCursor<'_>> {
        let key = key.clone();
        QueryCursor::resume(move |token| self.get_many(&key, options, token), resume_token)
    }

    /// Read one page of the whole table
    pub fn scan(&self, limit: Option<usize>, pagination_token: Option<&str>) -> Result<ResultPage> {
        let _timed = Timed::start(&self.observer, "db_scan");
        self.count_call("db_scan");
        validate_limit(limit)?;

        let position = decode_page_token(pagination_token)?;
        let page = self
            .storage
            .scan(&self.schema.name, limit, position.as_ref())?;
        let next_page_token = encode_page_token(page.next_position.as_ref())?;
        Ok(ResultPage::new(page.records, next_page_token))
    }

    /// Iterate over the whole table
    pub fn scan_all(&self, limit: Option<usize>) -> QueryCursor<'_> {
        QueryCursor::new(move |token| self.scan(limit, token))
    }

    /// [`Table::scan_all`] continuing from a cursor resume token
    pub fn scan_all_from(
        &self,
        limit: Option<usize>,
        resume_token: Option<&str>,
    ) -> Result<QueryCursor<'_>> {
        QueryCursor::resume(move |token| self.scan(limit, token), resume_token)
    }

    pub fn item_count(&self) -> Result<u64> {
        let _timed = Timed::start(&self.observer, "db_describe");
        self.count_call("db_describe");
        self.storage.item_count(&self.schema.name)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store a complete record, replacing any record with the same key
    pub fn create(&self, record: Record) -> Result<Record> {
        let _timed = Timed::start(&self.observer, "db_create");
        let key = self.schema.extract_key(&record)?;
        self.count_call("db_create");

        self.storage.put(&self.schema.name, &key, &record)?;
        Ok(record)
    }

    /// Alias for [`Table::create`]
    pub fn put(&self, record: Record) -> Result<Record> {
        self.create(record)
    }

    /// Update select fields of the record at `key`, returning the record afterwards
    pub fn update(&self, key: &Key, updates: &Updates) -> Result<Record> {
        let _timed = Timed::start(&self.observer, "db_update");
        self.count_call("db_update");

        let key = self.schema.validate_key(key, "update")?;
        for (field, update) in updates {
            update.validate(field)?;
        }
        self.storage.update(&self.schema.name, &key, updates)
    }

    /// Delete the record at `key`, returning it if it existed
    pub fn delete(&self, key: &Key) -> Result<Option<Record>> {
        let _timed = Timed::start(&self.observer, "db_del");
        self.count_call("db_del");

        let key = self.schema.validate_key(key, "delete")?;
        self.storage.delete(&self.schema.name, &key)
    }

    /// Delete every record matching `key`, returning how many were deleted.
    ///
    /// There is no bulk delete in the store: matches are fetched and deleted
    /// one by one, re-querying until nothing matches. `cancel` is polled
    /// between rounds and between deletes.
    pub fn del_many(&self, key: &Key, cancel: &Cancel) -> Result<usize> {
        let _timed = Timed::start(&self.observer, "db_del_many");
        self.count_call("db_del_many");

        let mut deleted = 0;
        let mut backoff = self.backoff.clone();
        let mut to_delete = self.get_many(key, QueryOptions::default(), None)?;

        while !to_delete.is_empty() {
            for record in &to_delete {
                if cancel.is_cancelled() {
                    return Err(TableError::Cancelled { completed: deleted });
                }
                let record_key = self.schema.extract_key(record)?;
                if self.storage.delete(&self.schema.name, &record_key)?.is_some() {
                    deleted += 1;
                }
            }
            to_delete = self.get_many(key, QueryOptions::default(), None)?;
            backoff.sleep_when(!to_delete.is_empty());
        }

        tracing::debug!(table = %self.schema.name, deleted, "del_many");
        Ok(deleted)
    }

    /// Literal record of `key`, rejecting predicates
    fn literal_key(&self, key: &Key, operation: &str) -> Result<Record> {
        key.to_record().ok_or_else(|| TableError::PredicateNotAllowed {
            operation: operation.to_string(),
            fields: key.predicate_fields(),
        })
    }
}

fn validate_limit(limit: Option<usize>) -> Result<()> {
    match limit {
        Some(0) => Err(TableError::InvalidLimit(0)),
        _ => Ok(()),
    }
}
