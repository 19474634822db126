//! Remote backend adapter
//!
//! Implements the storage contract by translating each call into the remote
//! store's requests through a [`DynamoClient`].
//!
//! ## Translation
//! - key fragments become key-condition expressions; every field name goes
//!   through a `#field` placeholder
//! - `reverse` becomes `scan_index_forward = false`
//! - positions travel as `exclusive_start_key` / `last_evaluated_key`
//! - `keys_only` is ignored: a real keys-only index simply has no other attributes
//!
//! ## Batch Reads
//! Duplicate keys are fetched once. Keys go out in chunks; keys the store
//! leaves unprocessed are resubmitted with exponential backoff until every
//! key is resolved or the caller's [`Cancel`] fires.

mod wire;

pub use wire::{
    decode_item, decode_value, encode_item, encode_value, AttributeUpdate, AttributeValue,
    BatchGetItemOutput, BatchGetItemRequest, DeleteItemRequest, DynamoClient, GetItemRequest, Item,
    PutItemRequest, QueryOutput, QueryRequest, ScanRequest, TableDescription, UpdateItemRequest,
};

use std::collections::{BTreeMap, VecDeque};

use crate::backoff::ExponentialBackoff;
use crate::cancel::Cancel;
use crate::config::Config;
use crate::condition::Key;
use crate::error::{Result, TableError};
use crate::update::Updates;
use crate::value::Record;

use super::{validate_only_sort_key, BatchPlan, BatchResult, IndexQuery, Page, Query, TableStorage};

/// Storage backend talking to the remote store
pub struct RemoteStorage<C: DynamoClient> {
    client: C,
    config: Config,
}

/// Rendered key condition of a query
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    pub expression: String,
    pub names: BTreeMap<String, String>,
    pub values: Item,
}

impl<C: DynamoClient> RemoteStorage<C> {
    pub fn new(client: C, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { client, config })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Physical table name (`{prefix}-{name}` when a prefix is configured)
    pub fn physical_name(&self, table: &str) -> String {
        if self.config.table_prefix.is_empty() {
            table.to_string()
        } else {
            format!("{}-{}", self.config.table_prefix, table)
        }
    }

    fn run_query(
        &self,
        table: &str,
        index_name: Option<&str>,
        query: &Query<'_>,
    ) -> Result<Page> {
        let condition = key_condition(query.key, query.sort_key)?;
        let request = QueryRequest {
            table_name: self.physical_name(table),
            index_name: index_name.map(str::to_string),
            key_condition_expression: condition.expression,
            expression_attribute_names: condition.names,
            expression_attribute_values: condition.values,
            scan_index_forward: !query.reverse,
            limit: query.limit,
            exclusive_start_key: query.pagination_token.map(encode_item),
        };
        tracing::trace!(table, index = ?index_name, "remote query");
        page_from(self.client.query(request)?)
    }
}

/// Render a key fragment as a key-condition expression
///
/// Equality terms come first (in field-name order), then the predicate.
pub fn key_condition(key: &Key, sort_key: Option<&str>) -> Result<KeyCondition> {
    validate_only_sort_key(key, sort_key)?;
    let (literals, conditions) = key.split();

    let expression = literals
        .keys()
        .map(|field| format!("#{f} = :{f}", f = field))
        .chain(conditions.iter().map(|(field, c)| c.expression(field)))
        .collect::<Vec<_>>()
        .join(" AND ");

    let mut values: Item = literals
        .iter()
        .map(|(field, v)| (format!(":{}", field), encode_value(v)))
        .collect();
    for (field, condition) in &conditions {
        for (placeholder, v) in condition.expression_values(field) {
            values.insert(placeholder, encode_value(&v));
        }
    }

    let names = key
        .iter()
        .map(|(field, _)| (format!("#{}", field), field.clone()))
        .collect();

    Ok(KeyCondition {
        expression,
        names,
        values,
    })
}

fn page_from(output: QueryOutput) -> Result<Page> {
    let records = output
        .items
        .iter()
        .map(decode_item)
        .collect::<Result<Vec<_>>>()?;
    let next_position = match &output.last_evaluated_key {
        Some(key) if !key.is_empty() => Some(decode_item(key)?),
        _ => None,
    };
    Ok(Page::new(records, next_position))
}

impl<C: DynamoClient> TableStorage for RemoteStorage<C> {
    fn get_item(&self, table: &str, key: &Record) -> Result<Option<Record>> {
        let item = self.client.get_item(GetItemRequest {
            table_name: self.physical_name(table),
            key: encode_item(key),
        })?;
        item.as_ref().map(decode_item).transpose()
    }

    fn batch_get_item(
        &self,
        table: &str,
        keys: &BTreeMap<String, Record>,
        table_key_fields: &[String],
        cancel: &Cancel,
    ) -> Result<BatchResult> {
        let plan = BatchPlan::new(keys, table_key_fields)?;
        let table_name = self.physical_name(table);
        let chunk_size = self.config.batch_get_chunk_size;

        let mut to_query: VecDeque<Item> = plan.unique_keys.iter().map(encode_item).collect();
        let mut next_query: Vec<Item> = Vec::new();
        let fill = |next: &mut Vec<Item>, pending: &mut VecDeque<Item>| {
            while next.len() < chunk_size {
                match pending.pop_front() {
                    Some(key) => next.push(key),
                    None => break,
                }
            }
        };
        fill(&mut next_query, &mut to_query);

        let mut found: BTreeMap<String, Record> = BTreeMap::new();
        let mut backoff = ExponentialBackoff::from_config(&self.config);

        while !next_query.is_empty() {
            if cancel.is_cancelled() {
                tracing::debug!(resolved = found.len(), "batch read cancelled");
                return Err(TableError::BatchGetCancelled { resolved: found });
            }

            let request = BatchGetItemRequest {
                table_name: table_name.clone(),
                keys: next_query.clone(),
            };
            let output = match self.client.batch_get_item(request) {
                Ok(output) => output,
                Err(TableError::Throttled(reason)) => {
                    tracing::debug!(%reason, keys = next_query.len(), "batch read throttled");
                    backoff.sleep();
                    continue;
                }
                Err(e) => return Err(e),
            };

            for item in &output.items {
                let record = decode_item(item)?;
                for id in plan.ids_for(&record, table_key_fields) {
                    found.insert(id.clone(), record.clone());
                }
            }

            // Partial results are expected; resubmit what was left over
            next_query = output.unprocessed_keys;
            backoff.sleep_when(!next_query.is_empty());
            fill(&mut next_query, &mut to_query);
        }

        Ok(plan.fan_out(&found))
    }

    fn query(&self, table: &str, query: &Query<'_>) -> Result<Page> {
        self.run_query(table, None, query)
    }

    fn query_index(&self, table: &str, index: &IndexQuery<'_>, query: &Query<'_>) -> Result<Page> {
        self.run_query(table, Some(index.index_name), query)
    }

    fn put(&self, table: &str, _key: &Record, record: &Record) -> Result<()> {
        self.client.put_item(PutItemRequest {
            table_name: self.physical_name(table),
            item: encode_item(record),
        })
    }

    fn update(&self, table: &str, key: &Record, updates: &Updates) -> Result<Record> {
        let attribute_updates = updates
            .iter()
            .map(|(field, update)| {
                let action = update.to_action();
                (
                    field.clone(),
                    AttributeUpdate {
                        action: action.action,
                        value: action.value.as_ref().map(encode_value),
                    },
                )
            })
            .collect();

        let attributes = self.client.update_item(UpdateItemRequest {
            table_name: self.physical_name(table),
            key: encode_item(key),
            attribute_updates,
            return_all_new: true,
        })?;
        decode_item(&attributes)
    }

    fn delete(&self, table: &str, key: &Record) -> Result<Option<Record>> {
        let old = self.client.delete_item(DeleteItemRequest {
            table_name: self.physical_name(table),
            key: encode_item(key),
            return_old: true,
        })?;
        old.as_ref().map(decode_item).transpose()
    }

    fn scan(&self, table: &str, limit: Option<usize>, pagination_token: Option<&Record>) -> Result<Page> {
        let output = self.client.scan(ScanRequest {
            table_name: self.physical_name(table),
            limit,
            exclusive_start_key: pagination_token.map(encode_item),
        })?;
        page_from(output)
    }

    fn item_count(&self, table: &str) -> Result<u64> {
        Ok(self.client.describe_table(&self.physical_name(table))?.item_count)
    }
}
