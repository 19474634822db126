//! Wire types for the remote store
//!
//! Request/response shapes of the remote key-value store and the
//! [`DynamoClient`] trait a transport implements. Transport and
//! authentication live behind that trait.

use std::collections::BTreeMap;

use crate::error::{Result, TableError};
use crate::update::ActionKind;
use crate::value::{Number, Record, Value};

/// A typed attribute value as the remote store encodes it
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    S(String),
    /// Numbers travel as decimal strings
    N(String),
    Bool(bool),
    Null,
    L(Vec<AttributeValue>),
    M(BTreeMap<String, AttributeValue>),
    Ss(Vec<String>),
    Ns(Vec<String>),
}

/// A wire item: attribute name → typed value
pub type Item = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct GetItemRequest {
    pub table_name: String,
    pub key: Item,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchGetItemRequest {
    pub table_name: String,
    pub keys: Vec<Item>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetItemOutput {
    pub items: Vec<Item>,

    /// Keys the store did not get to (throttling); resubmit them
    pub unprocessed_keys: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table_name: String,
    pub index_name: Option<String>,
    pub key_condition_expression: String,
    pub expression_attribute_names: BTreeMap<String, String>,
    pub expression_attribute_values: Item,
    pub scan_index_forward: bool,
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub table_name: String,
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Item>,
}

/// Output of a query or scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PutItemRequest {
    pub table_name: String,
    pub item: Item,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeUpdate {
    pub action: ActionKind,
    pub value: Option<AttributeValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItemRequest {
    pub table_name: String,
    pub key: Item,
    pub attribute_updates: BTreeMap<String, AttributeUpdate>,

    /// Ask for the whole item as it is after the update
    pub return_all_new: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteItemRequest {
    pub table_name: String,
    pub key: Item,

    /// Ask for the item as it was before deletion
    pub return_old: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableDescription {
    pub item_count: u64,
}

/// A client for the remote store's calls
///
/// Implementations report throttling as [`TableError::Throttled`].
pub trait DynamoClient: Send + Sync {
    fn get_item(&self, request: GetItemRequest) -> Result<Option<Item>>;

    fn batch_get_item(&self, request: BatchGetItemRequest) -> Result<BatchGetItemOutput>;

    fn query(&self, request: QueryRequest) -> Result<QueryOutput>;

    fn scan(&self, request: ScanRequest) -> Result<QueryOutput>;

    fn put_item(&self, request: PutItemRequest) -> Result<()>;

    /// Returns the attributes requested by `return_all_new`
    fn update_item(&self, request: UpdateItemRequest) -> Result<Item>;

    /// Returns the old item if `return_old` was set and it existed
    fn delete_item(&self, request: DeleteItemRequest) -> Result<Option<Item>>;

    fn describe_table(&self, table_name: &str) -> Result<TableDescription>;
}

// =============================================================================
// Value Encoding
// =============================================================================

pub fn encode_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::List(items) => AttributeValue::L(items.iter().map(encode_value).collect()),
        Value::Map(map) => AttributeValue::M(encode_item(map)),
        Value::StringSet(set) => AttributeValue::Ss(set.iter().cloned().collect()),
        Value::NumberSet(set) => AttributeValue::Ns(set.iter().map(Number::to_string).collect()),
    }
}

pub fn decode_value(value: &AttributeValue) -> Result<Value> {
    Ok(match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::N(n) => Value::Number(parse_number(n)?),
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::L(items) => {
            Value::List(items.iter().map(decode_value).collect::<Result<Vec<_>>>()?)
        }
        AttributeValue::M(map) => Value::Map(decode_item(map)?),
        AttributeValue::Ss(set) => Value::StringSet(set.iter().cloned().collect()),
        AttributeValue::Ns(set) => {
            Value::NumberSet(set.iter().map(|n| parse_number(n)).collect::<Result<_>>()?)
        }
    })
}

pub fn encode_item(record: &Record) -> Item {
    record
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

pub fn decode_item(item: &Item) -> Result<Record> {
    item.iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect()
}

/// Decimal strings come back as integers when they have no fraction
fn parse_number(text: &str) -> Result<Number> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Number::Int(i));
    }
    text.parse::<f64>()
        .map(Number::Float)
        .map_err(|_| TableError::Serialization(format!("invalid number from backend: {}", text)))
}
