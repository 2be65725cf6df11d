//! Records and their node payload
//!
//! A record node stores the key column encoding as the tree key, followed by
//! every non-key column in schema order.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::ByteReader;
use crate::column::Value;
use crate::error::{AtlasError, Result};

use super::spec::TableSpec;

/// A column name → value mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set)
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column, returning the previous value
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(column.into(), value.into())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.values.iter()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.values
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

// =============================================================================
// Payload Codec
// =============================================================================

/// Reject record columns the table does not have
pub(crate) fn check_columns(spec: &TableSpec, record: &Record) -> Result<()> {
    match record.column_names().find(|name| spec.column(name).is_none()) {
        Some(unknown) => Err(AtlasError::UnknownColumn(format!("{}.{}", spec.name(), unknown))),
        None => Ok(()),
    }
}

/// Encode the non-key columns of `record` in schema order
///
/// Every non-key column must be present; the key column is ignored.
pub(crate) fn encode_columns(spec: &TableSpec, record: &Record) -> Result<Vec<u8>> {
    check_columns(spec, record)?;
    let mut buf = Vec::new();
    for column in spec.columns() {
        let value = record
            .get(column.name())
            .ok_or_else(|| {
                AtlasError::MissingColumn(format!("{}.{}", spec.name(), column.name()))
            })?;
        column.encode(value, &mut buf)?;
    }
    Ok(buf)
}

/// Rebuild a record from its key and the node value bytes
pub(crate) fn decode_record(spec: &TableSpec, key: Value, value: &[u8]) -> Result<Record> {
    let mut reader = ByteReader::new(value);
    let mut record = Record::new();
    record.set(spec.key_column().name(), key);
    for column in spec.columns() {
        let value = column.decode(&mut reader)?;
        record.set(column.name(), value);
    }
    Ok(record)
}
