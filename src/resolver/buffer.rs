use serde_json::Value;
use std::collections::BTreeMap;

use crate::query_builder::Row;

/// A fetched row tagged with the entity type it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRow {
    pub type_name: String,
    pub fields: Row,
}

impl TypedRow {
    pub fn new(type_name: &str, fields: Row) -> Self {
        TypedRow {
            type_name: type_name.to_string(),
            fields,
        }
    }

    pub fn get(&self, column: &str) -> &Value {
        self.fields.get(column).unwrap_or(&Value::Null)
    }

    pub fn key(&self, column: &str) -> Option<i64> {
        row_key(&self.fields, column)
    }
}

/// Integer key stored in `column`; numeric strings are accepted
pub fn row_key(row: &Row, column: &str) -> Option<i64> {
    match row.get(column)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Child rows of one relation, grouped by parent key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buffer {
    entries: BTreeMap<i64, Vec<TypedRow>>,
}

impl Buffer {
    /// Make `parent` known even if it ends up without children
    pub fn ensure(&mut self, parent: i64) {
        self.entries.entry(parent).or_default();
    }

    pub fn append(&mut self, parent: i64, row: TypedRow) {
        self.entries.entry(parent).or_default().push(row);
    }

    pub fn rows(&self, parent: i64) -> &[TypedRow] {
        self.entries.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut Vec<TypedRow>> {
        self.entries.values_mut()
    }

    /// Take over the entries of `other`; existing parents are kept
    pub fn merge(&mut self, other: Buffer) {
        for (parent, rows) in other.entries {
            self.entries.entry(parent).or_insert(rows);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
