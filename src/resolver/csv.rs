//! Relations stored as a comma-separated list of child keys on the parent row.
//!
//! Items are either bare keys (`12,14`), pointing into the first target table,
//! or table-prefixed keys (`pages_12,tt_content_14`) for group relations.
//! Children keep the order of the list unless an order argument is given.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::buffer::{row_key, Buffer, TypedRow};
use super::{order_by_key, restrict, select_storage_columns, ResolutionContext, ResolutionRequest};
use crate::errors::EntityReaderError;
use crate::query_builder::{Condition, Literal, Row, SelectQuery};
use crate::schema_catalog::EntityType;

lazy_static! {
    static ref GROUP_ITEM: Regex = Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)_(\d+)$").unwrap();
}

/// One decoded list item: index into the relation targets plus child key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvItem {
    pub target: usize,
    pub key: i64,
}

/// Decode the stored list; unknown tables and garbage items are skipped
pub fn decode(value: &Value, targets: &[&EntityType]) -> Vec<CsvItem> {
    let text = match value {
        Value::Null => return Vec::new(),
        Value::String(s) => s.clone(),
        // REAL columns holding a single key come back as `3.0`
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(key), _) => key.to_string(),
            (None, Some(f)) if f.fract() == 0.0 => (f as i64).to_string(),
            _ => n.to_string(),
        },
        other => {
            log::warn!("Ignoring non-list relation value {}", other);
            return Vec::new();
        }
    };

    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| {
            if let Ok(key) = item.parse::<i64>() {
                return Some(CsvItem { target: 0, key });
            }
            let decoded = GROUP_ITEM.captures(item).and_then(|captures| {
                let table = &captures[1];
                let key = captures[2].parse::<i64>().ok()?;
                let target = targets.iter().position(|t| t.table == table)?;
                Some(CsvItem { target, key })
            });
            if decoded.is_none() {
                log::warn!("Skipping relation list item `{}`", item);
            }
            decoded
        })
        .collect()
}

pub fn build_query(
    request: &ResolutionRequest<'_>,
    ctx: &ResolutionContext<'_>,
    keys: &BTreeSet<i64>,
    target: &EntityType,
) -> SelectQuery {
    let mut query = SelectQuery::from(&target.table);
    select_storage_columns(&mut query, target);
    let key_column = query.column(&target.key_column);
    query.and_where(Condition::In {
        column: key_column,
        values: keys.iter().map(|key| Literal::Int(*key)).collect(),
    });
    restrict(
        &mut query,
        target,
        request.arguments.filter.as_ref(),
        &ctx.access,
    );
    order_by_key(&mut query, target);
    query
}

pub fn fetch(
    request: &ResolutionRequest<'_>,
    ctx: &ResolutionContext<'_>,
    parents: &[(i64, &Row)],
    targets: &[&EntityType],
) -> Result<Buffer, EntityReaderError> {
    let column = &request.property.column;
    let lists: Vec<(i64, Vec<CsvItem>)> = parents
        .iter()
        .map(|(key, row)| (*key, decode(row.get(column).unwrap_or(&Value::Null), targets)))
        .collect();

    let mut wanted: Vec<BTreeSet<i64>> = vec![BTreeSet::new(); targets.len()];
    for item in lists.iter().flat_map(|(_, items)| items) {
        wanted[item.target].insert(item.key);
    }

    let mut fetched: BTreeMap<(usize, i64), TypedRow> = BTreeMap::new();
    for (index, target) in targets.iter().enumerate() {
        if wanted[index].is_empty() {
            continue;
        }
        let query = build_query(request, ctx, &wanted[index], target);
        for row in ctx.execute(&query)? {
            if let Some(key) = row_key(&row, &target.key_column) {
                fetched.insert((index, key), TypedRow::new(&target.name, row));
            }
        }
    }

    let mut buffer = Buffer::default();
    for (parent, items) in lists {
        buffer.ensure(parent);
        for item in items {
            if let Some(row) = fetched.get(&(item.target, item.key)) {
                buffer.append(parent, row.clone());
            }
        }
    }
    Ok(buffer)
}
