use serde_json::Value;
use std::cmp::Ordering;

use super::buffer::TypedRow;
use crate::expression::{OrderSpec, ResolvedField};
use crate::query_builder::SortDirection;

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order matching SQLite: NULL < boolean < number < string
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Value of `field` on `row`; NULL when the field belongs to another branch
fn term_value<'r>(row: &'r TypedRow, field: &ResolvedField) -> &'r Value {
    match field.column_for(&row.type_name) {
        Some(column) => row.get(column),
        None => &Value::Null,
    }
}

pub fn compare_rows(a: &TypedRow, b: &TypedRow, order: &OrderSpec) -> Ordering {
    for term in &order.terms {
        let ordering = compare_values(term_value(a, &term.field), term_value(b, &term.field));
        let ordering = match term.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Stable sort; rows equal under all terms keep their current order
pub fn sort_rows(rows: &mut [TypedRow], order: &OrderSpec) {
    if !order.is_empty() {
        rows.sort_by(|a, b| compare_rows(a, b, order));
    }
}

/// Stable sort by a synthetic column such as `__sorting`
pub fn sort_by_column(rows: &mut [TypedRow], column: &str) {
    rows.sort_by(|a, b| compare_values(a.get(column), b.get(column)));
}

pub fn apply_window(rows: &[TypedRow], limit: Option<u64>, offset: Option<u64>) -> Vec<TypedRow> {
    let offset = offset.unwrap_or(0) as usize;
    let limit = limit.map(|l| l as usize).unwrap_or(usize::MAX);
    rows.iter().skip(offset).take(limit).cloned().collect()
}
