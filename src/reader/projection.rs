use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

use super::plan::{FieldKind, SelectionPlan};
use crate::errors::EntityReaderError;
use crate::query_builder::Row;
use crate::resolver::{ResolutionContext, ResolutionRequest, TypedRow};
use crate::schema_catalog::ScalarType;

/// Convert a stored value to the declared scalar type
///
/// Values that cannot be converted project as `null`.
pub fn coerce(value: &Value, scalar_type: ScalarType) -> Value {
    let coerced = match (scalar_type, value) {
        (_, Value::Null) => return Value::Null,
        (ScalarType::Int, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .map(Value::from),
        (ScalarType::Int, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().map(|f| f.trunc() as i64))
            .map(Value::from),
        (ScalarType::Int, Value::Bool(b)) => Some(Value::from(*b as i64)),
        (ScalarType::Float, Value::Number(n)) => {
            n.as_f64().and_then(Number::from_f64).map(Value::Number)
        }
        (ScalarType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        (ScalarType::String, Value::String(s)) => Some(Value::String(s.clone())),
        (ScalarType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ScalarType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (ScalarType::Bool, Value::Bool(b)) => Some(Value::Bool(*b)),
        (ScalarType::Bool, Value::Number(n)) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
        (ScalarType::Bool, Value::String(s)) => match s.trim() {
            "" | "0" | "false" => Some(Value::Bool(false)),
            "1" | "true" => Some(Value::Bool(true)),
            _ => None,
        },
        _ => None,
    };

    coerced.unwrap_or_else(|| {
        log::debug!("Cannot coerce {} to {:?}, projecting null", value, scalar_type);
        Value::Null
    })
}

/// Project `rows` through `plan`, resolving relation fields batch-wise
///
/// Every relation field is resolved once for all rows of a type, then the
/// children of all parents are projected together, one level at a time.
pub fn project(
    rows: &[TypedRow],
    plan: &SelectionPlan<'_>,
    ctx: &mut ResolutionContext<'_>,
) -> Result<Vec<Value>, EntityReaderError> {
    let mut related: Vec<BTreeMap<usize, Value>> = vec![BTreeMap::new(); rows.len()];

    for (type_name, fields) in &plan.fields {
        let indexes: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| &row.type_name == type_name)
            .map(|(i, _)| i)
            .collect();
        if indexes.is_empty() {
            continue;
        }

        for (position, field) in fields.iter().enumerate() {
            let FieldKind::Relation(relation) = &field.kind else {
                continue;
            };
            let parent_rows: Vec<&Row> = indexes.iter().map(|&i| &rows[i].fields).collect();
            let request = ResolutionRequest {
                parent_type: relation.parent_type,
                property: relation.property,
                relation: relation.relation,
                parent_rows: &parent_rows,
                arguments: &relation.arguments,
            };
            let resolved = relation.resolver.resolve(&request, ctx)?;

            let mut children = Vec::new();
            let mut spans = Vec::with_capacity(indexes.len());
            for &i in &indexes {
                let start = children.len();
                let key = rows[i].key(&relation.parent_type.key_column);
                if let Some(list) = key.and_then(|key| resolved.get(&key)) {
                    children.extend(list.iter().cloned());
                }
                spans.push((i, start, children.len()));
            }

            let values = project(&children, &relation.selection, ctx)?;
            for (i, start, end) in spans {
                related[i].insert(position, Value::Array(values[start..end].to_vec()));
            }
        }
    }

    Ok(rows
        .iter()
        .zip(related)
        .map(|(row, mut related)| {
            let mut object = Map::new();
            for (position, field) in plan.fields_for(&row.type_name).iter().enumerate() {
                let value = match &field.kind {
                    FieldKind::Typename => Value::String(row.type_name.clone()),
                    FieldKind::Scalar {
                        column,
                        scalar_type,
                    } => coerce(row.get(column), *scalar_type),
                    FieldKind::Relation(_) => related
                        .remove(&position)
                        .unwrap_or_else(|| Value::Array(Vec::new())),
                };
                object.insert(field.response_key.clone(), value);
            }
            Value::Object(object)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(json!(3), ScalarType::Int, json!(3) ; "int stays int")]
    #[test_case(json!("42"), ScalarType::Int, json!(42) ; "numeric string to int")]
    #[test_case(json!(3.9), ScalarType::Int, json!(3) ; "float truncates")]
    #[test_case(json!("abc"), ScalarType::Int, Value::Null ; "garbage to null")]
    #[test_case(json!("-3.1415"), ScalarType::Float, json!(-3.1415) ; "string to float")]
    #[test_case(json!(1), ScalarType::String, json!("1") ; "number to string")]
    #[test_case(json!(0), ScalarType::Bool, json!(false) ; "zero is false")]
    #[test_case(json!("1"), ScalarType::Bool, json!(true) ; "one string is true")]
    #[test_case(Value::Null, ScalarType::String, Value::Null ; "null stays null")]
    fn test_coerce(value: Value, scalar_type: ScalarType, expected: Value) {
        assert_eq!(coerce(&value, scalar_type), expected);
    }
}
