//! Relations whose child rows carry the parent key in one of their columns.

use super::buffer::{row_key, Buffer, TypedRow};
use super::{
    order_by_key, order_by_terms, restrict, select_storage_columns, ResolutionContext,
    ResolutionRequest, PARENT_KEY,
};
use crate::errors::EntityReaderError;
use crate::query_builder::{Condition, Literal, Row, SelectQuery, SortDirection};
use crate::schema_catalog::{EntityType, MatchFields};

/// Child-side columns pointing back to the parent
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey<'a> {
    pub field: &'a str,
    /// Column on the child that must hold the parent's table name
    pub table_field: Option<&'a str>,
    pub match_fields: &'a MatchFields,
}

pub fn build_query(
    request: &ResolutionRequest<'_>,
    ctx: &ResolutionContext<'_>,
    keys: &[Literal],
    target: &EntityType,
    foreign_key: &ForeignKey<'_>,
) -> SelectQuery {
    let mut query = SelectQuery::from(&target.table);
    select_storage_columns(&mut query, target);
    let parent_column = query.column(foreign_key.field);
    query.select_as(parent_column.clone(), PARENT_KEY);

    query.and_where(Condition::In {
        column: parent_column,
        values: keys.to_vec(),
    });
    if let Some(table_field) = foreign_key.table_field {
        let column = query.column(table_field);
        query.and_where(Condition::eq_value(
            column,
            Literal::String(request.parent_type.table.clone()),
        ));
    }
    for (column, value) in foreign_key.match_fields {
        let column = query.column(column);
        query.and_where(Condition::eq_value(column, value.clone()));
    }
    restrict(
        &mut query,
        target,
        request.arguments.filter.as_ref(),
        &ctx.access,
    );

    order_by_terms(&mut query, target, request.arguments.order.as_ref());
    if let Some(sorting) = &request.relation.sorting_field {
        let column = query.column(sorting);
        query.order_by(column, SortDirection::Ascending);
    }
    order_by_key(&mut query, target);
    query
}

pub fn fetch(
    request: &ResolutionRequest<'_>,
    ctx: &ResolutionContext<'_>,
    parents: &[(i64, &Row)],
    targets: &[&EntityType],
    foreign_key: &ForeignKey<'_>,
) -> Result<Buffer, EntityReaderError> {
    let keys: Vec<Literal> = parents.iter().map(|(key, _)| Literal::Int(*key)).collect();

    let mut buffer = Buffer::default();
    for target in targets {
        let query = build_query(request, ctx, &keys, target, foreign_key);
        for row in ctx.execute(&query)? {
            match row_key(&row, PARENT_KEY) {
                Some(parent) => buffer.append(parent, TypedRow::new(&target.name, row)),
                None => log::warn!(
                    "Skipping {} row without parent key in `{}`",
                    target.name,
                    foreign_key.field
                ),
            }
        }
    }
    Ok(buffer)
}
