//! Relations stored in an association ("MM") table.
//!
//! ```text
//! SELECT target.<columns>, mm.uid_local AS __uid_local, mm.sorting AS __sorting
//! FROM target
//! INNER JOIN mm ON mm.uid_foreign = target.uid [AND mm.tablenames = 'target'] [AND match fields]
//! WHERE mm.uid_local IN (<parent keys>) AND <access> AND <filter>
//! ORDER BY <order terms>, mm.sorting, target.uid
//! ```
//!
//! One such query runs per target table. Rows of several tables are merged by
//! the association sorting value.

use super::buffer::{row_key, Buffer, TypedRow};
use super::{
    order_by_key, order_by_terms, ordering, restrict, select_storage_columns, ResolutionContext,
    ResolutionRequest, SORTING, UID_LOCAL,
};
use crate::errors::EntityReaderError;
use crate::query_builder::{ColumnRef, Condition, Literal, Row, SelectQuery, SortDirection};
use crate::schema_catalog::{AssociationTable, EntityType};

pub fn build_query(
    request: &ResolutionRequest<'_>,
    ctx: &ResolutionContext<'_>,
    keys: &[Literal],
    target: &EntityType,
    mm: &AssociationTable,
) -> SelectQuery {
    let mm_column = |column: &str| ColumnRef::new(&mm.table, column);

    let mut query = SelectQuery::from(&target.table);
    select_storage_columns(&mut query, target);
    query.select_as(mm_column(&mm.local_column), UID_LOCAL);
    if let Some(sorting) = &mm.sorting {
        query.select_as(mm_column(sorting), SORTING);
    }

    let mut on = vec![Condition::eq_column(
        mm_column(&mm.foreign_column),
        query.column(&target.key_column),
    )];
    if let Some(discriminator) = &mm.discriminator {
        on.push(Condition::eq_value(
            mm_column(discriminator),
            Literal::String(target.table.clone()),
        ));
    }
    for (column, value) in &mm.match_fields {
        on.push(Condition::eq_value(mm_column(column), value.clone()));
    }
    query.inner_join(&mm.table, &mm.table, on);

    query.and_where(Condition::In {
        column: mm_column(&mm.local_column),
        values: keys.to_vec(),
    });
    restrict(
        &mut query,
        target,
        request.arguments.filter.as_ref(),
        &ctx.access,
    );

    order_by_terms(&mut query, target, request.arguments.order.as_ref());
    if let Some(sorting) = &mm.sorting {
        query.order_by(mm_column(sorting), SortDirection::Ascending);
    }
    order_by_key(&mut query, target);
    query
}

pub fn fetch(
    request: &ResolutionRequest<'_>,
    ctx: &ResolutionContext<'_>,
    parents: &[(i64, &Row)],
    targets: &[&EntityType],
    mm: &AssociationTable,
) -> Result<Buffer, EntityReaderError> {
    let keys: Vec<Literal> = parents.iter().map(|(key, _)| Literal::Int(*key)).collect();

    let mut buffer = Buffer::default();
    for target in targets {
        let query = build_query(request, ctx, &keys, target, mm);
        for row in ctx.execute(&query)? {
            if let Some(parent) = row_key(&row, UID_LOCAL) {
                buffer.append(parent, TypedRow::new(&target.name, row));
            }
        }
    }

    if targets.len() > 1 && mm.sorting.is_some() {
        for rows in buffer.rows_mut() {
            ordering::sort_by_column(rows, SORTING);
        }
    }
    Ok(buffer)
}
