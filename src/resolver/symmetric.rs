//! Symmetric relations between rows of one table, stored in a pairing table.
//!
//! A pairing row `(local, peer)` relates both rows to each other, so a parent
//! finds its peers on either side of the pairing. Both sides are fetched with a
//! single query:
//!
//! ```text
//! SELECT t.<columns>, p.local AS __uid_local, p.peer AS __uid_peer,
//!        p.sorting AS __sorting, p.sorting_opposite AS __sorting_opposite
//! FROM t INNER JOIN p ON (p.peer = t.uid OR p.local = t.uid)
//! WHERE (p.local IN (<keys>) OR p.peer IN (<keys>)) AND <access> AND <filter>
//! ORDER BY <order terms>, p.sorting, t.uid
//! ```
//!
//! Rows reached from the peer side are ordered by the opposite sorting column
//! when one is declared.

use serde_json::Value;
use std::collections::BTreeSet;

use super::buffer::{row_key, Buffer, TypedRow};
use super::ordering::sort_by_column;
use super::{
    order_by_key, order_by_terms, restrict, select_storage_columns, ResolutionContext,
    ResolutionRequest, SORTING, UID_LOCAL, UID_PEER,
};
use crate::errors::EntityReaderError;
use crate::query_builder::{ColumnRef, Condition, Literal, Row, SelectQuery, SortDirection};
use crate::schema_catalog::EntityType;

/// Synthetic column carrying the sorting value of the peer side
pub const SORTING_OPPOSITE: &str = "__sorting_opposite";

#[derive(Debug, Clone, Copy)]
pub struct PairingTable<'a> {
    pub table: &'a str,
    pub local_field: &'a str,
    pub peer_field: &'a str,
    pub sorting: Option<&'a str>,
    pub sorting_opposite: Option<&'a str>,
}

impl PairingTable<'_> {
    fn column(&self, column: &str) -> ColumnRef {
        ColumnRef::new(self.table, column)
    }
}

/// Side of the pairing row the parent sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Local,
    Peer,
}

pub fn build_query(
    request: &ResolutionRequest<'_>,
    ctx: &ResolutionContext<'_>,
    keys: &[Literal],
    target: &EntityType,
    pairing: &PairingTable<'_>,
) -> SelectQuery {
    let local = pairing.column(pairing.local_field);
    let peer = pairing.column(pairing.peer_field);

    let mut query = SelectQuery::from(&target.table);
    select_storage_columns(&mut query, target);
    query
        .select_as(local.clone(), UID_LOCAL)
        .select_as(peer.clone(), UID_PEER);
    if let Some(sorting) = pairing.sorting {
        query.select_as(pairing.column(sorting), SORTING);
    }
    if let Some(sorting) = pairing.sorting_opposite {
        query.select_as(pairing.column(sorting), SORTING_OPPOSITE);
    }

    let key = query.column(&target.key_column);
    query.inner_join(
        pairing.table,
        pairing.table,
        vec![Condition::Or(vec![
            Condition::eq_column(peer.clone(), key.clone()),
            Condition::eq_column(local.clone(), key),
        ])],
    );
    query.and_where(Condition::Or(vec![
        Condition::In {
            column: local,
            values: keys.to_vec(),
        },
        Condition::In {
            column: peer,
            values: keys.to_vec(),
        },
    ]));
    restrict(
        &mut query,
        target,
        request.arguments.filter.as_ref(),
        &ctx.access,
    );

    order_by_terms(&mut query, target, request.arguments.order.as_ref());
    if let Some(sorting) = pairing.sorting {
        query.order_by(pairing.column(sorting), SortDirection::Ascending);
    }
    order_by_key(&mut query, target);
    query
}

/// Parent a fetched row belongs to, seen from the requested keys
fn parent_of(row: &Row, key_column: &str, requested: &BTreeSet<i64>) -> Option<(i64, Side)> {
    let uid = row_key(row, key_column)?;
    let local = row_key(row, UID_LOCAL)?;
    let peer = row_key(row, UID_PEER)?;

    if uid == peer && requested.contains(&local) {
        Some((local, Side::Local))
    } else if uid == local && local != peer && requested.contains(&peer) {
        Some((peer, Side::Peer))
    } else {
        None
    }
}

pub fn fetch(
    request: &ResolutionRequest<'_>,
    ctx: &ResolutionContext<'_>,
    parents: &[(i64, &Row)],
    targets: &[&EntityType],
    pairing: &PairingTable<'_>,
) -> Result<Buffer, EntityReaderError> {
    let requested: BTreeSet<i64> = parents.iter().map(|(key, _)| *key).collect();
    let keys: Vec<Literal> = requested.iter().map(|key| Literal::Int(*key)).collect();

    let mut buffer = Buffer::default();
    for target in targets {
        let query = build_query(request, ctx, &keys, target, pairing);
        for mut row in ctx.execute(&query)? {
            let Some((parent, side)) = parent_of(&row, &target.key_column, &requested) else {
                continue;
            };
            if side == Side::Peer && pairing.sorting_opposite.is_some() {
                let opposite = row.get(SORTING_OPPOSITE).cloned().unwrap_or(Value::Null);
                row.insert(SORTING.to_string(), opposite);
            }
            buffer.append(parent, TypedRow::new(&target.name, row));
        }
    }

    if pairing.sorting_opposite.is_some() {
        for rows in buffer.rows_mut() {
            sort_by_column(rows, SORTING);
        }
    }
    Ok(buffer)
}
