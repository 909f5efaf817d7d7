//! Relation resolution.
//!
//! Every relation kind has one [`RelationResolver`] variant. All of them follow
//! the same buffered protocol:
//!
//! 1. fingerprint the relation and its order/filter arguments
//! 2. when a buffer exists, look up the set of parent keys it already covers
//! 3. query the storage once per target table, only for keys not covered yet
//! 4. group the rows by parent key, order them, store buffer and keys
//! 5. hand back the rows of the requested parents (empty list when none)
//!
//! The cache lives for one query execution, so sibling occurrences of the same
//! relation with equal arguments share one query.

pub mod association;
pub mod buffer;
pub mod cache;
pub mod csv;
pub mod inline;
pub mod ordering;
pub mod symmetric;

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

pub use buffer::{row_key, Buffer, TypedRow};
pub use cache::{CachedValue, Fingerprint, MemoryCache, ResolutionCache};

use crate::errors::{EntityReaderError, ExecutionError, SchemaError};
use crate::expression::{FilterSpec, OrderSpec};
use crate::query_builder::{ColumnRef, QueryExecutor, Row, SelectQuery, SortDirection};
use crate::reader::AccessContext;
use crate::schema_catalog::{
    EntityType, PropertyDefinition, RelationDefinition, RelationKind, RelationStorage, Schema,
};

/// Synthetic column carrying the parent key of association rows
pub const UID_LOCAL: &str = "__uid_local";
/// Synthetic column carrying the association sorting value
pub const SORTING: &str = "__sorting";
/// Synthetic column carrying the parent key of foreign-field rows
pub const PARENT_KEY: &str = "__parent_key";
/// Synthetic column carrying the peer side of a pairing row
pub const UID_PEER: &str = "__uid_peer";

lazy_static! {
    static ref COLUMN_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Arguments of one relation field occurrence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionArguments {
    pub order: Option<OrderSpec>,
    pub filter: Option<FilterSpec>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// One relation field to resolve for a batch of parent rows of one type
#[derive(Debug, Clone, Copy)]
pub struct ResolutionRequest<'r> {
    pub parent_type: &'r EntityType,
    pub property: &'r PropertyDefinition,
    pub relation: &'r RelationDefinition,
    pub parent_rows: &'r [&'r Row],
    pub arguments: &'r ResolutionArguments,
}

/// Request-scoped collaborators passed down the resolution chain
pub struct ResolutionContext<'a> {
    pub schema: &'a Schema,
    pub executor: &'a dyn QueryExecutor,
    pub cache: &'a mut dyn ResolutionCache,
    pub access: AccessContext,
    pub statement_log_level: log::Level,
}

impl ResolutionContext<'_> {
    pub fn execute(&self, query: &SelectQuery) -> Result<Vec<Row>, ExecutionError> {
        log::log!(self.statement_log_level, "SQL: {}", query);
        let rows = self.executor.execute(query)?;
        log::debug!("{} rows from {}", rows.len(), query.table);
        Ok(rows)
    }
}

/// Child rows per parent key
pub type Resolved = BTreeMap<i64, Vec<TypedRow>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationResolver {
    OneToManyInline,
    ManyToManyInline,
    ManyToManySelect,
    GroupPolymorphic,
    SymmetricSelfRelation,
}

impl RelationResolver {
    pub const ALL: [RelationResolver; 5] = [
        RelationResolver::OneToManyInline,
        RelationResolver::ManyToManyInline,
        RelationResolver::ManyToManySelect,
        RelationResolver::GroupPolymorphic,
        RelationResolver::SymmetricSelfRelation,
    ];

    pub fn kind(&self) -> RelationKind {
        match self {
            RelationResolver::OneToManyInline => RelationKind::OneToManyInline,
            RelationResolver::ManyToManyInline => RelationKind::ManyToManyInline,
            RelationResolver::ManyToManySelect => RelationKind::ManyToManySelect,
            RelationResolver::GroupPolymorphic => RelationKind::GroupPolymorphic,
            RelationResolver::SymmetricSelfRelation => RelationKind::SymmetricSelfRelation,
        }
    }

    fn supports(&self, storage: &RelationStorage) -> bool {
        use RelationStorage::*;
        match self {
            RelationResolver::OneToManyInline => matches!(storage, ForeignField { .. } | Csv),
            RelationResolver::ManyToManyInline => matches!(storage, Association(_)),
            RelationResolver::ManyToManySelect | RelationResolver::GroupPolymorphic => {
                matches!(storage, Association(_) | Csv)
            }
            RelationResolver::SymmetricSelfRelation => matches!(storage, Pairing { .. }),
        }
    }

    pub fn can_resolve(&self, relation: &RelationDefinition) -> bool {
        relation.kind == self.kind() && self.supports(&relation.storage)
    }

    /// First resolver accepting the relation
    pub fn for_relation(
        type_name: &str,
        property: &PropertyDefinition,
        relation: &RelationDefinition,
    ) -> Result<Self, SchemaError> {
        Self::ALL
            .iter()
            .find(|r| r.can_resolve(relation))
            .copied()
            .ok_or_else(|| SchemaError::UnsupportedRelation {
                type_name: type_name.to_string(),
                field: property.name.clone(),
            })
    }

    /// Check the stored configuration before anything is queried
    pub fn validate(
        &self,
        parent_type: &EntityType,
        property: &PropertyDefinition,
        relation: &RelationDefinition,
    ) -> Result<(), SchemaError> {
        let malformed = |reason: &str| SchemaError::MalformedRelation {
            type_name: parent_type.name.clone(),
            field: property.name.clone(),
            reason: reason.to_string(),
        };

        if *self != RelationResolver::GroupPolymorphic && relation.targets.len() != 1 {
            return Err(malformed("expects exactly one target type"));
        }

        let match_fields = match &relation.storage {
            RelationStorage::ForeignField { match_fields, .. } => Some(match_fields),
            RelationStorage::Association(mm) => {
                if relation.targets.len() > 1 && mm.discriminator.is_none() {
                    return Err(malformed(
                        "association table needs a discriminator column for several targets",
                    ));
                }
                Some(&mm.match_fields)
            }
            RelationStorage::Pairing { .. } => {
                if relation.targets.first() != Some(&parent_type.name) {
                    return Err(malformed("symmetric relation must target its own type"));
                }
                None
            }
            RelationStorage::Csv => None,
        };

        if let Some(column) = match_fields
            .into_iter()
            .flat_map(|fields| fields.keys())
            .find(|column| !COLUMN_NAME.is_match(column))
        {
            return Err(SchemaError::MalformedMatchField {
                type_name: parent_type.name.clone(),
                field: property.name.clone(),
                column: column.clone(),
            });
        }
        Ok(())
    }

    fn fingerprint(&self, request: &ResolutionRequest<'_>, access: &AccessContext) -> Fingerprint {
        let arguments = request.arguments;
        let order = arguments.order.as_ref().map(|o| o.to_string()).unwrap_or_default();
        let filter = arguments.filter.as_ref().map(|f| f.to_string()).unwrap_or_default();
        let access = access.to_string();
        Fingerprint::new(&[
            ("type", request.parent_type.name.as_str()),
            ("field", request.property.name.as_str()),
            ("resolver", self.kind().as_str()),
            ("storage", request.relation.storage.name()),
            ("order", order.as_str()),
            ("filter", filter.as_str()),
            ("access", access.as_str()),
        ])
    }

    /// Resolve the relation for a batch of parent rows
    ///
    /// Every parent with a key gets an entry; parents without children map to
    /// an empty list. `limit`/`offset` apply per parent after ordering.
    pub fn resolve(
        &self,
        request: &ResolutionRequest<'_>,
        ctx: &mut ResolutionContext<'_>,
    ) -> Result<Resolved, EntityReaderError> {
        self.validate(request.parent_type, request.property, request.relation)?;
        let targets = ctx.schema.relation_targets(request.relation)?;

        let fingerprint = self.fingerprint(request, &ctx.access);
        let buffer_key = fingerprint.buffer_key();
        let keys_key = fingerprint.keys_key();

        let key_column = &request.parent_type.key_column;
        let parents: Vec<(i64, &Row)> = request
            .parent_rows
            .iter()
            .filter_map(|row| row_key(row, key_column).map(|key| (key, *row)))
            .collect();

        // covered keys only count while their buffer is still cached
        let mut covered = if ctx.cache.has(&buffer_key) {
            match ctx.cache.get(&keys_key) {
                Some(CachedValue::Keys(keys)) => keys.clone(),
                _ => BTreeSet::new(),
            }
        } else {
            BTreeSet::new()
        };
        let mut seen = BTreeSet::new();
        let missing: Vec<(i64, &Row)> = parents
            .iter()
            .filter(|(key, _)| !covered.contains(key) && seen.insert(*key))
            .copied()
            .collect();

        if missing.is_empty() {
            log::debug!("Relation cache HIT: {}", fingerprint.description());
        } else {
            log::debug!(
                "Relation cache MISS: {} ({} new parent keys)",
                fingerprint.description(),
                missing.len()
            );

            let mut fetched = match &request.relation.storage {
                RelationStorage::Association(mm) => {
                    association::fetch(request, ctx, &missing, &targets, mm)?
                }
                RelationStorage::ForeignField {
                    field,
                    table_field,
                    match_fields,
                } => inline::fetch(
                    request,
                    ctx,
                    &missing,
                    &targets,
                    &inline::ForeignKey {
                        field,
                        table_field: table_field.as_deref(),
                        match_fields,
                    },
                )?,
                RelationStorage::Csv => csv::fetch(request, ctx, &missing, &targets)?,
                RelationStorage::Pairing {
                    table,
                    local_field,
                    peer_field,
                    sorting,
                    sorting_opposite,
                } => symmetric::fetch(
                    request,
                    ctx,
                    &missing,
                    &targets,
                    &symmetric::PairingTable {
                        table,
                        local_field,
                        peer_field,
                        sorting: sorting.as_deref(),
                        sorting_opposite: sorting_opposite.as_deref(),
                    },
                )?,
            };

            for (key, _) in &missing {
                fetched.ensure(*key);
            }
            if let Some(order) = &request.arguments.order {
                for rows in fetched.rows_mut() {
                    ordering::sort_rows(rows, order);
                }
            }

            let mut buffer = match ctx.cache.get(&buffer_key) {
                Some(CachedValue::Buffer(buffer)) => buffer.clone(),
                _ => Buffer::default(),
            };
            buffer.merge(fetched);
            covered.extend(missing.iter().map(|(key, _)| *key));

            ctx.cache.set(buffer_key.clone(), CachedValue::Buffer(buffer));
            ctx.cache.set(keys_key, CachedValue::Keys(covered));
        }

        let empty = Buffer::default();
        let buffer = match ctx.cache.get(&buffer_key) {
            Some(CachedValue::Buffer(buffer)) => buffer,
            _ => &empty,
        };

        let arguments = request.arguments;
        Ok(parents
            .iter()
            .map(|(key, _)| {
                let rows = ordering::apply_window(buffer.rows(*key), arguments.limit, arguments.offset);
                (*key, rows)
            })
            .collect())
    }
}

/// Select every storage column of `target` under its own name
pub(crate) fn select_storage_columns(query: &mut SelectQuery, target: &EntityType) {
    let alias = query.alias.clone();
    for column in target.storage_columns() {
        query.select_as(ColumnRef::new(&alias, column), column);
    }
}

/// Access restrictions plus the filter argument, for rows of `target`
pub(crate) fn restrict(
    query: &mut SelectQuery,
    target: &EntityType,
    filter: Option<&FilterSpec>,
    access: &AccessContext,
) {
    let alias = query.alias.clone();
    for condition in access.conditions(target, &alias) {
        query.and_where(condition);
    }
    if let Some(filter) = filter {
        query.and_where(filter.to_condition(&target.name, &alias));
    }
}

/// ORDER BY the terms applying to `target`
pub(crate) fn order_by_terms(query: &mut SelectQuery, target: &EntityType, order: Option<&OrderSpec>) {
    let Some(order) = order else {
        return;
    };
    for term in &order.terms {
        if let Some(column) = term.field.column_for(&target.name) {
            let column = query.column(column);
            query.order_by(column, term.direction);
        }
    }
}

/// Final tie-breaker on the key column
pub(crate) fn order_by_key(query: &mut SelectQuery, target: &EntityType) {
    let column = query.column(&target.key_column);
    query.order_by(column, SortDirection::Ascending);
}
