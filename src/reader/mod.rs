//! Entity reader: executes query documents against a [`Schema`].
//!
//! ```text
//! query text -> Document -> QueryPlan -> root SELECT per block
//!                                      -> relation resolvers per nesting level
//!                                      -> {"data": {...}}
//! ```
//!
//! Every execution gets its own [`MemoryCache`]. Any error aborts the whole
//! execution; partial results are never returned.

pub mod plan;
pub mod projection;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

pub use plan::{FieldKind, FieldPlan, Planner, QueryPlan, RelationPlan, RootPlan, SelectionPlan};
pub use projection::{coerce, project};

use crate::config::ReaderConfig;
use crate::document::parse_document;
use crate::errors::EntityReaderError;
use crate::query_builder::{ColumnRef, Condition, Literal, QueryExecutor, SelectQuery};
use crate::resolver::{
    order_by_key, order_by_terms, restrict, select_storage_columns, MemoryCache,
    ResolutionContext, TypedRow,
};
use crate::schema_catalog::{EntityType, Schema};

/// Values for `$name` references in query arguments
pub type Variables = Map<String, Value>;

/// Which otherwise invisible rows a query may see
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessContext {
    pub include_hidden: bool,
    pub include_deleted: bool,
}

impl AccessContext {
    /// Conditions excluding deleted and hidden rows of `entity`
    pub fn conditions(&self, entity: &EntityType, alias: &str) -> Vec<Condition> {
        let columns = &entity.enable_columns;
        let mut conditions = Vec::new();
        if let (false, Some(column)) = (self.include_deleted, &columns.deleted) {
            conditions.push(Condition::eq_value(
                ColumnRef::new(alias, column),
                Literal::Int(0),
            ));
        }
        if let (false, Some(column)) = (self.include_hidden, &columns.disabled) {
            conditions.push(Condition::eq_value(
                ColumnRef::new(alias, column),
                Literal::Int(0),
            ));
        }
        conditions
    }
}

impl fmt::Display for AccessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hidden={},deleted={}",
            self.include_hidden, self.include_deleted
        )
    }
}

pub struct EntityReader<E: QueryExecutor> {
    schema: Arc<Schema>,
    executor: E,
    config: ReaderConfig,
}

impl<E: QueryExecutor> EntityReader<E> {
    pub fn new(schema: Arc<Schema>, executor: E) -> Self {
        Self::with_config(schema, executor, ReaderConfig::default())
    }

    pub fn with_config(schema: Arc<Schema>, executor: E, config: ReaderConfig) -> Self {
        EntityReader {
            schema,
            executor,
            config,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Execute without variables, hiding deleted and hidden rows
    pub fn execute(&self, query: &str) -> Result<Value, EntityReaderError> {
        self.execute_with(query, &Variables::new(), &AccessContext::default())
    }

    pub fn execute_with(
        &self,
        query: &str,
        variables: &Variables,
        access: &AccessContext,
    ) -> Result<Value, EntityReaderError> {
        let document = parse_document(query)?;
        let plan = Planner::new(&self.schema, &self.config, variables).plan(&document)?;
        log::debug!("Planned {} root block(s)", plan.roots.len());

        let mut cache = MemoryCache::new();
        let mut ctx = ResolutionContext {
            schema: &self.schema,
            executor: &self.executor,
            cache: &mut cache,
            access: *access,
            statement_log_level: self.config.statement_log_level(),
        };

        let mut data = Map::new();
        for root in &plan.roots {
            let query = self.root_query(root, access);
            let rows: Vec<TypedRow> = ctx
                .execute(&query)?
                .into_iter()
                .map(|row| TypedRow::new(&root.entity.name, row))
                .collect();
            let values = project(&rows, &root.selection, &mut ctx)?;
            data.insert(root.response_key.clone(), Value::Array(values));
        }

        log::debug!("Execution finished with {} cache entries", cache.len());
        Ok(json!({ "data": data }))
    }

    fn root_query(&self, root: &RootPlan<'_>, access: &AccessContext) -> SelectQuery {
        let entity = root.entity;
        let arguments = &root.arguments;

        let mut query = SelectQuery::from(&entity.table);
        select_storage_columns(&mut query, entity);
        restrict(&mut query, entity, arguments.filter.as_ref(), access);
        order_by_terms(&mut query, entity, arguments.order.as_ref());
        order_by_key(&mut query, entity);

        let max = u64::from(self.config.max_root_limit);
        let limit = arguments.limit.map_or(max, |limit| limit.min(max));
        query.set_limit(Some(limit), arguments.offset);
        query
    }
}
