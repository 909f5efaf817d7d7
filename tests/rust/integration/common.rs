use std::cell::RefCell;
use std::sync::Arc;

use relgraph::errors::ExecutionError;
use relgraph::query_builder::{QueryExecutor, Row, SelectQuery};
use relgraph::{EntityReader, ReaderConfig, Schema, SqliteExecutor};

pub const SCHEMA: &str = include_str!("fixtures/schema.yaml");
pub const DATASET: &str = include_str!("fixtures/dataset.sql");

/// SQLite executor recording the table of every executed query
pub struct CountingExecutor {
    inner: SqliteExecutor,
    tables: RefCell<Vec<String>>,
}

impl CountingExecutor {
    pub fn seeded() -> Self {
        let inner = SqliteExecutor::open_in_memory().expect("open in-memory database");
        inner.execute_batch(DATASET).expect("seed dataset");
        CountingExecutor {
            inner,
            tables: RefCell::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.tables.borrow().len()
    }

    pub fn tables(&self) -> Vec<String> {
        self.tables.borrow().clone()
    }
}

impl QueryExecutor for CountingExecutor {
    fn execute(&self, query: &SelectQuery) -> Result<Vec<Row>, ExecutionError> {
        self.tables.borrow_mut().push(query.table.clone());
        self.inner.execute(query)
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn schema() -> Arc<Schema> {
    Arc::new(Schema::from_yaml_str(SCHEMA).expect("fixture schema loads"))
}

pub fn reader() -> EntityReader<CountingExecutor> {
    init_logging();
    let config = ReaderConfig {
        log_statements: true,
        ..ReaderConfig::default()
    };
    EntityReader::with_config(schema(), CountingExecutor::seeded(), config)
}
