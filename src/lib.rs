//! Relgraph - graph-shaped entity queries over relational tables
//!
//! This crate reads typed entities and their relations through:
//! - A declarative schema of entity types, scalar fields and relations
//! - Query documents with nested relation blocks and type fragments
//! - Order and filter expressions with `on <Type>` qualifiers
//! - One buffered query per relation and table per execution

pub mod config;
pub mod document;
pub mod errors;
pub mod expression;
pub mod query_builder;
pub mod reader;
pub mod resolver;
pub mod schema_catalog;

pub use config::ReaderConfig;
pub use errors::{EntityReaderError, ErrorKind};
pub use query_builder::QueryExecutor;
#[cfg(feature = "sqlite")]
pub use query_builder::SqliteExecutor;
pub use reader::{AccessContext, EntityReader, Variables};
pub use schema_catalog::Schema;
