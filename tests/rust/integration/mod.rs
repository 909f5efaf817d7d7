//! Integration tests - Entity reader against an in-memory SQLite database
//!
//! Every test seeds a fresh database from `fixtures/dataset.sql` and loads the
//! schema from `fixtures/schema.yaml`.

mod common;
mod filter_tests;
mod order_tests;
mod reader_tests;
mod relation_tests;
