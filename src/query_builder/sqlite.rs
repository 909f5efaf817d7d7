//! SQLite backend for [`QueryExecutor`] over a `rusqlite` connection.

use rusqlite::types::{Value, ValueRef};
use rusqlite::Connection;
use std::path::Path;

use super::{Literal, QueryExecutor, Row, SelectQuery, SqliteDialect};
use crate::errors::ExecutionError;

pub struct SqliteExecutor {
    connection: Connection,
}

impl SqliteExecutor {
    pub fn new(connection: Connection) -> Self {
        SqliteExecutor { connection }
    }

    pub fn open_in_memory() -> Result<Self, ExecutionError> {
        Connection::open_in_memory()
            .map(Self::new)
            .map_err(connection_error)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ExecutionError> {
        Connection::open(path).map(Self::new).map_err(connection_error)
    }

    /// Run raw SQL, e.g. to create and seed tables
    pub fn execute_batch(&self, sql: &str) -> Result<(), ExecutionError> {
        self.connection
            .execute_batch(sql)
            .map_err(|e| ExecutionError::Query {
                sql: sql.to_string(),
                message: e.to_string(),
            })
    }
}

impl QueryExecutor for SqliteExecutor {
    fn execute(&self, query: &SelectQuery) -> Result<Vec<Row>, ExecutionError> {
        let statement = query.to_statement(&SqliteDialect);
        let query_error = |e: rusqlite::Error| ExecutionError::Query {
            sql: statement.sql.clone(),
            message: e.to_string(),
        };

        let mut prepared = self
            .connection
            .prepare(&statement.sql)
            .map_err(query_error)?;
        let columns: Vec<String> = prepared
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let params = rusqlite::params_from_iter(statement.params.iter().map(to_sql_value));
        let mut rows = prepared.query(params).map_err(query_error)?;

        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(query_error)? {
            let mut record = Row::new();
            for (index, name) in columns.iter().enumerate() {
                let value = row.get_ref(index).map_err(query_error)?;
                record.insert(name.clone(), to_json(value));
            }
            result.push(record);
        }
        Ok(result)
    }
}

fn connection_error(e: rusqlite::Error) -> ExecutionError {
    ExecutionError::Connection {
        message: e.to_string(),
    }
}

fn to_sql_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Int(i) => Value::Integer(*i),
        Literal::Float(f) => Value::Real(*f),
        Literal::String(s) => Value::Text(s.clone()),
    }
}

fn to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
