use super::SelectQuery;
use crate::errors::ExecutionError;

/// One result row; column order follows the SELECT list
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Runs built queries. Implementations own dialect choice and connection handling.
#[cfg_attr(test, mockall::automock)]
pub trait QueryExecutor {
    fn execute(&self, query: &SelectQuery) -> Result<Vec<Row>, ExecutionError>;
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for &E {
    fn execute(&self, query: &SelectQuery) -> Result<Vec<Row>, ExecutionError> {
        (**self).execute(query)
    }
}
