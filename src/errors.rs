//! # Error Types
//!
//! Every failure aborts the whole execution. Errors are grouped into four kinds
//! and each variant carries a stable numeric code, so callers (and tests) can
//! assert on the cause instead of the message text.
//!
//! ## Error Categories
//!
//! - **Syntax**: the query document, an order string or a filter string cannot be parsed
//! - **Schema**: a referenced type, field or qualifier does not exist, is ambiguous,
//!   or a relation's stored configuration is inconsistent
//! - **Unsupported**: the expression is valid but denotes something the engine does
//!   not implement (ordering by a relation, heterogeneous branches without qualifier)
//! - **Execution**: the query execution collaborator failed

use thiserror::Error;

/// Machine-checkable error discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    Schema,
    Unsupported,
    Execution,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyntaxError {
    #[error("Unable to parse query document near `{near}`")]
    Document { near: String },
    #[error("Unable to parse order expression `{expression}` near `{near}`")]
    Order { expression: String, near: String },
    #[error("Unable to parse filter expression `{expression}` near `{near}`")]
    Filter { expression: String, near: String },
    #[error("Variable `${name}` is not bound")]
    UnboundVariable { name: String },
}

impl SyntaxError {
    pub fn code(&self) -> u32 {
        match self {
            SyntaxError::Document { .. } => 1560670101,
            SyntaxError::Order { .. } => 1560670102,
            SyntaxError::Filter { .. } => 1560670103,
            SyntaxError::UnboundVariable { .. } => 1560670104,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("Field `{field}` does not exist on `{type_name}`")]
    UnknownField { type_name: String, field: String },
    #[error("Type `{qualifier}` used as qualifier does not exist")]
    UnknownQualifier { qualifier: String },
    #[error("Type `{qualifier}` is not a possible type of `{context}`")]
    QualifierNotApplicable { qualifier: String, context: String },
    #[error("Field `{field}` is defined differently on {types:?}; qualify it with `on <Type>`")]
    AmbiguousField { field: String, types: Vec<String> },
    #[error("Entity type `{name}` does not exist")]
    UnknownEntityType { name: String },
    #[error("No resolver supports relation `{type_name}.{field}`")]
    UnsupportedRelation { type_name: String, field: String },
    #[error("Relation `{type_name}.{field}` has a malformed match field `{column}`")]
    MalformedMatchField {
        type_name: String,
        field: String,
        column: String,
    },
    #[error("Relation `{type_name}.{field}` is misconfigured: {reason}")]
    MalformedRelation {
        type_name: String,
        field: String,
        reason: String,
    },
    #[error("Invalid selection of `{type_name}.{field}`: {reason}")]
    InvalidSelection {
        type_name: String,
        field: String,
        reason: String,
    },
    #[error("Unknown or invalid argument `{name}` on `{field}`")]
    InvalidArgument { field: String, name: String },
    #[error("Failed to load schema: {message}")]
    Load { message: String },
}

impl SchemaError {
    pub fn code(&self) -> u32 {
        match self {
            SchemaError::UnknownField { .. } => 1560645175,
            SchemaError::UnknownQualifier { .. } => 1560598849,
            SchemaError::QualifierNotApplicable { .. } => 1560655028,
            SchemaError::AmbiguousField { .. } => 1560656034,
            SchemaError::UnknownEntityType { .. } => 1560670201,
            SchemaError::UnsupportedRelation { .. } => 1560670202,
            SchemaError::MalformedMatchField { .. } => 1560670203,
            SchemaError::MalformedRelation { .. } => 1560670204,
            SchemaError::InvalidSelection { .. } => 1560670205,
            SchemaError::InvalidArgument { .. } => 1560670206,
            SchemaError::Load { .. } => 1560670207,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum UnsupportedError {
    #[error("Ordering by relation `{field}` is not supported")]
    OrderByRelation { field: String },
    #[error("Qualifier `{qualifier}` names a scalar type; only entity types can qualify fields")]
    ScalarQualifier { qualifier: String },
    #[error("Qualifier `{qualifier}` names an abstract type; use a concrete entity type")]
    AbstractQualifier { qualifier: String },
    #[error("Field `{field}` exists only on {types:?}; qualify it with `on <Type>`")]
    HeterogeneousBranches { field: String, types: Vec<String> },
    #[error("Filtering by relation `{field}` is not supported")]
    FilterOnRelation { field: String },
    #[error("Selection nesting exceeds the configured depth of {max_depth}")]
    SelectionTooDeep { max_depth: u32 },
}

impl UnsupportedError {
    pub fn code(&self) -> u32 {
        match self {
            UnsupportedError::OrderByRelation { .. } => 1560598442,
            UnsupportedError::ScalarQualifier { .. } => 1560598849,
            UnsupportedError::AbstractQualifier { .. } => 1560648120,
            UnsupportedError::HeterogeneousBranches { .. } => 1560663120,
            UnsupportedError::FilterOnRelation { .. } => 1560670301,
            UnsupportedError::SelectionTooDeep { .. } => 1560670302,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutionError {
    #[error("Query failed: {message}\n  SQL: {sql}")]
    Query { sql: String, message: String },
    #[error("Connection failed: {message}")]
    Connection { message: String },
}

impl ExecutionError {
    pub fn code(&self) -> u32 {
        match self {
            ExecutionError::Query { .. } => 1560670401,
            ExecutionError::Connection { .. } => 1560670402,
        }
    }
}

/// Error returned by [`crate::reader::EntityReader::execute`]
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EntityReaderError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("Unsupported: {0}")]
    Unsupported(#[from] UnsupportedError),
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl EntityReaderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EntityReaderError::Syntax(_) => ErrorKind::Syntax,
            EntityReaderError::Schema(_) => ErrorKind::Schema,
            EntityReaderError::Unsupported(_) => ErrorKind::Unsupported,
            EntityReaderError::Execution(_) => ErrorKind::Execution,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            EntityReaderError::Syntax(e) => e.code(),
            EntityReaderError::Schema(e) => e.code(),
            EntityReaderError::Unsupported(e) => e.code(),
            EntityReaderError::Execution(e) => e.code(),
        }
    }
}
