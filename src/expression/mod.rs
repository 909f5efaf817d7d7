//! Order and filter expressions.
//!
//! Both are parsed once per query and resolved against a [`TypeContext`]: the
//! entity types an expression may address. Field references may carry an
//! `on <Type>` qualifier to pick one branch of a polymorphic relation.

pub mod common;
pub mod field_ref;
pub mod filter;
pub mod order;

pub use field_ref::{FieldRef, FieldUsage, ResolvedField, TypeContext};
pub use filter::{FilterExpr, FilterSpec, ResolvedFilter, ResolvedOperand};
pub use order::{OrderExpression, OrderSpec, OrderTerm};

use crate::errors::EntityReaderError;

/// Parse and resolve an `order` argument
pub fn parse_order(text: &str, context: &TypeContext<'_>) -> Result<OrderSpec, EntityReaderError> {
    OrderExpression::parse(text)?.resolve(context)
}

/// Parse and resolve a `filter` argument
pub fn parse_filter(text: &str, context: &TypeContext<'_>) -> Result<FilterSpec, EntityReaderError> {
    FilterExpr::parse(text)?.resolve(context)
}
