//! Query documents: named entity blocks with nested relation blocks,
//! `(order: "...", filter: "...", limit: n, offset: n)` arguments and
//! `... on Type { }` fragments.

pub mod ast;
pub mod parser;

pub use ast::{Argument, ArgumentValue, Document, FieldSelection, InlineFragment, Selection};
pub use parser::parse_document;
