//! Filter expressions for the `filter` argument.
//!
//! Grammar (keywords are case-insensitive):
//! - comparison: `operand op operand` with `=`, `!=`, `<>`, `<`, `<=`, `>`, `>=`
//! - operand: field reference (`field`, `field on Type`) or literal
//!   (`` `text` ``, `12`, `-3.5`, `null`)
//! - boolean: `not`, `and`, `or`, parentheses; `not` binds tighter than `and`,
//!   `and` tighter than `or`
//!
//! Examples:
//! - ``scalar_string = `String` ``
//! - `scalar_float = -3.1415 or scalar_float = 3.1415 and l10n_state = null`
//! - `not (scalar_float = 0 or scalar_integer = 1)`

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, multispace0},
    combinator::{map, value},
    IResult, Parser,
};
use std::fmt;

use super::common::{keyword, literal, near};
use super::field_ref::{parse_field_ref, FieldRef, FieldUsage, ResolvedField, TypeContext};
use crate::errors::{EntityReaderError, SyntaxError};
use crate::query_builder::{ColumnRef, ComparisonOp, Condition, Literal, Operand as SqlOperand};

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(FieldRef),
    Literal(Literal),
}

/// Filter AST before field resolution
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Comparison {
        left: Operand,
        op: ComparisonOp,
        right: Operand,
    },
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    pub fn parse(text: &str) -> Result<Self, SyntaxError> {
        let syntax_error = |rest: &str| SyntaxError::Filter {
            expression: text.to_string(),
            near: near(rest),
        };

        match parse_or_expr(text) {
            Ok((rest, expr)) => {
                if rest.trim().is_empty() {
                    Ok(expr)
                } else {
                    Err(syntax_error(rest))
                }
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(syntax_error(e.input)),
            Err(nom::Err::Incomplete(_)) => Err(syntax_error("")),
        }
    }

    pub fn resolve(&self, context: &TypeContext<'_>) -> Result<FilterSpec, EntityReaderError> {
        Ok(FilterSpec {
            root: resolve_node(self, context)?,
        })
    }
}

fn resolve_node(
    expr: &FilterExpr,
    context: &TypeContext<'_>,
) -> Result<ResolvedFilter, EntityReaderError> {
    let resolve_operand = |operand: &Operand| -> Result<ResolvedOperand, EntityReaderError> {
        Ok(match operand {
            Operand::Field(field) => {
                ResolvedOperand::Field(context.resolve(field, FieldUsage::Filter)?)
            }
            Operand::Literal(literal) => ResolvedOperand::Literal(literal.clone()),
        })
    };

    Ok(match expr {
        FilterExpr::Comparison { left, op, right } => ResolvedFilter::Comparison {
            left: resolve_operand(left)?,
            op: *op,
            right: resolve_operand(right)?,
        },
        FilterExpr::And(left, right) => ResolvedFilter::And(
            Box::new(resolve_node(left, context)?),
            Box::new(resolve_node(right, context)?),
        ),
        FilterExpr::Or(left, right) => ResolvedFilter::Or(
            Box::new(resolve_node(left, context)?),
            Box::new(resolve_node(right, context)?),
        ),
        FilterExpr::Not(inner) => ResolvedFilter::Not(Box::new(resolve_node(inner, context)?)),
    })
}

/// Parse OR expressions (lowest precedence)
fn parse_or_expr(input: &str) -> IResult<&str, FilterExpr> {
    let (input, left) = parse_and_expr(input)?;

    let mut current = left;
    let mut current_input = input;

    loop {
        let (new_input, _) = multispace0(current_input)?;

        if let Ok((new_input, _)) = keyword("or").parse(new_input) {
            if let Ok((new_input, right)) = parse_and_expr(new_input) {
                current = FilterExpr::Or(Box::new(current), Box::new(right));
                current_input = new_input;
                continue;
            }
        }
        break;
    }

    Ok((current_input, current))
}

/// Parse AND expressions
fn parse_and_expr(input: &str) -> IResult<&str, FilterExpr> {
    let (input, left) = parse_not_expr(input)?;

    let mut current = left;
    let mut current_input = input;

    loop {
        let (new_input, _) = multispace0(current_input)?;

        if let Ok((new_input, _)) = keyword("and").parse(new_input) {
            if let Ok((new_input, right)) = parse_not_expr(new_input) {
                current = FilterExpr::And(Box::new(current), Box::new(right));
                current_input = new_input;
                continue;
            }
        }
        break;
    }

    Ok((current_input, current))
}

/// Parse NOT expressions
fn parse_not_expr(input: &str) -> IResult<&str, FilterExpr> {
    let (input, _) = multispace0(input)?;

    if let Ok((input, _)) = keyword("not").parse(input) {
        let (input, inner) = parse_not_expr(input)?;
        return Ok((input, FilterExpr::Not(Box::new(inner))));
    }

    parse_comparison_expr(input)
}

/// Parse a comparison or a parenthesized expression
fn parse_comparison_expr(input: &str) -> IResult<&str, FilterExpr> {
    let (input, _) = multispace0(input)?;

    if let Ok((input, _)) = char::<_, nom::error::Error<_>>('(').parse(input) {
        let (input, inner) = parse_or_expr(input)?;
        let (input, _) = multispace0(input)?;
        let (input, _) = char(')').parse(input)?;
        return Ok((input, inner));
    }

    let (input, left) = parse_operand(input)?;
    let (input, _) = multispace0(input)?;
    let (input, op) = alt((
        value(ComparisonOp::NotEqual, tag("<>")),
        value(ComparisonOp::NotEqual, tag("!=")),
        value(ComparisonOp::LessOrEqual, tag("<=")),
        value(ComparisonOp::GreaterOrEqual, tag(">=")),
        value(ComparisonOp::Less, tag("<")),
        value(ComparisonOp::Greater, tag(">")),
        value(ComparisonOp::Equal, tag("=")),
    ))
    .parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, right) = parse_operand(input)?;

    Ok((input, FilterExpr::Comparison { left, op, right }))
}

fn parse_operand(input: &str) -> IResult<&str, Operand> {
    alt((
        map(literal, Operand::Literal),
        map(parse_field_ref, Operand::Field),
    ))
    .parse(input)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedOperand {
    Field(ResolvedField),
    Literal(Literal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedFilter {
    Comparison {
        left: ResolvedOperand,
        op: ComparisonOp,
        right: ResolvedOperand,
    },
    And(Box<ResolvedFilter>, Box<ResolvedFilter>),
    Or(Box<ResolvedFilter>, Box<ResolvedFilter>),
    Not(Box<ResolvedFilter>),
}

/// Filter resolved against a type context
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub root: ResolvedFilter,
}

impl FilterSpec {
    /// Predicate for rows of `type_name` selected under `table_alias`.
    /// Fields of other branches render as NULL.
    pub fn to_condition(&self, type_name: &str, table_alias: &str) -> Condition {
        to_condition(&self.root, type_name, table_alias)
    }
}

fn to_condition(filter: &ResolvedFilter, type_name: &str, table_alias: &str) -> Condition {
    let operand = |operand: &ResolvedOperand| match operand {
        ResolvedOperand::Field(field) => match field.column_for(type_name) {
            Some(column) => SqlOperand::Column(ColumnRef::new(table_alias, column)),
            None => SqlOperand::Value(Literal::Null),
        },
        ResolvedOperand::Literal(literal) => SqlOperand::Value(literal.clone()),
    };

    match filter {
        ResolvedFilter::Comparison { left, op, right } => {
            let null_check = matches!(op, ComparisonOp::Equal | ComparisonOp::NotEqual);
            match (left, right) {
                (other, ResolvedOperand::Literal(Literal::Null))
                | (ResolvedOperand::Literal(Literal::Null), other)
                    if null_check =>
                {
                    Condition::IsNull {
                        operand: operand(other),
                        negated: *op == ComparisonOp::NotEqual,
                    }
                }
                _ => Condition::Compare {
                    left: operand(left),
                    op: *op,
                    right: operand(right),
                },
            }
        }
        ResolvedFilter::And(left, right) => Condition::And(vec![
            to_condition(left, type_name, table_alias),
            to_condition(right, type_name, table_alias),
        ]),
        ResolvedFilter::Or(left, right) => Condition::Or(vec![
            to_condition(left, type_name, table_alias),
            to_condition(right, type_name, table_alias),
        ]),
        ResolvedFilter::Not(inner) => {
            Condition::Not(Box::new(to_condition(inner, type_name, table_alias)))
        }
    }
}

impl fmt::Display for ResolvedOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedOperand::Field(field) => write!(f, "{}", field),
            ResolvedOperand::Literal(literal) => write!(f, "{}", literal),
        }
    }
}

/// Canonical text: fully parenthesized, lower-case keywords
impl fmt::Display for ResolvedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedFilter::Comparison { left, op, right } => {
                write!(f, "{} {} {}", left, op.to_sql(), right)
            }
            ResolvedFilter::And(left, right) => write!(f, "({} and {})", left, right),
            ResolvedFilter::Or(left, right) => write!(f, "({} or {})", left, right),
            ResolvedFilter::Not(inner) => write!(f, "not ({})", inner),
        }
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}
