//! Dialect-neutral SELECT builder used by the reader and the relation resolvers.
//!
//! Resolvers describe joins, predicates and ordering through [`SelectQuery`];
//! a [`SqlDialect`] turns that into a [`Statement`] with positional parameters,
//! and a [`QueryExecutor`] runs it.

pub mod dialect;
pub mod executor;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use dialect::{SqlDialect, SqliteDialect, Statement};
pub use executor::{QueryExecutor, Row};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteExecutor;

/// Literal value used in predicates and match-field configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Int(i64),
    Float(f64),
    String(String),
}

impl Literal {
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::Null => serde_json::Value::Null,
            Literal::Int(i) => serde_json::Value::from(*i),
            Literal::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Literal::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// Renders in filter-expression syntax
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(v) => write!(f, "{:?}", v),
            Literal::String(s) => write!(f, "`{}`", s),
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Equal,          // =
    NotEqual,       // != or <>
    Less,           // <
    LessOrEqual,    // <=
    Greater,        // >
    GreaterOrEqual, // >=
}

impl ComparisonOp {
    pub fn to_sql(&self) -> &'static str {
        match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "<>",
            ComparisonOp::Less => "<",
            ComparisonOp::LessOrEqual => "<=",
            ComparisonOp::Greater => ">",
            ComparisonOp::GreaterOrEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: &str, column: &str) -> Self {
        ColumnRef {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(ColumnRef),
    Value(Literal),
}

/// Predicate tree accepted by [`SelectQuery::and_where`]
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        left: Operand,
        op: ComparisonOp,
        right: Operand,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
    In {
        column: ColumnRef,
        values: Vec<Literal>,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Constant(bool),
}

impl Condition {
    pub fn eq_value(column: ColumnRef, value: Literal) -> Self {
        Condition::Compare {
            left: Operand::Column(column),
            op: ComparisonOp::Equal,
            right: Operand::Value(value),
        }
    }

    pub fn eq_column(left: ColumnRef, right: ColumnRef) -> Self {
        Condition::Compare {
            left: Operand::Column(left),
            op: ComparisonOp::Equal,
            right: Operand::Column(right),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: String,
    pub alias: String,
    pub on: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub column: ColumnRef,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByTerm {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub alias: String,
    pub joins: Vec<Join>,
    pub columns: Vec<SelectColumn>,
    pub conditions: Vec<Condition>,
    pub order_by: Vec<OrderByTerm>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectQuery {
    /// Start a query over `table`, aliased by its own name
    pub fn from(table: &str) -> Self {
        Self::from_aliased(table, table)
    }

    pub fn from_aliased(table: &str, alias: &str) -> Self {
        SelectQuery {
            table: table.to_string(),
            alias: alias.to_string(),
            joins: Vec::new(),
            columns: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Select `alias.column AS name`
    pub fn select_as(&mut self, column: ColumnRef, name: &str) -> &mut Self {
        if !self.columns.iter().any(|c| c.alias == name) {
            self.columns.push(SelectColumn {
                column,
                alias: name.to_string(),
            });
        }
        self
    }

    pub fn inner_join(&mut self, table: &str, alias: &str, on: Vec<Condition>) -> &mut Self {
        self.joins.push(Join {
            table: table.to_string(),
            alias: alias.to_string(),
            on,
        });
        self
    }

    /// Conditions are combined with AND
    pub fn and_where(&mut self, condition: Condition) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    pub fn order_by(&mut self, column: ColumnRef, direction: SortDirection) -> &mut Self {
        self.order_by.push(OrderByTerm { column, direction });
        self
    }

    pub fn set_limit(&mut self, limit: Option<u64>, offset: Option<u64>) -> &mut Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn column(&self, column: &str) -> ColumnRef {
        ColumnRef::new(&self.alias, column)
    }

    /// Render for the given dialect
    pub fn to_statement(&self, dialect: &dyn SqlDialect) -> Statement {
        let mut renderer = Renderer {
            dialect,
            params: Vec::new(),
        };

        let columns = if self.columns.is_empty() {
            format!("{}.*", dialect.quote_identifier(&self.alias))
        } else {
            self.columns
                .iter()
                .map(|c| {
                    format!(
                        "{} AS {}",
                        renderer.column(&c.column),
                        dialect.quote_identifier(&c.alias)
                    )
                })
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!(
            "SELECT {} FROM {} {}",
            columns,
            dialect.quote_identifier(&self.table),
            dialect.quote_identifier(&self.alias)
        );

        for join in &self.joins {
            let on = renderer.conjunction(&join.on);
            sql.push_str(&format!(
                " INNER JOIN {} {} ON {}",
                dialect.quote_identifier(&join.table),
                dialect.quote_identifier(&join.alias),
                on
            ));
        }

        if !self.conditions.is_empty() {
            let predicate = renderer.conjunction(&self.conditions);
            sql.push_str(&format!(" WHERE {}", predicate));
        }

        if !self.order_by.is_empty() {
            let terms = self
                .order_by
                .iter()
                .map(|t| format!("{} {}", renderer.column(&t.column), t.direction.to_sql()))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {}", terms));
        }

        if let Some(clause) = dialect.limit_clause(self.limit, self.offset) {
            sql.push(' ');
            sql.push_str(&clause);
        }

        Statement {
            sql,
            params: renderer.params,
        }
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let statement = self.to_statement(&SqliteDialect);
        write!(f, "{}", statement.sql)?;
        if !statement.params.is_empty() {
            let params: Vec<String> = statement.params.iter().map(|p| p.to_string()).collect();
            write!(f, " -- [{}]", params.join(", "))?;
        }
        Ok(())
    }
}

struct Renderer<'d> {
    dialect: &'d dyn SqlDialect,
    params: Vec<Literal>,
}

impl Renderer<'_> {
    fn column(&self, column: &ColumnRef) -> String {
        format!(
            "{}.{}",
            self.dialect.quote_identifier(&column.table),
            self.dialect.quote_identifier(&column.column)
        )
    }

    fn value(&mut self, value: &Literal) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        self.params.push(value.clone());
        self.dialect.placeholder(self.params.len())
    }

    fn operand(&mut self, operand: &Operand) -> String {
        match operand {
            Operand::Column(column) => self.column(column),
            Operand::Value(value) => self.value(value),
        }
    }

    fn conjunction(&mut self, conditions: &[Condition]) -> String {
        match conditions {
            [] => "1 = 1".to_string(),
            [single] => self.condition(single),
            many => {
                let parts: Vec<String> = many.iter().map(|c| self.condition(c)).collect();
                parts.join(" AND ")
            }
        }
    }

    fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Compare { left, op, right } => {
                let left = self.operand(left);
                let right = self.operand(right);
                format!("{} {} {}", left, op.to_sql(), right)
            }
            Condition::IsNull { operand, negated } => {
                let operand = self.operand(operand);
                let null_str = if *negated { "IS NOT NULL" } else { "IS NULL" };
                format!("{} {}", operand, null_str)
            }
            Condition::In { column, values } => {
                if values.is_empty() {
                    return "1 = 0".to_string();
                }
                let column = self.column(column);
                let values: Vec<String> = values.iter().map(|v| self.value(v)).collect();
                format!("{} IN ({})", column, values.join(", "))
            }
            Condition::And(parts) => {
                if parts.is_empty() {
                    return "1 = 1".to_string();
                }
                let parts: Vec<String> = parts.iter().map(|c| self.condition(c)).collect();
                format!("({})", parts.join(" AND "))
            }
            Condition::Or(parts) => {
                if parts.is_empty() {
                    return "1 = 0".to_string();
                }
                let parts: Vec<String> = parts.iter().map(|c| self.condition(c)).collect();
                format!("({})", parts.join(" OR "))
            }
            Condition::Not(inner) => format!("NOT {}", self.condition_grouped(inner)),
            Condition::Constant(true) => "1 = 1".to_string(),
            Condition::Constant(false) => "1 = 0".to_string(),
        }
    }

    fn condition_grouped(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::And(_) | Condition::Or(_) => self.condition(condition),
            other => format!("({})", self.condition(other)),
        }
    }
}
