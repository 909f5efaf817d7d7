use nom::{
    branch::alt,
    character::complete::{char, multispace0},
    combinator::{all_consuming, map},
    multi::separated_list1,
    sequence::delimited,
    IResult, Parser,
};
use std::fmt;

use super::common::{keyword, near, ws};
use super::field_ref::{parse_field_ref, FieldRef, FieldUsage, ResolvedField, TypeContext};
use crate::errors::{EntityReaderError, SyntaxError};
use crate::query_builder::SortDirection;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub field: FieldRef,
    pub direction: SortDirection,
}

/// Parsed, unresolved `order` argument
#[derive(Debug, Clone, PartialEq)]
pub struct OrderExpression {
    pub items: Vec<OrderItem>,
}

pub fn parse_order_item(input: &str) -> IResult<&str, OrderItem> {
    let (input, field) = parse_field_ref(input)?;
    let (input, direction) = ws(alt((
        map(keyword("ascending"), |_| SortDirection::Ascending),
        map(keyword("descending"), |_| SortDirection::Descending),
    )))
    .parse(input)?;
    Ok((input, OrderItem { field, direction }))
}

impl OrderExpression {
    pub fn parse(text: &str) -> Result<Self, SyntaxError> {
        let parsed = all_consuming(ws(separated_list1(
            delimited(multispace0, char(','), multispace0),
            parse_order_item,
        )))
        .parse(text);

        match parsed {
            Ok((_, items)) => Ok(OrderExpression { items }),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(SyntaxError::Order {
                expression: text.to_string(),
                near: near(e.input),
            }),
            Err(nom::Err::Incomplete(_)) => Err(SyntaxError::Order {
                expression: text.to_string(),
                near: near(""),
            }),
        }
    }

    pub fn resolve(&self, context: &TypeContext<'_>) -> Result<OrderSpec, EntityReaderError> {
        let terms = self
            .items
            .iter()
            .map(|item| {
                Ok(OrderTerm {
                    field: context.resolve(&item.field, FieldUsage::Order)?,
                    direction: item.direction,
                })
            })
            .collect::<Result<Vec<_>, EntityReaderError>>()?;
        Ok(OrderSpec { terms })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub field: ResolvedField,
    pub direction: SortDirection,
}

/// Order terms resolved against a type context
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderSpec {
    pub terms: Vec<OrderTerm>,
}

impl OrderSpec {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Canonical text, stable across whitespace and keyword case
impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self
            .terms
            .iter()
            .map(|t| {
                let direction = match t.direction {
                    SortDirection::Ascending => "ascending",
                    SortDirection::Descending => "descending",
                };
                format!("{} {}", t.field, direction)
            })
            .collect();
        write!(f, "{}", terms.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::field_ref::tests::fixture_schema;
    use test_case::test_case;

    #[test]
    fn test_parse_order_item_with_qualifier() {
        let (rest, item) = parse_order_item("title on pages descending").unwrap();
        assert_eq!(rest, "");
        assert_eq!(item.field, FieldRef::qualified("title", "pages"));
        assert_eq!(item.direction, SortDirection::Descending);
    }

    #[test]
    fn test_parse_multiple_terms() {
        let order = OrderExpression::parse(
            "pid ascending, title on pages ascending,header on tt_content DESCENDING",
        )
        .unwrap();
        assert_eq!(order.items.len(), 3);
        assert_eq!(order.items[2].field, FieldRef::qualified("header", "tt_content"));
        assert_eq!(order.items[2].direction, SortDirection::Descending);
    }

    #[test_case(""; "empty")]
    #[test_case("title"; "missing direction")]
    #[test_case("title up"; "unknown direction")]
    #[test_case("title ascending,"; "dangling comma")]
    #[test_case("title on ascending"; "missing qualifier")]
    fn test_syntax_errors(text: &str) {
        let err = OrderExpression::parse(text).unwrap_err();
        assert!(matches!(err, SyntaxError::Order { .. }), "{:?}", err);
    }

    #[test]
    fn test_resolve_and_canonical_text() {
        let schema = fixture_schema();
        let context = TypeContext::new(
            &schema,
            "tx_persistence_entity.relation_group",
            vec![
                schema.entity_type("tt_content").unwrap(),
                schema.entity_type("pages").unwrap(),
            ],
        );
        let spec = OrderExpression::parse("  pid   ASCENDING ,title on pages descending ")
            .unwrap()
            .resolve(&context)
            .unwrap();
        assert_eq!(spec.to_string(), "pid ascending, title on pages descending");
    }
}
