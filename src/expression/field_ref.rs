use nom::{
    bytes::complete::tag,
    combinator::opt,
    multi::separated_list1,
    sequence::preceded,
    IResult, Parser,
};
use std::collections::BTreeMap;
use std::fmt;

use super::common::{identifier, keyword, ws};
use crate::errors::{EntityReaderError, SchemaError, UnsupportedError};
use crate::schema_catalog::{
    EntityType, PropertyDefinition, ScalarType, Schema, ABSTRACT_ENTITY_TYPE, SCALAR_TYPE_NAMES,
};

/// `field`, `relation.field` or `field on Type`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub path: Vec<String>,
    pub qualifier: Option<String>,
}

impl FieldRef {
    pub fn new(field: &str) -> Self {
        FieldRef {
            path: vec![field.to_string()],
            qualifier: None,
        }
    }

    pub fn qualified(field: &str, qualifier: &str) -> Self {
        FieldRef {
            path: vec![field.to_string()],
            qualifier: Some(qualifier.to_string()),
        }
    }

    pub fn head(&self) -> &str {
        &self.path[0]
    }

    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dotted_path())?;
        if let Some(qualifier) = &self.qualifier {
            write!(f, " on {}", qualifier)?;
        }
        Ok(())
    }
}

pub fn parse_field_ref(input: &str) -> IResult<&str, FieldRef> {
    let (input, path) = separated_list1(tag("."), identifier).parse(input)?;
    let (input, qualifier) = opt(preceded(ws(keyword("on")), identifier)).parse(input)?;
    Ok((
        input,
        FieldRef {
            path: path.into_iter().map(String::from).collect(),
            qualifier: qualifier.map(String::from),
        },
    ))
}

/// Where a field reference is used; decides the error for relation fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUsage {
    Order,
    Filter,
}

/// A field reference checked against the candidate types of its context
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub name: String,
    pub qualifier: Option<String>,
    pub scalar_type: ScalarType,
    /// Storage column per entity type the reference applies to
    columns: BTreeMap<String, String>,
}

impl ResolvedField {
    /// Column backing this field on `type_name`, `None` for other branches
    pub fn column_for(&self, type_name: &str) -> Option<&str> {
        self.columns.get(type_name).map(String::as_str)
    }

    pub fn applies_to(&self, type_name: &str) -> bool {
        self.columns.contains_key(type_name)
    }
}

impl fmt::Display for ResolvedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(qualifier) = &self.qualifier {
            write!(f, " on {}", qualifier)?;
        }
        Ok(())
    }
}

/// The entity types an expression may refer to
///
/// A root query has one candidate; a relation field has one candidate per
/// target type of the relation.
#[derive(Debug, Clone)]
pub struct TypeContext<'s> {
    schema: &'s Schema,
    name: String,
    candidates: Vec<&'s EntityType>,
}

impl<'s> TypeContext<'s> {
    pub fn new(schema: &'s Schema, name: &str, candidates: Vec<&'s EntityType>) -> Self {
        TypeContext {
            schema,
            name: name.to_string(),
            candidates,
        }
    }

    /// Context of a root entity query
    pub fn for_type(schema: &'s Schema, entity: &'s EntityType) -> Self {
        Self::new(schema, &entity.name, vec![entity])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn candidates(&self) -> &[&'s EntityType] {
        &self.candidates
    }

    pub fn resolve(
        &self,
        field: &FieldRef,
        usage: FieldUsage,
    ) -> Result<ResolvedField, EntityReaderError> {
        let types = match &field.qualifier {
            Some(qualifier) => vec![self.qualifying_type(qualifier)?],
            None => self.candidates.clone(),
        };

        let head = field.head();
        let definitions: Vec<(&EntityType, &PropertyDefinition)> = types
            .iter()
            .filter_map(|t| t.property(head).map(|p| (*t, p)))
            .collect();

        if definitions.is_empty() {
            let type_name = match &field.qualifier {
                Some(qualifier) => qualifier.clone(),
                None => self.name.clone(),
            };
            return Err(SchemaError::UnknownField {
                type_name,
                field: field.dotted_path(),
            }
            .into());
        }

        if definitions.iter().any(|(_, p)| p.is_relation()) {
            let field = field.dotted_path();
            return Err(match usage {
                FieldUsage::Order => UnsupportedError::OrderByRelation { field },
                FieldUsage::Filter => UnsupportedError::FilterOnRelation { field },
            }
            .into());
        }

        if field.path.len() > 1 {
            return Err(SchemaError::UnknownField {
                type_name: definitions[0].0.name.clone(),
                field: field.dotted_path(),
            }
            .into());
        }

        if definitions.len() < types.len() {
            return Err(UnsupportedError::HeterogeneousBranches {
                field: head.to_string(),
                types: definitions.iter().map(|(t, _)| t.name.clone()).collect(),
            }
            .into());
        }

        let (_, first) = definitions[0];
        if definitions.iter().any(|(_, p)| !p.is_compatible_with(first)) {
            return Err(SchemaError::AmbiguousField {
                field: head.to_string(),
                types: definitions.iter().map(|(t, _)| t.name.clone()).collect(),
            }
            .into());
        }

        let scalar_type = first.scalar_type().ok_or_else(|| SchemaError::UnknownField {
            type_name: self.name.clone(),
            field: head.to_string(),
        })?;

        Ok(ResolvedField {
            name: head.to_string(),
            qualifier: field.qualifier.clone(),
            scalar_type,
            columns: definitions
                .iter()
                .map(|(t, p)| (t.name.clone(), p.column.clone()))
                .collect(),
        })
    }

    fn qualifying_type(&self, qualifier: &str) -> Result<&'s EntityType, EntityReaderError> {
        if SCALAR_TYPE_NAMES.contains(&qualifier) {
            return Err(UnsupportedError::ScalarQualifier {
                qualifier: qualifier.to_string(),
            }
            .into());
        }
        if qualifier == ABSTRACT_ENTITY_TYPE {
            return Err(UnsupportedError::AbstractQualifier {
                qualifier: qualifier.to_string(),
            }
            .into());
        }
        if self.schema.entity_type(qualifier).is_none() {
            return Err(SchemaError::UnknownQualifier {
                qualifier: qualifier.to_string(),
            }
            .into());
        }
        self.candidates
            .iter()
            .find(|t| t.name == qualifier)
            .copied()
            .ok_or_else(|| {
                SchemaError::QualifierNotApplicable {
                    qualifier: qualifier.to_string(),
                    context: self.name.clone(),
                }
                .into()
            })
    }
}
