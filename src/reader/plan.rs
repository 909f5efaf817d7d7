//! Turns a parsed document into a validated, schema-bound plan.
//!
//! Planning resolves every field, argument and fragment before the first
//! statement runs, so an invalid query never produces partial reads.

use serde_json::Value;
use std::collections::BTreeMap;

use super::Variables;
use crate::config::ReaderConfig;
use crate::document::{ArgumentValue, Document, FieldSelection, Selection};
use crate::errors::{EntityReaderError, SchemaError, SyntaxError, UnsupportedError};
use crate::expression::{parse_filter, parse_order, TypeContext};
use crate::resolver::{RelationResolver, ResolutionArguments};
use crate::schema_catalog::{
    EntityType, PropertyDefinition, PropertyKind, RelationDefinition, ScalarType, Schema,
    ABSTRACT_ENTITY_TYPE, SCALAR_TYPE_NAMES,
};

/// Pseudo field yielding the type tag of a row
pub const TYPENAME_FIELD: &str = "__typename";

const ARGUMENT_NAMES: [&str; 4] = ["order", "filter", "limit", "offset"];

#[derive(Debug)]
pub struct QueryPlan<'s> {
    pub roots: Vec<RootPlan<'s>>,
}

/// One root entity block
#[derive(Debug)]
pub struct RootPlan<'s> {
    pub response_key: String,
    pub entity: &'s EntityType,
    pub arguments: ResolutionArguments,
    pub selection: SelectionPlan<'s>,
}

/// Fields to project, per entity type a row may have
#[derive(Debug, Default)]
pub struct SelectionPlan<'s> {
    pub fields: BTreeMap<String, Vec<FieldPlan<'s>>>,
}

impl<'s> SelectionPlan<'s> {
    pub fn fields_for(&self, type_name: &str) -> &[FieldPlan<'s>] {
        self.fields.get(type_name).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug)]
pub struct FieldPlan<'s> {
    pub response_key: String,
    pub kind: FieldKind<'s>,
}

#[derive(Debug)]
pub enum FieldKind<'s> {
    Typename,
    Scalar {
        column: &'s str,
        scalar_type: ScalarType,
    },
    Relation(RelationPlan<'s>),
}

#[derive(Debug)]
pub struct RelationPlan<'s> {
    pub parent_type: &'s EntityType,
    pub property: &'s PropertyDefinition,
    pub relation: &'s RelationDefinition,
    pub resolver: RelationResolver,
    pub arguments: ResolutionArguments,
    pub selection: SelectionPlan<'s>,
}

pub struct Planner<'s> {
    schema: &'s Schema,
    config: &'s ReaderConfig,
    variables: &'s Variables,
}

impl<'s> Planner<'s> {
    pub fn new(schema: &'s Schema, config: &'s ReaderConfig, variables: &'s Variables) -> Self {
        Planner {
            schema,
            config,
            variables,
        }
    }

    pub fn plan(&self, document: &Document) -> Result<QueryPlan<'s>, EntityReaderError> {
        let mut roots: Vec<RootPlan<'s>> = Vec::new();
        for selection in &document.selections {
            let field = match selection {
                Selection::Field(field) => field,
                Selection::InlineFragment(fragment) => {
                    return Err(SchemaError::InvalidSelection {
                        type_name: "query".to_string(),
                        field: fragment.type_condition.clone(),
                        reason: "fragments are not allowed at the root".to_string(),
                    }
                    .into())
                }
            };
            if roots.iter().any(|r| r.response_key == field.response_key()) {
                return Err(SchemaError::InvalidSelection {
                    type_name: "query".to_string(),
                    field: field.response_key().to_string(),
                    reason: "response key is used twice".to_string(),
                }
                .into());
            }
            roots.push(self.plan_root(field)?);
        }
        Ok(QueryPlan { roots })
    }

    fn plan_root(&self, field: &FieldSelection) -> Result<RootPlan<'s>, EntityReaderError> {
        let entity = self.schema.require_entity_type(&field.name)?;
        let Some(selections) = &field.selections else {
            return Err(SchemaError::InvalidSelection {
                type_name: "query".to_string(),
                field: field.name.clone(),
                reason: "entity blocks need a selection set".to_string(),
            }
            .into());
        };

        let context = TypeContext::for_type(self.schema, entity);
        let arguments = self.plan_arguments(field, &context)?;
        let selection = self.plan_selection(selections, &context, 1)?;
        Ok(RootPlan {
            response_key: field.response_key().to_string(),
            entity,
            arguments,
            selection,
        })
    }

    /// Plan one selection set for every candidate type of `context`
    fn plan_selection(
        &self,
        selections: &[Selection],
        context: &TypeContext<'s>,
        depth: u32,
    ) -> Result<SelectionPlan<'s>, EntityReaderError> {
        let mut plan = SelectionPlan::default();
        for candidate in context.candidates() {
            plan.fields.insert(candidate.name.clone(), Vec::new());
        }
        self.collect(selections, context.candidates(), context, depth, &mut plan)?;
        Ok(plan)
    }

    fn collect(
        &self,
        selections: &[Selection],
        types: &[&'s EntityType],
        context: &TypeContext<'s>,
        depth: u32,
        plan: &mut SelectionPlan<'s>,
    ) -> Result<(), EntityReaderError> {
        for selection in selections {
            match selection {
                Selection::Field(field) => {
                    if field.name == TYPENAME_FIELD {
                        if !field.arguments.is_empty() || field.selections.is_some() {
                            return Err(SchemaError::InvalidSelection {
                                type_name: context.name().to_string(),
                                field: field.name.clone(),
                                reason: "takes neither arguments nor a selection set".to_string(),
                            }
                            .into());
                        }
                        for entity in types {
                            add_field(
                                plan,
                                &entity.name,
                                FieldPlan {
                                    response_key: field.response_key().to_string(),
                                    kind: FieldKind::Typename,
                                },
                            )?;
                        }
                        continue;
                    }

                    let defined = types
                        .iter()
                        .filter(|t| t.property(&field.name).is_some())
                        .count();
                    if defined == 0 {
                        let type_name = match types {
                            [single] => single.name.clone(),
                            _ => context.name().to_string(),
                        };
                        return Err(SchemaError::UnknownField {
                            type_name,
                            field: field.name.clone(),
                        }
                        .into());
                    }
                    if defined < types.len() {
                        return Err(SchemaError::InvalidSelection {
                            type_name: context.name().to_string(),
                            field: field.name.clone(),
                            reason: "not defined on every possible type; select it in a fragment"
                                .to_string(),
                        }
                        .into());
                    }
                    for entity in types {
                        let planned = self.plan_field(entity, field, depth)?;
                        add_field(plan, &entity.name, planned)?;
                    }
                }
                Selection::InlineFragment(fragment) => {
                    let condition = fragment.type_condition.as_str();
                    if condition == ABSTRACT_ENTITY_TYPE {
                        self.collect(&fragment.selections, types, context, depth, plan)?;
                        continue;
                    }
                    if SCALAR_TYPE_NAMES.contains(&condition) {
                        return Err(SchemaError::UnknownEntityType {
                            name: condition.to_string(),
                        }
                        .into());
                    }
                    let entity = self.schema.require_entity_type(condition)?;
                    match types.iter().find(|t| t.name == entity.name) {
                        Some(entity) => {
                            self.collect(&fragment.selections, &[*entity], context, depth, plan)?
                        }
                        None => {
                            return Err(SchemaError::QualifierNotApplicable {
                                qualifier: condition.to_string(),
                                context: context.name().to_string(),
                            }
                            .into())
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn plan_field(
        &self,
        entity: &'s EntityType,
        field: &FieldSelection,
        depth: u32,
    ) -> Result<FieldPlan<'s>, EntityReaderError> {
        let invalid = |reason: &str| SchemaError::InvalidSelection {
            type_name: entity.name.clone(),
            field: field.name.clone(),
            reason: reason.to_string(),
        };
        let property = entity
            .property(&field.name)
            .ok_or_else(|| SchemaError::UnknownField {
                type_name: entity.name.clone(),
                field: field.name.clone(),
            })?;

        let kind = match &property.kind {
            PropertyKind::Scalar(scalar_type) => {
                if field.selections.is_some() {
                    return Err(invalid("scalar fields take no selection set").into());
                }
                if let Some(argument) = field.arguments.first() {
                    return Err(SchemaError::InvalidArgument {
                        field: field.name.clone(),
                        name: argument.name.clone(),
                    }
                    .into());
                }
                FieldKind::Scalar {
                    column: property.column.as_str(),
                    scalar_type: *scalar_type,
                }
            }
            PropertyKind::Relation(relation) => {
                let Some(selections) = &field.selections else {
                    return Err(invalid("relation fields need a selection set").into());
                };
                if depth + 1 > self.config.max_selection_depth {
                    return Err(UnsupportedError::SelectionTooDeep {
                        max_depth: self.config.max_selection_depth,
                    }
                    .into());
                }

                let resolver = RelationResolver::for_relation(&entity.name, property, relation)?;
                resolver.validate(entity, property, relation)?;
                let targets = self.schema.relation_targets(relation)?;
                let context = TypeContext::new(
                    self.schema,
                    &format!("{}.{}", entity.name, property.name),
                    targets,
                );
                let arguments = self.plan_arguments(field, &context)?;
                let selection = self.plan_selection(selections, &context, depth + 1)?;
                FieldKind::Relation(RelationPlan {
                    parent_type: entity,
                    property,
                    relation,
                    resolver,
                    arguments,
                    selection,
                })
            }
        };

        Ok(FieldPlan {
            response_key: field.response_key().to_string(),
            kind,
        })
    }

    fn plan_arguments(
        &self,
        field: &FieldSelection,
        context: &TypeContext<'s>,
    ) -> Result<ResolutionArguments, EntityReaderError> {
        let invalid = |name: &str| SchemaError::InvalidArgument {
            field: field.name.clone(),
            name: name.to_string(),
        };

        if let Some(unknown) = field
            .arguments
            .iter()
            .find(|a| !ARGUMENT_NAMES.contains(&a.name.as_str()))
        {
            return Err(invalid(&unknown.name).into());
        }

        let mut arguments = ResolutionArguments::default();
        for name in ARGUMENT_NAMES {
            let Some(value) = field.argument(name) else {
                continue;
            };
            match (name, self.argument_value(value)?) {
                ("order", ArgumentValue::String(text)) => {
                    arguments.order = Some(parse_order(&text, context)?)
                }
                ("filter", ArgumentValue::String(text)) => {
                    arguments.filter = Some(parse_filter(&text, context)?)
                }
                ("limit", ArgumentValue::Int(n)) if n >= 0 => arguments.limit = Some(n as u64),
                ("offset", ArgumentValue::Int(n)) if n >= 0 => arguments.offset = Some(n as u64),
                (name, _) => return Err(invalid(name).into()),
            }
        }
        Ok(arguments)
    }

    /// Substitute variables; the result is never a variable
    fn argument_value(&self, value: &ArgumentValue) -> Result<ArgumentValue, EntityReaderError> {
        let ArgumentValue::Variable(name) = value else {
            return Ok(value.clone());
        };
        match self.variables.get(name) {
            Some(Value::String(s)) => Ok(ArgumentValue::String(s.clone())),
            Some(Value::Number(n)) if n.is_i64() => {
                Ok(ArgumentValue::Int(n.as_i64().unwrap_or_default()))
            }
            Some(other) => {
                log::debug!("Variable ${} has unsupported value {}", name, other);
                Err(SchemaError::InvalidArgument {
                    field: format!("${}", name),
                    name: name.clone(),
                }
                .into())
            }
            None => Err(SyntaxError::UnboundVariable { name: name.clone() }.into()),
        }
    }
}

/// Append `field` to the plan of `type_name`, merging identical duplicates
///
/// Repeated relation fields with equal arguments merge their selections.
fn add_field<'s>(
    plan: &mut SelectionPlan<'s>,
    type_name: &str,
    field: FieldPlan<'s>,
) -> Result<(), EntityReaderError> {
    let fields = plan.fields.entry(type_name.to_string()).or_default();
    let FieldPlan { response_key, kind } = field;
    let Some(index) = fields.iter().position(|f| f.response_key == response_key) else {
        fields.push(FieldPlan { response_key, kind });
        return Ok(());
    };

    match (&mut fields[index].kind, kind) {
        (FieldKind::Typename, FieldKind::Typename) => Ok(()),
        (FieldKind::Scalar { column: a, .. }, FieldKind::Scalar { column: b, .. }) if *a == b => {
            Ok(())
        }
        (FieldKind::Relation(a), FieldKind::Relation(b))
            if a.property.name == b.property.name && a.arguments == b.arguments =>
        {
            merge_selection(&mut a.selection, b.selection)
        }
        _ => Err(SchemaError::InvalidSelection {
            type_name: type_name.to_string(),
            field: response_key,
            reason: "response key is used for different fields".to_string(),
        }
        .into()),
    }
}

fn merge_selection<'s>(
    into: &mut SelectionPlan<'s>,
    from: SelectionPlan<'s>,
) -> Result<(), EntityReaderError> {
    for (type_name, fields) in from.fields {
        for field in fields {
            add_field(into, &type_name, field)?;
        }
    }
    Ok(())
}
