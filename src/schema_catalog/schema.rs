use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::errors::SchemaError;
use crate::query_builder::Literal;

/// Names the query language reserves for built-in scalar types
pub const SCALAR_TYPE_NAMES: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];

/// Name of the abstract interface every entity type implements
pub const ABSTRACT_ENTITY_TYPE: &str = "Entity";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Int,
    Float,
    String,
    Bool,
}

/// How two entity types are linked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    OneToManyInline,
    ManyToManyInline,
    ManyToManySelect,
    GroupPolymorphic,
    SymmetricSelfRelation,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::OneToManyInline => "one-to-many-inline",
            RelationKind::ManyToManyInline => "many-to-many-inline",
            RelationKind::ManyToManySelect => "many-to-many-select",
            RelationKind::GroupPolymorphic => "group-polymorphic",
            RelationKind::SymmetricSelfRelation => "symmetric-self-relation",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column/value constraints a relation's storage rows must match
pub type MatchFields = BTreeMap<String, Literal>;

/// Association ("MM") table linking parent keys to child keys
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationTable {
    pub table: String,
    pub local_column: String,
    pub foreign_column: String,
    /// Column naming the child table per row (required by multi-table group relations)
    pub discriminator: Option<String>,
    pub match_fields: MatchFields,
    pub sorting: Option<String>,
}

/// Where the rows linking parent and child are stored
#[derive(Debug, Clone, PartialEq)]
pub enum RelationStorage {
    /// Child rows carry the parent key in `field`
    ForeignField {
        field: String,
        /// Column on the child that must hold the parent's table name
        table_field: Option<String>,
        match_fields: MatchFields,
    },
    /// The parent's own column holds comma-separated child keys
    Csv,
    Association(AssociationTable),
    /// Rows of a pairing table link two rows of the same table, in either direction
    Pairing {
        table: String,
        local_field: String,
        peer_field: String,
        /// Orders the peers of the local row
        sorting: Option<String>,
        /// Orders the local rows seen from the peer side; falls back to `sorting`
        sorting_opposite: Option<String>,
    },
}

impl RelationStorage {
    pub fn name(&self) -> &'static str {
        match self {
            RelationStorage::ForeignField { .. } => "foreign-field",
            RelationStorage::Csv => "csv",
            RelationStorage::Association(_) => "association",
            RelationStorage::Pairing { .. } => "pairing",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationDefinition {
    pub kind: RelationKind,
    /// Target entity type names; more than one only for group relations
    pub targets: Vec<String>,
    pub storage: RelationStorage,
    /// Child column giving the default order of related rows
    pub sorting_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    Scalar(ScalarType),
    Relation(RelationDefinition),
}

/// One field of an entity type. Immutable once the schema is built.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDefinition {
    pub name: String,
    pub column: String,
    pub kind: PropertyKind,
}

impl PropertyDefinition {
    pub fn scalar(name: &str, scalar_type: ScalarType) -> Self {
        PropertyDefinition {
            name: name.to_string(),
            column: name.to_string(),
            kind: PropertyKind::Scalar(scalar_type),
        }
    }

    pub fn relation(name: &str, relation: RelationDefinition) -> Self {
        PropertyDefinition {
            name: name.to_string(),
            column: name.to_string(),
            kind: PropertyKind::Relation(relation),
        }
    }

    pub fn is_relation(&self) -> bool {
        matches!(self.kind, PropertyKind::Relation(_))
    }

    pub fn relation_definition(&self) -> Option<&RelationDefinition> {
        match &self.kind {
            PropertyKind::Relation(relation) => Some(relation),
            PropertyKind::Scalar(_) => None,
        }
    }

    pub fn scalar_type(&self) -> Option<ScalarType> {
        match &self.kind {
            PropertyKind::Scalar(scalar_type) => Some(*scalar_type),
            PropertyKind::Relation(_) => None,
        }
    }

    /// Two definitions can be addressed by one unqualified reference
    pub fn is_compatible_with(&self, other: &PropertyDefinition) -> bool {
        match (&self.kind, &other.kind) {
            (PropertyKind::Scalar(a), PropertyKind::Scalar(b)) => a == b,
            (PropertyKind::Relation(_), PropertyKind::Relation(_)) => true,
            _ => false,
        }
    }
}

/// Visibility columns honoured by [`crate::reader::AccessContext`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableColumns {
    #[serde(default)]
    pub deleted: Option<String>,
    #[serde(default)]
    pub disabled: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EntityType {
    pub name: String,
    pub table: String,
    pub key_column: String,
    pub enable_columns: EnableColumns,
    properties: Vec<PropertyDefinition>,
    index: HashMap<String, usize>,
}

impl EntityType {
    pub fn new(
        name: &str,
        table: &str,
        key_column: &str,
        enable_columns: EnableColumns,
        properties: Vec<PropertyDefinition>,
    ) -> Self {
        let index = properties
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();
        EntityType {
            name: name.to_string(),
            table: table.to_string(),
            key_column: key_column.to_string(),
            enable_columns,
            properties,
            index,
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.index.get(name).map(|&i| &self.properties[i])
    }

    pub fn properties(&self) -> &[PropertyDefinition] {
        &self.properties
    }

    pub fn scalar_properties(&self) -> impl Iterator<Item = &PropertyDefinition> {
        self.properties.iter().filter(|p| !p.is_relation())
    }

    /// Columns fetched for every row of this type: key, scalar columns and
    /// the columns holding comma-separated relation values
    pub fn storage_columns(&self) -> Vec<&str> {
        let csv_relations = self.properties.iter().filter(|p| {
            p.relation_definition()
                .is_some_and(|r| r.storage == RelationStorage::Csv)
        });
        let mut columns = vec![self.key_column.as_str()];
        for property in self.scalar_properties().chain(csv_relations) {
            if !columns.contains(&property.column.as_str()) {
                columns.push(property.column.as_str());
            }
        }
        columns
    }
}

/// Process-scoped, read-only entity schema
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: BTreeMap<String, EntityType>,
}

impl Schema {
    /// Build a schema, checking that names are not reserved and relation targets exist
    pub fn new(types: Vec<EntityType>) -> Result<Self, SchemaError> {
        let mut map = BTreeMap::new();
        for entity in types {
            if SCALAR_TYPE_NAMES.contains(&entity.name.as_str())
                || entity.name == ABSTRACT_ENTITY_TYPE
            {
                return Err(SchemaError::Load {
                    message: format!("entity type name `{}` is reserved", entity.name),
                });
            }
            if map.contains_key(&entity.name) {
                return Err(SchemaError::Load {
                    message: format!("entity type `{}` is defined twice", entity.name),
                });
            }
            map.insert(entity.name.clone(), entity);
        }

        let schema = Schema { types: map };
        for entity in schema.types.values() {
            for property in entity.properties() {
                if let Some(relation) = property.relation_definition() {
                    if relation.targets.is_empty() {
                        return Err(SchemaError::Load {
                            message: format!(
                                "relation `{}.{}` has no target type",
                                entity.name, property.name
                            ),
                        });
                    }
                    schema.relation_targets(relation)?;
                }
            }
        }
        Ok(schema)
    }

    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        self.types.get(name)
    }

    pub fn require_entity_type(&self, name: &str) -> Result<&EntityType, SchemaError> {
        self.entity_type(name)
            .ok_or_else(|| SchemaError::UnknownEntityType {
                name: name.to_string(),
            })
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.values()
    }

    /// Target entity types of a relation, in declaration order
    pub fn relation_targets(
        &self,
        relation: &RelationDefinition,
    ) -> Result<Vec<&EntityType>, SchemaError> {
        relation
            .targets
            .iter()
            .map(|t| self.require_entity_type(t))
            .collect()
    }
}
