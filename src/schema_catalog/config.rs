use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::schema::{
    AssociationTable, EnableColumns, EntityType, MatchFields, PropertyDefinition, PropertyKind,
    RelationDefinition, RelationKind, RelationStorage, ScalarType, Schema,
};
use crate::errors::SchemaError;

/// Entity schemas are defined in YAML with the following structure:
///
/// ```yaml
/// types:
///   - name: tx_persistence_entity      # Entity type name used in queries
///     table: tx_persistence_entity     # Source table (defaults to name)
///     key: uid                         # Key column (defaults to uid)
///     enable_columns:                  # Optional visibility columns
///       deleted: deleted
///       disabled: hidden
///     properties:
///       - { name: title, type: string }
///       - name: relation_select_mn_mm_content
///         relation: many-to-many-select
///         target: tt_content
///         association:
///           table: tx_persistence_entity_mm
///           match_fields: { fieldname: relation_select_mn_mm_content }
///           sorting: sorting
/// ```
///
/// A relation without `foreign_field`, `association` or `pairing` block stores
/// its keys as a comma-separated list in the parent's own column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub types: Vec<EntityTypeDefinition>,
}

/// Entity type definition in schema config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTypeDefinition {
    pub name: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default = "default_key_column")]
    pub key: String,
    #[serde(default)]
    pub enable_columns: EnableColumns,
    pub properties: Vec<PropertyConfig>,
}

fn default_key_column() -> String {
    "uid".to_string()
}

/// One or many relation targets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetList {
    One(String),
    Many(Vec<String>),
}

impl TargetList {
    fn into_vec(self) -> Vec<String> {
        match self {
            TargetList::One(target) => vec![target],
            TargetList::Many(targets) => targets,
        }
    }
}

/// Property definition in schema config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyConfig {
    pub name: String,
    /// Storage column (defaults to name)
    #[serde(default)]
    pub column: Option<String>,
    /// Scalar type; mutually exclusive with `relation`
    #[serde(default, rename = "type")]
    pub scalar_type: Option<ScalarType>,
    #[serde(default)]
    pub relation: Option<RelationKind>,
    #[serde(default)]
    pub target: Option<TargetList>,
    #[serde(default)]
    pub sorting: Option<String>,
    #[serde(default)]
    pub foreign_field: Option<ForeignFieldConfig>,
    #[serde(default)]
    pub association: Option<AssociationConfig>,
    #[serde(default)]
    pub pairing: Option<PairingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignFieldConfig {
    pub field: String,
    #[serde(default)]
    pub table_field: Option<String>,
    #[serde(default)]
    pub match_fields: MatchFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationConfig {
    pub table: String,
    #[serde(default = "default_local_column")]
    pub local_column: String,
    #[serde(default = "default_foreign_column")]
    pub foreign_column: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub match_fields: MatchFields,
    #[serde(default)]
    pub sorting: Option<String>,
}

fn default_local_column() -> String {
    "uid_local".to_string()
}

fn default_foreign_column() -> String {
    "uid_foreign".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingConfig {
    pub table: String,
    pub local_field: String,
    pub peer_field: String,
    #[serde(default)]
    pub sorting: Option<String>,
    #[serde(default)]
    pub sorting_opposite: Option<String>,
}

impl SchemaConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, SchemaError> {
        serde_yaml::from_str(content).map_err(|e| SchemaError::Load {
            message: e.to_string(),
        })
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| SchemaError::Load {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Convert to the runtime schema
    pub fn into_schema(self) -> Result<Schema, SchemaError> {
        let types = self
            .types
            .into_iter()
            .map(EntityTypeDefinition::into_entity_type)
            .collect::<Result<Vec<_>, _>>()?;
        Schema::new(types)
    }
}

impl EntityTypeDefinition {
    fn into_entity_type(self) -> Result<EntityType, SchemaError> {
        let properties = self
            .properties
            .into_iter()
            .map(|p| p.into_property(&self.name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = std::collections::HashSet::new();
        for property in &properties {
            if !seen.insert(property.name.as_str()) {
                return Err(SchemaError::Load {
                    message: format!("property `{}.{}` is defined twice", self.name, property.name),
                });
            }
        }

        let table = self.table.unwrap_or_else(|| self.name.clone());
        Ok(EntityType::new(
            &self.name,
            &table,
            &self.key,
            self.enable_columns,
            properties,
        ))
    }
}

impl PropertyConfig {
    fn into_property(self, type_name: &str) -> Result<PropertyDefinition, SchemaError> {
        let load_error = |message: &str| SchemaError::Load {
            message: format!("property `{}.{}`: {}", type_name, self.name, message),
        };

        let kind = match (self.scalar_type, self.relation) {
            (Some(scalar_type), None) => PropertyKind::Scalar(scalar_type),
            (None, Some(kind)) => {
                let storage_blocks = [
                    self.foreign_field.is_some(),
                    self.association.is_some(),
                    self.pairing.is_some(),
                ];
                if storage_blocks.iter().filter(|b| **b).count() > 1 {
                    return Err(load_error("more than one storage block"));
                }

                let storage = if let Some(ff) = self.foreign_field.clone() {
                    RelationStorage::ForeignField {
                        field: ff.field,
                        table_field: ff.table_field,
                        match_fields: ff.match_fields,
                    }
                } else if let Some(mm) = self.association.clone() {
                    RelationStorage::Association(AssociationTable {
                        table: mm.table,
                        local_column: mm.local_column,
                        foreign_column: mm.foreign_column,
                        discriminator: mm.discriminator,
                        match_fields: mm.match_fields,
                        sorting: mm.sorting,
                    })
                } else if let Some(pairing) = self.pairing.clone() {
                    RelationStorage::Pairing {
                        table: pairing.table,
                        local_field: pairing.local_field,
                        peer_field: pairing.peer_field,
                        sorting: pairing.sorting,
                        sorting_opposite: pairing.sorting_opposite,
                    }
                } else {
                    RelationStorage::Csv
                };

                let targets = self
                    .target
                    .clone()
                    .map(TargetList::into_vec)
                    .ok_or_else(|| load_error("relation without target"))?;

                PropertyKind::Relation(RelationDefinition {
                    kind,
                    targets,
                    storage,
                    sorting_field: self.sorting.clone(),
                })
            }
            (Some(_), Some(_)) => return Err(load_error("both `type` and `relation` given")),
            (None, None) => return Err(load_error("either `type` or `relation` is required")),
        };

        Ok(PropertyDefinition {
            column: self.column.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            kind,
        })
    }
}

impl Schema {
    /// Load a schema from YAML content
    pub fn from_yaml_str(content: &str) -> Result<Self, SchemaError> {
        SchemaConfig::from_yaml_str(content)?.into_schema()
    }

    /// Load a schema from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        SchemaConfig::from_yaml_file(path)?.into_schema()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_builder::Literal;

    const YAML: &str = r#"
types:
  - name: tt_content
    enable_columns: { deleted: deleted }
    properties:
      - { name: uid, type: int }
      - { name: header, type: string }
  - name: pages
    properties:
      - { name: uid, type: int }
      - { name: title, type: string, column: page_title }
  - name: entity
    table: tx_entity
    properties:
      - { name: uid, type: int }
      - name: content
        relation: many-to-many-select
        target: tt_content
        association:
          table: tx_entity_mm
          match_fields: { fieldname: content }
          sorting: sorting
      - name: records
        relation: group-polymorphic
        target: [tt_content, pages]
      - name: files
        relation: one-to-many-inline
        target: tt_content
        sorting: sorting_foreign
        foreign_field: { field: uid_foreign, table_field: tablenames }
"#;

    #[test]
    fn test_load_schema_from_yaml() {
        let schema = Schema::from_yaml_str(YAML).unwrap();

        let pages = schema.entity_type("pages").unwrap();
        assert_eq!(pages.table, "pages");
        assert_eq!(pages.key_column, "uid");
        assert_eq!(pages.property("title").unwrap().column, "page_title");

        let entity = schema.entity_type("entity").unwrap();
        assert_eq!(entity.table, "tx_entity");

        let content = entity.property("content").unwrap().relation_definition().unwrap();
        assert_eq!(content.kind, RelationKind::ManyToManySelect);
        match &content.storage {
            RelationStorage::Association(mm) => {
                assert_eq!(mm.table, "tx_entity_mm");
                assert_eq!(mm.local_column, "uid_local");
                assert_eq!(mm.foreign_column, "uid_foreign");
                assert_eq!(mm.sorting.as_deref(), Some("sorting"));
                assert_eq!(
                    mm.match_fields.get("fieldname"),
                    Some(&Literal::String("content".to_string()))
                );
            }
            other => panic!("expected association storage, got {:?}", other),
        }

        let records = entity.property("records").unwrap().relation_definition().unwrap();
        assert_eq!(records.targets, vec!["tt_content", "pages"]);
        assert_eq!(records.storage, RelationStorage::Csv);
        let tables: Vec<&str> = schema
            .relation_targets(records)
            .unwrap()
            .iter()
            .map(|t| t.table.as_str())
            .collect();
        assert_eq!(tables, vec!["tt_content", "pages"]);

        let files = entity.property("files").unwrap().relation_definition().unwrap();
        assert_eq!(files.sorting_field.as_deref(), Some("sorting_foreign"));
        assert!(matches!(
            &files.storage,
            RelationStorage::ForeignField { table_field: Some(t), .. } if t == "tablenames"
        ));
    }

    #[test]
    fn test_property_needs_exactly_one_of_type_or_relation() {
        let yaml = r#"
types:
  - name: pages
    properties:
      - { name: uid }
"#;
        assert!(matches!(
            Schema::from_yaml_str(yaml),
            Err(SchemaError::Load { .. })
        ));
    }

    #[test]
    fn test_relation_with_two_storage_blocks_is_rejected() {
        let yaml = r#"
types:
  - name: pages
    properties:
      - name: sub
        relation: many-to-many-select
        target: pages
        foreign_field: { field: pid }
        association: { table: mm }
"#;
        let err = Schema::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("more than one storage block"));
    }

    #[test]
    fn test_missing_file_is_a_load_error() {
        let err = Schema::from_yaml_file("/nonexistent/schema.yaml").unwrap_err();
        assert_eq!(err.code(), 1560670207);
    }
}
