pub mod config;
pub mod schema;

pub use config::SchemaConfig;
pub use schema::{
    AssociationTable, EnableColumns, EntityType, MatchFields, PropertyDefinition, PropertyKind,
    RelationDefinition, RelationKind, RelationStorage, ScalarType, Schema, ABSTRACT_ENTITY_TYPE,
    SCALAR_TYPE_NAMES,
};
