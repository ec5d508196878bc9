//! Relational schema: relations, attributes and unique constraints.

mod relation;

pub use relation::{
    Attribute, DatabaseSchema, RelationBuilder, RelationDefinition, RelationPredicate,
    UniqueConstraint,
};
