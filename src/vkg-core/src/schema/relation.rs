//! Relation definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use common_error::{VkgError, VkgResult};
use serde::{Deserialize, Serialize};

use crate::types::DbTermType;

/// Shared handle on a relation definition, used as the predicate of extensional atoms.
pub type RelationPredicate = Arc<RelationDefinition>;

fn default_nullable() -> bool {
    true
}

/// A column of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub db_type: DbTermType,
    /// Whether the column accepts NULL.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

/// A set of attributes whose values identify at most one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueConstraint {
    /// Constraint name.
    pub name: String,
    /// Attribute names.
    pub attributes: Vec<String>,
    /// Whether this is the primary key.
    #[serde(default)]
    pub primary_key: bool,
}

/// A database relation (table or view).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationDefinition {
    name: String,
    attributes: Vec<Attribute>,
    #[serde(default)]
    unique_constraints: Vec<UniqueConstraint>,
}

impl RelationDefinition {
    /// Start building a relation.
    pub fn builder(name: impl Into<String>) -> RelationBuilder {
        RelationBuilder {
            name: name.into(),
            attributes: Vec::new(),
            unique_constraints: Vec::new(),
        }
    }

    /// Relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns, in order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Number of columns.
    pub fn arity(&self) -> usize {
        self.attributes.len()
    }

    /// Declared unique constraints.
    pub fn unique_constraints(&self) -> &[UniqueConstraint] {
        &self.unique_constraints
    }

    /// 0-based position of the attribute named `name`.
    pub fn attribute_position(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    /// Whether the column at `position` accepts NULL. Unknown positions are nullable.
    pub fn is_nullable_at(&self, position: usize) -> bool {
        self.attributes.get(position).map_or(true, |a| a.nullable)
    }

    /// Column positions of every unique constraint.
    pub fn unique_constraint_positions(&self) -> Vec<Vec<usize>> {
        self.unique_constraints
            .iter()
            .filter_map(|uc| {
                uc.attributes
                    .iter()
                    .map(|name| self.attribute_position(name))
                    .collect::<Option<Vec<_>>>()
            })
            .collect()
    }

    /// Check that constraint attributes exist and that primary keys are not nullable.
    pub fn validate(&self) -> VkgResult<()> {
        let mut seen = std::collections::BTreeSet::new();
        for attribute in &self.attributes {
            if !seen.insert(attribute.name.as_str()) {
                return Err(VkgError::schema_error(format!(
                    "{}: duplicate attribute {}",
                    self.name, attribute.name
                )));
            }
        }
        for uc in &self.unique_constraints {
            for name in &uc.attributes {
                let position = self.attribute_position(name).ok_or_else(|| {
                    VkgError::schema_error(format!(
                        "{}: constraint {} refers to unknown attribute {name}",
                        self.name, uc.name
                    ))
                })?;
                if uc.primary_key && self.attributes[position].nullable {
                    return Err(VkgError::schema_error(format!(
                        "{}: primary key attribute {name} must not be nullable",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for RelationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Fluent builder for [`RelationDefinition`].
#[derive(Debug, Clone)]
pub struct RelationBuilder {
    name: String,
    attributes: Vec<Attribute>,
    unique_constraints: Vec<UniqueConstraint>,
}

impl RelationBuilder {
    /// Add a column.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, db_type: DbTermType, nullable: bool) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            db_type,
            nullable,
        });
        self
    }

    /// Declare the primary key.
    #[must_use]
    pub fn primary_key(mut self, attributes: &[&str]) -> Self {
        let name = format!("pk_{}", self.name);
        self.unique_constraints.push(UniqueConstraint {
            name,
            attributes: attributes.iter().map(|a| (*a).to_string()).collect(),
            primary_key: true,
        });
        self
    }

    /// Declare a unique constraint.
    #[must_use]
    pub fn unique(mut self, attributes: &[&str]) -> Self {
        let name = format!("uc_{}_{}", self.name, self.unique_constraints.len());
        self.unique_constraints.push(UniqueConstraint {
            name,
            attributes: attributes.iter().map(|a| (*a).to_string()).collect(),
            primary_key: false,
        });
        self
    }

    /// Validate and share the definition.
    pub fn build(self) -> VkgResult<RelationPredicate> {
        let relation = RelationDefinition {
            name: self.name,
            attributes: self.attributes,
            unique_constraints: self.unique_constraints,
        };
        relation.validate()?;
        Ok(Arc::new(relation))
    }
}

/// The relations known to the engine, by name.
#[derive(Debug, Clone, Default)]
pub struct DatabaseSchema {
    relations: BTreeMap<String, RelationPredicate>,
}

impl DatabaseSchema {
    /// Empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of relation definitions.
    pub fn from_json(json: &str) -> VkgResult<Self> {
        let definitions: Vec<RelationDefinition> = serde_json::from_str(json)?;
        let mut schema = Self::new();
        for definition in definitions {
            definition.validate()?;
            schema.insert(Arc::new(definition))?;
        }
        Ok(schema)
    }

    /// Register a relation; names must be unique.
    pub fn insert(&mut self, relation: RelationPredicate) -> VkgResult<()> {
        if self.relations.contains_key(relation.name()) {
            return Err(VkgError::schema_error(format!(
                "relation {} is already defined",
                relation.name()
            )));
        }
        self.relations.insert(relation.name().to_string(), relation);
        Ok(())
    }

    /// Look up a relation.
    pub fn get(&self, name: &str) -> VkgResult<RelationPredicate> {
        self.relations
            .get(name)
            .cloned()
            .ok_or_else(|| VkgError::schema_error(format!("unknown relation {name}")))
    }

    /// All relations, by name.
    pub fn relations(&self) -> impl Iterator<Item = &RelationPredicate> {
        self.relations.values()
    }
}
