//! Leaf nodes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use common_display::truncate_string;
use vkg_core::{
    DataAtom, DbTermType, IntensionalPredicate, RelationDefinition, RelationPredicate,
    Substitution, Variable, VariableNullability,
};

use super::VariableList;
use crate::tree::UniqueConstraints;

/// Maximum length of the query string in the one-line form of a native node.
const NATIVE_LABEL_WIDTH: usize = 60;

// ========== Extensional data ==========

/// Access to a relation of the database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionalDataNode {
    atom: DataAtom<RelationPredicate>,
}

impl ExtensionalDataNode {
    pub(crate) fn new(atom: DataAtom<RelationPredicate>) -> Self {
        Self { atom }
    }

    pub fn atom(&self) -> &DataAtom<RelationPredicate> {
        &self.atom
    }

    pub fn relation(&self) -> &RelationDefinition {
        self.atom.predicate()
    }

    /// A variable is nullable when it occurs once, at a nullable column.
    /// Repeated occurrences are compared with SQL equality.
    pub(crate) fn variable_nullability(&self) -> VariableNullability {
        let mut occurrences: BTreeMap<&Variable, Vec<usize>> = BTreeMap::new();
        for (position, argument) in self.atom.arguments().iter().enumerate() {
            if let Some(v) = argument.as_variable() {
                occurrences.entry(v).or_default().push(position);
            }
        }
        let nullable = occurrences
            .into_iter()
            .filter(|(_, positions)| {
                positions.len() == 1 && self.relation().is_nullable_at(positions[0])
            })
            .map(|(v, _)| BTreeSet::from([v.clone()]));
        VariableNullability::new(nullable, self.atom.variables())
    }

    /// Unique constraints of the relation over non-nullable columns,
    /// expressed on the arguments. Constant positions are dropped.
    pub(crate) fn unique_constraints(&self) -> UniqueConstraints {
        let relation = self.relation();
        let arguments = self.atom.arguments();
        relation
            .unique_constraint_positions()
            .into_iter()
            .filter(|positions| positions.iter().all(|p| !relation.is_nullable_at(*p)))
            .filter_map(|positions| {
                positions
                    .iter()
                    .map(|p| arguments.get(*p))
                    .collect::<Option<Vec<_>>>()
                    .map(|args| {
                        args.into_iter()
                            .filter_map(|a| a.as_variable().cloned())
                            .collect::<BTreeSet<_>>()
                    })
            })
            .collect()
    }

    pub(crate) fn apply_substitution(&self, substitution: &Substitution) -> Self {
        Self::new(
            self.atom
                .with_arguments(substitution.apply_to_terms(self.atom.arguments())),
        )
    }
}

impl fmt::Display for ExtensionalDataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EXTENSIONAL {}", self.atom)
    }
}

// ========== Intensional data ==========

/// Access to a virtual relation, replaced by its definition before
/// translation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntensionalDataNode {
    atom: DataAtom<IntensionalPredicate>,
}

impl IntensionalDataNode {
    pub(crate) fn new(atom: DataAtom<IntensionalPredicate>) -> Self {
        Self { atom }
    }

    pub fn atom(&self) -> &DataAtom<IntensionalPredicate> {
        &self.atom
    }

    pub(crate) fn apply_substitution(&self, substitution: &Substitution) -> Self {
        Self::new(
            self.atom
                .with_arguments(substitution.apply_to_terms(self.atom.arguments())),
        )
    }
}

impl fmt::Display for IntensionalDataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INTENSIONAL {}", self.atom)
    }
}

// ========== Native ==========

/// An opaque query in the native language of the database.
///
/// Native nodes are terminal: they are produced last and no rewriting
/// applies to them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeNode {
    variables: BTreeSet<Variable>,
    type_map: BTreeMap<Variable, DbTermType>,
    column_names: BTreeMap<Variable, String>,
    query_string: String,
    nullability: VariableNullability,
}

impl NativeNode {
    pub(crate) fn new(
        variables: BTreeSet<Variable>,
        type_map: BTreeMap<Variable, DbTermType>,
        column_names: BTreeMap<Variable, String>,
        query_string: String,
        nullability: VariableNullability,
    ) -> Self {
        Self {
            variables,
            type_map,
            column_names,
            query_string,
            nullability,
        }
    }

    pub fn variables(&self) -> &BTreeSet<Variable> {
        &self.variables
    }

    /// Database type of each projected variable.
    pub fn type_map(&self) -> &BTreeMap<Variable, DbTermType> {
        &self.type_map
    }

    /// Column of the native result holding each projected variable.
    pub fn column_names(&self) -> &BTreeMap<Variable, String> {
        &self.column_names
    }

    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    pub fn variable_nullability(&self) -> &VariableNullability {
        &self.nullability
    }
}

impl fmt::Display for NativeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NATIVE {} {}",
            VariableList(&self.variables),
            truncate_string(&self.query_string, NATIVE_LABEL_WIDTH)
        )
    }
}

// ========== Empty ==========

/// No row, over a set of projected variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmptyNode {
    projected: BTreeSet<Variable>,
}

impl EmptyNode {
    pub(crate) fn new(projected: BTreeSet<Variable>) -> Self {
        Self { projected }
    }

    pub fn projected_variables(&self) -> &BTreeSet<Variable> {
        &self.projected
    }
}

impl fmt::Display for EmptyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EMPTY {}", VariableList(&self.projected))
    }
}
