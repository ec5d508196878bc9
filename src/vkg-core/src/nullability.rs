//! Nullability of the variables projected by a query tree.
//!
//! Nullable variables are partitioned into groups: the variables of a group
//! are NULL together (a typical group is the set of right-specific variables
//! of a left join). A variable of the scope that belongs to no group is never
//! NULL.

use std::collections::BTreeSet;

use crate::substitution::Substitution;
use crate::term::{Expression, Term, Variable};

/// Disjoint groups of nullable variables within a scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VariableNullability {
    nullable_groups: BTreeSet<BTreeSet<Variable>>,
    scope: BTreeSet<Variable>,
}

impl VariableNullability {
    /// Build from groups, restricted to the scope. Overlapping groups are merged.
    pub fn new(
        groups: impl IntoIterator<Item = BTreeSet<Variable>>,
        scope: BTreeSet<Variable>,
    ) -> Self {
        let mut merged: Vec<BTreeSet<Variable>> = Vec::new();
        for group in groups {
            let mut group: BTreeSet<Variable> = group.intersection(&scope).cloned().collect();
            if group.is_empty() {
                continue;
            }
            let (overlapping, disjoint): (Vec<_>, Vec<_>) =
                merged.into_iter().partition(|g| !g.is_disjoint(&group));
            overlapping.into_iter().for_each(|g| group.extend(g));
            merged = disjoint;
            merged.push(group);
        }
        Self {
            nullable_groups: merged.into_iter().collect(),
            scope,
        }
    }

    /// No variable is nullable.
    pub fn non_nullable(scope: BTreeSet<Variable>) -> Self {
        Self {
            nullable_groups: BTreeSet::new(),
            scope,
        }
    }

    /// Every variable is nullable, independently of the others.
    pub fn all_nullable(scope: BTreeSet<Variable>) -> Self {
        Self {
            nullable_groups: scope.iter().map(|v| BTreeSet::from([v.clone()])).collect(),
            scope,
        }
    }

    /// Nullability over an empty scope.
    pub fn empty() -> Self {
        Self::default()
    }

    // ========== Queries ==========

    /// Variables the nullability information is about.
    pub fn scope(&self) -> &BTreeSet<Variable> {
        &self.scope
    }

    /// The nullable groups.
    pub fn nullable_groups(&self) -> &BTreeSet<BTreeSet<Variable>> {
        &self.nullable_groups
    }

    /// Whether `variable` may be NULL. Variables outside the scope are assumed nullable.
    pub fn is_possibly_nullable(&self, variable: &Variable) -> bool {
        !self.scope.contains(variable) || self.nullable_groups.iter().any(|g| g.contains(variable))
    }

    /// All nullable variables of the scope.
    pub fn nullable_variables(&self) -> BTreeSet<Variable> {
        self.nullable_groups.iter().flatten().cloned().collect()
    }

    /// Variables of the scope that are never NULL.
    pub fn non_nullable_variables(&self) -> BTreeSet<Variable> {
        let nullable = self.nullable_variables();
        self.scope.difference(&nullable).cloned().collect()
    }

    /// Whether `term` may evaluate to NULL.
    pub fn is_term_nullable(&self, term: &Term) -> bool {
        term.is_nullable_with(&|v| self.is_possibly_nullable(v))
    }

    /// Whether some of `variables` can be NULL while others are not.
    pub fn can_be_null_separately(&self, variables: &BTreeSet<Variable>) -> bool {
        let groups: BTreeSet<_> = self
            .nullable_groups
            .iter()
            .filter(|g| !g.is_disjoint(variables))
            .collect();
        let all_nullable = variables.iter().all(|v| self.is_possibly_nullable(v));
        groups.len() > 1 || (!groups.is_empty() && !all_nullable)
    }

    // ========== Updates ==========

    /// Keep only `variables`.
    #[must_use]
    pub fn restrict(&self, variables: &BTreeSet<Variable>) -> Self {
        let scope = self.scope.intersection(variables).cloned().collect();
        Self::new(self.nullable_groups.iter().cloned(), scope)
    }

    /// Add non-nullable variables to the scope.
    #[must_use]
    pub fn extend_with_non_nullable(&self, variables: &BTreeSet<Variable>) -> Self {
        let mut scope = self.scope.clone();
        scope.extend(variables.iter().cloned());
        Self {
            nullable_groups: self.nullable_groups.clone(),
            scope,
        }
    }

    /// Nullability after filtering rows with `condition`: every group whose
    /// NULL values make the condition false or NULL becomes non-nullable.
    #[must_use]
    pub fn update_with_filter(&self, condition: &Expression) -> Self {
        let groups = self
            .nullable_groups
            .iter()
            .filter(|g| !condition.rejects_nulls_of(g))
            .cloned();
        Self::new(groups, self.scope.clone())
    }

    /// Nullability of a projection of `projected` variables computing the
    /// bindings of `substitution` from rows described by `self`.
    ///
    /// A variable bound to another variable shares its group; one bound to a
    /// nullable functional term or to NULL gets its own group.
    #[must_use]
    pub fn update_with_substitution(
        &self,
        substitution: &Substitution,
        projected: &BTreeSet<Variable>,
    ) -> Self {
        let mut groups: Vec<BTreeSet<Variable>> = self
            .nullable_groups
            .iter()
            .map(|g| {
                g.iter()
                    .filter(|v| projected.contains(v) && !substitution.is_defining(v))
                    .cloned()
                    .collect()
            })
            .collect();

        for (v, term) in substitution.iter().filter(|(v, _)| projected.contains(v)) {
            match term {
                Term::Variable(w) => {
                    if let Some(index) = self.nullable_groups.iter().position(|g| g.contains(w)) {
                        groups[index].insert(v.clone());
                    }
                }
                _ if self.is_term_nullable(term) => groups.push(BTreeSet::from([v.clone()])),
                _ => {}
            }
        }
        Self::new(groups, projected.clone())
    }
}
