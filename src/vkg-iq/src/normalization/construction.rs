//! Normalization of construction substitutions.
//!
//! A construction substitution is restricted to the projected variables, and
//! every entry `x ↦ y` whose `y` is not projected is turned into a renaming
//! of `y` into `x` inside the child. Child variables shadowed by a binding are
//! renamed to fresh variables first.

use std::collections::BTreeSet;

use common_error::VkgResult;
use vkg_core::{Substitution, Term, Variable, VariableGenerator};

use crate::factory::IqFactory;
use crate::tree::IqTree;

/// Outcome of normalizing a construction substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructionSubstitutionNormalization {
    substitution: Substitution,
    renaming: Substitution,
    projected: BTreeSet<Variable>,
}

impl ConstructionSubstitutionNormalization {
    /// Normalize `substitution` for a construction projecting `projected`
    /// above a child projecting `child_variables`.
    pub fn normalize(
        substitution: &Substitution,
        projected: &BTreeSet<Variable>,
        child_variables: &BTreeSet<Variable>,
        generator: &mut VariableGenerator,
    ) -> Self {
        let restricted = substitution.restrict(projected);

        let mut renaming: Vec<(Variable, Term)> = restricted
            .domain()
            .intersection(child_variables)
            .map(|x| (x.clone(), Term::Variable(generator.generate_new_variable_from(x))))
            .collect();

        for (x, term) in restricted.iter() {
            let Term::Variable(y) = term else { continue };
            if projected.contains(y)
                || !child_variables.contains(y)
                || renaming.iter().any(|(renamed, _)| renamed == y)
            {
                continue;
            }
            renaming.push((y.clone(), Term::Variable(x.clone())));
        }
        let renaming: Substitution = renaming.into_iter().collect();

        let substitution = restricted
            .iter()
            .map(|(v, t)| (v.clone(), renaming.apply_to_term(t)))
            .collect();

        Self {
            substitution,
            renaming,
            projected: projected.clone(),
        }
    }

    /// The normalized substitution.
    pub fn substitution(&self) -> &Substitution {
        &self.substitution
    }

    /// Renaming to apply to the child.
    pub fn renaming(&self) -> &Substitution {
        &self.renaming
    }

    /// Apply the renaming to the child.
    pub fn update_child(&self, child: &IqTree, factory: &IqFactory) -> VkgResult<IqTree> {
        if self.renaming.is_empty() {
            Ok(child.clone())
        } else {
            child.apply_descending_substitution(&self.renaming, None, factory)
        }
    }

    /// The construction over `child`, or `child` alone when the construction
    /// would neither compute nor remove anything.
    pub fn top_construction(&self, child: IqTree, factory: &IqFactory) -> VkgResult<IqTree> {
        if self.substitution.is_empty() && child.variables() == &self.projected {
            Ok(child)
        } else {
            factory.create_construction(self.projected.clone(), self.substitution.clone(), child)
        }
    }
}
