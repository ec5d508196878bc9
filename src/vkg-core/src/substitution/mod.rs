//! Immutable substitutions from variables to terms.
//!
//! Composition follows the mathematical convention: `s.compose(&t)` is the
//! substitution that applies `t` first and then `s`.

mod unification;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::term::{Expression, FunctionalTerm, Term, Variable};

pub use unification::{mgu, unify_sequences, unify_terms};

/// A finite map from variables to terms. Entries mapping a variable to itself are dropped.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Substitution {
    map: BTreeMap<Variable, Term>,
}

impl Substitution {
    /// The empty substitution.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Substitution with a single entry.
    pub fn singleton(variable: Variable, term: impl Into<Term>) -> Self {
        std::iter::once((variable, term.into())).collect()
    }

    // ========== Accessors ==========

    /// Term bound to `variable`, if any.
    pub fn get(&self, variable: &Variable) -> Option<&Term> {
        self.map.get(variable)
    }

    /// Check if the substitution has no entry.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Iterate over the entries in variable order.
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Term)> {
        self.map.iter()
    }

    /// Variables bound by the substitution.
    pub fn domain(&self) -> BTreeSet<Variable> {
        self.map.keys().cloned().collect()
    }

    /// Whether `variable` is bound.
    pub fn is_defining(&self, variable: &Variable) -> bool {
        self.map.contains_key(variable)
    }

    /// Variables occurring in the bound terms.
    pub fn range_variables(&self) -> BTreeSet<Variable> {
        let mut vars = BTreeSet::new();
        self.map.values().for_each(|t| t.collect_variables(&mut vars));
        vars
    }

    /// Whether every bound term is a variable or a constant.
    pub fn is_non_functional(&self) -> bool {
        self.map.values().all(Term::is_non_functional)
    }

    /// Whether the substitution is an injective variable renaming.
    pub fn is_injective_renaming(&self) -> bool {
        let mut images = BTreeSet::new();
        self.map
            .values()
            .all(|t| matches!(t, Term::Variable(v) if images.insert(v.clone())))
    }

    // ========== Application ==========

    /// Apply to a single variable.
    pub fn apply_to_variable(&self, variable: &Variable) -> Term {
        self.map
            .get(variable)
            .cloned()
            .unwrap_or_else(|| Term::Variable(variable.clone()))
    }

    /// Apply to a term, replacing bound variables recursively.
    pub fn apply_to_term(&self, term: &Term) -> Term {
        if self.is_empty() {
            return term.clone();
        }
        match term {
            Term::Variable(v) => self.apply_to_variable(v),
            Term::Constant(_) => term.clone(),
            Term::Function(f) => Term::Function(self.apply_to_functional_term(f)),
        }
    }

    fn apply_to_functional_term(&self, f: &FunctionalTerm) -> FunctionalTerm {
        f.with_args(f.args().iter().map(|a| self.apply_to_term(a)).collect())
    }

    /// Apply to a boolean expression; the result is again an expression.
    pub fn apply_to_expression(&self, expression: &Expression) -> Expression {
        if self.is_empty() {
            return expression.clone();
        }
        Expression::from_boolean_term(self.apply_to_functional_term(expression.as_functional_term()))
    }

    /// Apply to a list of terms.
    pub fn apply_to_terms(&self, terms: &[Term]) -> Vec<Term> {
        terms.iter().map(|t| self.apply_to_term(t)).collect()
    }

    /// Variables projected once the substitution is applied to a node projecting `variables`.
    ///
    /// Bound variables are replaced by the variables of their images; constants vanish.
    pub fn apply_to_variables(&self, variables: &BTreeSet<Variable>) -> BTreeSet<Variable> {
        let mut result = BTreeSet::new();
        for v in variables {
            self.apply_to_variable(v).collect_variables(&mut result);
        }
        result
    }

    // ========== Combination ==========

    /// The substitution applying `other` first and then `self`.
    ///
    /// Every entry `x ↦ t` of `other` becomes `x ↦ self(t)`; entries of `self`
    /// whose variable is not bound by `other` are kept unchanged.
    #[must_use]
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut map: BTreeMap<Variable, Term> = other
            .map
            .iter()
            .map(|(v, t)| (v.clone(), self.apply_to_term(t)))
            .collect();
        for (v, t) in &self.map {
            map.entry(v.clone()).or_insert_with(|| t.clone());
        }
        map.into_iter().collect()
    }

    /// Union of two substitutions; `None` if they bind a variable differently.
    pub fn union(&self, other: &Substitution) -> Option<Substitution> {
        let mut map = self.map.clone();
        for (v, t) in &other.map {
            match map.get(v) {
                Some(existing) if existing != t => return None,
                Some(_) => {}
                None => {
                    map.insert(v.clone(), t.clone());
                }
            }
        }
        Some(Self { map })
    }

    // ========== Fragments ==========

    /// Keep only the entries satisfying `predicate`.
    #[must_use]
    pub fn filter(&self, predicate: impl Fn(&Variable, &Term) -> bool) -> Substitution {
        Self {
            map: self
                .map
                .iter()
                .filter(|(v, t)| predicate(v, t))
                .map(|(v, t)| (v.clone(), t.clone()))
                .collect(),
        }
    }

    /// Restrict the domain to `variables`.
    #[must_use]
    pub fn restrict(&self, variables: &BTreeSet<Variable>) -> Substitution {
        self.filter(|v, _| variables.contains(v))
    }

    /// Remove `variables` from the domain.
    #[must_use]
    pub fn remove_from_domain(&self, variables: &BTreeSet<Variable>) -> Substitution {
        self.filter(|v, _| !variables.contains(v))
    }

    /// Entries binding a variable to another variable.
    #[must_use]
    pub fn variable_fragment(&self) -> Substitution {
        self.filter(|_, t| matches!(t, Term::Variable(_)))
    }

    /// Entries binding a variable to a constant or a functional term.
    #[must_use]
    pub fn non_variable_fragment(&self) -> Substitution {
        self.filter(|_, t| !matches!(t, Term::Variable(_)))
    }

    /// Entries binding a variable to a variable or a constant.
    #[must_use]
    pub fn non_functional_fragment(&self) -> Substitution {
        self.filter(|_, t| t.is_non_functional())
    }

    /// Entries binding a variable to a functional term.
    #[must_use]
    pub fn functional_fragment(&self) -> Substitution {
        self.filter(|_, t| !t.is_non_functional())
    }
}

impl FromIterator<(Variable, Term)> for Substitution {
    fn from_iter<I: IntoIterator<Item = (Variable, Term)>>(iter: I) -> Self {
        Self {
            map: iter
                .into_iter()
                .filter(|(v, t)| !matches!(t, Term::Variable(w) if w == v))
                .collect(),
        }
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (v, t)) in self.map.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}/{t}")?;
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
