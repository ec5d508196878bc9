//! Data atoms: a predicate applied to variables and constants.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::schema::RelationPredicate;
use crate::term::{Term, Variable};

/// Predicate of a data atom.
pub trait AtomPredicate: Clone + Eq + Hash + fmt::Debug {
    /// Name of the predicate.
    fn name(&self) -> &str;

    /// Number of arguments.
    fn arity(&self) -> usize;
}

impl AtomPredicate for RelationPredicate {
    fn name(&self) -> &str {
        self.as_ref().name()
    }

    fn arity(&self) -> usize {
        self.as_ref().arity()
    }
}

/// Predicate of a virtual relation, to be replaced by its definition later on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntensionalPredicate {
    name: Arc<str>,
    arity: usize,
}

impl IntensionalPredicate {
    /// Create an intensional predicate.
    pub fn new(name: impl AsRef<str>, arity: usize) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            arity,
        }
    }
}

impl AtomPredicate for IntensionalPredicate {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }
}

/// A predicate applied to arguments that are variables or ground terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataAtom<P> {
    predicate: P,
    arguments: Vec<Term>,
}

impl<P: AtomPredicate> DataAtom<P> {
    /// Create an atom. Use [`DataAtom::is_well_formed`] to check it.
    pub fn new(predicate: P, arguments: Vec<Term>) -> Self {
        Self {
            predicate,
            arguments,
        }
    }

    /// The predicate.
    pub fn predicate(&self) -> &P {
        &self.predicate
    }

    /// The arguments.
    pub fn arguments(&self) -> &[Term] {
        &self.arguments
    }

    /// Variables of the arguments.
    pub fn variables(&self) -> BTreeSet<Variable> {
        let mut vars = BTreeSet::new();
        self.arguments
            .iter()
            .for_each(|a| a.collect_variables(&mut vars));
        vars
    }

    /// Arity matches and every argument is a variable or a ground term.
    pub fn is_well_formed(&self) -> bool {
        self.arguments.len() == self.predicate.arity()
            && self
                .arguments
                .iter()
                .all(|a| matches!(a, Term::Variable(_)) || a.is_ground())
    }

    /// Same predicate, new arguments.
    #[must_use]
    pub fn with_arguments(&self, arguments: Vec<Term>) -> Self {
        Self::new(self.predicate.clone(), arguments)
    }
}

impl<P: AtomPredicate> fmt::Display for DataAtom<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.predicate.name())?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RelationDefinition;
    use crate::types::DbTermType;

    #[test]
    fn test_well_formed_atoms() {
        let person = RelationDefinition::builder("person")
            .attribute("id", DbTermType::Integer, false)
            .attribute("name", DbTermType::String, true)
            .build()
            .unwrap();

        let atom = DataAtom::new(person.clone(), vec![Term::var("x"), Term::string("Bob")]);
        assert!(atom.is_well_formed());
        assert_eq!(atom.to_string(), "person(x,\"Bob\")");

        let atom = DataAtom::new(
            person.clone(),
            vec![Term::var("x"), Term::db_function("f", vec![Term::var("y")])],
        );
        assert!(!atom.is_well_formed());

        let atom = DataAtom::new(person, vec![Term::var("x")]);
        assert!(!atom.is_well_formed());
    }
}
