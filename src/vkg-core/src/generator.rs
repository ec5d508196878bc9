//! Fresh variable generation.

use std::collections::HashSet;

use crate::term::Variable;

/// Produces variables that do not clash with any variable known so far.
///
/// One generator is threaded through a single optimization run; every
/// variable it hands out becomes known.
#[derive(Debug, Clone, Default)]
pub struct VariableGenerator {
    known: HashSet<Variable>,
    count: usize,
}

impl VariableGenerator {
    /// Create a generator aware of `known` variables.
    pub fn new(known: impl IntoIterator<Item = Variable>) -> Self {
        Self {
            known: known.into_iter().collect(),
            count: 0,
        }
    }

    /// Mark more variables as known.
    pub fn register(&mut self, variables: impl IntoIterator<Item = Variable>) {
        self.known.extend(variables);
    }

    /// Whether `variable` is known.
    pub fn is_known(&self, variable: &Variable) -> bool {
        self.known.contains(variable)
    }

    /// Known variables.
    pub fn known_variables(&self) -> impl Iterator<Item = &Variable> {
        self.known.iter()
    }

    /// A fresh variable named after `base`.
    pub fn generate_new_variable_from(&mut self, base: &Variable) -> Variable {
        let prefix = base.name().split("_f").next().unwrap_or(base.name()).to_string();
        self.generate_new_variable(&prefix)
    }

    /// A fresh variable starting with `prefix`.
    pub fn generate_new_variable(&mut self, prefix: &str) -> Variable {
        loop {
            let candidate = Variable::new(format!("{prefix}_f{}", self.count));
            self.count += 1;
            if self.known.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}
