//! Complete intermediate queries.

use std::collections::BTreeSet;
use std::fmt;

use common_error::{VkgError, VkgResult};
use vkg_core::{Variable, VariableGenerator};

use crate::factory::IqFactory;
use crate::tree::IqTree;

/// A query: an ordered signature of answer variables over a tree projecting
/// exactly those variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Iq {
    signature: Vec<Variable>,
    tree: IqTree,
}

impl Iq {
    /// Create a query. The signature must list each projected variable once.
    pub fn new(signature: Vec<Variable>, tree: IqTree) -> VkgResult<Self> {
        let signature_set: BTreeSet<Variable> = signature.iter().cloned().collect();
        if signature_set.len() != signature.len() {
            return Err(VkgError::invalid_tree(format!(
                "duplicate variable in the signature {signature:?}"
            )));
        }
        if &signature_set != tree.variables() {
            return Err(VkgError::not_projected(format!(
                "the signature {signature:?} does not match the projected variables {:?}",
                tree.variables()
            )));
        }
        Ok(Self { signature, tree })
    }

    pub fn signature(&self) -> &[Variable] {
        &self.signature
    }

    pub fn tree(&self) -> &IqTree {
        &self.tree
    }

    /// Same signature, new tree.
    pub fn with_tree(&self, tree: IqTree) -> VkgResult<Self> {
        Self::new(self.signature.clone(), tree)
    }

    /// A generator aware of every variable of the query.
    pub fn variable_generator(&self) -> VariableGenerator {
        VariableGenerator::new(
            self.tree
                .known_variables()
                .into_iter()
                .chain(self.signature.iter().cloned()),
        )
    }

    /// The query with its tree normalized.
    pub fn normalize_for_optimization(&self, factory: &IqFactory) -> VkgResult<Self> {
        let mut generator = self.variable_generator();
        let tree = self.tree.normalize_for_optimization(factory, &mut generator)?;
        self.with_tree(tree)
    }
}

impl fmt::Display for Iq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ans(")?;
        for (i, v) in self.signature.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        writeln!(f, ")")?;
        write!(f, "{}", self.tree)
    }
}
