//! N-ary bag unions.

use std::collections::BTreeSet;
use std::fmt;

use common_error::VkgResult;
use vkg_core::{Substitution, Term, Variable, VariableGenerator, VariableNullability};

use super::VariableList;
use crate::factory::IqFactory;
use crate::tree::{IqNode, IqTree};

/// Concatenates the rows of children projecting the same variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnionNode {
    projected: BTreeSet<Variable>,
}

impl UnionNode {
    pub(crate) fn new(projected: BTreeSet<Variable>) -> Self {
        Self { projected }
    }

    /// Variables projected by the union and by each child.
    pub fn projected_variables(&self) -> &BTreeSet<Variable> {
        &self.projected
    }

    /// A distinct union of distinct branches over `children`.
    ///
    /// Each branch is deduplicated on its own, which lets normalization drop
    /// the branch-level DISTINCT wherever the branch is already distinct.
    pub fn make_distinct(&self, children: &[IqTree], factory: &IqFactory) -> VkgResult<IqTree> {
        let branches = children
            .iter()
            .map(|c| factory.create_distinct(c.clone()))
            .collect::<VkgResult<Vec<_>>>()?;
        factory.create_distinct(factory.create_union(self.projected.clone(), branches)?)
    }

    pub(crate) fn variable_nullability(&self, children: &[IqTree]) -> VariableNullability {
        let Some((first, others)) = children.split_first() else {
            return VariableNullability::non_nullable(self.projected.clone());
        };
        let groups = first.variable_nullability().nullable_groups();
        if others
            .iter()
            .all(|c| c.variable_nullability().nullable_groups() == groups)
        {
            return VariableNullability::new(groups.iter().cloned(), self.projected.clone());
        }
        let nullable = children
            .iter()
            .flat_map(|c| c.variable_nullability().nullable_variables())
            .map(|v| BTreeSet::from([v]));
        VariableNullability::new(nullable, self.projected.clone())
    }

    // ========== Normalization ==========

    pub(crate) fn normalize(
        &self,
        children: &[IqTree],
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        let mut changed = false;
        let mut flattened = Vec::with_capacity(children.len());
        for child in children {
            let child = child.normalize_for_optimization(factory, generator)?;
            match child.node() {
                IqNode::Empty(_) => changed = true,
                IqNode::Union {
                    children: grand_children,
                    ..
                } => {
                    changed = true;
                    flattened.extend(grand_children.iter().cloned());
                }
                _ => flattened.push(child.clone()),
            }
        }

        match flattened.len() {
            0 => return Ok(factory.create_empty(self.projected.clone())),
            1 => return Ok(flattened.remove(0)),
            _ if changed => return factory.create_union(self.projected.clone(), flattened),
            _ => {}
        }

        match self.common_bindings(&flattened) {
            Some(common) => self.lift_common_bindings(&common, &flattened, factory),
            None => factory.create_union(self.projected.clone(), flattened),
        }
    }

    /// Bindings shared by the constructions at the root of every child.
    fn common_bindings(&self, children: &[IqTree]) -> Option<Substitution> {
        let substitutions = children
            .iter()
            .map(|c| match c.node() {
                IqNode::Construction { node, .. } => Some(node.substitution()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        let (first, others) = substitutions.split_first()?;

        let common: Substitution = first
            .iter()
            .filter(|(v, t)| others.iter().all(|s| s.get(v) == Some(*t)))
            .filter(|(_, t)| match t {
                Term::Variable(y) => self.projected.contains(y),
                _ => true,
            })
            .map(|(v, t)| (v.clone(), t.clone()))
            .collect();
        (!common.is_empty()).then_some(common)
    }

    fn lift_common_bindings(
        &self,
        common: &Substitution,
        children: &[IqTree],
        factory: &IqFactory,
    ) -> VkgResult<IqTree> {
        let mut union_variables: BTreeSet<Variable> = self
            .projected
            .iter()
            .filter(|v| !common.is_defining(v))
            .cloned()
            .collect();
        union_variables.extend(common.range_variables());

        let branches = children
            .iter()
            .map(|child| {
                let IqNode::Construction { node, child: grand_child } = child.node() else {
                    return Ok(child.clone());
                };
                let rest = node.substitution().remove_from_domain(&common.domain());
                if rest.is_empty() && grand_child.variables() == &union_variables {
                    Ok(grand_child.clone())
                } else {
                    factory.create_construction(union_variables.clone(), rest, grand_child.clone())
                }
            })
            .collect::<VkgResult<Vec<_>>>()?;

        log::trace!("lifting {common} above {self}");
        let union = factory.create_union(union_variables, branches)?;
        factory.create_construction(self.projected.clone(), common.clone(), union)
    }

    // ========== Propagation ==========

    pub(crate) fn lift_incompatible_definitions(
        &self,
        variable: &Variable,
        children: &[IqTree],
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        let mut branches = Vec::with_capacity(children.len());
        for child in children {
            let lifted = child.lift_incompatible_definitions(variable, factory, generator)?;
            match lifted.node() {
                IqNode::Union {
                    children: grand_children,
                    ..
                } => branches.extend(grand_children.iter().cloned()),
                _ => branches.push(lifted),
            }
        }
        factory.create_union(self.projected.clone(), branches)
    }
}

impl fmt::Display for UnionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UNION {}", VariableList(&self.projected))
    }
}
