//! Filter nodes.

use std::fmt;

use common_error::VkgResult;
use vkg_core::{Expression, Substitution, Variable, VariableGenerator, VariableNullability};

use crate::factory::IqFactory;
use crate::normalization::{
    compute_down_constraint, dummy_nullability, keep_aggregate_equalities, simplify_condition,
    UnsatisfiableCondition,
};
use crate::tree::{IqNode, IqTree};

/// Keeps the rows of its child satisfying a condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterNode {
    condition: Expression,
}

impl FilterNode {
    pub(crate) fn new(condition: Expression) -> Self {
        Self { condition }
    }

    /// The filtering condition.
    pub fn condition(&self) -> &Expression {
        &self.condition
    }

    /// Whether a NULL value of `variable` is always rejected by the condition.
    pub fn is_filtering_null_value(&self, variable: &Variable) -> bool {
        self.condition
            .rejects_nulls_of(&std::iter::once(variable.clone()).collect())
    }

    pub(crate) fn variable_nullability(&self, child: &IqTree) -> VariableNullability {
        child.variable_nullability().update_with_filter(&self.condition)
    }

    pub(crate) fn normalize(
        &self,
        child: &IqTree,
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        let child = child.normalize_for_optimization(factory, generator)?;
        if child.is_declared_as_empty() {
            return Ok(child);
        }
        match child.node() {
            IqNode::Filter {
                node: child_filter,
                child: grand_child,
            } => {
                log::trace!("merging {self} with {child_filter}");
                let condition = child_filter.condition.clone().and(self.condition.clone());
                factory.create_filter(condition, grand_child.clone())
            }
            IqNode::Construction {
                node: construction,
                child: grand_child,
            } => {
                log::trace!("lifting {construction} above {self}");
                let condition = construction.substitution().apply_to_expression(&self.condition);
                let filter = factory.create_filter(condition, grand_child.clone())?;
                factory.create_construction(
                    construction.projected_variables().clone(),
                    construction.substitution().clone(),
                    filter,
                )
            }
            _ => self.propagate_down_constraint(None, &child, factory),
        }
    }

    /// Simplifies the condition against the child and pushes what can be
    /// pushed. Equalities come back as a construction on top.
    pub(crate) fn propagate_down_constraint(
        &self,
        constraint: Option<&Expression>,
        child: &IqTree,
        factory: &IqFactory,
    ) -> VkgResult<IqTree> {
        let nullability = child.variable_nullability();
        let simplified = simplify_condition(Some(&self.condition), nullability)
            .map(|r| keep_aggregate_equalities(r, std::slice::from_ref(child)))
            .and_then(|r| compute_down_constraint(constraint, &r, nullability).map(|down| (r, down)));
        let (results, down_constraint) = match simplified {
            Ok(pair) => pair,
            Err(UnsatisfiableCondition) => {
                log::trace!("{self} is unsatisfiable");
                return Ok(factory.create_empty(child.variables().clone()));
            }
        };

        let new_child = if !results.substitution.is_empty() {
            child.apply_descending_substitution(&results.substitution, down_constraint.as_ref(), factory)?
        } else if let Some(down) = &down_constraint {
            child.propagate_down_constraint(down, factory)?
        } else {
            child.clone()
        };

        let filter_level = match results.expression {
            Some(e) => factory.create_filter(e, new_child)?,
            None => new_child,
        };
        if results.substitution.is_empty() {
            Ok(filter_level)
        } else {
            factory.create_construction(child.variables().clone(), results.substitution, filter_level)
        }
    }

    pub(crate) fn apply_descending_substitution(
        &self,
        descending: &Substitution,
        constraint: Option<&Expression>,
        optimize: bool,
        child: &IqTree,
        factory: &IqFactory,
    ) -> VkgResult<IqTree> {
        let condition = descending.apply_to_expression(&self.condition);
        if !optimize {
            let new_child = child.descend(descending, None, false, factory)?;
            return factory.create_filter(condition, new_child);
        }

        let new_variables = descending.apply_to_variables(child.variables());
        let nullability = dummy_nullability(&new_variables);
        let simplified = simplify_condition(Some(&condition), &nullability).and_then(|r| {
            compute_down_constraint(constraint, &r, &nullability).map(|down| (r, down))
        });
        let (results, down_constraint) = match simplified {
            Ok(pair) => pair,
            Err(UnsatisfiableCondition) => return Ok(factory.create_empty(new_variables)),
        };

        let down_substitution = results.substitution.compose(descending);
        let new_child =
            child.apply_descending_substitution(&down_substitution, down_constraint.as_ref(), factory)?;
        let filter_level = match results.expression {
            Some(e) => factory.create_filter(e, new_child)?,
            None => new_child,
        };
        if results.substitution.is_empty() {
            Ok(filter_level)
        } else {
            factory.create_construction(new_variables, results.substitution, filter_level)
        }
    }

    pub(crate) fn lift_incompatible_definitions(
        &self,
        variable: &Variable,
        child: &IqTree,
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        let new_child = child.lift_incompatible_definitions(variable, factory, generator)?;
        if let (true, IqNode::Union { node, children }) = (
            new_child.is_union_with_liftable_definition(variable),
            new_child.node(),
        ) {
            let branches = children
                .iter()
                .map(|c| factory.create_filter(self.condition.clone(), c.clone()))
                .collect::<VkgResult<Vec<_>>>()?;
            return factory.create_union(node.projected_variables().clone(), branches);
        }
        factory.create_filter(self.condition.clone(), new_child)
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FILTER {}", self.condition)
    }
}
