//! Invariant checks of query nodes.
//!
//! Each check only looks at a node and the projected variables of its
//! children; [`IqTree::validate`] applies them to a whole tree. The factory
//! runs them on every node it builds when test mode is enabled.

use std::collections::BTreeSet;

use common_error::{ensure, VkgError, VkgResult};
use vkg_core::{Expression, Term, Variable};

use crate::node::{AggregationNode, ConstructionNode, NativeNode, OrderByNode, UnionNode};
use crate::tree::{union_of_variables, IqNode, IqTree};

/// Check the invariants of the root of `tree`.
pub(crate) fn validate_node(tree: &IqTree) -> VkgResult<()> {
    match tree.node() {
        IqNode::Construction { node, child } => validate_construction(node, child),
        IqNode::Filter { node, child } => {
            validate_condition(Some(node.condition()), child.variables(), &node.to_string())
        }
        IqNode::InnerJoin { node, children } => {
            if children.len() < 2 {
                return Err(VkgError::invalid_arity(
                    node.to_string(),
                    "at least 2",
                    children.len(),
                ));
            }
            validate_condition(node.condition(), &union_of_variables(children), &node.to_string())
        }
        IqNode::LeftJoin { node, left, right } => {
            let variables = left.variables().union(right.variables()).cloned().collect();
            validate_condition(node.condition(), &variables, &node.to_string())
        }
        IqNode::Union { node, children } => validate_union(node, children),
        IqNode::OrderBy { node, child } => validate_order_by(node, child),
        IqNode::Aggregation { node, child } => validate_aggregation(node, child),
        IqNode::ExtensionalData(node) => {
            ensure!(node.atom().is_well_formed(), InvalidNode: "malformed atom in {}", node);
            Ok(())
        }
        IqNode::IntensionalData(node) => {
            ensure!(node.atom().is_well_formed(), InvalidNode: "malformed atom in {}", node);
            Ok(())
        }
        IqNode::Native(node) => Err(VkgError::terminal(format!(
            "{node} is terminal and cannot be validated as a query node"
        ))),
        IqNode::Distinct { .. } | IqNode::Slice { .. } | IqNode::Empty(_) | IqNode::True => Ok(()),
    }
}

fn validate_construction(node: &ConstructionNode, child: &IqTree) -> VkgResult<()> {
    let substitution = node.substitution();
    let projected = node.projected_variables();

    ensure!(
        substitution.domain().is_subset(projected),
        InvalidNode: "{node}: the substitution binds non-projected variables"
    );
    let range = substitution.range_variables();
    ensure!(
        substitution.domain().is_disjoint(&range),
        InvalidNode: "{node}: a bound variable occurs in a binding"
    );
    for (v, t) in substitution.iter() {
        if let Term::Variable(target) = t {
            ensure!(
                projected.contains(target),
                InvalidNode: "{node}: {v} is bound to the non-projected variable {target}"
            );
        }
    }

    let required = node.required_child_variables();
    let missing: Vec<&Variable> = required.difference(child.variables()).collect();
    ensure!(
        missing.is_empty(),
        InvalidTree: "{node}: the child does not project {missing:?}"
    );
    Ok(())
}

fn validate_condition(
    condition: Option<&Expression>,
    variables: &BTreeSet<Variable>,
    node: &str,
) -> VkgResult<()> {
    let Some(condition) = condition else {
        return Ok(());
    };
    let unknown: Vec<Variable> = condition
        .variables()
        .into_iter()
        .filter(|v| !variables.contains(v))
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(VkgError::not_projected(format!(
            "{node}: {unknown:?} not projected by the children"
        )))
    }
}

fn validate_union(node: &UnionNode, children: &[IqTree]) -> VkgResult<()> {
    if children.len() < 2 {
        return Err(VkgError::invalid_arity(node.to_string(), "at least 2", children.len()));
    }
    for child in children {
        ensure!(
            child.variables() == node.projected_variables(),
            InvalidTree: "{node}: a child projects {:?}",
            child.variables()
        );
    }
    Ok(())
}

fn validate_order_by(node: &OrderByNode, child: &IqTree) -> VkgResult<()> {
    for comparator in node.comparators() {
        let variables = comparator.term().variables();
        if !variables.is_subset(child.variables()) {
            return Err(VkgError::not_projected(format!(
                "{node}: {} not projected by the child",
                comparator.term()
            )));
        }
    }
    Ok(())
}

fn validate_aggregation(node: &AggregationNode, child: &IqTree) -> VkgResult<()> {
    if !node.grouping_variables().is_subset(child.variables()) {
        return Err(VkgError::not_projected(format!(
            "{node}: grouping variables not projected by the child"
        )));
    }
    for (v, t) in node.substitution().iter() {
        ensure!(
            !node.grouping_variables().contains(v),
            InvalidNode: "{node}: the grouping variable {v} is also aggregated"
        );
        let is_aggregate = t.as_function().is_some_and(|f| f.symbol().is_aggregate());
        ensure!(is_aggregate, InvalidNode: "{node}: {v} is not bound to an aggregate");
        if !t.variables().is_subset(child.variables()) {
            return Err(VkgError::not_projected(format!(
                "{node}: the arguments of {t} are not projected by the child"
            )));
        }
    }
    Ok(())
}

/// The variables of a native node must be exactly the keys of its type map.
pub(crate) fn validate_native(node: &NativeNode) -> VkgResult<()> {
    let typed: BTreeSet<&Variable> = node.type_map().keys().collect();
    let declared: BTreeSet<&Variable> = node.variables().iter().collect();
    ensure!(
        typed == declared,
        InvalidNode: "{node}: the type map does not cover exactly the projected variables"
    );
    Ok(())
}
