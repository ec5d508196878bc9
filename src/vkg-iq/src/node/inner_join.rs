//! N-ary inner joins.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use common_error::VkgResult;
use vkg_core::{
    Constant, Expression, Substitution, Term, Variable, VariableGenerator, VariableNullability,
};

use crate::factory::IqFactory;
use crate::normalization::{
    compute_down_constraint, dummy_nullability, keep_aggregate_equalities, simplify_condition,
    UnsatisfiableCondition,
};
use crate::tree::{union_of_variables, IqNode, IqTree, UniqueConstraints};

/// Joins its children on their shared variables and an optional condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InnerJoinNode {
    condition: Option<Expression>,
}

impl InnerJoinNode {
    pub(crate) fn new(condition: Option<Expression>) -> Self {
        Self { condition }
    }

    /// The join condition, if any.
    pub fn condition(&self) -> Option<&Expression> {
        self.condition.as_ref()
    }

    // ========== Derived properties ==========

    /// Nullability of the cross product of `children` restricted to rows
    /// agreeing on shared variables. Shared variables are never NULL.
    pub(crate) fn children_nullability(children: &[IqTree]) -> VariableNullability {
        let mut occurrences: BTreeMap<&Variable, usize> = BTreeMap::new();
        for v in children.iter().flat_map(|c| c.variables()) {
            *occurrences.entry(v).or_default() += 1;
        }
        let shared: BTreeSet<Variable> = occurrences
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(v, _)| v.clone())
            .collect();

        let groups = children
            .iter()
            .flat_map(|c| c.variable_nullability().nullable_groups().iter().cloned())
            .filter(|g| g.is_disjoint(&shared));
        VariableNullability::new(groups, union_of_variables(children))
    }

    pub(crate) fn variable_nullability(&self, children: &[IqTree]) -> VariableNullability {
        let nullability = Self::children_nullability(children);
        match &self.condition {
            Some(condition) => nullability.update_with_filter(condition),
            None => nullability,
        }
    }

    /// A child whose rows each join with at most one row of every other
    /// child, directly or through a chain of such children, keeps its keys.
    pub(crate) fn unique_constraints(children: &[IqTree]) -> UniqueConstraints {
        let constraints: Vec<&UniqueConstraints> =
            children.iter().map(IqTree::infer_unique_constraints).collect();
        if constraints.iter().any(|c| c.is_empty()) {
            return UniqueConstraints::new();
        }

        let n = children.len();
        let mut reaches = vec![vec![false; n]; n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let common: BTreeSet<Variable> = children[i]
                    .variables()
                    .intersection(children[j].variables())
                    .cloned()
                    .collect();
                // The empty key holds for at most one row and is a subset of anything.
                reaches[i][j] = constraints[j].iter().any(|k| k.is_subset(&common));
            }
        }
        for k in 0..n {
            for i in 0..n {
                for j in 0..n {
                    if reaches[i][k] && reaches[k][j] {
                        reaches[i][j] = true;
                    }
                }
            }
        }

        (0..n)
            .filter(|&i| (0..n).all(|j| i == j || reaches[i][j]))
            .flat_map(|i| constraints[i].iter().cloned())
            .collect()
    }

    // ========== Normalization ==========

    pub(crate) fn normalize(
        &self,
        children: &[IqTree],
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        let children = children
            .iter()
            .map(|c| c.normalize_for_optimization(factory, generator))
            .collect::<VkgResult<Vec<_>>>()?;
        if children.iter().any(IqTree::is_declared_as_empty) {
            log::trace!("{self} has an empty child");
            return Ok(factory.create_empty(union_of_variables(&children)));
        }

        let mut changed = false;
        let mut conditions: Vec<Expression> = self.condition.iter().cloned().collect();
        let mut flattened = Vec::with_capacity(children.len());
        for child in &children {
            match child.node() {
                IqNode::InnerJoin {
                    node,
                    children: grand_children,
                } => {
                    changed = true;
                    conditions.extend(node.condition.iter().cloned());
                    flattened.extend(grand_children.iter().cloned());
                }
                IqNode::Filter { node, child } => {
                    changed = true;
                    conditions.push(node.condition().clone());
                    flattened.push(child.clone());
                }
                IqNode::True => changed = true,
                _ => flattened.push(child.clone()),
            }
        }
        if changed {
            return join_of(Expression::conjunction(conditions), flattened, factory);
        }

        let liftable = children.iter().position(|c| {
            matches!(c.node(), IqNode::Construction { node, .. } if !node.substitution().is_empty())
        });
        if let Some(index) = liftable {
            return self.lift_construction(index, &children, factory, generator);
        }

        self.propagate_down_constraint(None, &children, factory)
    }

    /// Lifts the bindings of the construction at `index` above the join.
    ///
    /// Siblings sharing a bound variable see its value directly when it is
    /// a variable or a constant, and a fresh variable constrained by the
    /// join condition otherwise.
    fn lift_construction(
        &self,
        index: usize,
        children: &[IqTree],
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        let IqNode::Construction {
            node: construction,
            child: grand_child,
        } = children[index].node()
        else {
            return self.rebuild(children.to_vec(), factory);
        };
        for child in children {
            generator.register(child.known_variables());
        }
        let join_variables = union_of_variables(children);
        let other_variables = union_of_variables(
            children
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, c)| c),
        );

        let theta = construction.substitution();
        let clashes: Vec<Variable> = grand_child
            .variables()
            .iter()
            .filter(|v| {
                !construction.projected_variables().contains(*v)
                    && (other_variables.contains(*v) || theta.is_defining(v))
            })
            .cloned()
            .collect();
        let renaming: Substitution = clashes
            .iter()
            .map(|v| (v.clone(), Term::Variable(generator.generate_new_variable_from(v))))
            .collect();
        let grand_child = grand_child.apply_descending_substitution(&renaming, None, factory)?;
        let theta: Substitution = theta
            .iter()
            .map(|(v, t)| (v.clone(), renaming.apply_to_term(t)))
            .collect();

        let mut sibling_descending = Vec::new();
        let mut equalities = Vec::new();
        for (v, t) in theta.iter().filter(|(v, _)| other_variables.contains(*v)) {
            match t {
                Term::Constant(Constant::Null) => {
                    return Ok(factory.create_empty(join_variables));
                }
                Term::Variable(_) | Term::Constant(_) => {
                    sibling_descending.push((v.clone(), t.clone()));
                }
                Term::Function(_) => {
                    let fresh = generator.generate_new_variable_from(v);
                    equalities.push(Expression::eq(Term::Variable(fresh.clone()), t.clone()));
                    sibling_descending.push((v.clone(), Term::Variable(fresh)));
                }
            }
        }
        let sibling_descending: Substitution = sibling_descending.into_iter().collect();

        let mut new_children = Vec::with_capacity(children.len());
        for (i, child) in children.iter().enumerate() {
            if i == index {
                new_children.push(grand_child.clone());
            } else {
                new_children.push(child.apply_descending_substitution(&sibling_descending, None, factory)?);
            }
        }
        let condition = Expression::and_optional(
            self.condition.as_ref().map(|c| theta.apply_to_expression(c)),
            Expression::conjunction(equalities),
        );
        log::trace!("lifting {construction} above {self}");
        let join = join_of(condition, new_children, factory)?;
        factory.create_construction(join_variables, theta, join)
    }

    // ========== Propagation ==========

    /// Simplifies the condition against the children, pushes the extracted
    /// equalities into every child and lifts them in a construction.
    pub(crate) fn propagate_down_constraint(
        &self,
        constraint: Option<&Expression>,
        children: &[IqTree],
        factory: &IqFactory,
    ) -> VkgResult<IqTree> {
        let variables = union_of_variables(children);
        let nullability = Self::children_nullability(children);
        let simplified = simplify_condition(self.condition.as_ref(), &nullability)
            .map(|r| keep_aggregate_equalities(r, children))
            .and_then(|r| {
                compute_down_constraint(constraint, &r, &dummy_nullability(&variables))
                    .map(|down| (r, down))
            });
        let (results, down_constraint) = match simplified {
            Ok(pair) => pair,
            Err(UnsatisfiableCondition) => {
                log::trace!("{self} is unsatisfiable");
                return Ok(factory.create_empty(variables));
            }
        };

        let new_children = children
            .iter()
            .map(|c| {
                if !results.substitution.is_empty() {
                    c.apply_descending_substitution(&results.substitution, down_constraint.as_ref(), factory)
                } else if let Some(down) = &down_constraint {
                    c.propagate_down_constraint(down, factory)
                } else {
                    Ok(c.clone())
                }
            })
            .collect::<VkgResult<Vec<_>>>()?;

        let join = join_of(results.expression, new_children, factory)?;
        if results.substitution.is_empty() {
            Ok(join)
        } else {
            factory.create_construction(variables, results.substitution, join)
        }
    }

    pub(crate) fn apply_descending_substitution(
        &self,
        descending: &Substitution,
        constraint: Option<&Expression>,
        optimize: bool,
        children: &[IqTree],
        factory: &IqFactory,
    ) -> VkgResult<IqTree> {
        let condition = self.condition.as_ref().map(|c| descending.apply_to_expression(c));
        if !optimize {
            let new_children = children
                .iter()
                .map(|c| c.descend(descending, None, false, factory))
                .collect::<VkgResult<Vec<_>>>()?;
            return factory.create_inner_join(condition, new_children);
        }

        let new_variables = descending.apply_to_variables(&union_of_variables(children));
        let nullability = dummy_nullability(&new_variables);
        let simplified = simplify_condition(condition.as_ref(), &nullability).and_then(|r| {
            compute_down_constraint(constraint, &r, &nullability).map(|down| (r, down))
        });
        let (results, down_constraint) = match simplified {
            Ok(pair) => pair,
            Err(UnsatisfiableCondition) => return Ok(factory.create_empty(new_variables)),
        };

        let down_substitution = results.substitution.compose(descending);
        let new_children = children
            .iter()
            .map(|c| c.apply_descending_substitution(&down_substitution, down_constraint.as_ref(), factory))
            .collect::<VkgResult<Vec<_>>>()?;
        let join = join_of(results.expression, new_children, factory)?;
        if results.substitution.is_empty() {
            Ok(join)
        } else {
            factory.create_construction(new_variables, results.substitution, join)
        }
    }

    pub(crate) fn lift_incompatible_definitions(
        &self,
        variable: &Variable,
        children: &[IqTree],
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        let mut new_children = children.to_vec();
        for (index, child) in children.iter().enumerate() {
            if !child.variables().contains(variable) {
                continue;
            }
            let lifted = child.lift_incompatible_definitions(variable, factory, generator)?;
            if let (true, IqNode::Union { children: branches, .. }) = (
                lifted.is_union_with_liftable_definition(variable),
                lifted.node(),
            ) {
                log::trace!("distributing {self} over the union binding {variable}");
                let joins = branches
                    .iter()
                    .map(|branch| {
                        let mut join_children = new_children.clone();
                        join_children[index] = branch.clone();
                        self.rebuild(join_children, factory)
                    })
                    .collect::<VkgResult<Vec<_>>>()?;
                let union = factory.create_union(union_of_variables(children), joins)?;
                return union.normalize_for_optimization(factory, generator);
            }
            new_children[index] = lifted;
        }
        self.rebuild(new_children, factory)
    }

    fn rebuild(&self, children: Vec<IqTree>, factory: &IqFactory) -> VkgResult<IqTree> {
        factory.create_inner_join(self.condition.clone(), children)
    }
}

/// A join of `children` under `condition`, collapsed when fewer than two
/// children remain.
pub(crate) fn join_of(
    condition: Option<Expression>,
    mut children: Vec<IqTree>,
    factory: &IqFactory,
) -> VkgResult<IqTree> {
    let child = match children.len() {
        0 => factory.create_true(),
        1 => children.remove(0),
        _ => return factory.create_inner_join(condition, children),
    };
    match condition {
        Some(condition) => factory.create_filter(condition, child),
        None => Ok(child),
    }
}

impl fmt::Display for InnerJoinNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.condition {
            Some(condition) => write!(f, "JOIN {condition}"),
            None => write!(f, "JOIN"),
        }
    }
}
