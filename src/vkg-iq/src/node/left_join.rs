//! Left outer joins.

use std::collections::BTreeSet;
use std::fmt;

use common_error::VkgResult;
use vkg_core::{
    Evaluation, Expression, Substitution, Term, Variable, VariableGenerator, VariableNullability,
};

use super::InnerJoinNode;
use crate::factory::IqFactory;
use crate::normalization::{dummy_nullability, retain_conjuncts_over};
use crate::tree::{IqNode, IqTree, UniqueConstraints};

/// Keeps every row of the left child, extended with the matching rows of
/// the right child or with NULLs for the right-specific variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeftJoinNode {
    condition: Option<Expression>,
}

impl LeftJoinNode {
    pub(crate) fn new(condition: Option<Expression>) -> Self {
        Self { condition }
    }

    /// The join condition, if any.
    pub fn condition(&self) -> Option<&Expression> {
        self.condition.as_ref()
    }

    /// Variables projected by the right child only.
    pub fn right_specific_variables(left: &IqTree, right: &IqTree) -> BTreeSet<Variable> {
        right.variables().difference(left.variables()).cloned().collect()
    }

    // ========== Derived properties ==========

    pub(crate) fn variable_nullability(&self, left: &IqTree, right: &IqTree) -> VariableNullability {
        let right_specific = Self::right_specific_variables(left, right);
        let right_nullability = match &self.condition {
            Some(condition) => right.variable_nullability().update_with_filter(condition),
            None => right.variable_nullability().clone(),
        };

        let mut groups: Vec<BTreeSet<Variable>> =
            left.variable_nullability().nullable_groups().iter().cloned().collect();
        groups.extend(
            right_nullability
                .nullable_groups()
                .iter()
                .map(|g| g.intersection(&right_specific).cloned().collect::<BTreeSet<_>>())
                .filter(|g| !g.is_empty()),
        );
        let padded: BTreeSet<Variable> = right_specific
            .iter()
            .filter(|v| !right_nullability.is_possibly_nullable(v))
            .cloned()
            .collect();
        if !padded.is_empty() {
            groups.push(padded);
        }

        let scope = left.variables().union(right.variables()).cloned().collect();
        VariableNullability::new(groups, scope)
    }

    /// The left keys survive when each left row matches at most one right row.
    pub(crate) fn unique_constraints(left: &IqTree, right: &IqTree) -> UniqueConstraints {
        let shared: BTreeSet<Variable> =
            left.variables().intersection(right.variables()).cloned().collect();
        if right
            .infer_unique_constraints()
            .iter()
            .any(|k| k.is_subset(&shared))
        {
            left.infer_unique_constraints().clone()
        } else {
            UniqueConstraints::new()
        }
    }

    // ========== Normalization ==========

    pub(crate) fn normalize(
        &self,
        left: &IqTree,
        right: &IqTree,
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        let left = left.normalize_for_optimization(factory, generator)?;
        let right = right.normalize_for_optimization(factory, generator)?;
        let right_specific = Self::right_specific_variables(&left, &right);

        if left.is_declared_as_empty() {
            let variables = left.variables().union(right.variables()).cloned().collect();
            return Ok(factory.create_empty(variables));
        }
        if right.is_declared_as_empty() {
            log::trace!("{self} has an empty right child");
            return pad_with_nulls(left, &right_specific, factory);
        }
        if matches!(right.node(), IqNode::True) {
            return Ok(left);
        }
        if let IqNode::Construction { node, child } = left.node() {
            if !node.substitution().is_empty() {
                return self.lift_left_construction(
                    node.projected_variables(),
                    node.substitution(),
                    child,
                    &right,
                    factory,
                    generator,
                );
            }
        }

        let Some(condition) = &self.condition else {
            return factory.create_left_join(None, left, right);
        };
        let nullability = InnerJoinNode::children_nullability(&[left.clone(), right.clone()]);
        match condition.evaluate_2vl(&nullability) {
            Evaluation::True => factory.create_left_join(None, left, right),
            Evaluation::False | Evaluation::Null => {
                log::trace!("{self} never matches");
                pad_with_nulls(left, &right_specific, factory)
            }
            Evaluation::Residual(condition) => {
                let right = right.propagate_down_constraint(&condition, factory)?;
                if right.is_declared_as_empty() {
                    return pad_with_nulls(left, &right_specific, factory);
                }
                factory.create_left_join(Some(condition), left, right)
            }
        }
    }

    /// Lifts the bindings of a left construction above the left join.
    ///
    /// A bound variable shared with the right child is replaced there by its
    /// value when it is a variable or a constant, and by a fresh variable
    /// constrained by the join condition otherwise.
    fn lift_left_construction(
        &self,
        projected: &BTreeSet<Variable>,
        theta: &Substitution,
        grand_child: &IqTree,
        right: &IqTree,
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        generator.register(grand_child.known_variables());
        generator.register(right.known_variables());
        let right_variables = right.variables();

        let renaming: Substitution = grand_child
            .variables()
            .iter()
            .filter(|v| {
                !projected.contains(*v) && (right_variables.contains(*v) || theta.is_defining(v))
            })
            .map(|v| (v.clone(), Term::Variable(generator.generate_new_variable_from(v))))
            .collect();
        let grand_child = grand_child.apply_descending_substitution(&renaming, None, factory)?;
        let theta: Substitution = theta
            .iter()
            .map(|(v, t)| (v.clone(), renaming.apply_to_term(t)))
            .collect();

        let mut right_descending = Vec::new();
        let mut equalities = Vec::new();
        for (v, t) in theta.iter().filter(|(v, _)| right_variables.contains(*v)) {
            if matches!(t, Term::Variable(_)) || (t.is_non_functional() && !t.is_null()) {
                right_descending.push((v.clone(), t.clone()));
            } else {
                let fresh = generator.generate_new_variable_from(v);
                equalities.push(Expression::eq(Term::Variable(fresh.clone()), t.clone()));
                right_descending.push((v.clone(), Term::Variable(fresh)));
            }
        }
        let right_descending: Substitution = right_descending.into_iter().collect();
        let new_right = right.apply_descending_substitution(&right_descending, None, factory)?;

        let condition = Expression::and_optional(
            self.condition.as_ref().map(|c| theta.apply_to_expression(c)),
            Expression::conjunction(equalities),
        );
        let variables: BTreeSet<Variable> = projected.union(right_variables).cloned().collect();
        log::trace!("lifting the left bindings {theta} above {self}");
        let left_join = factory.create_left_join(condition, grand_child, new_right)?;
        factory.create_construction(variables, theta, left_join)
    }

    // ========== Propagation ==========

    /// Whether `descending` equates a right-specific variable with anything
    /// but a fresh variable, or maps another variable onto one.
    fn contains_equality_right_specific_variable(
        descending: &Substitution,
        left: &IqTree,
        right: &IqTree,
    ) -> bool {
        let right_specific = Self::right_specific_variables(left, right);
        let variables: BTreeSet<&Variable> =
            left.variables().union(right.variables()).collect();

        let binds_right_specific = right_specific.iter().any(|v| match descending.get(v) {
            None => false,
            Some(Term::Variable(image)) => {
                variables.contains(image)
                    || descending
                        .iter()
                        .any(|(other, t)| other != v && t.as_variable() == Some(image))
            }
            Some(_) => true,
        });
        binds_right_specific
            || descending
                .range_variables()
                .iter()
                .any(|v| right_specific.contains(v))
    }

    pub(crate) fn apply_descending_substitution(
        &self,
        descending: &Substitution,
        constraint: Option<&Expression>,
        optimize: bool,
        left: &IqTree,
        right: &IqTree,
        factory: &IqFactory,
    ) -> VkgResult<IqTree> {
        let right_specific = descending.apply_to_variables(&Self::right_specific_variables(left, right));
        let rejects_padding = optimize
            && constraint.is_some_and(|c| c.rejects_nulls_of(&right_specific));
        if rejects_padding || Self::contains_equality_right_specific_variable(descending, left, right) {
            log::trace!("degrading {self} into an inner join");
            return factory
                .create_inner_join(self.condition.clone(), vec![left.clone(), right.clone()])?
                .descend(descending, constraint, optimize, factory);
        }

        let left_variables = descending.apply_to_variables(left.variables());
        let left_constraint = constraint.and_then(|c| retain_conjuncts_over(c, &left_variables));
        let new_left = left.descend(descending, left_constraint.as_ref(), optimize, factory)?;
        let new_right = right.descend(descending, None, optimize, factory)?;
        let condition = self.condition.as_ref().map(|c| descending.apply_to_expression(c));
        if !optimize {
            return factory.create_left_join(condition, new_left, new_right);
        }

        let new_variables: BTreeSet<Variable> =
            new_left.variables().union(new_right.variables()).cloned().collect();
        let new_right_specific = Self::right_specific_variables(&new_left, &new_right);
        if new_left.is_declared_as_empty() {
            return Ok(factory.create_empty(new_variables));
        }
        if new_right.is_declared_as_empty() {
            return pad_with_nulls(new_left, &new_right_specific, factory);
        }
        match condition.map(|c| c.evaluate_2vl(&dummy_nullability(&new_variables))) {
            None | Some(Evaluation::True) => factory.create_left_join(None, new_left, new_right),
            Some(Evaluation::False | Evaluation::Null) => {
                pad_with_nulls(new_left, &new_right_specific, factory)
            }
            Some(Evaluation::Residual(e)) => factory.create_left_join(Some(e), new_left, new_right),
        }
    }

    /// Pushes `constraint` into the left child only, unless it rejects the
    /// padded rows, in which case the node behaves as an inner join.
    pub(crate) fn propagate_down_constraint(
        &self,
        constraint: &Expression,
        left: &IqTree,
        right: &IqTree,
        factory: &IqFactory,
    ) -> VkgResult<IqTree> {
        let right_specific = Self::right_specific_variables(left, right);
        if constraint.rejects_nulls_of(&right_specific) {
            log::trace!("{constraint} rejects the padding of {self}");
            return factory
                .create_inner_join(self.condition.clone(), vec![left.clone(), right.clone()])?
                .propagate_down_constraint(constraint, factory);
        }
        let new_left = match retain_conjuncts_over(constraint, left.variables()) {
            Some(c) => left.propagate_down_constraint(&c, factory)?,
            None => left.clone(),
        };
        factory.create_left_join(self.condition.clone(), new_left, right.clone())
    }

    /// Only definitions coming from the left child are lifted.
    pub(crate) fn lift_incompatible_definitions(
        &self,
        variable: &Variable,
        left: &IqTree,
        right: &IqTree,
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        if !left.variables().contains(variable) {
            return factory.create_left_join(self.condition.clone(), left.clone(), right.clone());
        }
        let new_left = left.lift_incompatible_definitions(variable, factory, generator)?;
        if let (true, IqNode::Union { children, .. }) = (
            new_left.is_union_with_liftable_definition(variable),
            new_left.node(),
        ) {
            let branches = children
                .iter()
                .map(|c| factory.create_left_join(self.condition.clone(), c.clone(), right.clone()))
                .collect::<VkgResult<Vec<_>>>()?;
            let variables = left.variables().union(right.variables()).cloned().collect();
            return factory
                .create_union(variables, branches)?
                .normalize_for_optimization(factory, generator);
        }
        factory.create_left_join(self.condition.clone(), new_left, right.clone())
    }
}

/// `left` extended with NULL bindings for `right_specific`.
fn pad_with_nulls(
    left: IqTree,
    right_specific: &BTreeSet<Variable>,
    factory: &IqFactory,
) -> VkgResult<IqTree> {
    if right_specific.is_empty() {
        return Ok(left);
    }
    let variables = left.variables().union(right_specific).cloned().collect();
    let padding: Substitution = right_specific
        .iter()
        .map(|v| (v.clone(), Term::null()))
        .collect();
    factory.create_construction(variables, padding, left)
}

impl fmt::Display for LeftJoinNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.condition {
            Some(condition) => write!(f, "LJ {condition}"),
            None => write!(f, "LJ"),
        }
    }
}
