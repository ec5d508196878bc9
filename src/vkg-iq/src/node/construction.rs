//! Construction nodes: projection with computed bindings.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use common_error::VkgResult;
use vkg_core::{
    Evaluation, Expression, Substitution, Term, Variable, VariableGenerator, VariableNullability,
};

use super::VariableList;
use crate::factory::IqFactory;
use crate::normalization::{retain_conjuncts_over, ConstructionSubstitutionNormalization};
use crate::tree::{IqNode, IqTree, UniqueConstraints};

/// Projects a set of variables, some of which are computed from the child's
/// variables by a substitution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstructionNode {
    projected: BTreeSet<Variable>,
    substitution: Substitution,
}

impl ConstructionNode {
    pub(crate) fn new(projected: BTreeSet<Variable>, substitution: Substitution) -> Self {
        Self {
            projected,
            substitution,
        }
    }

    /// Variables projected by the node.
    pub fn projected_variables(&self) -> &BTreeSet<Variable> {
        &self.projected
    }

    /// Bindings of the computed variables.
    pub fn substitution(&self) -> &Substitution {
        &self.substitution
    }

    /// Variables the child must project: the projected variables that are
    /// not computed, plus the variables used by the bindings.
    pub fn required_child_variables(&self) -> BTreeSet<Variable> {
        let mut variables: BTreeSet<Variable> = self
            .projected
            .iter()
            .filter(|v| !self.substitution.is_defining(v))
            .cloned()
            .collect();
        variables.extend(self.substitution.range_variables());
        variables
    }

    // ========== Derived properties ==========

    pub(crate) fn variable_nullability(&self, child: &IqTree) -> VariableNullability {
        child
            .variable_nullability()
            .update_with_substitution(&self.substitution, &self.projected)
    }

    pub(crate) fn unique_constraints(&self, child: &IqTree) -> UniqueConstraints {
        let passed_through: BTreeSet<Variable> = self
            .projected
            .iter()
            .filter(|v| !self.substitution.is_defining(v))
            .cloned()
            .collect();

        let mut constraints: UniqueConstraints = child
            .infer_unique_constraints()
            .iter()
            .filter(|c| c.is_subset(&passed_through))
            .cloned()
            .collect();
        if constraints.is_empty()
            && child.is_distinct()
            && child.variables().is_subset(&passed_through)
        {
            constraints.insert(child.variables().clone());
        }
        constraints
    }

    // ========== Normalization ==========

    /// Merges with a child construction, collapses over an empty child and
    /// removes itself when it neither computes nor hides anything.
    pub(crate) fn normalize(
        &self,
        child: &IqTree,
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        let child = child.normalize_for_optimization(factory, generator)?;
        if child.is_declared_as_empty() {
            log::trace!("{self} over an empty child");
            return Ok(factory.create_empty(self.projected.clone()));
        }
        if let IqNode::Construction {
            node: child_node,
            child: grand_child,
        } = child.node()
        {
            log::trace!("merging {self} with {child_node}");
            let merged = child_node.substitution.compose(&self.substitution);
            return self.normalize_substitution(&merged, grand_child, factory, generator);
        }
        if self.substitution.is_empty() && child.variables() == &self.projected {
            return Ok(child);
        }
        self.normalize_substitution(&self.substitution, &child, factory, generator)
    }

    fn normalize_substitution(
        &self,
        substitution: &Substitution,
        child: &IqTree,
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        let nullability = child.variable_nullability();
        let simplified: Substitution = substitution
            .iter()
            .map(|(v, t)| (v.clone(), t.simplify(nullability)))
            .collect();

        let normalization = ConstructionSubstitutionNormalization::normalize(
            &simplified,
            &self.projected,
            child.variables(),
            generator,
        );
        let new_child = normalization.update_child(child, factory)?;
        normalization.top_construction(new_child, factory)
    }

    // ========== Propagation ==========

    /// Pushes the child part of `descending` into the child and turns the
    /// part hitting computed variables into equalities over their definitions.
    pub(crate) fn apply_descending_substitution(
        &self,
        descending: &Substitution,
        constraint: Option<&Expression>,
        optimize: bool,
        child: &IqTree,
        factory: &IqFactory,
    ) -> VkgResult<IqTree> {
        let passed_through: BTreeSet<Variable> = self
            .projected
            .iter()
            .filter(|v| !self.substitution.is_defining(v))
            .cloned()
            .collect();

        let (child, theta) =
            self.rename_hidden_clashes(descending, &passed_through, child, optimize, factory)?;

        let child_descending = descending.restrict(&passed_through);
        let passed_through_images = child_descending.apply_to_variables(&passed_through);

        let mut definitions: BTreeMap<Variable, Term> = BTreeMap::new();
        let mut conditions: Vec<Expression> = Vec::new();
        for (defined, definition) in theta.iter() {
            let definition = child_descending.apply_to_term(definition);
            match descending.apply_to_variable(defined) {
                Term::Variable(image) if passed_through_images.contains(&image) => {
                    conditions.push(Expression::eq(image, definition));
                }
                Term::Variable(image) => match definitions.get(&image) {
                    Some(existing) => conditions.push(Expression::eq(existing.clone(), definition)),
                    None => {
                        definitions.insert(image, definition);
                    }
                },
                constant => conditions.push(Expression::eq(definition, constant)),
            }
        }
        let definitions: Substitution = definitions.into_iter().collect();
        let new_projected = descending.apply_to_variables(&self.projected);

        let condition = Expression::conjunction(conditions);
        let child_constraint = if optimize {
            let lifted = constraint
                .and_then(|c| retain_conjuncts_over(c, &new_projected))
                .map(|c| definitions.apply_to_expression(&c));
            Expression::and_optional(lifted, condition.clone())
        } else {
            None
        };
        let new_child = child.descend(&child_descending, child_constraint.as_ref(), optimize, factory)?;

        let filtered = match condition {
            None => new_child,
            Some(condition) if optimize => {
                match condition.evaluate_2vl(new_child.variable_nullability()) {
                    Evaluation::True => new_child,
                    Evaluation::False | Evaluation::Null => {
                        log::trace!("descending substitution {descending} contradicts {self}");
                        return Ok(factory.create_empty(new_projected));
                    }
                    Evaluation::Residual(e) => factory.create_filter(e, new_child)?,
                }
            }
            Some(condition) => factory.create_filter(condition, new_child)?,
        };

        if definitions.is_empty() && filtered.variables() == &new_projected {
            Ok(filtered)
        } else {
            factory.create_construction(new_projected, definitions, filtered)
        }
    }

    /// Renames child variables hidden by the node that `descending` would capture.
    fn rename_hidden_clashes(
        &self,
        descending: &Substitution,
        passed_through: &BTreeSet<Variable>,
        child: &IqTree,
        optimize: bool,
        factory: &IqFactory,
    ) -> VkgResult<(IqTree, Substitution)> {
        let targets = descending.range_variables();
        let clashes: Vec<&Variable> = child
            .variables()
            .iter()
            .filter(|v| !passed_through.contains(v) && targets.contains(v))
            .collect();
        if clashes.is_empty() {
            return Ok((child.clone(), self.substitution.clone()));
        }

        let mut generator = VariableGenerator::new(
            child
                .known_variables()
                .into_iter()
                .chain(self.projected.iter().cloned())
                .chain(targets.iter().cloned()),
        );
        let renaming: Substitution = clashes
            .into_iter()
            .map(|v| (v.clone(), Term::Variable(generator.generate_new_variable_from(v))))
            .collect();
        log::trace!("renaming hidden variables {renaming} below {self}");

        let theta = self
            .substitution
            .iter()
            .map(|(v, t)| (v.clone(), renaming.apply_to_term(t)))
            .collect();
        Ok((child.descend(&renaming, None, optimize, factory)?, theta))
    }

    pub(crate) fn propagate_down_constraint(
        &self,
        constraint: &Expression,
        child: &IqTree,
        factory: &IqFactory,
    ) -> VkgResult<IqTree> {
        let Some(constraint) = retain_conjuncts_over(constraint, &self.projected) else {
            return self.rebuild(child.clone(), factory);
        };
        let new_child = child
            .propagate_down_constraint(&self.substitution.apply_to_expression(&constraint), factory)?;
        self.rebuild(new_child, factory)
    }

    pub(crate) fn lift_incompatible_definitions(
        &self,
        variable: &Variable,
        child: &IqTree,
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        if !self.required_child_variables().contains(variable) {
            return self.rebuild(child.clone(), factory);
        }
        let new_child = child.lift_incompatible_definitions(variable, factory, generator)?;
        if let (true, IqNode::Union { children, .. }) = (
            new_child.is_union_with_liftable_definition(variable),
            new_child.node(),
        ) {
            let branches = children
                .iter()
                .map(|c| self.rebuild(c.clone(), factory))
                .collect::<VkgResult<Vec<_>>>()?;
            return factory.create_union(self.projected.clone(), branches);
        }
        self.rebuild(new_child, factory)
    }

    fn rebuild(&self, child: IqTree, factory: &IqFactory) -> VkgResult<IqTree> {
        factory.create_construction(self.projected.clone(), self.substitution.clone(), child)
    }
}

impl fmt::Display for ConstructionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CONSTRUCT {} [{}]",
            VariableList(&self.projected),
            self.substitution
        )
    }
}
