//! Grouping with aggregates.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use common_error::VkgResult;
use vkg_core::{
    Expression, FunctionKind, Substitution, Term, Variable, VariableGenerator,
    VariableNullability,
};

use super::VariableList;
use crate::factory::IqFactory;
use crate::tree::IqTree;

/// Groups the rows of its child by the grouping variables and binds each
/// other projected variable to an aggregate over the group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregationNode {
    grouping: BTreeSet<Variable>,
    substitution: Substitution,
}

impl AggregationNode {
    pub(crate) fn new(grouping: BTreeSet<Variable>, substitution: Substitution) -> Self {
        Self {
            grouping,
            substitution,
        }
    }

    pub fn grouping_variables(&self) -> &BTreeSet<Variable> {
        &self.grouping
    }

    /// Bindings of the aggregated variables.
    pub fn substitution(&self) -> &Substitution {
        &self.substitution
    }

    /// Grouping variables plus aggregated variables.
    pub fn projected_variables(&self) -> BTreeSet<Variable> {
        let mut variables = self.grouping.clone();
        variables.extend(self.substitution.domain());
        variables
    }

    pub(crate) fn variable_nullability(&self, child: &IqTree) -> VariableNullability {
        let child_nullability = child.variable_nullability();
        let mut groups: Vec<BTreeSet<Variable>> = child_nullability
            .restrict(&self.grouping)
            .nullable_groups()
            .iter()
            .cloned()
            .collect();
        groups.extend(
            self.substitution
                .iter()
                .filter(|(_, t)| child_nullability.is_term_nullable(t))
                .map(|(v, _)| BTreeSet::from([v.clone()])),
        );
        VariableNullability::new(groups, self.projected_variables())
    }

    pub(crate) fn normalize(
        &self,
        child: &IqTree,
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        let child = child.normalize_for_optimization(factory, generator)?;
        if child.is_declared_as_empty() {
            if !self.grouping.is_empty() {
                return Ok(factory.create_empty(self.projected_variables()));
            }
            // A single row of aggregates over no input.
            let values = self
                .substitution
                .iter()
                .map(|(v, t)| (v.clone(), aggregate_of_nothing(t)))
                .collect();
            return factory.create_construction(
                self.projected_variables(),
                values,
                factory.create_true(),
            );
        }

        let nullability = child.variable_nullability();
        let substitution: Substitution = self
            .substitution
            .iter()
            .map(|(v, t)| (v.clone(), t.simplify(nullability)))
            .collect();
        factory.create_aggregation(self.grouping.clone(), substitution, child)
    }

    /// Grouping variables are substituted in the child. An aggregated
    /// variable bound to a fresh variable is renamed; any other binding is
    /// checked by a filter above the aggregation and projected away.
    pub(crate) fn apply_descending_substitution(
        &self,
        descending: &Substitution,
        optimize: bool,
        child: &IqTree,
        factory: &IqFactory,
    ) -> VkgResult<IqTree> {
        let grouping_part = descending.remove_from_domain(&self.substitution.domain());
        let targets = descending.range_variables();
        let hidden_clashes: Vec<&Variable> = child
            .variables()
            .iter()
            .filter(|v| !self.grouping.contains(*v) && targets.contains(*v))
            .collect();
        let (child, substitution) = if hidden_clashes.is_empty() {
            (child.clone(), self.substitution.clone())
        } else {
            let mut generator = VariableGenerator::new(
                child
                    .known_variables()
                    .into_iter()
                    .chain(self.projected_variables())
                    .chain(targets.iter().cloned()),
            );
            let renaming: Substitution = hidden_clashes
                .into_iter()
                .map(|v| (v.clone(), Term::Variable(generator.generate_new_variable_from(v))))
                .collect();
            let substitution = self
                .substitution
                .iter()
                .map(|(v, t)| (v.clone(), renaming.apply_to_term(t)))
                .collect();
            (child.descend(&renaming, None, optimize, factory)?, substitution)
        };

        let new_child = child.descend(&grouping_part, None, optimize, factory)?;
        let grouping = grouping_part.apply_to_variables(&self.grouping);

        let mut generator = VariableGenerator::new(
            new_child
                .known_variables()
                .into_iter()
                .chain(self.projected_variables())
                .chain(targets),
        );
        let mut images = self.aggregated_images(descending);
        let mut bindings = Vec::with_capacity(images.len());
        let mut equalities = Vec::new();
        for (v, t) in substitution.iter() {
            let t = grouping_part.apply_to_term(t);
            match images.remove(v) {
                Some(AggregatedImage::Constrained(image)) => {
                    let fresh = generator.generate_new_variable_from(v);
                    equalities.push(Expression::eq(Term::Variable(fresh.clone()), image));
                    bindings.push((fresh, t));
                }
                Some(AggregatedImage::Renamed(new)) => bindings.push((new, t)),
                None => bindings.push((v.clone(), t)),
            }
        }
        let aggregation = factory.create_aggregation(grouping, bindings.into_iter().collect(), new_child)?;
        let Some(condition) = Expression::conjunction(equalities) else {
            return Ok(aggregation);
        };
        log::trace!("{descending} keeps {condition} above {self}");
        let filter = factory.create_filter(condition, aggregation)?;
        factory.create_projection(descending.apply_to_variables(&self.projected_variables()), filter)
    }

    /// What each aggregated variable becomes under `descending`.
    ///
    /// The first aggregated variable mapped to a variable that is neither a
    /// grouping variable nor already taken is renamed to it.
    fn aggregated_images(&self, descending: &Substitution) -> BTreeMap<Variable, AggregatedImage> {
        let grouping = descending
            .remove_from_domain(&self.substitution.domain())
            .apply_to_variables(&self.grouping);
        let mut taken = BTreeSet::new();
        self.substitution
            .domain()
            .into_iter()
            .map(|v| {
                let image = match descending.apply_to_variable(&v) {
                    Term::Variable(w) if !grouping.contains(&w) && taken.insert(w.clone()) => {
                        AggregatedImage::Renamed(w)
                    }
                    other => AggregatedImage::Constrained(other),
                };
                (v, image)
            })
            .collect()
    }

    /// Variables bound by `substitution` whose binding would have to be
    /// checked by a filter above this node rather than absorbed into it.
    pub(crate) fn constrained_bindings(&self, substitution: &Substitution) -> BTreeSet<Variable> {
        let substitution = substitution.restrict(&self.projected_variables());
        let mut constrained = BTreeSet::new();
        for (v, image) in self.aggregated_images(&substitution) {
            if !matches!(image, AggregatedImage::Constrained(_)) {
                continue;
            }
            let target = Term::Variable(v.clone());
            constrained.extend(
                substitution
                    .iter()
                    .filter(|(w, t)| **w == v || **t == target)
                    .map(|(w, _)| w.clone()),
            );
        }
        constrained
    }
}

enum AggregatedImage {
    Renamed(Variable),
    Constrained(Term),
}

/// Value of an aggregate over an empty group.
fn aggregate_of_nothing(term: &Term) -> Term {
    match term.as_function().map(|f| f.symbol().kind()) {
        Some(FunctionKind::Count) => Term::int(0),
        _ => Term::null(),
    }
}

impl fmt::Display for AggregationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AGGREGATE {} [{}]",
            VariableList(&self.grouping),
            self.substitution
        )
    }
}
