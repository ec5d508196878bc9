//! Self-join elimination over atoms required twice.
//!
//! An extensional atom of an inner join is redundant when a sibling already
//! requires an atom of the same relation with the same arguments, except on
//! variables nobody reads above the join. Removing it only loses the SQL
//! equalities it imposed on its shared variables, which are kept as
//! `IS NOT NULL` guards in the join condition.
//!
//! Under a DISTINCT any such match is enough. Elsewhere the matching
//! arguments must also cover a unique constraint of the relation, so that
//! both atoms denote the same row and row multiplicities are kept.
//!
//! The detection is best-effort: it compares predicates and arguments
//! position by position and never reports a false positive.

use std::collections::BTreeSet;

use common_error::VkgResult;
use log::debug;
use vkg_core::{DataAtom, Expression, RelationDefinition, RelationPredicate, Term, Variable};
use vkg_iq::{
    AggregationNode, ConstructionNode, DistinctNode, FilterNode, InnerJoinNode, Iq, IqFactory,
    IqNode, IqTree, IqTreeTransformer, LeftJoinNode, OrderByNode, SliceNode, UnionNode,
};

use super::rule::{IqOptimizer, Transformed};

/// Removes redundant extensional atoms from inner joins, then renormalizes.
pub struct SelfJoinSameTermRule {
    factory: IqFactory,
}

impl SelfJoinSameTermRule {
    pub fn new(factory: IqFactory) -> Self {
        Self { factory }
    }
}

impl IqOptimizer for SelfJoinSameTermRule {
    fn name(&self) -> &'static str {
        "SelfJoinSameTerm"
    }

    fn description(&self) -> &'static str {
        "Removes join atoms already required by a sibling atom of the same relation"
    }

    fn apply(&self, query: Iq) -> VkgResult<Transformed> {
        let tree = SameTermTransformer::root(self.factory).transform(query.tree())?;
        if &tree == query.tree() {
            return Ok(Transformed::no(query));
        }
        let query = query
            .with_tree(tree)?
            .normalize_for_optimization(&self.factory)?;
        Ok(Transformed::yes(query))
    }
}

/// Walks the tree tracking the variables discarded above the current node
/// and whether only the set of its rows matters.
struct SameTermTransformer {
    factory: IqFactory,
    discarded: BTreeSet<Variable>,
    distinct: bool,
}

impl SameTermTransformer {
    fn root(factory: IqFactory) -> Self {
        Self {
            factory,
            discarded: BTreeSet::new(),
            distinct: false,
        }
    }

    fn update(&self, discarded: BTreeSet<Variable>, distinct: bool) -> Self {
        Self {
            factory: self.factory,
            discarded,
            distinct,
        }
    }

    fn transform_child(
        &self,
        tree: &IqTree,
        child: &IqTree,
        discarded: BTreeSet<Variable>,
        distinct: bool,
    ) -> VkgResult<IqTree> {
        let new_child = self.update(discarded, distinct).transform(child)?;
        if &new_child == child {
            return Ok(tree.clone());
        }
        tree.with_children(vec![new_child], &self.factory)
    }

    fn discarded_except(&self, used: &BTreeSet<Variable>) -> BTreeSet<Variable> {
        self.discarded.difference(used).cloned().collect()
    }

    /// Replaces redundant extensional children by True. `None` when no child is redundant.
    fn remove_redundant_children(
        &self,
        condition: Option<&Expression>,
        discarded_per_child: &[BTreeSet<Variable>],
        children: &[IqTree],
    ) -> VkgResult<Option<IqTree>> {
        let mut current = children.to_vec();
        let mut removed = false;
        let mut guarded = BTreeSet::new();

        for i in 0..current.len() {
            let IqNode::ExtensionalData(node) = current[i].node() else {
                continue;
            };
            let atom = node.atom();
            let redundant = current
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .flat_map(|(_, sibling)| required_atoms(sibling))
                .any(|other| self.is_redundant(atom, other, &discarded_per_child[i]));
            if !redundant {
                continue;
            }
            debug!("{atom} is redundant in its join");
            guarded.extend(
                current[i]
                    .variables()
                    .difference(&discarded_per_child[i])
                    .cloned(),
            );
            current[i] = self.factory.create_true();
            removed = true;
        }

        if !removed {
            return Ok(None);
        }
        let condition = Expression::conjunction(
            condition
                .cloned()
                .into_iter()
                .chain(guarded.iter().map(|v| Expression::is_not_null(Term::from(v)))),
        );
        self.factory.create_inner_join(condition, current).map(Some)
    }

    fn is_redundant(
        &self,
        atom: &DataAtom<RelationPredicate>,
        other: &DataAtom<RelationPredicate>,
        discarded: &BTreeSet<Variable>,
    ) -> bool {
        if atom.predicate() != other.predicate() {
            return false;
        }
        let arguments = atom.arguments();
        let other_arguments = other.arguments();
        let differing: Vec<usize> = (0..arguments.len())
            .filter(|i| arguments[*i] != other_arguments[*i])
            .collect();

        // At least one argument must match.
        if differing.len() == arguments.len() {
            return false;
        }
        let only_discarded = differing.iter().all(|i| match arguments[*i].as_variable() {
            Some(v) => {
                discarded.contains(v)
                    && arguments.iter().filter(|a| a.as_variable() == Some(v)).count() == 1
            }
            None => false,
        });
        only_discarded && (self.distinct || matches_unique_constraint(atom.predicate(), &differing))
    }
}

/// Whether the positions outside `differing` cover a unique constraint over
/// non-nullable columns.
fn matches_unique_constraint(relation: &RelationDefinition, differing: &[usize]) -> bool {
    relation
        .unique_constraint_positions()
        .iter()
        .any(|positions| {
            !positions.is_empty()
                && positions
                    .iter()
                    .all(|p| !relation.is_nullable_at(*p) && !differing.contains(p))
        })
}

/// Atoms every row of `tree` is built from.
fn required_atoms(tree: &IqTree) -> Vec<&DataAtom<RelationPredicate>> {
    match tree.node() {
        IqNode::ExtensionalData(node) => vec![node.atom()],
        IqNode::Filter { child, .. } => required_atoms(child),
        IqNode::InnerJoin { children, .. } => children.iter().flat_map(required_atoms).collect(),
        _ => Vec::new(),
    }
}

impl IqTreeTransformer for SameTermTransformer {
    fn factory(&self) -> &IqFactory {
        &self.factory
    }

    fn transform_construction(
        &self,
        tree: &IqTree,
        node: &ConstructionNode,
        child: &IqTree,
    ) -> VkgResult<IqTree> {
        let required = node.required_child_variables();
        let discarded = child.variables().difference(&required).cloned().collect();
        self.transform_child(tree, child, discarded, self.distinct)
    }

    fn transform_filter(&self, tree: &IqTree, node: &FilterNode, child: &IqTree) -> VkgResult<IqTree> {
        let discarded = self.discarded_except(&node.condition().variables());
        self.transform_child(tree, child, discarded, self.distinct)
    }

    fn transform_inner_join(
        &self,
        tree: &IqTree,
        node: &InnerJoinNode,
        children: &[IqTree],
    ) -> VkgResult<IqTree> {
        let used = node.condition().map(Expression::variables).unwrap_or_default();
        let discarded_per_child: Vec<BTreeSet<Variable>> = (0..children.len())
            .map(|i| {
                let shared: BTreeSet<Variable> = children
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .flat_map(|(_, c)| c.variables().iter().cloned())
                    .chain(used.iter().cloned())
                    .collect();
                children[i]
                    .variables()
                    .iter()
                    .filter(|v| self.discarded.contains(*v) && !shared.contains(*v))
                    .cloned()
                    .collect()
            })
            .collect();

        let new_children = children
            .iter()
            .zip(&discarded_per_child)
            .map(|(c, d)| self.update(d.clone(), self.distinct).transform(c))
            .collect::<VkgResult<Vec<_>>>()?;

        match self.remove_redundant_children(node.condition(), &discarded_per_child, &new_children)? {
            Some(join) => Ok(join),
            None if new_children.as_slice() == children => Ok(tree.clone()),
            None => tree.with_children(new_children, &self.factory),
        }
    }

    fn transform_left_join(
        &self,
        tree: &IqTree,
        node: &LeftJoinNode,
        left: &IqTree,
        right: &IqTree,
    ) -> VkgResult<IqTree> {
        let used = node.condition().map(Expression::variables).unwrap_or_default();
        let left_discarded = self
            .discarded_except(&used)
            .difference(right.variables())
            .cloned()
            .collect();
        let right_discarded = self
            .discarded_except(&used)
            .difference(left.variables())
            .cloned()
            .collect();

        let new_left = self.update(left_discarded, self.distinct).transform(left)?;
        let new_right = self.update(right_discarded, self.distinct).transform(right)?;
        if &new_left == left && &new_right == right {
            return Ok(tree.clone());
        }
        tree.with_children(vec![new_left, new_right], &self.factory)
    }

    /// Branches must keep projecting the same variables.
    fn transform_union(&self, tree: &IqTree, _node: &UnionNode, children: &[IqTree]) -> VkgResult<IqTree> {
        self.update(BTreeSet::new(), self.distinct)
            .transform_nary_node(tree, children)
    }

    fn transform_distinct(
        &self,
        tree: &IqTree,
        _node: &DistinctNode,
        child: &IqTree,
    ) -> VkgResult<IqTree> {
        self.transform_child(tree, child, self.discarded.clone(), true)
    }

    fn transform_slice(&self, tree: &IqTree, _node: &SliceNode, child: &IqTree) -> VkgResult<IqTree> {
        self.transform_child(tree, child, self.discarded.clone(), false)
    }

    fn transform_order_by(
        &self,
        tree: &IqTree,
        node: &OrderByNode,
        child: &IqTree,
    ) -> VkgResult<IqTree> {
        let used = node
            .comparators()
            .iter()
            .flat_map(|c| c.term().variables())
            .collect();
        let discarded = self.discarded_except(&used);
        self.transform_child(tree, child, discarded, self.distinct)
    }

    fn transform_aggregation(
        &self,
        tree: &IqTree,
        node: &AggregationNode,
        child: &IqTree,
    ) -> VkgResult<IqTree> {
        let discarded = child
            .variables()
            .iter()
            .filter(|v| {
                !node.grouping_variables().contains(*v)
                    && !node.substitution().range_variables().contains(*v)
            })
            .cloned()
            .collect();
        self.transform_child(tree, child, discarded, false)
    }
}

#[cfg(test)]
mod tests {
    use common_config::IqSettings;
    use vkg_core::DbTermType;

    use super::*;

    fn relation(key: bool) -> RelationPredicate {
        let builder = RelationDefinition::builder("r")
            .attribute("a", DbTermType::Integer, false)
            .attribute("b", DbTermType::Integer, true);
        let builder = if key { builder.primary_key(&["a"]) } else { builder };
        builder.build().unwrap()
    }

    fn atom(relation: &RelationPredicate, a: Term, b: Term) -> DataAtom<RelationPredicate> {
        DataAtom::new(relation.clone(), vec![a, b])
    }

    fn transformer(distinct: bool, discarded: &[&str]) -> SameTermTransformer {
        SameTermTransformer::root(IqFactory::new(IqSettings::testing()))
            .update(discarded.iter().map(Variable::new).collect(), distinct)
    }

    #[test]
    fn test_same_atom_is_redundant_under_distinct() {
        let r = relation(false);
        let first = atom(&r, Term::var("x"), Term::var("y"));
        let second = atom(&r, Term::var("x"), Term::var("y"));

        assert!(transformer(true, &[]).is_redundant(&first, &second, &BTreeSet::new()));
        assert!(!transformer(false, &[]).is_redundant(&first, &second, &BTreeSet::new()));
    }

    #[test]
    fn test_differing_argument_must_be_discarded() {
        let r = relation(true);
        let first = atom(&r, Term::var("x"), Term::var("d"));
        let second = atom(&r, Term::var("x"), Term::var("y"));
        let discarded: BTreeSet<Variable> = [Variable::new("d")].into();

        assert!(transformer(false, &["d"]).is_redundant(&first, &second, &discarded));
        assert!(!transformer(false, &[]).is_redundant(&first, &second, &BTreeSet::new()));
    }

    #[test]
    fn test_key_must_match_outside_distinct() {
        let r = relation(true);
        let first = atom(&r, Term::var("d"), Term::var("y"));
        let second = atom(&r, Term::var("x"), Term::var("y"));
        let discarded: BTreeSet<Variable> = [Variable::new("d")].into();

        assert!(!transformer(false, &["d"]).is_redundant(&first, &second, &discarded));
        assert!(transformer(true, &["d"]).is_redundant(&first, &second, &discarded));
    }

    #[test]
    fn test_no_matching_argument() {
        let r = relation(false);
        let first = atom(&r, Term::var("d"), Term::var("e"));
        let second = atom(&r, Term::var("x"), Term::var("y"));
        let discarded: BTreeSet<Variable> = [Variable::new("d"), Variable::new("e")].into();

        assert!(!transformer(true, &["d", "e"]).is_redundant(&first, &second, &discarded));
    }

    #[test]
    fn test_repeated_discarded_variable_is_not_free() {
        let r = relation(false);
        let first = atom(&r, Term::var("d"), Term::var("d"));
        let second = atom(&r, Term::var("d"), Term::var("y"));
        let discarded: BTreeSet<Variable> = [Variable::new("d")].into();

        assert!(!transformer(true, &["d"]).is_redundant(&first, &second, &discarded));
    }

    #[test]
    fn test_constants_must_be_equal() {
        let r = relation(false);
        let first = atom(&r, Term::var("x"), Term::int(1));
        let second = atom(&r, Term::var("x"), Term::int(2));

        assert!(!transformer(true, &[]).is_redundant(&first, &second, &BTreeSet::new()));
    }
}
