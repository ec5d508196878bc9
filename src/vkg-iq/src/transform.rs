//! Recursive tree transformers.
//!
//! An [`IqTreeTransformer`] has one hook per node variant. Every hook
//! defaults to transforming the children and rebuilding the node only when
//! a child changed, so an implementation only overrides the variants it
//! rewrites.

use common_error::{terminal_node, VkgResult};

use crate::factory::IqFactory;
use crate::node::{
    AggregationNode, ConstructionNode, DistinctNode, EmptyNode, ExtensionalDataNode, FilterNode,
    InnerJoinNode, IntensionalDataNode, LeftJoinNode, NativeNode, OrderByNode, SliceNode,
    UnionNode,
};
use crate::tree::{IqNode, IqTree};

/// A structure-preserving rewriting of query trees.
pub trait IqTreeTransformer {
    /// Factory used to rebuild nodes.
    fn factory(&self) -> &IqFactory;

    /// Transform `tree` by dispatching on its root.
    fn transform(&self, tree: &IqTree) -> VkgResult<IqTree> {
        match tree.node() {
            IqNode::Construction { node, child } => self.transform_construction(tree, node, child),
            IqNode::Filter { node, child } => self.transform_filter(tree, node, child),
            IqNode::InnerJoin { node, children } => self.transform_inner_join(tree, node, children),
            IqNode::LeftJoin { node, left, right } => {
                self.transform_left_join(tree, node, left, right)
            }
            IqNode::Union { node, children } => self.transform_union(tree, node, children),
            IqNode::Distinct { node, child } => self.transform_distinct(tree, node, child),
            IqNode::Slice { node, child } => self.transform_slice(tree, node, child),
            IqNode::OrderBy { node, child } => self.transform_order_by(tree, node, child),
            IqNode::Aggregation { node, child } => self.transform_aggregation(tree, node, child),
            IqNode::ExtensionalData(node) => self.transform_extensional_data(tree, node),
            IqNode::IntensionalData(node) => self.transform_intensional_data(tree, node),
            IqNode::Native(node) => self.transform_native(tree, node),
            IqNode::Empty(node) => self.transform_empty(tree, node),
            IqNode::True => self.transform_true(tree),
        }
    }

    // ========== Hooks ==========

    fn transform_construction(
        &self,
        tree: &IqTree,
        _node: &ConstructionNode,
        child: &IqTree,
    ) -> VkgResult<IqTree> {
        self.transform_unary_node(tree, child)
    }

    fn transform_filter(&self, tree: &IqTree, _node: &FilterNode, child: &IqTree) -> VkgResult<IqTree> {
        self.transform_unary_node(tree, child)
    }

    fn transform_inner_join(
        &self,
        tree: &IqTree,
        _node: &InnerJoinNode,
        children: &[IqTree],
    ) -> VkgResult<IqTree> {
        self.transform_nary_node(tree, children)
    }

    fn transform_left_join(
        &self,
        tree: &IqTree,
        _node: &LeftJoinNode,
        left: &IqTree,
        right: &IqTree,
    ) -> VkgResult<IqTree> {
        self.transform_binary_node(tree, left, right)
    }

    fn transform_union(&self, tree: &IqTree, _node: &UnionNode, children: &[IqTree]) -> VkgResult<IqTree> {
        self.transform_nary_node(tree, children)
    }

    fn transform_distinct(
        &self,
        tree: &IqTree,
        _node: &DistinctNode,
        child: &IqTree,
    ) -> VkgResult<IqTree> {
        self.transform_unary_node(tree, child)
    }

    fn transform_slice(&self, tree: &IqTree, _node: &SliceNode, child: &IqTree) -> VkgResult<IqTree> {
        self.transform_unary_node(tree, child)
    }

    fn transform_order_by(
        &self,
        tree: &IqTree,
        _node: &OrderByNode,
        child: &IqTree,
    ) -> VkgResult<IqTree> {
        self.transform_unary_node(tree, child)
    }

    fn transform_aggregation(
        &self,
        tree: &IqTree,
        _node: &AggregationNode,
        child: &IqTree,
    ) -> VkgResult<IqTree> {
        self.transform_unary_node(tree, child)
    }

    fn transform_extensional_data(
        &self,
        tree: &IqTree,
        _node: &ExtensionalDataNode,
    ) -> VkgResult<IqTree> {
        Ok(tree.clone())
    }

    fn transform_intensional_data(
        &self,
        tree: &IqTree,
        _node: &IntensionalDataNode,
    ) -> VkgResult<IqTree> {
        Ok(tree.clone())
    }

    /// Native nodes are terminal.
    fn transform_native(&self, _tree: &IqTree, node: &NativeNode) -> VkgResult<IqTree> {
        terminal_node!("cannot transform {node}")
    }

    fn transform_empty(&self, tree: &IqTree, _node: &EmptyNode) -> VkgResult<IqTree> {
        Ok(tree.clone())
    }

    fn transform_true(&self, tree: &IqTree) -> VkgResult<IqTree> {
        Ok(tree.clone())
    }

    // ========== Recursion helpers ==========

    fn transform_unary_node(&self, tree: &IqTree, child: &IqTree) -> VkgResult<IqTree> {
        let new_child = self.transform(child)?;
        if &new_child == child {
            return Ok(tree.clone());
        }
        tree.with_children(vec![new_child], self.factory())
    }

    fn transform_binary_node(&self, tree: &IqTree, left: &IqTree, right: &IqTree) -> VkgResult<IqTree> {
        let new_left = self.transform(left)?;
        let new_right = self.transform(right)?;
        if &new_left == left && &new_right == right {
            return Ok(tree.clone());
        }
        tree.with_children(vec![new_left, new_right], self.factory())
    }

    fn transform_nary_node(&self, tree: &IqTree, children: &[IqTree]) -> VkgResult<IqTree> {
        let new_children = children
            .iter()
            .map(|c| self.transform(c))
            .collect::<VkgResult<Vec<_>>>()?;
        if new_children.as_slice() == children {
            return Ok(tree.clone());
        }
        tree.with_children(new_children, self.factory())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use common_config::IqSettings;
    use common_error::VkgError;
    use vkg_core::{Expression, IntensionalPredicate, Term, Variable};

    use super::*;

    /// Replaces every intensional atom of arity 1 by an empty node.
    struct EmptyIntensional {
        factory: IqFactory,
    }

    impl IqTreeTransformer for EmptyIntensional {
        fn factory(&self) -> &IqFactory {
            &self.factory
        }

        fn transform_intensional_data(
            &self,
            tree: &IqTree,
            node: &IntensionalDataNode,
        ) -> VkgResult<IqTree> {
            if node.atom().arguments().len() == 1 {
                Ok(self.factory.create_empty(tree.variables().clone()))
            } else {
                Ok(tree.clone())
            }
        }
    }

    /// Leaves everything alone.
    struct Identity {
        factory: IqFactory,
    }

    impl IqTreeTransformer for Identity {
        fn factory(&self) -> &IqFactory {
            &self.factory
        }
    }

    fn factory() -> IqFactory {
        IqFactory::new(IqSettings::testing())
    }

    fn atom(name: &str, args: &[&str]) -> IqTree {
        factory()
            .create_intensional(
                IntensionalPredicate::new(name, args.len()),
                args.iter().map(|a| Term::var(a)).collect(),
            )
            .unwrap()
    }

    #[test]
    fn test_unchanged_tree_is_shared() {
        let f = factory();
        let join = f
            .create_inner_join(None, vec![atom("p", &["x", "y"]), atom("q", &["y", "z"])])
            .unwrap();
        let result = Identity { factory: f }.transform(&join).unwrap();
        assert!(std::ptr::eq(result.node(), join.node()));
    }

    #[test]
    fn test_rebuilds_only_changed_path() {
        let f = factory();
        let left = atom("p", &["x", "y"]);
        let filter = f
            .create_filter(Expression::is_not_null(Term::var("z")), atom("q", &["z"]))
            .unwrap();
        let join = f.create_inner_join(None, vec![left.clone(), filter]).unwrap();

        let result = EmptyIntensional { factory: f }.transform(&join).unwrap();
        let IqNode::InnerJoin { children, .. } = result.node() else {
            panic!("expected a join, got {result}");
        };
        assert!(std::ptr::eq(children[0].node(), left.node()));
        let IqNode::Filter { child, .. } = children[1].node() else {
            panic!("expected a filter, got {}", children[1]);
        };
        assert!(child.is_declared_as_empty());
        assert_eq!(
            result.variables(),
            &["x", "y", "z"].iter().map(Variable::new).collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn test_native_is_terminal() {
        let f = factory();
        let native = f
            .create_native(
                BTreeSet::new(),
                Default::default(),
                Default::default(),
                "SELECT 1",
                vkg_core::VariableNullability::empty(),
            )
            .unwrap();
        let err = Identity { factory: f }.transform(&native).unwrap_err();
        assert!(matches!(err, VkgError::TerminalNode(_)));
    }
}
