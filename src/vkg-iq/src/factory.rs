//! Construction of query trees.
//!
//! Trees are only built through an [`IqFactory`]. In test mode every node is
//! checked against its invariants as soon as it is built, so that a faulty
//! rewriting fails where it happens rather than downstream.

use std::collections::{BTreeMap, BTreeSet};

use common_config::IqSettings;
use common_error::VkgResult;
use vkg_core::{
    DataAtom, DbTermType, Expression, IntensionalPredicate, RelationPredicate, Substitution, Term,
    Variable, VariableNullability,
};

use crate::node::{
    AggregationNode, ConstructionNode, DistinctNode, EmptyNode, ExtensionalDataNode, FilterNode,
    InnerJoinNode, IntensionalDataNode, LeftJoinNode, NativeNode, OrderByNode, OrderComparator,
    SliceNode, UnionNode,
};
use crate::tree::{IqNode, IqTree};
use crate::validation;

/// Builds query trees, validating them in test mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct IqFactory {
    settings: IqSettings,
}

impl IqFactory {
    pub fn new(settings: IqSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &IqSettings {
        &self.settings
    }

    fn build(&self, node: IqNode) -> VkgResult<IqTree> {
        let tree = IqTree::new(node);
        if self.settings.test_mode {
            validation::validate_node(&tree)?;
        }
        Ok(tree)
    }

    // ========== Unary nodes ==========

    pub fn create_construction(
        &self,
        projected: BTreeSet<Variable>,
        substitution: Substitution,
        child: IqTree,
    ) -> VkgResult<IqTree> {
        self.build(IqNode::Construction {
            node: ConstructionNode::new(projected, substitution),
            child,
        })
    }

    /// A construction projecting `projected` out of `child`, without bindings.
    pub fn create_projection(
        &self,
        projected: BTreeSet<Variable>,
        child: IqTree,
    ) -> VkgResult<IqTree> {
        self.create_construction(projected, Substitution::empty(), child)
    }

    pub fn create_filter(&self, condition: Expression, child: IqTree) -> VkgResult<IqTree> {
        self.build(IqNode::Filter {
            node: FilterNode::new(condition),
            child,
        })
    }

    pub fn create_distinct(&self, child: IqTree) -> VkgResult<IqTree> {
        self.build(IqNode::Distinct {
            node: DistinctNode,
            child,
        })
    }

    pub fn create_slice(&self, offset: u64, limit: Option<u64>, child: IqTree) -> VkgResult<IqTree> {
        self.build(IqNode::Slice {
            node: SliceNode::new(offset, limit),
            child,
        })
    }

    pub fn create_order_by(
        &self,
        comparators: Vec<OrderComparator>,
        child: IqTree,
    ) -> VkgResult<IqTree> {
        self.build(IqNode::OrderBy {
            node: OrderByNode::new(comparators),
            child,
        })
    }

    pub fn create_aggregation(
        &self,
        grouping: BTreeSet<Variable>,
        substitution: Substitution,
        child: IqTree,
    ) -> VkgResult<IqTree> {
        self.build(IqNode::Aggregation {
            node: AggregationNode::new(grouping, substitution),
            child,
        })
    }

    // ========== Binary and n-ary nodes ==========

    pub fn create_inner_join(
        &self,
        condition: Option<Expression>,
        children: Vec<IqTree>,
    ) -> VkgResult<IqTree> {
        self.build(IqNode::InnerJoin {
            node: InnerJoinNode::new(condition),
            children,
        })
    }

    pub fn create_left_join(
        &self,
        condition: Option<Expression>,
        left: IqTree,
        right: IqTree,
    ) -> VkgResult<IqTree> {
        self.build(IqNode::LeftJoin {
            node: LeftJoinNode::new(condition),
            left,
            right,
        })
    }

    pub fn create_union(
        &self,
        projected: BTreeSet<Variable>,
        children: Vec<IqTree>,
    ) -> VkgResult<IqTree> {
        self.build(IqNode::Union {
            node: UnionNode::new(projected),
            children,
        })
    }

    // ========== Leaves ==========

    pub fn create_extensional(
        &self,
        relation: RelationPredicate,
        arguments: Vec<Term>,
    ) -> VkgResult<IqTree> {
        self.build(IqNode::ExtensionalData(ExtensionalDataNode::new(
            DataAtom::new(relation, arguments),
        )))
    }

    pub fn create_intensional(
        &self,
        predicate: IntensionalPredicate,
        arguments: Vec<Term>,
    ) -> VkgResult<IqTree> {
        self.build(IqNode::IntensionalData(IntensionalDataNode::new(
            DataAtom::new(predicate, arguments),
        )))
    }

    /// A native query. Its payload is checked in test mode; the node itself
    /// is never validated as a query node.
    pub fn create_native(
        &self,
        variables: BTreeSet<Variable>,
        type_map: BTreeMap<Variable, DbTermType>,
        column_names: BTreeMap<Variable, String>,
        query_string: impl Into<String>,
        nullability: VariableNullability,
    ) -> VkgResult<IqTree> {
        let node = NativeNode::new(variables, type_map, column_names, query_string.into(), nullability);
        if self.settings.test_mode {
            validation::validate_native(&node)?;
        }
        Ok(IqTree::new(IqNode::Native(node)))
    }

    /// No row over `projected`. Always valid.
    pub fn create_empty(&self, projected: BTreeSet<Variable>) -> IqTree {
        IqTree::new(IqNode::Empty(EmptyNode::new(projected)))
    }

    /// A single row with no column.
    pub fn create_true(&self) -> IqTree {
        IqTree::new(IqNode::True)
    }
}
