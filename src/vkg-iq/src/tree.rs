//! Immutable intermediate query trees.
//!
//! An [`IqTree`] is a shared handle on a node and its children. Derived
//! properties (projected variables, nullability, unique constraints) are
//! computed lazily and cached on the node. Every rewriting method returns a
//! new tree; untouched subtrees are shared with the input.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use common_display::{DisplayTree, TreeNode};
use common_error::{terminal_node, VkgError, VkgResult};
use vkg_core::{Expression, Substitution, Term, Variable, VariableGenerator, VariableNullability};

use crate::factory::IqFactory;
use crate::node::{
    AggregationNode, ConstructionNode, DistinctNode, EmptyNode, ExtensionalDataNode, FilterNode,
    InnerJoinNode, IntensionalDataNode, LeftJoinNode, NativeNode, OrderByNode, SliceNode,
    UnionNode,
};
use crate::properties::IqProperties;
use crate::validation;

/// Sets of variables, each of which identifies at most one row.
pub type UniqueConstraints = BTreeSet<BTreeSet<Variable>>;

/// Upper bound on normalization rounds at a single root.
const MAX_NORMALIZATION_ROUNDS: usize = 32;

/// The node at the root of an [`IqTree`], with its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IqNode {
    /// Projection with computed bindings.
    Construction {
        node: ConstructionNode,
        child: IqTree,
    },
    /// Row filtering.
    Filter { node: FilterNode, child: IqTree },
    /// N-ary inner join.
    InnerJoin {
        node: InnerJoinNode,
        children: Vec<IqTree>,
    },
    /// Left outer join.
    LeftJoin {
        node: LeftJoinNode,
        left: IqTree,
        right: IqTree,
    },
    /// N-ary bag union.
    Union {
        node: UnionNode,
        children: Vec<IqTree>,
    },
    /// Duplicate elimination.
    Distinct { node: DistinctNode, child: IqTree },
    /// Offset and limit.
    Slice { node: SliceNode, child: IqTree },
    /// Ordering.
    OrderBy { node: OrderByNode, child: IqTree },
    /// Grouping with aggregates.
    Aggregation {
        node: AggregationNode,
        child: IqTree,
    },
    /// Access to a database relation.
    ExtensionalData(ExtensionalDataNode),
    /// Access to a virtual relation.
    IntensionalData(IntensionalDataNode),
    /// Opaque native query.
    Native(NativeNode),
    /// No row.
    Empty(EmptyNode),
    /// A single row with no column.
    True,
}

impl IqNode {
    /// Short name of the variant.
    pub fn kind_name(&self) -> &'static str {
        match self {
            IqNode::Construction { .. } => "Construction",
            IqNode::Filter { .. } => "Filter",
            IqNode::InnerJoin { .. } => "InnerJoin",
            IqNode::LeftJoin { .. } => "LeftJoin",
            IqNode::Union { .. } => "Union",
            IqNode::Distinct { .. } => "Distinct",
            IqNode::Slice { .. } => "Slice",
            IqNode::OrderBy { .. } => "OrderBy",
            IqNode::Aggregation { .. } => "Aggregation",
            IqNode::ExtensionalData(_) => "ExtensionalData",
            IqNode::IntensionalData(_) => "IntensionalData",
            IqNode::Native(_) => "Native",
            IqNode::Empty(_) => "Empty",
            IqNode::True => "True",
        }
    }

    /// Check if the node has no child.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            IqNode::ExtensionalData(_)
                | IqNode::IntensionalData(_)
                | IqNode::Native(_)
                | IqNode::Empty(_)
                | IqNode::True
        )
    }

    /// One-line textual form of the node alone.
    pub fn label(&self) -> String {
        match self {
            IqNode::Construction { node, .. } => node.to_string(),
            IqNode::Filter { node, .. } => node.to_string(),
            IqNode::InnerJoin { node, .. } => node.to_string(),
            IqNode::LeftJoin { node, .. } => node.to_string(),
            IqNode::Union { node, .. } => node.to_string(),
            IqNode::Distinct { node, .. } => node.to_string(),
            IqNode::Slice { node, .. } => node.to_string(),
            IqNode::OrderBy { node, .. } => node.to_string(),
            IqNode::Aggregation { node, .. } => node.to_string(),
            IqNode::ExtensionalData(node) => node.to_string(),
            IqNode::IntensionalData(node) => node.to_string(),
            IqNode::Native(node) => node.to_string(),
            IqNode::Empty(node) => node.to_string(),
            IqNode::True => "TRUE".to_string(),
        }
    }
}

struct TreeData {
    node: IqNode,
    properties: IqProperties,
    variables: OnceLock<BTreeSet<Variable>>,
    nullability: OnceLock<VariableNullability>,
    unique_constraints: OnceLock<UniqueConstraints>,
}

/// An immutable, structurally shared intermediate query tree.
///
/// Equality is structural and ignores [`IqProperties`].
#[derive(Clone)]
pub struct IqTree(Arc<TreeData>);

impl IqTree {
    pub(crate) fn new(node: IqNode) -> Self {
        Self::with_properties(node, IqProperties::new())
    }

    fn with_properties(node: IqNode, properties: IqProperties) -> Self {
        Self(Arc::new(TreeData {
            node,
            properties,
            variables: OnceLock::new(),
            nullability: OnceLock::new(),
            unique_constraints: OnceLock::new(),
        }))
    }

    // ========== Structure ==========

    /// The root node and its children.
    pub fn node(&self) -> &IqNode {
        &self.0.node
    }

    /// Properties of the root.
    pub fn properties(&self) -> IqProperties {
        self.0.properties
    }

    /// Whether the tree is known to be normalized.
    pub fn is_normalized(&self) -> bool {
        self.0.properties.is_normalized_for_optimization()
    }

    /// The same tree, declared normalized.
    pub(crate) fn declare_normalized(&self) -> IqTree {
        if self.is_normalized() {
            return self.clone();
        }
        Self::with_properties(
            self.0.node.clone(),
            self.0.properties.declare_normalized_for_optimization(),
        )
    }

    /// Children in order (left before right for left joins).
    pub fn children(&self) -> Vec<&IqTree> {
        match self.node() {
            IqNode::Construction { child, .. }
            | IqNode::Filter { child, .. }
            | IqNode::Distinct { child, .. }
            | IqNode::Slice { child, .. }
            | IqNode::OrderBy { child, .. }
            | IqNode::Aggregation { child, .. } => vec![child],
            IqNode::InnerJoin { children, .. } | IqNode::Union { children, .. } => {
                children.iter().collect()
            }
            IqNode::LeftJoin { left, right, .. } => vec![left, right],
            IqNode::ExtensionalData(_)
            | IqNode::IntensionalData(_)
            | IqNode::Native(_)
            | IqNode::Empty(_)
            | IqNode::True => Vec::new(),
        }
    }

    /// Rebuild the root over new children, with fresh properties.
    pub fn with_children(&self, children: Vec<IqTree>, factory: &IqFactory) -> VkgResult<IqTree> {
        let expected = self.children().len();
        let arity_error = |actual: usize| {
            VkgError::invalid_arity(self.node().label(), expected.to_string(), actual)
        };
        match self.node() {
            IqNode::InnerJoin { node, .. } => {
                if children.len() != expected {
                    return Err(arity_error(children.len()));
                }
                factory.create_inner_join(node.condition().cloned(), children)
            }
            IqNode::Union { node, .. } => {
                if children.len() != expected {
                    return Err(arity_error(children.len()));
                }
                factory.create_union(node.projected_variables().clone(), children)
            }
            IqNode::LeftJoin { node, .. } => {
                let [left, right]: [IqTree; 2] =
                    children.try_into().map_err(|c: Vec<IqTree>| arity_error(c.len()))?;
                factory.create_left_join(node.condition().cloned(), left, right)
            }
            IqNode::Construction { node, .. } => {
                let child = single_child(children).map_err(arity_error)?;
                factory.create_construction(
                    node.projected_variables().clone(),
                    node.substitution().clone(),
                    child,
                )
            }
            IqNode::Filter { node, .. } => {
                let child = single_child(children).map_err(arity_error)?;
                factory.create_filter(node.condition().clone(), child)
            }
            IqNode::Distinct { .. } => {
                let child = single_child(children).map_err(arity_error)?;
                factory.create_distinct(child)
            }
            IqNode::Slice { node, .. } => {
                let child = single_child(children).map_err(arity_error)?;
                factory.create_slice(node.offset(), node.limit(), child)
            }
            IqNode::OrderBy { node, .. } => {
                let child = single_child(children).map_err(arity_error)?;
                factory.create_order_by(node.comparators().to_vec(), child)
            }
            IqNode::Aggregation { node, .. } => {
                let child = single_child(children).map_err(arity_error)?;
                factory.create_aggregation(
                    node.grouping_variables().clone(),
                    node.substitution().clone(),
                    child,
                )
            }
            IqNode::ExtensionalData(_)
            | IqNode::IntensionalData(_)
            | IqNode::Native(_)
            | IqNode::Empty(_)
            | IqNode::True => {
                if !children.is_empty() {
                    return Err(arity_error(children.len()));
                }
                Ok(Self::new(self.node().clone()))
            }
        }
    }

    // ========== Derived properties ==========

    /// Variables projected by the tree.
    pub fn variables(&self) -> &BTreeSet<Variable> {
        self.0.variables.get_or_init(|| match self.node() {
            IqNode::Construction { node, .. } => node.projected_variables().clone(),
            IqNode::Union { node, .. } => node.projected_variables().clone(),
            IqNode::Aggregation { node, .. } => node.projected_variables(),
            IqNode::Filter { child, .. }
            | IqNode::Distinct { child, .. }
            | IqNode::Slice { child, .. }
            | IqNode::OrderBy { child, .. } => child.variables().clone(),
            IqNode::InnerJoin { children, .. } => union_of_variables(children),
            IqNode::LeftJoin { left, right, .. } => {
                left.variables().union(right.variables()).cloned().collect()
            }
            IqNode::ExtensionalData(node) => node.atom().variables(),
            IqNode::IntensionalData(node) => node.atom().variables(),
            IqNode::Native(node) => node.variables().clone(),
            IqNode::Empty(node) => node.projected_variables().clone(),
            IqNode::True => BTreeSet::new(),
        })
    }

    /// Nullability of the projected variables.
    pub fn variable_nullability(&self) -> &VariableNullability {
        self.0.nullability.get_or_init(|| match self.node() {
            IqNode::Construction { node, child } => node.variable_nullability(child),
            IqNode::Filter { node, child } => node.variable_nullability(child),
            IqNode::InnerJoin { node, children } => node.variable_nullability(children),
            IqNode::LeftJoin { node, left, right } => node.variable_nullability(left, right),
            IqNode::Union { node, children } => node.variable_nullability(children),
            IqNode::Distinct { child, .. }
            | IqNode::Slice { child, .. }
            | IqNode::OrderBy { child, .. } => child.variable_nullability().clone(),
            IqNode::Aggregation { node, child } => node.variable_nullability(child),
            IqNode::ExtensionalData(node) => node.variable_nullability(),
            IqNode::IntensionalData(node) => {
                VariableNullability::non_nullable(node.atom().variables())
            }
            IqNode::Native(node) => node.variable_nullability().clone(),
            IqNode::Empty(node) => {
                VariableNullability::all_nullable(node.projected_variables().clone())
            }
            IqNode::True => VariableNullability::empty(),
        })
    }

    /// Whether `variable` may be NULL in some row of the tree.
    pub fn is_variable_nullable(&self, variable: &Variable) -> bool {
        self.variable_nullability().is_possibly_nullable(variable)
    }

    /// Sets of projected variables that identify rows. Sound but incomplete.
    pub fn infer_unique_constraints(&self) -> &UniqueConstraints {
        self.0.unique_constraints.get_or_init(|| match self.node() {
            IqNode::Construction { node, child } => node.unique_constraints(child),
            IqNode::Filter { child, .. }
            | IqNode::Slice { child, .. }
            | IqNode::OrderBy { child, .. } => child.infer_unique_constraints().clone(),
            IqNode::Distinct { child, .. } => {
                let constraints = child.infer_unique_constraints();
                if constraints.is_empty() {
                    BTreeSet::from([child.variables().clone()])
                } else {
                    constraints.clone()
                }
            }
            IqNode::Aggregation { node, .. } => {
                BTreeSet::from([node.grouping_variables().clone()])
            }
            IqNode::InnerJoin { children, .. } => InnerJoinNode::unique_constraints(children),
            IqNode::LeftJoin { left, right, .. } => LeftJoinNode::unique_constraints(left, right),
            IqNode::ExtensionalData(node) => node.unique_constraints(),
            IqNode::Union { .. }
            | IqNode::IntensionalData(_)
            | IqNode::Native(_)
            | IqNode::Empty(_)
            | IqNode::True => BTreeSet::new(),
        })
    }

    /// Whether the tree never returns the same row twice.
    pub fn is_distinct(&self) -> bool {
        match self.node() {
            IqNode::Construction { .. } => !self.infer_unique_constraints().is_empty(),
            IqNode::Filter { child, .. }
            | IqNode::Slice { child, .. }
            | IqNode::OrderBy { child, .. } => child.is_distinct(),
            IqNode::Distinct { .. } | IqNode::Aggregation { .. } => true,
            IqNode::InnerJoin { children, .. } => children.iter().all(IqTree::is_distinct),
            IqNode::LeftJoin { left, right, .. } => left.is_distinct() && right.is_distinct(),
            IqNode::ExtensionalData(_) => !self.infer_unique_constraints().is_empty(),
            IqNode::Union { .. } | IqNode::IntensionalData(_) | IqNode::Native(_) => false,
            IqNode::Empty(_) | IqNode::True => true,
        }
    }

    /// Whether the tree is syntactically known to return no row.
    pub fn is_declared_as_empty(&self) -> bool {
        matches!(self.node(), IqNode::Empty(_))
    }

    /// Whether `variable` is bound by some construction within the tree.
    pub fn is_constructed(&self, variable: &Variable) -> bool {
        match self.node() {
            IqNode::Construction { node, child } => {
                node.substitution().is_defining(variable)
                    || (child.variables().contains(variable) && child.is_constructed(variable))
            }
            IqNode::Aggregation { node, child } => {
                node.substitution().is_defining(variable) || child.is_constructed(variable)
            }
            _ => self.children().into_iter().any(|c| c.is_constructed(variable)),
        }
    }

    /// Every variable occurring anywhere in the tree, projected or not.
    pub fn known_variables(&self) -> BTreeSet<Variable> {
        let mut variables = BTreeSet::new();
        self.collect_known_variables(&mut variables);
        variables
    }

    fn collect_known_variables(&self, into: &mut BTreeSet<Variable>) {
        into.extend(self.variables().iter().cloned());
        match self.node() {
            IqNode::Construction { node, .. } => {
                into.extend(node.substitution().range_variables());
            }
            IqNode::Aggregation { node, .. } => {
                into.extend(node.substitution().range_variables());
            }
            IqNode::Filter { node, .. } => into.extend(node.condition().variables()),
            IqNode::InnerJoin { node, .. } => {
                into.extend(node.condition().map(Expression::variables).unwrap_or_default());
            }
            IqNode::LeftJoin { node, .. } => {
                into.extend(node.condition().map(Expression::variables).unwrap_or_default());
            }
            _ => {}
        }
        for child in self.children() {
            child.collect_known_variables(into);
        }
    }

    // ========== Normalization ==========

    /// Rewrite the tree into its normal form.
    ///
    /// The result is declared normalized, so normalizing it again returns it
    /// unchanged.
    pub fn normalize_for_optimization(
        &self,
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        if self.is_normalized() {
            return Ok(self.clone());
        }
        let mut current = self.normalize_once(factory, generator)?;
        for _ in 0..MAX_NORMALIZATION_ROUNDS {
            if current.is_normalized() {
                return Ok(current);
            }
            let next = current.normalize_once(factory, generator)?;
            if next == current {
                return Ok(next.declare_normalized());
            }
            current = next;
        }
        log::warn!(
            "normalization of {} did not converge after {MAX_NORMALIZATION_ROUNDS} rounds",
            self.node().kind_name()
        );
        Ok(current.declare_normalized())
    }

    /// One round of normalization: children first, then the rules of the root.
    fn normalize_once(
        &self,
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        match self.node() {
            IqNode::Construction { node, child } => node.normalize(child, factory, generator),
            IqNode::Filter { node, child } => node.normalize(child, factory, generator),
            IqNode::InnerJoin { node, children } => node.normalize(children, factory, generator),
            IqNode::LeftJoin { node, left, right } => {
                node.normalize(left, right, factory, generator)
            }
            IqNode::Union { node, children } => node.normalize(children, factory, generator),
            IqNode::Distinct { node, child } => node.normalize(child, factory, generator),
            IqNode::Slice { node, child } => node.normalize(child, factory, generator),
            IqNode::OrderBy { node, child } => node.normalize(child, factory, generator),
            IqNode::Aggregation { node, child } => node.normalize(child, factory, generator),
            IqNode::ExtensionalData(_)
            | IqNode::IntensionalData(_)
            | IqNode::Native(_)
            | IqNode::Empty(_)
            | IqNode::True => Ok(self.declare_normalized()),
        }
    }

    // ========== Substitution and constraint propagation ==========

    /// Push a variable-to-variable-or-constant substitution into the tree.
    ///
    /// The result projects `descending.apply_to_variables(self.variables())`.
    /// The optional constraint is known to hold above the tree and is used to
    /// prune and simplify below it.
    pub fn apply_descending_substitution(
        &self,
        descending: &Substitution,
        constraint: Option<&Expression>,
        factory: &IqFactory,
    ) -> VkgResult<IqTree> {
        self.descend(descending, constraint, true, factory)
    }

    /// Push a substitution into the tree without simplifying anything on the way.
    pub fn apply_descending_substitution_without_optimizing(
        &self,
        descending: &Substitution,
        factory: &IqFactory,
    ) -> VkgResult<IqTree> {
        self.descend(descending, None, false, factory)
    }

    pub(crate) fn descend(
        &self,
        descending: &Substitution,
        constraint: Option<&Expression>,
        optimize: bool,
        factory: &IqFactory,
    ) -> VkgResult<IqTree> {
        let descending = descending.restrict(self.variables());
        match self.node() {
            IqNode::Native(node) => {
                terminal_node!("cannot apply a descending substitution to {node}")
            }
            _ if !descending.is_non_functional() => Err(VkgError::invalid_substitution(format!(
                "descending substitution {descending} binds functional terms above {}",
                self.node().label()
            ))),
            _ if descending.iter().any(|(_, t)| t.is_null()) => {
                log::trace!("descending substitution {descending} nullifies a variable");
                Ok(factory.create_empty(descending.apply_to_variables(self.variables())))
            }
            _ if descending.is_empty() => match constraint {
                Some(c) if optimize => self.propagate_down_constraint(c, factory),
                _ => Ok(self.clone()),
            },
            IqNode::Construction { node, child } => {
                node.apply_descending_substitution(&descending, constraint, optimize, child, factory)
            }
            IqNode::Filter { node, child } => {
                node.apply_descending_substitution(&descending, constraint, optimize, child, factory)
            }
            IqNode::InnerJoin { node, children } => node.apply_descending_substitution(
                &descending,
                constraint,
                optimize,
                children,
                factory,
            ),
            IqNode::LeftJoin { node, left, right } => node.apply_descending_substitution(
                &descending,
                constraint,
                optimize,
                left,
                right,
                factory,
            ),
            IqNode::Union { node, children } => {
                let children = children
                    .iter()
                    .map(|c| c.descend(&descending, constraint, optimize, factory))
                    .collect::<VkgResult<Vec<_>>>()?;
                factory.create_union(descending.apply_to_variables(node.projected_variables()), children)
            }
            IqNode::Distinct { child, .. } => {
                factory.create_distinct(child.descend(&descending, constraint, optimize, factory)?)
            }
            IqNode::Slice { node, child } => factory.create_slice(
                node.offset(),
                node.limit(),
                child.descend(&descending, None, optimize, factory)?,
            ),
            IqNode::OrderBy { node, child } => {
                let new_child = child.descend(&descending, constraint, optimize, factory)?;
                factory.create_order_by(node.apply_substitution(&descending), new_child)
            }
            IqNode::Aggregation { node, child } => {
                node.apply_descending_substitution(&descending, optimize, child, factory)
            }
            IqNode::ExtensionalData(node) => Ok(IqTree::new(IqNode::ExtensionalData(
                node.apply_substitution(&descending),
            ))),
            IqNode::IntensionalData(node) => Ok(IqTree::new(IqNode::IntensionalData(
                node.apply_substitution(&descending),
            ))),
            IqNode::Empty(node) => {
                Ok(factory.create_empty(descending.apply_to_variables(node.projected_variables())))
            }
            IqNode::True => Ok(self.clone()),
        }
    }

    /// Push a constraint known to hold above the tree toward its leaves.
    ///
    /// The projected variables never change.
    pub fn propagate_down_constraint(
        &self,
        constraint: &Expression,
        factory: &IqFactory,
    ) -> VkgResult<IqTree> {
        match self.node() {
            IqNode::Construction { node, child } => {
                node.propagate_down_constraint(constraint, child, factory)
            }
            IqNode::Filter { node, child } => {
                node.propagate_down_constraint(Some(constraint), child, factory)
            }
            IqNode::InnerJoin { node, children } => {
                node.propagate_down_constraint(Some(constraint), children, factory)
            }
            IqNode::LeftJoin { node, left, right } => {
                node.propagate_down_constraint(constraint, left, right, factory)
            }
            IqNode::Union { node, children } => {
                let new_children = children
                    .iter()
                    .map(|c| c.propagate_down_constraint(constraint, factory))
                    .collect::<VkgResult<Vec<_>>>()?;
                if &new_children == children {
                    return Ok(self.clone());
                }
                factory.create_union(node.projected_variables().clone(), new_children)
            }
            IqNode::Distinct { child, .. } | IqNode::OrderBy { child, .. } => {
                let new_child = child.propagate_down_constraint(constraint, factory)?;
                if &new_child == child {
                    return Ok(self.clone());
                }
                self.with_children(vec![new_child], factory)
            }
            IqNode::Native(node) => Err(VkgError::terminal(format!(
                "cannot propagate a constraint into {node}"
            ))),
            IqNode::Slice { .. }
            | IqNode::Aggregation { .. }
            | IqNode::ExtensionalData(_)
            | IqNode::IntensionalData(_)
            | IqNode::Empty(_)
            | IqNode::True => Ok(self.clone()),
        }
    }

    /// Lift a union whose branches bind `variable` differently as high as possible.
    pub fn lift_incompatible_definitions(
        &self,
        variable: &Variable,
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        match self.node() {
            IqNode::Construction { node, child } => {
                node.lift_incompatible_definitions(variable, child, factory, generator)
            }
            IqNode::Filter { node, child } => {
                node.lift_incompatible_definitions(variable, child, factory, generator)
            }
            IqNode::InnerJoin { node, children } => {
                node.lift_incompatible_definitions(variable, children, factory, generator)
            }
            IqNode::LeftJoin { node, left, right } => {
                node.lift_incompatible_definitions(variable, left, right, factory, generator)
            }
            IqNode::Union { node, children } => {
                node.lift_incompatible_definitions(variable, children, factory, generator)
            }
            _ => Ok(self.clone()),
        }
    }

    /// Whether the root is a union with a branch binding `variable` to a non-variable term.
    pub(crate) fn is_union_with_liftable_definition(&self, variable: &Variable) -> bool {
        match self.node() {
            IqNode::Union { children, .. } => children.iter().any(|c| match c.node() {
                IqNode::Construction { node, .. } => node
                    .substitution()
                    .get(variable)
                    .is_some_and(|t| !matches!(t, Term::Variable(_))),
                _ => false,
            }),
            _ => false,
        }
    }

    // ========== Validation and display ==========

    /// Check the invariants of every node of the tree.
    pub fn validate(&self) -> VkgResult<()> {
        validation::validate_node(self)?;
        for child in self.children() {
            child.validate()?;
        }
        Ok(())
    }

    /// Indented textual rendering of the whole tree.
    pub fn explain(&self) -> String {
        DisplayTree::new(self).to_string()
    }
}

fn single_child(children: Vec<IqTree>) -> Result<IqTree, usize> {
    let [child]: [IqTree; 1] = children.try_into().map_err(|c: Vec<IqTree>| c.len())?;
    Ok(child)
}

/// Variables projected by at least one of `children`.
pub(crate) fn union_of_variables<'a>(
    children: impl IntoIterator<Item = &'a IqTree>,
) -> BTreeSet<Variable> {
    children
        .into_iter()
        .flat_map(|c| c.variables().iter().cloned())
        .collect()
}

impl PartialEq for IqTree {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.node == other.0.node
    }
}

impl Eq for IqTree {}

impl Hash for IqTree {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.node.hash(state);
    }
}

impl TreeNode for IqTree {
    fn label(&self) -> String {
        self.node().label()
    }

    fn children(&self) -> Vec<&dyn TreeNode> {
        IqTree::children(self)
            .into_iter()
            .map(|c| c as &dyn TreeNode)
            .collect()
    }
}

impl fmt::Display for IqTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", DisplayTree::new(self))
    }
}

impl fmt::Debug for IqTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
