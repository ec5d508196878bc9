//! Solution modifiers: duplicate elimination, slicing and ordering.

use std::fmt;

use common_error::VkgResult;
use vkg_core::{Substitution, Term, VariableGenerator};

use crate::factory::IqFactory;
use crate::tree::{IqNode, IqTree};

// ========== Distinct ==========

/// Removes duplicate rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DistinctNode;

impl DistinctNode {
    pub(crate) fn normalize(
        &self,
        child: &IqTree,
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        let child = child.normalize_for_optimization(factory, generator)?;
        if child.is_declared_as_empty() || child.is_distinct() {
            return Ok(child);
        }
        if let IqNode::Construction {
            node,
            child: grand_child,
        } = child.node()
        {
            // Injective bindings preserve distinctness of the child rows.
            if !node.substitution().is_empty()
                && node.substitution().iter().all(|(_, t)| t.is_injective())
            {
                log::trace!("lifting {node} above {self}");
                let required = node.required_child_variables();
                let projection = if grand_child.variables() == &required {
                    grand_child.clone()
                } else {
                    factory.create_construction(required, Substitution::empty(), grand_child.clone())?
                };
                return factory.create_construction(
                    node.projected_variables().clone(),
                    node.substitution().clone(),
                    factory.create_distinct(projection)?,
                );
            }
        }
        factory.create_distinct(child)
    }
}

impl fmt::Display for DistinctNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DISTINCT")
    }
}

// ========== Slice ==========

/// Skips `offset` rows and keeps at most `limit` of the remaining ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SliceNode {
    offset: u64,
    limit: Option<u64>,
}

impl SliceNode {
    pub(crate) fn new(offset: u64, limit: Option<u64>) -> Self {
        Self { offset, limit }
    }

    /// Number of skipped rows.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Maximum number of rows, if bounded.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// A single slice equivalent to `self` applied over `inner`.
    fn merge_over(&self, inner: &SliceNode) -> SliceNode {
        let remaining = inner.limit.map(|l| l.saturating_sub(self.offset));
        let limit = match (remaining, self.limit) {
            (Some(r), Some(l)) => Some(r.min(l)),
            (r, l) => r.or(l),
        };
        SliceNode::new(inner.offset.saturating_add(self.offset), limit)
    }

    pub(crate) fn normalize(
        &self,
        child: &IqTree,
        factory: &IqFactory,
        generator: &mut VariableGenerator,
    ) -> VkgResult<IqTree> {
        let child = child.normalize_for_optimization(factory, generator)?;
        if self.limit == Some(0) {
            return Ok(factory.create_empty(child.variables().clone()));
        }
        if child.is_declared_as_empty() {
            return Ok(child);
        }
        match child.node() {
            IqNode::Slice {
                node: inner,
                child: grand_child,
            } => {
                let merged = self.merge_over(inner);
                factory.create_slice(merged.offset, merged.limit, grand_child.clone())
            }
            IqNode::Construction {
                node,
                child: grand_child,
            } => {
                let slice = factory.create_slice(self.offset, self.limit, grand_child.clone())?;
                factory.create_construction(
                    node.projected_variables().clone(),
                    node.substitution().clone(),
                    slice,
                )
            }
            IqNode::True if self.offset > 0 => Ok(factory.create_empty(child.variables().clone())),
            IqNode::True => Ok(child),
            _ if self.offset == 0 && self.limit.is_none() => Ok(child),
            _ => factory.create_slice(self.offset, self.limit, child),
        }
    }
}

impl fmt::Display for SliceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SLICE offset={}", self.offset)?;
        if let Some(limit) = self.limit {
            write!(f, " limit={limit}")?;
        }
        Ok(())
    }
}

// ========== Order by ==========

/// Sort key of an [`OrderByNode`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderComparator {
    term: Term,
    ascending: bool,
}

impl OrderComparator {
    pub fn new(term: Term, ascending: bool) -> Self {
        Self { term, ascending }
    }

    pub fn term(&self) -> &Term {
        &self.term
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }
}

impl fmt::Display for OrderComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.ascending { "ASC" } else { "DESC" };
        write!(f, "{} {direction}", self.term)
    }
}

/// Sorts the rows of its child.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderByNode {
    comparators: Vec<OrderComparator>,
}

impl OrderByNode {
    pub(crate) fn new(comparators: Vec<OrderComparator>) -> Self {
        Self { comparators }
    }

    pub fn comparators(&self) -> &[OrderComparator] {
        &self.comparators
    }

    /// The comparators with `substitution` applied to their terms.
    pub(crate) fn apply_substitution(&self, substitution: &Substitution) -> Vec<OrderComparator> {
        self.comparators
            .iter()
            .map(|c| OrderComparator::new(substitution.apply_to_term(&c.term), c.ascending))
            .collect()
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

        if let IqNode::Construction {
            node,
            child: grand_child,
        } = child.node()
        {
            let comparators = non_ground(self.apply_substitution(node.substitution()));
            let inner = if comparators.is_empty() {
                grand_child.clone()
            } else {
                factory.create_order_by(comparators, grand_child.clone())?
            };
            return factory.create_construction(
                node.projected_variables().clone(),
                node.substitution().clone(),
                inner,
            );
        }

        let comparators = non_ground(self.comparators.clone());
        if comparators.is_empty() {
            return Ok(child);
        }
        factory.create_order_by(comparators, child)
    }
}

/// Constant sort keys do not order anything.
fn non_ground(comparators: Vec<OrderComparator>) -> Vec<OrderComparator> {
    comparators
        .into_iter()
        .filter(|c| !c.term.is_ground())
        .collect()
}

impl fmt::Display for OrderByNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ORDER BY [")?;
        for (i, c) in self.comparators.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, "]")
    }
}
