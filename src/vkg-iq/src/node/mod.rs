//! Query node variants and their rewriting rules.
//!
//! Each module holds one node type together with the rules that only depend
//! on that node and its children: derived properties, normalization,
//! substitution and constraint propagation.

mod aggregation;
mod construction;
mod filter;
mod inner_join;
mod leaf;
mod left_join;
mod modifiers;
mod union;

use std::collections::BTreeSet;
use std::fmt;

use vkg_core::Variable;

pub use aggregation::AggregationNode;
pub use construction::ConstructionNode;
pub use filter::FilterNode;
pub use inner_join::InnerJoinNode;
pub use leaf::{EmptyNode, ExtensionalDataNode, IntensionalDataNode, NativeNode};
pub use left_join::LeftJoinNode;
pub use modifiers::{DistinctNode, OrderByNode, OrderComparator, SliceNode};
pub use union::UnionNode;

/// Writes a variable set as `[a, b]`.
pub(crate) struct VariableList<'a>(pub &'a BTreeSet<Variable>);

impl fmt::Display for VariableList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}
