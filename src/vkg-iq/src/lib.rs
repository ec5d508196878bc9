//! Intermediate query trees and their normalization.
//!
//! `vkg-iq` provides the algebra used to reformulate queries over a virtual
//! knowledge graph into SQL:
//!
//! - **Query trees**: an immutable, structurally shared [`IqTree`] over a
//!   closed set of node variants (construction, filter, joins, union,
//!   solution modifiers, aggregation and leaves)
//! - **Derived properties**: projected variables, variable nullability,
//!   distinctness and unique constraints, computed lazily
//! - **Normalization**: a bottom-up fixpoint rewriting each node with the
//!   rules of its variant
//! - **Propagation**: descending substitutions and constraints pushed
//!   toward the leaves
//! - **Transformers**: recursive rewriting with one hook per variant
//!
//! # Example
//!
//! ```rust
//! use common_config::IqSettings;
//! use vkg_core::{Expression, IntensionalPredicate, Term, VariableGenerator};
//! use vkg_iq::IqFactory;
//!
//! let factory = IqFactory::new(IqSettings::testing());
//! let data = factory
//!     .create_intensional(IntensionalPredicate::new("person", 1), vec![Term::var("x")])
//!     .unwrap();
//! let filter = factory
//!     .create_filter(Expression::eq(Term::var("x"), Term::null()), data)
//!     .unwrap();
//!
//! let mut generator = VariableGenerator::new(filter.known_variables());
//! let normalized = filter
//!     .normalize_for_optimization(&factory, &mut generator)
//!     .unwrap();
//! assert!(normalized.is_declared_as_empty());
//! ```

pub mod factory;
pub mod node;
pub mod normalization;
pub mod properties;
pub mod query;
pub mod transform;
pub mod tree;
mod validation;

pub use factory::IqFactory;
pub use node::{
    AggregationNode, ConstructionNode, DistinctNode, EmptyNode, ExtensionalDataNode, FilterNode,
    InnerJoinNode, IntensionalDataNode, LeftJoinNode, NativeNode, OrderByNode, OrderComparator,
    SliceNode, UnionNode,
};
pub use properties::IqProperties;
pub use query::Iq;
pub use transform::IqTreeTransformer;
pub use tree::{IqNode, IqTree, UniqueConstraints};
