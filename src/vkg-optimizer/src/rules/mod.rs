//! Optimization rules over complete queries.
//!
//! Every rule preserves the answers of the query:
//!
//! 1. **Bag preservation**: each answer occurs as many times as before, or
//!    the query is under a DISTINCT and only the set of answers is kept
//! 2. **NULL semantics**: SQL equality and three-valued logic are unchanged
//! 3. **Scope**: no hidden variable is captured by a rewriting

mod normalization;
mod optimizer;
mod rule;
mod self_join;

pub use normalization::NormalizationRule;
pub use optimizer::Optimizer;
pub use rule::{IqOptimizer, OptimizedQuery, RuleTrace, Transformed};
pub use self_join::SelfJoinSameTermRule;
