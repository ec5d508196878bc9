//! Building blocks shared by the normalization rules of several nodes.

mod condition;
mod construction;

pub use condition::{
    compute_down_constraint, dummy_nullability, keep_aggregate_equalities, retain_conjuncts_over,
    simplify_condition,
    ExpressionAndSubstitution, UnsatisfiableCondition,
};
pub use construction::ConstructionSubstitutionNormalization;
