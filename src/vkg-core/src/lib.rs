//! Core model for intermediate queries.
//!
//! This crate provides the building blocks shared by query trees and their
//! optimizers:
//! - `Term`, `Expression` and their evaluation under SQL NULL semantics
//! - `Substitution` and unification
//! - `VariableNullability`
//! - relation definitions and data atoms

pub mod atom;
pub mod generator;
pub mod nullability;
pub mod schema;
pub mod substitution;
pub mod term;
pub mod types;

#[cfg(test)]
mod proptest_utils;

pub use atom::{AtomPredicate, DataAtom, IntensionalPredicate};
pub use generator::VariableGenerator;
pub use nullability::VariableNullability;
pub use schema::{DatabaseSchema, RelationDefinition, RelationPredicate};
pub use substitution::Substitution;
pub use term::{
    Constant, Evaluation, Expression, FunctionKind, FunctionSymbol, FunctionalTerm, Term, Variable,
};
pub use types::DbTermType;
