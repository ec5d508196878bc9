//! Term and expression model.
//!
//! Terms are immutable and cheap to clone: functional terms share their
//! arguments and function symbols are interned.

mod constant;
mod evaluation;
mod expression;
mod function;
#[allow(clippy::module_inception)]
mod term;
mod variable;

pub use constant::Constant;
pub use evaluation::Evaluation;
pub use expression::Expression;
pub use function::{FunctionKind, FunctionSymbol, FunctionSymbolFactory};
pub use term::{FunctionalTerm, Term};
pub use variable::Variable;
