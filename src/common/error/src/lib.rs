//! Error types and result aliases for the IQ engine.
//!
//! Unsatisfiable conditions are not represented here: they are recoverable and
//! live next to the condition simplifier. Everything in [`VkgError`] aborts the
//! current optimization run.

mod error;

pub use error::{VkgError, VkgResult};
