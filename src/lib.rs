//! VKG - intermediate query trees for virtual knowledge graphs
//!
//! Queries over a knowledge graph mapped onto a relational database are
//! reformulated into intermediate query trees, normalized and optimized
//! before being turned into SQL.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

// Re-export member crates
pub use common_config as config;
pub use common_display as display;
pub use common_error as error;
pub use vkg_core as core;
pub use vkg_iq as iq;
pub use vkg_optimizer as optimizer;

/// VKG version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
