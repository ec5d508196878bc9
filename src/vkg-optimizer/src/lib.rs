//! Optimizers for intermediate queries.
//!
//! Provides the rule-based driver, the self-join elimination rule, the
//! DISTINCT insertion applied to mapping definitions and a query cache.

pub mod cache;
pub mod mapping;
mod rules;

pub use cache::{BasicQueryCache, QueryCache};
pub use mapping::MappingDistinctTransformer;
pub use rules::{
    IqOptimizer, NormalizationRule, OptimizedQuery, Optimizer, RuleTrace, SelfJoinSameTermRule,
    Transformed,
};

use common_config::VkgConfig;
use common_error::VkgResult;
use vkg_iq::{Iq, IqFactory};

/// Optimize a query with the standard rules.
pub fn optimize(query: Iq, config: &VkgConfig) -> VkgResult<Iq> {
    let optimizer = Optimizer::standard(IqFactory::new(config.iq), config.optimization);
    Ok(optimizer.optimize(query)?.query)
}
