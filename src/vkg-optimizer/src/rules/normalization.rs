//! Normalization as an optimization rule.

use common_error::VkgResult;
use vkg_iq::{Iq, IqFactory};

use super::rule::{IqOptimizer, Transformed};

/// Normalizes the whole tree bottom-up.
pub struct NormalizationRule {
    factory: IqFactory,
}

impl NormalizationRule {
    pub fn new(factory: IqFactory) -> Self {
        Self { factory }
    }
}

impl IqOptimizer for NormalizationRule {
    fn name(&self) -> &'static str {
        "Normalization"
    }

    fn description(&self) -> &'static str {
        "Rewrites every node with the normalization rules of its variant"
    }

    fn apply(&self, query: Iq) -> VkgResult<Transformed> {
        if query.tree().is_normalized() {
            return Ok(Transformed::no(query));
        }
        let normalized = query.normalize_for_optimization(&self.factory)?;
        Ok(Transformed::compared_to(normalized, &query))
    }
}
