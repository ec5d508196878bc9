//! The driver applying optimization rules to a query.
//!
//! Rules are applied in order, repeatedly, until none of them changes the
//! query or the maximum number of iterations is reached.

use common_config::OptimizationConfig;
use common_error::VkgResult;
use log::debug;
use vkg_iq::{Iq, IqFactory};

use super::rule::{IqOptimizer, OptimizedQuery, RuleTrace};

/// The rule-based optimizer.
///
/// # Rule ordering
///
/// 1. Normalization
/// 2. Self-join elimination (renormalizes on its own when it fires)
///
/// Every rule must leave a normalized query normalized or report a change,
/// so that the fixpoint is reached.
pub struct Optimizer {
    /// The rules to apply (in order).
    rules: Vec<Box<dyn IqOptimizer>>,
    config: OptimizationConfig,
}

impl Optimizer {
    /// Create a new optimizer with the given rules.
    pub fn new(rules: Vec<Box<dyn IqOptimizer>>) -> Self {
        Self {
            rules,
            config: OptimizationConfig::default(),
        }
    }

    /// Create a new optimizer with custom config.
    pub fn with_config(rules: Vec<Box<dyn IqOptimizer>>, config: OptimizationConfig) -> Self {
        Self { rules, config }
    }

    /// The standard rules, building trees with `factory`.
    pub fn standard(factory: IqFactory, config: OptimizationConfig) -> Self {
        use super::{NormalizationRule, SelfJoinSameTermRule};

        Self::with_config(
            vec![
                Box::new(NormalizationRule::new(factory)),
                Box::new(SelfJoinSameTermRule::new(factory)),
            ],
            config,
        )
    }

    /// Add a rule to the optimizer.
    pub fn add_rule<R: IqOptimizer + 'static>(&mut self, rule: R) {
        self.rules.push(Box::new(rule));
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    /// Optimize a query.
    ///
    /// Applies rules in fixed-point iteration until no changes occur.
    pub fn optimize(&self, query: Iq) -> VkgResult<OptimizedQuery> {
        let mut current = query;
        let mut iterations = 0;
        let mut total_rules_applied = 0;
        let mut trace = Vec::new();

        loop {
            if iterations >= self.config.max_iterations {
                debug!(
                    "Optimizer reached max iterations ({}), stopping",
                    self.config.max_iterations
                );
                break;
            }

            iterations += 1;
            let (next, applied) = self.apply_rules(current, &mut trace)?;
            current = next;
            total_rules_applied += applied;

            if applied == 0 {
                debug!("No changes in iteration {}, reached fixpoint", iterations);
                break;
            }
            debug!("{} rules applied in iteration {}", applied, iterations);
        }

        Ok(OptimizedQuery {
            query: current,
            iterations,
            rules_applied: total_rules_applied,
            trace,
        })
    }

    /// Optimize with a single pass (no fixpoint iteration).
    pub fn optimize_once(&self, query: Iq) -> VkgResult<OptimizedQuery> {
        let mut trace = Vec::new();
        let (query, rules_applied) = self.apply_rules(query, &mut trace)?;

        Ok(OptimizedQuery {
            query,
            iterations: 1,
            rules_applied,
            trace,
        })
    }

    /// One pass over the rules. Returns the number of rules that changed the query.
    fn apply_rules(&self, query: Iq, trace: &mut Vec<RuleTrace>) -> VkgResult<(Iq, usize)> {
        let mut current = query;
        let mut applied = 0;

        for rule in &self.rules {
            let before = if self.config.enable_trace {
                Some(current.to_string())
            } else {
                None
            };

            let result = rule.apply(current)?;

            if result.changed {
                applied += 1;
                debug!("Rule '{}' changed the query", rule.name());

                if self.config.enable_trace {
                    trace.push(RuleTrace::new(
                        rule.name(),
                        before.unwrap_or_default(),
                        result.query.to_string(),
                        true,
                    ));
                }
            }

            current = result.query;
        }

        Ok((current, applied))
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::standard(IqFactory::default(), OptimizationConfig::default())
    }
}
