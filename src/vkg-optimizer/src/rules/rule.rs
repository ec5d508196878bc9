//! Optimization rule trait and trace records.
//!
//! A rule rewrites a whole query. It must preserve the answers of the query
//! under bag semantics, including SQL NULL semantics, and must never
//! introduce a variable clash with hidden variables.

use common_error::VkgResult;
use vkg_iq::Iq;

/// A whole-query rewriting applied by the [`Optimizer`](super::Optimizer).
pub trait IqOptimizer: Send + Sync {
    /// Get the name of this rule.
    fn name(&self) -> &'static str;

    /// Get a description of what this rule does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Apply this rule to the query.
    ///
    /// Returns the query unchanged, flagged as such, when the rule does not apply.
    fn apply(&self, query: Iq) -> VkgResult<Transformed>;
}

/// The result of applying an optimization rule.
#[derive(Debug, Clone)]
pub struct Transformed {
    /// The (potentially rewritten) query.
    pub query: Iq,
    /// Whether the query was actually changed.
    pub changed: bool,
}

impl Transformed {
    pub fn yes(query: Iq) -> Self {
        Self {
            query,
            changed: true,
        }
    }

    pub fn no(query: Iq) -> Self {
        Self {
            query,
            changed: false,
        }
    }

    /// Compare against the query the rule started from.
    pub fn compared_to(query: Iq, initial: &Iq) -> Self {
        let changed = &query != initial;
        Self { query, changed }
    }
}

impl From<Iq> for Transformed {
    fn from(query: Iq) -> Self {
        Self::no(query)
    }
}

/// A trace entry for a single rule application.
#[derive(Debug, Clone)]
pub struct RuleTrace {
    pub rule_name: String,
    /// The query before the rule was applied.
    pub before: String,
    /// The query after the rule was applied.
    pub after: String,
    pub changed: bool,
}

impl RuleTrace {
    pub fn new(
        rule_name: impl Into<String>,
        before: impl Into<String>,
        after: impl Into<String>,
        changed: bool,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            before: before.into(),
            after: after.into(),
            changed,
        }
    }
}

/// The result of optimization with optional trace information.
#[derive(Debug, Clone)]
pub struct OptimizedQuery {
    /// The final query.
    pub query: Iq,
    /// Number of fixpoint iterations performed.
    pub iterations: usize,
    /// Number of rule applications that changed the query.
    pub rules_applied: usize,
    /// Rule applications, when tracing is enabled.
    pub trace: Vec<RuleTrace>,
}

impl OptimizedQuery {
    pub fn new(query: Iq) -> Self {
        Self {
            query,
            iterations: 0,
            rules_applied: 0,
            trace: Vec::new(),
        }
    }

    /// Format the trace as a human-readable string.
    pub fn format_trace(&self) -> String {
        let mut output = format!(
            "Optimization completed in {} iterations, {} rules applied\n",
            self.iterations, self.rules_applied
        );

        if self.trace.is_empty() {
            output.push_str("  (no trace available)\n");
        } else {
            for (i, entry) in self.trace.iter().filter(|t| t.changed).enumerate() {
                output.push_str(&format!(
                    "\n--- Rule {} applied: {} ---\n",
                    i + 1,
                    entry.rule_name
                ));
                output.push_str("Before:\n");
                output.push_str(&entry.before);
                output.push_str("\nAfter:\n");
                output.push_str(&entry.after);
            }
        }

        output
    }
}
