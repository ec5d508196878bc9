//! Condition simplification shared by filters and joins.
//!
//! A condition is evaluated in two-valued logic against the nullability of
//! the rows it filters. Top-level equalities between variables and constants
//! are then turned into a substitution, so that they can be pushed down as
//! renamings instead of staying as filters.

use std::collections::BTreeSet;

use thiserror::Error;
use vkg_core::substitution::mgu;
use vkg_core::{
    Evaluation, Expression, FunctionKind, Substitution, Term, Variable, VariableNullability,
};

use crate::tree::{IqNode, IqTree};

/// The condition can never be satisfied.
///
/// Recoverable: the caller replaces the filtered subtree by an empty node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsatisfiable condition")]
pub struct UnsatisfiableCondition;

/// A simplified condition split into an equality substitution and a residual expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpressionAndSubstitution {
    /// What is left of the condition once the substitution is applied.
    pub expression: Option<Expression>,
    /// Equalities extracted from the top-level conjuncts.
    pub substitution: Substitution,
}

/// Simplify `condition` under `nullability`.
pub fn simplify_condition(
    condition: Option<&Expression>,
    nullability: &VariableNullability,
) -> Result<ExpressionAndSubstitution, UnsatisfiableCondition> {
    let Some(condition) = condition else {
        return Ok(ExpressionAndSubstitution::default());
    };
    let residual = match condition.evaluate_2vl(nullability) {
        Evaluation::True => return Ok(ExpressionAndSubstitution::default()),
        Evaluation::False | Evaluation::Null => return Err(UnsatisfiableCondition),
        Evaluation::Residual(e) => e,
    };

    let (equalities, others): (Vec<Expression>, Vec<Expression>) = residual
        .flatten_and()
        .into_iter()
        .partition(is_extractable_equality);

    if equalities.is_empty() {
        return Ok(ExpressionAndSubstitution {
            expression: Some(residual),
            substitution: Substitution::empty(),
        });
    }

    let substitution = mgu(equalities.iter().map(|e| (e.args()[0].clone(), e.args()[1].clone())))
        .ok_or(UnsatisfiableCondition)?;

    let expression = match Expression::conjunction(
        others.iter().map(|e| substitution.apply_to_expression(e)),
    ) {
        None => None,
        Some(e) => match e.evaluate_2vl(nullability) {
            Evaluation::True => None,
            Evaluation::False | Evaluation::Null => return Err(UnsatisfiableCondition),
            Evaluation::Residual(e) => Some(e),
        },
    };

    log::trace!("condition {condition} simplified into {substitution} and {expression:?}");
    Ok(ExpressionAndSubstitution {
        expression,
        substitution,
    })
}

/// The constraint to push below a node whose own condition simplified into `results`.
///
/// The incoming constraint is rewritten with the extracted substitution and
/// conjoined with the residual condition.
pub fn compute_down_constraint(
    constraint: Option<&Expression>,
    results: &ExpressionAndSubstitution,
    nullability: &VariableNullability,
) -> Result<Option<Expression>, UnsatisfiableCondition> {
    let Some(constraint) = constraint else {
        return Ok(results.expression.clone());
    };
    let substituted = results.substitution.apply_to_expression(constraint);
    let combined = Expression::and_optional(results.expression.clone(), Some(substituted));
    Ok(simplify_condition(combined.as_ref(), nullability)?.expression)
}

/// The conjuncts of `constraint` that only mention `variables`.
///
/// Constraints coming from above may mention variables of sibling subtrees;
/// they must not leak below a node that hides variables of the same name.
pub fn retain_conjuncts_over(
    constraint: &Expression,
    variables: &BTreeSet<Variable>,
) -> Option<Expression> {
    Expression::conjunction(
        constraint
            .flatten_and()
            .into_iter()
            .filter(|c| c.variables().is_subset(variables)),
    )
}

/// Puts back into the residual expression the extracted equalities that an
/// aggregation among `children` could only check with a filter above itself.
///
/// Extracting them again from that filter would never terminate.
pub fn keep_aggregate_equalities(
    results: ExpressionAndSubstitution,
    children: &[IqTree],
) -> ExpressionAndSubstitution {
    let kept: BTreeSet<Variable> = children
        .iter()
        .filter_map(|c| match c.node() {
            IqNode::Aggregation { node, .. } => Some(node.constrained_bindings(&results.substitution)),
            _ => None,
        })
        .flatten()
        .collect();
    if kept.is_empty() {
        return results;
    }
    let equalities = kept.iter().filter_map(|v| {
        results
            .substitution
            .get(v)
            .map(|t| Expression::eq(Term::Variable(v.clone()), t.clone()))
    });
    ExpressionAndSubstitution {
        expression: Expression::and_optional(results.expression, Expression::conjunction(equalities)),
        substitution: results.substitution.remove_from_domain(&kept),
    }
}

/// Nullability making no assumption: every variable may be NULL on its own.
pub fn dummy_nullability(variables: &BTreeSet<Variable>) -> VariableNullability {
    VariableNullability::all_nullable(variables.clone())
}

fn is_extractable_equality(e: &Expression) -> bool {
    match (e.kind(), e.args()) {
        (FunctionKind::Eq, [a, b]) => {
            a.is_non_functional()
                && b.is_non_functional()
                && !a.is_null()
                && !b.is_null()
                && (matches!(a, Term::Variable(_)) || matches!(b, Term::Variable(_)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(name: &str) -> Variable {
        Variable::new(name)
    }

    fn non_nullable(names: &[&str]) -> VariableNullability {
        VariableNullability::non_nullable(names.iter().map(|n| v(n)).collect())
    }

    #[test]
    fn test_equalities_are_extracted() {
        let condition = Expression::eq(Term::var("x"), Term::var("y"))
            .and(Expression::comparison(FunctionKind::Lt, Term::var("y"), Term::int(10)));

        let results = simplify_condition(Some(&condition), &non_nullable(&["x", "y"])).unwrap();
        assert_eq!(
            results.substitution,
            Substitution::singleton(v("x"), Term::var("y"))
        );
        assert_eq!(
            results.expression,
            Some(Expression::comparison(FunctionKind::Lt, Term::var("y"), Term::int(10)))
        );
    }

    #[test]
    fn test_constant_equality_propagates_into_residual() {
        let condition = Expression::eq(Term::var("x"), Term::int(3))
            .and(Expression::comparison(FunctionKind::Lt, Term::var("x"), Term::int(2)));

        let result = simplify_condition(Some(&condition), &non_nullable(&["x"]));
        assert_eq!(result, Err(UnsatisfiableCondition));
    }

    #[test]
    fn test_conflicting_equalities() {
        let condition = Expression::eq(Term::var("x"), Term::int(1))
            .and(Expression::eq(Term::var("x"), Term::int(2)));
        assert!(simplify_condition(Some(&condition), &non_nullable(&["x"])).is_err());
    }

    #[test]
    fn test_null_equality_is_unsatisfiable() {
        let condition = Expression::eq(Term::var("x"), Term::null());
        let nullability = VariableNullability::all_nullable(BTreeSet::from([v("x")]));
        assert_eq!(
            simplify_condition(Some(&condition), &nullability),
            Err(UnsatisfiableCondition)
        );
    }

    #[test]
    fn test_absent_or_true_condition() {
        let n = non_nullable(&["x"]);
        assert_eq!(simplify_condition(None, &n), Ok(ExpressionAndSubstitution::default()));

        let condition = Expression::is_not_null(Term::var("x"));
        assert_eq!(
            simplify_condition(Some(&condition), &n),
            Ok(ExpressionAndSubstitution::default())
        );
    }

    #[test]
    fn test_foreign_conjuncts_are_dropped() {
        let constraint = Expression::is_not_null(Term::var("x"))
            .and(Expression::is_not_null(Term::var("z")));
        let kept = retain_conjuncts_over(&constraint, &BTreeSet::from([v("x"), v("y")]));
        assert_eq!(kept, Some(Expression::is_not_null(Term::var("x"))));
    }

    #[test]
    fn test_down_constraint_uses_substitution() {
        let n = non_nullable(&["x", "y"]);
        let results = ExpressionAndSubstitution {
            expression: None,
            substitution: Substitution::singleton(v("x"), Term::var("y")),
        };
        let constraint = Expression::comparison(FunctionKind::Gt, Term::var("x"), Term::int(0));
        let down = compute_down_constraint(Some(&constraint), &results, &n).unwrap();
        assert_eq!(
            down,
            Some(Expression::comparison(FunctionKind::Gt, Term::var("y"), Term::int(0)))
        );
    }
}
