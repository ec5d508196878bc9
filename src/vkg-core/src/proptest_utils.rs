//! Property-based testing utilities for vkg-core.
//!
//! Strategies generating small terms and substitutions over a fixed pool of
//! variable names, so that generated values actually interact.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use crate::nullability::VariableNullability;
    use crate::substitution::{unify_terms, Substitution};
    use crate::term::{Expression, Term, Variable};

    const NAMES: [&str; 5] = ["a", "b", "c", "d", "e"];

    // =========================================================================
    // Strategies
    // =========================================================================

    fn arb_variable() -> impl Strategy<Value = Variable> {
        prop::sample::select(NAMES.to_vec()).prop_map(Variable::new)
    }

    fn arb_leaf_term() -> impl Strategy<Value = Term> {
        prop_oneof![
            3 => arb_variable().prop_map(Term::Variable),
            1 => (0i64..4).prop_map(Term::int),
            1 => Just(Term::null()),
        ]
    }

    fn arb_term() -> impl Strategy<Value = Term> {
        arb_leaf_term().prop_recursive(3, 16, 3, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..3)
                    .prop_map(|args| Term::db_function("f", args)),
                prop::collection::vec(inner, 1..3).prop_map(|args| {
                    let pattern = vec!["{}"; args.len()].join("/");
                    Term::template(format!("http://ex.org/{pattern}"), args)
                }),
            ]
        })
    }

    fn arb_substitution() -> impl Strategy<Value = Substitution> {
        prop::collection::btree_map(arb_variable(), arb_term(), 0..4)
            .prop_map(|map| map.into_iter().collect())
    }

    fn arb_expression() -> impl Strategy<Value = Expression> {
        (arb_term(), arb_term(), 0..3usize).prop_map(|(a, b, kind)| match kind {
            0 => Expression::eq(a, b),
            1 => Expression::is_not_null(a),
            _ => Expression::eq(a.clone(), b).and(Expression::is_null(a)),
        })
    }

    // =========================================================================
    // Properties
    // =========================================================================

    proptest! {
        #[test]
        fn test_unbound_variables_are_untouched(term in arb_term(), s in arb_substitution()) {
            let unrelated: BTreeSet<Variable> = term.variables();
            let restricted = s.remove_from_domain(&unrelated);
            prop_assert_eq!(restricted.apply_to_term(&term), term);
        }

        #[test]
        fn test_application_is_deterministic(term in arb_term(), s in arb_substitution()) {
            prop_assert_eq!(s.apply_to_term(&term), s.clone().apply_to_term(&term.clone()));
        }

        #[test]
        fn test_compose_is_sequential_application(
            term in arb_term(),
            s in arb_substitution(),
            t in arb_substitution(),
        ) {
            let composed = s.compose(&t);
            prop_assert_eq!(
                composed.apply_to_term(&term),
                s.apply_to_term(&t.apply_to_term(&term))
            );
        }

        #[test]
        fn test_unifier_unifies(left in arb_term(), right in arb_term()) {
            if let Some(theta) = unify_terms(&left, &right) {
                prop_assert_eq!(theta.apply_to_term(&left), theta.apply_to_term(&right));
            }
        }

        #[test]
        fn test_evaluation_is_stable(e in arb_expression()) {
            let nullability = VariableNullability::all_nullable(e.variables());
            if let crate::term::Evaluation::Residual(residual) = e.evaluate_2vl(&nullability) {
                let again = residual.evaluate_2vl(&nullability);
                prop_assert_eq!(again, crate::term::Evaluation::Residual(residual));
            }
        }
    }
}
