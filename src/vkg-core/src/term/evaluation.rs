//! Two- and three-valued evaluation of expressions, and term simplification.
//!
//! Evaluation is partial: whatever cannot be decided from constants and
//! nullability information is returned as a residual expression. In
//! two-valued mode (filters, join conditions) NULL is treated as false at the
//! top level and through conjunctions and disjunctions; below a negation the
//! evaluation switches back to three-valued logic.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::{Constant, Expression, FunctionKind, FunctionalTerm, Term, Variable};
use crate::nullability::VariableNullability;
use crate::substitution::Substitution;

/// Outcome of evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Always true.
    True,
    /// Always false.
    False,
    /// Always NULL.
    Null,
    /// Undecided; the simplified expression is kept.
    Residual(Expression),
}

impl Evaluation {
    /// False or NULL: no row can satisfy the condition.
    pub fn is_effective_false(&self) -> bool {
        matches!(self, Self::False | Self::Null)
    }

    /// Check if the evaluation is `True`.
    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    /// The residual expression, if any.
    pub fn residual(&self) -> Option<&Expression> {
        match self {
            Self::Residual(e) => Some(e),
            _ => None,
        }
    }

    /// The evaluation as a term: boolean or NULL constant, or the residual expression.
    pub fn into_term(self) -> Term {
        match self {
            Self::True => Term::boolean(true),
            Self::False => Term::boolean(false),
            Self::Null => Term::null(),
            Self::Residual(e) => e.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Logic {
    TwoValued,
    ThreeValued,
}

impl Expression {
    /// Evaluate in a filtering context, where NULL counts as false.
    pub fn evaluate_2vl(&self, nullability: &VariableNullability) -> Evaluation {
        evaluate_function(self.as_functional_term(), nullability, Logic::TwoValued)
    }

    /// Evaluate under SQL three-valued logic.
    pub fn evaluate_3vl(&self, nullability: &VariableNullability) -> Evaluation {
        evaluate_function(self.as_functional_term(), nullability, Logic::ThreeValued)
    }

    /// Whether the condition can never hold once all `variables` are NULL.
    pub fn rejects_nulls_of(&self, variables: &BTreeSet<Variable>) -> bool {
        if self.variables().is_disjoint(variables) {
            return false;
        }
        let nullified: Substitution = variables
            .iter()
            .map(|v| (v.clone(), Term::null()))
            .collect();
        let condition = nullified.apply_to_expression(self);
        condition
            .evaluate_2vl(&VariableNullability::all_nullable(condition.variables()))
            .is_effective_false()
    }
}

impl Term {
    /// Simplify the term given which variables may be NULL.
    ///
    /// Boolean sub-terms are evaluated under three-valued logic, NULL
    /// propagates through strict functions and integer arithmetic on
    /// constants is folded.
    pub fn simplify(&self, nullability: &VariableNullability) -> Term {
        match self {
            Term::Variable(_) | Term::Constant(_) => self.clone(),
            Term::Function(f) if f.symbol().is_boolean() => {
                evaluate_function(f, nullability, Logic::ThreeValued).into_term()
            }
            Term::Function(f) => simplify_value_function(f, nullability),
        }
    }
}

fn simplify_value_function(f: &FunctionalTerm, nullability: &VariableNullability) -> Term {
    let args: Vec<Term> = f.args().iter().map(|a| a.simplify(nullability)).collect();
    let symbol = f.symbol();

    if symbol.kind() == &FunctionKind::Coalesce {
        let mut kept = Vec::new();
        for arg in args.into_iter().filter(|a| !a.is_null()) {
            let stop = !nullability.is_term_nullable(&arg);
            kept.push(arg);
            if stop {
                break;
            }
        }
        return match kept.len() {
            0 => Term::null(),
            1 => kept.pop().unwrap_or_else(Term::null),
            _ => Term::coalesce(kept),
        };
    }

    if symbol.is_strict() && args.iter().any(Term::is_null) {
        return Term::null();
    }

    if let (Some(a), Some(b)) = (
        args.first().and_then(|t| t.as_constant()).and_then(Constant::as_integer),
        args.get(1).and_then(|t| t.as_constant()).and_then(Constant::as_integer),
    ) {
        let folded = match symbol.kind() {
            FunctionKind::Add => a.checked_add(b),
            FunctionKind::Subtract => a.checked_sub(b),
            FunctionKind::Multiply => a.checked_mul(b),
            _ => None,
        };
        if let Some(value) = folded {
            return Term::int(value);
        }
    }

    Term::Function(f.with_args(args))
}

fn evaluate_term(term: &Term, nullability: &VariableNullability, logic: Logic) -> Evaluation {
    match term {
        Term::Constant(Constant::Boolean(true)) => Evaluation::True,
        Term::Constant(Constant::Boolean(false)) => Evaluation::False,
        Term::Constant(Constant::Null) => Evaluation::Null,
        Term::Function(f) if f.symbol().is_boolean() => evaluate_function(f, nullability, logic),
        Term::Function(_) => match term.simplify(nullability) {
            simplified @ Term::Constant(_) => evaluate_term(&simplified, nullability, logic),
            simplified => Evaluation::Residual(Expression::is_true(simplified)),
        },
        Term::Constant(_) | Term::Variable(_) => Evaluation::Residual(Expression::is_true(term.clone())),
    }
}

fn evaluate_function(
    f: &FunctionalTerm,
    nullability: &VariableNullability,
    logic: Logic,
) -> Evaluation {
    let args = f.args();
    match f.symbol().kind() {
        FunctionKind::And => evaluate_and(args, nullability, logic),
        FunctionKind::Or => evaluate_or(args, nullability, logic),
        FunctionKind::Not => match args.first() {
            Some(arg) => match evaluate_term(arg, nullability, Logic::ThreeValued) {
                Evaluation::True => Evaluation::False,
                Evaluation::False => Evaluation::True,
                Evaluation::Null => Evaluation::Null,
                Evaluation::Residual(e) => Evaluation::Residual(negate(e)),
            },
            None => Evaluation::Residual(Expression::from_boolean_term(f.clone())),
        },
        FunctionKind::IsNull | FunctionKind::IsNotNull => {
            let expect_null = f.symbol().kind() == &FunctionKind::IsNull;
            let Some(arg) = args.first() else {
                return Evaluation::Residual(Expression::from_boolean_term(f.clone()));
            };
            let arg = arg.simplify(nullability);
            if arg.is_null() {
                from_bool(expect_null)
            } else if !nullability.is_term_nullable(&arg) {
                from_bool(!expect_null)
            } else if expect_null {
                Evaluation::Residual(Expression::is_null(arg))
            } else {
                Evaluation::Residual(Expression::is_not_null(arg))
            }
        }
        FunctionKind::IsTrue => match args.first().map(|a| a.simplify(nullability)) {
            Some(arg @ Term::Constant(_)) => evaluate_term(&arg, nullability, logic),
            Some(Term::Function(inner)) if inner.symbol().is_boolean() => {
                evaluate_function(&inner, nullability, logic)
            }
            Some(arg) => Evaluation::Residual(Expression::is_true(arg)),
            None => Evaluation::Residual(Expression::from_boolean_term(f.clone())),
        },
        FunctionKind::Eq => match args {
            [a, b] => evaluate_equality(a, b, nullability, logic),
            _ => Evaluation::Residual(Expression::from_boolean_term(f.clone())),
        },
        FunctionKind::Neq => match args {
            [a, b] => evaluate_inequality(a, b, nullability),
            _ => Evaluation::Residual(Expression::from_boolean_term(f.clone())),
        },
        kind @ (FunctionKind::Lt | FunctionKind::Lte | FunctionKind::Gt | FunctionKind::Gte) => {
            match args {
                [a, b] => evaluate_comparison(kind, a, b, nullability),
                _ => Evaluation::Residual(Expression::from_boolean_term(f.clone())),
            }
        }
        _ => {
            let simplified: Vec<Term> = args.iter().map(|a| a.simplify(nullability)).collect();
            if f.symbol().is_strict() && simplified.iter().any(Term::is_null) {
                Evaluation::Null
            } else {
                Evaluation::Residual(Expression::from_boolean_term(f.with_args(simplified)))
            }
        }
    }
}

fn from_bool(b: bool) -> Evaluation {
    if b {
        Evaluation::True
    } else {
        Evaluation::False
    }
}

/// Marker conjunct/disjunct standing for a NULL operand in three-valued mode.
fn null_operand() -> Expression {
    Expression::is_true(Term::null())
}

fn evaluate_and(args: &[Term], nullability: &VariableNullability, logic: Logic) -> Evaluation {
    let mut residuals: Vec<Expression> = Vec::new();
    let mut has_null = false;
    for arg in args {
        match evaluate_term(arg, nullability, logic) {
            Evaluation::False => return Evaluation::False,
            Evaluation::True => {}
            Evaluation::Null if logic == Logic::TwoValued => return Evaluation::False,
            Evaluation::Null => has_null = true,
            Evaluation::Residual(e) => residuals.extend(e.flatten_and()),
        }
    }
    if has_null {
        residuals.push(null_operand());
    }
    match Expression::conjunction(residuals) {
        None => Evaluation::True,
        Some(e) if e == null_operand() => Evaluation::Null,
        Some(e) => Evaluation::Residual(e),
    }
}

fn evaluate_or(args: &[Term], nullability: &VariableNullability, logic: Logic) -> Evaluation {
    let mut residuals: Vec<Expression> = Vec::new();
    let mut has_null = false;
    for arg in args {
        match evaluate_term(arg, nullability, logic) {
            Evaluation::True => return Evaluation::True,
            Evaluation::False => {}
            // NULL OR e is only true when e is
            Evaluation::Null if logic == Logic::TwoValued => {}
            Evaluation::Null => has_null = true,
            Evaluation::Residual(e) => {
                if e.kind() == &FunctionKind::Or {
                    residuals.extend(e.args().iter().cloned().map(|t| {
                        Expression::try_from(t).unwrap_or_else(Expression::is_true)
                    }));
                } else if !residuals.contains(&e) {
                    residuals.push(e);
                }
            }
        }
    }
    match (residuals.len(), has_null) {
        (0, false) => Evaluation::False,
        (0, true) => Evaluation::Null,
        (1, false) => residuals.pop().map_or(Evaluation::False, Evaluation::Residual),
        (_, true) => {
            residuals.push(null_operand());
            Evaluation::Residual(Expression::or(residuals))
        }
        _ => Evaluation::Residual(Expression::or(residuals)),
    }
}

fn negate(e: Expression) -> Expression {
    let simplified = match (e.kind(), e.args()) {
        (FunctionKind::Not, [inner]) => {
            Some(Expression::try_from(inner.clone()).unwrap_or_else(Expression::is_true))
        }
        (FunctionKind::IsNull, [arg]) => Some(Expression::is_not_null(arg.clone())),
        (FunctionKind::IsNotNull, [arg]) => Some(Expression::is_null(arg.clone())),
        _ => None,
    };
    simplified.unwrap_or_else(|| e.not())
}

fn evaluate_equality(
    a: &Term,
    b: &Term,
    nullability: &VariableNullability,
    logic: Logic,
) -> Evaluation {
    let a = a.simplify(nullability);
    let b = b.simplify(nullability);
    if a.is_null() || b.is_null() {
        return Evaluation::Null;
    }
    match (&a, &b) {
        (Term::Constant(x), Term::Constant(y)) => from_bool(x == y),
        _ if a == b => {
            if !nullability.is_term_nullable(&a) {
                Evaluation::True
            } else if logic == Logic::TwoValued {
                Evaluation::Residual(Expression::is_not_null(a))
            } else {
                Evaluation::Residual(Expression::eq(a, b))
            }
        }
        // Decomposing an injective equality loses the NULL/FALSE distinction,
        // which only matters under three-valued logic.
        (Term::Function(f), Term::Function(g))
            if logic == Logic::TwoValued
                && f.symbol() == g.symbol()
                && f.symbol().is_injective()
                && f.args().len() == g.args().len() =>
        {
            let equalities: Vec<Term> = f
                .args()
                .iter()
                .zip(g.args())
                .map(|(x, y)| Expression::eq(x.clone(), y.clone()).into())
                .collect();
            evaluate_and(&equalities, nullability, logic)
        }
        _ => Evaluation::Residual(Expression::eq(a, b)),
    }
}

fn evaluate_inequality(a: &Term, b: &Term, nullability: &VariableNullability) -> Evaluation {
    let a = a.simplify(nullability);
    let b = b.simplify(nullability);
    if a.is_null() || b.is_null() {
        return Evaluation::Null;
    }
    match (&a, &b) {
        (Term::Constant(x), Term::Constant(y)) => from_bool(x != y),
        _ if a == b && !nullability.is_term_nullable(&a) => Evaluation::False,
        _ => Evaluation::Residual(Expression::neq(a, b)),
    }
}

fn evaluate_comparison(
    kind: &FunctionKind,
    a: &Term,
    b: &Term,
    nullability: &VariableNullability,
) -> Evaluation {
    let a = a.simplify(nullability);
    let b = b.simplify(nullability);
    if a.is_null() || b.is_null() {
        return Evaluation::Null;
    }
    let ordering = match (a.as_constant(), b.as_constant()) {
        (Some(Constant::Integer(x)), Some(Constant::Integer(y))) => Some(x.cmp(y)),
        (Some(Constant::String(x)), Some(Constant::String(y))) => Some(x.cmp(y)),
        _ => None,
    };
    match ordering {
        Some(ordering) => from_bool(match kind {
            FunctionKind::Lt => ordering == Ordering::Less,
            FunctionKind::Lte => ordering != Ordering::Greater,
            FunctionKind::Gt => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        }),
        None => Evaluation::Residual(Expression::comparison(kind.clone(), a, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Term {
        Term::var("x")
    }

    fn y() -> Term {
        Term::var("y")
    }

    fn nullable_x() -> VariableNullability {
        VariableNullability::new(
            [BTreeSet::from([Variable::new("x")])],
            BTreeSet::from([Variable::new("x"), Variable::new("y")]),
        )
    }

    #[test]
    fn test_equality_with_null_is_null() {
        let e = Expression::eq(x(), Term::null());
        assert_eq!(e.evaluate_3vl(&nullable_x()), Evaluation::Null);
        assert!(e.evaluate_2vl(&nullable_x()).is_effective_false());
    }

    #[test]
    fn test_constant_comparisons() {
        let n = VariableNullability::empty();
        assert!(Expression::eq(Term::int(1), Term::int(1)).evaluate_2vl(&n).is_true());
        assert_eq!(
            Expression::eq(Term::int(1), Term::string("1")).evaluate_2vl(&n),
            Evaluation::False
        );
        assert!(Expression::comparison(FunctionKind::Lt, Term::int(1), Term::int(2))
            .evaluate_2vl(&n)
            .is_true());
    }

    #[test]
    fn test_reflexive_equality_depends_on_nullability() {
        let n = nullable_x();
        assert_eq!(
            Expression::eq(x(), x()).evaluate_2vl(&n),
            Evaluation::Residual(Expression::is_not_null(x()))
        );
        assert_eq!(
            Expression::eq(x(), x()).evaluate_3vl(&n),
            Evaluation::Residual(Expression::eq(x(), x()))
        );
        assert!(Expression::eq(y(), y()).evaluate_2vl(&n).is_true());
    }

    #[test]
    fn test_is_not_null_on_non_nullable() {
        let n = nullable_x();
        assert!(Expression::is_not_null(y()).evaluate_2vl(&n).is_true());
        assert_eq!(
            Expression::is_null(y()).evaluate_2vl(&n),
            Evaluation::False
        );
    }

    #[test]
    fn test_and_in_two_valued_mode() {
        let n = nullable_x();
        let e = Expression::eq(x(), y()).and(Expression::eq(y(), Term::null()));
        assert_eq!(e.evaluate_2vl(&n), Evaluation::False);

        let e = Expression::eq(x(), y()).and(Expression::eq(Term::int(1), Term::int(1)));
        assert_eq!(
            e.evaluate_2vl(&n),
            Evaluation::Residual(Expression::eq(x(), y()))
        );
    }

    #[test]
    fn test_and_in_three_valued_mode_keeps_null() {
        let n = nullable_x();
        let e = Expression::eq(x(), Term::null()).and(Expression::eq(Term::int(1), Term::int(1)));
        assert_eq!(e.evaluate_3vl(&n), Evaluation::Null);
    }

    #[test]
    fn test_or_drops_null_in_two_valued_mode() {
        let n = nullable_x();
        let e = Expression::or(vec![
            Expression::eq(x(), Term::null()),
            Expression::eq(x(), y()),
        ]);
        assert_eq!(
            e.evaluate_2vl(&n),
            Evaluation::Residual(Expression::eq(x(), y()))
        );
    }

    #[test]
    fn test_negation() {
        let n = nullable_x();
        let e = Expression::is_null(x()).not();
        assert_eq!(
            e.evaluate_2vl(&n),
            Evaluation::Residual(Expression::is_not_null(x()))
        );
        let e = Expression::eq(x(), Term::null()).not();
        assert_eq!(e.evaluate_3vl(&n), Evaluation::Null);
    }

    #[test]
    fn test_injective_equality_decomposition() {
        let n = VariableNullability::empty();
        let t1 = Term::template("http://ex.org/{}", vec![x()]);
        let t2 = Term::template("http://ex.org/{}", vec![Term::int(3)]);
        assert_eq!(
            Expression::eq(t1, t2).evaluate_2vl(&n),
            Evaluation::Residual(Expression::eq(x(), Term::int(3)))
        );
    }

    #[test]
    fn test_term_simplification() {
        let n = nullable_x();
        let t = Term::db_function("UPPER", vec![Term::null()]);
        assert_eq!(t.simplify(&n), Term::null());

        let t = Term::function(
            crate::term::FunctionSymbol::new(FunctionKind::Add, 2),
            vec![Term::int(2), Term::int(3)],
        );
        assert_eq!(t.simplify(&n), Term::int(5));

        let t = Term::coalesce(vec![Term::null(), y(), x()]);
        assert_eq!(t.simplify(&n), y());
    }

    #[test]
    fn test_rejects_nulls_of() {
        let e = Expression::eq(x(), y());
        assert!(e.rejects_nulls_of(&BTreeSet::from([Variable::new("x")])));

        let e = Expression::or(vec![Expression::is_null(x()), Expression::eq(x(), y())]);
        assert!(!e.rejects_nulls_of(&BTreeSet::from([Variable::new("x")])));
    }
}
