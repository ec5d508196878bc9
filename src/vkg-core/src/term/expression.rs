//! Boolean expressions.

use std::collections::BTreeSet;
use std::fmt;

use super::{FunctionKind, FunctionSymbol, FunctionalTerm, Term, Variable};

/// A functional term whose symbol denotes a boolean predicate.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Expression(FunctionalTerm);

impl Expression {
    /// Wrap a functional term; `None` if its symbol is not boolean.
    pub fn from_functional_term(term: FunctionalTerm) -> Option<Self> {
        term.symbol().is_boolean().then_some(Self(term))
    }

    /// Wrap a functional term known to carry a boolean symbol.
    pub(crate) fn from_boolean_term(term: FunctionalTerm) -> Self {
        debug_assert!(term.symbol().is_boolean());
        Self(term)
    }

    fn build(kind: FunctionKind, args: Vec<Term>) -> Self {
        let arity = args.len();
        Self(FunctionalTerm::new(FunctionSymbol::new(kind, arity), args))
    }

    // ========== Constructors ==========

    /// `left = right`.
    pub fn eq(left: impl Into<Term>, right: impl Into<Term>) -> Self {
        Self::build(FunctionKind::Eq, vec![left.into(), right.into()])
    }

    /// `left <> right`.
    pub fn neq(left: impl Into<Term>, right: impl Into<Term>) -> Self {
        Self::build(FunctionKind::Neq, vec![left.into(), right.into()])
    }

    /// Binary comparison; `kind` must be one of the comparison kinds.
    pub fn comparison(kind: FunctionKind, left: impl Into<Term>, right: impl Into<Term>) -> Self {
        Self::build(kind, vec![left.into(), right.into()])
    }

    /// `term IS NULL`.
    pub fn is_null(term: impl Into<Term>) -> Self {
        Self::build(FunctionKind::IsNull, vec![term.into()])
    }

    /// `term IS NOT NULL`.
    pub fn is_not_null(term: impl Into<Term>) -> Self {
        Self::build(FunctionKind::IsNotNull, vec![term.into()])
    }

    /// A boolean-valued term used as a condition.
    pub fn is_true(term: impl Into<Term>) -> Self {
        Self::build(FunctionKind::IsTrue, vec![term.into()])
    }

    /// `NOT expression`.
    #[must_use]
    pub fn not(self) -> Self {
        Self::build(FunctionKind::Not, vec![self.into()])
    }

    /// Disjunction of at least two operands.
    pub fn or(operands: Vec<Expression>) -> Self {
        Self::build(
            FunctionKind::Or,
            operands.into_iter().map(Term::from).collect(),
        )
    }

    /// Conjunction of `self` and `other`, flattening nested conjunctions.
    #[must_use]
    pub fn and(self, other: Expression) -> Self {
        let fallback = self.clone();
        Self::conjunction([self, other]).unwrap_or(fallback)
    }

    /// Conjunction of the given expressions, flattened and without duplicates;
    /// `None` when there is none.
    pub fn conjunction(expressions: impl IntoIterator<Item = Expression>) -> Option<Self> {
        let mut conjuncts: Vec<Expression> = Vec::new();
        for expression in expressions {
            for conjunct in expression.flatten_and() {
                if !conjuncts.contains(&conjunct) {
                    conjuncts.push(conjunct);
                }
            }
        }
        match conjuncts.len() {
            0 => None,
            1 => conjuncts.pop(),
            _ => Some(Self::build(
                FunctionKind::And,
                conjuncts.into_iter().map(Term::from).collect(),
            )),
        }
    }

    /// Conjunction of an optional expression with another one.
    pub fn and_optional(left: Option<Expression>, right: Option<Expression>) -> Option<Self> {
        Self::conjunction(left.into_iter().chain(right))
    }

    // ========== Accessors ==========

    /// The underlying functional term.
    pub fn as_functional_term(&self) -> &FunctionalTerm {
        &self.0
    }

    /// The function symbol.
    pub fn symbol(&self) -> &FunctionSymbol {
        self.0.symbol()
    }

    /// The operation kind.
    pub fn kind(&self) -> &FunctionKind {
        self.0.symbol().kind()
    }

    /// The arguments.
    pub fn args(&self) -> &[Term] {
        self.0.args()
    }

    /// The operands of a top-level conjunction, or `self` alone.
    pub fn flatten_and(&self) -> Vec<Expression> {
        if self.kind() == &FunctionKind::And {
            self.args()
                .iter()
                .flat_map(|arg| match Expression::try_from(arg.clone()) {
                    Ok(e) => e.flatten_and(),
                    Err(t) => vec![Expression::is_true(t)],
                })
                .collect()
        } else {
            vec![self.clone()]
        }
    }

    /// All variables occurring in the expression.
    pub fn variables(&self) -> BTreeSet<Variable> {
        let mut vars = BTreeSet::new();
        self.0
            .args()
            .iter()
            .for_each(|a| a.collect_variables(&mut vars));
        vars
    }
}

impl From<Expression> for Term {
    fn from(e: Expression) -> Self {
        Term::Function(e.0)
    }
}

impl From<Expression> for FunctionalTerm {
    fn from(e: Expression) -> Self {
        e.0
    }
}

impl TryFrom<Term> for Expression {
    type Error = Term;

    fn try_from(term: Term) -> Result<Self, Self::Error> {
        match term {
            Term::Function(f) if f.symbol().is_boolean() => Ok(Self(f)),
            other => Err(other),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
