//! Terms: variables, constants and functional terms.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::{Constant, FunctionKind, FunctionSymbol, Variable};

/// A term of the intermediate query language.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    /// A variable.
    Variable(Variable),
    /// A ground constant (possibly NULL).
    Constant(Constant),
    /// A function symbol applied to arguments.
    Function(FunctionalTerm),
}

/// A function symbol applied to an ordered list of arguments.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionalTerm {
    symbol: FunctionSymbol,
    args: Arc<[Term]>,
}

impl FunctionalTerm {
    /// Create a functional term. The argument count is not checked against the arity.
    pub fn new(symbol: FunctionSymbol, args: impl Into<Arc<[Term]>>) -> Self {
        Self {
            symbol,
            args: args.into(),
        }
    }

    /// The function symbol.
    pub fn symbol(&self) -> &FunctionSymbol {
        &self.symbol
    }

    /// The arguments.
    pub fn args(&self) -> &[Term] {
        &self.args
    }

    /// Rebuild with the same symbol and new arguments.
    pub fn with_args(&self, args: Vec<Term>) -> Self {
        Self::new(self.symbol.clone(), args)
    }
}

// ========== Constructors ==========

impl Term {
    /// Variable term.
    pub fn var(name: impl AsRef<str>) -> Self {
        Self::Variable(Variable::new(name))
    }

    /// The NULL constant.
    pub const fn null() -> Self {
        Self::Constant(Constant::Null)
    }

    /// Integer constant.
    pub const fn int(i: i64) -> Self {
        Self::Constant(Constant::Integer(i))
    }

    /// String constant.
    pub fn string(s: impl Into<String>) -> Self {
        Self::Constant(Constant::String(s.into()))
    }

    /// Boolean constant.
    pub const fn boolean(b: bool) -> Self {
        Self::Constant(Constant::Boolean(b))
    }

    /// Functional term.
    pub fn function(symbol: FunctionSymbol, args: Vec<Term>) -> Self {
        Self::Function(FunctionalTerm::new(symbol, args))
    }

    /// Template application, e.g. `http://example.org/person/{}`.
    pub fn template(pattern: impl Into<String>, args: Vec<Term>) -> Self {
        Self::function(FunctionSymbol::template(pattern), args)
    }

    /// Opaque database function application.
    pub fn db_function(name: impl Into<String>, args: Vec<Term>) -> Self {
        let arity = args.len();
        Self::function(FunctionSymbol::db(name, arity), args)
    }

    /// `COALESCE(args...)`.
    pub fn coalesce(args: Vec<Term>) -> Self {
        let arity = args.len();
        Self::function(FunctionSymbol::new(FunctionKind::Coalesce, arity), args)
    }

    /// Aggregate application.
    pub fn aggregate(kind: FunctionKind, args: Vec<Term>) -> Self {
        let arity = args.len();
        Self::function(FunctionSymbol::new(kind, arity), args)
    }
}

// ========== Accessors ==========

impl Term {
    /// Try to get as a variable.
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Self::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as a constant.
    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Self::Constant(c) => Some(c),
            _ => None,
        }
    }

    /// Try to get as a functional term.
    pub fn as_function(&self) -> Option<&FunctionalTerm> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Check if this term is the NULL constant.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Constant(Constant::Null))
    }

    /// Check if this term is a variable or a constant.
    pub fn is_non_functional(&self) -> bool {
        !matches!(self, Self::Function(_))
    }

    /// Check if this term contains no variable.
    pub fn is_ground(&self) -> bool {
        match self {
            Self::Variable(_) => false,
            Self::Constant(_) => true,
            Self::Function(f) => f.args().iter().all(Term::is_ground),
        }
    }

    /// Check if this term is a boolean expression.
    pub fn is_expression(&self) -> bool {
        matches!(self, Self::Function(f) if f.symbol().is_boolean())
    }

    /// All variables occurring in the term.
    pub fn variables(&self) -> BTreeSet<Variable> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    /// Add the variables of this term to `into`.
    pub fn collect_variables(&self, into: &mut BTreeSet<Variable>) {
        match self {
            Self::Variable(v) => {
                into.insert(v.clone());
            }
            Self::Constant(_) => {}
            Self::Function(f) => f.args().iter().for_each(|a| a.collect_variables(into)),
        }
    }

    /// Check if `variable` occurs in the term.
    pub fn contains_variable(&self, variable: &Variable) -> bool {
        match self {
            Self::Variable(v) => v == variable,
            Self::Constant(_) => false,
            Self::Function(f) => f.args().iter().any(|a| a.contains_variable(variable)),
        }
    }

    /// Whether the term may evaluate to NULL when only `nullable` variables can be NULL.
    pub fn is_nullable(&self, nullable: &BTreeSet<Variable>) -> bool {
        self.is_nullable_with(&|v| nullable.contains(v))
    }

    /// Whether the term may evaluate to NULL, given a predicate telling which
    /// variables can be NULL.
    pub fn is_nullable_with(&self, is_nullable_variable: &dyn Fn(&Variable) -> bool) -> bool {
        match self {
            Self::Variable(v) => is_nullable_variable(v),
            Self::Constant(c) => c.is_null(),
            Self::Function(f) => {
                let symbol = f.symbol();
                let mut args = f.args().iter();
                match symbol.kind() {
                    FunctionKind::IsNull | FunctionKind::IsNotNull | FunctionKind::Count => false,
                    FunctionKind::Coalesce => args.all(|a| a.is_nullable_with(is_nullable_variable)),
                    // SUM/MIN/MAX/AVG over an empty group
                    _ if symbol.is_aggregate() => true,
                    _ => args.any(|a| a.is_nullable_with(is_nullable_variable)),
                }
            }
        }
    }

    /// Whether the term is an injective function of its variables.
    pub fn is_injective(&self) -> bool {
        match self {
            Self::Variable(_) | Self::Constant(_) => true,
            Self::Function(f) => {
                f.symbol().is_injective() && f.args().iter().all(Term::is_injective)
            }
        }
    }
}

impl From<Variable> for Term {
    fn from(v: Variable) -> Self {
        Self::Variable(v)
    }
}

impl From<&Variable> for Term {
    fn from(v: &Variable) -> Self {
        Self::Variable(v.clone())
    }
}

impl From<Constant> for Term {
    fn from(c: Constant) -> Self {
        Self::Constant(c)
    }
}

impl From<FunctionalTerm> for Term {
    fn from(f: FunctionalTerm) -> Self {
        Self::Function(f)
    }
}

impl fmt::Display for FunctionalTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.symbol)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for FunctionalTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(v) => write!(f, "{v}"),
            Self::Constant(c) => write!(f, "{c}"),
            Self::Function(t) => write!(f, "{t}"),
        }
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
