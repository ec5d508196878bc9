//! Function symbols and their process-wide interning cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// The operation denoted by a function symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FunctionKind {
    // ========== Boolean ==========
    /// Strict equality.
    Eq,
    /// Strict inequality.
    Neq,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// N-ary conjunction.
    And,
    /// N-ary disjunction.
    Or,
    /// Negation.
    Not,
    /// `IS NULL`.
    IsNull,
    /// `IS NOT NULL`.
    IsNotNull,
    /// Boolean-valued term used as a condition.
    IsTrue,
    /// Opaque boolean database function.
    BooleanDb(String),

    // ========== Value ==========
    /// IRI or literal template; `{}` marks the argument positions.
    Template(String),
    /// First non-NULL argument.
    Coalesce,
    /// Integer addition.
    Add,
    /// Integer subtraction.
    Subtract,
    /// Integer multiplication.
    Multiply,
    /// String concatenation.
    Concat,
    /// Opaque database function.
    Db(String),

    // ========== Aggregates ==========
    /// `COUNT(*)` with no argument, `COUNT(x)` otherwise.
    Count,
    /// `SUM`.
    Sum,
    /// `MIN`.
    Min,
    /// `MAX`.
    Max,
    /// `AVG`.
    Avg,
}

impl FunctionKind {
    /// Name used when rendering terms.
    pub fn name(&self) -> String {
        match self {
            Self::Eq => "EQ".into(),
            Self::Neq => "NEQ".into(),
            Self::Lt => "LT".into(),
            Self::Lte => "LTE".into(),
            Self::Gt => "GT".into(),
            Self::Gte => "GTE".into(),
            Self::And => "AND".into(),
            Self::Or => "OR".into(),
            Self::Not => "NOT".into(),
            Self::IsNull => "IS_NULL".into(),
            Self::IsNotNull => "IS_NOT_NULL".into(),
            Self::IsTrue => "IS_TRUE".into(),
            Self::BooleanDb(name) | Self::Db(name) => name.clone(),
            Self::Template(pattern) => format!("TEMPLATE<{pattern}>"),
            Self::Coalesce => "COALESCE".into(),
            Self::Add => "ADD".into(),
            Self::Subtract => "SUBTRACT".into(),
            Self::Multiply => "MULTIPLY".into(),
            Self::Concat => "CONCAT".into(),
            Self::Count => "COUNT".into(),
            Self::Sum => "SUM".into(),
            Self::Min => "MIN".into(),
            Self::Max => "MAX".into(),
            Self::Avg => "AVG".into(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct SymbolData {
    kind: FunctionKind,
    arity: usize,
}

/// An interned function symbol: an operation together with its arity.
///
/// Symbols are obtained from [`FunctionSymbolFactory`]; two requests for the
/// same kind and arity return the same shared instance.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionSymbol(Arc<SymbolData>);

impl FunctionSymbol {
    /// Intern a symbol in the process-wide factory.
    pub fn new(kind: FunctionKind, arity: usize) -> Self {
        FunctionSymbolFactory::global().get(kind, arity)
    }

    /// Template symbol; the arity is the number of `{}` placeholders.
    pub fn template(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let arity = pattern.matches("{}").count();
        Self::new(FunctionKind::Template(pattern), arity)
    }

    /// Opaque, NULL-propagating database function.
    pub fn db(name: impl Into<String>, arity: usize) -> Self {
        Self::new(FunctionKind::Db(name.into()), arity)
    }

    /// The operation of this symbol.
    pub fn kind(&self) -> &FunctionKind {
        &self.0.kind
    }

    /// Number of arguments.
    pub fn arity(&self) -> usize {
        self.0.arity
    }

    /// Whether terms built on this symbol are boolean expressions.
    pub fn is_boolean(&self) -> bool {
        matches!(
            self.kind(),
            FunctionKind::Eq
                | FunctionKind::Neq
                | FunctionKind::Lt
                | FunctionKind::Lte
                | FunctionKind::Gt
                | FunctionKind::Gte
                | FunctionKind::And
                | FunctionKind::Or
                | FunctionKind::Not
                | FunctionKind::IsNull
                | FunctionKind::IsNotNull
                | FunctionKind::IsTrue
                | FunctionKind::BooleanDb(_)
        )
    }

    /// Whether distinct argument tuples always yield distinct values.
    pub fn is_injective(&self) -> bool {
        matches!(self.kind(), FunctionKind::Template(_))
    }

    /// Whether the result is NULL as soon as one argument is NULL, and only then.
    pub fn is_strict(&self) -> bool {
        matches!(
            self.kind(),
            FunctionKind::Eq
                | FunctionKind::Neq
                | FunctionKind::Lt
                | FunctionKind::Lte
                | FunctionKind::Gt
                | FunctionKind::Gte
                | FunctionKind::Not
                | FunctionKind::IsTrue
                | FunctionKind::BooleanDb(_)
                | FunctionKind::Template(_)
                | FunctionKind::Add
                | FunctionKind::Subtract
                | FunctionKind::Multiply
                | FunctionKind::Concat
                | FunctionKind::Db(_)
        )
    }

    /// Whether the function is an aggregate.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self.kind(),
            FunctionKind::Count
                | FunctionKind::Sum
                | FunctionKind::Min
                | FunctionKind::Max
                | FunctionKind::Avg
        )
    }
}

impl fmt::Display for FunctionSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind().name())
    }
}

impl fmt::Debug for FunctionSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind().name(), self.arity())
    }
}

/// Interning cache for function symbols.
///
/// Insertion is idempotent, so concurrent readers and writers always observe
/// a single instance per (kind, arity).
#[derive(Debug, Default)]
pub struct FunctionSymbolFactory {
    symbols: RwLock<HashMap<(FunctionKind, usize), FunctionSymbol>>,
}

impl FunctionSymbolFactory {
    /// The process-wide factory, created on first use.
    pub fn global() -> &'static Self {
        static FACTORY: OnceLock<FunctionSymbolFactory> = OnceLock::new();
        FACTORY.get_or_init(Self::default)
    }

    /// Get or create the symbol for the given kind and arity.
    pub fn get(&self, kind: FunctionKind, arity: usize) -> FunctionSymbol {
        let key = (kind, arity);
        {
            let symbols = self.symbols.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(symbol) = symbols.get(&key) {
                return symbol.clone();
            }
        }
        let mut symbols = self.symbols.write().unwrap_or_else(PoisonError::into_inner);
        symbols
            .entry(key.clone())
            .or_insert_with(|| {
                log::trace!("interning function symbol {:?}/{}", key.0, key.1);
                FunctionSymbol(Arc::new(SymbolData {
                    kind: key.0,
                    arity: key.1,
                }))
            })
            .clone()
    }

    /// Number of interned symbols.
    pub fn len(&self) -> usize {
        self.symbols
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no symbol was interned yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
