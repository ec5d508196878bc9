//! Constants, including the distinguished NULL.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::DbTermType;

/// A ground value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Constant {
    /// The SQL NULL.
    Null,
    /// Boolean literal.
    Boolean(bool),
    /// Integer literal.
    Integer(i64),
    /// String literal.
    String(String),
    /// Literal of any other type, kept in lexical form.
    Typed {
        /// Lexical value.
        lexical: String,
        /// Database type.
        db_type: DbTermType,
    },
}

impl Constant {
    /// Create a typed literal.
    pub fn typed(lexical: impl Into<String>, db_type: DbTermType) -> Self {
        Self::Typed {
            lexical: lexical.into(),
            db_type,
        }
    }

    /// Check if this is the NULL constant.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Type of the constant; NULL is untyped.
    pub fn db_type(&self) -> Option<DbTermType> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(DbTermType::Boolean),
            Self::Integer(_) => Some(DbTermType::Integer),
            Self::String(_) => Some(DbTermType::String),
            Self::Typed { db_type, .. } => Some(db_type.clone()),
        }
    }

    /// Try to get as boolean.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Self::Integer(i) => write!(f, "{i}"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Typed { lexical, db_type } => write!(f, "\"{lexical}\"^^{db_type}"),
        }
    }
}

impl From<i64> for Constant {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for Constant {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&str> for Constant {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}
