//! Column and constant types of the underlying database.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type of a database value, as declared by a column or inferred for a constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DbTermType {
    /// Boolean.
    Boolean,
    /// 64-bit signed integer.
    Integer,
    /// Exact decimal, kept in its lexical form.
    Decimal,
    /// Double precision floating point.
    Double,
    /// Character string.
    String,
    /// Calendar date.
    Date,
    /// Timestamp.
    Timestamp,
    /// Vendor-specific type known only by name.
    Other(String),
}

impl DbTermType {
    /// Check if this type is numeric.
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Decimal | Self::Double)
    }

    /// Check if this type is a temporal type.
    pub const fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::Timestamp)
    }

    /// Name used when rendering the type, close to the SQL spelling.
    pub fn sql_name(&self) -> &str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Integer => "INTEGER",
            Self::Decimal => "DECIMAL",
            Self::Double => "DOUBLE",
            Self::String => "VARCHAR",
            Self::Date => "DATE",
            Self::Timestamp => "TIMESTAMP",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for DbTermType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_name())
    }
}
