//! Core error types for the IQ engine.

use thiserror::Error;

/// Result type alias using `VkgError`.
pub type VkgResult<T> = std::result::Result<T, VkgError>;

/// Fatal error raised while building, validating or rewriting intermediate queries.
///
/// These errors denote programming errors or corrupted input trees. They are
/// never turned into an empty result.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VkgError {
    /// A single node violates one of its own invariants.
    #[error("InvalidQueryNode: {0}")]
    InvalidNode(String),

    /// A tree violates an invariant spanning several nodes.
    #[error("InvalidIntermediateQuery: {0}")]
    InvalidTree(String),

    /// A node received the wrong number of children.
    #[error("InvalidArity: {node} expects {expected} children, got {actual}")]
    InvalidArity {
        /// Textual form of the node.
        node: String,
        /// Expected number of children.
        expected: String,
        /// Actual number of children.
        actual: usize,
    },

    /// A required child is missing.
    #[error("MissingChild: {0}")]
    MissingChild(String),

    /// A transformation was attempted on a terminal (native) node.
    #[error("TerminalNode: {0}")]
    TerminalNode(String),

    /// A substitution cannot be used in the requested position.
    #[error("InvalidSubstitution: {0}")]
    InvalidSubstitution(String),

    /// A variable is used but not projected by the child supposed to provide it.
    #[error("VariableNotProjected: {0}")]
    VariableNotProjected(String),

    /// Relation or attribute definitions are inconsistent.
    #[error("SchemaError: {0}")]
    SchemaError(String),

    /// JSON (de)serialization error.
    #[error("ConfigError: {0}")]
    ConfigError(#[from] serde_json::Error),

    /// Internal error (bug in the engine).
    #[error("InternalError: {0}")]
    Internal(String),
}

impl VkgError {
    /// Create a new `InvalidNode` error.
    pub fn invalid_node<S: Into<String>>(msg: S) -> Self {
        Self::InvalidNode(msg.into())
    }

    /// Create a new `InvalidTree` error.
    pub fn invalid_tree<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTree(msg.into())
    }

    /// Create a new `InvalidArity` error.
    pub fn invalid_arity<N: Into<String>, E: Into<String>>(
        node: N,
        expected: E,
        actual: usize,
    ) -> Self {
        Self::InvalidArity {
            node: node.into(),
            expected: expected.into(),
            actual,
        }
    }

    /// Create a new `MissingChild` error.
    pub fn missing_child<S: Into<String>>(msg: S) -> Self {
        Self::MissingChild(msg.into())
    }

    /// Create a new `TerminalNode` error.
    pub fn terminal<S: Into<String>>(msg: S) -> Self {
        Self::TerminalNode(msg.into())
    }

    /// Create a new `InvalidSubstitution` error.
    pub fn invalid_substitution<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSubstitution(msg.into())
    }

    /// Create a new `VariableNotProjected` error.
    pub fn not_projected<S: Into<String>>(msg: S) -> Self {
        Self::VariableNotProjected(msg.into())
    }

    /// Create a new `SchemaError`.
    pub fn schema_error<S: Into<String>>(msg: S) -> Self {
        Self::SchemaError(msg.into())
    }

    /// Create a new `Internal` error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error reports a broken invariant (as opposed to misuse or a bug).
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidNode(_)
                | Self::InvalidTree(_)
                | Self::InvalidArity { .. }
                | Self::MissingChild(_)
                | Self::VariableNotProjected(_)
        )
    }
}

/// Ensure a condition holds, returning an `InvalidNode` error if not.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::VkgError::InvalidNode($msg.to_string()));
        }
    };
    ($cond:expr, $variant:ident: $($msg:tt)*) => {
        if !$cond {
            return Err($crate::VkgError::$variant(format!($($msg)*)));
        }
    };
}

/// Return early with a `TerminalNode` error.
#[macro_export]
macro_rules! terminal_node {
    ($($arg:tt)*) => {
        return Err($crate::VkgError::TerminalNode(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_positive(n: i64) -> VkgResult<i64> {
        ensure!(n > 0, InvalidTree: "expected a positive value, got {}", n);
        Ok(n)
    }

    #[test]
    fn test_error_display() {
        let err = VkgError::invalid_node("FILTER x = y: y is not projected");
        assert_eq!(
            err.to_string(),
            "InvalidQueryNode: FILTER x = y: y is not projected"
        );
    }

    #[test]
    fn test_arity_display() {
        let err = VkgError::invalid_arity("JOIN", "at least 2", 1);
        assert_eq!(
            err.to_string(),
            "InvalidArity: JOIN expects at least 2 children, got 1"
        );
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_ensure_macro() {
        assert!(check_positive(3).is_ok());
        let err = check_positive(-1).unwrap_err();
        assert!(matches!(err, VkgError::InvalidTree(_)));
    }

    #[test]
    fn test_terminal_is_not_validation() {
        assert!(!VkgError::terminal("NATIVE").is_validation_error());
        let _ = VkgError::internal("unexpected state");
        let _ = VkgError::schema_error("unknown attribute");
    }
}
