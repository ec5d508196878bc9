//! Flags attached to a tree root.

/// Properties recorded on an [`IqTree`](crate::IqTree) root.
///
/// They never take part in tree equality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IqProperties {
    normalized_for_optimization: bool,
}

impl IqProperties {
    /// Properties of a freshly built tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the tree is known to be a normalization fixpoint.
    pub fn is_normalized_for_optimization(&self) -> bool {
        self.normalized_for_optimization
    }

    /// The same properties, with the tree declared normalized.
    #[must_use]
    pub fn declare_normalized_for_optimization(self) -> Self {
        Self {
            normalized_for_optimization: true,
        }
    }
}
