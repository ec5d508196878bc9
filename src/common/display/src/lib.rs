//! Display utilities for intermediate query trees.

mod tree;

pub use tree::{DisplayTree, TreeNode};

/// Format a value for display with optional truncation.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate_string("SELECT 1", 20), "SELECT 1");
        assert_eq!(truncate_string("SELECT * FROM person", 10), "SELECT ...");
    }
}
