//! Accumulated compiler diagnostics.
//!
//! The compiler never throws on a user error: each stage pushes
//! [`Diagnostic`]s into its own list and the pipeline decides whether to
//! continue. The rendered form is stable and consumed verbatim by tests
//! and front ends:
//!
//! ```text
//! Line {line}:{column} - {message}
//! ```
//!
//! # Example
//!
//! ```
//! use compiscript_base::{Diagnostic, Loc};
//!
//! let d = Diagnostic::new("Variable 'x' not declared", Loc::new(4, 2));
//! assert_eq!(d.to_string(), "Line 4:2 - Variable 'x' not declared");
//! ```

use crate::loc::Loc;
use std::fmt;

/// A user-facing error annotated with its source position.
///
/// Implements [`std::error::Error`] and [`fmt::Display`]; the display
/// format is `Line {line}:{column} - {message}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Human-readable description of the problem.
    pub message: String,
    /// Where in the source the problem was detected.
    pub loc: Loc,
}

impl Diagnostic {
    /// Creates a diagnostic at the given position.
    pub fn new(message: impl Into<String>, loc: Loc) -> Self {
        Self {
            message: message.into(),
            loc,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}:{} - {}", self.loc.line, self.loc.column, self.message)
    }
}

impl std::error::Error for Diagnostic {}

/// Alias for `std::result::Result<T, Diagnostic>`.
///
/// Used by operations that fail with a single positioned error rather
/// than an accumulated list.
pub type Result<T> = std::result::Result<T, Diagnostic>;

/// Merges diagnostic lists in order, dropping exact duplicates.
///
/// Duplicates are identified by rendered message identity; the first
/// occurrence wins and relative order is preserved.
pub fn merge_deduped(lists: &[&[Diagnostic]]) -> Vec<Diagnostic> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for list in lists {
        for diag in *list {
            if seen.insert(diag.to_string()) {
                merged.push(diag.clone());
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display_matches_contract() {
        let d = Diagnostic::new("Cannot assign string to integer", Loc::new(12, 8));
        assert_eq!(d.to_string(), "Line 12:8 - Cannot assign string to integer");
    }

    #[test]
    fn merge_preserves_order() {
        let a = vec![Diagnostic::new("first", Loc::new(1, 0))];
        let b = vec![
            Diagnostic::new("second", Loc::new(2, 0)),
            Diagnostic::new("third", Loc::new(3, 0)),
        ];
        let merged = merge_deduped(&[&a, &b]);
        let messages: Vec<_> = merged.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, ["first", "second", "third"]);
    }

    #[test]
    fn merge_drops_exact_duplicates() {
        let dup = Diagnostic::new("duplicated", Loc::new(5, 1));
        let a = vec![dup.clone()];
        let b = vec![dup.clone(), Diagnostic::new("unique", Loc::new(6, 0))];
        let merged = merge_deduped(&[&a, &b]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn same_message_different_position_is_kept() {
        let a = vec![Diagnostic::new("msg", Loc::new(1, 0))];
        let b = vec![Diagnostic::new("msg", Loc::new(2, 0))];
        assert_eq!(merge_deduped(&[&a, &b]).len(), 2);
    }
}
