//! Source positions for diagnostics.
//!
//! Compiscript diagnostics point at a line/column pair rather than a byte
//! range: lines are 1-based and columns 0-based, matching the positions
//! the reference grammar's token stream reports. Every token and parse
//! tree node carries a [`Loc`].

use std::fmt;

/// A line/column position in source text.
///
/// `Loc` is `Copy` and cheap to thread through every node and diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Loc {
    /// 1-based line number.
    pub line: u32,
    /// 0-based column number.
    pub column: u32,
}

impl Loc {
    /// Creates a position from a line and column.
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loc_new_stores_positions() {
        let loc = Loc::new(3, 14);
        assert_eq!(loc.line, 3);
        assert_eq!(loc.column, 14);
    }

    #[test]
    fn loc_default_is_origin() {
        assert_eq!(Loc::default(), Loc::new(0, 0));
    }

    #[test]
    fn loc_displays_line_colon_column() {
        assert_eq!(Loc::new(7, 2).to_string(), "7:2");
    }

    #[test]
    fn loc_orders_by_line_then_column() {
        assert!(Loc::new(1, 9) < Loc::new(2, 0));
        assert!(Loc::new(2, 1) < Loc::new(2, 5));
    }
}
