/*
 * position.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Source positions for template statements and expressions.
//!
//! Every AST node carries a [`Position`] so that resolution and evaluation
//! failures can point back at the template source. Positions are 1-based
//! (line 1, column 1 is the first character) and order first by line, then
//! by column.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 1-based line/column location in a template source unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Position used for synthetic nodes that have no source location,
    /// e.g. the implicit call site of a top-level generation entry point.
    pub fn start() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_line_colon_column() {
        assert_eq!(Position::new(12, 4).to_string(), "12:4");
    }

    #[test]
    fn test_ordering_line_first_then_column() {
        let a = Position::new(1, 9);
        let b = Position::new(2, 1);
        let c = Position::new(2, 5);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(Position::new(3, 3), Position::new(3, 3));
    }
}
