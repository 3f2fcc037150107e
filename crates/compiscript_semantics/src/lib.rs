//! # compiscript_semantics
//!
//! Scope, symbol, and type validation for Compiscript parse trees.
//!
//! Three cooperating pieces:
//!
//! - [`table`]: the scope tree and symbol store ([`SymbolTable`]), with
//!   the built-in `print` pre-installed in the global scope.
//! - [`eval`]: the expression evaluator ([`ExpressionEvaluator`]), a
//!   recursive type-inference engine over the expression precedence
//!   ladder.
//! - [`analyzer`]: the statement walk ([`SemanticAnalyzer`]) that
//!   populates the table, drives the evaluator, and enforces the
//!   structural rules (reserved names, loop depth, return paths,
//!   deferred call-arity validation).
//!
//! Diagnostics are accumulated, never thrown. A program is valid when
//! [`analyze_program`] returns an empty diagnostic list; only then may
//! code generation run.

pub mod analyzer;
pub mod eval;
pub mod table;
pub mod types;

pub use analyzer::{analyze_program, Analysis, SemanticAnalyzer};
pub use eval::ExpressionEvaluator;
pub use table::{
    ClassData, FunctionData, Scope, ScopeId, ScopeKind, SymbolInfo, SymbolKind, SymbolTable,
};
pub use types::Type;
