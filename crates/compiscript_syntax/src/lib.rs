//! # compiscript_syntax
//!
//! The Compiscript front end: lexer, token stream, and the
//! arena-allocated parse tree consumed by semantic analysis and code
//! generation.
//!
//! ## Architecture
//!
//! ```text
//! Source text
//!      │
//!      ▼
//! ┌─────────┐     ┌───────────┐     ┌──────────────┐
//! │  Lexer  │ ──▶ │  Parser   │ ──▶ │  Parse tree  │
//! └─────────┘     └───────────┘     └──────────────┘
//!                                          │
//!                                          ▼
//!                             semantic analysis / lowering
//! ```
//!
//! The tree is bump-allocated: nodes are `Stmt<'a>` / `Expr<'a>` holding
//! `&'a` references into arenas owned by the caller (see [`Arenas`] and
//! [`AstContext`]). Parse errors are accumulated positioned diagnostics;
//! the parser recovers at statement boundaries so a single run surfaces
//! every syntax error it can.

pub mod ast;
pub mod arena_ctx;
pub mod lexer;
pub mod parser;
pub mod token;

pub use arena_ctx::{Arenas, AstContext};
pub use ast::{
    AssignTarget, BinaryOp, Expr, ExprKind, FunctionDecl, Param, Program, Stmt, StmtKind,
    TypeExpr, TypeName, UnaryOp,
};
pub use lexer::Lexer;
pub use parser::{parse_program, Parser};
pub use token::{Token, TokenKind};

// Re-export the base atoms so downstream crates can use one import path.
pub use compiscript_base::{Diagnostic, Interner, Loc, Symbol, SymbolEq};
