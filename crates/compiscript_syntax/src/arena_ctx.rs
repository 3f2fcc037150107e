//! Arena context for parse tree allocation.
//!
//! [`Arenas`] owns the typed arenas a parse needs; [`AstContext`] is the
//! `Copy` bundle of references the parser threads through its descent.
//! Keeping the arenas caller-owned means the tree's `'a` lifetime is the
//! caller's scope, so the tree can outlive the parser itself.
//!
//! ```
//! use compiscript_syntax::{Arenas, AstContext};
//! use compiscript_base::Interner;
//!
//! let arenas = Arenas::new();
//! let ctx = AstContext::new(&arenas);
//! let mut interner = Interner::new();
//! let (program, diags) = compiscript_syntax::parse_program("let a: integer;", ctx, &mut interner);
//! assert!(diags.is_empty());
//! assert_eq!(program.stmts.len(), 1);
//! ```

use compiscript_base::Arena;

use crate::ast::{Expr, FunctionDecl, Param, Stmt};

/// Owner of the typed arenas backing one parse tree.
#[derive(Default)]
pub struct Arenas<'a> {
    pub stmts: Arena<Stmt<'a>>,
    pub exprs: Arena<Expr<'a>>,
    pub params: Arena<Param>,
    pub functions: Arena<FunctionDecl<'a>>,
}

impl<'a> Arenas<'a> {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Copyable bundle of arena references used during parsing.
#[derive(Clone, Copy)]
pub struct AstContext<'a> {
    pub stmts: &'a Arena<Stmt<'a>>,
    pub exprs: &'a Arena<Expr<'a>>,
    pub params: &'a Arena<Param>,
    pub functions: &'a Arena<FunctionDecl<'a>>,
}

impl<'a> AstContext<'a> {
    pub fn new(arenas: &'a Arenas<'a>) -> Self {
        Self {
            stmts: &arenas.stmts,
            exprs: &arenas.exprs,
            params: &arenas.params,
            functions: &arenas.functions,
        }
    }

    /// Allocates a statement.
    pub fn alloc_stmt(&self, stmt: Stmt<'a>) -> &'a Stmt<'a> {
        self.stmts.alloc(stmt)
    }

    /// Allocates a statement list.
    pub fn alloc_stmts(&self, stmts: Vec<Stmt<'a>>) -> &'a [Stmt<'a>] {
        self.stmts.alloc_slice(stmts)
    }

    /// Allocates an expression.
    pub fn alloc_expr(&self, expr: Expr<'a>) -> &'a Expr<'a> {
        self.exprs.alloc(expr)
    }

    /// Allocates an expression list (call arguments, array literals).
    pub fn alloc_exprs(&self, exprs: Vec<Expr<'a>>) -> &'a [Expr<'a>] {
        self.exprs.alloc_slice(exprs)
    }

    /// Allocates a parameter list.
    pub fn alloc_params(&self, params: Vec<Param>) -> &'a [Param] {
        self.params.alloc_slice(params)
    }

    /// Allocates a function declaration.
    pub fn alloc_function(&self, func: FunctionDecl<'a>) -> &'a FunctionDecl<'a> {
        self.functions.alloc(func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExprKind, StmtKind};
    use compiscript_base::Loc;

    #[test]
    fn context_allocates_nodes_with_stable_references() {
        let arenas = Arenas::new();
        let ctx = AstContext::new(&arenas);

        let lhs = ctx.alloc_expr(Expr { kind: ExprKind::IntLit(1), loc: Loc::new(1, 0) });
        let rhs = ctx.alloc_expr(Expr { kind: ExprKind::IntLit(2), loc: Loc::new(1, 4) });
        let sum = ctx.alloc_expr(Expr {
            kind: ExprKind::Binary { op: crate::ast::BinaryOp::Add, left: lhs, right: rhs },
            loc: Loc::new(1, 0),
        });

        match sum.kind {
            ExprKind::Binary { left, right, .. } => {
                assert!(matches!(left.kind, ExprKind::IntLit(1)));
                assert!(matches!(right.kind, ExprKind::IntLit(2)));
            }
            _ => panic!("expected binary node"),
        }
    }

    #[test]
    fn statement_slices_preserve_order() {
        let arenas = Arenas::new();
        let ctx = AstContext::new(&arenas);
        let stmts = ctx.alloc_stmts(vec![
            Stmt { kind: StmtKind::Break, loc: Loc::new(1, 0) },
            Stmt { kind: StmtKind::Continue, loc: Loc::new(2, 0) },
        ]);
        assert!(matches!(stmts[0].kind, StmtKind::Break));
        assert!(matches!(stmts[1].kind, StmtKind::Continue));
    }
}
