//! Recursive-descent parser for Compiscript.
//!
//! One function per grammar rule, descending the precedence ladder
//! assignment → ternary → `||` → `&&` → equality → relational → additive
//! → multiplicative → unary → postfix → primary. All binary operators
//! are left-associative; the ternary operator nests to the right.
//!
//! ## Error recovery
//!
//! A failed statement records a positioned diagnostic and the parser
//! synchronizes to the next statement boundary (past a `;`, or up to a
//! `}` / statement keyword), so one run reports every syntax error it
//! can reach. The returned tree contains only the statements that parsed
//! cleanly.

use compiscript_base::{Diagnostic, Interner, Loc};

use crate::arena_ctx::AstContext;
use crate::ast::{
    AssignTarget, BinaryOp, Block, Expr, ExprKind, FunctionDecl, Param, Program, Stmt, StmtKind,
    TypeExpr, TypeName, UnaryOp,
};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// Lexes and parses a whole translation unit.
///
/// Always returns a tree; syntax errors are reported through the
/// diagnostic list and the offending statements are dropped.
pub fn parse_program<'a>(
    source: &str,
    ctx: AstContext<'a>,
    interner: &mut Interner,
) -> (Program<'a>, Vec<Diagnostic>) {
    let (tokens, mut diagnostics) = Lexer::new(source).tokenize(interner);
    let mut parser = Parser::new(tokens, ctx, interner);
    let program = parser.parse();
    diagnostics.extend(parser.into_diagnostics());
    (program, diagnostics)
}

/// Token-stream parser building the arena tree.
pub struct Parser<'a, 'i> {
    tokens: Vec<Token>,
    pos: usize,
    ctx: AstContext<'a>,
    interner: &'i Interner,
    diagnostics: Vec<Diagnostic>,
}

impl<'a, 'i> Parser<'a, 'i> {
    pub fn new(tokens: Vec<Token>, ctx: AstContext<'a>, interner: &'i Interner) -> Self {
        Self {
            tokens,
            pos: 0,
            ctx,
            interner,
            diagnostics: Vec::new(),
        }
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn parse(&mut self) -> Program<'a> {
        let mut stmts = Vec::new();
        while !self.at(TokenKind::Eof) {
            match self.parse_statement() {
                Some(stmt) => stmts.push(stmt),
                None => {
                    self.synchronize();
                    // A stray closing brace at top level has no block to
                    // end; consume it so recovery makes progress.
                    if self.at(TokenKind::RBrace) {
                        self.advance();
                    }
                }
            }
        }
        Program { stmts: self.ctx.alloc_stmts(stmts) }
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> Token {
        self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) {
            Some(self.advance())
        } else {
            let found = self.peek();
            self.error_at(
                found.loc,
                format!("Expected {}, found {}", kind.describe(), found.kind.describe()),
            );
            None
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Option<(compiscript_base::Symbol, Loc)> {
        let token = self.peek();
        if let TokenKind::Identifier(sym) = token.kind {
            self.advance();
            Some((sym, token.loc))
        } else {
            self.error_at(
                token.loc,
                format!("Expected {}, found {}", what, token.kind.describe()),
            );
            None
        }
    }

    fn error_at(&mut self, loc: Loc, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(message, loc));
    }

    /// Skips to the next plausible statement boundary after an error.
    fn synchronize(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof | TokenKind::RBrace => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::Let
                | TokenKind::Var
                | TokenKind::Const
                | TokenKind::Function
                | TokenKind::Class
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Do
                | TokenKind::For
                | TokenKind::Foreach
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Return
                | TokenKind::Print
                | TokenKind::Try => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> Option<Stmt<'a>> {
        let loc = self.peek().loc;
        match self.peek_kind() {
            TokenKind::Let | TokenKind::Var => self.parse_var_decl(),
            TokenKind::Const => self.parse_const_decl(),
            TokenKind::Function => self.parse_function_decl(false),
            TokenKind::Class => self.parse_class_decl(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Foreach => self.parse_foreach(),
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                Some(Stmt { kind: StmtKind::Break, loc })
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                Some(Stmt { kind: StmtKind::Continue, loc })
            }
            TokenKind::Return => self.parse_return(),
            TokenKind::Print => self.parse_print(),
            TokenKind::Try => self.parse_try_catch(),
            TokenKind::LBrace => {
                let stmts = self.parse_block()?;
                Some(Stmt { kind: StmtKind::Block { stmts }, loc })
            }
            _ => self.parse_assignment_or_expr(true),
        }
    }

    fn parse_var_decl(&mut self) -> Option<Stmt<'a>> {
        let loc = self.advance().loc; // let / var
        let (name, _) = self.expect_identifier("variable name")?;
        let annotation = self.parse_optional_annotation()?;
        let init = if self.eat(TokenKind::Assign) {
            Some(self.parse_expr_alloc()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;
        Some(Stmt { kind: StmtKind::VarDecl { name, annotation, init }, loc })
    }

    fn parse_const_decl(&mut self) -> Option<Stmt<'a>> {
        let loc = self.advance().loc; // const
        let (name, _) = self.expect_identifier("constant name")?;
        let annotation = self.parse_optional_annotation()?;
        let init = if self.eat(TokenKind::Assign) {
            Some(self.parse_expr_alloc()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;
        Some(Stmt { kind: StmtKind::ConstDecl { name, annotation, init }, loc })
    }

    fn parse_optional_annotation(&mut self) -> Option<Option<TypeExpr>> {
        if self.eat(TokenKind::Colon) {
            Some(Some(self.parse_type_expr()?))
        } else {
            Some(None)
        }
    }

    fn parse_type_expr(&mut self) -> Option<TypeExpr> {
        let token = self.peek();
        let base = match token.kind {
            TokenKind::IntegerType => TypeName::Integer,
            TokenKind::StringType => TypeName::Str,
            TokenKind::BooleanType => TypeName::Boolean,
            TokenKind::VoidType => TypeName::Void,
            TokenKind::Identifier(sym) => {
                if self.interner.resolve(sym) == "float" {
                    TypeName::Float
                } else {
                    TypeName::Named(sym)
                }
            }
            other => {
                self.error_at(token.loc, format!("Expected type name, found {}", other.describe()));
                return None;
            }
        };
        self.advance();
        let mut dims = 0;
        while self.at(TokenKind::LBracket) {
            self.advance();
            self.expect(TokenKind::RBracket)?;
            dims += 1;
        }
        Some(TypeExpr { base, dims, loc: token.loc })
    }

    fn parse_function_decl(&mut self, in_class: bool) -> Option<Stmt<'a>> {
        let loc = self.advance().loc; // function
        let (name, _) = self.expect_identifier("function name")?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                let (pname, ploc) = self.expect_identifier("parameter name")?;
                let annotation = self.parse_optional_annotation()?;
                params.push(Param { name: pname, annotation, loc: ploc });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        let return_type = self.parse_optional_annotation()?;
        let body = self.parse_block()?;
        let is_init = in_class && self.interner.resolve(name) == "init";
        let func = self.ctx.alloc_function(FunctionDecl {
            name,
            params: self.ctx.alloc_params(params),
            return_type,
            body,
            is_init,
            loc,
        });
        Some(Stmt { kind: StmtKind::FunctionDecl(func), loc })
    }

    fn parse_class_decl(&mut self) -> Option<Stmt<'a>> {
        let loc = self.advance().loc; // class
        let (name, _) = self.expect_identifier("class name")?;
        let parent = if self.eat(TokenKind::Colon) {
            Some(self.expect_identifier("parent class name")?.0)
        } else {
            None
        };
        self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let member = match self.peek_kind() {
                TokenKind::Let | TokenKind::Var => self.parse_var_decl(),
                TokenKind::Const => self.parse_const_decl(),
                TokenKind::Function => self.parse_function_decl(true),
                other => {
                    let bad = self.peek();
                    self.error_at(
                        bad.loc,
                        format!("Expected class member, found {}", other.describe()),
                    );
                    // Consume the offending token so recovery advances.
                    self.advance();
                    None
                }
            };
            match member {
                Some(stmt) => members.push(stmt),
                None => self.synchronize(),
            }
        }
        self.expect(TokenKind::RBrace)?;
        Some(Stmt {
            kind: StmtKind::ClassDecl { name, parent, members: self.ctx.alloc_stmts(members) },
            loc,
        })
    }

    fn parse_block(&mut self) -> Option<Block<'a>> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            match self.parse_statement() {
                Some(stmt) => stmts.push(stmt),
                None => self.synchronize(),
            }
        }
        self.expect(TokenKind::RBrace)?;
        Some(self.ctx.alloc_stmts(stmts))
    }

    fn parse_if(&mut self) -> Option<Stmt<'a>> {
        let loc = self.advance().loc; // if
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr_alloc()?;
        self.expect(TokenKind::RParen)?;
        let then_block = self.parse_block()?;
        let else_block = if self.eat(TokenKind::Else) {
            if self.at(TokenKind::If) {
                // else-if chain: wrap the nested if in a one-statement block
                let nested = self.parse_if()?;
                Some(self.ctx.alloc_stmts(vec![nested]))
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Some(Stmt { kind: StmtKind::If { cond, then_block, else_block }, loc })
    }

    fn parse_while(&mut self) -> Option<Stmt<'a>> {
        let loc = self.advance().loc; // while
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr_alloc()?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Some(Stmt { kind: StmtKind::While { cond, body }, loc })
    }

    fn parse_do_while(&mut self) -> Option<Stmt<'a>> {
        let loc = self.advance().loc; // do
        let body = self.parse_block()?;
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr_alloc()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semicolon)?;
        Some(Stmt { kind: StmtKind::DoWhile { body, cond }, loc })
    }

    fn parse_for(&mut self) -> Option<Stmt<'a>> {
        let loc = self.advance().loc; // for
        self.expect(TokenKind::LParen)?;

        let init = if self.eat(TokenKind::Semicolon) {
            None
        } else {
            let stmt = match self.peek_kind() {
                TokenKind::Let | TokenKind::Var => self.parse_var_decl()?,
                _ => self.parse_assignment_or_expr(true)?,
            };
            Some(self.ctx.alloc_stmt(stmt))
        };

        let cond = if self.at(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr_alloc()?)
        };
        self.expect(TokenKind::Semicolon)?;

        let update = if self.at(TokenKind::RParen) {
            None
        } else {
            let stmt = self.parse_assignment_or_expr(false)?;
            Some(self.ctx.alloc_stmt(stmt))
        };
        self.expect(TokenKind::RParen)?;

        let body = self.parse_block()?;
        Some(Stmt { kind: StmtKind::For { init, cond, update, body }, loc })
    }

    fn parse_foreach(&mut self) -> Option<Stmt<'a>> {
        let loc = self.advance().loc; // foreach
        self.expect(TokenKind::LParen)?;
        let (var, _) = self.expect_identifier("loop variable")?;
        self.expect(TokenKind::In)?;
        let iterable = self.parse_expr_alloc()?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Some(Stmt { kind: StmtKind::Foreach { var, iterable, body }, loc })
    }

    fn parse_return(&mut self) -> Option<Stmt<'a>> {
        let loc = self.advance().loc; // return
        let value = if self.at(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr_alloc()?)
        };
        self.expect(TokenKind::Semicolon)?;
        Some(Stmt { kind: StmtKind::Return { value }, loc })
    }

    fn parse_print(&mut self) -> Option<Stmt<'a>> {
        let loc = self.advance().loc; // print
        self.expect(TokenKind::LParen)?;
        let value = self.parse_expr_alloc()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semicolon)?;
        Some(Stmt { kind: StmtKind::Print { value }, loc })
    }

    fn parse_try_catch(&mut self) -> Option<Stmt<'a>> {
        let loc = self.advance().loc; // try
        let try_block = self.parse_block()?;
        self.expect(TokenKind::Catch)?;
        self.expect(TokenKind::LParen)?;
        let (err_name, _) = self.expect_identifier("catch variable")?;
        self.expect(TokenKind::RParen)?;
        let catch_block = self.parse_block()?;
        Some(Stmt { kind: StmtKind::TryCatch { try_block, err_name, catch_block }, loc })
    }

    /// Parses `lhs = expr` or a bare expression statement.
    ///
    /// `with_semicolon` is false for the update slot of a `for` header.
    fn parse_assignment_or_expr(&mut self, with_semicolon: bool) -> Option<Stmt<'a>> {
        let loc = self.peek().loc;
        let expr = self.parse_expr()?;
        if self.eat(TokenKind::Assign) {
            let target = self.expr_to_target(expr, loc)?;
            let value = self.parse_expr_alloc()?;
            if with_semicolon {
                self.expect(TokenKind::Semicolon)?;
            }
            return Some(Stmt { kind: StmtKind::Assign { target, value }, loc });
        }
        if with_semicolon {
            self.expect(TokenKind::Semicolon)?;
        }
        let expr = self.ctx.alloc_expr(expr);
        Some(Stmt { kind: StmtKind::ExprStmt { expr }, loc })
    }

    fn expr_to_target(&mut self, expr: Expr<'a>, loc: Loc) -> Option<AssignTarget<'a>> {
        match expr.kind {
            ExprKind::Identifier(name) => Some(AssignTarget::Name(name)),
            ExprKind::Property { object, property } => {
                if matches!(object.kind, ExprKind::This) {
                    Some(AssignTarget::ThisField { field: property })
                } else {
                    Some(AssignTarget::Field { object, field: property })
                }
            }
            ExprKind::Index { object, index } => {
                Some(AssignTarget::Index { array: object, index })
            }
            _ => {
                self.error_at(loc, "Invalid assignment target");
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Expressions (precedence ladder)
    // ------------------------------------------------------------------

    fn parse_expr_alloc(&mut self) -> Option<&'a Expr<'a>> {
        let expr = self.parse_expr()?;
        Some(self.ctx.alloc_expr(expr))
    }

    fn parse_expr(&mut self) -> Option<Expr<'a>> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Option<Expr<'a>> {
        let cond = self.parse_or()?;
        if !self.eat(TokenKind::Question) {
            return Some(cond);
        }
        let loc = cond.loc;
        let then_val = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        let else_val = self.parse_expr()?;
        Some(Expr {
            kind: ExprKind::Ternary {
                cond: self.ctx.alloc_expr(cond),
                then_val: self.ctx.alloc_expr(then_val),
                else_val: self.ctx.alloc_expr(else_val),
            },
            loc,
        })
    }

    fn parse_or(&mut self) -> Option<Expr<'a>> {
        let mut left = self.parse_and()?;
        while self.at(TokenKind::OrOr) {
            self.advance();
            let right = self.parse_and()?;
            left = self.binary(BinaryOp::Or, left, right);
        }
        Some(left)
    }

    fn parse_and(&mut self) -> Option<Expr<'a>> {
        let mut left = self.parse_equality()?;
        while self.at(TokenKind::AndAnd) {
            self.advance();
            let right = self.parse_equality()?;
            left = self.binary(BinaryOp::And, left, right);
        }
        Some(left)
    }

    fn parse_equality(&mut self) -> Option<Expr<'a>> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = self.binary(op, left, right);
        }
        Some(left)
    }

    fn parse_relational(&mut self) -> Option<Expr<'a>> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = self.binary(op, left, right);
        }
        Some(left)
    }

    fn parse_additive(&mut self) -> Option<Expr<'a>> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.binary(op, left, right);
        }
        Some(left)
    }

    fn parse_multiplicative(&mut self) -> Option<Expr<'a>> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.binary(op, left, right);
        }
        Some(left)
    }

    fn parse_unary(&mut self) -> Option<Expr<'a>> {
        let token = self.peek();
        let op = match token.kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Some(Expr {
            kind: ExprKind::Unary { op, operand: self.ctx.alloc_expr(operand) },
            loc: token.loc,
        })
    }

    fn parse_postfix(&mut self) -> Option<Expr<'a>> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    let loc = expr.loc;
                    self.advance();
                    let args = self.parse_args()?;
                    expr = Expr {
                        kind: ExprKind::Call { callee: self.ctx.alloc_expr(expr), args },
                        loc,
                    };
                }
                TokenKind::LBracket => {
                    let loc = expr.loc;
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr {
                        kind: ExprKind::Index {
                            object: self.ctx.alloc_expr(expr),
                            index: self.ctx.alloc_expr(index),
                        },
                        loc,
                    };
                }
                TokenKind::Dot => {
                    let loc = expr.loc;
                    self.advance();
                    let (property, _) = self.expect_identifier("property name")?;
                    expr = Expr {
                        kind: ExprKind::Property { object: self.ctx.alloc_expr(expr), property },
                        loc,
                    };
                }
                _ => break,
            }
        }
        Some(expr)
    }

    /// Parses a `(`-consumed argument list up to and including `)`.
    fn parse_args(&mut self) -> Option<&'a [Expr<'a>]> {
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Some(self.ctx.alloc_exprs(args))
    }

    fn parse_primary(&mut self) -> Option<Expr<'a>> {
        let token = self.peek();
        let loc = token.loc;
        let kind = match token.kind {
            TokenKind::IntLiteral(value) => {
                self.advance();
                ExprKind::IntLit(value)
            }
            TokenKind::StringLiteral(sym) => {
                self.advance();
                ExprKind::StrLit(sym)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::BoolLit(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::BoolLit(false)
            }
            TokenKind::Null => {
                self.advance();
                ExprKind::NullLit
            }
            TokenKind::Identifier(sym) => {
                self.advance();
                ExprKind::Identifier(sym)
            }
            TokenKind::This => {
                self.advance();
                ExprKind::This
            }
            TokenKind::Super => {
                self.advance();
                ExprKind::Super
            }
            TokenKind::New => {
                self.advance();
                let (class, _) = self.expect_identifier("class name after 'new'")?;
                self.expect(TokenKind::LParen)?;
                let args = self.parse_args()?;
                ExprKind::New { class, args }
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.at(TokenKind::RBracket) {
                    loop {
                        elements.push(self.parse_expr()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket)?;
                ExprKind::ArrayLit(self.ctx.alloc_exprs(elements))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                return Some(inner);
            }
            other => {
                self.error_at(loc, format!("Expected expression, found {}", other.describe()));
                return None;
            }
        };
        Some(Expr { kind, loc })
    }

    fn binary(&mut self, op: BinaryOp, left: Expr<'a>, right: Expr<'a>) -> Expr<'a> {
        let loc = left.loc;
        Expr {
            kind: ExprKind::Binary {
                op,
                left: self.ctx.alloc_expr(left),
                right: self.ctx.alloc_expr(right),
            },
            loc,
        }
    }
}
