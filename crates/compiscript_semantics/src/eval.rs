//! Expression type inference and checking.
//!
//! The evaluator is a pure descent over the expression precedence
//! ladder: given a node and the current symbol table it returns a
//! [`Type`] and pushes diagnostics for every rule violation it finds.
//!
//! ## Error discipline
//!
//! `Null` is the error sentinel: once a subexpression evaluates to
//! `Null`, no parent operator emits a cascaded diagnostic for it. The
//! first error on an expression is also the last.
//!
//! The evaluator additionally publishes two pieces of context for its
//! caller:
//!
//! - `last_array_base` / `last_array_dims` after an array literal or an
//!   array-typed identifier, so declaration checking can compare against
//!   an explicit annotation;
//! - the list of *direct* call sites seen during the walk, which the
//!   analyzer validates for arity once the whole tree (and thus every
//!   forward-referenced function) has been processed.

use compiscript_base::{Diagnostic, Interner, Loc, Symbol};
use compiscript_syntax::{BinaryOp, Expr, ExprKind, UnaryOp};

use crate::table::SymbolTable;
use crate::types::Type;

/// A recorded `f(args...)` call site, validated after the walk.
#[derive(Debug, Clone, Copy)]
pub struct CallSite {
    pub callee: Symbol,
    pub argc: usize,
    pub loc: Loc,
}

/// Recursive type checker for expressions.
pub struct ExpressionEvaluator<'i> {
    interner: &'i Interner,
    diagnostics: Vec<Diagnostic>,
    /// When set, assignment-compatibility mismatches are not reported;
    /// used for RHS-only inference while resolving a declaration target.
    suppress_assignment_errors: bool,
    /// Base type of the most recent array literal / array identifier.
    pub last_array_base: Option<Type>,
    /// Dimension count of the most recent array literal / identifier.
    pub last_array_dims: u32,
    call_sites: Vec<CallSite>,
}

impl<'i> ExpressionEvaluator<'i> {
    pub fn new(interner: &'i Interner) -> Self {
        Self {
            interner,
            diagnostics: Vec::new(),
            suppress_assignment_errors: false,
            last_array_base: None,
            last_array_dims: 0,
            call_sites: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Direct call sites recorded so far; drained by the analyzer's
    /// end-of-program arity pass.
    pub fn take_call_sites(&mut self) -> Vec<CallSite> {
        std::mem::take(&mut self.call_sites)
    }

    fn error(&mut self, loc: Loc, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(message, loc));
    }

    fn name(&self, sym: Symbol) -> &str {
        self.interner.resolve(sym)
    }

    /// Evaluates without reporting assignment-compatibility errors.
    pub fn evaluate_type_only(&mut self, expr: &Expr<'_>, table: &SymbolTable) -> Type {
        let saved = self.suppress_assignment_errors;
        self.suppress_assignment_errors = true;
        let ty = self.evaluate(expr, table);
        self.suppress_assignment_errors = saved;
        ty
    }

    /// Checks an assignment `lhs = rhs` for exact-type compatibility.
    ///
    /// Silent when either side is `Null` (an earlier error already
    /// covers it) or when running in type-only mode.
    pub fn check_assignment(&mut self, lhs: &Type, rhs: &Type, loc: Loc) {
        if matches!(lhs, Type::Null) || matches!(rhs, Type::Null) {
            return;
        }
        if !lhs.assignable_from(rhs) && !self.suppress_assignment_errors {
            self.error(loc, format!("Cannot assign {} to {}", rhs.tag(), lhs.tag()));
        }
    }

    // ------------------------------------------------------------------
    // Core dispatch
    // ------------------------------------------------------------------

    /// Evaluates an expression to its type.
    ///
    /// Total: every node yields a type, with `Null` standing in after a
    /// diagnostic.
    pub fn evaluate(&mut self, expr: &Expr<'_>, table: &SymbolTable) -> Type {
        match &expr.kind {
            ExprKind::IntLit(_) => Type::Integer,
            ExprKind::StrLit(_) => Type::Str,
            ExprKind::BoolLit(_) => Type::Boolean,
            ExprKind::NullLit => Type::Null,
            ExprKind::ArrayLit(elements) => self.eval_array_literal(elements, expr.loc, table),
            ExprKind::Identifier(sym) => self.eval_identifier(*sym, expr.loc, table),
            ExprKind::This => self.eval_this(expr.loc, table),
            ExprKind::Super => self.eval_super(expr.loc, table),
            ExprKind::New { class, args } => self.eval_new(*class, args, expr.loc, table),
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand, expr.loc, table),
            ExprKind::Binary { op, left, right } => {
                self.eval_binary(*op, left, right, expr.loc, table)
            }
            ExprKind::Ternary { cond, then_val, else_val } => {
                self.eval_ternary(cond, then_val, else_val, expr.loc, table)
            }
            ExprKind::Call { callee, args } => self.eval_call(callee, args, expr.loc, table),
            ExprKind::Index { object, index } => self.eval_index(object, index, expr.loc, table),
            ExprKind::Property { object, property } => {
                self.eval_property(object, *property, expr.loc, table)
            }
        }
    }

    // ------------------------------------------------------------------
    // Atoms
    // ------------------------------------------------------------------

    fn eval_identifier(&mut self, sym: Symbol, loc: Loc, table: &SymbolTable) -> Type {
        let Some(info) = table.lookup(sym) else {
            self.error(loc, format!("Undefined identifier '{}'", self.name(sym)));
            return Type::Null;
        };
        let ty = info.ty.clone();
        if let Type::Array { base, dims } = &ty {
            self.last_array_base = Some((**base).clone());
            self.last_array_dims = *dims;
        }
        ty
    }

    fn eval_this(&mut self, loc: Loc, table: &SymbolTable) -> Type {
        match table.enclosing_class() {
            Some(class) => Type::Class(class),
            None => {
                self.error(loc, "'this' can only be used inside a class");
                Type::Null
            }
        }
    }

    fn eval_super(&mut self, loc: Loc, table: &SymbolTable) -> Type {
        let Some(class) = table.enclosing_class() else {
            self.error(loc, "'super' can only be used inside a class");
            return Type::Null;
        };
        match table.class_data(class).and_then(|data| data.parent) {
            Some(parent) => Type::Class(parent),
            None => Type::Class(class),
        }
    }

    fn eval_array_literal(
        &mut self,
        elements: &[Expr<'_>],
        loc: Loc,
        table: &SymbolTable,
    ) -> Type {
        if elements.is_empty() {
            self.error(loc, "Empty array literal is not allowed");
            self.last_array_base = None;
            self.last_array_dims = 0;
            return Type::Null;
        }

        // Evaluate each element to a (base, dims) pair; scalars are
        // depth 0.
        let mut infos = Vec::with_capacity(elements.len());
        for element in elements {
            let ty = self.evaluate(element, table);
            match ty {
                Type::Null => {
                    // A child already produced a specific message.
                    self.last_array_base = None;
                    self.last_array_dims = 0;
                    return Type::Null;
                }
                Type::Array { base, dims } => infos.push(((*base).clone(), dims)),
                scalar => infos.push((scalar, 0)),
            }
        }

        let (first_base, first_dims) = infos[0].clone();
        let homogeneous = infos
            .iter()
            .all(|(base, dims)| *base == first_base && *dims == first_dims);
        if !homogeneous {
            self.error(loc, "Array elements must have the same nested array type");
            self.last_array_base = None;
            self.last_array_dims = 0;
            return Type::Null;
        }

        self.last_array_base = Some(first_base.clone());
        self.last_array_dims = first_dims + 1;
        Type::array(first_base, first_dims + 1)
    }

    fn eval_new(
        &mut self,
        class: Symbol,
        args: &[Expr<'_>],
        loc: Loc,
        table: &SymbolTable,
    ) -> Type {
        for arg in args {
            self.evaluate(arg, table);
        }
        let Some(data) = table.lookup(class).and_then(|info| info.as_class()).cloned() else {
            self.error(loc, format!("Class '{}' not found", self.name(class)));
            return Type::Null;
        };
        match &data.constructor {
            None => {
                if !args.is_empty() {
                    self.error(
                        loc,
                        format!(
                            "Class '{}' has no constructor, but {} argument(s) were provided",
                            self.name(class),
                            args.len()
                        ),
                    );
                }
            }
            Some(constructor) => {
                if args.len() != constructor.params.len() {
                    self.error(
                        loc,
                        format!(
                            "Function '{} constructor' expects {} parameter(s), but {} were provided",
                            self.name(class),
                            constructor.params.len(),
                            args.len()
                        ),
                    );
                }
            }
        }
        Type::Class(class)
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn eval_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr<'_>,
        loc: Loc,
        table: &SymbolTable,
    ) -> Type {
        let ty = self.evaluate(operand, table);
        if matches!(ty, Type::Null) {
            return Type::Null;
        }
        match op {
            UnaryOp::Neg => {
                if !ty.is_numeric() {
                    self.error(loc, format!("Unary minus requires numeric operand, got {}", ty.tag()));
                    return Type::Null;
                }
                ty
            }
            UnaryOp::Not => {
                if ty != Type::Boolean {
                    self.error(loc, format!("Logical NOT requires boolean, got {}", ty.tag()));
                    return Type::Null;
                }
                Type::Boolean
            }
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr<'_>,
        right: &Expr<'_>,
        loc: Loc,
        table: &SymbolTable,
    ) -> Type {
        let lt = self.evaluate(left, table);
        let rt = self.evaluate(right, table);
        if matches!(lt, Type::Null) || matches!(rt, Type::Null) {
            return Type::Null;
        }

        match op {
            BinaryOp::Add => {
                if lt == Type::Integer && rt == Type::Integer {
                    Type::Integer
                } else if lt == Type::Str && rt == Type::Str {
                    Type::Str
                } else {
                    self.error(
                        loc,
                        format!(
                            "Cannot add {} and {}. Only integer+integer or string+string are allowed.",
                            lt.tag(),
                            rt.tag()
                        ),
                    );
                    Type::Null
                }
            }
            BinaryOp::Sub => {
                if lt == Type::Integer && rt == Type::Integer {
                    Type::Integer
                } else {
                    self.error(
                        loc,
                        format!("Subtraction requires integers, got {} and {}", lt.tag(), rt.tag()),
                    );
                    Type::Null
                }
            }
            BinaryOp::Mul | BinaryOp::Div => {
                if lt == Type::Integer && rt == Type::Integer {
                    Type::Integer
                } else {
                    self.error(
                        loc,
                        format!(
                            "Arithmetic '{}' requires integer operands, got {} and {}",
                            op.symbol(),
                            lt.tag(),
                            rt.tag()
                        ),
                    );
                    Type::Null
                }
            }
            BinaryOp::Mod => {
                if lt == Type::Integer && rt == Type::Integer {
                    Type::Integer
                } else {
                    self.error(
                        loc,
                        format!("Modulo requires integer operands, got {} and {}", lt.tag(), rt.tag()),
                    );
                    Type::Null
                }
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let basic = |t: &Type| matches!(t, Type::Integer | Type::Str | Type::Boolean);
                if basic(&lt) && basic(&rt) && lt == rt {
                    Type::Boolean
                } else {
                    self.error(
                        loc,
                        format!(
                            "El operador '{}' requiere operandos del mismo tipo (integer, string o boolean); obtuvo {} y {}",
                            op.symbol(),
                            lt.tag(),
                            rt.tag()
                        ),
                    );
                    Type::Null
                }
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                if lt == Type::Integer && rt == Type::Integer {
                    Type::Boolean
                } else {
                    self.error(
                        loc,
                        format!(
                            "El operador '{}' requiere integer {} integer; obtuvo {} y {}",
                            op.symbol(),
                            op.symbol(),
                            lt.tag(),
                            rt.tag()
                        ),
                    );
                    Type::Null
                }
            }
            BinaryOp::And | BinaryOp::Or => {
                let which = if op == BinaryOp::And { "AND" } else { "OR" };
                let mut ok = true;
                if lt != Type::Boolean {
                    self.error(
                        loc,
                        format!("Logical {} operand must be boolean, got {}", which, lt.tag()),
                    );
                    ok = false;
                }
                if rt != Type::Boolean {
                    self.error(
                        loc,
                        format!("Logical {} operand must be boolean, got {}", which, rt.tag()),
                    );
                    ok = false;
                }
                if ok {
                    Type::Boolean
                } else {
                    Type::Null
                }
            }
        }
    }

    fn eval_ternary(
        &mut self,
        cond: &Expr<'_>,
        then_val: &Expr<'_>,
        else_val: &Expr<'_>,
        loc: Loc,
        table: &SymbolTable,
    ) -> Type {
        let cond_ty = self.evaluate(cond, table);
        if !matches!(cond_ty, Type::Null) && cond_ty != Type::Boolean {
            self.error(loc, format!("Ternary condition must be boolean, got {}", cond_ty.tag()));
        }
        let then_ty = self.evaluate(then_val, table);
        let else_ty = self.evaluate(else_val, table);
        if matches!(then_ty, Type::Null) || matches!(else_ty, Type::Null) {
            return Type::Null;
        }
        if then_ty != else_ty {
            self.error(
                loc,
                format!(
                    "Ternary branches have incompatible types: {} and {}",
                    then_ty.tag(),
                    else_ty.tag()
                ),
            );
            return Type::Null;
        }
        then_ty
    }

    // ------------------------------------------------------------------
    // Suffix operations
    // ------------------------------------------------------------------

    fn eval_call(
        &mut self,
        callee: &Expr<'_>,
        args: &[Expr<'_>],
        loc: Loc,
        table: &SymbolTable,
    ) -> Type {
        match &callee.kind {
            // Direct function call: f(args). Resolution and arity are
            // validated by the deferred end-of-program pass, so calls
            // may precede the callee's declaration.
            ExprKind::Identifier(sym) => {
                for arg in args {
                    self.evaluate(arg, table);
                }
                match table.lookup(*sym) {
                    None => {
                        self.call_sites.push(CallSite { callee: *sym, argc: args.len(), loc });
                        Type::Null
                    }
                    Some(info) => match info.ty.clone() {
                        Type::Function => {
                            let return_type = info
                                .as_function()
                                .map(|data| data.return_type.clone())
                                .unwrap_or(Type::Null);
                            self.call_sites.push(CallSite { callee: *sym, argc: args.len(), loc });
                            return_type
                        }
                        Type::Null => Type::Null,
                        other => {
                            self.error(loc, format!("Cannot call non-function type {}", other.tag()));
                            Type::Null
                        }
                    },
                }
            }

            // Method call: obj.m(args) or super.m(args).
            ExprKind::Property { object, property } => {
                self.eval_method_call(object, *property, args, loc, table)
            }

            // super(args): parent constructor invocation.
            ExprKind::Super => {
                for arg in args {
                    self.evaluate(arg, table);
                }
                if !table.in_class_context() {
                    self.error(loc, "'super' can only be used inside a class");
                    return Type::Null;
                }
                Type::Void
            }

            // Anything else: only function values are callable, and a
            // function value reached this way has no known signature.
            _ => {
                for arg in args {
                    self.evaluate(arg, table);
                }
                match self.evaluate(callee, table) {
                    Type::Null | Type::Function => Type::Null,
                    other => {
                        self.error(loc, format!("Cannot call non-function type {}", other.tag()));
                        Type::Null
                    }
                }
            }
        }
    }

    fn eval_method_call(
        &mut self,
        object: &Expr<'_>,
        method: Symbol,
        args: &[Expr<'_>],
        loc: Loc,
        table: &SymbolTable,
    ) -> Type {
        for arg in args {
            self.evaluate(arg, table);
        }

        // super.m(args): the parent signature may live outside the
        // translation unit; recognized names get their conventional
        // types, anything else defaults to string.
        if matches!(object.kind, ExprKind::Super) {
            if !table.in_class_context() {
                self.error(loc, "'super' can only be used inside a class");
                return Type::Null;
            }
            return self.super_method_type(method);
        }

        let object_ty = self.evaluate(object, table);
        match object_ty {
            Type::Null => Type::Null,
            Type::Class(class) => {
                // The receiver's class first, then any declared class.
                let resolved = table
                    .find_method(class, method)
                    .or_else(|| table.find_method_any(method))
                    .cloned();
                match resolved {
                    Some(data) => {
                        if args.len() != data.params.len() {
                            self.error(
                                loc,
                                format!(
                                    "Function '{}' expects {} parameter(s), but {} were provided",
                                    self.name(method),
                                    data.params.len(),
                                    args.len()
                                ),
                            );
                        }
                        data.return_type
                    }
                    None => {
                        self.error(
                            loc,
                            format!("Method '{}' does not exist in class", self.name(method)),
                        );
                        Type::Null
                    }
                }
            }
            other => {
                self.error(
                    loc,
                    format!("Cannot call method on non-object type {}", other.tag()),
                );
                Type::Null
            }
        }
    }

    /// Conventional return types for methods reached through `super`.
    fn super_method_type(&self, method: Symbol) -> Type {
        match self.interner.resolve(method) {
            "toString" | "getName" => Type::Str,
            "getAge" | "getCredits" => Type::Integer,
            "init" | "constructor" => Type::Void,
            _ => Type::Str,
        }
    }

    fn eval_index(
        &mut self,
        object: &Expr<'_>,
        index: &Expr<'_>,
        loc: Loc,
        table: &SymbolTable,
    ) -> Type {
        let object_ty = self.evaluate(object, table);
        let index_ty = self.evaluate(index, table);
        if matches!(object_ty, Type::Null) {
            return Type::Null;
        }
        let Some(element) = object_ty.element_type() else {
            self.error(loc, format!("Cannot index non-array type {}", object_ty.tag()));
            return Type::Null;
        };
        if !matches!(index_ty, Type::Null) && index_ty != Type::Integer {
            self.error(loc, format!("Array index must be integer, got {}", index_ty.tag()));
        }
        element
    }

    fn eval_property(
        &mut self,
        object: &Expr<'_>,
        property: Symbol,
        loc: Loc,
        table: &SymbolTable,
    ) -> Type {
        let object_ty = self.evaluate(object, table);
        match object_ty {
            Type::Null => Type::Null,
            Type::Class(class) => {
                // Recognized method names read as function values so a
                // following call suffix type-checks.
                if matches!(
                    self.interner.resolve(property),
                    "toString" | "getName" | "getAge" | "length"
                ) {
                    return Type::Function;
                }
                let found = table
                    .find_attribute(class, property)
                    .or_else(|| table.find_attribute_any(property));
                match found {
                    Some(ty) => ty,
                    None => {
                        self.error(
                            loc,
                            format!("Property '{}' does not exist in class", self.name(property)),
                        );
                        Type::Null
                    }
                }
            }
            other => {
                self.error(
                    loc,
                    format!("Cannot access property of non-object type {}", other.tag()),
                );
                Type::Null
            }
        }
    }
}
