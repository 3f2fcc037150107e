//! Lowering of a validated parse tree into Three-Address Code.
//!
//! The generator runs only after semantic analysis reported no
//! diagnostics, so it assumes a well-typed tree and concentrates on the
//! memory model and instruction selection:
//!
//! - **Slots**: globals bind `G[off]` in declaration order; locals bind
//!   `fp[off]` with offsets growing monotonically per function (block
//!   scopes never reuse a slot). Free-function parameters bind
//!   `fp[-1], fp[-2], ...`; methods reserve `fp[-1]` for `this` and
//!   shift explicit parameters to `fp[-2]` onward. Fields of `this`
//!   lower to the `fp[-1][field_off]` operand form.
//! - **Temporaries** reset per function: `t0, t1, ...` with no gaps.
//! - **Labels** use a dedicated counter per construct family:
//!   `IF_TRUE_k`/`IF_FALSE_k`/`IF_END_k`, `STARTWHILE_k`/
//!   `LABEL_TRUE_k`/`ENDWHILE_k`, and the short-circuit continuation
//!   labels `OR_CONT_k`/`AND_CONT_k`.
//! - **Conditions** in control context are lowered against inherited
//!   true/false labels (short-circuit form); a comparison materializes
//!   its boolean and branches with `IF t > 0`.
//! - **Truth** is strictly-greater-than-zero, never equality with 1.
//!
//! One peephole is applied during lowering: a declaration whose
//! initializer already landed in a fresh temporary records a
//! variable-to-temporary alias instead of storing, so an immediately
//! following `return x` reads the temporary directly. Any assignment to
//! the variable invalidates the alias and stores normally.

use std::collections::HashMap;

use compiscript_base::{Interner, Symbol};
use compiscript_semantics::Type;
use compiscript_syntax::{
    AssignTarget, BinaryOp, Expr, ExprKind, FunctionDecl, Program, Stmt, StmtKind, UnaryOp,
};

use super::inst::{render_program, TacInstruction, TacOp};

/// Result of lowering: the instruction stream plus its canonical text.
#[derive(Debug, Clone)]
pub struct TacOutput {
    pub instructions: Vec<TacInstruction>,
    pub text: String,
}

/// Frame slot width for locals, parameters, and object fields.
///
/// Pointers are a machine word on MIPS-32, so references take one slot;
/// only floats are doublewords.
fn slot_size(ty: &Type) -> u32 {
    match ty {
        Type::Float => 8,
        _ => 4,
    }
}

/// Global-segment width, which keeps the conceptual 8-byte size for
/// reference types.
fn global_size(ty: &Type) -> u32 {
    ty.byte_size().max(4)
}

#[derive(Debug, Clone)]
struct Binding {
    place: String,
    ty: Type,
}

#[derive(Debug, Clone)]
struct ClassInfo {
    parent: Option<Symbol>,
    /// `(name, offset, type)` in declaration order.
    fields: Vec<(Symbol, u32, Type)>,
    size: u32,
    has_init: bool,
}

struct LoopLabels {
    continue_label: String,
    break_label: String,
}

/// Tree-to-TAC lowering pass.
pub struct TacGenerator<'i> {
    interner: &'i Interner,
    instructions: Vec<TacInstruction>,
    temp_counter: u32,
    if_counter: u32,
    while_counter: u32,
    or_counter: u32,
    and_counter: u32,
    /// Innermost-last stack of name-to-slot bindings; index 0 holds the
    /// globals.
    scopes: Vec<HashMap<Symbol, Binding>>,
    frame_offset: u32,
    global_offset: u32,
    in_function: bool,
    current_class: Option<Symbol>,
    classes: HashMap<Symbol, ClassInfo>,
    aliases: HashMap<Symbol, String>,
    loops: Vec<LoopLabels>,
}

impl<'i> TacGenerator<'i> {
    pub fn new(interner: &'i Interner) -> Self {
        Self {
            interner,
            instructions: Vec::new(),
            temp_counter: 0,
            if_counter: 0,
            while_counter: 0,
            or_counter: 0,
            and_counter: 0,
            scopes: vec![HashMap::new()],
            frame_offset: 0,
            global_offset: 0,
            in_function: false,
            current_class: None,
            classes: HashMap::new(),
            aliases: HashMap::new(),
            loops: Vec::new(),
        }
    }

    /// Lowers a whole program.
    pub fn generate(mut self, program: &Program<'_>) -> TacOutput {
        self.collect_class_layouts(program);
        for stmt in program.stmts {
            self.gen_top_level(stmt);
        }
        let text = render_program(&self.instructions);
        TacOutput { instructions: self.instructions, text }
    }

    // ------------------------------------------------------------------
    // Class layout prepass
    // ------------------------------------------------------------------

    fn collect_class_layouts(&mut self, program: &Program<'_>) {
        for stmt in program.stmts {
            let StmtKind::ClassDecl { name, parent, members } = &stmt.kind else {
                continue;
            };
            let mut info = ClassInfo {
                parent: *parent,
                fields: Vec::new(),
                size: 0,
                has_init: false,
            };
            for member in *members {
                match &member.kind {
                    StmtKind::VarDecl { name: field, annotation, init }
                    | StmtKind::ConstDecl { name: field, annotation, init } => {
                        let ty = annotation
                            .as_ref()
                            .map(Type::from_annotation)
                            .or_else(|| init.map(|expr| self.probe_literal(expr)))
                            .unwrap_or(Type::Integer);
                        let offset = info.size;
                        info.size += slot_size(&ty);
                        info.fields.push((*field, offset, ty));
                    }
                    StmtKind::FunctionDecl(func) if func.is_init => info.has_init = true,
                    _ => {}
                }
            }
            self.classes.insert(*name, info);
        }
    }

    /// Literal-only type probe used before bindings exist.
    fn probe_literal(&self, expr: &Expr<'_>) -> Type {
        match &expr.kind {
            ExprKind::StrLit(_) => Type::Str,
            ExprKind::BoolLit(_) => Type::Boolean,
            ExprKind::ArrayLit(_) => Type::array(Type::Integer, 1),
            _ => Type::Integer,
        }
    }

    fn resolve_field(&self, class: Symbol, field: Symbol) -> Option<(u32, Type)> {
        let mut cursor = Some(class);
        while let Some(name) = cursor {
            let info = self.classes.get(&name)?;
            if let Some((_, offset, ty)) = info.fields.iter().find(|(f, _, _)| *f == field) {
                return Some((*offset, ty.clone()));
            }
            cursor = info.parent;
        }
        None
    }

    fn class_chain_has_init(&self, class: Symbol) -> bool {
        let mut cursor = Some(class);
        while let Some(name) = cursor {
            match self.classes.get(&name) {
                Some(info) if info.has_init => return true,
                Some(info) => cursor = info.parent,
                None => return false,
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // Emission helpers
    // ------------------------------------------------------------------

    fn emit(&mut self, instr: TacInstruction) {
        self.instructions.push(instr);
    }

    fn new_temp(&mut self) -> String {
        let name = format!("t{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }

    fn new_if_labels(&mut self) -> (String, String, String) {
        let k = self.if_counter;
        self.if_counter += 1;
        (
            format!("IF_TRUE_{}", k),
            format!("IF_FALSE_{}", k),
            format!("IF_END_{}", k),
        )
    }

    fn new_while_labels(&mut self) -> (String, String, String, u32) {
        let k = self.while_counter;
        self.while_counter += 1;
        (
            format!("STARTWHILE_{}", k),
            format!("LABEL_TRUE_{}", k),
            format!("ENDWHILE_{}", k),
            k,
        )
    }

    // ------------------------------------------------------------------
    // Binding management
    // ------------------------------------------------------------------

    fn bind_local(&mut self, name: Symbol, ty: Type) -> String {
        let place = if self.in_function {
            let place = format!("fp[{}]", self.frame_offset);
            self.frame_offset += slot_size(&ty);
            place
        } else {
            let place = format!("G[{}]", self.global_offset);
            self.global_offset += global_size(&ty);
            place
        };
        self.aliases.remove(&name);
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name, Binding { place: place.clone(), ty });
        place
    }

    fn lookup_binding(&self, name: Symbol) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(&name))
    }

    /// Resolves an identifier to an operand: alias temp, bound slot, or
    /// a field of `this` inside a method.
    fn resolve_identifier(&mut self, name: Symbol) -> (String, Type) {
        if let Some(binding) = self.lookup_binding(name) {
            let ty = binding.ty.clone();
            let place = binding.place.clone();
            if let Some(alias) = self.aliases.get(&name) {
                return (alias.clone(), ty);
            }
            return (place, ty);
        }
        if let Some(class) = self.current_class {
            if let Some((offset, ty)) = self.resolve_field(class, name) {
                return (format!("fp[-1][{}]", offset), ty);
            }
        }
        // Unresolved names cannot occur in a validated tree; bind a
        // fresh local so lowering stays total.
        let place = self.bind_local(name, Type::Integer);
        (place, Type::Integer)
    }

    // ------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------

    fn gen_top_level(&mut self, stmt: &Stmt<'_>) {
        match &stmt.kind {
            StmtKind::ClassDecl { name, members, .. } => {
                let previous = self.current_class.replace(*name);
                for member in *members {
                    if let StmtKind::FunctionDecl(func) = &member.kind {
                        self.gen_function(func, true);
                    }
                }
                self.current_class = previous;
            }
            StmtKind::FunctionDecl(func) => self.gen_function(func, false),
            _ => self.gen_stmt(stmt),
        }
    }

    fn gen_function(&mut self, func: &FunctionDecl<'_>, is_method: bool) {
        self.temp_counter = 0;
        self.frame_offset = 0;
        self.aliases.clear();
        self.in_function = true;
        self.scopes.push(HashMap::new());

        // Parameter slots: fp[-1], fp[-2], ... with `this` occupying
        // fp[-1] for methods.
        let shift = if is_method { 2 } else { 1 };
        for (index, param) in func.params.iter().enumerate() {
            let ty = param
                .annotation
                .as_ref()
                .map(Type::from_annotation)
                .unwrap_or(Type::Integer);
            let place = format!("fp[-{}]", index as u32 + shift);
            self.scopes
                .last_mut()
                .expect("function scope pushed above")
                .insert(param.name, Binding { place, ty });
        }

        let name = self.interner.resolve(func.name).to_string();
        self.emit(TacInstruction::function_begin(&name));
        let body_start = self.instructions.len();
        for stmt in func.body {
            self.gen_stmt(stmt);
        }
        // Methods (constructors included) fall back to RETURN 0 when the
        // body did not end in an explicit return; free functions do not.
        let ends_in_return = self.instructions[body_start..]
            .last()
            .map(|instr| instr.op == TacOp::Return)
            .unwrap_or(false);
        if is_method && !ends_in_return {
            self.emit(TacInstruction::ret(Some("0".to_string())));
        }
        self.emit(TacInstruction::function_end(&name));

        self.scopes.pop();
        self.in_function = false;
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn gen_block(&mut self, stmts: &[Stmt<'_>]) {
        self.scopes.push(HashMap::new());
        for stmt in stmts {
            self.gen_stmt(stmt);
        }
        self.scopes.pop();
    }

    fn gen_stmt(&mut self, stmt: &Stmt<'_>) {
        match &stmt.kind {
            StmtKind::VarDecl { name, annotation, init }
            | StmtKind::ConstDecl { name, annotation, init } => {
                let ty = annotation
                    .as_ref()
                    .map(Type::from_annotation)
                    .or_else(|| init.map(|expr| self.probe_type(expr)))
                    .unwrap_or(Type::Integer);
                let place = self.bind_local(*name, ty);
                let Some(init) = init else {
                    return;
                };
                if let ExprKind::ArrayLit(elements) = &init.kind {
                    self.store_array_literal(&place, elements);
                    return;
                }
                let temps_before = self.temp_counter;
                let value = self.lower_expr(init);
                if self.is_fresh_temp(&value, temps_before) {
                    // The value already lives in a temporary of its own;
                    // alias instead of storing.
                    self.aliases.insert(*name, value);
                } else {
                    self.emit(TacInstruction::assign(place, value));
                }
            }

            StmtKind::FunctionDecl(func) => {
                // Nested function declarations lower like free functions.
                self.gen_function(func, false);
            }
            StmtKind::ClassDecl { .. } => {
                // Classes only appear at top level; members carry no
                // statement-position code.
            }

            StmtKind::Assign { target, value } => self.gen_assign(target, value),

            StmtKind::If { cond, then_block, else_block } => {
                let (true_label, false_label, end_label) = self.new_if_labels();
                let cond_false = if else_block.is_some() {
                    false_label.clone()
                } else {
                    end_label.clone()
                };
                self.lower_condition(cond, &true_label, &cond_false);
                self.emit(TacInstruction::label(&true_label));
                self.gen_block(then_block);
                if let Some(else_block) = else_block {
                    self.emit(TacInstruction::goto(&end_label));
                    self.emit(TacInstruction::label(&false_label));
                    self.gen_block(else_block);
                }
                self.emit(TacInstruction::label(&end_label));
            }

            StmtKind::While { cond, body } => {
                let (start, body_label, end, _) = self.new_while_labels();
                self.emit(TacInstruction::label(&start));
                self.lower_condition(cond, &body_label, &end);
                self.emit(TacInstruction::label(&body_label));
                self.loops.push(LoopLabels {
                    continue_label: start.clone(),
                    break_label: end.clone(),
                });
                self.gen_block(body);
                self.loops.pop();
                self.emit(TacInstruction::goto(&start));
                self.emit(TacInstruction::label(&end));
            }

            StmtKind::DoWhile { body, cond } => {
                let (start, _, end, _) = self.new_while_labels();
                self.emit(TacInstruction::label(&start));
                self.loops.push(LoopLabels {
                    continue_label: start.clone(),
                    break_label: end.clone(),
                });
                self.gen_block(body);
                self.loops.pop();
                // Condition true re-enters the loop, false falls out.
                self.lower_condition(cond, &start, &end);
                self.emit(TacInstruction::label(&end));
            }

            StmtKind::For { init, cond, update, body } => {
                self.scopes.push(HashMap::new());
                if let Some(init) = init {
                    self.gen_stmt(init);
                }
                let (start, body_label, end, k) = self.new_while_labels();
                self.emit(TacInstruction::label(&start));
                if let Some(cond) = cond {
                    self.lower_condition(cond, &body_label, &end);
                    self.emit(TacInstruction::label(&body_label));
                }
                let continue_label = if update.is_some() {
                    format!("FORUPDATE_{}", k)
                } else {
                    start.clone()
                };
                self.loops.push(LoopLabels {
                    continue_label: continue_label.clone(),
                    break_label: end.clone(),
                });
                self.gen_block(body);
                self.loops.pop();
                if let Some(update) = update {
                    self.emit(TacInstruction::label(&continue_label));
                    self.gen_stmt(update);
                }
                self.emit(TacInstruction::goto(&start));
                self.emit(TacInstruction::label(&end));
                self.scopes.pop();
            }

            StmtKind::Foreach { var, iterable, body } => {
                self.gen_foreach(*var, iterable, body);
            }

            StmtKind::Break => {
                if let Some(labels) = self.loops.last() {
                    let target = labels.break_label.clone();
                    self.emit(TacInstruction::goto(target));
                }
            }
            StmtKind::Continue => {
                if let Some(labels) = self.loops.last() {
                    let target = labels.continue_label.clone();
                    self.emit(TacInstruction::goto(target));
                }
            }

            StmtKind::Return { value } => {
                let operand = value.map(|expr| self.lower_expr(expr));
                self.emit(TacInstruction::ret(operand));
            }

            StmtKind::Print { value } => {
                let operand = self.lower_expr(value);
                self.emit(TacInstruction::print(operand));
            }

            StmtKind::Block { stmts } => self.gen_block(stmts),

            StmtKind::TryCatch { try_block, .. } => {
                // No throw reaches TAC, so the handler is unreachable;
                // only the protected body lowers.
                self.gen_block(try_block);
            }

            StmtKind::ExprStmt { expr } => {
                self.lower_expr(expr);
            }
        }
    }

    fn gen_assign(&mut self, target: &AssignTarget<'_>, value: &Expr<'_>) {
        match target {
            AssignTarget::Name(name) => {
                self.aliases.remove(name);
                let (place, _) = self.resolve_identifier(*name);
                if let ExprKind::ArrayLit(elements) = &value.kind {
                    self.store_array_literal(&place, elements);
                    return;
                }
                let operand = self.lower_expr(value);
                self.emit(TacInstruction::assign(place, operand));
            }
            AssignTarget::ThisField { field } => {
                let place = self.this_field_place(*field, value);
                let operand = self.lower_expr(value);
                self.emit(TacInstruction::assign(place, operand));
            }
            AssignTarget::Field { object, field } => {
                if let Some(place) = self.field_place(object, *field) {
                    let operand = self.lower_expr(value);
                    self.emit(TacInstruction::assign(place, operand));
                } else {
                    let object_op = self.lower_expr(object);
                    let operand = self.lower_expr(value);
                    let field = self.interner.resolve(*field).to_string();
                    self.emit(TacInstruction::object_assign(object_op, field, operand));
                }
            }
            AssignTarget::Index { array, index } => {
                let array_op = self.lower_expr(array);
                let index_op = self.lower_index_operand(index);
                let operand = self.lower_expr(value);
                self.emit(TacInstruction::array_assign(array_op, index_op, operand));
            }
        }
    }

    /// Field slot for `this.field`, registering unknown fields on the
    /// current class the way the analyzer auto-declares them.
    fn this_field_place(&mut self, field: Symbol, value: &Expr<'_>) -> String {
        let Some(class) = self.current_class else {
            return "fp[-1][0]".to_string();
        };
        if let Some((offset, _)) = self.resolve_field(class, field) {
            return format!("fp[-1][{}]", offset);
        }
        let ty = self.probe_type(value);
        let info = self
            .classes
            .entry(class)
            .or_insert_with(|| ClassInfo { parent: None, fields: Vec::new(), size: 0, has_init: false });
        let offset = info.size;
        info.size += slot_size(&ty);
        info.fields.push((field, offset, ty));
        format!("fp[-1][{}]", offset)
    }

    /// `obj.field` as a direct slot operand, when `obj` is a bound
    /// identifier of known class.
    fn field_place(&mut self, object: &Expr<'_>, field: Symbol) -> Option<String> {
        match &object.kind {
            ExprKind::This | ExprKind::Super => {
                let class = self.current_class?;
                let (offset, _) = self.resolve_field(class, field)?;
                Some(format!("fp[-1][{}]", offset))
            }
            ExprKind::Identifier(name) => {
                let binding = self.lookup_binding(*name)?;
                let place = binding.place.clone();
                let Type::Class(class) = binding.ty.clone() else {
                    return None;
                };
                let (offset, _) = self.resolve_field(class, field)?;
                Some(format!("{}[{}]", place, offset))
            }
            _ => None,
        }
    }

    fn gen_foreach(&mut self, var: Symbol, iterable: &Expr<'_>, body: &[Stmt<'_>]) {
        let array_op = self.lower_expr(iterable);

        // The element count comes from the `length` built-in.
        self.emit(TacInstruction::param(array_op.clone()));
        self.emit(TacInstruction::call("length", 1));
        let len = self.new_temp();
        self.emit(TacInstruction::assign(&len, "R"));

        self.scopes.push(HashMap::new());
        let element_ty = self.probe_type(iterable).element_type().unwrap_or(Type::Integer);
        let var_place = self.bind_local(var, element_ty);

        let index = self.new_temp();
        self.emit(TacInstruction::assign(&index, "0"));

        let (start, body_label, end, k) = self.new_while_labels();
        self.emit(TacInstruction::label(&start));
        let cond = self.new_temp();
        self.emit(TacInstruction::binary(TacOp::Lt, &cond, &index, &len));
        self.emit(TacInstruction::if_true(&cond, &body_label));
        self.emit(TacInstruction::goto(&end));
        self.emit(TacInstruction::label(&body_label));

        let element = self.new_temp();
        self.emit(TacInstruction::array_access(&element, &array_op, &index));
        self.emit(TacInstruction::assign(&var_place, &element));

        let continue_label = format!("FORUPDATE_{}", k);
        self.loops.push(LoopLabels {
            continue_label: continue_label.clone(),
            break_label: end.clone(),
        });
        for stmt in body {
            self.gen_stmt(stmt);
        }
        self.loops.pop();

        self.emit(TacInstruction::label(&continue_label));
        let next = self.new_temp();
        self.emit(TacInstruction::binary(TacOp::Add, &next, &index, "1"));
        self.emit(TacInstruction::assign(&index, &next));
        self.emit(TacInstruction::goto(&start));
        self.emit(TacInstruction::label(&end));
        self.scopes.pop();
    }

    // ------------------------------------------------------------------
    // Conditions (control context, inherited labels)
    // ------------------------------------------------------------------

    /// Lowers a boolean expression used as a control condition.
    ///
    /// `a || b` lowers the left with targets `(true, next)` and the
    /// right with `(true, false)`; `a && b` with `(next, false)` then
    /// `(true, false)`; `!a` swaps the targets. Any other operand
    /// materializes and tests `IF t > 0`.
    fn lower_condition(&mut self, cond: &Expr<'_>, true_label: &str, false_label: &str) {
        match &cond.kind {
            ExprKind::Binary { op: BinaryOp::Or, left, right } => {
                let next = format!("OR_CONT_{}", self.or_counter);
                self.or_counter += 1;
                self.lower_condition(left, true_label, &next);
                self.emit(TacInstruction::label(&next));
                self.lower_condition(right, true_label, false_label);
            }
            ExprKind::Binary { op: BinaryOp::And, left, right } => {
                let next = format!("AND_CONT_{}", self.and_counter);
                self.and_counter += 1;
                self.lower_condition(left, &next, false_label);
                self.emit(TacInstruction::label(&next));
                self.lower_condition(right, true_label, false_label);
            }
            ExprKind::Unary { op: UnaryOp::Not, operand } => {
                self.lower_condition(operand, false_label, true_label);
            }
            _ => {
                let operand = self.lower_expr(cond);
                self.emit(TacInstruction::if_true(operand, true_label));
                self.emit(TacInstruction::goto(false_label));
            }
        }
    }

    // ------------------------------------------------------------------
    // Expressions (value context)
    // ------------------------------------------------------------------

    fn is_fresh_temp(&self, operand: &str, temps_before: u32) -> bool {
        operand
            .strip_prefix('t')
            .and_then(|digits| digits.parse::<u32>().ok())
            .is_some_and(|id| id >= temps_before && id < self.temp_counter)
    }

    fn lower_expr(&mut self, expr: &Expr<'_>) -> String {
        match &expr.kind {
            ExprKind::IntLit(value) => value.to_string(),
            ExprKind::StrLit(sym) => format!("\"{}\"", self.interner.resolve(*sym)),
            ExprKind::BoolLit(true) => "1".to_string(),
            ExprKind::BoolLit(false) => "0".to_string(),
            ExprKind::NullLit => "0".to_string(),

            ExprKind::Identifier(name) => self.resolve_identifier(*name).0,
            ExprKind::This | ExprKind::Super => "fp[-1]".to_string(),

            ExprKind::ArrayLit(elements) => {
                let base = self.new_temp();
                self.emit(TacInstruction::assign(&base, "0"));
                self.store_array_literal(&base, elements);
                base
            }

            ExprKind::Unary { op, operand } => {
                let value = self.lower_expr(operand);
                let result = self.new_temp();
                let op = match op {
                    UnaryOp::Neg => TacOp::Neg,
                    UnaryOp::Not => TacOp::Not,
                };
                self.emit(TacInstruction::unary(op, &result, value));
                result
            }

            ExprKind::Binary { op, left, right } => {
                let left_op = self.lower_expr(left);
                let right_op = self.lower_expr(right);
                let tac_op = self.select_binary_op(*op, left, right);
                let result = self.new_temp();
                self.emit(TacInstruction::binary(tac_op, &result, left_op, right_op));
                result
            }

            ExprKind::Ternary { cond, then_val, else_val } => {
                let result = self.new_temp();
                let (true_label, false_label, end_label) = self.new_if_labels();
                self.lower_condition(cond, &true_label, &false_label);
                self.emit(TacInstruction::label(&true_label));
                let then_op = self.lower_expr(then_val);
                self.emit(TacInstruction::assign(&result, then_op));
                self.emit(TacInstruction::goto(&end_label));
                self.emit(TacInstruction::label(&false_label));
                let else_op = self.lower_expr(else_val);
                self.emit(TacInstruction::assign(&result, else_op));
                self.emit(TacInstruction::label(&end_label));
                result
            }

            ExprKind::Call { callee, args } => self.lower_call(callee, args),

            ExprKind::New { class, args } => self.lower_new(*class, args),

            ExprKind::Index { object, index } => {
                let object_op = self.lower_expr(object);
                let index_op = self.lower_index_operand(index);
                let result = self.new_temp();
                self.emit(TacInstruction::array_access(&result, object_op, index_op));
                result
            }

            ExprKind::Property { object, property } => {
                if let Some(place) = self.field_place(object, *property) {
                    return place;
                }
                let object_op = self.lower_expr(object);
                let result = self.new_temp();
                let property = self.interner.resolve(*property).to_string();
                self.emit(TacInstruction::object_access(&result, object_op, property));
                result
            }
        }
    }

    /// Array indices are always full operands so the textual form stays
    /// distinguishable from literal field offsets; a literal index is
    /// routed through a temporary.
    fn lower_index_operand(&mut self, index: &Expr<'_>) -> String {
        let operand = self.lower_expr(index);
        if operand.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
            let temp = self.new_temp();
            self.emit(TacInstruction::assign(&temp, operand));
            temp
        } else {
            operand
        }
    }

    fn store_array_literal(&mut self, base: &str, elements: &[Expr<'_>]) {
        for (position, element) in elements.iter().enumerate() {
            let value = self.lower_expr(element);
            let index = self.new_temp();
            self.emit(TacInstruction::assign(&index, position.to_string()));
            self.emit(TacInstruction::array_assign(base, &index, value));
        }
    }

    /// `+` on strings is CONCAT; everything else maps one-to-one.
    fn select_binary_op(&mut self, op: BinaryOp, left: &Expr<'_>, right: &Expr<'_>) -> TacOp {
        match op {
            BinaryOp::Add => {
                if self.probe_type(left) == Type::Str || self.probe_type(right) == Type::Str {
                    TacOp::Concat
                } else {
                    TacOp::Add
                }
            }
            BinaryOp::Sub => TacOp::Sub,
            BinaryOp::Mul => TacOp::Mul,
            BinaryOp::Div => TacOp::Div,
            BinaryOp::Mod => TacOp::Mod,
            BinaryOp::Eq => TacOp::Eq,
            BinaryOp::Ne => TacOp::Ne,
            BinaryOp::Lt => TacOp::Lt,
            BinaryOp::Le => TacOp::Le,
            BinaryOp::Gt => TacOp::Gt,
            BinaryOp::Ge => TacOp::Ge,
            BinaryOp::And => TacOp::And,
            BinaryOp::Or => TacOp::Or,
        }
    }

    fn lower_call(&mut self, callee: &Expr<'_>, args: &[Expr<'_>]) -> String {
        match &callee.kind {
            // Direct call: f(args).
            ExprKind::Identifier(name) => {
                let operands: Vec<String> = args.iter().map(|arg| self.lower_expr(arg)).collect();
                for operand in &operands {
                    self.emit(TacInstruction::param(operand));
                }
                let name = self.interner.resolve(*name).to_string();
                self.emit(TacInstruction::call(name, operands.len()));
                let result = self.new_temp();
                self.emit(TacInstruction::assign(&result, "R"));
                result
            }

            // Method call: obj.m(args). `this` rides along as the
            // first parameter, so N includes it.
            ExprKind::Property { object, property } => {
                let object_op = self.lower_expr(object);
                let operands: Vec<String> = args.iter().map(|arg| self.lower_expr(arg)).collect();
                self.emit(TacInstruction::param(object_op));
                for operand in &operands {
                    self.emit(TacInstruction::param(operand));
                }
                let method = self.interner.resolve(*property).to_string();
                self.emit(TacInstruction::call(method, operands.len() + 1));
                let result = self.new_temp();
                self.emit(TacInstruction::assign(&result, "R"));
                result
            }

            // super(args): parent constructor, `this` forwarded.
            ExprKind::Super => {
                let operands: Vec<String> = args.iter().map(|arg| self.lower_expr(arg)).collect();
                self.emit(TacInstruction::param("fp[-1]"));
                for operand in &operands {
                    self.emit(TacInstruction::param(operand));
                }
                self.emit(TacInstruction::call("init", operands.len() + 1));
                let result = self.new_temp();
                self.emit(TacInstruction::assign(&result, "R"));
                result
            }

            // Calling anything else is rejected during analysis.
            _ => self.lower_expr(callee),
        }
    }

    fn lower_new(&mut self, class: Symbol, args: &[Expr<'_>]) -> String {
        let object = self.new_temp();
        let class_name = self.interner.resolve(class).to_string();
        self.emit(TacInstruction::new_object(&object, class_name));
        if self.class_chain_has_init(class) || !args.is_empty() {
            let operands: Vec<String> = args.iter().map(|arg| self.lower_expr(arg)).collect();
            self.emit(TacInstruction::param(&object));
            for operand in &operands {
                self.emit(TacInstruction::param(operand));
            }
            self.emit(TacInstruction::call("init", operands.len() + 1));
            let discard = self.new_temp();
            self.emit(TacInstruction::assign(&discard, "R"));
        }
        object
    }

    // ------------------------------------------------------------------
    // Type probe
    // ------------------------------------------------------------------

    /// Best-effort static type of an expression, used for CONCAT
    /// selection, slot widths, and foreach element types. The analyzer
    /// has already validated the tree, so imprecision here only affects
    /// instruction choice between ADD and CONCAT.
    fn probe_type(&mut self, expr: &Expr<'_>) -> Type {
        match &expr.kind {
            ExprKind::IntLit(_) => Type::Integer,
            ExprKind::StrLit(_) => Type::Str,
            ExprKind::BoolLit(_) => Type::Boolean,
            ExprKind::NullLit => Type::Null,
            ExprKind::ArrayLit(elements) => {
                let base = elements
                    .first()
                    .map(|e| self.probe_type(e))
                    .unwrap_or(Type::Integer);
                match base {
                    Type::Array { base, dims } => Type::Array { base, dims: dims + 1 },
                    scalar => Type::array(scalar, 1),
                }
            }
            ExprKind::Identifier(name) => {
                if let Some(binding) = self.lookup_binding(*name) {
                    return binding.ty.clone();
                }
                if let Some(class) = self.current_class {
                    if let Some((_, ty)) = self.resolve_field(class, *name) {
                        return ty;
                    }
                }
                Type::Integer
            }
            ExprKind::This | ExprKind::Super => self
                .current_class
                .map(Type::Class)
                .unwrap_or(Type::Integer),
            ExprKind::New { class, .. } => Type::Class(*class),
            ExprKind::Unary { op: UnaryOp::Neg, .. } => Type::Integer,
            ExprKind::Unary { op: UnaryOp::Not, .. } => Type::Boolean,
            ExprKind::Binary { op, left, right } => match op {
                BinaryOp::Add => {
                    if self.probe_type(left) == Type::Str || self.probe_type(right) == Type::Str {
                        Type::Str
                    } else {
                        Type::Integer
                    }
                }
                BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => Type::Integer,
                _ => Type::Boolean,
            },
            ExprKind::Ternary { then_val, .. } => self.probe_type(then_val),
            ExprKind::Call { .. } => Type::Integer,
            ExprKind::Index { object, .. } => self
                .probe_type(object)
                .element_type()
                .unwrap_or(Type::Integer),
            ExprKind::Property { object, property } => {
                let object_ty = self.probe_type(object);
                if let Type::Class(class) = object_ty {
                    if let Some((_, ty)) = self.resolve_field(class, *property) {
                        return ty;
                    }
                }
                Type::Integer
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compiscript_syntax::{parse_program, Arenas, AstContext};

    fn lower(source: &str) -> String {
        let arenas = Arenas::new();
        let ctx = AstContext::new(&arenas);
        let mut interner = compiscript_base::Interner::new();
        let (program, diags) = parse_program(source, ctx, &mut interner);
        assert!(diags.is_empty(), "parse failed: {:?}", diags);
        TacGenerator::new(&interner).generate(&program).text
    }

    #[test]
    fn declaration_without_initializer_emits_nothing() {
        let text = lower("function main(): void { let a: integer; }");
        assert_eq!(text, "FUNCTION main:\nEND FUNCTION main\n");
    }

    #[test]
    fn literal_initializer_stores_to_slot() {
        let text = lower("function main(): void { let a: integer = 5; }");
        assert!(text.contains("\tfp[0] := 5\n"));
    }

    #[test]
    fn frame_offsets_grow_per_declaration() {
        let text = lower(
            "function main(): void { let a: integer; let b: integer; a = 1; b = 2; }",
        );
        assert!(text.contains("\tfp[0] := 1\n"));
        assert!(text.contains("\tfp[4] := 2\n"));
    }

    #[test]
    fn temporaries_reset_per_function() {
        let text = lower(
            "function f(): void { let a: integer; a = 1 + 2; }\n\
             function g(): void { let b: integer; b = 3 + 4; }",
        );
        assert_eq!(text.matches("t0 := ").count(), 2);
    }

    #[test]
    fn compound_initializer_aliases_to_fresh_temp() {
        let text = lower(
            "function f(a: integer, b: integer): integer { let s: integer = a + b; return s; }",
        );
        // No store to a local slot; the return reads the temporary.
        assert!(text.contains("\tt0 := fp[-1] + fp[-2]\n"));
        assert!(!text.contains("fp[0] :="));
        assert!(text.contains("\tRETURN t0\n"));
    }

    #[test]
    fn alias_is_invalidated_by_assignment() {
        let text = lower(
            "function f(a: integer): integer { let s: integer = a + 1; s = 2; return s; }",
        );
        assert!(text.contains("\tfp[0] := 2\n"));
        assert!(text.contains("\tRETURN fp[0]\n"));
    }

    #[test]
    fn global_declarations_bind_the_global_segment() {
        let text = lower("var a: integer = 3;\nfunction main(): void { let b: integer; b = a; }");
        assert!(text.contains("G[0] := 3\n"));
        assert!(text.contains("\tfp[0] := G[0]\n"));
    }

    #[test]
    fn booleans_encode_as_one_and_zero() {
        let text = lower("function f(): void { let b: boolean = true; let c: boolean = false; }");
        assert!(text.contains("\tfp[0] := 1\n"));
        assert!(text.contains("\tfp[4] := 0\n"));
    }

    #[test]
    fn string_concat_selects_concat_op_rendered_as_plus() {
        let text = lower(r#"function f(): void { let s: string = "a" + "b"; print(s); }"#);
        assert!(text.contains("\tt0 := \"a\" + \"b\"\n"));
    }

    #[test]
    fn statement_call_discards_into_unused_temp() {
        let text = lower(
            "function f(): void { }\nfunction main(): void { f(); }",
        );
        assert!(text.contains("\tCALL f,0\n\tt0 := R\n"));
    }

    #[test]
    fn constructor_call_passes_fresh_object_first() {
        let text = lower(
            "class Punto { var x: integer; function init(x: integer) { this.x = x; } }\n\
             function main(): void { let p: Punto = new Punto(7); }",
        );
        assert!(text.contains("\tt0 := new Punto\n\tPARAM t0\n\tPARAM 7\n\tCALL init,2\n"));
    }

    #[test]
    fn init_method_ends_with_return_zero() {
        let text = lower(
            "class Caja { var v: integer; function init(v: integer) { this.v = v; } }",
        );
        assert!(text.contains("FUNCTION init:\n\tfp[-1][0] := fp[-2]\n\tRETURN 0\nEND FUNCTION init\n"));
    }

    #[test]
    fn break_and_continue_target_loop_labels() {
        let text = lower(
            "function f(): void { let i: integer; i = 0; while (i < 10) { \
             if (i == 5) { break; } i = i + 1; continue; } }",
        );
        assert!(text.contains("GOTO ENDWHILE_0"));
        assert!(text.contains("GOTO STARTWHILE_0"));
    }

    #[test]
    fn array_literal_stores_elementwise() {
        let text = lower("function f(): void { let xs: integer[] = [1, 2]; }");
        assert!(text.contains("fp[0][t0] := 1"));
        assert!(text.contains("fp[0][t1] := 2"));
    }

    #[test]
    fn literal_array_index_is_routed_through_a_temp() {
        let text = lower(
            "function f(): void { let xs: integer[]; let v: integer; v = xs[0]; }",
        );
        assert!(text.contains("\tt0 := 0\n\tt1 := fp[0][t0]\n"));
    }

    #[test]
    fn do_while_jumps_back_on_true() {
        let text = lower(
            "function f(): void { let i: integer; i = 0; do { i = i + 1; } while (i < 3); }",
        );
        assert!(text.contains("IF t1 > 0 GOTO STARTWHILE_0"));
        assert!(text.contains("GOTO ENDWHILE_0"));
    }

    #[test]
    fn output_is_deterministic() {
        let source = "function main(): void { let a: integer; if (a < 1) { a = 2; } }";
        assert_eq!(lower(source), lower(source));
    }
}
