//! MIPS-32 emission from Three-Address Code.
//!
//! Two passes per function:
//!
//! 1. **Analysis**: function ranges are recognized by the
//!    `FUNCTION f:` / `END FUNCTION f` pseudo-instructions; a backward
//!    scan computes per-instruction next-use tables for every allocator
//!    variable (temporaries `tN`, frame slots `fp[k]`, globals `G[k]`).
//! 2. **Emission**: descriptor-based `getReg` allocation over
//!    `$t0..$t9` then `$s0..$s7`, with spill victims chosen by the
//!    next-use cost model; SPIM/MARS calling convention; leaf functions
//!    (bodies with no `CALL`; `PRINT` lowers to syscalls, not `jal`)
//!    omit the prologue/epilogue entirely.
//!
//! ## Conventions
//!
//! - truth is strictly-greater-than-zero: `IF t > 0` lowers to `bgtz`
//! - parameters: `fp[-k]` maps to `$a(k-1)` for k ≤ 4, to
//!   `(4·(k−4)+8)($fp)` beyond
//! - globals get `.data` words (`G_k: .word 0`) with write-through
//!   stores, so they survive across calls and functions
//! - the final `jr $ra` of `main` is rewritten to the exit syscall, and
//!   a minimal `main` is appended when the program has none

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use super::tac::inst::{TacInstruction, TacOp};
use super::tac::parse::{parse_tac, TacParseError};

const TEMP_REGS: [&str; 10] =
    ["$t0", "$t1", "$t2", "$t3", "$t4", "$t5", "$t6", "$t7", "$t8", "$t9"];
const SAVED_REGS: [&str; 8] = ["$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7"];
const ARG_REGS: [&str; 4] = ["$a0", "$a1", "$a2", "$a3"];
/// Dedicated scratch for synthesized sequences; never allocated.
const SCRATCH: &str = "$v1";

/// Cost assigned to a variable with no further use (best spill victim).
const DEAD_COST: i64 = 1_000_000;
/// Penalty for handing out a register from the non-preferred pool.
const POOL_PENALTY: i64 = 100_000;

/// TAC-to-MIPS translator.
pub struct MipsGenerator {
    text: Vec<String>,
    string_labels: HashMap<String, String>,
    global_labels: Vec<String>,
    object_blocks: usize,
    has_main: bool,
}

impl Default for MipsGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MipsGenerator {
    pub fn new() -> Self {
        Self {
            text: Vec::new(),
            string_labels: HashMap::new(),
            global_labels: Vec::new(),
            object_blocks: 0,
            has_main: false,
        }
    }

    /// Generates assembly from the textual TAC form.
    pub fn generate_from_text(&mut self, tac: &str) -> Result<String, TacParseError> {
        let instructions = parse_tac(tac)?;
        Ok(self.generate(&instructions))
    }

    /// Generates assembly from an instruction stream.
    pub fn generate(&mut self, instructions: &[TacInstruction]) -> String {
        self.text.clear();
        self.string_labels.clear();
        self.global_labels.clear();
        self.object_blocks = 0;
        self.has_main = false;

        self.collect_data(instructions);

        // Split into top-level code and function bodies.
        let mut index = 0;
        while index < instructions.len() {
            let instr = &instructions[index];
            if let Some(name) = instr.as_function_begin() {
                let name = name.to_string();
                let end = instructions[index + 1..]
                    .iter()
                    .position(|i| i.as_function_end() == Some(name.as_str()))
                    .map(|offset| index + 1 + offset)
                    .unwrap_or(instructions.len());
                self.emit_function(&name, &instructions[index + 1..end]);
                index = end + 1;
            } else {
                // Top-level instructions run in no frame; emit them with
                // a leaf-style emitter.
                let end = instructions[index..]
                    .iter()
                    .position(|i| i.as_function_begin().is_some())
                    .map(|offset| index + offset)
                    .unwrap_or(instructions.len());
                if instructions[index..end].iter().any(|i| !i.is_pseudo()) {
                    self.emit_function("", &instructions[index..end]);
                }
                index = end;
            }
        }

        self.format_output()
    }

    /// Collects `.data` material: the newline string, one word per
    /// global slot, string literals, and static object blocks.
    fn collect_data(&mut self, instructions: &[TacInstruction]) {
        let mut globals: HashSet<u32> = HashSet::new();
        for instr in instructions {
            for operand in [&instr.result, &instr.arg1, &instr.arg2].into_iter().flatten() {
                if let Some(offset) = parse_global(operand) {
                    globals.insert(offset);
                }
                if operand.starts_with('"') && !self.string_labels.contains_key(operand) {
                    let label = format!("str_{}", self.string_labels.len());
                    self.string_labels.insert(operand.clone(), label);
                }
            }
            if instr.op == TacOp::NewObject {
                self.object_blocks += 1;
            }
        }
        let mut offsets: Vec<u32> = globals.into_iter().collect();
        offsets.sort_unstable();
        self.global_labels = offsets.into_iter().map(|o| format!("G_{}", o)).collect();
    }

    fn emit_function(&mut self, name: &str, body: &[TacInstruction]) {
        if name == "main" {
            self.has_main = true;
        }
        let mut emitter = FunctionEmitter::new(name, body, self);
        emitter.run();
        let lines = emitter.finish();
        self.text.extend(lines);
    }

    fn string_label(&self, literal: &str) -> Option<&str> {
        self.string_labels.get(literal).map(String::as_str)
    }

    fn format_output(&self) -> String {
        let mut out = String::new();
        out.push_str(".data\n");
        out.push_str("    .align 2\n");
        out.push_str("newline: .asciiz \"\\n\"\n");
        for label in &self.global_labels {
            let _ = writeln!(out, "{}: .word 0", label);
        }
        let mut strings: Vec<(&String, &String)> = self.string_labels.iter().collect();
        strings.sort_by(|a, b| a.1.cmp(b.1));
        for (literal, label) in strings {
            let _ = writeln!(out, "{}: .asciiz {}", label, literal);
        }
        for block in 0..self.object_blocks {
            let _ = writeln!(out, "obj_{}: .space 32", block);
        }
        out.push('\n');
        out.push_str(".text\n");
        out.push_str("    .globl main\n\n");
        for line in &self.text {
            out.push_str(line);
            out.push('\n');
        }
        if !self.has_main {
            out.push_str("\nmain:\n");
            out.push_str("    li $v0, 10\n");
            out.push_str("    syscall\n");
        }
        out
    }
}

// ---------------------------------------------------------------------
// Operand classification
// ---------------------------------------------------------------------

fn parse_int(text: &str) -> Option<i64> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// `G[k]` offset.
fn parse_global(operand: &str) -> Option<u32> {
    operand.strip_prefix("G[")?.strip_suffix(']')?.parse().ok()
}

/// Positive `fp[k]` local-slot offset.
fn parse_local(operand: &str) -> Option<u32> {
    let inner = operand.strip_prefix("fp[")?.strip_suffix(']')?;
    if inner.contains("][") {
        return None;
    }
    inner.parse().ok()
}

/// Negative `fp[-k]` parameter index (returns `k >= 1`).
fn parse_param(operand: &str) -> Option<u32> {
    let inner = operand.strip_prefix("fp[-")?.strip_suffix(']')?;
    if inner.contains("][") {
        return None;
    }
    inner.parse().ok()
}

/// `base[off]` field reference: `(base, offset)`.
fn parse_field(operand: &str) -> Option<(&str, u32)> {
    let inner = operand.strip_suffix(']')?;
    let split = inner.rfind("][")?;
    let base = &inner[..split + 1];
    let offset = inner[split + 2..].parse().ok()?;
    if base.starts_with("fp[") || base.starts_with("G[") {
        Some((base, offset))
    } else {
        None
    }
}

/// `true` for operands the register allocator owns: temporaries, local
/// frame slots, globals.
fn is_alloc_var(operand: &str) -> bool {
    if operand
        .strip_prefix('t')
        .is_some_and(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
    {
        return true;
    }
    parse_local(operand).is_some() || parse_global(operand).is_some()
}

/// Allocator variables read by an operand string (a field reference
/// reads its base pointer).
fn operand_vars(operand: &str) -> Vec<String> {
    if is_alloc_var(operand) {
        return vec![operand.to_string()];
    }
    if let Some((base, _)) = parse_field(operand) {
        if is_alloc_var(base) {
            return vec![base.to_string()];
        }
    }
    Vec::new()
}

fn instruction_uses(instr: &TacInstruction) -> Vec<String> {
    let mut uses = Vec::new();
    let mut add = |operand: &Option<String>| {
        if let Some(op) = operand {
            if op != "R" {
                uses.extend(operand_vars(op));
            }
        }
    };
    match instr.op {
        TacOp::ArrayAssign | TacOp::ObjectAssign => {
            add(&instr.result);
            add(&instr.arg1);
            add(&instr.arg2);
        }
        TacOp::Call => {}
        _ => {
            add(&instr.arg1);
            add(&instr.arg2);
            // A destination that is a field reference reads its base.
            if let Some(result) = &instr.result {
                if !is_alloc_var(result) {
                    uses.extend(operand_vars(result));
                }
            }
        }
    }
    uses
}

fn instruction_defs(instr: &TacInstruction) -> Vec<String> {
    match instr.op {
        TacOp::ArrayAssign | TacOp::ObjectAssign => Vec::new(),
        _ => instr
            .result
            .as_deref()
            .filter(|r| is_alloc_var(r))
            .map(|r| vec![r.to_string()])
            .unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------
// Per-function emitter
// ---------------------------------------------------------------------

#[derive(Default, Clone)]
struct VarHome {
    reg: Option<&'static str>,
    mem: Option<String>,
}

struct FunctionEmitter<'a> {
    name: &'a str,
    body: &'a [TacInstruction],
    parent: &'a MipsGenerator,
    leaf: bool,
    frame_size: u32,
    /// Per-instruction map: variable -> index of its next use strictly
    /// after that instruction.
    next_use: Vec<HashMap<String, usize>>,
    reg_vars: HashMap<&'static str, HashSet<String>>,
    homes: HashMap<String, VarHome>,
    spill_offset: i32,
    param_count: usize,
    pending_stack_params: Vec<String>,
    lines: Vec<String>,
}

impl<'a> FunctionEmitter<'a> {
    fn new(name: &'a str, body: &'a [TacInstruction], parent: &'a MipsGenerator) -> Self {
        let leaf = !body.iter().any(|i| i.op == TacOp::Call);
        let locals = body
            .iter()
            .flat_map(|i| [&i.result, &i.arg1, &i.arg2])
            .flatten()
            .filter_map(|op| {
                parse_local(op).or_else(|| parse_field(op).and_then(|(b, _)| parse_local(b)))
            })
            .max()
            .map(|max| max + 4)
            .unwrap_or(0);
        let frame_size = 8 + locals;

        let mut emitter = Self {
            name,
            body,
            parent,
            leaf,
            frame_size,
            next_use: Vec::new(),
            reg_vars: HashMap::new(),
            homes: HashMap::new(),
            spill_offset: 0,
            param_count: 0,
            pending_stack_params: Vec::new(),
            lines: Vec::new(),
        };
        emitter.analyze_next_use();
        emitter
    }

    /// Backward scan attaching to each instruction the next-use index of
    /// every variable live after it.
    fn analyze_next_use(&mut self) {
        let mut state: HashMap<String, usize> = HashMap::new();
        let mut table = vec![HashMap::new(); self.body.len()];
        for index in (0..self.body.len()).rev() {
            table[index] = state.clone();
            for def in instruction_defs(&self.body[index]) {
                state.remove(&def);
            }
            for used in instruction_uses(&self.body[index]) {
                state.insert(used, index);
            }
        }
        self.next_use = table;
    }

    fn emit(&mut self, line: impl Into<String>) {
        self.lines.push(format!("    {}", line.into()));
    }

    fn emit_label(&mut self, label: &str) {
        self.lines.push(format!("{}:", label));
    }

    fn run(&mut self) {
        if !self.name.is_empty() {
            self.emit_label(self.name);
        }
        if !self.leaf && !self.name.is_empty() {
            let frame = self.frame_size;
            self.emit(format!("addi $sp, $sp, -{}", frame));
            self.emit("sw $ra, 4($sp)");
            self.emit("sw $fp, 0($sp)");
            self.emit("move $fp, $sp");
        }
        for index in 0..self.body.len() {
            self.emit_instruction(index);
        }
        self.emit_epilogue();
    }

    fn emit_epilogue(&mut self) {
        if self.name.is_empty() {
            return;
        }
        if !self.leaf {
            self.emit("lw $ra, 4($sp)");
            self.emit("lw $fp, 0($sp)");
            let frame = self.frame_size;
            self.emit(format!("addi $sp, $sp, {}", frame));
        }
        if self.name == "main" {
            self.emit("li $v0, 10");
            self.emit("syscall");
        } else {
            self.emit("jr $ra");
        }
    }

    fn finish(self) -> Vec<String> {
        let mut lines = self.lines;
        lines.push(String::new());
        lines
    }

    // ------------------------------------------------------------------
    // Register allocation
    // ------------------------------------------------------------------

    fn reg_of(&self, var: &str) -> Option<&'static str> {
        let home = self.homes.get(var)?;
        let reg = home.reg?;
        // Both descriptors must agree for the binding to count.
        if self.reg_vars.get(reg).is_some_and(|vars| vars.contains(var)) {
            Some(reg)
        } else {
            None
        }
    }

    /// Descriptor-based register selection with next-use spilling.
    fn get_reg(&mut self, var: &str, index: usize, avoid: &[&str]) -> &'static str {
        if let Some(reg) = self.reg_of(var) {
            return reg;
        }

        // Prefer a free temporary, then a free saved register.
        for &reg in TEMP_REGS.iter().chain(SAVED_REGS.iter()) {
            if avoid.contains(&reg) {
                continue;
            }
            if self.reg_vars.get(reg).map_or(true, HashSet::is_empty) {
                self.bind(reg, var);
                return reg;
            }
        }

        // Everything is occupied: pick the spill victim with the highest
        // cost (furthest next use; dead variables cost most of all; the
        // non-preferred pool is penalized).
        let mut victim: Option<(&'static str, i64)> = None;
        for &reg in TEMP_REGS.iter().chain(SAVED_REGS.iter()) {
            if avoid.contains(&reg) {
                continue;
            }
            let vars = match self.reg_vars.get(reg) {
                Some(vars) if !vars.is_empty() => vars,
                _ => continue,
            };
            let mut cost = 0i64;
            for held in vars {
                let this_cost = match self.next_use[index].get(held) {
                    Some(next) => (*next as i64) - (index as i64),
                    None => DEAD_COST,
                };
                cost = cost.max(this_cost);
            }
            if SAVED_REGS.contains(&reg) {
                cost -= POOL_PENALTY;
            }
            if victim.map_or(true, |(_, best)| cost > best) {
                victim = Some((reg, cost));
            }
        }
        let (reg, _) = victim.expect("register file cannot be fully pinned");
        self.spill(reg);
        self.bind(reg, var);
        reg
    }

    fn bind(&mut self, reg: &'static str, var: &str) {
        self.reg_vars.entry(reg).or_default().insert(var.to_string());
        self.homes.entry(var.to_string()).or_default().reg = Some(reg);
    }

    /// Evicts a register, storing every variable that has no current
    /// stack home.
    fn spill(&mut self, reg: &'static str) {
        let vars: Vec<String> = self
            .reg_vars
            .get(reg)
            .map(|vars| {
                let mut sorted: Vec<String> = vars.iter().cloned().collect();
                sorted.sort();
                sorted
            })
            .unwrap_or_default();
        for var in vars {
            let needs_store = self
                .homes
                .get(&var)
                .map_or(true, |home| home.mem.is_none());
            if needs_store {
                let slot = if let Some(offset) = parse_global(&var) {
                    format!("G_{}", offset)
                } else {
                    self.spill_offset -= 4;
                    format!("{}($fp)", self.spill_offset)
                };
                self.emit(format!("sw {}, {}", reg, slot));
                self.homes.entry(var.clone()).or_default().mem = Some(slot);
            }
            self.homes.entry(var).or_default().reg = None;
        }
        self.reg_vars.insert(reg, HashSet::new());
    }

    /// Materializes a read of an allocator variable into its register,
    /// loading from its memory home on a miss.
    fn use_var(&mut self, var: &str, index: usize, avoid: &[&str]) -> &'static str {
        if let Some(reg) = self.reg_of(var) {
            return reg;
        }
        let mem = self
            .homes
            .get(var)
            .and_then(|home| home.mem.clone())
            .or_else(|| parse_global(var).map(|offset| format!("G_{}", offset)));
        let reg = self.get_reg(var, index, avoid);
        if let Some(mem) = mem {
            self.emit(format!("lw {}, {}", reg, mem));
            self.homes.entry(var.to_string()).or_default().mem = Some(mem);
        }
        reg
    }

    /// Target register for a definition; the old memory copy becomes
    /// stale, and globals are written through after the instruction.
    fn def_var(&mut self, var: &str, index: usize, avoid: &[&str]) -> &'static str {
        let reg = self.get_reg(var, index, avoid);
        // The register now holds this variable alone.
        let evicted: Vec<String> = self
            .reg_vars
            .get(reg)
            .map(|vars| vars.iter().filter(|v| *v != var).cloned().collect())
            .unwrap_or_default();
        for other in evicted {
            self.reg_vars.get_mut(reg).expect("bound above").remove(&other);
            if let Some(home) = self.homes.get_mut(&other) {
                home.reg = None;
            }
        }
        if let Some(home) = self.homes.get_mut(var) {
            home.mem = None;
        }
        reg
    }

    /// Write-through for globals after a definition.
    fn store_global_if_needed(&mut self, var: &str, reg: &'static str) {
        if let Some(offset) = parse_global(var) {
            let label = format!("G_{}", offset);
            self.emit(format!("sw {}, {}", reg, label));
            self.homes.entry(var.to_string()).or_default().mem = Some(label);
        }
    }

    // ------------------------------------------------------------------
    // Operand materialization
    // ------------------------------------------------------------------

    /// Loads any TAC operand into a register, using `SCRATCH` for forms
    /// the allocator does not own.
    fn operand_reg(&mut self, operand: &str, index: usize, avoid: &[&str]) -> &'static str {
        if is_alloc_var(operand) {
            return self.use_var(operand, index, avoid);
        }
        if let Some(value) = parse_int(operand) {
            self.emit(format!("li {}, {}", SCRATCH, value));
            return SCRATCH;
        }
        if let Some(k) = parse_param(operand) {
            if (k as usize) <= ARG_REGS.len() {
                return ARG_REGS[(k - 1) as usize];
            }
            let offset = 4 * (k - 4) + 8;
            self.emit(format!("lw {}, {}($fp)", SCRATCH, offset));
            return SCRATCH;
        }
        if let Some((base, offset)) = parse_field(operand) {
            let base_reg = self.base_reg(base, index, avoid);
            self.emit(format!("lw {}, {}({})", SCRATCH, offset, base_reg));
            return SCRATCH;
        }
        if operand.starts_with('"') {
            if let Some(label) = self.parent.string_label(operand) {
                let label = label.to_string();
                self.emit(format!("la {}, {}", SCRATCH, label));
            }
            return SCRATCH;
        }
        // Unknown operand form; treat as zero.
        self.emit(format!("li {}, 0", SCRATCH));
        SCRATCH
    }

    /// Parks a `SCRATCH`-materialized value in an allocatable register
    /// so the next materialization cannot clobber it. The synthetic
    /// `@stage` name is released before every instruction.
    fn stabilize(&mut self, reg: &'static str, index: usize, avoid: &[&str]) -> &'static str {
        if reg != SCRATCH {
            return reg;
        }
        let staged = self.get_reg("@stage", index, avoid);
        self.emit(format!("move {}, {}", staged, SCRATCH));
        staged
    }

    fn release_stage(&mut self) {
        if let Some(home) = self.homes.remove("@stage") {
            if let Some(reg) = home.reg {
                if let Some(vars) = self.reg_vars.get_mut(reg) {
                    vars.remove("@stage");
                }
            }
        }
    }

    /// Register holding the object pointer of a field reference base.
    fn base_reg(&mut self, base: &str, index: usize, avoid: &[&str]) -> &'static str {
        if let Some(k) = parse_param(base) {
            if (k as usize) <= ARG_REGS.len() {
                return ARG_REGS[(k - 1) as usize];
            }
        }
        if is_alloc_var(base) {
            return self.use_var(base, index, avoid);
        }
        self.operand_reg(base, index, avoid)
    }

    /// Stores a computed value into a non-allocator destination (field
    /// reference or parameter slot).
    fn store_to(&mut self, dest: &str, value_reg: &'static str, index: usize) {
        if let Some((base, offset)) = parse_field(dest) {
            // Materializing the base may need the scratch register too.
            let value_reg = self.stabilize(value_reg, index, &[]);
            let base_reg = self.base_reg(base, index, &[value_reg]);
            self.emit(format!("sw {}, {}({})", value_reg, offset, base_reg));
            return;
        }
        if let Some(k) = parse_param(dest) {
            if (k as usize) <= ARG_REGS.len() {
                self.emit(format!("move {}, {}", ARG_REGS[(k - 1) as usize], value_reg));
            } else {
                let offset = 4 * (k - 4) + 8;
                self.emit(format!("sw {}, {}($fp)", value_reg, offset));
            }
        }
    }

    // ------------------------------------------------------------------
    // Instruction emission
    // ------------------------------------------------------------------

    fn emit_instruction(&mut self, index: usize) {
        self.release_stage();
        let instr = &self.body[index];
        if instr.is_pseudo() {
            return;
        }
        match instr.op {
            TacOp::Label => {
                let label = instr.label.clone().unwrap_or_default();
                self.emit_label(&label);
            }
            TacOp::Goto => {
                let label = instr.label.clone().unwrap_or_default();
                self.emit(format!("j {}", label));
            }
            TacOp::IfTrue => {
                let cond = instr.arg1.clone().unwrap_or_default();
                let label = instr.label.clone().unwrap_or_default();
                let reg = self.operand_reg(&cond, index, &[]);
                self.emit(format!("bgtz {}, {}", reg, label));
            }
            TacOp::IfFalse => {
                let cond = instr.arg1.clone().unwrap_or_default();
                let label = instr.label.clone().unwrap_or_default();
                let reg = self.operand_reg(&cond, index, &[]);
                self.emit(format!("blez {}, {}", reg, label));
            }
            TacOp::Assign => self.emit_assign(index),
            TacOp::Add | TacOp::Sub | TacOp::Concat => self.emit_addsub(index),
            TacOp::Mul => self.emit_muldiv(index, "mflo", true),
            TacOp::Div => self.emit_muldiv(index, "mflo", false),
            TacOp::Mod => self.emit_muldiv(index, "mfhi", false),
            TacOp::Neg => self.emit_neg(index),
            TacOp::Not => self.emit_not(index),
            TacOp::Eq | TacOp::Ne | TacOp::Lt | TacOp::Le | TacOp::Gt | TacOp::Ge => {
                self.emit_compare(index)
            }
            TacOp::And | TacOp::Or => self.emit_logical(index),
            TacOp::Param => self.emit_param(index),
            TacOp::Call => self.emit_call(index),
            TacOp::Return => self.emit_return(index),
            TacOp::Print => self.emit_print(index),
            TacOp::Read => self.emit_read(index),
            TacOp::ArrayAccess => self.emit_array_access(index),
            TacOp::ArrayAssign => self.emit_array_assign(index),
            TacOp::NewObject => self.emit_new_object(index),
            TacOp::ObjectAccess | TacOp::ObjectAssign => {
                // Name-based property forms carry no offsets; nothing to
                // emit at this level.
                self.emit(format!("# {}", instr));
            }
        }
    }

    /// Result register for the instruction's destination, handling both
    /// allocator variables and memory destinations.
    fn with_dest(&mut self, index: usize, avoid: &[&str], produce: impl FnOnce(&mut Self, &'static str)) {
        let dest = self.body[index].result.clone().unwrap_or_default();
        if is_alloc_var(&dest) {
            let reg = self.def_var(&dest, index, avoid);
            produce(self, reg);
            self.store_global_if_needed(&dest, reg);
        } else {
            produce(self, SCRATCH);
            self.store_to(&dest, SCRATCH, index);
        }
    }

    fn emit_assign(&mut self, index: usize) {
        let instr = &self.body[index];
        let source = instr.arg1.clone().unwrap_or_default();
        let dest = instr.result.clone().unwrap_or_default();

        // Memory destination: materialize the source and store straight
        // through.
        if !is_alloc_var(&dest) {
            let src_reg = if source == "R" {
                "$v0"
            } else {
                self.operand_reg(&source, index, &[])
            };
            self.store_to(&dest, src_reg, index);
            return;
        }

        if source == "R" {
            self.with_dest(index, &[], |this, reg| {
                this.emit(format!("move {}, $v0", reg));
            });
            return;
        }
        if let Some(value) = parse_int(&source) {
            self.with_dest(index, &[], |this, reg| {
                this.emit(format!("li {}, {}", reg, value));
            });
            return;
        }
        let src_reg = self.operand_reg(&source, index, &[]);
        self.with_dest(index, &[src_reg], |this, reg| {
            if reg != src_reg {
                this.emit(format!("move {}, {}", reg, src_reg));
            }
        });
    }

    fn emit_addsub(&mut self, index: usize) {
        let instr = &self.body[index];
        let op = instr.op;
        let lhs = instr.arg1.clone().unwrap_or_default();
        let rhs = instr.arg2.clone().unwrap_or_default();
        let lhs_reg = self.operand_reg(&lhs, index, &[]);

        // Immediate operand within the i16 range folds into addi.
        if let Some(value) = parse_int(&rhs) {
            let imm = if op == TacOp::Sub { -value } else { value };
            if (-32768..=32767).contains(&imm) {
                self.with_dest(index, &[lhs_reg], |this, reg| {
                    this.emit(format!("addi {}, {}, {}", reg, lhs_reg, imm));
                });
                return;
            }
        }
        let lhs_reg = self.stabilize(lhs_reg, index, &[]);
        let rhs_reg = self.operand_reg(&rhs, index, &[lhs_reg]);
        let mnemonic = if op == TacOp::Sub { "sub" } else { "add" };
        self.with_dest(index, &[lhs_reg, rhs_reg], |this, reg| {
            this.emit(format!("{} {}, {}, {}", mnemonic, reg, lhs_reg, rhs_reg));
        });
    }

    fn emit_muldiv(&mut self, index: usize, move_from: &'static str, is_mul: bool) {
        let instr = &self.body[index];
        let lhs = instr.arg1.clone().unwrap_or_default();
        let rhs = instr.arg2.clone().unwrap_or_default();
        let lhs_reg = self.operand_reg(&lhs, index, &[]);
        let lhs_reg = self.stabilize(lhs_reg, index, &[]);
        let rhs_reg = self.operand_reg(&rhs, index, &[lhs_reg]);
        if is_mul {
            self.emit(format!("mult {}, {}", lhs_reg, rhs_reg));
        } else {
            self.emit(format!("div {}, {}", lhs_reg, rhs_reg));
        }
        self.with_dest(index, &[lhs_reg, rhs_reg], |this, reg| {
            this.emit(format!("{} {}", move_from, reg));
        });
    }

    fn emit_neg(&mut self, index: usize) {
        let operand = self.body[index].arg1.clone().unwrap_or_default();
        let reg = self.operand_reg(&operand, index, &[]);
        self.with_dest(index, &[reg], |this, dest| {
            this.emit(format!("sub {}, $zero, {}", dest, reg));
        });
    }

    fn emit_not(&mut self, index: usize) {
        let operand = self.body[index].arg1.clone().unwrap_or_default();
        let reg = self.operand_reg(&operand, index, &[]);
        self.with_dest(index, &[reg], |this, dest| {
            this.emit(format!("sltu {}, $zero, {}", dest, reg));
            this.emit(format!("xori {}, {}, 1", dest, dest));
        });
    }

    fn emit_compare(&mut self, index: usize) {
        let instr = &self.body[index];
        let op = instr.op;
        let lhs = instr.arg1.clone().unwrap_or_default();
        let rhs = instr.arg2.clone().unwrap_or_default();
        let lhs_reg = self.operand_reg(&lhs, index, &[]);

        // slti shortcut for `<` against a small immediate.
        if op == TacOp::Lt {
            if let Some(value) = parse_int(&rhs) {
                if (-32768..=32767).contains(&value) {
                    self.with_dest(index, &[lhs_reg], |this, reg| {
                        this.emit(format!("slti {}, {}, {}", reg, lhs_reg, value));
                    });
                    return;
                }
            }
        }

        let lhs_reg = self.stabilize(lhs_reg, index, &[]);
        let rhs_reg = self.operand_reg(&rhs, index, &[lhs_reg]);
        self.with_dest(index, &[lhs_reg, rhs_reg], |this, reg| match op {
            TacOp::Lt => this.emit(format!("slt {}, {}, {}", reg, lhs_reg, rhs_reg)),
            TacOp::Gt => this.emit(format!("slt {}, {}, {}", reg, rhs_reg, lhs_reg)),
            TacOp::Le => {
                this.emit(format!("slt {}, {}, {}", reg, rhs_reg, lhs_reg));
                this.emit(format!("xori {}, {}, 1", reg, reg));
            }
            TacOp::Ge => {
                this.emit(format!("slt {}, {}, {}", reg, lhs_reg, rhs_reg));
                this.emit(format!("xori {}, {}, 1", reg, reg));
            }
            TacOp::Eq => {
                this.emit(format!("sub {}, {}, {}", SCRATCH, lhs_reg, rhs_reg));
                this.emit(format!("sltiu {}, {}, 1", reg, SCRATCH));
            }
            TacOp::Ne => {
                this.emit(format!("sub {}, {}, {}", SCRATCH, lhs_reg, rhs_reg));
                this.emit(format!("sltu {}, $zero, {}", reg, SCRATCH));
            }
            _ => unreachable!("not a comparison"),
        });
    }

    fn emit_logical(&mut self, index: usize) {
        let instr = &self.body[index];
        let mnemonic = if instr.op == TacOp::And { "and" } else { "or" };
        let lhs = instr.arg1.clone().unwrap_or_default();
        let rhs = instr.arg2.clone().unwrap_or_default();
        let lhs_reg = self.operand_reg(&lhs, index, &[]);
        let lhs_reg = self.stabilize(lhs_reg, index, &[]);
        let rhs_reg = self.operand_reg(&rhs, index, &[lhs_reg]);
        let rhs_reg = self.stabilize(rhs_reg, index, &[lhs_reg]);
        self.with_dest(index, &[lhs_reg, rhs_reg], |this, reg| {
            this.emit(format!("sltu {}, $zero, {}", SCRATCH, lhs_reg));
            this.emit(format!("sltu {}, $zero, {}", reg, rhs_reg));
            this.emit(format!("{} {}, {}, {}", mnemonic, reg, SCRATCH, reg));
        });
    }

    fn emit_param(&mut self, index: usize) {
        let operand = self.body[index].arg1.clone().unwrap_or_default();
        let position = self.param_count;
        self.param_count += 1;
        if position < ARG_REGS.len() {
            let target = ARG_REGS[position];
            if let Some(value) = parse_int(&operand) {
                self.emit(format!("li {}, {}", target, value));
            } else {
                let reg = self.operand_reg(&operand, index, &[]);
                if reg != target {
                    self.emit(format!("move {}, {}", target, reg));
                }
            }
        } else {
            // Stack-passed arguments are placed once the call reserves
            // its region.
            self.pending_stack_params.push(operand);
        }
    }

    fn emit_call(&mut self, index: usize) {
        let instr = &self.body[index];
        let callee = instr.arg1.clone().unwrap_or_default();
        let argc: usize = instr
            .arg2
            .as_deref()
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);

        // Registers whose variables still have a use after this call
        // must survive it.
        let mut saved: Vec<&'static str> = Vec::new();
        for &reg in TEMP_REGS.iter().chain(SAVED_REGS.iter()) {
            let live = self.reg_vars.get(reg).is_some_and(|vars| {
                vars.iter().any(|var| self.next_use[index].contains_key(var))
            });
            if live {
                saved.push(reg);
            }
        }

        let stack_params = argc.saturating_sub(ARG_REGS.len());
        let total = (stack_params + saved.len()) * 4;
        if total > 0 {
            self.emit(format!("addi $sp, $sp, -{}", total));
        }

        let pending = std::mem::take(&mut self.pending_stack_params);
        for (slot, operand) in pending.iter().enumerate() {
            if let Some(value) = parse_int(operand) {
                self.emit(format!("li {}, {}", SCRATCH, value));
                self.emit(format!("sw {}, {}($sp)", SCRATCH, slot * 4));
            } else {
                let reg = self.operand_reg(operand, index, &[]);
                self.emit(format!("sw {}, {}($sp)", reg, slot * 4));
            }
        }

        for (slot, reg) in saved.iter().enumerate() {
            self.emit(format!("sw {}, {}($sp)", reg, (stack_params + slot) * 4));
        }

        self.emit(format!("jal {}", callee));

        for (slot, reg) in saved.iter().enumerate() {
            self.emit(format!("lw {}, {}($sp)", reg, (stack_params + slot) * 4));
        }
        if total > 0 {
            self.emit(format!("addi $sp, $sp, {}", total));
        }

        // Unsaved registers are clobbered by the callee.
        for &reg in TEMP_REGS.iter().chain(SAVED_REGS.iter()) {
            if saved.contains(&reg) {
                continue;
            }
            if let Some(vars) = self.reg_vars.remove(reg) {
                for var in vars {
                    if let Some(home) = self.homes.get_mut(&var) {
                        home.reg = None;
                    }
                }
            }
        }

        self.param_count = 0;
    }

    fn emit_return(&mut self, index: usize) {
        let Some(value) = self.body[index].arg1.clone() else {
            return;
        };
        if let Some(imm) = parse_int(&value) {
            self.emit(format!("li $v0, {}", imm));
            return;
        }
        let reg = self.operand_reg(&value, index, &[]);
        self.emit(format!("move $v0, {}", reg));
    }

    fn emit_print(&mut self, index: usize) {
        let value = self.body[index].arg1.clone().unwrap_or_default();
        if let Some(imm) = parse_int(&value) {
            self.emit(format!("li $a0, {}", imm));
        } else {
            let reg = self.operand_reg(&value, index, &[]);
            if reg != "$a0" {
                self.emit(format!("move $a0, {}", reg));
            }
        }
        self.emit("li $v0, 1");
        self.emit("syscall");
        self.emit("li $v0, 4");
        self.emit("la $a0, newline");
        self.emit("syscall");
    }

    fn emit_read(&mut self, index: usize) {
        self.emit("li $v0, 5");
        self.emit("syscall");
        self.with_dest(index, &[], |this, reg| {
            this.emit(format!("move {}, $v0", reg));
        });
    }

    fn emit_array_access(&mut self, index: usize) {
        let instr = &self.body[index];
        let array = instr.arg1.clone().unwrap_or_default();
        let idx = instr.arg2.clone().unwrap_or_default();
        let base_reg = self.operand_reg(&array, index, &[]);
        let base_reg = self.stabilize(base_reg, index, &[]);
        let idx_reg = self.operand_reg(&idx, index, &[base_reg]);
        self.emit(format!("sll {}, {}, 2", SCRATCH, idx_reg));
        self.emit(format!("add {}, {}, {}", SCRATCH, base_reg, SCRATCH));
        self.with_dest(index, &[base_reg, idx_reg], |this, reg| {
            this.emit(format!("lw {}, 0({})", reg, SCRATCH));
        });
    }

    fn emit_array_assign(&mut self, index: usize) {
        let instr = &self.body[index];
        let array = instr.result.clone().unwrap_or_default();
        let idx = instr.arg1.clone().unwrap_or_default();
        let value = instr.arg2.clone().unwrap_or_default();
        let value_reg = self.operand_reg(&value, index, &[]);
        let value_reg = self.stabilize(value_reg, index, &[]);
        let base_reg = self.operand_reg(&array, index, &[value_reg]);
        let base_reg = self.stabilize(base_reg, index, &[value_reg]);
        let idx_reg = self.operand_reg(&idx, index, &[value_reg, base_reg]);
        self.emit(format!("sll {}, {}, 2", SCRATCH, idx_reg));
        self.emit(format!("add {}, {}, {}", SCRATCH, base_reg, SCRATCH));
        self.emit(format!("sw {}, 0({})", value_reg, SCRATCH));
    }

    fn emit_new_object(&mut self, index: usize) {
        // Static per-site allocation keeps object code inside the
        // supported syscall set.
        let block = self
            .body
            .iter()
            .take(index)
            .filter(|i| i.op == TacOp::NewObject)
            .count();
        let label = format!("obj_{}", block);
        self.with_dest(index, &[], |this, reg| {
            this.emit(format!("la {}, {}", reg, label));
        });
    }
}
