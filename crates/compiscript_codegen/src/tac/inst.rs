//! TAC instruction model and textual rendering.
//!
//! An instruction carries an operation, up to two operand strings, an
//! optional result, an optional label, and an optional comment. Operand
//! strings are one of:
//!
//! - integer/boolean literals (booleans encoded as `1`/`0`), quoted
//!   string literals
//! - temporaries `tN`, the return pseudo-register `R`
//! - memory references `G[off]` (global segment), `fp[off]` (frame
//!   slot; negative offsets are parameters), `fp[-1][off]` (field of
//!   `this`)
//!
//! Function boundaries are comment-carrying pseudo-instructions
//! (`FUNCTION f:` / `END FUNCTION f`) rather than dedicated ops; the
//! [`TacInstruction::function_begin`] / [`TacInstruction::function_end`]
//! constructors and the matching `is_*` accessors keep that convention
//! in one place.

use serde::{Deserialize, Serialize};
use std::fmt;

/// TAC operation vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TacOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    Concat,
    Label,
    Goto,
    IfTrue,
    IfFalse,
    Param,
    Call,
    Return,
    Print,
    Read,
    ArrayAccess,
    ArrayAssign,
    ObjectAccess,
    ObjectAssign,
    NewObject,
}

impl TacOp {
    /// Symbol used in the textual binary-operation form.
    pub fn binop_symbol(self) -> Option<&'static str> {
        Some(match self {
            TacOp::Add | TacOp::Concat => "+",
            TacOp::Sub => "-",
            TacOp::Mul => "*",
            TacOp::Div => "/",
            TacOp::Mod => "%",
            TacOp::Eq => "==",
            TacOp::Ne => "!=",
            TacOp::Lt => "<",
            TacOp::Le => "<=",
            TacOp::Gt => ">",
            TacOp::Ge => ">=",
            TacOp::And => "&&",
            TacOp::Or => "||",
            _ => return None,
        })
    }
}

/// One TAC instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TacInstruction {
    pub op: TacOp,
    pub result: Option<String>,
    pub arg1: Option<String>,
    pub arg2: Option<String>,
    pub label: Option<String>,
    pub comment: Option<String>,
}

impl TacInstruction {
    fn blank(op: TacOp) -> Self {
        Self { op, result: None, arg1: None, arg2: None, label: None, comment: None }
    }

    pub fn assign(result: impl Into<String>, arg1: impl Into<String>) -> Self {
        Self {
            result: Some(result.into()),
            arg1: Some(arg1.into()),
            ..Self::blank(TacOp::Assign)
        }
    }

    pub fn binary(
        op: TacOp,
        result: impl Into<String>,
        arg1: impl Into<String>,
        arg2: impl Into<String>,
    ) -> Self {
        debug_assert!(op.binop_symbol().is_some());
        Self {
            result: Some(result.into()),
            arg1: Some(arg1.into()),
            arg2: Some(arg2.into()),
            ..Self::blank(op)
        }
    }

    pub fn unary(op: TacOp, result: impl Into<String>, arg1: impl Into<String>) -> Self {
        debug_assert!(matches!(op, TacOp::Neg | TacOp::Not));
        Self {
            result: Some(result.into()),
            arg1: Some(arg1.into()),
            ..Self::blank(op)
        }
    }

    pub fn label(name: impl Into<String>) -> Self {
        Self { label: Some(name.into()), ..Self::blank(TacOp::Label) }
    }

    pub fn goto(target: impl Into<String>) -> Self {
        Self { label: Some(target.into()), ..Self::blank(TacOp::Goto) }
    }

    pub fn if_true(cond: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            arg1: Some(cond.into()),
            label: Some(target.into()),
            ..Self::blank(TacOp::IfTrue)
        }
    }

    pub fn if_false(cond: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            arg1: Some(cond.into()),
            label: Some(target.into()),
            ..Self::blank(TacOp::IfFalse)
        }
    }

    pub fn param(value: impl Into<String>) -> Self {
        Self { arg1: Some(value.into()), ..Self::blank(TacOp::Param) }
    }

    pub fn call(name: impl Into<String>, argc: usize) -> Self {
        Self {
            arg1: Some(name.into()),
            arg2: Some(argc.to_string()),
            ..Self::blank(TacOp::Call)
        }
    }

    pub fn ret(value: Option<String>) -> Self {
        Self { arg1: value, ..Self::blank(TacOp::Return) }
    }

    pub fn print(value: impl Into<String>) -> Self {
        Self { arg1: Some(value.into()), ..Self::blank(TacOp::Print) }
    }

    pub fn read(result: impl Into<String>) -> Self {
        Self { result: Some(result.into()), ..Self::blank(TacOp::Read) }
    }

    pub fn array_access(
        result: impl Into<String>,
        array: impl Into<String>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            result: Some(result.into()),
            arg1: Some(array.into()),
            arg2: Some(index.into()),
            ..Self::blank(TacOp::ArrayAccess)
        }
    }

    pub fn array_assign(
        array: impl Into<String>,
        index: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            result: Some(array.into()),
            arg1: Some(index.into()),
            arg2: Some(value.into()),
            ..Self::blank(TacOp::ArrayAssign)
        }
    }

    pub fn object_access(
        result: impl Into<String>,
        object: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        Self {
            result: Some(result.into()),
            arg1: Some(object.into()),
            arg2: Some(property.into()),
            ..Self::blank(TacOp::ObjectAccess)
        }
    }

    pub fn object_assign(
        object: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            result: Some(object.into()),
            arg1: Some(property.into()),
            arg2: Some(value.into()),
            ..Self::blank(TacOp::ObjectAssign)
        }
    }

    pub fn new_object(result: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            result: Some(result.into()),
            arg1: Some(class.into()),
            ..Self::blank(TacOp::NewObject)
        }
    }

    /// `FUNCTION name:` delimiter pseudo-instruction.
    pub fn function_begin(name: &str) -> Self {
        Self {
            comment: Some(format!("FUNCTION {}:", name)),
            ..Self::blank(TacOp::Assign)
        }
    }

    /// `END FUNCTION name` delimiter pseudo-instruction.
    pub fn function_end(name: &str) -> Self {
        Self {
            comment: Some(format!("END FUNCTION {}", name)),
            ..Self::blank(TacOp::Assign)
        }
    }

    /// `true` for comment-only pseudo-instructions.
    pub fn is_pseudo(&self) -> bool {
        self.comment.is_some()
            && self.op == TacOp::Assign
            && self.result.is_none()
            && self.arg1.is_none()
            && self.label.is_none()
    }

    /// The function name when this is a `FUNCTION name:` delimiter.
    pub fn as_function_begin(&self) -> Option<&str> {
        let comment = self.comment.as_deref()?;
        let rest = comment.strip_prefix("FUNCTION ")?;
        rest.strip_suffix(':')
    }

    /// The function name when this is an `END FUNCTION name` delimiter.
    pub fn as_function_end(&self) -> Option<&str> {
        self.comment.as_deref()?.strip_prefix("END FUNCTION ")
    }
}

impl fmt::Display for TacInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pseudo() {
            let comment = self.comment.as_deref().unwrap_or("");
            if self.as_function_begin().is_some() || self.as_function_end().is_some() {
                return write!(f, "{}", comment);
            }
            return write!(f, "// {}", comment);
        }

        let result = self.result.as_deref().unwrap_or("");
        let arg1 = self.arg1.as_deref().unwrap_or("");
        let arg2 = self.arg2.as_deref().unwrap_or("");
        let label = self.label.as_deref().unwrap_or("");

        match self.op {
            TacOp::Label => write!(f, "{}:", label),
            TacOp::Goto => write!(f, "GOTO {}", label),
            TacOp::IfTrue => write!(f, "IF {} > 0 GOTO {}", arg1, label),
            TacOp::IfFalse => write!(f, "IF {} <= 0 GOTO {}", arg1, label),
            TacOp::Param => write!(f, "PARAM {}", arg1),
            TacOp::Call => write!(f, "CALL {},{}", arg1, arg2),
            TacOp::Return => match &self.arg1 {
                Some(value) => write!(f, "RETURN {}", value),
                None => write!(f, "RETURN"),
            },
            TacOp::Print => write!(f, "PRINT {}", arg1),
            TacOp::Read => write!(f, "READ {}", result),
            TacOp::Assign => write!(f, "{} := {}", result, arg1),
            TacOp::Neg => write!(f, "{} := neg {}", result, arg1),
            TacOp::Not => write!(f, "{} := not {}", result, arg1),
            TacOp::ArrayAccess => write!(f, "{} := {}[{}]", result, arg1, arg2),
            TacOp::ArrayAssign => write!(f, "{}[{}] := {}", result, arg1, arg2),
            TacOp::ObjectAccess => write!(f, "{} := {}.{}", result, arg1, arg2),
            TacOp::ObjectAssign => write!(f, "{}.{} := {}", result, arg1, arg2),
            TacOp::NewObject => write!(f, "{} := new {}", result, arg1),
            op => {
                let symbol = op.binop_symbol().expect("binary op");
                write!(f, "{} := {} {} {}", result, arg1, symbol, arg2)
            }
        }
    }
}

/// Renders an instruction stream in the canonical program layout:
/// function delimiters and labels flush-left, in-function lines indented
/// by one tab, one blank line between function bodies.
pub fn render_program(instructions: &[TacInstruction]) -> String {
    let mut out = String::new();
    let mut in_function = false;
    let mut emitted_any_function = false;
    for instr in instructions {
        if instr.as_function_begin().is_some() {
            if emitted_any_function {
                out.push('\n');
            }
            out.push_str(&instr.to_string());
            out.push('\n');
            in_function = true;
            emitted_any_function = true;
            continue;
        }
        if instr.as_function_end().is_some() {
            out.push_str(&instr.to_string());
            out.push('\n');
            in_function = false;
            continue;
        }
        let flush_left = !in_function || instr.op == TacOp::Label;
        if !flush_left {
            out.push('\t');
        }
        out.push_str(&instr.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_renders_with_assignment_arrow() {
        let instr = TacInstruction::binary(TacOp::Add, "t0", "fp[0]", "fp[4]");
        assert_eq!(instr.to_string(), "t0 := fp[0] + fp[4]");
    }

    #[test]
    fn concat_renders_as_plus() {
        let instr = TacInstruction::binary(TacOp::Concat, "t1", "\"a\"", "\"b\"");
        assert_eq!(instr.to_string(), "t1 := \"a\" + \"b\"");
    }

    #[test]
    fn control_flow_shapes() {
        assert_eq!(TacInstruction::label("IF_TRUE_0").to_string(), "IF_TRUE_0:");
        assert_eq!(TacInstruction::goto("ENDWHILE_2").to_string(), "GOTO ENDWHILE_2");
        assert_eq!(
            TacInstruction::if_true("t0", "IF_TRUE_0").to_string(),
            "IF t0 > 0 GOTO IF_TRUE_0"
        );
    }

    #[test]
    fn call_and_return_shapes() {
        assert_eq!(TacInstruction::call("setv", 2).to_string(), "CALL setv,2");
        assert_eq!(TacInstruction::ret(Some("t0".into())).to_string(), "RETURN t0");
        assert_eq!(TacInstruction::ret(None).to_string(), "RETURN");
        assert_eq!(TacInstruction::param("fp[0]").to_string(), "PARAM fp[0]");
    }

    #[test]
    fn function_delimiters_round_trip_names() {
        let begin = TacInstruction::function_begin("main");
        assert_eq!(begin.as_function_begin(), Some("main"));
        assert_eq!(begin.to_string(), "FUNCTION main:");
        let end = TacInstruction::function_end("main");
        assert_eq!(end.as_function_end(), Some("main"));
        assert_eq!(end.to_string(), "END FUNCTION main");
    }

    #[test]
    fn array_and_object_shapes() {
        assert_eq!(
            TacInstruction::array_access("t0", "fp[0]", "t1").to_string(),
            "t0 := fp[0][t1]"
        );
        assert_eq!(
            TacInstruction::array_assign("fp[0]", "t1", "5").to_string(),
            "fp[0][t1] := 5"
        );
        assert_eq!(
            TacInstruction::new_object("t0", "Punto").to_string(),
            "t0 := new Punto"
        );
    }

    #[test]
    fn render_program_indents_bodies_and_separates_functions() {
        let instructions = vec![
            TacInstruction::function_begin("f"),
            TacInstruction::assign("fp[0]", "1"),
            TacInstruction::label("IF_END_0"),
            TacInstruction::function_end("f"),
            TacInstruction::function_begin("g"),
            TacInstruction::ret(Some("0".into())),
            TacInstruction::function_end("g"),
        ];
        let text = render_program(&instructions);
        let expected = "FUNCTION f:\n\tfp[0] := 1\nIF_END_0:\nEND FUNCTION f\n\nFUNCTION g:\n\tRETURN 0\nEND FUNCTION g\n";
        assert_eq!(text, expected);
    }
}
