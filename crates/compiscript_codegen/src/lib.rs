//! # compiscript_codegen
//!
//! The Compiscript back end: lowering of validated parse trees to
//! Three-Address Code and of TAC to MIPS-32 assembly.
//!
//! ## Pipeline
//!
//! ```text
//! Parse tree ──▶ semantic analysis ──▶ diagnostics
//!                      │ (empty)
//!                      ▼
//!               ┌─────────────┐      ┌──────────────┐
//!               │ TacGenerator│ ───▶ │ MipsGenerator│ ───▶ .s text
//!               └─────────────┘      └──────────────┘
//!                      │                    ▲
//!                      ▼                    │
//!                  .tac text ──────▶ tac::parse (text path)
//! ```
//!
//! The MIPS generator accepts either the in-memory instruction stream or
//! TAC text re-parsed through [`tac::parse`], so the two halves can be
//! exercised independently.

pub mod compile;
pub mod mips;
pub mod report;
pub mod tac;

pub use compile::{
    analyze, compile_source, compile_to_mips, compile_to_tac, mips_from_tac_text, write_output,
};
pub use mips::MipsGenerator;
pub use report::CompileReport;
pub use tac::{TacGenerator, TacInstruction, TacOp, TacOutput};
