//! Top-level compilation entry points.
//!
//! The pipeline is strictly staged: semantic analysis first, and only a
//! diagnostic-free tree reaches lowering. On failure the caller gets the
//! full diagnostic list and no partial TAC or MIPS output.

use std::fs::File;
use std::io::Write as _;
use std::path::Path;

use compiscript_base::{Diagnostic, Interner};
use compiscript_semantics::analyze_program;
use compiscript_syntax::{parse_program, Arenas, AstContext, Program};

use crate::mips::MipsGenerator;
use crate::report::CompileReport;
use crate::tac::{parse::TacParseError, TacGenerator, TacOutput};

/// Runs semantic analysis over an already-parsed tree.
pub fn analyze(program: &Program<'_>, interner: &mut Interner) -> Vec<Diagnostic> {
    analyze_program(program, interner).diagnostics
}

/// Lowers a tree to TAC, or returns the diagnostics that block it.
pub fn compile_to_tac<'a>(
    program: &Program<'a>,
    interner: &mut Interner,
) -> Result<TacOutput, Vec<Diagnostic>> {
    let diagnostics = analyze(program, interner);
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }
    Ok(TacGenerator::new(interner).generate(program))
}

/// Lowers a tree all the way to MIPS.
pub fn compile_to_mips<'a>(
    program: &Program<'a>,
    interner: &mut Interner,
) -> Result<CompileReport, Vec<Diagnostic>> {
    let tac = compile_to_tac(program, interner)?;
    let mips = MipsGenerator::new().generate(&tac.instructions);
    Ok(CompileReport::success(tac.text, mips))
}

/// The standalone TAC→MIPS path: parse textual TAC and emit assembly.
pub fn mips_from_tac_text(tac: &str) -> Result<String, TacParseError> {
    MipsGenerator::new().generate_from_text(tac)
}

/// Compiles source text end to end.
///
/// This is the convenience entry the CLI and UI consumers use: parse,
/// analyze, and lower, returning a self-contained report. Lexer/parser
/// diagnostics and semantic diagnostics share one list.
pub fn compile_source(source: &str) -> CompileReport {
    let arenas = Arenas::new();
    let ctx = AstContext::new(&arenas);
    let mut interner = Interner::new();
    let (program, parse_diags) = parse_program(source, ctx, &mut interner);

    let semantic_diags = analyze(&program, &mut interner);
    let diagnostics =
        compiscript_base::diagnostic::merge_deduped(&[&parse_diags, &semantic_diags]);
    if !diagnostics.is_empty() {
        return CompileReport::failure(diagnostics);
    }

    let tac = TacGenerator::new(&interner).generate(&program);
    let mips = MipsGenerator::new().generate(&tac.instructions);
    CompileReport::success(tac.text, mips)
}

/// Writes generated output to a file, holding the handle only for the
/// duration of the write.
pub fn write_output(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_source_produces_tac_and_mips() {
        let report = compile_source(
            "function main(): void { let a: integer; a = 1; print(a); }",
        );
        assert!(report.diagnostics.is_empty());
        let tac = report.tac.expect("tac");
        assert!(tac.contains("FUNCTION main:"));
        let mips = report.mips.expect("mips");
        assert!(mips.contains(".globl main"));
    }

    #[test]
    fn semantic_errors_block_lowering() {
        let report = compile_source("function f(): void { x = 1; }");
        assert!(!report.diagnostics.is_empty());
        assert!(report.tac.is_none());
        assert!(report.mips.is_none());
    }

    #[test]
    fn parse_errors_block_lowering() {
        let report = compile_source("let = ;");
        assert!(!report.diagnostics.is_empty());
        assert!(report.tac.is_none());
    }

    #[test]
    fn tac_text_path_matches_instruction_path() {
        let source = "function main(): void { let i: integer; i = 0; while (i <= 3) { i = i + 1; } }";
        let report = compile_source(source);
        let tac = report.tac.expect("tac");
        let via_text = mips_from_tac_text(&tac).expect("tac parses");
        assert_eq!(via_text, report.mips.expect("mips"));
    }

    #[test]
    fn write_output_creates_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.s");
        write_output(&path, "main:\n").expect("write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "main:\n");
    }
}
