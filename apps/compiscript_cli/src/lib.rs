//! Command implementation for the `compiscript` binary.
//!
//! ```text
//! compiscript program.cps                 # compile, write program.s
//! compiscript program.cps --emit tac      # write program.tac instead
//! compiscript program.cps -o out.s        # explicit output path
//! compiscript program.cps --json          # full report as JSON on stdout
//! ```
//!
//! Diagnostics go to stderr, one per line, in the stable
//! `Line l:c - message` form.

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use compiscript_codegen::{compile_source, write_output};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Three-address code listing.
    Tac,
    /// MIPS-32 assembly (default).
    Mips,
}

/// Compiscript compiler driver.
#[derive(Debug, Parser)]
#[command(name = "compiscript", version, about = "Compile Compiscript source to TAC or MIPS")]
struct Cli {
    /// Source file to compile.
    input: PathBuf,

    /// Which lowering to write out.
    #[arg(long, value_enum, default_value_t = Emit::Mips)]
    emit: Emit,

    /// Output path; defaults to the input with the extension swapped.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the full compile report as JSON on stdout instead of
    /// writing a file.
    #[arg(long)]
    json: bool,
}

/// Errors surfaced to the binary wrapper.
#[derive(Debug)]
pub enum CliError {
    Io(std::io::Error),
    CompilationFailed,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "{}", e),
            CliError::CompilationFailed => write!(f, "compilation failed"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

/// Parses arguments from the environment and runs the compiler.
pub fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let source = std::fs::read_to_string(&cli.input)?;
    let report = compile_source(&source);

    if cli.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        println!("{}", json);
        return if report.is_success() {
            Ok(())
        } else {
            Err(CliError::CompilationFailed)
        };
    }

    if !report.is_success() {
        for diagnostic in &report.diagnostics {
            eprintln!("{}", diagnostic);
        }
        return Err(CliError::CompilationFailed);
    }

    let (contents, extension) = match cli.emit {
        Emit::Tac => (report.tac.as_deref().unwrap_or(""), "tac"),
        Emit::Mips => (report.mips.as_deref().unwrap_or(""), "s"),
    };
    let output = cli
        .output
        .unwrap_or_else(|| cli.input.with_extension(extension));
    write_output(&output, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("compiscript").chain(args.iter().copied()))
            .expect("valid arguments")
    }

    #[test]
    fn default_emit_is_mips() {
        let cli = cli(&["program.cps"]);
        assert_eq!(cli.emit, Emit::Mips);
        assert!(cli.output.is_none());
        assert!(!cli.json);
    }

    #[test]
    fn emit_tac_is_selectable() {
        let cli = cli(&["program.cps", "--emit", "tac"]);
        assert_eq!(cli.emit, Emit::Tac);
    }

    #[test]
    fn compiles_a_file_to_assembly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("ok.cps");
        std::fs::write(&input, "function main(): void { print(42); }").expect("write");
        let output = dir.path().join("ok.s");
        run(cli(&[
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ]))
        .expect("compilation succeeds");
        let asm = std::fs::read_to_string(&output).expect("read");
        assert!(asm.contains(".globl main"));
        assert!(asm.contains("li $v0, 10"));
    }

    #[test]
    fn emits_tac_with_default_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("ok.cps");
        std::fs::write(&input, "function main(): void { let a: integer; a = 1; }")
            .expect("write");
        run(cli(&[input.to_str().unwrap(), "--emit", "tac"])).expect("compiles");
        let tac = std::fs::read_to_string(dir.path().join("ok.tac")).expect("read");
        assert!(tac.contains("FUNCTION main:"));
        assert!(tac.contains("\tfp[0] := 1"));
    }

    #[test]
    fn failed_compilation_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("bad.cps");
        std::fs::write(&input, "function f(): void { x = 1; }").expect("write");
        let err = run(cli(&[input.to_str().unwrap()])).unwrap_err();
        assert!(matches!(err, CliError::CompilationFailed));
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let err = run(cli(&["/nonexistent/path.cps"])).unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }
}
