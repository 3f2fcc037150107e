//! Compiscript compiler CLI - standalone binary.
//!
//! Thin wrapper around [`compiscript_cli::run_cli`]: command logic lives
//! in the library crate for testability, the binary only maps errors to
//! exit codes.
//!
//! # Exit Codes
//!
//! - `0` - Success
//! - `1` - Compilation failed or an I/O error occurred

fn main() {
    if let Err(e) = compiscript_cli::run_cli() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
