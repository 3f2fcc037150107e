//! # compiscript_base
//!
//! Pure structural atoms shared by every stage of the Compiscript
//! compiler: string interning, source locations, accumulated
//! diagnostics, and the bump arena the parse tree lives in.
//!
//! Nothing in this crate knows about the language itself; the layering is
//!
//! ```text
//! compiscript-base ◀── compiscript-syntax ◀── compiscript-semantics ◀── compiscript-codegen
//! ```

pub mod arena;
pub mod diagnostic;
pub mod intern;
pub mod loc;

pub use arena::Arena;
pub use diagnostic::{Diagnostic, Result};
pub use intern::{Interner, Symbol, SymbolEq};
pub use loc::Loc;
