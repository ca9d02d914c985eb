//! Built-in runtime for toodle scripts.
//!
//! Source goes through a lexer, a recursive-descent parser and a lowering pass into bytecode
//! chunks (`setup` and `step`), which a small stack VM executes against turtle state.

pub(crate) mod ast;
pub(crate) mod bytecode;
pub(crate) mod compile;
pub(crate) mod error;
pub(crate) mod lexer;
pub(crate) mod parser;
pub(crate) mod runtime;
pub(crate) mod vm;
