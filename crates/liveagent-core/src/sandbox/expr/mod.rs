//! Minimal expression language for post-processing live data.
//!
//! Arithmetic, comparisons, boolean logic, literals, subscripts, field access
//! and calls to a fixed set of pure builtins. Values are JSON values; the only
//! names in scope are the ones the caller passes in.

pub mod ast;
mod builtins;
mod eval;
mod lexer;
mod parser;

pub use ast::Expr;
pub use builtins::SAFE_BUILTINS;
pub use eval::{evaluate, EvalError};
pub use parser::parse;

/// Syntax error with the byte offset where parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (at offset {offset})")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}
