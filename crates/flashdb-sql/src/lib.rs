//! FlashDB statement compiler
//!
//! Turns SQL text plus positional parameters into a [`CompiledStatement`]:
//! the text is scanned with a pest grammar, bind placeholders are counted
//! against the supplied values and the statement is classified so the
//! executor knows whether to expect rows, a change count, or neither.
//! Parsing and planning proper stay with the wrapped engine.

mod classify;
mod compile;
mod scanner;

pub use classify::{StatementKind, TransactionVerb};
pub use compile::{compile, placeholder_count, split, CompiledStatement, Dialect};

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Parameter mismatch: statement expects {expected} parameters, {supplied} supplied")]
    ParameterMismatch { expected: usize, supplied: usize },
}

impl CompileError {
    pub(crate) fn syntax(message: impl Into<String>, line: usize, column: usize) -> Self {
        CompileError::Syntax {
            message: message.into(),
            line,
            column,
        }
    }
}
