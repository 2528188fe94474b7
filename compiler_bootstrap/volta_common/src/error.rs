//! Error handling utilities for the Volta compiler core

use thiserror::Error;

/// The main error type for the Volta compiler core.
///
/// Each variant corresponds to one pipeline phase; the driver uses these
/// to report failures that happen outside the accumulating [`crate::Diagnostics`]
/// sink, such as I/O errors while reading a module's source text.
#[derive(Error, Debug, Clone)]
pub enum VoltaError {
    #[error("lexical error: {message}")]
    LexError { message: String },

    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("HIR lowering error: {message}")]
    HirError { message: String },

    #[error("type error: {message}")]
    TypeError { message: String },

    #[error("MIR error: {message}")]
    MirError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// Result type alias for Volta compiler core operations.
pub type VoltaResult<T> = Result<T, VoltaError>;

impl VoltaError {
    pub fn lex_error(message: impl Into<String>) -> Self {
        Self::LexError { message: message.into() }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError { message: message.into() }
    }

    pub fn hir_error(message: impl Into<String>) -> Self {
        Self::HirError { message: message.into() }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError { message: message.into() }
    }

    pub fn mir_error(message: impl Into<String>) -> Self {
        Self::MirError { message: message.into() }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::IoError { message: message.into() }
    }
}
