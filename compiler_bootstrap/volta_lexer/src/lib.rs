//! Lexical analyzer for Volta source text.
//!
//! Turns a byte string into a token stream terminated by `EndOfFile`.

pub mod char_stream;
pub mod lexer;
pub mod token;

pub use char_stream::*;
pub use lexer::*;
pub use token::*;
