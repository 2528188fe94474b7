//! Token definitions for Volta source text

use volta_common::{Span, Spanned};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    // Literals
    Integer(i64),
    /// Stored as the source text (not parsed to `f64`) so the token carries
    /// `Eq`/`Hash` without float-comparison pitfalls; later phases parse it.
    Float(String),
    Str(String),
    RawStr(String),
    True,
    False,

    Identifier(String),

    // Keywords
    KwFn,
    KwStruct,
    KwExtern,
    KwImport,
    KwLet,
    KwMut,
    KwReturn,
    KwIf,
    KwElse,
    KwWhile,
    KwFor,
    KwIn,
    KwBreak,
    KwContinue,
    KwPub,
    KwSelf,
    KwRef,
    KwAnd,
    KwOr,
    KwNot,
    KwAddrOf,

    // Arithmetic / comparison operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Compound assignment / increment / decrement
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    PlusPlus,
    MinusMinus,

    // Assignment
    Eq,
    ColonEq,

    // Ranges
    DotDot,
    DotDotEq,

    // Misc punctuators
    Arrow,
    ColonColon,
    FatArrow,
    Dot,
    Comma,
    Colon,
    Semicolon,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    EndOfFile,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Integer(n) => write!(f, "{}", n),
            TokenType::Float(s) => write!(f, "{}", s),
            TokenType::Str(s) => write!(f, "\"{}\"", s),
            TokenType::RawStr(s) => write!(f, "r\"{}\"", s),
            TokenType::Identifier(name) => write!(f, "{}", name),
            other => {
                let text = match other {
                    TokenType::True => "true",
                    TokenType::False => "false",
                    TokenType::KwFn => "fn",
                    TokenType::KwStruct => "struct",
                    TokenType::KwExtern => "extern",
                    TokenType::KwImport => "import",
                    TokenType::KwLet => "let",
                    TokenType::KwMut => "mut",
                    TokenType::KwReturn => "return",
                    TokenType::KwIf => "if",
                    TokenType::KwElse => "else",
                    TokenType::KwWhile => "while",
                    TokenType::KwFor => "for",
                    TokenType::KwIn => "in",
                    TokenType::KwBreak => "break",
                    TokenType::KwContinue => "continue",
                    TokenType::KwPub => "pub",
                    TokenType::KwSelf => "self",
                    TokenType::KwRef => "ref",
                    TokenType::KwAnd => "and",
                    TokenType::KwOr => "or",
                    TokenType::KwNot => "not",
                    TokenType::KwAddrOf => "addrof",
                    TokenType::Plus => "+",
                    TokenType::Minus => "-",
                    TokenType::Star => "*",
                    TokenType::Slash => "/",
                    TokenType::Percent => "%",
                    TokenType::EqEq => "==",
                    TokenType::NotEq => "!=",
                    TokenType::Lt => "<",
                    TokenType::LtEq => "<=",
                    TokenType::Gt => ">",
                    TokenType::GtEq => ">=",
                    TokenType::PlusEq => "+=",
                    TokenType::MinusEq => "-=",
                    TokenType::StarEq => "*=",
                    TokenType::SlashEq => "/=",
                    TokenType::PercentEq => "%=",
                    TokenType::PlusPlus => "++",
                    TokenType::MinusMinus => "--",
                    TokenType::Eq => "=",
                    TokenType::ColonEq => ":=",
                    TokenType::DotDot => "..",
                    TokenType::DotDotEq => "..=",
                    TokenType::Arrow => "->",
                    TokenType::ColonColon => "::",
                    TokenType::FatArrow => "=>",
                    TokenType::Dot => ".",
                    TokenType::Comma => ",",
                    TokenType::Colon => ":",
                    TokenType::Semicolon => ";",
                    TokenType::LParen => "(",
                    TokenType::RParen => ")",
                    TokenType::LBrace => "{",
                    TokenType::RBrace => "}",
                    TokenType::LBracket => "[",
                    TokenType::RBracket => "]",
                    TokenType::EndOfFile => "<eof>",
                    _ => unreachable!(),
                };
                write!(f, "{}", text)
            }
        }
    }
}

/// A token with source location information.
pub type Token = Spanned<TokenType>;

/// Token classification helpers used by the parser's diagnostics.
pub trait TokenUtils {
    fn new(token_type: TokenType, span: Span) -> Self;
    fn is_keyword(&self) -> bool;
    fn is_literal(&self) -> bool;
}

impl TokenUtils for Token {
    fn new(token_type: TokenType, span: Span) -> Self {
        Spanned::new(token_type, span)
    }

    fn is_keyword(&self) -> bool {
        matches!(
            self.value,
            TokenType::KwFn
                | TokenType::KwStruct
                | TokenType::KwExtern
                | TokenType::KwImport
                | TokenType::KwLet
                | TokenType::KwMut
                | TokenType::KwReturn
                | TokenType::KwIf
                | TokenType::KwElse
                | TokenType::KwWhile
                | TokenType::KwFor
                | TokenType::KwIn
                | TokenType::KwBreak
                | TokenType::KwContinue
                | TokenType::KwPub
                | TokenType::KwSelf
                | TokenType::KwRef
                | TokenType::KwAnd
                | TokenType::KwOr
                | TokenType::KwNot
                | TokenType::KwAddrOf
        )
    }

    fn is_literal(&self) -> bool {
        matches!(
            self.value,
            TokenType::Integer(_)
                | TokenType::Float(_)
                | TokenType::Str(_)
                | TokenType::RawStr(_)
                | TokenType::True
                | TokenType::False
        )
    }
}

/// Maps a keyword spelling to its token, or `None` if `ident` is a plain identifier.
pub fn lookup_keyword(ident: &str) -> Option<TokenType> {
    Some(match ident {
        "fn" => TokenType::KwFn,
        "struct" => TokenType::KwStruct,
        "extern" => TokenType::KwExtern,
        "import" => TokenType::KwImport,
        "let" => TokenType::KwLet,
        "mut" => TokenType::KwMut,
        "return" => TokenType::KwReturn,
        "if" => TokenType::KwIf,
        "else" => TokenType::KwElse,
        "while" => TokenType::KwWhile,
        "for" => TokenType::KwFor,
        "in" => TokenType::KwIn,
        "break" => TokenType::KwBreak,
        "continue" => TokenType::KwContinue,
        "pub" => TokenType::KwPub,
        "self" => TokenType::KwSelf,
        "ref" => TokenType::KwRef,
        "and" => TokenType::KwAnd,
        "or" => TokenType::KwOr,
        "not" => TokenType::KwNot,
        "addrof" => TokenType::KwAddrOf,
        "true" => TokenType::True,
        "false" => TokenType::False,
        _ => return None,
    })
}
