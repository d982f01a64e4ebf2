//! Token definitions for the s-expression lexer

use crate::common::Span;
use logos::Logos;
use serde::{Deserialize, Serialize};

/// A token with its kind, span, and text
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text: String,
}

/// Token kinds recognized by the lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Logos, Serialize, Deserialize)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r";[^\n]*")]
pub enum TokenKind {
    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("#(")]
    HashParen,

    // Reader macros
    #[token("'")]
    Quote,
    #[token("`")]
    Quasiquote,
    #[token(",")]
    Unquote,
    #[token(",@")]
    UnquoteSplicing,
    #[token(".")]
    Dot,

    // Booleans
    #[token("#t")]
    True,
    #[token("#f")]
    False,

    // Literals
    #[regex(r"[+-]?[0-9]+", priority = 3)]
    IntLit,
    #[regex(
        r"[+-]?([0-9]+\.[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?|[+-]?[0-9]+[eE][+-]?[0-9]+",
        priority = 3
    )]
    RealLit,
    #[regex(r#""([^"\\]|\\.)*""#)]
    StringLit,
    #[regex(r"#\\([a-zA-Z]+|.)")]
    CharLit,

    // Anything else that is not a delimiter reads as a symbol
    #[regex(r#"[^ \t\r\n\f()'`,";#][^ \t\r\n\f()'`,";]*"#, priority = 1)]
    Symbol,

    // Special
    Eof,
}

impl TokenKind {
    /// Check if this token is a literal
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::IntLit
                | TokenKind::RealLit
                | TokenKind::StringLit
                | TokenKind::CharLit
                | TokenKind::True
                | TokenKind::False
        )
    }

    /// Check if this token is a quote-style prefix
    pub fn is_prefix(&self) -> bool {
        matches!(
            self,
            TokenKind::Quote
                | TokenKind::Quasiquote
                | TokenKind::Unquote
                | TokenKind::UnquoteSplicing
        )
    }

    /// Get the string representation of the token
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::HashParen => "#(",
            TokenKind::Quote => "'",
            TokenKind::Quasiquote => "`",
            TokenKind::Unquote => ",",
            TokenKind::UnquoteSplicing => ",@",
            TokenKind::Dot => ".",
            TokenKind::True => "#t",
            TokenKind::False => "#f",
            TokenKind::IntLit => "<int>",
            TokenKind::RealLit => "<real>",
            TokenKind::StringLit => "<string>",
            TokenKind::CharLit => "<char>",
            TokenKind::Symbol => "<symbol>",
            TokenKind::Eof => "<eof>",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
