//! Lexer for Lisp source text

mod tokens;

pub use tokens::{Token, TokenKind};

use crate::common::Span;
use crate::diagnostics::{ReadError, SourceFile};
use logos::Logos;

/// Tokenize a source file. The returned stream always ends with `Eof`.
pub fn lex(source: &SourceFile) -> Result<Vec<Token>, ReadError> {
    let content = &*source.content;
    let mut lexer = TokenKind::lexer(content);
    let mut tokens = Vec::new();

    while let Some(kind) = lexer.next() {
        let span = Span::from(lexer.span());
        let text = lexer.slice();
        match kind {
            Ok(kind) => tokens.push(Token {
                kind,
                span,
                text: text.to_string(),
            }),
            Err(()) if text.starts_with('"') => {
                return Err(ReadError::UnterminatedString {
                    span: Span::new(span.start, content.len()).into(),
                    src: source.to_named_source(),
                });
            }
            Err(()) => {
                return Err(ReadError::BadToken {
                    text: text.to_string(),
                    span: span.into(),
                    src: source.to_named_source(),
                });
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::point(content.len()),
        text: String::new(),
    });

    Ok(tokens)
}
