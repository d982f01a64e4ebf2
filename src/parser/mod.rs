//! Reader for Lisp source
//!
//! A recursive descent reader that turns a token stream into data. Code is
//! data here, so the output is a runtime `Value`, not a separate AST.

use crate::common::Span;
use crate::diagnostics::{ReadError, SourceFile};
use crate::interp::symbols::SymbolTable;
use crate::interp::value::Value;
use crate::lexer::{Token, TokenKind, lex};

/// Deepest nesting of lists, vectors and quote prefixes the reader accepts
pub const MAX_NESTING: usize = 512;

/// Read a whole source file.
///
/// An empty source reads as null, a single form as itself, and several
/// forms as `(BEGIN form...)`.
pub fn read(source: &SourceFile, symbols: &mut SymbolTable) -> Result<Value, ReadError> {
    let tokens = lex(source)?;
    let mut reader = Reader::new(&tokens, source, symbols);
    reader.read_program()
}

/// Reader state
struct Reader<'a> {
    tokens: &'a [Token],
    pos: usize,
    source: &'a SourceFile,
    symbols: &'a mut SymbolTable,
    depth: usize,
}

impl<'a> Reader<'a> {
    fn new(tokens: &'a [Token], source: &'a SourceFile, symbols: &'a mut SymbolTable) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
            symbols,
            depth: 0,
        }
    }

    fn current(&self) -> &'a Token {
        let tokens = self.tokens;
        // `lex` always terminates the stream with Eof
        tokens.get(self.pos).unwrap_or(&tokens[tokens.len() - 1])
    }

    fn peek(&self) -> TokenKind {
        self.current().kind
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    fn advance(&mut self) -> &'a Token {
        let tok = self.current();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn span(&self) -> Span {
        self.current().span
    }

    // ==================== PROGRAM ====================

    fn read_program(&mut self) -> Result<Value, ReadError> {
        let mut forms = Vec::new();
        while !self.at(TokenKind::Eof) {
            forms.push(self.read_form()?);
        }

        Ok(match forms.len() {
            0 => Value::Null,
            1 => forms.pop().unwrap_or(Value::Null),
            _ => {
                let begin = Value::Symbol(self.symbols.keywords().begin);
                Value::cons(begin, Value::list(forms))
            }
        })
    }

    // ==================== FORMS ====================

    fn read_form(&mut self) -> Result<Value, ReadError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::LParen => self.nested(tok, |r| r.read_list(tok.span)),
            TokenKind::HashParen => self.nested(tok, |r| r.read_vector(tok.span)),
            TokenKind::RParen => Err(ReadError::UnexpectedParen {
                span: tok.span.into(),
                src: self.source.to_named_source(),
            }),
            TokenKind::Dot => Err(ReadError::UnexpectedDot {
                span: tok.span.into(),
                src: self.source.to_named_source(),
            }),
            TokenKind::Quote
            | TokenKind::Quasiquote
            | TokenKind::Unquote
            | TokenKind::UnquoteSplicing => self.nested(tok, |r| r.read_prefixed(tok)),
            TokenKind::IntLit => Ok(read_int(&tok.text)),
            TokenKind::RealLit => tok
                .text
                .parse::<f64>()
                .map(Value::Real)
                .map_err(|_| self.bad_token(tok)),
            TokenKind::StringLit => Ok(Value::string(unescape(&tok.text))),
            TokenKind::CharLit => self.read_char(tok),
            TokenKind::True => Ok(Value::Symbol(self.symbols.keywords().t)),
            TokenKind::False => Ok(Value::Null),
            TokenKind::Symbol => Ok(Value::Symbol(self.symbols.intern(&tok.text))),
            TokenKind::Eof => Err(ReadError::ExpectedParen {
                span: tok.span.into(),
                src: self.source.to_named_source(),
            }),
        }
    }

    /// Read one level deeper, failing once `MAX_NESTING` is reached
    fn nested(
        &mut self,
        tok: &Token,
        read: impl FnOnce(&mut Self) -> Result<Value, ReadError>,
    ) -> Result<Value, ReadError> {
        if self.depth >= MAX_NESTING {
            return Err(ReadError::TooDeep {
                limit: MAX_NESTING,
                span: tok.span.into(),
                src: self.source.to_named_source(),
            });
        }
        self.depth += 1;
        let result = read(self);
        self.depth -= 1;
        result
    }

    /// `'x` → `(QUOTE x)`, and likewise for the quasiquote family
    fn read_prefixed(&mut self, tok: &Token) -> Result<Value, ReadError> {
        if self.at(TokenKind::Eof) || self.at(TokenKind::RParen) {
            return Err(ReadError::BadQuote {
                span: tok.span.into(),
                src: self.source.to_named_source(),
            });
        }

        let keywords = self.symbols.keywords();
        let head = match tok.kind {
            TokenKind::Quote => keywords.quote,
            TokenKind::Quasiquote => keywords.quasiquote,
            TokenKind::Unquote => keywords.unquote,
            _ => keywords.unquote_splicing,
        };
        let inner = self.read_form()?;
        Ok(Value::list(vec![Value::Symbol(head), inner]))
    }

    fn read_list(&mut self, open: Span) -> Result<Value, ReadError> {
        let mut items = Vec::new();

        loop {
            match self.peek() {
                TokenKind::Eof => {
                    return Err(ReadError::ExpectedParen {
                        span: open.into(),
                        src: self.source.to_named_source(),
                    });
                }
                TokenKind::RParen => {
                    self.advance();
                    return Ok(Value::list(items));
                }
                TokenKind::Dot => {
                    let dot = self.advance().span;
                    if items.is_empty() {
                        return Err(ReadError::UnexpectedDot {
                            span: dot.into(),
                            src: self.source.to_named_source(),
                        });
                    }
                    if self.at(TokenKind::RParen) || self.at(TokenKind::Eof) {
                        return Err(self.malformed_dot(dot));
                    }
                    let tail = self.read_form()?;
                    match self.peek() {
                        TokenKind::RParen => {
                            self.advance();
                            return Ok(Value::list_with_tail(items, tail));
                        }
                        TokenKind::Eof => {
                            return Err(ReadError::ExpectedParen {
                                span: open.into(),
                                src: self.source.to_named_source(),
                            });
                        }
                        _ => return Err(self.malformed_dot(dot)),
                    }
                }
                _ => items.push(self.read_form()?),
            }
        }
    }

    fn read_vector(&mut self, open: Span) -> Result<Value, ReadError> {
        let mut items = Vec::new();

        loop {
            match self.peek() {
                TokenKind::Eof => {
                    return Err(ReadError::ExpectedParen {
                        span: open.into(),
                        src: self.source.to_named_source(),
                    });
                }
                TokenKind::RParen => {
                    self.advance();
                    return Ok(Value::vector(items));
                }
                TokenKind::Dot => {
                    return Err(ReadError::UnexpectedDot {
                        span: self.span().into(),
                        src: self.source.to_named_source(),
                    });
                }
                _ => items.push(self.read_form()?),
            }
        }
    }

    fn read_char(&self, tok: &Token) -> Result<Value, ReadError> {
        let name = &tok.text[2..];
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(Value::Char(c));
        }

        match name.to_ascii_lowercase().as_str() {
            "space" => Ok(Value::Char(' ')),
            "newline" | "linefeed" => Ok(Value::Char('\n')),
            "tab" => Ok(Value::Char('\t')),
            "nul" => Ok(Value::Char('\0')),
            _ => Err(ReadError::BadChar {
                text: tok.text.clone(),
                span: tok.span.into(),
                src: self.source.to_named_source(),
            }),
        }
    }

    fn malformed_dot(&self, dot: Span) -> ReadError {
        ReadError::MalformedDot {
            span: dot.merge(self.span()).into(),
            src: self.source.to_named_source(),
        }
    }

    fn bad_token(&self, tok: &Token) -> ReadError {
        ReadError::BadToken {
            text: tok.text.clone(),
            span: tok.span.into(),
            src: self.source.to_named_source(),
        }
    }
}

/// Integers that overflow `i64` read as reals
fn read_int(text: &str) -> Value {
    match text.parse::<i64>() {
        Ok(n) => Value::Int(n),
        Err(_) => Value::Real(text.parse::<f64>().unwrap_or(f64::NAN)),
    }
}

/// Strip the quotes from a string literal and process escapes
fn unescape(text: &str) -> String {
    let inner = &text[1..text.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#""a\nb""#), "a\nb");
        assert_eq!(unescape(r#""say \"hi\"""#), "say \"hi\"");
        assert_eq!(unescape(r#""back\\slash""#), "back\\slash");
    }

    #[test]
    fn test_huge_int_reads_as_real() {
        assert_eq!(read_int("42"), Value::Int(42));
        assert!(matches!(read_int("99999999999999999999"), Value::Real(_)));
    }
}
