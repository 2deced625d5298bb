//! Tokenizer for the query DSL.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{QueryError, Result};

/// Token types produced by the lexer. Keywords are plain identifiers; the
/// parser matches them by exact (case-sensitive) text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Param(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Star,
    Eof,
}

impl TokenKind {
    /// Human-readable description used in error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("'{name}'"),
            TokenKind::Str(s) => format!("string {s:?}"),
            TokenKind::Int(i) => format!("number {i}"),
            TokenKind::Float(x) => format!("number {x}"),
            TokenKind::Param(name) => format!("parameter @{name}"),
            TokenKind::LParen => "'('".into(),
            TokenKind::RParen => "')'".into(),
            TokenKind::LBrace => "'{'".into(),
            TokenKind::RBrace => "'}'".into(),
            TokenKind::LBracket => "'['".into(),
            TokenKind::RBracket => "']'".into(),
            TokenKind::Comma => "','".into(),
            TokenKind::Colon => "':'".into(),
            TokenKind::Eq => "'='".into(),
            TokenKind::Gt => "'>'".into(),
            TokenKind::Gte => "'>='".into(),
            TokenKind::Lt => "'<'".into(),
            TokenKind::Lte => "'<='".into(),
            TokenKind::Star => "'*'".into(),
            TokenKind::Eof => "end of query".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    /// Byte offset of the first character of the token.
    pub(crate) offset: usize,
}

pub(crate) struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            pos: 0,
        }
    }

    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn advance(&mut self) -> Option<char> {
        let (pos, ch) = self.chars.next()?;
        self.pos = pos + ch.len_utf8();
        Some(ch)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.input[self.pos..].chars();
        ahead.next();
        ahead.next()
    }

    fn error(&self, message: impl Into<String>, at: usize) -> QueryError {
        QueryError::syntax(message, &self.input[at..])
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.advance();
        }
    }

    fn single(&mut self, kind: TokenKind, offset: usize) -> Token {
        self.advance();
        Token { kind, offset }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        let start = self.pos;

        let Some(ch) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                offset: start,
            });
        };

        match ch {
            '"' | '\'' => self.read_string(ch),
            '@' => self.read_param(),
            c if c.is_ascii_digit() => self.read_number(),
            '-' | '+' if matches!(self.peek_second(), Some(d) if d.is_ascii_digit()) => {
                self.read_number()
            }
            c if c.is_alphabetic() || c == '_' => Ok(self.read_identifier()),
            '(' => Ok(self.single(TokenKind::LParen, start)),
            ')' => Ok(self.single(TokenKind::RParen, start)),
            '{' => Ok(self.single(TokenKind::LBrace, start)),
            '}' => Ok(self.single(TokenKind::RBrace, start)),
            '[' => Ok(self.single(TokenKind::LBracket, start)),
            ']' => Ok(self.single(TokenKind::RBracket, start)),
            ',' => Ok(self.single(TokenKind::Comma, start)),
            ':' => Ok(self.single(TokenKind::Colon, start)),
            '=' => Ok(self.single(TokenKind::Eq, start)),
            '*' => Ok(self.single(TokenKind::Star, start)),
            '>' | '<' => {
                self.advance();
                let or_equal = self.peek() == Some('=');
                if or_equal {
                    self.advance();
                }
                let kind = match (ch, or_equal) {
                    ('>', false) => TokenKind::Gt,
                    ('>', true) => TokenKind::Gte,
                    ('<', false) => TokenKind::Lt,
                    _ => TokenKind::Lte,
                };
                Ok(Token {
                    kind,
                    offset: start,
                })
            }
            other => Err(self.error(format!("unexpected character '{other}'"), start)),
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token> {
        let start = self.pos;
        self.advance();
        let mut value = String::new();

        loop {
            match self.advance() {
                None => return Err(self.error("unterminated string", start)),
                Some(ch) if ch == quote => break,
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some(other) => value.push(other),
                    None => return Err(self.error("unterminated escape sequence", start)),
                },
                Some(ch) => value.push(ch),
            }
        }

        Ok(Token {
            kind: TokenKind::Str(value),
            offset: start,
        })
    }

    fn read_param(&mut self) -> Result<Token> {
        let start = self.pos;
        self.advance();
        let name_start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_alphanumeric() || ch == '_') {
            self.advance();
        }
        if self.pos == name_start {
            return Err(self.error("expected parameter name after '@'", start));
        }
        Ok(Token {
            kind: TokenKind::Param(self.input[name_start..self.pos].to_owned()),
            offset: start,
        })
    }

    fn read_digits(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            self.advance();
        }
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.advance();
        }
        self.read_digits();

        let mut decimal = false;
        if self.peek() == Some('.') && matches!(self.peek_second(), Some(d) if d.is_ascii_digit())
        {
            decimal = true;
            self.advance();
            self.read_digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let mut ahead = self.input[self.pos..].chars().skip(1);
            let exponent_follows = match ahead.next() {
                Some('+' | '-') => matches!(ahead.next(), Some(d) if d.is_ascii_digit()),
                Some(d) => d.is_ascii_digit(),
                None => false,
            };
            if exponent_follows {
                decimal = true;
                self.advance();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.advance();
                }
                self.read_digits();
            }
        }

        let literal = &self.input[start..self.pos];
        let kind = if decimal {
            TokenKind::Float(
                literal
                    .parse()
                    .map_err(|_| self.error("invalid decimal literal", start))?,
            )
        } else {
            TokenKind::Int(
                literal
                    .parse()
                    .map_err(|_| self.error("integer literal out of range", start))?,
            )
        };
        Ok(Token {
            kind,
            offset: start,
        })
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_alphanumeric() || ch == '_' || ch == '.') {
            self.advance();
        }
        Token {
            kind: TokenKind::Ident(self.input[start..self.pos].to_owned()),
            offset: start,
        }
    }
}
