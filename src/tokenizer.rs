// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2025, tql authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Turns TQL query source into a stream of spanned tokens.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

/// A half-open byte range within the query source.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }

    /// The smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// An error that can occur while tokenizing a query
#[derive(Debug, Error)]
pub enum LexError {
    #[error("Unterminated string literal at {0}")]
    UnterminatedString(Span),
    #[error("Unexpected character '{0}' at {1}")]
    UnexpectedCharacter(char, Span),
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnterminatedString(span) => *span,
            LexError::UnexpectedCharacter(_, span) => *span,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    At,           // @
    Dot,          // .
    Hash,         // #
    Dollar,       // $
    Tilde,        // ~
    Bang,         // !
    Question,     // ?
    Star,         // *
    Plus,         // +
    Bar,          // |
    BarBar,       // ||
    AmpAmp,       // &&
    LParen,       // (
    RParen,       // )
    LBracket,     // [
    RBracket,     // ]
    LBrace,       // {
    RBrace,       // }
    Gt,           // >
    GtGt,         // >>
    Colon,        // :
    ColonColon,   // ::
    Comma,        // ,
    EqEq,         // ==
    BangEq,       // !=
    TildeTilde,   // ~~
    BangTilde,    // !~
}

impl TokenKind {
    /// The canonical spelling, used in error messages.
    pub fn spelling(&self) -> &str {
        match self {
            TokenKind::Ident(_) => "identifier",
            TokenKind::Str(_) => "string",
            TokenKind::At => "@",
            TokenKind::Dot => ".",
            TokenKind::Hash => "#",
            TokenKind::Dollar => "$",
            TokenKind::Tilde => "~",
            TokenKind::Bang => "!",
            TokenKind::Question => "?",
            TokenKind::Star => "*",
            TokenKind::Plus => "+",
            TokenKind::Bar => "|",
            TokenKind::BarBar => "||",
            TokenKind::AmpAmp => "&&",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Gt => ">",
            TokenKind::GtGt => ">>",
            TokenKind::Colon => ":",
            TokenKind::ColonColon => "::",
            TokenKind::Comma => ",",
            TokenKind::EqEq => "==",
            TokenKind::BangEq => "!=",
            TokenKind::TildeTilde => "~~",
            TokenKind::BangTilde => "!~",
        }
    }
}

/// Tokenizes a complete query.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Tokenizer::new(source).run()
}

struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    offset: usize,
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_ident(c: char) -> bool {
    c == '_' || c == '-' || c.is_ascii_alphanumeric()
}

impl<'a> Tokenizer<'a> {
    fn new(source: &'a str) -> Tokenizer<'a> {
        Tokenizer {
            chars: source.chars().peekable(),
            offset: 0,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn next(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        self.offset += ch.len_utf8();
        Some(ch)
    }

    /// Consumes the next char if it equals `expected`.
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.next();
            true
        } else {
            false
        }
    }

    fn run(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            while let Some(ch) = self.peek() {
                if !ch.is_whitespace() {
                    break;
                }
                self.next();
            }
            let start = self.offset;
            let ch = match self.next() {
                Some(ch) => ch,
                None => break,
            };
            let kind = match ch {
                '@' => TokenKind::At,
                '.' => TokenKind::Dot,
                '#' => TokenKind::Hash,
                '$' => TokenKind::Dollar,
                '?' => TokenKind::Question,
                '*' => TokenKind::Star,
                '+' => TokenKind::Plus,
                ',' => TokenKind::Comma,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '>' => {
                    if self.eat('>') {
                        TokenKind::GtGt
                    } else {
                        TokenKind::Gt
                    }
                }
                ':' => {
                    if self.eat(':') {
                        TokenKind::ColonColon
                    } else {
                        TokenKind::Colon
                    }
                }
                '|' => {
                    if self.eat('|') {
                        TokenKind::BarBar
                    } else {
                        TokenKind::Bar
                    }
                }
                '~' => {
                    if self.eat('~') {
                        TokenKind::TildeTilde
                    } else {
                        TokenKind::Tilde
                    }
                }
                '!' => {
                    if self.eat('=') {
                        TokenKind::BangEq
                    } else if self.eat('~') {
                        TokenKind::BangTilde
                    } else {
                        TokenKind::Bang
                    }
                }
                '=' => {
                    if self.eat('=') {
                        TokenKind::EqEq
                    } else {
                        return Err(LexError::UnexpectedCharacter(
                            '=',
                            Span::new(start, self.offset),
                        ));
                    }
                }
                '&' => {
                    if self.eat('&') {
                        TokenKind::AmpAmp
                    } else {
                        return Err(LexError::UnexpectedCharacter(
                            '&',
                            Span::new(start, self.offset),
                        ));
                    }
                }
                '\'' | '"' => self.string(ch, start)?,
                ch if is_ident_start(ch) => {
                    let mut name = String::new();
                    name.push(ch);
                    while let Some(ch) = self.peek() {
                        if !is_ident(ch) {
                            break;
                        }
                        name.push(ch);
                        self.next();
                    }
                    TokenKind::Ident(name)
                }
                ch => {
                    return Err(LexError::UnexpectedCharacter(
                        ch,
                        Span::new(start, self.offset),
                    ))
                }
            };
            tokens.push(Token {
                kind,
                span: Span::new(start, self.offset),
            });
        }
        Ok(tokens)
    }

    fn string(&mut self, quote: char, start: usize) -> Result<TokenKind, LexError> {
        let mut value = String::new();
        let mut escape = false;
        loop {
            let ch = match self.next() {
                Some(ch) => ch,
                None => return Err(LexError::UnterminatedString(Span::new(start, self.offset))),
            };
            if escape {
                escape = false;
                match ch {
                    '0' => value.push('\0'),
                    'n' => value.push('\n'),
                    'r' => value.push('\r'),
                    't' => value.push('\t'),
                    '\\' | '\'' | '"' => value.push(ch),
                    // Unknown escapes keep their backslash, so regex literals like '\d' pass
                    // through unharmed.
                    _ => {
                        value.push('\\');
                        value.push(ch);
                    }
                }
            } else if ch == '\\' {
                escape = true;
            } else if ch == quote {
                return Ok(TokenKind::Str(value));
            } else {
                value.push(ch);
            }
        }
    }
}
