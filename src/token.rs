//! Token kinds and the reserved-word/punctuation vocabulary shared by the
//! lexer, parser and code generator.

use std::fmt::{self, Display};

use once_cell::sync::Lazy;

/// A source position. Only the line is surfaced in error text (matching the
/// single-line-counter error taxonomy of the reference implementation), but
/// the column is carried alongside it for tooling that wants it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.line)
    }
}

/// The closed enumeration of token kinds. Ids are stable for the lifetime of
/// the process; parser and codegen dispatch on these variants directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    Number,

    Plus,
    Minus,
    Times,
    Slash,
    Eq,
    Neq,
    Lss,
    Leq,
    Gtr,
    Geq,
    Becomes,
    LParen,
    RParen,
    Comma,
    Period,
    Semicolon,

    Const,
    Var,
    Procedure,
    Call,
    Begin,
    End,
    If,
    Then,
    Else,
    While,
    Do,
    Read,
    Write,
    Odd,

    /// Emitted past end-of-stream when peeking.
    Null,
}

impl TokenKind {
    /// Maximum length of an `Ident` lexeme, per the identifier limit in §6.
    pub const MAX_IDENT_LEN: usize = 11;
    /// Maximum length of a `Number` lexeme (decimal digits), per §6.
    pub const MAX_NUMBER_LEN: usize = 5;
}

/// The reserved-word table, consulted in insertion order as specified in
/// §4.1: the first alnum run that matches a reserved word becomes that
/// word's token; everything else is an `Ident`.
pub static RESERVED_WORDS: Lazy<Vec<(&'static str, TokenKind)>> = Lazy::new(|| {
    vec![
        ("const", TokenKind::Const),
        ("var", TokenKind::Var),
        ("procedure", TokenKind::Procedure),
        ("call", TokenKind::Call),
        ("begin", TokenKind::Begin),
        ("end", TokenKind::End),
        ("if", TokenKind::If),
        ("then", TokenKind::Then),
        ("else", TokenKind::Else),
        ("while", TokenKind::While),
        ("do", TokenKind::Do),
        ("read", TokenKind::Read),
        ("write", TokenKind::Write),
        ("odd", TokenKind::Odd),
    ]
});

pub fn lookup_reserved(lexeme: &str) -> Option<TokenKind> {
    RESERVED_WORDS
        .iter()
        .find(|(word, _)| *word == lexeme)
        .map(|(_, kind)| *kind)
}

/// A single immutable token emitted by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            position,
        }
    }

    /// The sentinel token returned when peeking past the end of the stream.
    pub fn null() -> Self {
        Self {
            kind: TokenKind::Null,
            lexeme: String::new(),
            position: Position::default(),
        }
    }

    /// Parses the lexeme of a `Number` token. Panics (via `expect`) if called
    /// on a non-number token, which would be a codegen bug.
    pub fn number_value(&self) -> i32 {
        self.lexeme
            .parse()
            .expect("Number token must carry a valid decimal lexeme")
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.lexeme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_words_resolve_in_order() {
        assert_eq!(lookup_reserved("const"), Some(TokenKind::Const));
        assert_eq!(lookup_reserved("odd"), Some(TokenKind::Odd));
        assert_eq!(lookup_reserved("foobar"), None);
    }
}
