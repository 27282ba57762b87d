//! DFA-style lexer: consumes source once, left to right, never backing up
//! more than one character (see `spec.md` §4.1).

use std::fmt::{self, Display};
use std::iter::Peekable;
use std::str::Chars;

use crate::token::{lookup_reserved, Position, Token, TokenKind};

/// The closed lexer error taxonomy from `spec.md` §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    NameTooLong,
    NumTooLong,
    NonletterVarInitial,
    InvSym,
    NoSourceCode,
}

impl Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            LexErrorKind::NameTooLong => "identifier is longer than 11 characters",
            LexErrorKind::NumTooLong => "number is longer than 5 digits",
            LexErrorKind::NonletterVarInitial => "number literal contains a non-digit character",
            LexErrorKind::InvSym => "invalid symbol",
            LexErrorKind::NoSourceCode => "no source code provided",
        };
        f.write_str(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub line: usize,
}

impl Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {})", self.kind, self.line)
    }
}

impl std::error::Error for LexError {}

/// The tokens accumulated before a lex failure, plus the failure itself.
/// Callers (see `spec.md` §4.1 "Failure") may discard the partial list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexFailure {
    pub tokens: Vec<Token>,
    pub error: LexError,
}

pub type LexOutcome = Result<Vec<Token>, LexFailure>;

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    tokens: Vec<Token>,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            tokens: Vec::new(),
            // Starts at 0, incremented on each newline consumed (`spec.md`
            // §8 scenario 5: a one-line source with no newline reports
            // errors at line 0).
            line: 0,
            col: 1,
        }
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            col: self.col,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let next = self.chars.next();
        if let Some(ch) = next {
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        next
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn fail(&self, kind: LexErrorKind) -> LexFailure {
        LexFailure {
            tokens: self.tokens.clone(),
            error: LexError {
                kind,
                line: self.line,
            },
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn run(&mut self) -> Result<(), LexFailure> {
        loop {
            self.skip_whitespace();

            let Some(next) = self.peek() else {
                return Ok(());
            };

            if next.is_ascii_alphabetic() {
                self.lex_alpha()?;
            } else if next.is_ascii_digit() {
                self.lex_digit()?;
            } else {
                self.lex_special()?;
            }
        }
    }

    /// ALPHA state: greedily consume `ALPHA | DIGIT`, stopping at the first
    /// delimiter without consuming it. Resolves the Open Question in
    /// `spec.md` §9: the offending (12th+) character is never consumed, and
    /// overlong identifiers are reported based on the full run already
    /// bounded by the first non-alnum character.
    fn lex_alpha(&mut self) -> Result<(), LexFailure> {
        let position = self.position();
        let mut lexeme = String::new();

        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric()) {
            lexeme.push(self.bump().unwrap());
        }

        if lexeme.len() > TokenKind::MAX_IDENT_LEN {
            return Err(self.fail(LexErrorKind::NameTooLong));
        }

        let kind = lookup_reserved(&lexeme).unwrap_or(TokenKind::Ident);
        self.tokens.push(Token::new(kind, lexeme, position));
        Ok(())
    }

    /// DIGIT state: greedily consume `ALPHA | DIGIT`. Any letter in the run
    /// is `NONLETTER_VAR_INITIAL`; more than 5 digits is `NUM_TOO_LONG`.
    fn lex_digit(&mut self) -> Result<(), LexFailure> {
        let position = self.position();
        let mut lexeme = String::new();

        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric()) {
            lexeme.push(self.bump().unwrap());
        }

        if lexeme.chars().any(|c| c.is_ascii_alphabetic()) {
            return Err(self.fail(LexErrorKind::NonletterVarInitial));
        }

        if lexeme.len() > TokenKind::MAX_NUMBER_LEN {
            return Err(self.fail(LexErrorKind::NumTooLong));
        }

        self.tokens.push(Token::new(TokenKind::Number, lexeme, position));
        Ok(())
    }

    /// SPECIAL state: maximal munch with one character of lookahead.
    fn lex_special(&mut self) -> Result<(), LexFailure> {
        let position = self.position();
        let first = self.bump().expect("caller verified a character is present");

        let kind = match first {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Times,
            '/' => {
                if self.peek() == Some('*') {
                    self.bump();
                    self.skip_block_comment(position.line)?;
                    return Ok(());
                }
                TokenKind::Slash
            }
            '=' => TokenKind::Eq,
            '<' => match self.peek() {
                Some('=') => {
                    self.bump();
                    TokenKind::Leq
                }
                Some('>') => {
                    self.bump();
                    TokenKind::Neq
                }
                _ => TokenKind::Lss,
            },
            '>' => match self.peek() {
                Some('=') => {
                    self.bump();
                    TokenKind::Geq
                }
                _ => TokenKind::Gtr,
            },
            ':' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Becomes
                } else {
                    return Err(self.fail(LexErrorKind::InvSym));
                }
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Period,
            ';' => TokenKind::Semicolon,
            _ => return Err(self.fail(LexErrorKind::InvSym)),
        };

        self.tokens.push(Token::new(kind, first.to_string(), position));
        Ok(())
    }

    /// Consumes a `/* ... */` block comment. An unterminated comment is
    /// reported as `INV_SYM` at the line the comment opened (the documented
    /// resolution of the Open Question in `spec.md` §4.1).
    fn skip_block_comment(&mut self, opened_at_line: usize) -> Result<(), LexFailure> {
        loop {
            match self.bump() {
                None => {
                    return Err(LexFailure {
                        tokens: self.tokens.clone(),
                        error: LexError {
                            kind: LexErrorKind::InvSym,
                            line: opened_at_line,
                        },
                    })
                }
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => continue,
            }
        }
    }
}

/// Lexes `source`, producing the full token stream or the tokens
/// accumulated up to the point of failure plus the failure itself.
pub fn lex(source: &str) -> LexOutcome {
    if source.trim().is_empty() {
        return Err(LexFailure {
            tokens: Vec::new(),
            error: LexError {
                kind: LexErrorKind::NoSourceCode,
                line: 0,
            },
        });
    }

    let mut lexer = Lexer::new(source);
    match lexer.run() {
        Ok(()) => Ok(lexer.tokens),
        Err(failure) => Err(failure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_program_is_a_single_period() {
        let tokens = lex(".").unwrap();
        assert_eq!(kinds(&tokens), vec![TokenKind::Period]);
    }

    #[test]
    fn const_and_arithmetic_tokens() {
        let tokens = lex("const a=3; var b; begin b:=a+2 end.").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Const,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Var,
                TokenKind::Ident,
                TokenKind::Semicolon,
                TokenKind::Begin,
                TokenKind::Ident,
                TokenKind::Becomes,
                TokenKind::Ident,
                TokenKind::Plus,
                TokenKind::Number,
                TokenKind::End,
                TokenKind::Period,
            ]
        );
    }

    #[test]
    fn relational_operators_maximal_munch() {
        let tokens = lex("<= <> < >= > =").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Leq,
                TokenKind::Neq,
                TokenKind::Lss,
                TokenKind::Geq,
                TokenKind::Gtr,
                TokenKind::Eq,
            ]
        );
    }

    #[test]
    fn name_too_long_does_not_consume_the_delimiter() {
        let failure = lex("abcdefghijkl.").unwrap_err();
        assert_eq!(failure.error.kind, LexErrorKind::NameTooLong);
        assert_eq!(failure.error.line, 0);
        assert!(failure.tokens.is_empty());
    }

    #[test]
    fn number_too_long() {
        let failure = lex("123456;").unwrap_err();
        assert_eq!(failure.error.kind, LexErrorKind::NumTooLong);
    }

    #[test]
    fn digit_then_letter_is_nonletter_var_initial() {
        let failure = lex("1a2;").unwrap_err();
        assert_eq!(failure.error.kind, LexErrorKind::NonletterVarInitial);
    }

    #[test]
    fn lone_colon_is_invalid() {
        let failure = lex(": ").unwrap_err();
        assert_eq!(failure.error.kind, LexErrorKind::InvSym);
    }

    #[test]
    fn block_comment_is_skipped() {
        let tokens = lex("/* a comment\nspanning lines */ begin end.").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Begin, TokenKind::End, TokenKind::Period]
        );
    }

    #[test]
    fn unterminated_comment_is_inv_sym_at_opening_line() {
        let failure = lex("begin /* never closed").unwrap_err();
        assert_eq!(failure.error.kind, LexErrorKind::InvSym);
        assert_eq!(failure.error.line, 0);
        assert_eq!(kinds(&failure.tokens), vec![TokenKind::Begin]);
    }
}
