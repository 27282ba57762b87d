//! Recursive-descent parser: validates that a token stream matches the
//! grammar in `spec.md` §4.3, performing no code emission. This is the
//! semantic-free skeleton the code generator (`crate::codegen`) augments
//! with symbol-table management and instruction emission.

use std::fmt::{self, Display};

use crate::token::{Token, TokenKind};

/// One of the numbered diagnostics from `spec.md` §6. The parser only ever
/// produces 1-14 (16/17 require symbol-kind knowledge and are reserved for
/// the code generator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserError {
    pub code: u8,
    pub message: &'static str,
    pub line: usize,
}

impl Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error {}: {} (line {})", self.code, self.message, self.line)
    }
}

impl std::error::Error for ParserError {}

/// A single-reader cursor over an immutable token slice. Peeking past the
/// end of the stream yields the `Null` sentinel token, per `spec.md` §3.
pub(crate) struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub(crate) fn peek(&self) -> Token {
        self.tokens.get(self.pos).cloned().unwrap_or_else(Token::null)
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn line(&self) -> usize {
        self.peek().position.line
    }

    pub(crate) fn expect(
        &mut self,
        kind: TokenKind,
        code: u8,
        message: &'static str,
    ) -> Result<Token, ParserError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParserError {
                code,
                message,
                line: self.line(),
            })
        }
    }

    pub(crate) fn expect_ident(&mut self) -> Result<Token, ParserError> {
        self.expect(
            TokenKind::Ident,
            3,
            "const/var/procedure/read/write must be followed by identifier",
        )
    }

    pub(crate) fn err(&self, code: u8, message: &'static str) -> ParserError {
        ParserError {
            code,
            message,
            line: self.line(),
        }
    }
}

pub(crate) fn is_relop(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Eq | TokenKind::Neq | TokenKind::Lss | TokenKind::Leq | TokenKind::Gtr | TokenKind::Geq
    )
}

/// Validates `tokens` against the grammar. Returns the first mismatch; the
/// parser aborts on the first error as specified.
pub fn parse(tokens: &[Token]) -> Result<(), ParserError> {
    let mut cursor = Cursor::new(tokens);
    block(&mut cursor)?;
    cursor.expect(TokenKind::Period, 6, "period expected")?;
    Ok(())
}

fn block(cursor: &mut Cursor) -> Result<(), ParserError> {
    if cursor.check(TokenKind::Const) {
        const_decl(cursor)?;
    }
    if cursor.check(TokenKind::Var) {
        var_decl(cursor)?;
    }
    while cursor.check(TokenKind::Procedure) {
        proc_decl(cursor)?;
    }
    statement(cursor)
}

fn const_decl(cursor: &mut Cursor) -> Result<(), ParserError> {
    cursor.advance(); // "const"
    loop {
        cursor.expect_ident()?;
        cursor.expect(TokenKind::Eq, 2, "identifier must be followed by '='")?;
        cursor.expect(TokenKind::Number, 1, "'=' must be followed by a number")?;

        if cursor.check(TokenKind::Comma) {
            cursor.advance();
            continue;
        }
        break;
    }
    cursor.expect(TokenKind::Semicolon, 4, "semicolon or comma missing")?;
    Ok(())
}

fn var_decl(cursor: &mut Cursor) -> Result<(), ParserError> {
    cursor.advance(); // "var"
    loop {
        cursor.expect_ident()?;
        if cursor.check(TokenKind::Comma) {
            cursor.advance();
            continue;
        }
        break;
    }
    cursor.expect(TokenKind::Semicolon, 4, "semicolon or comma missing")?;
    Ok(())
}

fn proc_decl(cursor: &mut Cursor) -> Result<(), ParserError> {
    cursor.advance(); // "procedure"
    cursor.expect_ident()?;
    cursor.expect(TokenKind::Semicolon, 5, "semicolon missing")?;
    block(cursor)?;
    cursor.expect(TokenKind::Semicolon, 5, "semicolon missing")?;
    Ok(())
}

fn statement(cursor: &mut Cursor) -> Result<(), ParserError> {
    match cursor.peek().kind {
        TokenKind::Ident => {
            cursor.advance();
            cursor.expect(TokenKind::Becomes, 7, "assignment operator expected")?;
            expression(cursor)?;
        }
        TokenKind::Call => {
            cursor.advance();
            cursor.expect_ident()?;
        }
        TokenKind::Begin => {
            cursor.advance();
            statement(cursor)?;
            while cursor.check(TokenKind::Semicolon) {
                cursor.advance();
                statement(cursor)?;
            }
            cursor.expect(TokenKind::End, 10, "semicolon or 'end' expected")?;
        }
        TokenKind::If => {
            cursor.advance();
            condition(cursor)?;
            cursor.expect(TokenKind::Then, 9, "'then' expected")?;
            statement(cursor)?;
            if cursor.check(TokenKind::Else) {
                cursor.advance();
                statement(cursor)?;
            }
        }
        TokenKind::While => {
            cursor.advance();
            condition(cursor)?;
            cursor.expect(TokenKind::Do, 11, "'do' expected")?;
            statement(cursor)?;
        }
        TokenKind::Read => {
            cursor.advance();
            cursor.expect_ident()?;
        }
        TokenKind::Write => {
            cursor.advance();
            cursor.expect_ident()?;
        }
        _ => {
            // statement is optional (the grammar's outer `[ ... ]`); any
            // other token is left for the caller to validate.
        }
    }
    Ok(())
}

fn condition(cursor: &mut Cursor) -> Result<(), ParserError> {
    if cursor.check(TokenKind::Odd) {
        cursor.advance();
        expression(cursor)
    } else {
        expression(cursor)?;
        if !is_relop(cursor.peek().kind) {
            return Err(cursor.err(12, "relational operator expected"));
        }
        cursor.advance();
        expression(cursor)
    }
}

fn expression(cursor: &mut Cursor) -> Result<(), ParserError> {
    if matches!(cursor.peek().kind, TokenKind::Plus | TokenKind::Minus) {
        cursor.advance();
    }
    term(cursor)?;
    while matches!(cursor.peek().kind, TokenKind::Plus | TokenKind::Minus) {
        cursor.advance();
        term(cursor)?;
    }
    Ok(())
}

fn term(cursor: &mut Cursor) -> Result<(), ParserError> {
    factor(cursor)?;
    while matches!(cursor.peek().kind, TokenKind::Times | TokenKind::Slash) {
        cursor.advance();
        factor(cursor)?;
    }
    Ok(())
}

fn factor(cursor: &mut Cursor) -> Result<(), ParserError> {
    match cursor.peek().kind {
        TokenKind::Ident | TokenKind::Number => {
            cursor.advance();
            Ok(())
        }
        TokenKind::LParen => {
            cursor.advance();
            expression(cursor)?;
            cursor.expect(TokenKind::RParen, 13, "right parenthesis missing")?;
            Ok(())
        }
        _ => Err(cursor.err(14, "factor cannot begin with this symbol")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_str(src: &str) -> Result<(), ParserError> {
        let tokens = lex(src).expect("lex should succeed");
        parse(&tokens)
    }

    #[test]
    fn empty_program() {
        assert!(parse_str(".").is_ok());
    }

    #[test]
    fn const_and_arithmetic() {
        assert!(parse_str("const a=3; var b; begin b:=a+2 end.").is_ok());
    }

    #[test]
    fn while_loop() {
        assert!(parse_str("var i; begin i:=0; while i<3 do i:=i+1 end.").is_ok());
    }

    #[test]
    fn nested_procedure() {
        assert!(parse_str(
            "var x; procedure p; begin x:=x+1 end; begin x:=10; call p; call p; write x end."
        )
        .is_ok());
    }

    #[test]
    fn missing_semicolon_or_comma_in_var_decl() {
        let err = parse_str("var x x;").unwrap_err();
        assert_eq!(err.code, 4);
    }

    #[test]
    fn missing_period() {
        let err = parse_str("var x;").unwrap_err();
        assert_eq!(err.code, 6);
    }
}
