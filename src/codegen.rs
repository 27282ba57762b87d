//! The code generator: the parser of `spec.md` §4.3 augmented with symbol
//! insertion, symbol resolution and instruction emission (`spec.md` §4.4).
//! It shares the grammar skeleton and token [`crate::parser::Cursor`] with
//! the syntax-only parser rather than duplicating cursor bookkeeping.

use std::fmt::{self, Display};

use crate::instruction::{Instruction, Opcode};
use crate::parser::Cursor;
use crate::symbol::{Symbol, SymbolKind, SymbolTable};
use crate::token::{Token, TokenKind};

/// `SIO_HALT`'s `m` field on the final, implicit halt instruction. Not a
/// meaningful address — a fixed "normal termination" marker inherited from
/// the reference implementation and reproduced bit-exactly by the empty
/// program scenario in `spec.md` §8.
const HALT_MARKER: i32 = 3;

/// Register file size, per `spec.md` §3 (`RF[0..16)`).
const REGISTER_COUNT: i32 = 16;

/// Diagnostics the code generator can raise. 1-17 reuse the numbered table
/// from `spec.md` §6; `RegisterOverflow` and `Undeclared` are
/// implementation-necessary additions the closed table doesn't enumerate
/// (see `DESIGN.md`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    Syntax { code: u8, message: String, line: usize },
    RegisterOverflow { line: usize },
    Undeclared { name: String, line: usize },
}

impl Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodegenError::Syntax { code, message, line } => {
                write!(f, "error {code}: {message} (line {line})")
            }
            CodegenError::RegisterOverflow { line } => {
                write!(f, "expression nests too deeply: register file exhausted (line {line})")
            }
            CodegenError::Undeclared { name, line } => {
                write!(f, "undeclared identifier '{name}' (line {line})")
            }
        }
    }
}

impl std::error::Error for CodegenError {}

impl CodegenError {
    fn syntax(code: u8, message: impl Into<String>, line: usize) -> Self {
        CodegenError::Syntax {
            code,
            message: message.into(),
            line,
        }
    }
}

struct Context<'a> {
    cursor: Cursor<'a>,
    symbols: SymbolTable,
    level: usize,
    scope: Option<usize>,
    register: i32,
    code: Vec<Instruction>,
}

impl<'a> Context<'a> {
    fn emit(&mut self, op: Opcode, r: i32, l: i32, m: i32) -> usize {
        self.code.push(Instruction::new(op, r, l, m));
        self.code.len() - 1
    }

    fn backpatch(&mut self, index: usize, m: i32) {
        self.code[index].m = m;
    }

    fn alloc_register(&mut self, line: usize) -> Result<i32, CodegenError> {
        if self.register >= REGISTER_COUNT {
            return Err(CodegenError::RegisterOverflow { line });
        }
        let r = self.register;
        self.register += 1;
        Ok(r)
    }

    fn lookup(&self, name: &str, line: usize) -> Result<Symbol, CodegenError> {
        self.symbols
            .find(self.scope, name)
            .cloned()
            .ok_or_else(|| CodegenError::Undeclared {
                name: name.to_string(),
                line,
            })
    }

    /// Static-link distance `L = max(0, Lc - Ld)` from `spec.md` §4.4.
    fn level_distance(&self, declared_at: usize) -> i32 {
        (self.level as i32 - declared_at as i32).max(0)
    }
}

/// Generates an instruction image for `tokens`, or the first diagnostic
/// encountered. Performs the same grammar validation the parser does, plus
/// symbol-table management and emission.
pub fn codegen(tokens: &[Token]) -> Result<Vec<Instruction>, CodegenError> {
    let mut ctx = Context {
        cursor: Cursor::new(tokens),
        symbols: SymbolTable::new(),
        level: 0,
        scope: None,
        register: 0,
        code: Vec::new(),
    };

    block(&mut ctx)?;

    if !ctx.cursor.check(TokenKind::Period) {
        return Err(CodegenError::syntax(6, "period expected", ctx.cursor.line()));
    }
    ctx.cursor.advance();

    ctx.emit(Opcode::SioHalt, 0, 0, HALT_MARKER);

    Ok(ctx.code)
}

fn block(ctx: &mut Context) -> Result<(), CodegenError> {
    let mut next_address: i32 = 4;

    if ctx.cursor.check(TokenKind::Const) {
        const_decl(ctx)?;
    }
    if ctx.cursor.check(TokenKind::Var) {
        var_decl(ctx, &mut next_address)?;
    }
    while ctx.cursor.check(TokenKind::Procedure) {
        proc_decl(ctx)?;
    }
    statement(ctx)
}

fn const_decl(ctx: &mut Context) -> Result<(), CodegenError> {
    ctx.cursor.advance(); // "const"
    loop {
        let line = ctx.cursor.line();
        if !ctx.cursor.check(TokenKind::Ident) {
            return Err(CodegenError::syntax(
                3,
                "const/var/procedure/read/write must be followed by identifier",
                line,
            ));
        }
        let name = ctx.cursor.advance().lexeme;

        if !ctx.cursor.check(TokenKind::Eq) {
            return Err(CodegenError::syntax(2, "identifier must be followed by '='", ctx.cursor.line()));
        }
        ctx.cursor.advance();

        if !ctx.cursor.check(TokenKind::Number) {
            return Err(CodegenError::syntax(1, "'=' must be followed by a number", ctx.cursor.line()));
        }
        let value = ctx.cursor.advance().number_value();

        ctx.symbols.add(Symbol {
            name,
            kind: SymbolKind::Const,
            level: ctx.level,
            scope: ctx.scope,
            value: Some(value),
            address: None,
        });

        if ctx.cursor.check(TokenKind::Comma) {
            ctx.cursor.advance();
            continue;
        }
        break;
    }

    if !ctx.cursor.check(TokenKind::Semicolon) {
        return Err(CodegenError::syntax(4, "semicolon or comma missing", ctx.cursor.line()));
    }
    ctx.cursor.advance();
    Ok(())
}

fn var_decl(ctx: &mut Context, next_address: &mut i32) -> Result<(), CodegenError> {
    ctx.cursor.advance(); // "var"
    loop {
        let line = ctx.cursor.line();
        if !ctx.cursor.check(TokenKind::Ident) {
            return Err(CodegenError::syntax(
                3,
                "const/var/procedure/read/write must be followed by identifier",
                line,
            ));
        }
        let name = ctx.cursor.advance().lexeme;

        ctx.symbols.add(Symbol {
            name,
            kind: SymbolKind::Var,
            level: ctx.level,
            scope: ctx.scope,
            value: None,
            address: Some(*next_address),
        });
        *next_address += 1;
        ctx.emit(Opcode::Inc, 0, 0, 1);

        if ctx.cursor.check(TokenKind::Comma) {
            ctx.cursor.advance();
            continue;
        }
        break;
    }

    if !ctx.cursor.check(TokenKind::Semicolon) {
        return Err(CodegenError::syntax(4, "semicolon or comma missing", ctx.cursor.line()));
    }
    ctx.cursor.advance();
    Ok(())
}

fn proc_decl(ctx: &mut Context) -> Result<(), CodegenError> {
    ctx.cursor.advance(); // "procedure"

    let line = ctx.cursor.line();
    if !ctx.cursor.check(TokenKind::Ident) {
        return Err(CodegenError::syntax(
            3,
            "const/var/procedure/read/write must be followed by identifier",
            line,
        ));
    }
    let name = ctx.cursor.advance().lexeme;

    if !ctx.cursor.check(TokenKind::Semicolon) {
        return Err(CodegenError::syntax(5, "semicolon missing", ctx.cursor.line()));
    }
    ctx.cursor.advance();

    let proc_index = ctx.symbols.add(Symbol {
        name,
        kind: SymbolKind::Proc,
        level: ctx.level,
        scope: ctx.scope,
        value: None,
        address: None,
    });

    let jmp_index = ctx.emit(Opcode::Jmp, 0, 0, 0);
    let entry = ctx.code.len() as i32;
    ctx.symbols.get_mut(proc_index).address = Some(entry);
    ctx.emit(Opcode::Inc, 0, 0, 4);

    let saved_level = ctx.level;
    let saved_scope = ctx.scope;
    let saved_register = ctx.register;
    ctx.level += 1;
    ctx.scope = Some(proc_index);
    ctx.register = 0;

    block(ctx)?;

    ctx.level = saved_level;
    ctx.scope = saved_scope;
    ctx.register = saved_register;

    ctx.emit(Opcode::Rtn, 0, 0, 0);
    let after = ctx.code.len() as i32;
    ctx.backpatch(jmp_index, after);

    if !ctx.cursor.check(TokenKind::Semicolon) {
        return Err(CodegenError::syntax(5, "semicolon missing", ctx.cursor.line()));
    }
    ctx.cursor.advance();
    Ok(())
}

fn statement(ctx: &mut Context) -> Result<(), CodegenError> {
    match ctx.cursor.peek().kind {
        TokenKind::Ident => assignment(ctx),
        TokenKind::Call => call_statement(ctx),
        TokenKind::Begin => {
            ctx.cursor.advance();
            statement(ctx)?;
            while ctx.cursor.check(TokenKind::Semicolon) {
                ctx.cursor.advance();
                statement(ctx)?;
            }
            if !ctx.cursor.check(TokenKind::End) {
                return Err(CodegenError::syntax(10, "semicolon or 'end' expected", ctx.cursor.line()));
            }
            ctx.cursor.advance();
            Ok(())
        }
        TokenKind::If => if_statement(ctx),
        TokenKind::While => while_statement(ctx),
        TokenKind::Read => read_statement(ctx),
        TokenKind::Write => write_statement(ctx),
        _ => Ok(()), // statement is optional in the grammar
    }
}

fn assignment(ctx: &mut Context) -> Result<(), CodegenError> {
    let line = ctx.cursor.line();
    let name = ctx.cursor.advance().lexeme;
    // Resolve the target *before* the RHS is parsed (the Open Question fix
    // from `spec.md` §9: the original resolved it too late, after the
    // "current token" had moved past the identifier).
    let target = ctx.lookup(&name, line)?;

    if !ctx.cursor.check(TokenKind::Becomes) {
        return Err(CodegenError::syntax(7, "assignment operator expected", ctx.cursor.line()));
    }
    ctx.cursor.advance();

    if target.kind != SymbolKind::Var {
        return Err(CodegenError::syntax(16, "assignment to constant or procedure not allowed", line));
    }

    ctx.register = 0;
    expression(ctx)?;
    let result = ctx.register - 1;

    let l = ctx.level_distance(target.level);
    ctx.emit(Opcode::Sto, result, l, target.address.expect("VAR symbols always carry an address"));
    ctx.register -= 1;
    Ok(())
}

fn call_statement(ctx: &mut Context) -> Result<(), CodegenError> {
    ctx.cursor.advance(); // "call"
    let line = ctx.cursor.line();
    if !ctx.cursor.check(TokenKind::Ident) {
        return Err(CodegenError::syntax(8, "'call' must be followed by identifier", line));
    }
    let name = ctx.cursor.advance().lexeme;
    let target = ctx.lookup(&name, line)?;

    if target.kind != SymbolKind::Proc {
        return Err(CodegenError::syntax(17, "call of a constant or variable not allowed", line));
    }

    let l = ctx.level_distance(target.level);
    ctx.emit(Opcode::Cal, 0, l, target.address.expect("PROC symbols always carry an address"));
    Ok(())
}

fn if_statement(ctx: &mut Context) -> Result<(), CodegenError> {
    ctx.cursor.advance(); // "if"
    ctx.register = 0;
    condition(ctx)?;
    let cond_reg = ctx.register - 1;
    ctx.register -= 1;

    if !ctx.cursor.check(TokenKind::Then) {
        return Err(CodegenError::syntax(9, "'then' expected", ctx.cursor.line()));
    }
    ctx.cursor.advance();

    let jpc_index = ctx.emit(Opcode::Jpc, cond_reg, 0, 0);
    statement(ctx)?;

    if ctx.cursor.check(TokenKind::Else) {
        ctx.cursor.advance();
        let jmp_index = ctx.emit(Opcode::Jmp, 0, 0, 0);
        let else_entry = ctx.code.len() as i32;
        ctx.backpatch(jpc_index, else_entry);
        statement(ctx)?;
        let end = ctx.code.len() as i32;
        ctx.backpatch(jmp_index, end);
    } else {
        let end = ctx.code.len() as i32;
        ctx.backpatch(jpc_index, end);
    }
    Ok(())
}

fn while_statement(ctx: &mut Context) -> Result<(), CodegenError> {
    ctx.cursor.advance(); // "while"
    let loop_start = ctx.code.len() as i32;

    ctx.register = 0;
    condition(ctx)?;
    let cond_reg = ctx.register - 1;
    ctx.register -= 1;

    if !ctx.cursor.check(TokenKind::Do) {
        return Err(CodegenError::syntax(11, "'do' expected", ctx.cursor.line()));
    }
    ctx.cursor.advance();

    let jpc_index = ctx.emit(Opcode::Jpc, cond_reg, 0, 0);
    statement(ctx)?;
    ctx.emit(Opcode::Jmp, 0, 0, loop_start);

    let end = ctx.code.len() as i32;
    ctx.backpatch(jpc_index, end);
    Ok(())
}

fn read_statement(ctx: &mut Context) -> Result<(), CodegenError> {
    ctx.cursor.advance(); // "read"
    let line = ctx.cursor.line();
    if !ctx.cursor.check(TokenKind::Ident) {
        return Err(CodegenError::syntax(
            3,
            "const/var/procedure/read/write must be followed by identifier",
            line,
        ));
    }
    let name = ctx.cursor.advance().lexeme;
    let target = ctx.lookup(&name, line)?;

    if target.kind != SymbolKind::Var {
        return Err(CodegenError::syntax(16, "assignment to constant or procedure not allowed", line));
    }

    let reg = ctx.alloc_register(line)?;
    ctx.emit(Opcode::SioRead, reg, 0, 2);
    let l = ctx.level_distance(target.level);
    ctx.emit(Opcode::Sto, reg, l, target.address.expect("VAR symbols always carry an address"));
    ctx.register -= 1;
    Ok(())
}

fn write_statement(ctx: &mut Context) -> Result<(), CodegenError> {
    ctx.cursor.advance(); // "write"
    let line = ctx.cursor.line();
    if !ctx.cursor.check(TokenKind::Ident) {
        return Err(CodegenError::syntax(
            3,
            "const/var/procedure/read/write must be followed by identifier",
            line,
        ));
    }
    let name = ctx.cursor.advance().lexeme;
    let target = ctx.lookup(&name, line)?;

    let reg = ctx.alloc_register(line)?;
    match target.kind {
        SymbolKind::Const => {
            ctx.emit(Opcode::Lit, reg, 0, target.value.expect("CONST symbols always carry a value"));
        }
        SymbolKind::Var => {
            let l = ctx.level_distance(target.level);
            ctx.emit(Opcode::Lod, reg, l, target.address.expect("VAR symbols always carry an address"));
        }
        SymbolKind::Proc => {
            return Err(CodegenError::syntax(17, "call of a constant or variable not allowed", line));
        }
    }
    // Always `LOD` the operand before `SIO_WRITE`ing it (the Open Question
    // fix from `spec.md` §9).
    ctx.emit(Opcode::SioWrite, reg, 0, 1);
    ctx.register -= 1;
    Ok(())
}

fn condition(ctx: &mut Context) -> Result<(), CodegenError> {
    if ctx.cursor.check(TokenKind::Odd) {
        ctx.cursor.advance();
        expression(ctx)?;
        let reg = ctx.register - 1;
        ctx.emit(Opcode::Odd, reg, 0, 0);
        Ok(())
    } else {
        expression(ctx)?;
        let relop = ctx.cursor.peek().kind;
        if !crate::parser::is_relop(relop) {
            return Err(CodegenError::syntax(12, "relational operator expected", ctx.cursor.line()));
        }
        ctx.cursor.advance();
        expression(ctx)?;

        let rhs = ctx.register - 1;
        let lhs = ctx.register - 2;
        let op = match relop {
            TokenKind::Eq => Opcode::Eql,
            TokenKind::Neq => Opcode::Neq,
            TokenKind::Lss => Opcode::Lss,
            TokenKind::Leq => Opcode::Leq,
            TokenKind::Gtr => Opcode::Gtr,
            TokenKind::Geq => Opcode::Geq,
            _ => unreachable!("checked by is_relop above"),
        };
        ctx.emit(op, lhs, lhs, rhs);
        ctx.register -= 1;
        Ok(())
    }
}

fn expression(ctx: &mut Context) -> Result<(), CodegenError> {
    let mut negate = false;
    match ctx.cursor.peek().kind {
        TokenKind::Plus => {
            ctx.cursor.advance();
        }
        TokenKind::Minus => {
            ctx.cursor.advance();
            negate = true;
        }
        _ => {}
    }

    term(ctx)?;

    if negate {
        let reg = ctx.register - 1;
        ctx.emit(Opcode::Neg, reg, reg, 0);
    }

    while matches!(ctx.cursor.peek().kind, TokenKind::Plus | TokenKind::Minus) {
        let op = ctx.cursor.advance().kind;
        term(ctx)?;
        let rhs = ctx.register - 1;
        let lhs = ctx.register - 2;
        let opcode = if op == TokenKind::Plus { Opcode::Add } else { Opcode::Sub };
        ctx.emit(opcode, lhs, lhs, rhs);
        ctx.register -= 1;
    }
    Ok(())
}

fn term(ctx: &mut Context) -> Result<(), CodegenError> {
    factor(ctx)?;
    while matches!(ctx.cursor.peek().kind, TokenKind::Times | TokenKind::Slash) {
        let op = ctx.cursor.advance().kind;
        factor(ctx)?;
        let rhs = ctx.register - 1;
        let lhs = ctx.register - 2;
        let opcode = if op == TokenKind::Times { Opcode::Mul } else { Opcode::Div };
        ctx.emit(opcode, lhs, lhs, rhs);
        ctx.register -= 1;
    }
    Ok(())
}

fn factor(ctx: &mut Context) -> Result<(), CodegenError> {
    let line = ctx.cursor.line();
    match ctx.cursor.peek().kind {
        TokenKind::Number => {
            let value = ctx.cursor.advance().number_value();
            let reg = ctx.alloc_register(line)?;
            ctx.emit(Opcode::Lit, reg, 0, value);
            Ok(())
        }
        TokenKind::Ident => {
            let name = ctx.cursor.advance().lexeme;
            let symbol = ctx.lookup(&name, line)?;
            let reg = ctx.alloc_register(line)?;
            match symbol.kind {
                SymbolKind::Const => {
                    ctx.emit(Opcode::Lit, reg, 0, symbol.value.expect("CONST symbols always carry a value"));
                }
                SymbolKind::Var => {
                    let l = ctx.level_distance(symbol.level);
                    ctx.emit(Opcode::Lod, reg, l, symbol.address.expect("VAR symbols always carry an address"));
                }
                SymbolKind::Proc => {
                    return Err(CodegenError::syntax(17, "call of a constant or variable not allowed", line));
                }
            }
            Ok(())
        }
        TokenKind::LParen => {
            ctx.cursor.advance();
            expression(ctx)?;
            if !ctx.cursor.check(TokenKind::RParen) {
                return Err(CodegenError::syntax(13, "right parenthesis missing", ctx.cursor.line()));
            }
            ctx.cursor.advance();
            Ok(())
        }
        _ => Err(CodegenError::syntax(14, "factor cannot begin with this symbol", line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn gen(src: &str) -> Result<Vec<Instruction>, CodegenError> {
        let tokens = lex(src).expect("lex should succeed");
        codegen(&tokens)
    }

    #[test]
    fn empty_program_emits_bare_halt() {
        let code = gen(".").unwrap();
        assert_eq!(code, vec![Instruction::new(Opcode::SioHalt, 0, 0, HALT_MARKER)]);
    }

    #[test]
    fn assignment_to_constant_is_rejected() {
        let err = gen("const a=1; begin a:=2 end.").unwrap_err();
        assert!(matches!(err, CodegenError::Syntax { code: 16, .. }));
    }

    #[test]
    fn call_of_a_variable_is_rejected() {
        let err = gen("var a; begin call a end.").unwrap_err();
        assert!(matches!(err, CodegenError::Syntax { code: 17, .. }));
    }

    #[test]
    fn undeclared_identifier_is_reported() {
        let err = gen("begin x:=1 end.").unwrap_err();
        assert!(matches!(err, CodegenError::Undeclared { .. }));
    }

    #[test]
    fn jump_targets_are_within_bounds() {
        let code = gen("var i; begin i:=0; while i<3 do i:=i+1 end.").unwrap();
        for instr in &code {
            if matches!(instr.op, Opcode::Jmp | Opcode::Jpc | Opcode::Cal) {
                assert!(instr.m >= 0 && (instr.m as usize) <= code.len());
            }
        }
    }
}
