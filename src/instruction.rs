//! The instruction format shared by the code generator (which emits it) and
//! the virtual machine (which executes it). See `spec.md` §3 and §4.5.

use std::fmt::{self, Display};

/// The closed opcode set. Numeric values match `spec.md` §4.5 and are part
/// of the instruction file format (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Lit = 1,
    Rtn = 2,
    Lod = 3,
    Sto = 4,
    Cal = 5,
    Inc = 6,
    Jmp = 7,
    Jpc = 8,
    SioWrite = 9,
    SioRead = 10,
    SioHalt = 11,
    Neg = 12,
    Add = 13,
    Sub = 14,
    Mul = 15,
    Div = 16,
    Odd = 17,
    Mod = 18,
    Eql = 19,
    Neq = 20,
    Lss = 21,
    Leq = 22,
    Gtr = 23,
    Geq = 24,
}

impl Opcode {
    pub fn from_i32(value: i32) -> Option<Self> {
        use Opcode::*;
        let op = match value {
            1 => Lit,
            2 => Rtn,
            3 => Lod,
            4 => Sto,
            5 => Cal,
            6 => Inc,
            7 => Jmp,
            8 => Jpc,
            9 => SioWrite,
            10 => SioRead,
            11 => SioHalt,
            12 => Neg,
            13 => Add,
            14 => Sub,
            15 => Mul,
            16 => Div,
            17 => Odd,
            18 => Mod,
            19 => Eql,
            20 => Neq,
            21 => Lss,
            22 => Leq,
            23 => Gtr,
            24 => Geq,
            _ => return None,
        };
        Some(op)
    }

    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Lit => "LIT",
            Rtn => "RTN",
            Lod => "LOD",
            Sto => "STO",
            Cal => "CAL",
            Inc => "INC",
            Jmp => "JMP",
            Jpc => "JPC",
            SioWrite => "SIO_WRITE",
            SioRead => "SIO_READ",
            SioHalt => "SIO_HALT",
            Neg => "NEG",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Odd => "ODD",
            Mod => "MOD",
            Eql => "EQL",
            Neq => "NEQ",
            Lss => "LSS",
            Leq => "LEQ",
            Gtr => "GTR",
            Geq => "GEQ",
        }
    }
}

/// A four-field instruction: `{ op, r, l, m }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Opcode,
    pub r: i32,
    pub l: i32,
    pub m: i32,
}

impl Instruction {
    pub fn new(op: Opcode, r: i32, l: i32, m: i32) -> Self {
        Self { op, r, l, m }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.op as i32, self.r, self.l, self.m)
    }
}
