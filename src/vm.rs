//! The virtual machine: a register + stack interpreter over the activation
//! record layout described in `spec.md` §5. The stack holds `SL`/`DL`/`RA`
//! plus locals per frame; registers are a separate, flat 16-slot file.

use std::fmt::{self, Display};
use std::io::{BufRead, Write as IoWrite};

use crate::instruction::{Instruction, Opcode};

/// Diagnostics the interpreter can raise while executing an instruction
/// image. None of these are part of the closed parser/codegen error table
/// (`spec.md` §6) — they are runtime faults, reported independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    CodeTooLarge { length: usize, max: usize },
    StackOverflow { height: usize, max: usize },
    StackUnderflow,
    InvalidOpcode { raw: i32 },
    DivisionByZero,
    RegisterOutOfRange { r: i32 },
    ProgramCounterOutOfRange { pc: i32 },
    MissingInput,
    Io(String),
}

impl Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::CodeTooLarge { length, max } => {
                write!(f, "instruction image has {length} instructions, exceeds limit of {max}")
            }
            VmError::StackOverflow { height, max } => {
                write!(f, "stack height {height} exceeds limit of {max}")
            }
            VmError::StackUnderflow => write!(f, "stack underflow"),
            VmError::InvalidOpcode { raw } => write!(f, "invalid opcode: {raw}"),
            VmError::DivisionByZero => write!(f, "division by zero"),
            VmError::RegisterOutOfRange { r } => write!(f, "register {r} out of range"),
            VmError::ProgramCounterOutOfRange { pc } => write!(f, "program counter {pc} out of range"),
            VmError::MissingInput => write!(f, "SIO_READ requested input but none was available"),
            VmError::Io(message) => write!(f, "I/O error: {message}"),
        }
    }
}

impl std::error::Error for VmError {}

/// Interpreter limits, per `spec.md` §5. Overridable so callers (tests,
/// `plvm --max-stack`) can probe the boundary without recompiling.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub max_code_length: usize,
    pub max_stack_height: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_code_length: 500,
            max_stack_height: 2000,
        }
    }
}

/// Follows `L` static-link hops from the current frame base, per `spec.md`
/// §5's `base(L)`.
fn base(mut b: usize, mut l: i32, stack: &[i32]) -> Result<usize, VmError> {
    while l > 0 {
        b = stack[b + 1] as usize; // SL is at BP+1
        l -= 1;
    }
    Ok(b)
}

/// Runs `code` to completion (`SIO_HALT`) or until a fault, reading `SIO_READ`
/// input line-by-line from `input` and writing `SIO_WRITE` output (newline
/// terminated) to `output`.
pub fn run(code: &[Instruction], input: &mut impl BufRead, output: &mut impl IoWrite, config: &Config) -> Result<(), VmError> {
    if code.len() > config.max_code_length {
        return Err(VmError::CodeTooLarge {
            length: code.len(),
            max: config.max_code_length,
        });
    }

    let mut registers = [0i32; 16];
    let mut stack = vec![0i32; config.max_stack_height];
    // Frame 0: SL=DL=RA=0, locals start at 4, matching `spec.md` §5.
    let mut b: usize = 0;
    let mut t: usize = 3;
    let mut p: usize = 0;

    loop {
        if p >= code.len() {
            return Err(VmError::ProgramCounterOutOfRange { pc: p as i32 });
        }
        let instr = code[p];
        p += 1;

        let check_reg = |r: i32| -> Result<usize, VmError> {
            if r < 0 || r as usize >= registers.len() {
                Err(VmError::RegisterOutOfRange { r })
            } else {
                Ok(r as usize)
            }
        };

        match instr.op {
            Opcode::Lit => {
                let r = check_reg(instr.r)?;
                registers[r] = instr.m;
            }
            Opcode::Rtn => {
                if b == 0 {
                    return Ok(());
                }
                let ra = stack[b + 3] as usize;
                t = b - 1;
                b = stack[b + 2] as usize; // DL restores the caller's base
                p = ra;
            }
            Opcode::Lod => {
                let r = check_reg(instr.r)?;
                let frame = base(b, instr.l, &stack)?;
                let addr = frame + instr.m as usize;
                registers[r] = *stack.get(addr).ok_or(VmError::StackUnderflow)?;
            }
            Opcode::Sto => {
                let r = check_reg(instr.r)?;
                let frame = base(b, instr.l, &stack)?;
                let addr = frame + instr.m as usize;
                if addr >= stack.len() {
                    return Err(VmError::StackOverflow {
                        height: addr,
                        max: config.max_stack_height,
                    });
                }
                stack[addr] = registers[r];
            }
            Opcode::Cal => {
                let new_b = t + 1;
                let new_t = new_b + 3;
                if new_t >= config.max_stack_height {
                    return Err(VmError::StackOverflow {
                        height: new_t,
                        max: config.max_stack_height,
                    });
                }
                let sl = base(b, instr.l, &stack)?;
                stack[new_b] = 0; // reserved return-value slot
                stack[new_b + 1] = sl as i32; // SL
                stack[new_b + 2] = b as i32; // DL
                stack[new_b + 3] = p as i32; // RA
                t = new_t;
                b = new_b;
                p = instr.m as usize;
            }
            Opcode::Inc => {
                let new_t = t + instr.m as usize;
                if new_t >= config.max_stack_height {
                    return Err(VmError::StackOverflow {
                        height: new_t,
                        max: config.max_stack_height,
                    });
                }
                t = new_t;
            }
            Opcode::Jmp => {
                p = instr.m as usize;
            }
            Opcode::Jpc => {
                let r = check_reg(instr.r)?;
                if registers[r] == 0 {
                    p = instr.m as usize;
                }
            }
            Opcode::SioWrite => {
                let r = check_reg(instr.r)?;
                writeln!(output, "{}", registers[r]).map_err(|err| VmError::Io(err.to_string()))?;
            }
            Opcode::SioRead => {
                let r = check_reg(instr.r)?;
                let mut line = String::new();
                let n = input.read_line(&mut line).map_err(|_| VmError::MissingInput)?;
                if n == 0 {
                    return Err(VmError::MissingInput);
                }
                let value: i32 = line.trim().parse().map_err(|_| VmError::MissingInput)?;
                registers[r] = value;
            }
            Opcode::SioHalt => {
                return Ok(());
            }
            Opcode::Neg => {
                let r = check_reg(instr.r)?;
                let l = check_reg(instr.l)?;
                registers[r] = -registers[l];
            }
            Opcode::Add => {
                let r = check_reg(instr.r)?;
                let l = check_reg(instr.l)?;
                let m = check_reg(instr.m)?;
                registers[r] = registers[l] + registers[m];
            }
            Opcode::Sub => {
                let r = check_reg(instr.r)?;
                let l = check_reg(instr.l)?;
                let m = check_reg(instr.m)?;
                registers[r] = registers[l] - registers[m];
            }
            Opcode::Mul => {
                let r = check_reg(instr.r)?;
                let l = check_reg(instr.l)?;
                let m = check_reg(instr.m)?;
                registers[r] = registers[l] * registers[m];
            }
            Opcode::Div => {
                let r = check_reg(instr.r)?;
                let l = check_reg(instr.l)?;
                let m = check_reg(instr.m)?;
                if registers[m] == 0 {
                    return Err(VmError::DivisionByZero);
                }
                registers[r] = registers[l] / registers[m];
            }
            Opcode::Mod => {
                let r = check_reg(instr.r)?;
                let l = check_reg(instr.l)?;
                let m = check_reg(instr.m)?;
                if registers[m] == 0 {
                    return Err(VmError::DivisionByZero);
                }
                registers[r] = registers[l] % registers[m];
            }
            Opcode::Odd => {
                let r = check_reg(instr.r)?;
                registers[r] = (registers[r] % 2 != 0) as i32;
            }
            Opcode::Eql => {
                let r = check_reg(instr.r)?;
                let l = check_reg(instr.l)?;
                let m = check_reg(instr.m)?;
                registers[r] = (registers[l] == registers[m]) as i32;
            }
            Opcode::Neq => {
                let r = check_reg(instr.r)?;
                let l = check_reg(instr.l)?;
                let m = check_reg(instr.m)?;
                registers[r] = (registers[l] != registers[m]) as i32;
            }
            Opcode::Lss => {
                let r = check_reg(instr.r)?;
                let l = check_reg(instr.l)?;
                let m = check_reg(instr.m)?;
                registers[r] = (registers[l] < registers[m]) as i32;
            }
            Opcode::Leq => {
                let r = check_reg(instr.r)?;
                let l = check_reg(instr.l)?;
                let m = check_reg(instr.m)?;
                registers[r] = (registers[l] <= registers[m]) as i32;
            }
            Opcode::Gtr => {
                let r = check_reg(instr.r)?;
                let l = check_reg(instr.l)?;
                let m = check_reg(instr.m)?;
                registers[r] = (registers[l] > registers[m]) as i32;
            }
            Opcode::Geq => {
                let r = check_reg(instr.r)?;
                let l = check_reg(instr.l)?;
                let m = check_reg(instr.m)?;
                registers[r] = (registers[l] >= registers[m]) as i32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::codegen;
    use crate::lexer::lex;
    use std::io::Cursor as IoCursor;

    fn run_src(src: &str, input: &str) -> (Result<(), VmError>, String) {
        let tokens = lex(src).expect("lex should succeed");
        let code = codegen(&tokens).expect("codegen should succeed");
        let mut reader = IoCursor::new(input.as_bytes());
        let mut out = Vec::new();
        let result = run(&code, &mut reader, &mut out, &Config::default());
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn empty_program_halts_cleanly() {
        let (result, out) = run_src(".", "");
        assert!(result.is_ok());
        assert!(out.is_empty());
    }

    #[test]
    fn writes_a_constant() {
        let (result, out) = run_src("const a=42; begin write a end.", "");
        assert!(result.is_ok());
        assert_eq!(out, "42\n");
    }

    #[test]
    fn while_loop_counts_to_three() {
        let (result, out) = run_src(
            "var i; begin i:=0; while i<3 do begin write i; i:=i+1 end; write i end.",
            "",
        );
        assert!(result.is_ok());
        assert_eq!(out, "0\n1\n2\n3\n");
    }

    #[test]
    fn procedure_call_mutates_outer_variable() {
        let (result, out) = run_src(
            "var x; procedure p; begin x:=x+1 end; begin x:=10; call p; call p; write x end.",
            "",
        );
        assert!(result.is_ok());
        assert_eq!(out, "12\n");
    }

    #[test]
    fn division_by_zero_is_reported() {
        let (result, _) = run_src("var a; begin a:=1/0 end.", "");
        assert_eq!(result.unwrap_err(), VmError::DivisionByZero);
    }

    #[test]
    fn read_consumes_a_line_of_input() {
        let (result, out) = run_src("var a; begin read a; write a end.", "7\n");
        assert!(result.is_ok());
        assert_eq!(out, "7\n");
    }
}
