//! End-to-end scenarios exercising the full lex -> parse -> codegen -> run
//! pipeline through its public, file-free contract.

use std::io::Cursor as IoCursor;

use pl0c::codegen::{codegen, CodegenError};
use pl0c::instruction::{Instruction, Opcode};
use pl0c::lexer::{lex, LexErrorKind};
use pl0c::parser::parse;
use pl0c::token::TokenKind;
use pl0c::vm::{run, Config};

fn execute(src: &str) -> (Vec<Instruction>, String) {
    let tokens = lex(src).expect("lex should succeed");
    parse(&tokens).expect("parse should succeed");
    let code = codegen(&tokens).expect("codegen should succeed");

    let mut input = IoCursor::new(&b""[..]);
    let mut output = Vec::new();
    run(&code, &mut input, &mut output, &Config::default()).expect("run should succeed");
    (code, String::from_utf8(output).unwrap())
}

#[test]
fn scenario_1_empty_program() {
    let tokens = lex(".").unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::Period);

    assert!(parse(&tokens).is_ok());

    let code = codegen(&tokens).unwrap();
    assert_eq!(code, vec![Instruction::new(Opcode::SioHalt, 0, 0, 3)]);

    let mut input = IoCursor::new(&b""[..]);
    let mut output = Vec::new();
    assert!(run(&code, &mut input, &mut output, &Config::default()).is_ok());
    assert!(output.is_empty());
}

#[test]
fn scenario_2_const_and_arithmetic() {
    let (_, output) = execute("const a=3; var b; begin b:=a+2 end.");
    // b is never written, but the assignment must still execute without
    // faulting; confirm via a program that writes b right after.
    let (_, output_with_write) = execute("const a=3; var b; begin b:=a+2; write b end.");
    assert!(output.is_empty());
    assert_eq!(output_with_write, "5\n");
}

#[test]
fn scenario_3_while_loop() {
    let (_, output) = execute("var i; begin i:=0; while i<3 do i:=i+1; write i end.");
    assert_eq!(output, "3\n");
}

#[test]
fn scenario_3_while_loop_body_runs_exactly_three_times() {
    let (_, output) = execute(
        "var i, n; begin i:=0; n:=0; while i<3 do begin n:=n+1; i:=i+1 end; write n end.",
    );
    assert_eq!(output, "3\n");
}

#[test]
fn scenario_4_nested_procedure_with_static_link() {
    let (_, output) = execute(
        "var x; procedure p; begin x:=x+1 end; begin x:=10; call p; call p; write x end.",
    );
    assert_eq!(output, "12\n");
}

#[test]
fn scenario_5_lex_error_name_too_long() {
    let failure = lex("abcdefghijkl").unwrap_err();
    assert_eq!(failure.error.kind, LexErrorKind::NameTooLong);
    assert_eq!(failure.error.line, 0);
}

#[test]
fn scenario_6_parse_error_missing_semicolon_or_comma() {
    let tokens = lex("var x x;").unwrap();
    let err = parse(&tokens).unwrap_err();
    assert_eq!(err.code, 4);
}

#[test]
fn jump_targets_stay_within_code_bounds() {
    let code = {
        let tokens = lex(
            "var x; procedure p; begin if x<10 then x:=x+1 else x:=0 end; \
             begin x:=0; while x<5 do call p end.",
        )
        .unwrap();
        codegen(&tokens).unwrap()
    };
    for instr in &code {
        if matches!(instr.op, Opcode::Jmp | Opcode::Jpc | Opcode::Cal) {
            assert!((instr.m as usize) <= code.len());
        }
    }
}

#[test]
fn assignment_target_is_resolved_before_the_right_hand_side() {
    // Regression for the corrected evaluation order: the target must
    // resolve even when it does not appear anywhere in the expression.
    let err = codegen(&lex("begin y:=1 end.").unwrap()).unwrap_err();
    assert!(matches!(err, CodegenError::Undeclared { name, .. } if name == "y"));
}
