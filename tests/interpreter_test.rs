mod common;
use common::*;
use forthvm::internals::stack::StackKind;
use forthvm::ForthError;

#[test]
fn test_shadowing_keeps_old_callers() {
    let mut rt = bare_forth();
    let s = run(&mut rt, &[": A 1 ;", ": B A ;", ": A 2 ;", "B A"]);
    assert_eq!(s, vec![1, 2]);
}

#[test]
fn test_numbers_and_bases() {
    let mut rt = bare_forth();
    assert_eq!(run(&mut rt, &["HEX FF 10 DECIMAL 10"]), vec![255, 16, 10]);
    rt.f_clear();
    assert_eq!(run(&mut rt, &["$ff %101 #10 'a' -$10"]), vec![255, 5, 10, 97, -16]);
    rt.f_clear();
    assert_eq!(run(&mut rt, &["2 BASE ! 1010 DECIMAL"]), vec![10]);
}

#[test]
fn test_double_literals() {
    let mut rt = bare_forth();
    run(&mut rt, &["-1."]);
    assert_eq!(rt.pop_double().unwrap(), -1);
    run(&mut rt, &["1.000 DPL @"]);
    assert_eq!(rt.pop().unwrap(), 3);
    assert_eq!(rt.pop_double().unwrap(), 1000);
    run(&mut rt, &[": BIG 12345678901. ;", "BIG"]);
    assert_eq!(rt.pop_double().unwrap(), 12_345_678_901);
}

#[test]
fn test_error_recovery_clears_stacks() {
    let mut rt = bare_forth();
    let out = exec(&mut rt, "1 2 nosuch 3");
    assert_eq!(out, "Error -13: undefined word: nosuch");
    assert!(stack(&rt).is_empty());
    assert_eq!(run(&mut rt, &["4"]), vec![4]);
}

#[test]
fn test_error_kinds() {
    let mut rt = bare_forth();
    assert_eq!(
        try_line(&mut rt, "12z"),
        Err(ForthError::InvalidNumber("12z".to_string()))
    );
    assert_eq!(try_line(&mut rt, "1 0 /"), Err(ForthError::DivisionByZero));
    assert_eq!(try_line(&mut rt, "1 0 MOD"), Err(ForthError::DivisionByZero));
    assert_eq!(
        try_line(&mut rt, "DROP"),
        Err(ForthError::StackUnderflow(StackKind::Data))
    );
    assert_eq!(
        try_line(&mut rt, "-1 @"),
        Err(ForthError::InvalidMemoryAddress(-1))
    );
    assert_eq!(
        try_line(&mut rt, "HERE 1+ @"),
        Err(ForthError::AddressAlignment(rt.dict.here() as i64 + 1))
    );
}

#[test]
fn test_error_codes_are_reported() {
    let mut rt = bare_forth();
    assert_eq!(exec(&mut rt, "1 0 /"), "Error -10: division by zero");
    assert_eq!(exec(&mut rt, "DROP"), "Error -4: data stack underflow");
}

#[test]
fn test_runaway_recursion_overflows_return_stack() {
    let mut rt = bare_forth();
    run(&mut rt, &[": R RECURSE ;"]);
    assert_eq!(
        try_line(&mut rt, "R"),
        Err(ForthError::StackOverflow(StackKind::Return))
    );
    assert_eq!(rt.rstack.depth(), 0);
}

#[test]
fn test_runaway_pushes_overflow_data_stack() {
    let mut rt = bare_forth();
    run(&mut rt, &[": F BEGIN 1 AGAIN ;"]);
    assert_eq!(
        try_line(&mut rt, "F"),
        Err(ForthError::StackOverflow(StackKind::Data))
    );
}

#[test]
fn test_evaluate() {
    let mut rt = bare_forth();
    assert_eq!(run(&mut rt, &[": E S\" 1 2 +\" EVALUATE ;", "E 10"]), vec![3, 10]);
    rt.f_clear();
    assert_eq!(run(&mut rt, &["S\" : SQ DUP * ;\" EVALUATE 4 SQ"]), vec![16]);
}

#[test]
fn test_evaluate_error_restores_interpreter() {
    let mut rt = bare_forth();
    assert_eq!(
        try_line(&mut rt, "S\" 1 oops\" EVALUATE"),
        Err(ForthError::UndefinedWord("oops".to_string()))
    );
    assert_eq!(run(&mut rt, &["5"]), vec![5]);
}

#[test]
fn test_output() {
    let mut rt = bare_forth();
    assert_eq!(exec(&mut rt, ": HI .\" Hello, World\" CR ; HI"), "Hello, World\n");
    assert_eq!(exec(&mut rt, "1 2 3 .S"), "[ 1 2 3 ] ");
    assert_eq!(exec(&mut rt, ". . ."), "3 2 1 ");
    assert_eq!(exec(&mut rt, "65 EMIT 66 EMIT"), "AB");
}

#[test]
fn test_bye_stops_the_line() {
    let mut rt = bare_forth();
    assert_eq!(run(&mut rt, &["1 BYE 2"]), vec![1]);
    assert!(rt.should_exit());
}

#[test]
fn test_abort_quote() {
    let mut rt = bare_forth();
    run(&mut rt, &[": POSITIVE DUP 0< ABORT\" negative\" ;"]);
    assert_eq!(run(&mut rt, &["5 POSITIVE"]), vec![5]);
    assert_eq!(exec(&mut rt, "-5 POSITIVE"), "Error -2: negative");
    assert_eq!(try_line(&mut rt, "ABORT"), Err(ForthError::Abort));
}

#[test]
fn test_create_does() {
    let mut rt = bare_forth();
    let s = run(
        &mut rt,
        &[
            ": ARRAY CREATE CELLS ALLOT DOES> SWAP CELLS + ;",
            "5 ARRAY A",
            "7 2 A ! 9 4 A !",
            "2 A @ 4 A @",
        ],
    );
    assert_eq!(s, vec![7, 9]);
}

#[test]
fn test_variables_and_constants() {
    let mut rt = bare_forth();
    let s = run(&mut rt, &["VARIABLE V 10 CONSTANT TEN", "TEN V ! 5 V +! V @"]);
    assert_eq!(s, vec![15]);
}

#[test]
fn test_state_and_brackets() {
    let mut rt = bare_forth();
    assert_eq!(run(&mut rt, &[": S? STATE @ ; IMMEDIATE", "S?"]), vec![0]);
    rt.f_clear();
    run(&mut rt, &[": T S? LITERAL ;", "T"]);
    assert_eq!(stack(&rt), vec![-1]);
}

#[test]
fn test_source_and_to_in() {
    let mut rt = bare_forth();
    let s = run(&mut rt, &["SOURCE NIP >IN @ 99"]);
    assert_eq!(s, vec![19, 17, 99]);
    rt.f_clear();
    assert_eq!(run(&mut rt, &["SOURCE NIP >IN @"]), vec![16, 16]);
}

#[test]
fn test_comma_and_here() {
    let mut rt = bare_forth();
    let s = run(&mut rt, &["HERE 42 , HERE SWAP - CREATE X 1 C, 2 C, ALIGN X C@ X 1+ C@"]);
    assert_eq!(s, vec![4, 1, 2]);
}

#[test]
fn test_non_ascii_text_passes_through() {
    let mut rt = bare_forth();
    assert_eq!(exec(&mut rt, ".\" héllo\""), "héllo");
    assert_eq!(exec(&mut rt, ": G .\" grüß\" ; G"), "grüß");
    assert_eq!(exec(&mut rt, "S\" naïve\" TYPE"), "naïve");
    assert_eq!(exec(&mut rt, "195 EMIT 169 EMIT"), "é");
}

#[test]
fn test_non_ascii_names_keep_their_length() {
    let mut rt = bare_forth();
    let name = "é".repeat(120);
    let define = format!(": {} 7 ;", name);
    run(&mut rt, &[define.as_str(), name.as_str()]);
    assert_eq!(stack(&rt), vec![7]);
    let header = rt.find_header(&name).unwrap().unwrap();
    assert_eq!(header.name, name);
}
