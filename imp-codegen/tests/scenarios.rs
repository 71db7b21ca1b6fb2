//! End-to-end scenarios: parse IMP source, compile it, run the emitted
//! assembly on the reference interpreter, and check the printed output.
//! These are the concrete scenarios and testable properties of the
//! compiler's specification (§8), not unit tests of any one module.

use imp_codegen::compile;
use imp_machine::run;
use imp_syntax::parse;

fn compile_and_run(src: &str, inputs: &[i64]) -> Vec<i64> {
    let program = parse(src).expect("source should parse");
    let asm = compile(&program).expect("program should compile without diagnostics");
    run(&asm, inputs).expect("emitted program should run to HALT").output
}

fn expect_diagnostics(src: &str) -> Vec<imp_codegen::Diagnostic> {
    let program = parse(src).expect("source should parse");
    compile(&program).expect_err("program should fail to compile")
}

#[test]
fn s1_hello_world_ish() {
    assert_eq!(compile_and_run("BEGIN WRITE 5; END", &[]), vec![5]);
}

#[test]
fn s2_arithmetic() {
    assert_eq!(compile_and_run("BEGIN WRITE 7*6; END", &[]), vec![42]);
}

#[test]
fn s3_division_by_zero_prints_zero_without_trapping() {
    assert_eq!(compile_and_run("BEGIN WRITE 10/0; END", &[]), vec![0]);
}

#[test]
fn s4_count_to_ten() {
    let src = "DECLARE i BEGIN FOR i FROM 1 TO 10 DO WRITE i; ENDFOR END";
    assert_eq!(compile_and_run(src, &[]), (1..=10).collect::<Vec<_>>());
}

#[test]
fn s5_downto_with_equal_endpoints_runs_once() {
    let src = "DECLARE i BEGIN FOR i FROM 5 DOWNTO 5 DO WRITE i; ENDFOR END";
    assert_eq!(compile_and_run(src, &[]), vec![5]);
}

#[test]
fn s6_uninitialized_read_is_a_diagnostic_not_a_crash() {
    let diagnostics = expect_diagnostics("DECLARE x\nBEGIN WRITE x; END");
    assert!(diagnostics.iter().any(|d| matches!(
        d,
        imp_codegen::Diagnostic::UninitializedScalar { name, line } if name == "x" && *line == 2
    )));
}

#[test]
fn s7_array_round_trip() {
    let src = "DECLARE t(0:3) BEGIN t(0):=7; t(1):=t(0)+3; WRITE t(1); END";
    assert_eq!(compile_and_run(src, &[]), vec![10]);
}

#[test]
fn division_and_modulo_agree_with_integer_arithmetic() {
    for (a, b) in [(17, 5), (100, 9), (1, 1), (0, 7), (7, 1)] {
        let src = format!("BEGIN WRITE {a}/{b}; WRITE {a}%{b}; END");
        assert_eq!(
            compile_and_run(&src, &[]),
            vec![a / b, a % b],
            "a={a} b={b}"
        );
    }
}

#[test]
fn multiplication_matches_integer_arithmetic() {
    for (a, b) in [(0, 9), (1, 1), (12, 11), (100, 100), (37, 0)] {
        let src = format!("BEGIN WRITE {a}*{b}; END");
        assert_eq!(compile_and_run(&src, &[]), vec![a * b], "a={a} b={b}");
    }
}

#[test]
fn repeat_runs_its_body_at_least_once() {
    let src = "DECLARE x BEGIN x := 0; REPEAT WRITE x; x := x + 1; UNTIL x = 0; END";
    assert_eq!(compile_and_run(src, &[]), vec![0]);
}

#[test]
fn for_to_with_from_greater_than_to_runs_zero_times() {
    let src = "DECLARE i, x BEGIN x := 0; FOR i FROM 5 TO 1 DO x := x + 1; ENDFOR WRITE x; END";
    assert_eq!(compile_and_run(src, &[]), vec![0]);
}

#[test]
fn for_downto_with_from_less_than_downto_runs_zero_times() {
    let src = "DECLARE i, x BEGIN x := 0; FOR i FROM 1 DOWNTO 5 DO x := x + 1; ENDFOR WRITE x; END";
    assert_eq!(compile_and_run(src, &[]), vec![0]);
}

#[test]
fn iterator_shadowing_restores_the_outer_binding_on_exit() {
    let src = "DECLARE i BEGIN i := 99; FOR i FROM 1 TO 3 DO WRITE i; ENDFOR WRITE i; END";
    assert_eq!(compile_and_run(src, &[]), vec![1, 2, 3, 99]);
}

#[test]
fn nested_counted_loops_each_get_their_own_iterator() {
    let src = "DECLARE i, j BEGIN FOR i FROM 1 TO 2 DO FOR j FROM 1 TO 2 DO WRITE i; WRITE j; ENDFOR ENDFOR END";
    assert_eq!(compile_and_run(src, &[]), vec![1, 1, 1, 2, 2, 1, 2, 2]);
}

#[test]
fn comparisons_match_saturating_semantics() {
    let src = "BEGIN IF 3 > 5 THEN WRITE 1; ELSE WRITE 0; ENDIF \
               IF 5 > 3 THEN WRITE 1; ELSE WRITE 0; ENDIF \
               IF 3 = 3 THEN WRITE 1; ELSE WRITE 0; ENDIF \
               IF 3 != 3 THEN WRITE 1; ELSE WRITE 0; ENDIF \
               IF 3 <= 3 THEN WRITE 1; ELSE WRITE 0; ENDIF \
               IF 4 >= 5 THEN WRITE 1; ELSE WRITE 0; ENDIF END";
    assert_eq!(compile_and_run(src, &[]), vec![0, 1, 1, 0, 1, 0]);
}

#[test]
fn read_and_write_round_trip_through_io() {
    let src = "DECLARE x BEGIN READ x; WRITE x + 1; END";
    assert_eq!(compile_and_run(src, &[41]), vec![42]);
}

#[test]
fn big_arrays_skip_per_element_initialization_checks() {
    let src = "DECLARE t(0:2000) BEGIN WRITE t(1999); END";
    assert_eq!(compile_and_run(src, &[]), vec![0]);
}

#[test]
fn undeclared_variable_is_reported() {
    let diagnostics = expect_diagnostics("BEGIN WRITE y; END");
    assert!(diagnostics
        .iter()
        .any(|d| matches!(d, imp_codegen::Diagnostic::Undeclared { name, .. } if name == "y")));
}

#[test]
fn no_label_placeholders_survive_finalization() {
    let program = parse("DECLARE i BEGIN FOR i FROM 1 TO 3 DO WRITE i; ENDFOR END").unwrap();
    let asm = compile(&program).unwrap();
    assert!(!asm.contains("LABEL"));
    let lines: Vec<&str> = asm.lines().collect();
    assert_eq!(lines.last(), Some(&"HALT"));
}

#[test]
fn every_jump_target_lands_inside_the_program_and_on_a_real_instruction() {
    let program = parse(
        "DECLARE i BEGIN FOR i FROM 1 TO 5 DO IF i = 3 THEN WRITE i; ENDIF ENDFOR END",
    )
    .unwrap();
    let asm = compile(&program).unwrap();
    let lines: Vec<&str> = asm.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        let mut parts = line.split_whitespace();
        let opcode = parts.next().unwrap();
        let offset: Option<i64> = match opcode {
            "JUMP" => parts.next().map(|s| s.parse().unwrap()),
            "JZERO" | "JODD" => {
                parts.next();
                parts.next().map(|s| s.parse().unwrap())
            }
            _ => None,
        };
        if let Some(off) = offset {
            let target = idx as i64 + off;
            assert!(
                target >= 0 && (target as usize) < lines.len(),
                "jump at {idx} targets out-of-range {target}"
            );
        }
    }
}
