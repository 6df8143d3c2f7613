mod common;
use common::*;
use forthvm::ForthError;
use proptest::prelude::*;

#[test]
fn test_floored_division() {
    let mut rt = bare_forth();
    assert_eq!(run(&mut rt, &["-7 2 / -7 2 MOD"]), vec![-4, 1]);
    rt.f_clear();
    assert_eq!(run(&mut rt, &["7 -2 /MOD"]), vec![-1, -4]);
    rt.f_clear();
    assert_eq!(run(&mut rt, &["-7. 2 FM/MOD -7. 2 SM/REM"]), vec![1, -4, -1, -3]);
}

#[test]
fn test_star_slash() {
    let mut rt = bare_forth();
    assert_eq!(run(&mut rt, &["100000 100000 1000 */"]), vec![10_000_000]);
    rt.f_clear();
    assert_eq!(exec(&mut rt, "65536 65536 UM* D. -1 2 M* D."), "4294967296 -2 ");
}

#[test]
fn test_out_of_range() {
    let mut rt = bare_forth();
    assert_eq!(
        try_line(&mut rt, "-2147483648 -1 /"),
        Err(ForthError::ResultOutOfRange)
    );
    assert_eq!(
        try_line(&mut rt, "100000 100000 1 */"),
        Err(ForthError::ResultOutOfRange)
    );
}

#[test]
fn test_bits_and_comparisons() {
    let mut rt = bare_forth();
    assert_eq!(run(&mut rt, &["1 31 LSHIFT -1 1 RSHIFT 1 32 LSHIFT"]), vec![i32::MIN, i32::MAX, 0]);
    rt.f_clear();
    assert_eq!(run(&mut rt, &["5 1 10 WITHIN 10 1 10 WITHIN -1 10 1 WITHIN"]), vec![-1, 0, -1]);
    rt.f_clear();
    assert_eq!(run(&mut rt, &["-1 1 U< -1 1 < 3 -4 MIN 3 -4 MAX"]), vec![0, -1, -4, 3]);
}

#[test]
fn test_wrapping_cell_arithmetic() {
    let mut rt = bare_forth();
    assert_eq!(run(&mut rt, &["2147483647 1 +"]), vec![i32::MIN]);
}

proptest! {
    #[test]
    fn prop_swap_swap_is_identity(a in any::<i32>(), b in any::<i32>()) {
        let mut rt = bare_forth();
        rt.push(a).unwrap();
        rt.push(b).unwrap();
        rt.interpret_line("SWAP SWAP").unwrap();
        prop_assert_eq!(stack(&rt), vec![a, b]);
    }

    #[test]
    fn prop_slash_mod_reconstructs_dividend(n in -100_000i32..100_000, d in -1000i32..1000) {
        prop_assume!(d != 0);
        let mut rt = bare_forth();
        rt.push(n).unwrap();
        rt.push(d).unwrap();
        rt.interpret_line("/MOD").unwrap();
        let s = stack(&rt);
        prop_assert_eq!(s[1] * d + s[0], n);
        prop_assert!(s[0] == 0 || (s[0] < 0) == (d < 0));
    }
}
