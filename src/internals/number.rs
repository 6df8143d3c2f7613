/// Number recognition and number-to-text conversion
///
/// A token is a number if it reads as an optional sign, an optional base prefix
/// (`#` decimal, `$` hex, `%` binary; the sign may come before or after the prefix),
/// then digits in the current base. Any of the punctuation marks `, . + - / :` among the
/// digits makes the number a double, and DPL records how many digits followed the last
/// one. `'c'` is the character code of c.
///
/// Accumulation wraps, as it would in a fixed-width register.
///
use crate::kernel::{Cell, DCell};

const PUNCTUATION: &[u8] = b",.+-/:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Number {
    Single(Cell),
    Double(DCell),
}

fn digit_value(c: u8, base: u32) -> Option<u64> {
    (c as char).to_digit(base).map(u64::from)
}

fn prefix_base(c: u8) -> Option<u32> {
    match c {
        b'#' => Some(10),
        b'$' => Some(16),
        b'%' => Some(2),
        _ => None,
    }
}

/// parse_number converts a token in the given base
///     Returns the number and the DPL value (-1 for singles), or None if the token
///     is not a number.
///
pub fn parse_number(token: &str, base: u32) -> Option<(Number, Cell)> {
    let b = token.as_bytes();
    if b.len() == 3 && b[0] == b'\'' && b[2] == b'\'' {
        return Some((Number::Single(b[1] as Cell), -1));
    }

    let mut i = 0;
    let mut negative = false;
    let mut base = base;
    if b.get(i) == Some(&b'-') {
        negative = true;
        i += 1;
    }
    if let Some(pb) = b.get(i).and_then(|c| prefix_base(*c)) {
        base = pb;
        i += 1;
    }
    if !negative && b.get(i) == Some(&b'-') {
        negative = true;
        i += 1;
    }

    let mut acc: u64 = 0;
    let mut digits = 0;
    let mut dpl: Cell = -1;
    for &c in &b[i..] {
        if let Some(d) = digit_value(c, base) {
            acc = acc.wrapping_mul(base as u64).wrapping_add(d);
            digits += 1;
            if dpl >= 0 {
                dpl += 1;
            }
        } else if PUNCTUATION.contains(&c) {
            dpl = 0;
        } else {
            return None;
        }
    }
    if digits == 0 {
        return None;
    }

    let number = if dpl >= 0 {
        let d = acc as DCell;
        Number::Double(if negative { d.wrapping_neg() } else { d })
    } else {
        let n = acc as u32 as Cell;
        Number::Single(if negative { n.wrapping_neg() } else { n })
    };
    Some((number, dpl))
}

/// numeric_shape reports whether a token that failed to parse was meant to be a number
///     It is, if a decimal digit follows the optional sign and prefix.
///
pub fn numeric_shape(token: &str) -> bool {
    let b = token.as_bytes();
    let mut i = 0;
    if b.get(i) == Some(&b'-') {
        i += 1;
    }
    if b.get(i).and_then(|c| prefix_base(*c)).is_some() {
        i += 1;
    }
    if b.get(i) == Some(&b'-') {
        i += 1;
    }
    b.get(i).map_or(false, |c| c.is_ascii_digit())
}

/// format_unsigned renders u in the given base, with upper case digits
pub fn format_unsigned(mut u: u64, base: u32) -> String {
    let base = base as u64;
    let mut digits = Vec::new();
    loop {
        let d = (u % base) as u32;
        digits.push(std::char::from_digit(d, base as u32).unwrap_or('?').to_ascii_uppercase());
        u /= base;
        if u == 0 {
            break;
        }
    }
    digits.iter().rev().collect()
}

/// format_number renders a signed value in the given base
pub fn format_number(n: i64, base: u32) -> String {
    let text = format_unsigned(n.unsigned_abs(), base);
    if n < 0 {
        format!("-{}", text)
    } else {
        text
    }
}

/// number_repr is the text that reads back as the same number: doubles get a trailing '.'
pub fn number_repr(n: Number, base: u32) -> String {
    match n {
        Number::Single(v) => format_number(v as i64, base),
        Number::Double(d) => format!("{}.", format_number(d, base)),
    }
}

/////////////////////////
/// TESTS
///
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decimal_singles() {
        assert_eq!(parse_number("42", 10), Some((Number::Single(42), -1)));
        assert_eq!(parse_number("-42", 10), Some((Number::Single(-42), -1)));
        assert_eq!(parse_number("0", 10), Some((Number::Single(0), -1)));
    }

    #[test]
    fn test_rejects_non_numbers() {
        assert_eq!(parse_number("", 10), None);
        assert_eq!(parse_number("-", 10), None);
        assert_eq!(parse_number("12x", 10), None);
        assert_eq!(parse_number("dup", 10), None);
        assert_eq!(parse_number("$", 10), None);
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(parse_number("$ff", 10), Some((Number::Single(255), -1)));
        assert_eq!(parse_number("$FF", 10), Some((Number::Single(255), -1)));
        assert_eq!(parse_number("%101", 10), Some((Number::Single(5), -1)));
        assert_eq!(parse_number("#99", 16), Some((Number::Single(99), -1)));
        assert_eq!(parse_number("-$10", 10), Some((Number::Single(-16), -1)));
        assert_eq!(parse_number("$-10", 10), Some((Number::Single(-16), -1)));
    }

    #[test]
    fn test_char_literal() {
        assert_eq!(parse_number("'A'", 10), Some((Number::Single(65), -1)));
        assert_eq!(parse_number("' '", 10), Some((Number::Single(32), -1)));
    }

    #[test]
    fn test_base_digits() {
        assert_eq!(parse_number("ff", 16), Some((Number::Single(255), -1)));
        assert_eq!(parse_number("ff", 10), None);
        assert_eq!(parse_number("z", 36), Some((Number::Single(35), -1)));
    }

    #[test]
    fn test_punctuation_makes_double() {
        assert_eq!(parse_number("123.", 10), Some((Number::Double(123), 0)));
        assert_eq!(parse_number("1.23", 10), Some((Number::Double(123), 2)));
        assert_eq!(parse_number("1,000,000", 10), Some((Number::Double(1_000_000), 3)));
        assert_eq!(parse_number("12:30", 10), Some((Number::Double(1230), 2)));
        assert_eq!(parse_number("-5.", 10), Some((Number::Double(-5), 0)));
    }

    #[test]
    fn test_single_wraps() {
        assert_eq!(parse_number("4294967295", 10), Some((Number::Single(-1), -1)));
        assert_eq!(parse_number("-2147483648", 10), Some((Number::Single(i32::MIN), -1)));
    }

    #[test]
    fn test_numeric_shape() {
        assert!(numeric_shape("12x"));
        assert!(numeric_shape("-9q"));
        assert!(numeric_shape("$1g"));
        assert!(!numeric_shape("foo"));
        assert!(!numeric_shape("-"));
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_number(255, 16), "FF");
        assert_eq!(format_number(-10, 10), "-10");
        assert_eq!(format_number(i64::MIN, 16), "-8000000000000000");
        assert_eq!(format_unsigned(u32::MAX as u64, 10), "4294967295");
        assert_eq!(format_unsigned(0, 2), "0");
        assert_eq!(number_repr(Number::Double(-7), 10), "-7.");
    }

    fn any_base() -> impl Strategy<Value = u32> {
        prop_oneof![Just(2u32), Just(8), Just(10), Just(16), Just(36), 2u32..=36]
    }

    proptest! {
        /// Printing a parsed single and reading it back gives the same single.
        #[test]
        fn prop_single_round_trip(n in any::<i32>(), base in any_base()) {
            let text = number_repr(Number::Single(n), base);
            prop_assert_eq!(parse_number(&text, base), Some((Number::Single(n), -1)));
        }

        /// Doubles keep their value and their double classification.
        #[test]
        fn prop_double_round_trip(d in any::<i64>(), base in any_base()) {
            let text = number_repr(Number::Double(d), base);
            let (n, _) = parse_number(&text, base).unwrap();
            prop_assert_eq!(n, Number::Double(d));
        }

        /// Any accepted token re-reads from its own printed form.
        #[test]
        fn prop_accepted_tokens_are_idempotent(token in "-?[$%#]?[0-9a-fA-F]{1,12}([.,][0-9]{0,3})?", base in any_base()) {
            if let Some((n, _)) = parse_number(&token, base) {
                let again = parse_number(&number_repr(n, base), base).map(|(m, _)| m);
                prop_assert_eq!(again, Some(n));
            }
        }
    }
}
