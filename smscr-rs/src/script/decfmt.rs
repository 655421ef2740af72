//! Decimal formatting patterns for the `decfmt` function.
//!
//! Supported pattern language (a subset of the familiar `#,##0.00` style):
//!
//! | Symbol | Meaning                                             |
//! |--------|-----------------------------------------------------|
//! | `0`    | digit, zero-padded                                  |
//! | `#`    | digit, omitted when zero                            |
//! | `,`    | grouping separator; group size = digits after last  |
//! | `.`    | decimal separator                                   |
//! | `%`    | in prefix/suffix: multiply by 100                   |
//! | `;`    | separates an optional negative subpattern           |
//!
//! Any other characters before or after the digits are copied literally.
//! Rounding is half-even on the exact binary value of the number: `0.125`
//! with `0.00` gives `0.12` and `0.375` gives `0.38`, but `0.15` with `0.0`
//! gives `0.1` because the stored double is slightly below `0.15`.

use std::sync::OnceLock;

use regex::Regex;

use super::error::ScriptError;
use super::value::{format_float, parse_number, Number};

/// A compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalPattern {
    prefix: String,
    suffix: String,
    /// `None` means "`-` followed by the positive prefix".
    negative_prefix: Option<String>,
    negative_suffix: Option<String>,
    min_int: usize,
    grouping: Option<usize>,
    min_frac: usize,
    max_frac: usize,
    percent: bool,
}

struct Subpattern {
    prefix: String,
    int: String,
    frac: Option<String>,
    suffix: String,
}

fn grammar() -> Result<&'static Regex, ScriptError> {
    static GRAMMAR: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    GRAMMAR
        .get_or_init(|| Regex::new(r"^([^0-9#,.;]*)([#0,]*)(?:\.([#0]*))?([^0-9#,.;]*)$"))
        .as_ref()
        .map_err(|e| ScriptError::InvalidPattern { pattern: e.to_string() })
}

fn split_subpattern(text: &str, whole: &str) -> Result<Subpattern, ScriptError> {
    let invalid = || ScriptError::InvalidPattern { pattern: whole.to_owned() };
    let caps = grammar()?.captures(text).ok_or_else(invalid)?;
    let group = |i: usize| caps.get(i).map(|m| m.as_str().to_owned());
    Ok(Subpattern {
        prefix: group(1).unwrap_or_default(),
        int: group(2).unwrap_or_default(),
        frac: group(3),
        suffix: group(4).unwrap_or_default(),
    })
}

impl DecimalPattern {
    pub fn parse(pattern: &str) -> Result<Self, ScriptError> {
        let invalid = || ScriptError::InvalidPattern { pattern: pattern.to_owned() };
        let (positive, negative) = match pattern.split_once(';') {
            Some((p, n)) => (p, Some(n)),
            None => (pattern, None),
        };

        let sub = split_subpattern(positive, pattern)?;
        let frac = sub.frac.unwrap_or_default();
        let int_digits: String = sub.int.chars().filter(|&c| c != ',').collect();

        if int_digits.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        // `#` may not follow `0` before the point, nor precede `0` after it.
        if int_digits.trim_start_matches('#').contains('#')
            || frac.trim_end_matches('#').contains('#')
        {
            return Err(invalid());
        }
        let grouping = match sub.int.rfind(',') {
            Some(at) => {
                let size = sub.int.len() - at - 1;
                if size == 0 {
                    return Err(invalid());
                }
                Some(size)
            }
            None => None,
        };

        let (negative_prefix, negative_suffix) = match negative {
            Some(n) => {
                let neg = split_subpattern(n, pattern)?;
                (Some(neg.prefix), Some(neg.suffix))
            }
            None => (None, None),
        };

        let percent = sub.prefix.contains('%') || sub.suffix.contains('%');
        Ok(Self {
            prefix: sub.prefix,
            suffix: sub.suffix,
            negative_prefix,
            negative_suffix,
            min_int: int_digits.matches('0').count(),
            grouping,
            min_frac: frac.matches('0').count(),
            max_frac: frac.len(),
            percent,
        })
    }

    pub fn format(&self, n: Number) -> String {
        let (negative, mut int, mut frac) = match n {
            Number::Int(i) => (i < 0, i.unsigned_abs().to_string(), String::new()),
            Number::Float(x) if !x.is_finite() => {
                return format!("{}{}{}", self.prefix, format_float(x), self.suffix);
            }
            Number::Float(x) => {
                // Full expansion: a double never has more than 1074 fraction digits.
                let text = format!("{:.1074}", x.abs());
                let (i, f) = text.split_once('.').unwrap_or((text.as_str(), ""));
                (x < 0.0, i.to_owned(), f.trim_end_matches('0').to_owned())
            }
        };

        if self.percent {
            while frac.len() < 2 {
                frac.push('0');
            }
            int.push_str(&frac[..2]);
            frac.drain(..2);
        }

        round_half_even(&mut int, &mut frac, self.max_frac);

        while frac.len() > self.min_frac && frac.ends_with('0') {
            frac.pop();
        }
        while frac.len() < self.min_frac {
            frac.push('0');
        }
        let trimmed = int.trim_start_matches('0');
        let mut digits = "0".repeat(self.min_int.saturating_sub(trimmed.len()));
        digits.push_str(trimmed);
        if digits.is_empty() && frac.is_empty() {
            digits.push('0');
        }

        let is_zero = digits.bytes().chain(frac.bytes()).all(|b| b == b'0');
        let mut out = String::new();
        if negative && !is_zero {
            match &self.negative_prefix {
                Some(p) => out.push_str(p),
                None => {
                    out.push('-');
                    out.push_str(&self.prefix);
                }
            }
        } else {
            out.push_str(&self.prefix);
        }
        match self.grouping {
            Some(size) => out.push_str(&group(&digits, size)),
            None => out.push_str(&digits),
        }
        if !frac.is_empty() {
            out.push('.');
            out.push_str(&frac);
        }
        match (&self.negative_suffix, negative && !is_zero) {
            (Some(s), true) => out.push_str(s),
            _ => out.push_str(&self.suffix),
        }
        out
    }
}

/// Round the decimal `int.frac` to at most `max_frac` fraction digits.
fn round_half_even(int: &mut String, frac: &mut String, max_frac: usize) {
    if frac.len() <= max_frac {
        return;
    }
    let dropped = frac.split_off(max_frac);
    let bytes = dropped.as_bytes();
    let first = bytes[0];
    let rest_nonzero = bytes[1..].iter().any(|&b| b != b'0');
    let last_kept = frac.bytes().last().or_else(|| int.bytes().last()).unwrap_or(b'0');
    let round_up =
        first > b'5' || (first == b'5' && (rest_nonzero || (last_kept - b'0') % 2 == 1));
    if !round_up {
        return;
    }

    let mut digits: Vec<u8> = int.bytes().chain(frac.bytes()).collect();
    let mut carry = true;
    for d in digits.iter_mut().rev() {
        if *d == b'9' {
            *d = b'0';
        } else {
            *d += 1;
            carry = false;
            break;
        }
    }
    if carry {
        digits.insert(0, b'1');
    }
    let split = digits.len() - frac.len();
    *frac = String::from_utf8_lossy(&digits[split..]).into_owned();
    *int = String::from_utf8_lossy(&digits[..split]).into_owned();
}

fn group(digits: &str, size: usize) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / size);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % size == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format numeric text `number` with `pattern`.
pub fn decfmt(number: &str, pattern: &str) -> Result<String, ScriptError> {
    Ok(DecimalPattern::parse(pattern)?.format(parse_number(number)?))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(n: &str, p: &str) -> String {
        decfmt(n, p).unwrap()
    }

    #[test]
    fn fixed_fraction_digits() {
        assert_eq!(fmt("3.14159", "0.00"), "3.14");
        assert_eq!(fmt("2", "0.000"), "2.000");
        assert_eq!(fmt("2.5", "0.0#"), "2.5");
        assert_eq!(fmt("2.567", "0.0#"), "2.57");
    }

    #[test]
    fn grouping() {
        assert_eq!(fmt("1234567.891", "#,##0.0"), "1,234,567.9");
        assert_eq!(fmt("1234567", "#,##0"), "1,234,567");
        assert_eq!(fmt("123", "#,##0"), "123");
        assert_eq!(fmt("12345678", "#,####"), "1234,5678");
    }

    #[test]
    fn half_even_rounding() {
        assert_eq!(fmt("0.125", "0.00"), "0.12");
        assert_eq!(fmt("0.375", "0.00"), "0.38");
        assert_eq!(fmt("0.1251", "0.00"), "0.13");
        assert_eq!(fmt("2.5", "0"), "2");
        assert_eq!(fmt("3.5", "0"), "4");
    }

    #[test]
    fn rounding_sees_the_stored_binary_value() {
        assert_eq!(fmt("0.15", "0.0"), "0.1");
        assert_eq!(fmt("0.35", "0.0"), "0.3");
        assert_eq!(fmt("2.675", "0.00"), "2.67");
        assert_eq!(fmt("1.005", "0.00"), "1.00");
        assert_eq!(fmt("0.45", "0.0"), "0.5");
    }

    #[test]
    fn carry_propagates_into_integer_part() {
        assert_eq!(fmt("9.996", "0.00"), "10.00");
        assert_eq!(fmt("999.9", "#,##0"), "1,000");
    }

    #[test]
    fn integer_padding_and_optional_digits() {
        assert_eq!(fmt("7", "000"), "007");
        assert_eq!(fmt("0.5", "#.##"), ".5");
        assert_eq!(fmt("0", "#"), "0");
    }

    #[test]
    fn negatives() {
        assert_eq!(fmt("-1234.5", "#,##0.00"), "-1,234.50");
        assert_eq!(fmt("-0.001", "0.00"), "0.00");
        assert_eq!(fmt("-5", "0;(0)"), "(5)");
        assert_eq!(fmt("5", "0;(0)"), "5");
    }

    #[test]
    fn prefix_suffix_and_percent() {
        assert_eq!(fmt("12.5", "$0.00"), "$12.50");
        assert_eq!(fmt("0.256", "0.0%"), "25.6%");
        assert_eq!(fmt("3", "0 kg"), "3 kg");
    }

    #[test]
    fn non_finite() {
        assert_eq!(DecimalPattern::parse("0.0").unwrap().format(Number::Float(f64::NAN)), "NaN");
    }

    #[test]
    fn invalid_patterns() {
        for p in ["", "abc", "0#", "0.#0", "#,##0,", "0.0.0", "1.00"] {
            assert!(
                matches!(decfmt("1", p), Err(ScriptError::InvalidPattern { .. })),
                "pattern {p:?} should be rejected"
            );
        }
    }

    #[test]
    fn bad_number() {
        assert!(matches!(decfmt("abc", "0.00"), Err(ScriptError::NotANumber { .. })));
    }
}
