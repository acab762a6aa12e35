//! Lenient numeric coercion for values typed into forms.
//!
//! Form input is free text, so numbers are read the forgiving way: the
//! longest leading numeric literal wins (`"12kg"` is 12) and anything without
//! one is "not a number". Callers decide whether that means zero, `null`, or
//! leaving the value alone.

use serde_json::Value;

/// Parses the longest leading decimal literal of `s` (after leading
/// whitespace): optional sign, digits with an optional fraction, and an
/// optional exponent.
///
/// ```
/// use formgrid_core::coerce::parse_float;
///
/// assert_eq!(parse_float("  12.5kg"), Some(12.5));
/// assert_eq!(parse_float(".5"), Some(0.5));
/// assert_eq!(parse_float("abc"), None);
/// ```
#[must_use]
pub fn parse_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

/// Parses the leading integer literal of `s` (after leading whitespace).
///
/// A fractional part is ignored: `"12.7"` yields 12.
#[must_use]
pub fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if end == start {
        return None;
    }
    s[..end].parse().ok()
}

/// Reads a JSON value as a float: numbers as-is, strings leniently.
#[must_use]
pub fn float_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float(s),
        _ => None,
    }
}

/// Reads a JSON value as an integer: integral numbers as-is, floats
/// truncated toward zero, strings leniently.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn int_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => parse_int(s),
        _ => None,
    }
}

/// Operand coercion for `calculated` fields: anything unreadable, missing,
/// or non-finite counts as zero.
#[must_use]
pub fn number_or_zero(value: Option<&Value>) -> f64 {
    value
        .and_then(float_of)
        .filter(|f| f.is_finite())
        .unwrap_or(0.0)
}

/// Formats with exactly two decimals, never producing `-0.00`.
#[must_use]
pub fn format_fixed2(value: f64) -> String {
    let formatted = format!("{value:.2}");
    if formatted == "-0.00" {
        "0.00".to_string()
    } else {
        formatted
    }
}

/// Wraps a float as a JSON number. Integral values within the exactly
/// representable range become JSON integers; non-finite values become `null`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn json_number(value: f64) -> Value {
    const EXACT: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() < EXACT {
        return Value::from(value as i64);
    }
    serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
}
