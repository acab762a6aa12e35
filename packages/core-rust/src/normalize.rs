//! Per-keystroke clamping of form input against a field's constraints.
//!
//! These clamps are advisory: they keep what the user sees within the
//! field's limits while typing, but values arriving through bulk import are
//! stored as given.

use crate::coerce::{format_fixed2, parse_float};
use crate::field::{FieldDescriptor, FieldKind};

/// Digits kept after the decimal point while typing into a decimal field.
pub const INPUT_DECIMALS: usize = 2;

/// Returns the corrected value for an input bound to `field`.
///
/// Rules run in order on the running value, each only when it applies:
///
/// 1. integer `number`: decimal points are stripped;
/// 2. decimal `number`: more than two fraction digits are rounded to two;
/// 3. `text` with `max_length`: truncated to that many characters;
/// 4. `number` with `num_length`: when the digit count (decimal point
///    excluded) exceeds the limit, the last typed character is dropped.
///
/// Never fails; values it cannot interpret are returned unchanged.
#[must_use]
pub fn normalize(field: &FieldDescriptor, raw: &str) -> String {
    let mut value = raw.to_string();

    match &field.kind {
        FieldKind::Number {
            num_length,
            is_integer,
            ..
        } => {
            if *is_integer {
                value.retain(|c| c != '.');
            } else {
                value = clamp_fraction(value);
            }
            if let Some(limit) = *num_length {
                let digits = value.chars().filter(|c| *c != '.').count();
                if digits > limit {
                    value.pop();
                }
            }
        }
        FieldKind::Text {
            max_length: Some(limit),
        } => {
            if value.chars().count() > *limit {
                value = value.chars().take(*limit).collect();
            }
        }
        _ => {}
    }

    value
}

fn clamp_fraction(value: String) -> String {
    let too_long = value
        .split_once('.')
        .is_some_and(|(_, fraction)| fraction.chars().count() > INPUT_DECIMALS);
    if !too_long {
        return value;
    }
    match parse_float(&value) {
        Some(number) if number.is_finite() => format_fixed2(number),
        _ => value,
    }
}
