//! Computation engine for derived fields.
//!
//! Given a record and the schema's field descriptors, [`compute_derived`]
//! produces a copy of the record with every computed field written:
//!
//! | kind             | value                                              |
//! |------------------|----------------------------------------------------|
//! | `calculated`     | `field1 * field2` as a string with two decimals    |
//! | `age`            | whole years since `source_field`, as an integer    |
//! | `license_status` | `"VIGENTE"` if `source_field` is today or later, else `"VENCIDA"` |
//!
//! The engine never fails. Unreadable operands count as zero, and an
//! unreadable or out-of-range date leaves the target field untouched.
//!
//! Operands are always read from the input record, never from values derived
//! earlier in the same pass. Computed fields are overwritten rather than
//! accumulated, so applying the engine twice with the same `today` gives the
//! same record as applying it once.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::coerce::{format_fixed2, number_or_zero};
use crate::field::{FieldDescriptor, FieldKind};
use crate::record::{is_truthy, Record};

/// Ages at or above this bound are treated as data-entry mistakes.
pub const MAX_AGE: i32 = 150;

/// Status text for a licence whose expiry date has not passed.
pub const LICENSE_VALID: &str = "VIGENTE";

/// Status text for a licence whose expiry date has passed.
pub const LICENSE_EXPIRED: &str = "VENCIDA";

/// Validity of a licence relative to the current date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseStatus {
    /// Expiry date is today or in the future.
    Valid,
    /// Expiry date is in the past.
    Expired,
}

impl LicenseStatus {
    /// Status for an expiry date as of `today`.
    #[must_use]
    pub fn as_of(expiry: NaiveDate, today: NaiveDate) -> Self {
        if expiry >= today {
            Self::Valid
        } else {
            Self::Expired
        }
    }

    /// The stored text for this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => LICENSE_VALID,
            Self::Expired => LICENSE_EXPIRED,
        }
    }
}

/// Returns a copy of `record` with every computed field derived from the
/// record's other values.
///
/// Fields are processed in the order given. Non-computed fields pass through
/// unchanged.
#[must_use]
pub fn compute_derived(record: &Record, fields: &[FieldDescriptor], today: NaiveDate) -> Record {
    let mut derived = record.clone();
    for field in fields {
        if let Some(value) = derive_field(field, record, today) {
            derived.insert(field.key.clone(), value);
        }
    }
    derived
}

/// Fills in computed fields that are absent, `null`, or empty in a stored
/// record, leaving every stored value as it is.
///
/// Records written before a computed field existed, or persisted without it,
/// are completed this way at read time.
#[must_use]
pub fn backfill_computed(record: &Record, fields: &[FieldDescriptor], today: NaiveDate) -> Record {
    let mut filled = record.clone();
    for field in fields.iter().filter(|f| f.is_computed()) {
        let present = match record.get(&field.key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        };
        if present {
            continue;
        }
        if let Some(value) = derive_field(field, record, today) {
            filled.insert(field.key.clone(), value);
        }
    }
    filled
}

/// Derives the value of a single computed field, or `None` when the field is
/// not computed or its inputs do not allow a value.
#[must_use]
pub fn derive_field(field: &FieldDescriptor, record: &Record, today: NaiveDate) -> Option<Value> {
    match &field.kind {
        FieldKind::Calculated { field1, field2 } => {
            if field1.is_empty() || field2.is_empty() {
                return None;
            }
            let product = number_or_zero(record.get(field1)) * number_or_zero(record.get(field2));
            Some(Value::String(format_fixed2(product)))
        }
        FieldKind::Age { source_field } => {
            let birth = source_date(record, source_field)?;
            age_on(birth, today).map(Value::from)
        }
        FieldKind::LicenseStatus { source_field } => {
            let expiry = source_date(record, source_field)?;
            Some(Value::String(
                LicenseStatus::as_of(expiry, today).as_str().to_string(),
            ))
        }
        FieldKind::Text { .. } | FieldKind::Number { .. } | FieldKind::Select { .. } => None,
    }
}

/// Whole years elapsed from `birth` to `today`, or `None` when the result is
/// negative or implausibly large.
#[must_use]
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> Option<i32> {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    (0..MAX_AGE).contains(&age).then_some(age)
}

/// Parses a date typed into a form or found in imported JSON.
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, `MM/DD/YYYY`, RFC 3339 timestamps
/// (taken in their own offset) and naive `YYYY-MM-DDTHH:MM[:SS]` timestamps.
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(text, format) {
            return Some(stamp.date());
        }
    }
    None
}

fn source_date(record: &Record, source_field: &str) -> Option<NaiveDate> {
    if source_field.is_empty() {
        return None;
    }
    match record.get(source_field) {
        Some(value @ Value::String(text)) if is_truthy(value) => parse_date(text),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rec(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn total_field() -> FieldDescriptor {
        FieldDescriptor {
            key: "total".into(),
            label: "Total".into(),
            locked: false,
            kind: FieldKind::Calculated {
                field1: "precio".into(),
                field2: "cantidad".into(),
            },
        }
    }

    fn age_field() -> FieldDescriptor {
        FieldDescriptor::new(
            "Edad",
            FieldKind::Age {
                source_field: "nacimiento".into(),
            },
        )
    }

    fn license_field() -> FieldDescriptor {
        FieldDescriptor::new(
            "Estado",
            FieldKind::LicenseStatus {
                source_field: "vence".into(),
            },
        )
    }

    const TODAY: (i32, u32, u32) = (2026, 10, 19);

    fn today() -> NaiveDate {
        day(TODAY.0, TODAY.1, TODAY.2)
    }

    #[test]
    fn calculated_multiplies_with_two_decimals() {
        let out = compute_derived(
            &rec(json!({"precio": "10", "cantidad": "3"})),
            &[total_field()],
            today(),
        );
        assert_eq!(out["total"], "30.00");
        assert_eq!(out["precio"], "10");
    }

    #[test]
    fn calculated_treats_bad_operands_as_zero() {
        let out = compute_derived(
            &rec(json!({"precio": "abc"})),
            &[total_field()],
            today(),
        );
        assert_eq!(out["total"], "0.00");

        let out = compute_derived(
            &rec(json!({"precio": 2.5, "cantidad": "4"})),
            &[total_field()],
            today(),
        );
        assert_eq!(out["total"], "10.00");
    }

    #[test]
    fn calculated_without_operands_is_skipped() {
        let field = FieldDescriptor::new(
            "Total",
            FieldKind::Calculated {
                field1: "precio".into(),
                field2: String::new(),
            },
        );
        let out = compute_derived(&rec(json!({"precio": "2"})), &[field], today());
        assert!(!out.contains_key("total"));
    }

    #[test]
    fn age_counts_elapsed_years() {
        let fields = [age_field()];

        let out = compute_derived(&rec(json!({"nacimiento": "2008-10-19"})), &fields, today());
        assert_eq!(out["edad"], 18);

        let out = compute_derived(&rec(json!({"nacimiento": "2008-10-20"})), &fields, today());
        assert_eq!(out["edad"], 17);

        let out = compute_derived(&rec(json!({"nacimiento": "2026-10-19"})), &fields, today());
        assert_eq!(out["edad"], 0);
    }

    #[test]
    fn age_out_of_range_or_unparseable_is_unset() {
        let fields = [age_field()];
        for birth in ["2030-01-01", "1800-01-01", "not a date", ""] {
            let out = compute_derived(&rec(json!({"nacimiento": birth})), &fields, today());
            assert!(!out.contains_key("edad"), "birth {birth:?}");
        }
        let out = compute_derived(&rec(json!({"nacimiento": 20_081_019})), &fields, today());
        assert!(!out.contains_key("edad"));
    }

    #[test]
    fn age_handles_leap_day_birthdays() {
        let birth = day(2004, 2, 29);
        assert_eq!(age_on(birth, day(2022, 2, 28)), Some(17));
        assert_eq!(age_on(birth, day(2022, 3, 1)), Some(18));
        assert_eq!(age_on(birth, day(2024, 2, 29)), Some(20));
    }

    #[test]
    fn license_valid_through_expiry_day() {
        let fields = [license_field()];

        let out = compute_derived(&rec(json!({"vence": "2026-10-19"})), &fields, today());
        assert_eq!(out["estado"], LICENSE_VALID);

        let out = compute_derived(&rec(json!({"vence": "2026-10-18"})), &fields, today());
        assert_eq!(out["estado"], LICENSE_EXPIRED);

        let out = compute_derived(&rec(json!({"vence": "2027-01-01"})), &fields, today());
        assert_eq!(out["estado"], LICENSE_VALID);
    }

    #[test]
    fn license_unparseable_leaves_previous_value() {
        let out = compute_derived(
            &rec(json!({"vence": "pronto", "estado": "VIGENTE"})),
            &[license_field()],
            today(),
        );
        assert_eq!(out["estado"], "VIGENTE");
    }

    #[test]
    fn parse_date_formats() {
        assert_eq!(parse_date("2024-03-05"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("2024/03/05"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("03/05/2024"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05T10:00:00Z"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05T23:30"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("2024-02-30"), None);
        assert_eq!(parse_date("ayer"), None);
    }

    #[test]
    fn input_is_not_mutated() {
        let input = rec(json!({"precio": "1", "cantidad": "2"}));
        let before = input.clone();
        let _ = compute_derived(&input, &[total_field()], today());
        assert_eq!(input, before);
    }

    #[test]
    fn stale_computed_values_are_overwritten() {
        let out = compute_derived(
            &rec(json!({"precio": "2", "cantidad": "2", "total": "999.00"})),
            &[total_field()],
            today(),
        );
        assert_eq!(out["total"], "4.00");
    }

    #[test]
    fn backfill_only_fills_missing_values() {
        let fields = [total_field(), license_field()];
        let stored = rec(json!({
            "precio": "2", "cantidad": "3", "total": "1.00",
            "vence": "2020-01-01", "estado": ""
        }));
        let out = backfill_computed(&stored, &fields, today());
        assert_eq!(out["total"], "1.00");
        assert_eq!(out["estado"], LICENSE_EXPIRED);

        let missing = rec(json!({"precio": "2", "cantidad": "3"}));
        let out = backfill_computed(&missing, &fields, today());
        assert_eq!(out["total"], "6.00");
        assert!(!out.contains_key("estado"));
    }

    proptest! {
        #[test]
        fn compute_is_idempotent(
            precio in prop_oneof![Just(String::new()), "[0-9]{1,4}(\\.[0-9]{1,3})?", ".{0,6}"],
            cantidad in prop_oneof!["-?[0-9]{1,3}", ".{0,6}"],
            y in 1880i32..2040,
            m in 1u32..=12,
            d in 1u32..=28,
            garbage in any::<bool>(),
        ) {
            let date = if garbage { "??".to_string() } else { format!("{y:04}-{m:02}-{d:02}") };
            let record = rec(json!({
                "precio": precio,
                "cantidad": cantidad,
                "nacimiento": date.clone(),
                "vence": date,
            }));
            let fields = [total_field(), age_field(), license_field()];
            let once = compute_derived(&record, &fields, today());
            let twice = compute_derived(&once, &fields, today());
            prop_assert_eq!(once, twice);
        }
    }
}
