//! Assembly of the record persisted when a form is submitted.

use chrono::NaiveDate;
use serde_json::Value;

use crate::coerce::{float_of, int_of, json_number};
use crate::compute::compute_derived;
use crate::error::FormError;
use crate::field::{FieldKind, ID_KEY};
use crate::record::{is_blank, is_missing, Record, RecordId};
use crate::schema::{RequiredFor, Schema};

/// Builds the record to persist from raw form values.
///
/// When `editing` is set, the record's `id` is forced to it regardless of
/// what the form holds. Computed fields are derived, required fields are
/// checked (missing ones are reported in schema order), and `number` fields
/// are coerced to JSON numbers.
///
/// # Errors
///
/// Returns [`FormError::MissingRequiredFields`] when a required field is
/// absent or blank.
pub fn build_payload(
    values: &Record,
    schema: &Schema,
    editing: Option<RecordId>,
    today: NaiveDate,
) -> Result<Record, FormError> {
    let mut input = values.clone();
    if let Some(id) = editing {
        input.insert(ID_KEY.to_string(), Value::from(id));
    }

    let mut record = compute_derived(&input, &schema.fields, today);

    let purpose = if editing.is_some() {
        RequiredFor::Edit
    } else {
        RequiredFor::Create
    };
    let missing: Vec<String> = schema
        .required_fields(purpose)
        .filter(|field| is_missing(&record, &field.key))
        .map(|field| field.key.clone())
        .collect();
    if !missing.is_empty() {
        return Err(FormError::MissingRequiredFields {
            object: None,
            fields: missing,
        });
    }

    coerce_numbers(&mut record, schema);
    Ok(record)
}

/// Converts every filled-in `number` field to a JSON number. Values with no
/// readable number become `null`; blank values are left untouched.
pub fn coerce_numbers(record: &mut Record, schema: &Schema) {
    for field in &schema.fields {
        let FieldKind::Number { is_integer, .. } = field.kind else {
            continue;
        };
        let Some(value) = record.get_mut(&field.key) else {
            continue;
        };
        if is_blank(value) {
            continue;
        }
        *value = if is_integer {
            int_of(value).map_or(Value::Null, Value::from)
        } else {
            float_of(value)
                .filter(|f| f.is_finite())
                .map_or(Value::Null, json_number)
        };
    }
}
