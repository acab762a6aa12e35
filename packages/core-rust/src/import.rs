//! Bulk JSON import: parse, validate the whole batch, then derive computed
//! fields.
//!
//! Validation is all-or-nothing. The first invalid object aborts the batch
//! and nothing is returned for persistence.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use crate::compute::compute_derived;
use crate::error::FormError;
use crate::record::{display_value, is_truthy, Record};
use crate::schema::{RequiredFor, Schema};

/// Parses `json_text` (one object or an array of objects) and returns the
/// records ready to persist, in input order.
///
/// # Errors
///
/// - [`FormError::InvalidJsonSyntax`] when the text is not JSON;
/// - [`FormError::InvalidImportShape`] when the top level is neither an
///   object nor an array;
/// - [`FormError::EmptyImport`] for an empty array;
/// - [`FormError::NotAnObject`] when an array element is not an object;
/// - [`FormError::MissingRequiredFields`] / [`FormError::InvalidSelectOption`]
///   for the first object failing validation, with its 1-based index.
pub fn prepare_import(
    json_text: &str,
    schema: &Schema,
    today: NaiveDate,
) -> Result<Vec<Record>, FormError> {
    let parsed: Value =
        serde_json::from_str(json_text).map_err(|e| FormError::InvalidJsonSyntax(e.to_string()))?;

    let items = match parsed {
        Value::Object(object) => vec![Value::Object(object)],
        Value::Array(items) => items,
        _ => return Err(FormError::InvalidImportShape),
    };
    if items.is_empty() {
        return Err(FormError::EmptyImport);
    }

    let mut objects = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let index = i + 1;
        let Value::Object(object) = item else {
            return Err(FormError::NotAnObject { index });
        };
        validate_object(&object, schema, index)?;
        objects.push(object);
    }

    debug!(business = %schema.name, count = objects.len(), "import batch validated");

    Ok(objects
        .iter()
        .map(|object| compute_derived(object, &schema.fields, today))
        .collect())
}

/// Checks one import object: every required key must be present (any value
/// counts), and every truthy `select` value must match an option ignoring
/// case and surrounding whitespace.
///
/// # Errors
///
/// See [`prepare_import`]; `index` is reported as the object position.
pub fn validate_object(object: &Record, schema: &Schema, index: usize) -> Result<(), FormError> {
    let missing: Vec<String> = schema
        .required_keys(RequiredFor::Import)
        .into_iter()
        .filter(|key| !object.contains_key(*key))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(FormError::MissingRequiredFields {
            object: Some(index),
            fields: missing,
        });
    }

    for (field, options) in schema.select_fields() {
        let Some(value) = object.get(&field.key).filter(|v| is_truthy(v)) else {
            continue;
        };
        let text = display_value(value);
        let wanted = text.trim().to_lowercase();
        let allowed = options
            .iter()
            .any(|option| option.trim().to_lowercase() == wanted);
        if !allowed {
            return Err(FormError::InvalidSelectOption {
                object: Some(index),
                field: field.label.clone(),
                value: text,
                allowed: options.to_vec(),
            });
        }
    }

    Ok(())
}
