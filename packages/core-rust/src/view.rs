//! Read-side projections of stored records: the data table, the JSON export,
//! and the import template.
//!
//! All three backfill computed fields first, so records stored without a
//! derived value still show one.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::coerce::{float_of, format_fixed2};
use crate::compute::{backfill_computed, LICENSE_EXPIRED};
use crate::field::{order_fields, FieldDescriptor, FieldKind, ID_KEY};
use crate::record::{display_value, record_id, Record, RecordId};
use crate::schema::Schema;

/// The data table for one business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableView {
    /// Column labels, `id` first.
    pub headers: Vec<String>,
    /// Rows in ascending id order; rows without a readable id come last.
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    /// The record id used by edit and delete actions.
    pub id: Option<RecordId>,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub text: String,
    /// Set for values the user should notice, such as an expired licence.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub emphasis: bool,
}

/// Builds the table shown for `records` of `schema`.
#[must_use]
pub fn table_view(records: &[Record], schema: &Schema, today: NaiveDate) -> TableView {
    let columns = order_fields(&schema.fields);
    let headers = columns.iter().map(|f| f.label.clone()).collect();

    let mut sorted: Vec<&Record> = records.iter().collect();
    sorted.sort_by_key(|r| record_id(r).map_or((1, 0), |id| (0, id)));

    let rows = sorted
        .into_iter()
        .map(|record| {
            let filled = backfill_computed(record, &schema.fields, today);
            TableRow {
                id: record_id(record),
                cells: columns.iter().map(|field| cell(field, &filled)).collect(),
            }
        })
        .collect();

    TableView { headers, rows }
}

fn cell(field: &FieldDescriptor, record: &Record) -> Cell {
    let value = record.get(&field.key).unwrap_or(&Value::Null);
    let text = match decimal_text(field, value) {
        Some(fixed) => fixed,
        None => display_value(value),
    };
    let emphasis = matches!(field.kind, FieldKind::LicenseStatus { .. }) && text == LICENSE_EXPIRED;
    Cell { text, emphasis }
}

/// Two-decimal rendering of a filled-in decimal `number` value. `None` for
/// other kinds, blank values, and values with no readable number.
fn decimal_text(field: &FieldDescriptor, value: &Value) -> Option<String> {
    if !field.is_decimal() {
        return None;
    }
    if matches!(value, Value::Null) || value.as_str() == Some("") {
        return None;
    }
    float_of(value).filter(|f| f.is_finite()).map(format_fixed2)
}

/// Projects stored records for the JSON viewer and download.
///
/// Each object starts with `id`, followed by the schema's other fields in
/// order. Only keys present after backfill are emitted, and decimal numbers
/// are rendered as two-decimal strings.
#[must_use]
pub fn export_records(records: &[Record], schema: &Schema, today: NaiveDate) -> Vec<Record> {
    records
        .iter()
        .map(|record| {
            let filled = backfill_computed(record, &schema.fields, today);
            let mut out = Record::new();
            if let Some(id) = filled.get(ID_KEY) {
                out.insert(ID_KEY.to_string(), id.clone());
            }
            for field in schema.fields.iter().filter(|f| !f.is_id()) {
                let Some(value) = filled.get(&field.key) else {
                    continue;
                };
                let value = decimal_text(field, value).map_or_else(|| value.clone(), Value::String);
                out.insert(field.key.clone(), value);
            }
            out
        })
        .collect()
}

/// An example import object listing every key the user must supply.
///
/// Decimal numbers get `"0.00"`, integers `0`, selects their first option,
/// and anything else `"..."`. Computed fields are omitted, as is `id` when
/// the store assigns it.
#[must_use]
pub fn import_template(schema: &Schema) -> Record {
    let mut template = Record::new();
    for field in &schema.fields {
        if field.is_computed() || (field.is_id() && schema.config.id_automatic) {
            continue;
        }
        let example = match &field.kind {
            FieldKind::Number {
                is_integer: false, ..
            } => Value::from("0.00"),
            FieldKind::Number { .. } => Value::from(0),
            FieldKind::Select { options } => {
                Value::from(options.first().map_or("", |o| o.trim()))
            }
            _ => Value::from("..."),
        };
        template.insert(field.key.clone(), example);
    }
    template
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn rec(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn drivers() -> Schema {
        Schema::new(
            "choferes",
            true,
            vec![
                FieldDescriptor::new("Nombre", FieldKind::text()),
                FieldDescriptor::new("Sueldo", FieldKind::decimal()),
                FieldDescriptor::new("Hijos", FieldKind::integer()),
                FieldDescriptor::new(
                    "Turno",
                    FieldKind::Select {
                        options: vec![" Mañana".into(), "Noche".into()],
                    },
                ),
                FieldDescriptor::new("Vencimiento", FieldKind::text()),
                FieldDescriptor::new(
                    "Licencia",
                    FieldKind::LicenseStatus {
                        source_field: "vencimiento".into(),
                    },
                ),
            ],
        )
        .normalized()
        .unwrap()
    }

    #[test]
    fn table_sorts_by_id_and_backfills() {
        let records = vec![
            rec(json!({"id": 3, "nombre": "C", "sueldo": 1500, "vencimiento": "2026-10-18"})),
            rec(json!({"id": "1", "nombre": "A", "sueldo": "99.5", "vencimiento": "2026-10-19"})),
        ];
        let view = table_view(&records, &drivers(), today());

        assert_eq!(
            view.headers,
            vec!["ID", "Nombre", "Sueldo", "Hijos", "Turno", "Vencimiento", "Licencia"]
        );
        assert_eq!(view.rows[0].id, Some(1));
        assert_eq!(view.rows[1].id, Some(3));

        let first = &view.rows[0].cells;
        assert_eq!(first[2].text, "99.50");
        assert_eq!(first[3].text, "");
        assert_eq!(first[6].text, "VIGENTE");
        assert!(!first[6].emphasis);

        let second = &view.rows[1].cells;
        assert_eq!(second[2].text, "1500.00");
        assert_eq!(second[6].text, "VENCIDA");
        assert!(second[6].emphasis);
    }

    #[test]
    fn stored_computed_values_are_kept() {
        let records = vec![rec(json!({
            "id": 1,
            "vencimiento": "2000-01-01",
            "licencia": "VIGENTE"
        }))];
        let view = table_view(&records, &drivers(), today());
        assert_eq!(view.rows[0].cells[6].text, "VIGENTE");
    }

    #[test]
    fn export_puts_id_first_and_fixes_decimals() {
        let records = vec![rec(json!({"nombre": "A", "sueldo": 10, "id": 7, "extra": true}))];
        let exported = export_records(&records, &drivers(), today());
        let keys: Vec<&str> = exported[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "nombre", "sueldo"]);
        assert_eq!(exported[0]["sueldo"], json!("10.00"));
    }

    #[test]
    fn template_covers_user_fields() {
        let template = import_template(&drivers());
        assert_eq!(
            Value::Object(template),
            json!({
                "nombre": "...",
                "sueldo": "0.00",
                "hijos": 0,
                "turno": "Mañana",
                "vencimiento": "..."
            })
        );
    }

    #[test]
    fn template_includes_manual_id() {
        let schema = Schema::new("x", false, vec![FieldDescriptor::new("A", FieldKind::text())])
            .normalized()
            .unwrap();
        let template = import_template(&schema);
        assert_eq!(template.get("id"), Some(&json!(0)));
    }
}
