use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::field::{derive_key, FieldDescriptor, FieldKind, ID_KEY};

/// A user-defined business: a name plus the ordered list of its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Unique business name.
    #[serde(alias = "nombre")]
    pub name: String,
    /// Business-wide options.
    #[serde(default)]
    pub config: SchemaConfig,
    /// Field definitions. After [`Schema::normalized`], `id` is always first.
    #[serde(alias = "campos")]
    pub fields: Vec<FieldDescriptor>,
}

/// Business-wide options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaConfig {
    /// Whether record ids are assigned by the store rather than typed in.
    #[serde(alias = "idAutomatico")]
    pub id_automatic: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self { id_automatic: true }
    }
}

/// Which operation a required-field set is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredFor {
    /// Submitting a new record from the form.
    Create,
    /// Submitting changes to an existing record; its id is already known.
    Edit,
    /// Bulk JSON import.
    Import,
}

impl Schema {
    /// Creates a schema from user fields. The `id` field is added by
    /// [`Schema::normalized`].
    #[must_use]
    pub fn new(name: impl Into<String>, id_automatic: bool, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            config: SchemaConfig { id_automatic },
            fields,
        }
    }

    /// Validates the schema and brings it into canonical form.
    ///
    /// Trims the name, derives missing keys from labels, inserts the `id`
    /// field when absent and moves it first.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] when the name or a label is blank, when no
    /// user field is defined, or when two fields share a key.
    pub fn normalized(mut self) -> Result<Self, SchemaError> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(SchemaError::BlankName);
        }

        let mut seen = HashSet::new();
        for field in &mut self.fields {
            field.label = field.label.trim().to_string();
            if field.label.is_empty() {
                return Err(SchemaError::BlankLabel);
            }
            if field.key.trim().is_empty() {
                field.key = derive_key(&field.label);
            }
            if !seen.insert(field.key.clone()) {
                return Err(SchemaError::DuplicateKey {
                    key: field.key.clone(),
                });
            }
        }

        match self.fields.iter().position(FieldDescriptor::is_id) {
            Some(0) => {}
            Some(pos) => {
                let id = self.fields.remove(pos);
                self.fields.insert(0, id);
            }
            None => {
                self.fields
                    .insert(0, FieldDescriptor::id(self.config.id_automatic));
            }
        }

        if self.fields.len() < 2 {
            return Err(SchemaError::NoFields);
        }
        Ok(self)
    }

    /// Looks up a field by key.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// The identifier field, if present.
    #[must_use]
    pub fn id_field(&self) -> Option<&FieldDescriptor> {
        self.field(ID_KEY)
    }

    /// Fields whose values are derived by the computation engine.
    pub fn computed_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_computed())
    }

    /// `select` fields together with their allowed options.
    pub fn select_fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &[String])> {
        self.fields.iter().filter_map(|f| match &f.kind {
            FieldKind::Select { options } => Some((f, options.as_slice())),
            _ => None,
        })
    }

    /// Fields that must carry a value for the given operation.
    ///
    /// Computed fields are never required. The `id` field is skipped when the
    /// store assigns ids, and always when editing.
    pub fn required_fields(&self, purpose: RequiredFor) -> impl Iterator<Item = &FieldDescriptor> {
        let skip_id = self.config.id_automatic || purpose == RequiredFor::Edit;
        self.fields
            .iter()
            .filter(move |f| !f.is_computed() && !(skip_id && f.is_id()))
    }

    /// Keys of [`Schema::required_fields`], in schema order.
    #[must_use]
    pub fn required_keys(&self, purpose: RequiredFor) -> Vec<&str> {
        self.required_fields(purpose).map(|f| f.key.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Schema {
        Schema::new(
            "Ventas",
            true,
            vec![
                FieldDescriptor::new("Nombre", FieldKind::text()),
                FieldDescriptor::new(
                    "Total",
                    FieldKind::Calculated {
                        field1: "precio".into(),
                        field2: "cantidad".into(),
                    },
                ),
            ],
        )
    }

    #[test]
    fn normalized_inserts_locked_id_first() {
        let schema = sample().normalized().unwrap();
        assert_eq!(schema.fields[0], FieldDescriptor::id(true));
        assert_eq!(schema.fields.len(), 3);
    }

    #[test]
    fn normalized_moves_declared_id_to_front() {
        let mut schema = sample();
        schema.fields.push(FieldDescriptor::id(false));
        let schema = schema.normalized().unwrap();
        assert!(schema.fields[0].is_id());
        assert_eq!(schema.fields.iter().filter(|f| f.is_id()).count(), 1);
    }

    #[test]
    fn normalized_rejects_duplicate_keys() {
        let mut schema = sample();
        schema
            .fields
            .push(FieldDescriptor::new("nombre", FieldKind::text()));
        assert_eq!(
            schema.normalized().unwrap_err(),
            SchemaError::DuplicateKey {
                key: "nombre".into()
            }
        );
    }

    #[test]
    fn normalized_rejects_second_id() {
        let mut schema = sample();
        schema.fields.push(FieldDescriptor::id(true));
        schema.fields.push(FieldDescriptor::id(true));
        assert!(matches!(
            schema.normalized(),
            Err(SchemaError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn normalized_rejects_blank_name_and_empty_fields() {
        let blank = Schema::new("  ", true, sample().fields);
        assert_eq!(blank.normalized().unwrap_err(), SchemaError::BlankName);

        let empty = Schema::new("Vacio", true, Vec::new());
        assert_eq!(empty.normalized().unwrap_err(), SchemaError::NoFields);

        let only_id = Schema::new("Solo", true, vec![FieldDescriptor::id(true)]);
        assert_eq!(only_id.normalized().unwrap_err(), SchemaError::NoFields);
    }

    #[test]
    fn normalized_derives_missing_keys() {
        let schema: Schema = serde_json::from_value(json!({
            "name": "Clientes",
            "config": { "idAutomatic": false },
            "fields": [{ "label": "Razon Social", "type": "text" }]
        }))
        .unwrap();
        let schema = schema.normalized().unwrap();
        assert_eq!(schema.fields[1].key, "razon_social");
        assert!(!schema.fields[0].locked);
    }

    #[test]
    fn accepts_legacy_field_names() {
        let schema: Schema = serde_json::from_value(json!({
            "nombre": "Choferes",
            "config": { "idAutomatico": true },
            "campos": [{ "label": "Nombre", "key": "nombre", "type": "text" }]
        }))
        .unwrap();
        assert_eq!(schema.name, "Choferes");
        assert!(schema.config.id_automatic);
        assert_eq!(schema.fields.len(), 1);
    }

    #[test]
    fn required_keys_skip_computed_and_automatic_id() {
        let schema = sample().normalized().unwrap();
        assert_eq!(schema.required_keys(RequiredFor::Create), vec!["nombre"]);
        assert_eq!(schema.required_keys(RequiredFor::Import), vec!["nombre"]);
    }

    #[test]
    fn manual_id_is_required_except_when_editing() {
        let mut schema = sample();
        schema.config.id_automatic = false;
        let schema = schema.normalized().unwrap();
        assert_eq!(
            schema.required_keys(RequiredFor::Create),
            vec!["id", "nombre"]
        );
        assert_eq!(schema.required_keys(RequiredFor::Import), vec!["id", "nombre"]);
        assert_eq!(schema.required_keys(RequiredFor::Edit), vec!["nombre"]);
    }
}
