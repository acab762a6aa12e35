//! Error types for schema definition, form submission, and bulk import.

/// Rejections raised while validating a schema definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("business name must not be blank")]
    BlankName,
    #[error("a business needs at least one field besides the id")]
    NoFields,
    #[error("field label must not be blank")]
    BlankLabel,
    #[error("field key '{key}' is declared more than once")]
    DuplicateKey { key: String },
}

/// Validation failures surfaced to the user when submitting or importing
/// records.
///
/// `object` indices are 1-based positions inside an import batch; they are
/// `None` for single form submissions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("{}missing required fields: {}", object_prefix(.object), .fields.join(", "))]
    MissingRequiredFields {
        object: Option<usize>,
        fields: Vec<String>,
    },
    #[error(
        "{}\"{field}\" has invalid value \"{value}\"; allowed: {}",
        object_prefix(.object),
        .allowed.join(",")
    )]
    InvalidSelectOption {
        object: Option<usize>,
        field: String,
        value: String,
        allowed: Vec<String>,
    },
    #[error("invalid JSON: {0}")]
    InvalidJsonSyntax(String),
    #[error("import must be a JSON object {{}} or an array of objects []")]
    InvalidImportShape,
    #[error("object {index}: expected a JSON object")]
    NotAnObject { index: usize },
    #[error("import contains no records")]
    EmptyImport,
}

/// Rejections raised by the application-state object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no business is selected")]
    NoSelection,
    #[error("unknown business '{0}'")]
    UnknownBusiness(String),
    #[error("field '{0}' cannot be edited")]
    ReadOnlyField(String),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

fn object_prefix(object: &Option<usize>) -> String {
    object.map(|i| format!("object {i}: ")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_object_index() {
        let err = FormError::MissingRequiredFields {
            object: Some(2),
            fields: vec!["nombre".into(), "precio".into()],
        };
        assert_eq!(
            err.to_string(),
            "object 2: missing required fields: nombre, precio"
        );

        let err = FormError::MissingRequiredFields {
            object: None,
            fields: vec!["nombre".into()],
        };
        assert_eq!(err.to_string(), "missing required fields: nombre");
    }

    #[test]
    fn select_message_lists_allowed_values() {
        let err = FormError::InvalidSelectOption {
            object: Some(1),
            field: "Sexo".into(),
            value: "otro".into(),
            allowed: vec!["Hombre".into(), "Mujer".into()],
        };
        assert_eq!(
            err.to_string(),
            "object 1: \"Sexo\" has invalid value \"otro\"; allowed: Hombre,Mujer"
        );
    }
}
