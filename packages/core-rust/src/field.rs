//! Field descriptors: the typed description of one column of a business schema.
//!
//! A descriptor is a tagged union over the six supported kinds. Each variant
//! carries only the parameters that make sense for it, so a `text` field can
//! never hold multiplication operands.
//!
//! # Wire format
//!
//! Descriptors serialize to the flat JSON object produced by the schema
//! builder UI: a `type` tag plus camelCase parameters, with select options as
//! a single comma-joined string:
//!
//! ```json
//! { "key": "total", "label": "Total", "type": "calculated",
//!   "field1": "precio", "field2": "cantidad" }
//! ```
//!
//! Numeric parameters are accepted as numbers, numeric strings, or empty
//! strings (treated as "not set"), since form builders submit raw input text.

use serde::{Deserialize, Deserializer, Serialize};

/// Key of the system-managed record identifier field.
pub const ID_KEY: &str = "id";

/// Label given to the generated identifier field.
pub const ID_LABEL: &str = "ID";

/// Decimal places assumed for `number` fields that do not specify any.
pub const DEFAULT_DECIMALS: u32 = 2;

/// One field of a business schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Record key under which this field's value is stored.
    ///
    /// Derived from the label with [`derive_key`] when left empty.
    #[serde(default)]
    pub key: String,
    /// Human-readable name shown in forms and table headers.
    pub label: String,
    /// Whether the field is system-managed and not editable by users.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub locked: bool,
    /// Kind-specific parameters.
    #[serde(flatten)]
    pub kind: FieldKind,
}

/// The six field kinds and their parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text, optionally capped in length.
    Text {
        /// Maximum number of characters accepted by the form input.
        #[serde(
            rename = "maxLength",
            default,
            deserialize_with = "lenient_count",
            skip_serializing_if = "Option::is_none"
        )]
        max_length: Option<usize>,
    },
    /// Numeric input.
    Number {
        /// Maximum number of digits (decimal point excluded).
        #[serde(
            rename = "numLength",
            default,
            deserialize_with = "lenient_count",
            skip_serializing_if = "Option::is_none"
        )]
        num_length: Option<usize>,
        /// Display precision for non-integer values.
        #[serde(default = "default_decimals", deserialize_with = "lenient_decimals")]
        decimals: u32,
        /// Whether only whole numbers are accepted.
        #[serde(rename = "isInteger", default)]
        is_integer: bool,
    },
    /// One value out of a fixed list of options.
    Select {
        /// Allowed values, in display order.
        #[serde(default, with = "comma_list")]
        options: Vec<String>,
    },
    /// Product of two other fields, formatted with two decimals.
    Calculated {
        /// Key of the left operand.
        #[serde(default)]
        field1: String,
        /// Key of the right operand.
        #[serde(default)]
        field2: String,
    },
    /// Whole years elapsed since the date stored in `source_field`.
    Age {
        /// Key of the birth-date field.
        #[serde(rename = "sourceField", default)]
        source_field: String,
    },
    /// `VIGENTE` / `VENCIDA` depending on the expiry date in `source_field`.
    LicenseStatus {
        /// Key of the expiry-date field.
        #[serde(rename = "sourceField", default)]
        source_field: String,
    },
}

impl FieldKind {
    /// The `type` tag used on the wire.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Number { .. } => "number",
            Self::Select { .. } => "select",
            Self::Calculated { .. } => "calculated",
            Self::Age { .. } => "age",
            Self::LicenseStatus { .. } => "license_status",
        }
    }

    /// Whether values of this kind are derived rather than entered.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        matches!(
            self,
            Self::Calculated { .. } | Self::Age { .. } | Self::LicenseStatus { .. }
        )
    }

    /// A `text` kind without length limit.
    #[must_use]
    pub fn text() -> Self {
        Self::Text { max_length: None }
    }

    /// A decimal `number` kind with default precision.
    #[must_use]
    pub fn decimal() -> Self {
        Self::Number {
            num_length: None,
            decimals: DEFAULT_DECIMALS,
            is_integer: false,
        }
    }

    /// An integer-only `number` kind.
    #[must_use]
    pub fn integer() -> Self {
        Self::Number {
            num_length: None,
            decimals: 0,
            is_integer: true,
        }
    }
}

impl FieldDescriptor {
    /// Creates a descriptor whose key is derived from `label`.
    #[must_use]
    pub fn new(label: impl Into<String>, kind: FieldKind) -> Self {
        let label = label.into();
        Self {
            key: derive_key(&label),
            label,
            locked: false,
            kind,
        }
    }

    /// The system identifier field. `locked` is set when ids are assigned
    /// automatically.
    #[must_use]
    pub fn id(locked: bool) -> Self {
        Self {
            key: ID_KEY.to_string(),
            label: ID_LABEL.to_string(),
            locked,
            kind: FieldKind::integer(),
        }
    }

    /// Whether this is the record identifier field.
    #[must_use]
    pub fn is_id(&self) -> bool {
        self.key == ID_KEY
    }

    /// Whether this field's value is derived by the computation engine.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        self.kind.is_computed()
    }

    /// Whether this is a `number` field with decimals (not integer-only).
    #[must_use]
    pub fn is_decimal(&self) -> bool {
        matches!(self.kind, FieldKind::Number { is_integer: false, .. })
    }
}

/// Derives a record key from a human label: lower-cased, spaces replaced by
/// underscores.
///
/// ```
/// use formgrid_core::field::derive_key;
///
/// assert_eq!(derive_key("Precio Unitario"), "precio_unitario");
/// ```
#[must_use]
pub fn derive_key(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}

/// Returns the fields with `id` moved to the front; other fields keep their
/// relative order.
#[must_use]
pub fn order_fields(fields: &[FieldDescriptor]) -> Vec<&FieldDescriptor> {
    let mut ordered: Vec<&FieldDescriptor> = fields.iter().collect();
    ordered.sort_by_key(|f| !f.is_id());
    ordered
}

fn default_decimals() -> u32 {
    DEFAULT_DECIMALS
}

/// Reads an optional count from a number, a numeric string, or an empty string.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(count_from_json))
}

fn lenient_decimals<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(count_from_json)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(DEFAULT_DECIMALS))
}

fn count_from_json(value: &serde_json::Value) -> Option<usize> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Select options travel as one comma-joined string; arrays are accepted too.
mod comma_list {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Joined(String),
        List(Vec<String>),
    }

    pub fn serialize<S>(options: &[String], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&options.join(","))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items = match Raw::deserialize(deserializer)? {
            Raw::Joined(s) => s.split(',').map(str::to_string).collect::<Vec<_>>(),
            Raw::List(items) => items,
        };
        Ok(items
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect())
    }
}
