//! Application state for one user session.
//!
//! [`Session`] owns the schema cache, the selected business with its records
//! and form, the schema draft being assembled, and the notice board. Every
//! mutation goes through a method, and loads of records are tagged with a
//! [`LoadTicket`] so a response for a superseded selection is dropped instead
//! of overwriting newer state.

use std::time::Instant;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, trace};

use crate::compute::compute_derived;
use crate::error::{FormError, SchemaError, SessionError};
use crate::field::{derive_key, FieldDescriptor, FieldKind};
use crate::normalize::normalize;
use crate::notice::{Notice, NoticeBoard, NoticeKind};
use crate::payload::build_payload;
use crate::record::{display_value, record_id, Record, RecordId};
use crate::schema::Schema;
use crate::view::{export_records, import_template, table_view, TableView};

/// Identifies one records load. Only the ticket issued by the most recent
/// [`Session::select`] or [`Session::reload`] is accepted on delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub business: String,
    generation: u64,
}

/// The business currently open in the session.
#[derive(Debug, Clone)]
pub struct Selection {
    pub schema: Schema,
    pub records: Vec<Record>,
    /// Form inputs keyed by field key, as displayed.
    pub form: Record,
    /// Id of the record being edited, or `None` when the form creates one.
    pub editing: Option<RecordId>,
}

impl Selection {
    fn new(schema: Schema) -> Self {
        Self {
            schema,
            records: Vec::new(),
            form: Record::new(),
            editing: None,
        }
    }

    #[must_use]
    pub fn table(&self, today: NaiveDate) -> TableView {
        table_view(&self.records, &self.schema, today)
    }

    #[must_use]
    pub fn export(&self, today: NaiveDate) -> Vec<Record> {
        export_records(&self.records, &self.schema, today)
    }

    #[must_use]
    pub fn template(&self) -> Record {
        import_template(&self.schema)
    }
}

/// Where a submitted record goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTarget {
    Create,
    Update(RecordId),
}

/// A validated form submission ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub business: String,
    pub target: SubmitTarget,
    pub record: Record,
}

/// A business definition under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDraft {
    pub name: String,
    pub id_automatic: bool,
    pub fields: Vec<FieldDescriptor>,
}

impl Default for SchemaDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            id_automatic: true,
            fields: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Session {
    schemas: Vec<Schema>,
    selection: Option<Selection>,
    generation: u64,
    draft: SchemaDraft,
    notices: NoticeBoard,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    #[must_use]
    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    #[must_use]
    pub fn draft(&self) -> &SchemaDraft {
        &self.draft
    }

    /// Replaces the schema cache. The selection follows its schema's new
    /// definition, and is closed when the business no longer exists.
    pub fn load_schemas(&mut self, schemas: Vec<Schema>) {
        self.schemas = schemas;
        let Some(selection) = &mut self.selection else {
            return;
        };
        if let Some(schema) = self.schemas.iter().find(|s| s.name == selection.schema.name) {
            selection.schema = schema.clone();
            return;
        }
        debug!(business = %selection.schema.name, "selected business removed");
        self.selection = None;
        self.generation += 1;
    }

    /// Opens `business` with an empty form and returns the ticket its records
    /// must be delivered with.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownBusiness`] when the name is not in the cache.
    pub fn select(&mut self, business: &str) -> Result<LoadTicket, SessionError> {
        let schema = self
            .schemas
            .iter()
            .find(|s| s.name == business)
            .cloned()
            .ok_or_else(|| SessionError::UnknownBusiness(business.to_string()))?;
        self.selection = Some(Selection::new(schema));
        Ok(self.next_ticket(business))
    }

    /// Issues a fresh ticket for reloading the current selection's records.
    #[must_use]
    pub fn reload(&mut self) -> Option<LoadTicket> {
        let business = self.selection.as_ref()?.schema.name.clone();
        Some(self.next_ticket(&business))
    }

    fn next_ticket(&mut self, business: &str) -> LoadTicket {
        self.generation += 1;
        LoadTicket {
            business: business.to_string(),
            generation: self.generation,
        }
    }

    /// Installs fetched records. Returns `false`, leaving state untouched,
    /// when the ticket has been superseded.
    pub fn deliver_records(&mut self, ticket: &LoadTicket, records: Vec<Record>) -> bool {
        let current = ticket.generation == self.generation;
        match &mut self.selection {
            Some(selection) if current && selection.schema.name == ticket.business => {
                selection.records = records;
                true
            }
            _ => {
                debug!(business = %ticket.business, "discarding stale records delivery");
                false
            }
        }
    }

    /// Applies one keystroke to the form: the raw value is normalized against
    /// its field, then every computed field is re-derived. Returns the value
    /// now shown in that input.
    ///
    /// # Errors
    ///
    /// Fails when nothing is selected, the key is unknown, or the field is
    /// computed or a store-assigned id.
    pub fn input(
        &mut self,
        key: &str,
        raw: &str,
        today: NaiveDate,
    ) -> Result<String, SessionError> {
        let selection = self.selection.as_mut().ok_or(SessionError::NoSelection)?;
        let field = selection
            .schema
            .field(key)
            .ok_or_else(|| SessionError::UnknownField(key.to_string()))?;
        if field.is_computed() || (field.is_id() && selection.schema.config.id_automatic) {
            return Err(SessionError::ReadOnlyField(key.to_string()));
        }

        let shown = normalize(field, raw);
        trace!(field = key, raw, shown = %shown, "input normalized");
        selection
            .form
            .insert(key.to_string(), Value::String(shown.clone()));
        selection.form = compute_derived(&selection.form, &selection.schema.fields, today);
        Ok(shown)
    }

    /// Loads `record` into the form for editing.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSelection`], or a missing-fields error when the
    /// record has no usable id.
    pub fn begin_edit(&mut self, record: &Record) -> Result<RecordId, SessionError> {
        let selection = self.selection.as_mut().ok_or(SessionError::NoSelection)?;
        let id = record_id(record).ok_or_else(|| FormError::MissingRequiredFields {
            object: None,
            fields: vec![crate::field::ID_KEY.to_string()],
        })?;

        selection.form = selection
            .schema
            .fields
            .iter()
            .filter_map(|field| {
                record
                    .get(&field.key)
                    .map(|value| (field.key.clone(), Value::String(display_value(value))))
            })
            .collect();
        selection.editing = Some(id);
        Ok(id)
    }

    /// Leaves edit mode and clears the form.
    pub fn cancel_edit(&mut self) {
        if let Some(selection) = &mut self.selection {
            selection.form.clear();
            selection.editing = None;
        }
    }

    /// Validates the form and assembles the record to persist. The form is
    /// left as is so a failed save can be retried.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSelection`] or the [`FormError`] from payload
    /// assembly.
    pub fn submit(&self, today: NaiveDate) -> Result<Submission, SessionError> {
        let selection = self.selection.as_ref().ok_or(SessionError::NoSelection)?;
        let record = build_payload(&selection.form, &selection.schema, selection.editing, today)?;
        let target = selection
            .editing
            .map_or(SubmitTarget::Create, SubmitTarget::Update);
        Ok(Submission {
            business: selection.schema.name.clone(),
            target,
            record,
        })
    }

    /// Records a successful save: clears the form, leaves edit mode, posts a
    /// success notice, and returns the ticket for reloading records.
    pub fn finish_submit(&mut self, now: Instant) -> Option<LoadTicket> {
        self.cancel_edit();
        self.notify(NoticeKind::Success, "Data saved", now);
        self.reload()
    }

    /// Starts a new draft field from a label. The key is derived from it.
    ///
    /// # Errors
    ///
    /// [`SchemaError::BlankLabel`] for a blank label.
    pub fn draft_add_field(
        &mut self,
        label: &str,
        kind: FieldKind,
    ) -> Result<&FieldDescriptor, SessionError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(SchemaError::BlankLabel.into());
        }
        self.draft.fields.push(FieldDescriptor {
            key: derive_key(label),
            label: label.to_string(),
            locked: false,
            kind,
        });
        Ok(&self.draft.fields[self.draft.fields.len() - 1])
    }

    pub fn draft_remove_field(&mut self, index: usize) -> Option<FieldDescriptor> {
        (index < self.draft.fields.len()).then(|| self.draft.fields.remove(index))
    }

    pub fn draft_set_name(&mut self, name: impl Into<String>) {
        self.draft.name = name.into();
    }

    pub fn draft_set_id_automatic(&mut self, id_automatic: bool) {
        self.draft.id_automatic = id_automatic;
    }

    /// Produces the normalized schema for the current draft. The draft is
    /// kept until [`Session::draft_clear`] so a rejected create can be fixed.
    ///
    /// # Errors
    ///
    /// The [`SchemaError`] from normalization.
    pub fn draft_build(&self) -> Result<Schema, SessionError> {
        let draft = &self.draft;
        if draft.fields.is_empty() {
            return Err(SchemaError::NoFields.into());
        }
        Ok(Schema::new(draft.name.clone(), draft.id_automatic, draft.fields.clone()).normalized()?)
    }

    pub fn draft_clear(&mut self) {
        self.draft = SchemaDraft::default();
    }

    pub fn notify(&mut self, kind: NoticeKind, message: impl Into<String>, now: Instant) {
        self.notices.push(kind, message, now);
    }

    /// Posts an error as a notice. Missing fields are a warning; everything
    /// else is an error.
    pub fn report(&mut self, error: &SessionError, now: Instant) {
        let kind = match error {
            SessionError::Form(FormError::MissingRequiredFields { .. }) => NoticeKind::Warning,
            _ => NoticeKind::Error,
        };
        self.notices.push(kind, error.to_string(), now);
    }

    #[must_use]
    pub fn current_notice(&self, now: Instant) -> Option<&Notice> {
        self.notices.current(now)
    }

    pub fn prune_notices(&mut self, now: Instant) {
        self.notices.prune(now);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

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

    fn sales() -> Schema {
        Schema::new(
            "ventas",
            true,
            vec![
                FieldDescriptor::new("Producto", FieldKind::text()),
                FieldDescriptor::new("Precio", FieldKind::decimal()),
                FieldDescriptor::new(
                    "Cantidad",
                    FieldKind::Number {
                        num_length: Some(3),
                        decimals: 2,
                        is_integer: true,
                    },
                ),
                FieldDescriptor::new(
                    "Total",
                    FieldKind::Calculated {
                        field1: "precio".into(),
                        field2: "cantidad".into(),
                    },
                ),
            ],
        )
        .normalized()
        .unwrap()
    }

    fn session() -> Session {
        let mut session = Session::new();
        let other = Schema::new("otro", true, vec![FieldDescriptor::new("A", FieldKind::text())])
            .normalized()
            .unwrap();
        session.load_schemas(vec![sales(), other]);
        session
    }

    #[test]
    fn stale_delivery_is_discarded() {
        let mut session = session();
        let first = session.select("ventas").unwrap();
        let second = session.select("otro").unwrap();

        assert!(!session.deliver_records(&first, vec![rec(json!({"id": 1}))]));
        assert!(session.selection().unwrap().records.is_empty());

        assert!(session.deliver_records(&second, vec![rec(json!({"id": 2}))]));
        assert_eq!(session.selection().unwrap().records.len(), 1);
    }

    #[test]
    fn reselecting_same_business_still_drops_old_ticket() {
        let mut session = session();
        let old = session.select("ventas").unwrap();
        let new = session.select("ventas").unwrap();
        assert!(!session.deliver_records(&old, Vec::new()));
        assert!(session.deliver_records(&new, Vec::new()));
    }

    #[test]
    fn unknown_business_is_rejected() {
        let mut session = session();
        assert_eq!(
            session.select("nada"),
            Err(SessionError::UnknownBusiness("nada".into()))
        );
    }

    #[test]
    fn input_normalizes_and_recomputes() {
        let mut session = session();
        session.select("ventas").unwrap();
        session.input("precio", "2.5", today()).unwrap();
        let shown = session.input("cantidad", "1234", today()).unwrap();
        assert_eq!(shown, "123");

        let form = &session.selection().unwrap().form;
        assert_eq!(form["total"], json!("307.50"));

        assert_eq!(
            session.input("total", "1", today()),
            Err(SessionError::ReadOnlyField("total".into()))
        );
        assert_eq!(
            session.input("id", "1", today()),
            Err(SessionError::ReadOnlyField("id".into()))
        );
    }

    #[test]
    fn submit_create_then_edit() {
        let mut session = session();
        let ticket = session.select("ventas").unwrap();
        session.input("producto", "Pan", today()).unwrap();
        session.input("precio", "10", today()).unwrap();
        session.input("cantidad", "3", today()).unwrap();

        let submission = session.submit(today()).unwrap();
        assert_eq!(submission.target, SubmitTarget::Create);
        assert_eq!(submission.record["total"], json!("30.00"));

        let reload = session.finish_submit(Instant::now()).unwrap();
        assert_ne!(reload, ticket);
        assert!(session.selection().unwrap().form.is_empty());

        let stored = rec(json!({
            "id": 4,
            "producto": "Pan",
            "precio": 10,
            "cantidad": 3,
            "total": "30.00"
        }));
        assert_eq!(session.begin_edit(&stored).unwrap(), 4);
        assert_eq!(session.selection().unwrap().form["precio"], json!("10"));
        let submission = session.submit(today()).unwrap();
        assert_eq!(submission.target, SubmitTarget::Update(4));
        assert_eq!(submission.record["id"], json!(4));

        session.cancel_edit();
        assert_eq!(session.selection().unwrap().editing, None);
    }

    #[test]
    fn failed_submit_reports_warning() {
        let mut session = session();
        session.select("ventas").unwrap();
        let err = session.submit(today()).unwrap_err();
        let now = Instant::now();
        session.report(&err, now);
        let notice = session.current_notice(now).unwrap();
        assert_eq!(notice.kind, NoticeKind::Warning);
        assert!(session.current_notice(now + Duration::from_secs(3)).is_none());
    }

    #[test]
    fn draft_builds_schema_with_id_first() {
        let mut session = Session::new();
        assert!(matches!(
            session.draft_add_field("  ", FieldKind::text()),
            Err(SessionError::Schema(SchemaError::BlankLabel))
        ));
        assert_eq!(
            session.draft_add_field("Precio Unitario", FieldKind::decimal()).unwrap().key,
            "precio_unitario"
        );
        session.draft_add_field("Borrar", FieldKind::text()).unwrap();
        assert!(session.draft_remove_field(1).is_some());
        assert!(session.draft_remove_field(5).is_none());

        assert_eq!(
            session.draft_build(),
            Err(SessionError::Schema(SchemaError::BlankName))
        );
        session.draft_set_name(" Ferretería ");
        session.draft_set_id_automatic(false);
        let schema = session.draft_build().unwrap();
        assert_eq!(schema.name, "Ferretería");
        assert!(schema.fields[0].is_id());
        assert!(!schema.fields[0].locked);

        session.draft_clear();
        assert!(session.draft().fields.is_empty());
        assert!(session.draft().id_automatic);
    }

    #[test]
    fn removed_business_closes_selection() {
        let mut session = session();
        let ticket = session.select("ventas").unwrap();
        session.load_schemas(vec![]);
        assert!(session.selection().is_none());
        assert!(!session.deliver_records(&ticket, Vec::new()));
    }
}
