//! Business operations: the computation engine wired to a [`BusinessStore`].
//!
//! Every operation loads the schema it needs from the store, so a schema
//! change is visible to the next call without any cache invalidation.

pub mod error;

use std::sync::Arc;
use std::time::Instant;

use formgrid_core::{
    backfill_computed, build_payload, compute_derived, export_records, import_template,
    normalize, prepare_import, table_view, Clock, Record, RecordId, Schema, TableView,
};
use tracing::{debug, info, warn};

pub use error::ServiceError;

use crate::traits::{BusinessStore, StoreError, StoreStats};

/// Records `operation` in the `formgrid_operations_total` counter and the
/// duration histogram, and logs failures.
fn observe<T>(
    operation: &'static str,
    started: Instant,
    result: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => {
            warn!(operation, error = %err, "operation failed");
            err.kind()
        }
    };
    metrics::counter!("formgrid_operations_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
    metrics::histogram!("formgrid_operation_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
    result
}

/// Application service shared by every HTTP handler.
#[derive(Clone)]
pub struct BusinessService {
    store: Arc<dyn BusinessStore>,
    clock: Arc<dyn Clock>,
}

impl BusinessService {
    #[must_use]
    pub fn new(store: Arc<dyn BusinessStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    // -- schemas ------------------------------------------------------------

    pub async fn schemas(&self) -> Result<Vec<Schema>, ServiceError> {
        Ok(self.store.list_schemas().await?)
    }

    /// Loads a schema, mapping absence to [`ServiceError::UnknownBusiness`].
    pub async fn schema(&self, name: &str) -> Result<Schema, ServiceError> {
        self.store
            .get_schema(name)
            .await?
            .ok_or_else(|| ServiceError::UnknownBusiness(name.to_string()))
    }

    /// Normalizes and stores a new business definition.
    pub async fn create_schema(&self, schema: Schema) -> Result<Schema, ServiceError> {
        let started = Instant::now();
        let result: Result<Schema, ServiceError> = async {
            let schema = schema.normalized()?;
            let created = self.store.create_schema(schema).await?;
            info!(business = %created.name, fields = created.fields.len(), "business created");
            Ok(created)
        }
        .await;
        observe("create_schema", started, result)
    }

    /// Deletes a business together with its records.
    pub async fn delete_schema(&self, name: &str) -> Result<(), ServiceError> {
        let started = Instant::now();
        let result = match self.store.delete_schema(name).await {
            Ok(()) => {
                info!(business = name, "business deleted");
                Ok(())
            }
            Err(StoreError::NotFound { .. }) => {
                Err(ServiceError::UnknownBusiness(name.to_string()))
            }
            Err(err) => Err(err.into()),
        };
        observe("delete_schema", started, result)
    }

    // -- raw records --------------------------------------------------------

    /// Stored records in ascending id order, as persisted.
    pub async fn list_records(&self, business: &str) -> Result<Vec<Record>, ServiceError> {
        self.schema(business).await?;
        Ok(self.store.list_records(business).await?)
    }

    /// Stored records with missing computed values filled in.
    pub async fn records(&self, business: &str) -> Result<Vec<Record>, ServiceError> {
        let schema = self.schema(business).await?;
        let today = self.clock.today();
        let records = self.store.list_records(business).await?;
        Ok(records
            .iter()
            .map(|record| backfill_computed(record, &schema.fields, today))
            .collect())
    }

    pub async fn get_record(&self, business: &str, id: RecordId) -> Result<Record, ServiceError> {
        self.schema(business).await?;
        self.store
            .get_record(business, id)
            .await?
            .ok_or_else(|| ServiceError::RecordNotFound {
                business: business.to_string(),
                id,
            })
    }

    /// Stores records as given, without validation or computation.
    pub async fn create_records(
        &self,
        business: &str,
        records: Vec<Record>,
    ) -> Result<Vec<Record>, ServiceError> {
        let started = Instant::now();
        let result: Result<Vec<Record>, ServiceError> = async {
            self.schema(business).await?;
            let created = self.store.create_records(business, records).await?;
            self.created(business, created.len());
            Ok(created)
        }
        .await;
        observe("create_records", started, result)
    }

    pub async fn update_record(
        &self,
        business: &str,
        id: RecordId,
        record: Record,
    ) -> Result<Record, ServiceError> {
        let started = Instant::now();
        let result: Result<Record, ServiceError> = async {
            self.schema(business).await?;
            let updated = self.replace(business, id, record).await?;
            info!(business, id, "record updated");
            Ok(updated)
        }
        .await;
        observe("update_record", started, result)
    }

    pub async fn delete_record(&self, business: &str, id: RecordId) -> Result<(), ServiceError> {
        let started = Instant::now();
        let result: Result<(), ServiceError> = async {
            self.schema(business).await?;
            match self.store.delete_record(business, id).await {
                Ok(()) => {
                    info!(business, id, "record deleted");
                    Ok(())
                }
                Err(StoreError::NotFound { .. }) => Err(ServiceError::RecordNotFound {
                    business: business.to_string(),
                    id,
                }),
                Err(err) => Err(err.into()),
            }
        }
        .await;
        observe("delete_record", started, result)
    }

    // -- engine-backed operations ------------------------------------------

    /// Assembles a form submission and persists it, as a new record or as a
    /// replacement of `editing`.
    pub async fn submit(
        &self,
        business: &str,
        values: Record,
        editing: Option<RecordId>,
    ) -> Result<Record, ServiceError> {
        let started = Instant::now();
        let result: Result<Record, ServiceError> = async {
            let schema = self.schema(business).await?;
            let payload = build_payload(&values, &schema, editing, self.clock.today())?;
            match editing {
                Some(id) => {
                    let updated = self.replace(business, id, payload).await?;
                    info!(business, id, "record updated from form");
                    Ok(updated)
                }
                None => {
                    let created = self.store.create_record(business, payload).await?;
                    self.created(business, 1);
                    Ok(created)
                }
            }
        }
        .await;
        observe("submit", started, result)
    }

    /// Runs the computation engine over unsaved form values.
    pub async fn preview(&self, business: &str, values: Record) -> Result<Record, ServiceError> {
        let schema = self.schema(business).await?;
        Ok(compute_derived(&values, &schema.fields, self.clock.today()))
    }

    /// Clamps one keystroke's worth of input for `field`.
    pub async fn normalize_input(
        &self,
        business: &str,
        field: &str,
        raw: &str,
    ) -> Result<String, ServiceError> {
        let schema = self.schema(business).await?;
        let descriptor = schema.field(field).ok_or_else(|| ServiceError::UnknownField {
            business: business.to_string(),
            field: field.to_string(),
        })?;
        Ok(normalize(descriptor, raw))
    }

    /// Validates a JSON import and stores it as a single batch. Nothing is
    /// written when any object is rejected.
    pub async fn import(
        &self,
        business: &str,
        json_text: &str,
    ) -> Result<Vec<Record>, ServiceError> {
        let started = Instant::now();
        let result: Result<Vec<Record>, ServiceError> = async {
            let schema = self.schema(business).await?;
            let records = prepare_import(json_text, &schema, self.clock.today())?;
            debug!(business, count = records.len(), "import validated");
            let created = self.store.create_records(business, records).await?;
            self.created(business, created.len());
            info!(business, count = created.len(), "import stored");
            Ok(created)
        }
        .await;
        observe("import", started, result)
    }

    // -- read views ---------------------------------------------------------

    pub async fn table(&self, business: &str) -> Result<TableView, ServiceError> {
        let schema = self.schema(business).await?;
        let records = self.store.list_records(business).await?;
        Ok(table_view(&records, &schema, self.clock.today()))
    }

    pub async fn export(&self, business: &str) -> Result<Vec<Record>, ServiceError> {
        let schema = self.schema(business).await?;
        let records = self.store.list_records(business).await?;
        Ok(export_records(&records, &schema, self.clock.today()))
    }

    pub async fn template(&self, business: &str) -> Result<Record, ServiceError> {
        let schema = self.schema(business).await?;
        Ok(import_template(&schema))
    }

    pub async fn stats(&self) -> Result<StoreStats, ServiceError> {
        Ok(self.store.stats().await?)
    }

    // -- helpers ------------------------------------------------------------

    async fn replace(
        &self,
        business: &str,
        id: RecordId,
        record: Record,
    ) -> Result<Record, ServiceError> {
        match self.store.update_record(business, id, record).await {
            Ok(updated) => Ok(updated),
            Err(StoreError::NotFound { .. }) => Err(ServiceError::RecordNotFound {
                business: business.to_string(),
                id,
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn created(&self, business: &str, count: usize) {
        info!(business, count, "records created");
        metrics::counter!("formgrid_records_created_total", "business" => business.to_string())
            .increment(count as u64);
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use formgrid_core::{FieldDescriptor, FieldKind, FixedClock};
    use serde_json::{json, Value};

    use super::*;
    use crate::storage::MemoryStore;

    fn rec(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn service() -> BusinessService {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        BusinessService::new(Arc::new(MemoryStore::new()), Arc::new(FixedClock(today)))
    }

    fn ventas() -> Schema {
        Schema::new(
            "Ventas",
            true,
            vec![
                FieldDescriptor::new("Producto", FieldKind::text()),
                FieldDescriptor::new("Precio", FieldKind::decimal()),
                FieldDescriptor::new("Cantidad", FieldKind::integer()),
                FieldDescriptor::new(
                    "Total",
                    FieldKind::Calculated {
                        field1: "precio".into(),
                        field2: "cantidad".into(),
                    },
                ),
                FieldDescriptor::new(
                    "Pago",
                    FieldKind::Select {
                        options: vec!["Efectivo".into(), "Tarjeta".into()],
                    },
                ),
            ],
        )
    }

    async fn with_ventas() -> BusinessService {
        let service = service();
        service.create_schema(ventas()).await.unwrap();
        service
    }

    #[tokio::test]
    async fn create_schema_normalizes() {
        let service = service();
        let created = service.create_schema(ventas()).await.unwrap();
        assert!(created.fields[0].is_id());
        assert!(matches!(
            service.create_schema(ventas()).await,
            Err(ServiceError::Store(StoreError::AlreadyExists { .. }))
        ));
        assert!(matches!(
            service.create_schema(Schema::new(" ", true, vec![])).await,
            Err(ServiceError::Schema(_))
        ));
    }

    #[tokio::test]
    async fn submit_computes_and_coerces() {
        let service = with_ventas().await;
        let values = rec(json!({
            "producto": "Café", "precio": "10", "cantidad": "3", "pago": "Efectivo"
        }));
        let created = service.submit("Ventas", values, None).await.unwrap();
        assert_eq!(created["id"], json!(1));
        assert_eq!(created["total"], json!("30.00"));
        assert_eq!(created["cantidad"], json!(3));
    }

    #[tokio::test]
    async fn submit_rejects_missing_fields_without_writing() {
        let service = with_ventas().await;
        let err = service
            .submit("Ventas", rec(json!({"precio": "1"})), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Form(_)));
        assert!(service.list_records("Ventas").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_edit_replaces_record() {
        let service = with_ventas().await;
        let values = rec(json!({
            "producto": "A", "precio": "2", "cantidad": "2", "pago": "Tarjeta"
        }));
        service.submit("Ventas", values.clone(), None).await.unwrap();

        let mut changed = values;
        changed.insert("cantidad".into(), json!("5"));
        let updated = service.submit("Ventas", changed.clone(), Some(1)).await.unwrap();
        assert_eq!(updated["total"], json!("10.00"));
        assert_eq!(service.list_records("Ventas").await.unwrap().len(), 1);

        assert!(matches!(
            service.submit("Ventas", changed, Some(9)).await,
            Err(ServiceError::RecordNotFound { id: 9, .. })
        ));
    }

    #[tokio::test]
    async fn import_is_all_or_nothing() {
        let service = with_ventas().await;
        let text = r#"[
            {"producto": "a", "precio": 1, "cantidad": 1, "pago": "efectivo"},
            {"producto": "b", "precio": 1, "pago": "efectivo"},
            {"producto": "c", "precio": 1, "cantidad": 1, "pago": "tarjeta"}
        ]"#;
        assert!(matches!(
            service.import("Ventas", text).await,
            Err(ServiceError::Form(_))
        ));
        assert!(service.list_records("Ventas").await.unwrap().is_empty());

        let text = r#"[{"producto": "a", "precio": 2, "cantidad": 4, "pago": "TARJETA"}]"#;
        let created = service.import("Ventas", text).await.unwrap();
        assert_eq!(created[0]["total"], json!("8.00"));
    }

    #[tokio::test]
    async fn views_backfill_missing_computed_values() {
        let service = with_ventas().await;
        service
            .create_records(
                "Ventas",
                vec![rec(json!({
                    "producto": "a",
                    "precio": 1.5,
                    "cantidad": 2,
                    "pago": "Efectivo"
                }))],
            )
            .await
            .unwrap();

        let records = service.records("Ventas").await.unwrap();
        assert_eq!(records[0]["total"], json!("3.00"));
        let raw = service.list_records("Ventas").await.unwrap();
        assert!(raw[0].get("total").is_none());

        let table = service.table("Ventas").await.unwrap();
        assert_eq!(table.rows.len(), 1);
        let export = service.export("Ventas").await.unwrap();
        assert_eq!(export[0]["precio"], json!("1.50"));
    }

    #[tokio::test]
    async fn preview_and_normalize() {
        let service = with_ventas().await;
        let preview = service
            .preview("Ventas", rec(json!({"precio": "2.5", "cantidad": "2"})))
            .await
            .unwrap();
        assert_eq!(preview["total"], json!("5.00"));

        assert_eq!(
            service.normalize_input("Ventas", "cantidad", "1.5").await.unwrap(),
            "15"
        );
        assert!(matches!(
            service.normalize_input("Ventas", "nada", "x").await,
            Err(ServiceError::UnknownField { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_business_and_record() {
        let service = with_ventas().await;
        assert!(matches!(
            service.table("Otro").await,
            Err(ServiceError::UnknownBusiness(_))
        ));
        assert!(matches!(
            service.get_record("Ventas", 4).await,
            Err(ServiceError::RecordNotFound { id: 4, .. })
        ));
        assert!(matches!(
            service.delete_record("Ventas", 4).await,
            Err(ServiceError::RecordNotFound { .. })
        ));
        assert!(matches!(
            service.delete_schema("Otro").await,
            Err(ServiceError::UnknownBusiness(_))
        ));
    }

    #[tokio::test]
    async fn template_and_stats() {
        let service = with_ventas().await;
        let template = service.template("Ventas").await.unwrap();
        assert!(template.get("id").is_none());
        assert!(template.get("total").is_none());
        assert_eq!(template["pago"], json!("Efectivo"));

        service
            .create_records("Ventas", vec![rec(json!({})), rec(json!({}))])
            .await
            .unwrap();
        let stats = service.stats().await.unwrap();
        assert_eq!(stats.total_schemas, 1);
        assert_eq!(stats.records_per_business["Ventas"], 2);
    }
}
