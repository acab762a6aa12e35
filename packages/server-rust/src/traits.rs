use std::collections::BTreeMap;

use async_trait::async_trait;
use formgrid_core::{Record, RecordId, Schema};
use serde::{Deserialize, Serialize};

/// Failures reported by a [`BusinessStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{what} not found")]
    NotFound { what: String },
    #[error("business '{name}' already exists")]
    AlreadyExists { name: String },
    #[error("id {id} already exists in '{business}'")]
    IdTaken { business: String, id: RecordId },
    #[error("no ids left to assign in '{business}'")]
    IdSpaceExhausted { business: String },
    #[error("invalid record id: {value}")]
    InvalidId { value: String },
    #[error("remote store returned {status}: {message}")]
    Remote { status: u16, message: String },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub(crate) fn business_not_found(name: &str) -> Self {
        Self::NotFound {
            what: format!("business '{name}'"),
        }
    }

    pub(crate) fn record_not_found(business: &str, id: RecordId) -> Self {
        Self::NotFound {
            what: format!("record {id} in '{business}'"),
        }
    }
}

/// Counts reported by `GET /api/stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_schemas: usize,
    pub total_records: usize,
    pub records_per_business: BTreeMap<String, usize>,
}

/// Persistence contract for schemas and their records.
///
/// Records belong to exactly one business and are keyed by their numeric
/// `id`. Implementations own id assignment: a record created without a
/// usable id receives `max(existing) + 1` atomically with the insert.
/// Implementations: in-memory, embedded `redb` file, remote REST API.
#[async_trait]
pub trait BusinessStore: Send + Sync {
    /// All schemas, ordered by name.
    async fn list_schemas(&self) -> Result<Vec<Schema>, StoreError>;

    async fn get_schema(&self, name: &str) -> Result<Option<Schema>, StoreError>;

    /// Stores a new schema. Fails with [`StoreError::AlreadyExists`] when the
    /// name is taken.
    async fn create_schema(&self, schema: Schema) -> Result<Schema, StoreError>;

    /// Deletes a schema together with all of its records.
    async fn delete_schema(&self, name: &str) -> Result<(), StoreError>;

    /// Records of `business` in ascending id order.
    async fn list_records(&self, business: &str) -> Result<Vec<Record>, StoreError>;

    async fn get_record(
        &self,
        business: &str,
        id: RecordId,
    ) -> Result<Option<Record>, StoreError>;

    /// Inserts a batch of records, all or nothing, and returns them with
    /// their ids set.
    async fn create_records(
        &self,
        business: &str,
        records: Vec<Record>,
    ) -> Result<Vec<Record>, StoreError>;

    async fn create_record(&self, business: &str, record: Record) -> Result<Record, StoreError> {
        self.create_records(business, vec![record])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("store returned no record for a single insert").into())
    }

    /// Replaces an existing record. The stored `id` is forced to `id`.
    async fn update_record(
        &self,
        business: &str,
        id: RecordId,
        record: Record,
    ) -> Result<Record, StoreError>;

    async fn delete_record(&self, business: &str, id: RecordId) -> Result<(), StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;
}
