//! In-memory [`BusinessStore`] backed by [`DashMap`].
//!
//! Schemas live behind a `parking_lot` lock; each business's records sit in
//! their own `DashMap` entry, so a batch insert holds that entry's shard lock
//! for the whole id assignment.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use formgrid_core::{Record, RecordId, Schema};
use parking_lot::RwLock;

use super::{assign_ids, with_id};
use crate::traits::{BusinessStore, StoreError, StoreStats};

#[derive(Debug, Default)]
pub struct MemoryStore {
    schemas: RwLock<BTreeMap<String, Schema>>,
    records: DashMap<String, BTreeMap<RecordId, Record>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BusinessStore for MemoryStore {
    async fn list_schemas(&self) -> Result<Vec<Schema>, StoreError> {
        Ok(self.schemas.read().values().cloned().collect())
    }

    async fn get_schema(&self, name: &str) -> Result<Option<Schema>, StoreError> {
        Ok(self.schemas.read().get(name).cloned())
    }

    async fn create_schema(&self, schema: Schema) -> Result<Schema, StoreError> {
        let mut schemas = self.schemas.write();
        if schemas.contains_key(&schema.name) {
            return Err(StoreError::AlreadyExists { name: schema.name });
        }
        self.records.insert(schema.name.clone(), BTreeMap::new());
        schemas.insert(schema.name.clone(), schema.clone());
        Ok(schema)
    }

    async fn delete_schema(&self, name: &str) -> Result<(), StoreError> {
        let mut schemas = self.schemas.write();
        if schemas.remove(name).is_none() {
            return Err(StoreError::business_not_found(name));
        }
        self.records.remove(name);
        Ok(())
    }

    async fn list_records(&self, business: &str) -> Result<Vec<Record>, StoreError> {
        self.records
            .get(business)
            .map(|records| records.values().cloned().collect())
            .ok_or_else(|| StoreError::business_not_found(business))
    }

    async fn get_record(
        &self,
        business: &str,
        id: RecordId,
    ) -> Result<Option<Record>, StoreError> {
        let records = self
            .records
            .get(business)
            .ok_or_else(|| StoreError::business_not_found(business))?;
        Ok(records.get(&id).cloned())
    }

    async fn create_records(
        &self,
        business: &str,
        records: Vec<Record>,
    ) -> Result<Vec<Record>, StoreError> {
        let mut stored = self
            .records
            .get_mut(business)
            .ok_or_else(|| StoreError::business_not_found(business))?;

        let current_max = stored.keys().next_back().copied().unwrap_or(0);
        let planned = assign_ids(
            business,
            current_max,
            |id| Ok(stored.contains_key(&id)),
            records,
        )?;

        let created = planned
            .into_iter()
            .map(|(id, record)| {
                stored.insert(id, record.clone());
                record
            })
            .collect();
        Ok(created)
    }

    async fn update_record(
        &self,
        business: &str,
        id: RecordId,
        record: Record,
    ) -> Result<Record, StoreError> {
        let mut stored = self
            .records
            .get_mut(business)
            .ok_or_else(|| StoreError::business_not_found(business))?;
        let slot = stored
            .get_mut(&id)
            .ok_or_else(|| StoreError::record_not_found(business, id))?;
        *slot = with_id(record, id);
        Ok(slot.clone())
    }

    async fn delete_record(&self, business: &str, id: RecordId) -> Result<(), StoreError> {
        let mut stored = self
            .records
            .get_mut(business)
            .ok_or_else(|| StoreError::business_not_found(business))?;
        stored
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::record_not_found(business, id))
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let total_schemas = self.schemas.read().len();
        let records_per_business: BTreeMap<String, usize> = self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect();
        Ok(StoreStats {
            total_schemas,
            total_records: records_per_business.values().sum(),
            records_per_business,
        })
    }
}
