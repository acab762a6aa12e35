//! [`BusinessStore`] persisted in an embedded `redb` database file.
//!
//! Schemas and records are stored as JSON bytes. Records are keyed by
//! `(business, id)`, so a business's records form one contiguous, id-ordered
//! range. `redb` serializes write transactions, which makes id assignment
//! atomic with the insert.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use formgrid_core::{Record, RecordId, Schema};
use redb::{Database, ReadableTable, TableDefinition};
use tracing::info;

use super::{assign_ids, with_id};
use crate::traits::{BusinessStore, StoreError, StoreStats};

const SCHEMAS: TableDefinition<&str, &[u8]> = TableDefinition::new("schemas");
const RECORDS: TableDefinition<(&str, i64), &[u8]> = TableDefinition::new("records");

pub struct RedbStore {
    db: Arc<Database>,
}

fn redb_err<E: Into<redb::Error>>(err: E) -> StoreError {
    StoreError::Backend(anyhow::Error::from(err.into()))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::Backend(e.into()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Backend(e.into()))
}

impl RedbStore {
    /// Opens (or creates) the database file and makes sure both tables exist.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened or is not a `redb` database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let db = Database::create(path).map_err(redb_err)?;
        let txn = db.begin_write().map_err(redb_err)?;
        txn.open_table(SCHEMAS).map_err(redb_err)?;
        txn.open_table(RECORDS).map_err(redb_err)?;
        txn.commit().map_err(redb_err)?;
        info!(path = %path.display(), "opened redb store");
        Ok(Self { db: Arc::new(db) })
    }

    /// Runs a database closure on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(db.as_ref()))
            .await
            .map_err(|e| StoreError::Backend(e.into()))?
    }
}

fn schema_exists(db: &Database, business: &str) -> Result<bool, StoreError> {
    let txn = db.begin_read().map_err(redb_err)?;
    let table = txn.open_table(SCHEMAS).map_err(redb_err)?;
    Ok(table.get(business).map_err(redb_err)?.is_some())
}

#[async_trait]
impl BusinessStore for RedbStore {
    async fn list_schemas(&self) -> Result<Vec<Schema>, StoreError> {
        self.blocking(|db| {
            let txn = db.begin_read().map_err(redb_err)?;
            let table = txn.open_table(SCHEMAS).map_err(redb_err)?;
            let mut schemas = Vec::new();
            for entry in table.iter().map_err(redb_err)? {
                let (_, value) = entry.map_err(redb_err)?;
                schemas.push(decode(value.value())?);
            }
            Ok(schemas)
        })
        .await
    }

    async fn get_schema(&self, name: &str) -> Result<Option<Schema>, StoreError> {
        let name = name.to_string();
        self.blocking(move |db| {
            let txn = db.begin_read().map_err(redb_err)?;
            let table = txn.open_table(SCHEMAS).map_err(redb_err)?;
            let found = table.get(name.as_str()).map_err(redb_err)?;
            found.map(|value| decode(value.value())).transpose()
        })
        .await
    }

    async fn create_schema(&self, schema: Schema) -> Result<Schema, StoreError> {
        self.blocking(move |db| {
            let bytes = encode(&schema)?;
            let txn = db.begin_write().map_err(redb_err)?;
            {
                let mut table = txn.open_table(SCHEMAS).map_err(redb_err)?;
                if table.get(schema.name.as_str()).map_err(redb_err)?.is_some() {
                    return Err(StoreError::AlreadyExists {
                        name: schema.name.clone(),
                    });
                }
                table
                    .insert(schema.name.as_str(), bytes.as_slice())
                    .map_err(redb_err)?;
            }
            txn.commit().map_err(redb_err)?;
            Ok(schema)
        })
        .await
    }

    async fn delete_schema(&self, name: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        self.blocking(move |db| {
            let txn = db.begin_write().map_err(redb_err)?;
            {
                let mut schemas = txn.open_table(SCHEMAS).map_err(redb_err)?;
                if schemas.remove(name.as_str()).map_err(redb_err)?.is_none() {
                    return Err(StoreError::business_not_found(&name));
                }

                let mut records = txn.open_table(RECORDS).map_err(redb_err)?;
                let mut ids = Vec::new();
                for entry in records
                    .range((name.as_str(), i64::MIN)..=(name.as_str(), i64::MAX))
                    .map_err(redb_err)?
                {
                    let (key, _) = entry.map_err(redb_err)?;
                    ids.push(key.value().1);
                }
                for id in ids {
                    records.remove((name.as_str(), id)).map_err(redb_err)?;
                }
            }
            txn.commit().map_err(redb_err)?;
            Ok(())
        })
        .await
    }

    async fn list_records(&self, business: &str) -> Result<Vec<Record>, StoreError> {
        let business = business.to_string();
        self.blocking(move |db| {
            if !schema_exists(db, &business)? {
                return Err(StoreError::business_not_found(&business));
            }
            let txn = db.begin_read().map_err(redb_err)?;
            let table = txn.open_table(RECORDS).map_err(redb_err)?;
            let mut records = Vec::new();
            for entry in table
                .range((business.as_str(), i64::MIN)..=(business.as_str(), i64::MAX))
                .map_err(redb_err)?
            {
                let (_, value) = entry.map_err(redb_err)?;
                records.push(decode(value.value())?);
            }
            Ok(records)
        })
        .await
    }

    async fn get_record(
        &self,
        business: &str,
        id: RecordId,
    ) -> Result<Option<Record>, StoreError> {
        let business = business.to_string();
        self.blocking(move |db| {
            if !schema_exists(db, &business)? {
                return Err(StoreError::business_not_found(&business));
            }
            let txn = db.begin_read().map_err(redb_err)?;
            let table = txn.open_table(RECORDS).map_err(redb_err)?;
            let found = table.get((business.as_str(), id)).map_err(redb_err)?;
            found.map(|value| decode(value.value())).transpose()
        })
        .await
    }

    async fn create_records(
        &self,
        business: &str,
        records: Vec<Record>,
    ) -> Result<Vec<Record>, StoreError> {
        let business = business.to_string();
        self.blocking(move |db| {
            let txn = db.begin_write().map_err(redb_err)?;
            let created = {
                let schemas = txn.open_table(SCHEMAS).map_err(redb_err)?;
                if schemas.get(business.as_str()).map_err(redb_err)?.is_none() {
                    return Err(StoreError::business_not_found(&business));
                }

                let mut table = txn.open_table(RECORDS).map_err(redb_err)?;
                let current_max = match table
                    .range((business.as_str(), i64::MIN)..=(business.as_str(), i64::MAX))
                    .map_err(redb_err)?
                    .next_back()
                {
                    Some(entry) => entry.map_err(redb_err)?.0.value().1,
                    None => 0,
                };
                let planned = assign_ids(
                    &business,
                    current_max,
                    |id| Ok(table.get((business.as_str(), id)).map_err(redb_err)?.is_some()),
                    records,
                )?;

                let mut created = Vec::with_capacity(planned.len());
                for (id, record) in planned {
                    let bytes = encode(&record)?;
                    table
                        .insert((business.as_str(), id), bytes.as_slice())
                        .map_err(redb_err)?;
                    created.push(record);
                }
                created
            };
            txn.commit().map_err(redb_err)?;
            Ok(created)
        })
        .await
    }

    async fn update_record(
        &self,
        business: &str,
        id: RecordId,
        record: Record,
    ) -> Result<Record, StoreError> {
        let business = business.to_string();
        self.blocking(move |db| {
            let record = with_id(record, id);
            let bytes = encode(&record)?;
            let txn = db.begin_write().map_err(redb_err)?;
            {
                let mut table = txn.open_table(RECORDS).map_err(redb_err)?;
                if table.get((business.as_str(), id)).map_err(redb_err)?.is_none() {
                    return Err(StoreError::record_not_found(&business, id));
                }
                table
                    .insert((business.as_str(), id), bytes.as_slice())
                    .map_err(redb_err)?;
            }
            txn.commit().map_err(redb_err)?;
            Ok(record)
        })
        .await
    }

    async fn delete_record(&self, business: &str, id: RecordId) -> Result<(), StoreError> {
        let business = business.to_string();
        self.blocking(move |db| {
            let txn = db.begin_write().map_err(redb_err)?;
            {
                let mut table = txn.open_table(RECORDS).map_err(redb_err)?;
                if table.remove((business.as_str(), id)).map_err(redb_err)?.is_none() {
                    return Err(StoreError::record_not_found(&business, id));
                }
            }
            txn.commit().map_err(redb_err)?;
            Ok(())
        })
        .await
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.blocking(|db| {
            let txn = db.begin_read().map_err(redb_err)?;
            let schemas = txn.open_table(SCHEMAS).map_err(redb_err)?;
            let records = txn.open_table(RECORDS).map_err(redb_err)?;

            let mut records_per_business = BTreeMap::new();
            for entry in schemas.iter().map_err(redb_err)? {
                let (name, _) = entry.map_err(redb_err)?;
                records_per_business.insert(name.value().to_string(), 0usize);
            }
            let total_schemas = records_per_business.len();
            for entry in records.iter().map_err(redb_err)? {
                let (key, _) = entry.map_err(redb_err)?;
                *records_per_business
                    .entry(key.value().0.to_string())
                    .or_insert(0) += 1;
            }

            Ok(StoreStats {
                total_schemas,
                total_records: records_per_business.values().sum(),
                records_per_business,
            })
        })
        .await
    }
}
