//! Storage providers for schemas and records.
//!
//! - [`MemoryStore`]: process-local, lost on exit
//! - [`RedbStore`]: embedded single-file database (feature `redb`)
//! - [`RemoteStore`]: client of another formgrid server's REST API
//!
//! All three implement [`BusinessStore`](crate::traits::BusinessStore) and
//! share the id assignment rules in [`assign_ids`].

pub mod memory;
#[cfg(feature = "redb")]
pub mod redb_store;
pub mod remote;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use formgrid_core::field::ID_KEY;
use formgrid_core::record::{display_value, id_from_value};
use formgrid_core::{Record, RecordId};
use serde_json::Value;

pub use memory::MemoryStore;
#[cfg(feature = "redb")]
pub use redb_store::RedbStore;
pub use remote::RemoteStore;

use crate::traits::{BusinessStore, StoreError};

/// Which provider backs the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Redb(PathBuf),
    Remote(String),
}

/// Opens the configured provider.
///
/// # Errors
///
/// Fails when the database file cannot be opened, the remote URL is invalid,
/// or the `redb` backend is requested without the `redb` feature.
pub fn open_store(backend: &StorageBackend) -> Result<Arc<dyn BusinessStore>, StoreError> {
    match backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "redb")]
        StorageBackend::Redb(path) => Ok(Arc::new(RedbStore::open(path)?)),
        #[cfg(not(feature = "redb"))]
        StorageBackend::Redb(path) => Err(anyhow::anyhow!(
            "cannot open {}: built without the redb feature",
            path.display()
        )
        .into()),
        StorageBackend::Remote(url) => Ok(Arc::new(RemoteStore::new(url)?)),
    }
}

/// The id a record asks for. Absent, `null`, blank and `0` ids ask for
/// assignment; anything else must be a positive integer.
pub(crate) fn requested_id(record: &Record) -> Result<Option<RecordId>, StoreError> {
    let value = match record.get(ID_KEY) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(value) => value,
    };
    match id_from_value(value) {
        Some(0) => Ok(None),
        Some(id) if id > 0 => Ok(Some(id)),
        _ => Err(StoreError::InvalidId {
            value: display_value(value),
        }),
    }
}

/// Plans the insert of a batch: every record gets its final id written into
/// it. Assigned ids continue from the highest id seen so far, including ids
/// earlier in the same batch.
///
/// `current_max` is the highest stored id of the business (0 when empty) and
/// `is_taken` reports whether an id is already stored. The batch is rejected
/// as a whole on the first conflict.
pub(crate) fn assign_ids<F>(
    business: &str,
    current_max: RecordId,
    mut is_taken: F,
    records: Vec<Record>,
) -> Result<Vec<(RecordId, Record)>, StoreError>
where
    F: FnMut(RecordId) -> Result<bool, StoreError>,
{
    let mut max = current_max;
    let mut in_batch = HashSet::with_capacity(records.len());
    let mut planned = Vec::with_capacity(records.len());

    for mut record in records {
        let id = match requested_id(&record)? {
            Some(id) => {
                if in_batch.contains(&id) || is_taken(id)? {
                    return Err(StoreError::IdTaken {
                        business: business.to_string(),
                        id,
                    });
                }
                id
            }
            None => max.checked_add(1).ok_or_else(|| StoreError::IdSpaceExhausted {
                business: business.to_string(),
            })?,
        };
        in_batch.insert(id);
        max = max.max(id);
        record.insert(ID_KEY.to_string(), Value::from(id));
        planned.push((id, record));
    }

    Ok(planned)
}

/// Returns `record` with its `id` set to `id`.
pub(crate) fn with_id(mut record: Record, id: RecordId) -> Record {
    record.insert(ID_KEY.to_string(), Value::from(id));
    record
}
