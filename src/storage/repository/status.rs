// SPDX-License-Identifier: AGPL-3.0-or-later

//! Public status-check records.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storage::database::{Store, StoreResult, STATUS_CHECKS};

/// A client-submitted status check.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusCheck {
    pub id: String,
    pub client_name: String,
    pub created_at: DateTime<Utc>,
}

/// Repository over the `status_checks` table.
pub struct StatusCheckRepository<'a> {
    store: &'a Store,
}

impl<'a> StatusCheckRepository<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Persist a new status check.
    pub fn create(&self, client_name: &str) -> StoreResult<StatusCheck> {
        let check = StatusCheck {
            id: Uuid::new_v4().to_string(),
            client_name: client_name.to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_vec(&check)?;
        let key = make_status_key(check.created_at.timestamp_micros(), &check.id);

        let write_txn = self.store.db.begin_write()?;
        {
            let mut table = write_txn.open_table(STATUS_CHECKS)?;
            table.insert(key.as_slice(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(check)
    }

    /// Newest-first listing, capped at `limit`.
    pub fn list(&self, limit: usize) -> StoreResult<Vec<StatusCheck>> {
        let read_txn = self.store.db.begin_read()?;
        let table = read_txn.open_table(STATUS_CHECKS)?;

        let mut results = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            results.push(serde_json::from_slice(entry.1.value())?);
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }
}

/// Key format: `inverted_timestamp_be_bytes | id` for newest-first scans.
fn make_status_key(timestamp: i64, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + 1 + id.len());
    key.extend_from_slice(&(!timestamp as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(id.as_bytes());
    key
}
