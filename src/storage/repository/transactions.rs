// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transaction history records.
//!
//! Records are written by the ledger as part of balance mutations; this
//! repository only reads them back.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{
    extract_tx_id_from_key, make_prefix, make_prefix_end, Store, StoreResult, TRANSACTIONS,
    TX_BY_HASH, USER_TX_INDEX,
};

/// Kind of history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxKind {
    Deposit,
    Withdraw,
    Swap,
    Transfer,
}

/// A history record as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoredTransaction {
    pub tx_id: String,

    #[serde(rename = "type")]
    pub kind: TxKind,

    pub user_id: String,

    /// Amount in the token's smallest unit.
    pub amount_lamports: u64,

    /// Token symbol, or a pair like `SOL-USDC` for swaps.
    pub token: String,

    /// On-chain signature, when the record corresponds to a single
    /// broadcast transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,

    /// Free-form details (recipient, protocol, relay signatures).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,

    pub created_at: DateTime<Utc>,
}

/// Read access to the transaction tables.
pub struct TransactionRepository<'a> {
    store: &'a Store,
}

impl<'a> TransactionRepository<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Look up a record by its on-chain hash.
    pub fn get_by_hash(&self, tx_hash: &str) -> StoreResult<Option<StoredTransaction>> {
        let read_txn = self.store.db.begin_read()?;
        let by_hash = read_txn.open_table(TX_BY_HASH)?;
        let Some(tx_id) = by_hash.get(tx_hash)? else {
            return Ok(None);
        };
        let table = read_txn.open_table(TRANSACTIONS)?;
        match table.get(tx_id.value())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Newest-first listing of a user's records, capped at `limit`.
    pub fn list_recent(&self, user_id: &str, limit: usize) -> StoreResult<Vec<StoredTransaction>> {
        let read_txn = self.store.db.begin_read()?;
        let idx_table = read_txn.open_table(USER_TX_INDEX)?;
        let tx_table = read_txn.open_table(TRANSACTIONS)?;

        let prefix = make_prefix(user_id);
        let prefix_end = make_prefix_end(user_id);

        let mut results = Vec::with_capacity(limit);
        for entry in idx_table.range(prefix.as_slice()..prefix_end.as_slice())? {
            let entry = entry?;
            let key_bytes = entry.0.value().to_vec();

            if let Some(tx_id) = extract_tx_id_from_key(&key_bytes) {
                if let Some(value) = tx_table.get(tx_id.as_str())? {
                    results.push(serde_json::from_slice(value.value())?);
                }
            }

            if results.len() >= limit {
                break;
            }
        }

        Ok(results)
    }
}
