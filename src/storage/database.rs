// SPDX-License-Identifier: AGPL-3.0-or-later

//! Embedded datastore backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized StoredUser
//! - `users_by_wallet`: wallet address → user_id
//! - `transactions`: tx_id → serialized StoredTransaction
//! - `tx_by_hash`: on-chain tx hash → tx_id (uniqueness guard)
//! - `user_tx_index`: composite key (user_id|!timestamp|tx_id) → tx_id
//! - `status_checks`: composite key (!timestamp|id) → serialized StatusCheck

use std::path::Path;

use redb::{Database, TableDefinition};

use super::ledger::Ledger;
use super::repository::status::StatusCheckRepository;
use super::repository::transactions::TransactionRepository;
use super::repository::users::UserRepository;

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary user table: user_id → serialized StoredUser (JSON bytes).
pub(crate) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Unique lookup: wallet address → user_id.
pub(crate) const USERS_BY_WALLET: TableDefinition<&str, &str> =
    TableDefinition::new("users_by_wallet");

/// Primary transaction table: tx_id → serialized StoredTransaction (JSON bytes).
pub(crate) const TRANSACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("transactions");

/// Uniqueness guard: on-chain tx hash → tx_id. A hash may credit or debit
/// a balance at most once.
pub(crate) const TX_BY_HASH: TableDefinition<&str, &str> = TableDefinition::new("tx_by_hash");

/// Index: composite key → tx_id.
/// Key format: `user_id|!timestamp_be|tx_id` for descending-time range scans.
pub(crate) const USER_TX_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("user_tx_index");

/// Status checks: composite key (`!timestamp_be|id`) → serialized StatusCheck.
pub(crate) const STATUS_CHECKS: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("status_checks");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key for the user_tx_index table.
///
/// Format: `user_id | inverted_timestamp_be_bytes | tx_id`
///
/// The inverted timestamp ensures newest-first ordering when scanning
/// forward. Callers pass microsecond timestamps so records written in quick
/// succession still sort by creation time rather than by tx_id.
pub(crate) fn make_index_key(user_id: &str, timestamp: i64, tx_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.len() + 1 + 8 + 1 + tx_id.len());
    key.extend_from_slice(user_id.as_bytes());
    key.push(b'|');
    // Invert timestamp for descending order (newest first)
    key.extend_from_slice(&(!timestamp as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(tx_id.as_bytes());
    key
}

/// Build a prefix key for range scanning all transactions of a user.
pub(crate) fn make_prefix(user_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(user_id.len() + 1);
    prefix.extend_from_slice(user_id.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Build the upper bound for a range scan (prefix with all 0xFF bytes appended).
pub(crate) fn make_prefix_end(user_id: &str) -> Vec<u8> {
    let mut end = Vec::with_capacity(user_id.len() + 1 + 20);
    end.extend_from_slice(user_id.as_bytes());
    end.push(b'|');
    // Append enough 0xFF bytes to be past any valid key with this prefix
    end.extend_from_slice(&[0xFF; 20]);
    end
}

/// Extract the tx_id portion from a composite index key.
pub(crate) fn extract_tx_id_from_key(key: &[u8]) -> Option<String> {
    let mut pipe_count = 0;
    for (i, &b) in key.iter().enumerate() {
        if b == b'|' {
            pipe_count += 1;
            if pipe_count == 2 {
                return String::from_utf8(key[i + 1..].to_vec()).ok();
            }
        }
    }
    None
}

// =============================================================================
// Store
// =============================================================================

/// Embedded ACID datastore. Cheap to share behind an `Arc`.
pub struct Store {
    pub(crate) db: Database,
}

impl Store {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERS_BY_WALLET)?;
            let _ = write_txn.open_table(TRANSACTIONS)?;
            let _ = write_txn.open_table(TX_BY_HASH)?;
            let _ = write_txn.open_table(USER_TX_INDEX)?;
            let _ = write_txn.open_table(STATUS_CHECKS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// User lookup and profile mutations.
    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(self)
    }

    /// Transaction history reads.
    pub fn transactions(&self) -> TransactionRepository<'_> {
        TransactionRepository::new(self)
    }

    /// Public status-check records.
    pub fn status_checks(&self) -> StatusCheckRepository<'_> {
        StatusCheckRepository::new(self)
    }

    /// Atomic balance mutations paired with history records.
    pub fn ledger(&self) -> Ledger<'_> {
        Ledger::new(self)
    }
}
