// SPDX-License-Identifier: AGPL-3.0-or-later

//! Atomic balance mutations.
//!
//! Every credit or debit happens in a single redb write transaction that
//! covers the duplicate-hash check, the balance update, the history record,
//! and the index entries. A crash leaves either all of them or none.

use std::collections::BTreeMap;

use chrono::Utc;
use redb::ReadableTable;
use uuid::Uuid;

use super::database::{
    make_index_key, Store, StoreError, TRANSACTIONS, TX_BY_HASH, USERS, USER_TX_INDEX,
};
use super::repository::transactions::{StoredTransaction, TxKind};
use super::repository::users::StoredUser;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: u64, requested: u64 },

    #[error("transaction {0} was already processed")]
    DuplicateTx(String),

    #[error("user {0} not found")]
    UserNotFound(String),

    #[error("balance overflow")]
    Overflow,
}

/// History record to write alongside a balance mutation.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub kind: TxKind,
    pub token: String,
    pub tx_hash: Option<String>,
    pub details: BTreeMap<String, String>,
}

/// Atomic ledger over the user and transaction tables.
pub struct Ledger<'a> {
    store: &'a Store,
}

impl<'a> Ledger<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Credit `lamports` to the user's private balance.
    pub fn credit(
        &self,
        user_id: &str,
        lamports: u64,
        record: NewRecord,
    ) -> Result<StoredUser, LedgerError> {
        self.apply(user_id, lamports, record, |balance, amount| {
            balance.checked_add(amount).ok_or(LedgerError::Overflow)
        })
    }

    /// Debit `lamports` from the user's private balance. Fails without any
    /// write if the balance does not cover the amount.
    pub fn debit(
        &self,
        user_id: &str,
        lamports: u64,
        record: NewRecord,
    ) -> Result<StoredUser, LedgerError> {
        self.apply(user_id, lamports, record, |balance, amount| {
            balance.checked_sub(amount).ok_or(LedgerError::InsufficientFunds {
                available: balance,
                requested: amount,
            })
        })
    }

    /// Append a history record without touching any balance. Used for swaps,
    /// which settle inside the pool.
    pub fn record_only(&self, user_id: &str, lamports: u64, record: NewRecord) -> Result<(), LedgerError> {
        let write_txn = self.store.db.begin_write().map_err(StoreError::from)?;
        {
            // The user must exist even though no balance changes.
            let users = write_txn.open_table(USERS).map_err(StoreError::from)?;
            if users.get(user_id).map_err(StoreError::from)?.is_none() {
                return Err(LedgerError::UserNotFound(user_id.to_string()));
            }
            drop(users);

            Self::append_record(&write_txn, user_id, lamports, &record)?;
        }
        write_txn.commit().map_err(StoreError::from)?;
        Ok(())
    }

    fn apply(
        &self,
        user_id: &str,
        lamports: u64,
        record: NewRecord,
        op: impl FnOnce(u64, u64) -> Result<u64, LedgerError>,
    ) -> Result<StoredUser, LedgerError> {
        let write_txn = self.store.db.begin_write().map_err(StoreError::from)?;
        let user = {
            let mut users = write_txn.open_table(USERS).map_err(StoreError::from)?;

            let existing_bytes = {
                let existing = users
                    .get(user_id)
                    .map_err(StoreError::from)?
                    .ok_or_else(|| LedgerError::UserNotFound(user_id.to_string()))?;
                existing.value().to_vec()
            };

            let mut user: StoredUser =
                serde_json::from_slice(&existing_bytes).map_err(StoreError::from)?;
            user.private_balance_lamports = op(user.private_balance_lamports, lamports)?;
            user.version += 1;

            let json = serde_json::to_vec(&user).map_err(StoreError::from)?;
            users
                .insert(user_id, json.as_slice())
                .map_err(StoreError::from)?;
            drop(users);

            Self::append_record(&write_txn, user_id, lamports, &record)?;
            user
        };
        write_txn.commit().map_err(StoreError::from)?;
        Ok(user)
    }

    /// Write the history record, its hash guard, and its index entry into an
    /// open write transaction. Fails on a duplicate hash before anything in
    /// the transaction can commit.
    fn append_record(
        write_txn: &redb::WriteTransaction,
        user_id: &str,
        lamports: u64,
        record: &NewRecord,
    ) -> Result<(), LedgerError> {
        let tx_id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        if let Some(hash) = &record.tx_hash {
            let mut by_hash = write_txn.open_table(TX_BY_HASH).map_err(StoreError::from)?;
            if by_hash.get(hash.as_str()).map_err(StoreError::from)?.is_some() {
                return Err(LedgerError::DuplicateTx(hash.clone()));
            }
            by_hash
                .insert(hash.as_str(), tx_id.as_str())
                .map_err(StoreError::from)?;
        }

        let stored = StoredTransaction {
            tx_id: tx_id.clone(),
            kind: record.kind,
            user_id: user_id.to_string(),
            amount_lamports: lamports,
            token: record.token.clone(),
            tx_hash: record.tx_hash.clone(),
            details: record.details.clone(),
            created_at,
        };
        let json = serde_json::to_vec(&stored).map_err(StoreError::from)?;

        let mut tx_table = write_txn
            .open_table(TRANSACTIONS)
            .map_err(StoreError::from)?;
        tx_table
            .insert(tx_id.as_str(), json.as_slice())
            .map_err(StoreError::from)?;
        drop(tx_table);

        let mut idx_table = write_txn
            .open_table(USER_TX_INDEX)
            .map_err(StoreError::from)?;
        let key = make_index_key(user_id, created_at.timestamp_micros(), &tx_id);
        idx_table
            .insert(key.as_slice(), tx_id.as_str())
            .map_err(StoreError::from)?;

        Ok(())
    }
}
