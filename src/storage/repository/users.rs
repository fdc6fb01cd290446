// SPDX-License-Identifier: AGPL-3.0-or-later

//! User records and profile mutations.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::database::{Store, StoreError, StoreResult, USERS, USERS_BY_WALLET};

/// A Spectra user as persisted.
///
/// Balances are tracked in the token's smallest unit (lamports for SOL).
/// The ledger is the source of truth for private balances; on-chain custodial
/// balances are informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    pub user_id: String,

    /// Public wallet address the user signs in with.
    pub wallet_address: String,

    /// Shielded SOL balance in lamports.
    pub private_balance_lamports: u64,

    /// Shielded USDC balance in its smallest unit (6 decimals).
    pub usdc_balance: u64,

    /// Per-user privacy-pool API key, set after registration with the pool.
    pub pool_api_key: Option<String>,

    /// Custodial deposit keypair, generated at first login. The secret is the
    /// base58-encoded 64-byte keypair and never leaves the backend.
    pub deposit_address: Option<String>,
    pub deposit_secret: Option<String>,

    /// Bumped on every balance mutation.
    pub version: u64,

    pub created_at: DateTime<Utc>,
}

impl StoredUser {
    fn new(wallet_address: &str) -> Self {
        Self {
            user_id: Uuid::new_v4().to_string(),
            wallet_address: wallet_address.to_string(),
            private_balance_lamports: 0,
            usdc_balance: 0,
            pool_api_key: None,
            deposit_address: None,
            deposit_secret: None,
            version: 0,
            created_at: Utc::now(),
        }
    }
}

/// Repository over the `users` tables.
pub struct UserRepository<'a> {
    store: &'a Store,
}

impl<'a> UserRepository<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Look up a user by internal id.
    pub fn get(&self, user_id: &str) -> StoreResult<Option<StoredUser>> {
        let read_txn = self.store.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look up a user by internal id, failing if missing.
    pub fn get_required(&self, user_id: &str) -> StoreResult<StoredUser> {
        self.get(user_id)?
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))
    }

    /// Look up a user by wallet address.
    pub fn find_by_wallet(&self, wallet_address: &str) -> StoreResult<Option<StoredUser>> {
        let read_txn = self.store.db.begin_read()?;
        let by_wallet = read_txn.open_table(USERS_BY_WALLET)?;
        let Some(user_id) = by_wallet.get(wallet_address)? else {
            return Ok(None);
        };
        let users = read_txn.open_table(USERS)?;
        match users.get(user_id.value())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Fetch the user for a wallet, creating a fresh record on first login.
    pub fn find_or_create(&self, wallet_address: &str) -> StoreResult<StoredUser> {
        if let Some(user) = self.find_by_wallet(wallet_address)? {
            return Ok(user);
        }

        let user = StoredUser::new(wallet_address);
        let json = serde_json::to_vec(&user)?;

        let write_txn = self.store.db.begin_write()?;
        {
            let mut by_wallet = write_txn.open_table(USERS_BY_WALLET)?;
            // A concurrent login may have raced us; keep the existing record.
            if by_wallet.get(wallet_address)?.is_none() {
                by_wallet.insert(wallet_address, user.user_id.as_str())?;
                let mut users = write_txn.open_table(USERS)?;
                users.insert(user.user_id.as_str(), json.as_slice())?;
            }
        }
        write_txn.commit()?;

        // Re-read so the racing case returns the winning record.
        self.find_by_wallet(wallet_address)?
            .ok_or_else(|| StoreError::NotFound(format!("user for wallet {wallet_address}")))
    }

    /// Store the per-user privacy-pool API key.
    pub fn set_pool_api_key(&self, user_id: &str, api_key: &str) -> StoreResult<StoredUser> {
        self.update(user_id, |user| {
            user.pool_api_key = Some(api_key.to_string());
        })
    }

    /// Store the custodial deposit keypair. Write-once: an existing keypair
    /// is never replaced, funds may already sit on it.
    pub fn set_deposit_keypair(
        &self,
        user_id: &str,
        address: &str,
        secret: &str,
    ) -> StoreResult<StoredUser> {
        self.update(user_id, |user| {
            if user.deposit_address.is_none() {
                user.deposit_address = Some(address.to_string());
                user.deposit_secret = Some(secret.to_string());
            }
        })
    }

    /// Overwrite the private balance. Maintenance use only; regular flows go
    /// through the ledger.
    pub fn force_set_balance(&self, user_id: &str, lamports: u64) -> StoreResult<StoredUser> {
        self.update(user_id, |user| {
            user.private_balance_lamports = lamports;
            user.version += 1;
        })
    }

    fn update(
        &self,
        user_id: &str,
        mutate: impl FnOnce(&mut StoredUser),
    ) -> StoreResult<StoredUser> {
        let write_txn = self.store.db.begin_write()?;
        let user = {
            let mut users = write_txn.open_table(USERS)?;

            let existing_bytes = {
                let existing = users
                    .get(user_id)?
                    .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))?;
                existing.value().to_vec()
            };

            let mut user: StoredUser = serde_json::from_slice(&existing_bytes)?;
            mutate(&mut user);

            let json = serde_json::to_vec(&user)?;
            users.insert(user_id, json.as_slice())?;
            user
        };
        write_txn.commit()?;
        Ok(user)
    }
}
