// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Storage Module
//!
//! Persistence for Spectra: a single embedded redb database holding users,
//! the private-balance ledger, transaction history, and status checks.
//!
//! Writes that must be atomic (balance mutation + history record + hash
//! guard) go through [`ledger::Ledger`]; everything else through the typed
//! repositories.

pub mod database;
pub mod ledger;
pub mod repository;

pub use database::{Store, StoreError, StoreResult};
pub use ledger::{Ledger, LedgerError, NewRecord};
pub use repository::status::{StatusCheck, StatusCheckRepository};
pub use repository::transactions::{StoredTransaction, TransactionRepository, TxKind};
pub use repository::users::{StoredUser, UserRepository};
