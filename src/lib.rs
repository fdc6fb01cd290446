// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Spectra Server
//!
//! Backend for the Spectra privacy wallet: shield, swap, transfer, and
//! withdraw Solana funds through an external privacy pool, with an embedded
//! ledger as the source of truth for shielded balances.
//!
//! ## Architecture
//!
//! - [`api`] — HTTP surface (axum) with OpenAPI docs at `/docs`
//! - [`auth`] — wallet-signature login and bearer-token sessions
//! - [`chain`] — Solana RPC client, keypair handling, relay engine
//! - [`providers`] — privacy-pool and swap-aggregator HTTP clients
//! - [`storage`] — embedded redb datastore with an atomic balance ledger
//! - [`state`] — shared application state and per-user transfer locks

pub mod api;
pub mod auth;
pub mod chain;
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod state;
pub mod storage;
