// SPDX-License-Identifier: AGPL-3.0-or-later

//! Solana integration module.
//!
//! This module provides:
//! - A `ChainClient` trait over the JSON-RPC operations the service needs
//!   (balances, transfers, on-chain verification), with the production
//!   implementation backed by `solana-client`
//! - Custodial/relayer keypair handling
//! - The two-hop relayer transfer engine

pub mod client;
pub mod keys;
pub mod relay;
pub mod types;

pub use client::{ChainClient, ChainError, SolanaRpc, VerifiedTransfer};
pub use keys::{decode_keypair, generate_deposit_keypair, validate_address, RelayerSigner};
pub use relay::{RelayEngine, RelayError, RelayOutcome};
pub use types::{lamports_to_sol, sol_to_lamports, FLAT_FEE_LAMPORTS, VERIFY_TOLERANCE_LAMPORTS};
