// SPDX-License-Identifier: AGPL-3.0-or-later

//! Solana RPC client wrapper.
//!
//! The service talks to the chain through the `ChainClient` trait so that
//! route handlers and the relay engine can be exercised against an in-process
//! fake. The production implementation wraps the nonblocking `RpcClient`.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction,
    transaction::Transaction,
};
use solana_transaction_status::UiTransactionEncoding;

/// Upper bound on the confirmation wait for a single transaction.
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("transaction failed on-chain: {0}")]
    TxFailed(String),

    #[error("transaction not found: {0}")]
    NotFound(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

/// Result of looking up a finalized transfer for verification.
#[derive(Debug, Clone)]
pub struct VerifiedTransfer {
    /// Slot the transaction landed in.
    pub slot: u64,
    /// Lamport balance change observed for the queried address
    /// (positive = received, negative = sent, fees included).
    pub lamport_delta: i64,
}

/// Chain operations the service depends on.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current lamport balance of an address.
    async fn balance(&self, address: &str) -> Result<u64, ChainError>;

    /// Build, sign, submit a system transfer and wait for confirmation.
    /// Returns the transaction signature.
    async fn transfer_and_confirm(
        &self,
        from: &Keypair,
        to: &str,
        lamports: u64,
    ) -> Result<String, ChainError>;

    /// Build, sign and submit a system transfer without waiting for
    /// confirmation. Returns the transaction signature.
    async fn transfer(&self, from: &Keypair, to: &str, lamports: u64)
        -> Result<String, ChainError>;

    /// Look up a finalized transaction and report the balance delta it caused
    /// for `address`. Fails if the transaction is unknown, not yet finalized,
    /// or errored on-chain.
    async fn verify_transfer(
        &self,
        signature: &str,
        address: &str,
    ) -> Result<VerifiedTransfer, ChainError>;
}

/// Production client backed by a Solana JSON-RPC endpoint.
pub struct SolanaRpc {
    rpc: RpcClient,
}

impl SolanaRpc {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc: RpcClient::new_with_commitment(rpc_url.into(), CommitmentConfig::confirmed()),
        }
    }

    fn build_transfer(
        &self,
        from: &Keypair,
        to: &str,
        lamports: u64,
        blockhash: solana_sdk::hash::Hash,
    ) -> Result<Transaction, ChainError> {
        let to_pubkey =
            Pubkey::from_str(to).map_err(|e| ChainError::InvalidAddress(e.to_string()))?;
        let instruction = system_instruction::transfer(&from.pubkey(), &to_pubkey, lamports);
        Ok(Transaction::new_signed_with_payer(
            &[instruction],
            Some(&from.pubkey()),
            &[from],
            blockhash,
        ))
    }
}

#[async_trait]
impl ChainClient for SolanaRpc {
    async fn balance(&self, address: &str) -> Result<u64, ChainError> {
        let pubkey =
            Pubkey::from_str(address).map_err(|e| ChainError::InvalidAddress(e.to_string()))?;
        self.rpc
            .get_balance(&pubkey)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    async fn transfer_and_confirm(
        &self,
        from: &Keypair,
        to: &str,
        lamports: u64,
    ) -> Result<String, ChainError> {
        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        let tx = self.build_transfer(from, to, lamports, blockhash)?;

        let signature = tokio::time::timeout(
            CONFIRM_TIMEOUT,
            self.rpc.send_and_confirm_transaction(&tx),
        )
        .await
        .map_err(|_| ChainError::Timeout("transaction confirmation"))?
        .map_err(|e| ChainError::TxFailed(e.to_string()))?;

        Ok(signature.to_string())
    }

    async fn transfer(
        &self,
        from: &Keypair,
        to: &str,
        lamports: u64,
    ) -> Result<String, ChainError> {
        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        let tx = self.build_transfer(from, to, lamports, blockhash)?;

        let signature = self
            .rpc
            .send_transaction(&tx)
            .await
            .map_err(|e| ChainError::TxFailed(e.to_string()))?;

        Ok(signature.to_string())
    }

    async fn verify_transfer(
        &self,
        signature: &str,
        address: &str,
    ) -> Result<VerifiedTransfer, ChainError> {
        let signature = Signature::from_str(signature)
            .map_err(|e| ChainError::InvalidAddress(format!("invalid signature: {e}")))?;
        let pubkey =
            Pubkey::from_str(address).map_err(|e| ChainError::InvalidAddress(e.to_string()))?;

        // get_transaction only returns finalized transactions, which is the
        // finality gate the notify flow requires.
        let confirmed = self
            .rpc
            .get_transaction(&signature, UiTransactionEncoding::Base64)
            .await
            .map_err(|e| ChainError::NotFound(e.to_string()))?;

        let meta = confirmed
            .transaction
            .meta
            .ok_or_else(|| ChainError::NotFound("transaction has no metadata".to_string()))?;

        if let Some(err) = meta.err {
            return Err(ChainError::TxFailed(err.to_string()));
        }

        let decoded = confirmed
            .transaction
            .transaction
            .decode()
            .ok_or_else(|| ChainError::Rpc("could not decode transaction".to_string()))?;

        let account_index = decoded
            .message
            .static_account_keys()
            .iter()
            .position(|key| *key == pubkey)
            .ok_or_else(|| {
                ChainError::NotFound(format!("address {address} not involved in transaction"))
            })?;

        let pre = meta.pre_balances.get(account_index).copied().unwrap_or(0);
        let post = meta.post_balances.get(account_index).copied().unwrap_or(0);

        Ok(VerifiedTransfer {
            slot: confirmed.slot,
            lamport_delta: post as i64 - pre as i64,
        })
    }
}
