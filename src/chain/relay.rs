// SPDX-License-Identifier: AGPL-3.0-or-later

//! Two-hop relayer transfer engine.
//!
//! Moves funds from a user's custodial deposit keypair to the shared relayer,
//! then from the relayer to the recipient. Hop 1 is confirmed before hop 2 is
//! broadcast; a hop-2 failure leaves the funds parked on the relayer, which
//! callers must journal for operator reconciliation.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::signature::Keypair;
use tracing::{error, info, warn};

use super::client::{ChainClient, ChainError};
use super::keys::RelayerSigner;
use super::types::FLAT_FEE_LAMPORTS;

/// Fixed backoff before the single balance-fetch retry.
const BALANCE_RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("amount {lamports} lamports does not cover the {fee} lamport relay fee")]
    AmountTooSmall { lamports: u64, fee: u64 },

    #[error("custodial balance {available} lamports below required {required}")]
    InsufficientFunds { available: u64, required: u64 },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Result of a completed (or partially completed) relay.
#[derive(Debug, Clone)]
pub struct RelayOutcome {
    /// Confirmed custodial → relayer signature.
    pub hop1_signature: String,
    /// Relayer → recipient signature; `None` when hop 2 could not be
    /// broadcast and the funds await reconciliation on the relayer.
    pub hop2_signature: Option<String>,
    /// Lamports forwarded to the recipient in hop 2.
    pub relayed_lamports: u64,
}

impl RelayOutcome {
    pub fn needs_reconciliation(&self) -> bool {
        self.hop2_signature.is_none()
    }
}

/// Executes relayer-mediated transfers.
pub struct RelayEngine {
    chain: Arc<dyn ChainClient>,
    relayer: Arc<RelayerSigner>,
}

impl RelayEngine {
    pub fn new(chain: Arc<dyn ChainClient>, relayer: Arc<RelayerSigner>) -> Self {
        Self { chain, relayer }
    }

    /// Relay `lamports` from the custodial keypair to `recipient`.
    ///
    /// Fails closed before any broadcast when the amount does not leave a
    /// positive hop-2 payout after the flat fee, or when the custodial
    /// balance does not cover the amount plus one flat fee per hop. Hop 1 is
    /// awaited to confirmation; hop 2 is broadcast only, with a single retry.
    /// If both hop-2 attempts fail the outcome carries no hop-2 signature and
    /// the caller must record the stranded funds.
    pub async fn execute(
        &self,
        custodial: &Keypair,
        custodial_address: &str,
        recipient: &str,
        lamports: u64,
    ) -> Result<RelayOutcome, RelayError> {
        // Dust that the fee would swallow must be rejected before hop 1
        // moves anything.
        let relayed_lamports = lamports
            .checked_sub(FLAT_FEE_LAMPORTS)
            .filter(|remaining| *remaining > 0)
            .ok_or(RelayError::AmountTooSmall {
                lamports,
                fee: FLAT_FEE_LAMPORTS,
            })?;

        let available = self.balance_with_retry(custodial_address).await?;
        let required = lamports + 2 * FLAT_FEE_LAMPORTS;
        if available < required {
            return Err(RelayError::InsufficientFunds {
                available,
                required,
            });
        }

        let relayer_address = self.relayer.address();
        let hop1_signature = self
            .chain
            .transfer_and_confirm(custodial, &relayer_address, lamports)
            .await?;
        info!(
            signature = %hop1_signature,
            lamports,
            "relay hop 1 confirmed (custodial -> relayer)"
        );

        let hop2_signature = match self
            .broadcast_hop2_with_retry(recipient, relayed_lamports)
            .await
        {
            Ok(signature) => {
                info!(
                    signature = %signature,
                    lamports = relayed_lamports,
                    "relay hop 2 broadcast (relayer -> recipient)"
                );
                Some(signature)
            }
            Err(e) => {
                error!(
                    hop1 = %hop1_signature,
                    recipient,
                    error = %e,
                    "relay hop 2 failed after retry; funds parked on relayer"
                );
                None
            }
        };

        Ok(RelayOutcome {
            hop1_signature,
            hop2_signature,
            relayed_lamports,
        })
    }

    /// Fetch the custodial balance, retrying once after a fixed backoff.
    async fn balance_with_retry(&self, address: &str) -> Result<u64, ChainError> {
        match self.chain.balance(address).await {
            Ok(balance) => Ok(balance),
            Err(first) => {
                warn!(address, error = %first, "balance fetch failed, retrying once");
                tokio::time::sleep(BALANCE_RETRY_BACKOFF).await;
                self.chain.balance(address).await
            }
        }
    }

    async fn broadcast_hop2_with_retry(
        &self,
        recipient: &str,
        lamports: u64,
    ) -> Result<String, ChainError> {
        match self
            .chain
            .transfer(self.relayer.keypair(), recipient, lamports)
            .await
        {
            Ok(signature) => Ok(signature),
            Err(first) => {
                warn!(recipient, error = %first, "hop 2 broadcast failed, retrying once");
                self.chain
                    .transfer(self.relayer.keypair(), recipient, lamports)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::client::VerifiedTransfer;
    use crate::chain::keys::generate_deposit_keypair;
    use async_trait::async_trait;
    use solana_sdk::signature::Signer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Programmable fake chain client.
    pub struct FakeChain {
        pub balance: Mutex<Result<u64, String>>,
        pub balance_calls: AtomicUsize,
        pub fail_confirmed_transfers: bool,
        pub failing_broadcasts: AtomicUsize,
        pub broadcasts: Mutex<Vec<(String, String, u64)>>,
    }

    impl FakeChain {
        pub fn with_balance(balance: u64) -> Self {
            Self {
                balance: Mutex::new(Ok(balance)),
                balance_calls: AtomicUsize::new(0),
                fail_confirmed_transfers: false,
                failing_broadcasts: AtomicUsize::new(0),
                broadcasts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn balance(&self, _address: &str) -> Result<u64, ChainError> {
            self.balance_calls.fetch_add(1, Ordering::SeqCst);
            self.balance
                .lock()
                .unwrap()
                .clone()
                .map_err(ChainError::Rpc)
        }

        async fn transfer_and_confirm(
            &self,
            from: &Keypair,
            to: &str,
            lamports: u64,
        ) -> Result<String, ChainError> {
            if self.fail_confirmed_transfers {
                return Err(ChainError::TxFailed("simulated on-chain error".into()));
            }
            self.broadcasts.lock().unwrap().push((
                from.pubkey().to_string(),
                to.to_string(),
                lamports,
            ));
            Ok(format!("confirmed-{}", lamports))
        }

        async fn transfer(
            &self,
            from: &Keypair,
            to: &str,
            lamports: u64,
        ) -> Result<String, ChainError> {
            let remaining = self.failing_broadcasts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failing_broadcasts.store(remaining - 1, Ordering::SeqCst);
                return Err(ChainError::TxFailed("simulated broadcast error".into()));
            }
            self.broadcasts.lock().unwrap().push((
                from.pubkey().to_string(),
                to.to_string(),
                lamports,
            ));
            Ok(format!("broadcast-{}", lamports))
        }

        async fn verify_transfer(
            &self,
            _signature: &str,
            _address: &str,
        ) -> Result<VerifiedTransfer, ChainError> {
            unimplemented!("not used by relay tests")
        }
    }

    fn engine_with(chain: Arc<FakeChain>) -> (RelayEngine, String) {
        let (_, secret) = generate_deposit_keypair();
        let relayer = Arc::new(RelayerSigner::from_base58(&secret).unwrap());
        let address = relayer.address();
        (RelayEngine::new(chain, relayer), address)
    }

    fn custodial() -> (Keypair, String) {
        let (address, secret) = generate_deposit_keypair();
        (crate::chain::decode_keypair(&secret).unwrap(), address)
    }

    #[tokio::test]
    async fn rejects_amounts_the_fee_would_swallow_before_broadcast() {
        let chain = Arc::new(FakeChain::with_balance(2_000_000_000));
        let (engine, _) = engine_with(chain.clone());
        let (keypair, address) = custodial();

        // Everything up to the fee itself leaves no hop-2 payout.
        for lamports in [1_000, FLAT_FEE_LAMPORTS] {
            let err = engine
                .execute(&keypair, &address, "recipient", lamports)
                .await
                .unwrap_err();
            assert!(matches!(err, RelayError::AmountTooSmall { .. }));
        }
        assert!(chain.broadcasts.lock().unwrap().is_empty());

        // One lamport above the fee is the smallest relayable amount.
        let outcome = engine
            .execute(&keypair, &address, "recipient", FLAT_FEE_LAMPORTS + 1)
            .await
            .unwrap();
        assert_eq!(outcome.relayed_lamports, 1);
    }

    #[tokio::test]
    async fn rejects_insufficient_custodial_balance_before_broadcast() {
        let chain = Arc::new(FakeChain::with_balance(1_000_000));
        let (engine, _) = engine_with(chain.clone());
        let (keypair, address) = custodial();

        let err = engine
            .execute(&keypair, &address, "recipient", 1_000_000)
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::InsufficientFunds { .. }));
        assert!(chain.broadcasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn happy_path_broadcasts_two_hops_with_fee_deduction() {
        let chain = Arc::new(FakeChain::with_balance(2_000_000_000));
        let (engine, relayer_address) = engine_with(chain.clone());
        let (keypair, address) = custodial();

        let outcome = engine
            .execute(&keypair, &address, "RecipientAddr", 500_000_000)
            .await
            .unwrap();

        assert!(!outcome.needs_reconciliation());
        assert_eq!(outcome.relayed_lamports, 500_000_000 - FLAT_FEE_LAMPORTS);

        let broadcasts = chain.broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 2);
        // Hop 1: custodial -> relayer, full amount.
        assert_eq!(broadcasts[0].1, relayer_address);
        assert_eq!(broadcasts[0].2, 500_000_000);
        // Hop 2: relayer -> recipient, amount minus one flat fee.
        assert_eq!(broadcasts[1].0, relayer_address);
        assert_eq!(broadcasts[1].1, "RecipientAddr");
        assert_eq!(broadcasts[1].2, 500_000_000 - FLAT_FEE_LAMPORTS);
    }

    #[tokio::test]
    async fn hop1_failure_aborts_without_hop2() {
        let mut fake = FakeChain::with_balance(2_000_000_000);
        fake.fail_confirmed_transfers = true;
        let chain = Arc::new(fake);
        let (engine, _) = engine_with(chain.clone());
        let (keypair, address) = custodial();

        let err = engine
            .execute(&keypair, &address, "recipient", 500_000_000)
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Chain(ChainError::TxFailed(_))));
        assert!(chain.broadcasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn hop2_retry_succeeds_after_one_failure() {
        let fake = FakeChain::with_balance(2_000_000_000);
        fake.failing_broadcasts.store(1, Ordering::SeqCst);
        let chain = Arc::new(fake);
        let (engine, _) = engine_with(chain.clone());
        let (keypair, address) = custodial();

        let outcome = engine
            .execute(&keypair, &address, "recipient", 500_000_000)
            .await
            .unwrap();

        assert!(outcome.hop2_signature.is_some());
    }

    #[tokio::test]
    async fn hop2_double_failure_reports_reconciliation() {
        let fake = FakeChain::with_balance(2_000_000_000);
        fake.failing_broadcasts.store(2, Ordering::SeqCst);
        let chain = Arc::new(fake);
        let (engine, _) = engine_with(chain.clone());
        let (keypair, address) = custodial();

        let outcome = engine
            .execute(&keypair, &address, "recipient", 500_000_000)
            .await
            .unwrap();

        assert!(outcome.needs_reconciliation());
        // Hop 1 still happened.
        assert_eq!(chain.broadcasts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn balance_fetch_retries_once() {
        let fake = FakeChain::with_balance(0);
        *fake.balance.lock().unwrap() = Err("rpc down".to_string());
        let chain = Arc::new(fake);
        let (engine, _) = engine_with(chain.clone());
        let (keypair, address) = custodial();

        let err = engine
            .execute(&keypair, &address, "recipient", 1_000_000)
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Chain(ChainError::Rpc(_))));
        assert_eq!(chain.balance_calls.load(Ordering::SeqCst), 2);
    }
}
