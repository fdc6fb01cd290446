// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared application state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::chain::{ChainClient, RelayerSigner};
use crate::config::Config;
use crate::providers::{PrivacyPool, SwapProvider};
use crate::storage::Store;

/// Per-user locks serializing relayer transfers.
///
/// A user may have at most one transfer in flight; concurrent requests for
/// the same user queue behind the lock so each one sees the balance left by
/// the previous one.
#[derive(Clone, Default)]
pub struct TransferLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl TransferLocks {
    /// Acquire the lock for `user_id`, waiting if a transfer is in flight.
    ///
    /// Entries whose lock is no longer held or awaited are dropped on each
    /// acquire, so the map only grows with in-flight transfers.
    pub async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().await;
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub chain: Arc<dyn ChainClient>,
    pub pool: Arc<dyn PrivacyPool>,
    pub swap: Arc<dyn SwapProvider>,
    /// Present only when a relayer keypair is configured; the transfer
    /// endpoint is disabled otherwise.
    pub relayer: Option<Arc<RelayerSigner>>,
    pub transfer_locks: TransferLocks,
}

#[cfg(test)]
pub mod test_support {
    //! Shared fakes and a state harness for handler tests.

    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use solana_sdk::signature::{Keypair, Signer};

    use super::{AppState, TransferLocks};
    use crate::chain::{generate_deposit_keypair, ChainError, ChainClient, RelayerSigner, VerifiedTransfer};
    use crate::config::Config;
    use crate::providers::{PrivacyPool, ProviderError, SwapProvider, TokenInfo};
    use crate::storage::Store;

    /// Programmable fake chain: per-address balances and per-signature
    /// verification results.
    #[derive(Default)]
    pub struct FakeChain {
        pub balances: Mutex<HashMap<String, u64>>,
        pub verifications: Mutex<HashMap<(String, String), VerifiedTransfer>>,
        pub broadcasts: Mutex<Vec<(String, String, u64)>>,
        pub failing_broadcasts: AtomicUsize,
        pub fail_balance: AtomicBool,
    }

    impl FakeChain {
        pub fn set_balance(&self, address: &str, lamports: u64) {
            self.balances
                .lock()
                .unwrap()
                .insert(address.to_string(), lamports);
        }

        pub fn set_verified(&self, signature: &str, address: &str, lamport_delta: i64) {
            self.verifications.lock().unwrap().insert(
                (signature.to_string(), address.to_string()),
                VerifiedTransfer {
                    slot: 1,
                    lamport_delta,
                },
            );
        }
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn balance(&self, address: &str) -> Result<u64, ChainError> {
            if self.fail_balance.load(Ordering::SeqCst) {
                return Err(ChainError::Rpc("simulated rpc failure".into()));
            }
            Ok(*self.balances.lock().unwrap().get(address).unwrap_or(&0))
        }

        async fn transfer_and_confirm(
            &self,
            from: &Keypair,
            to: &str,
            lamports: u64,
        ) -> Result<String, ChainError> {
            self.broadcasts.lock().unwrap().push((
                from.pubkey().to_string(),
                to.to_string(),
                lamports,
            ));
            Ok(format!("confirmed-{lamports}"))
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
            Ok(format!("broadcast-{lamports}"))
        }

        async fn verify_transfer(
            &self,
            signature: &str,
            address: &str,
        ) -> Result<VerifiedTransfer, ChainError> {
            self.verifications
                .lock()
                .unwrap()
                .get(&(signature.to_string(), address.to_string()))
                .cloned()
                .ok_or_else(|| ChainError::NotFound(signature.to_string()))
        }
    }

    /// Fake privacy pool returning canned transactions.
    #[derive(Default)]
    pub struct FakePool {
        pub registrations: Mutex<Vec<String>>,
        pub fail: AtomicBool,
    }

    impl FakePool {
        fn check(&self) -> Result<(), ProviderError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProviderError::Denied {
                    status: 500,
                    detail: "simulated pool failure".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PrivacyPool for FakePool {
        async fn register_user(&self, wallet_address: &str) -> Result<String, ProviderError> {
            self.check()?;
            self.registrations
                .lock()
                .unwrap()
                .push(wallet_address.to_string());
            Ok(format!("sw_test_key_{wallet_address}"))
        }

        async fn create_deposit_tx(
            &self,
            _wallet_address: &str,
            _lamports: u64,
        ) -> Result<String, ProviderError> {
            self.check()?;
            Ok("ZmFrZS1kZXBvc2l0LXR4".to_string())
        }

        async fn create_withdraw_tx(
            &self,
            _wallet_address: &str,
            _lamports: u64,
            _destination: Option<&str>,
            _user_api_key: &str,
        ) -> Result<String, ProviderError> {
            self.check()?;
            Ok("ZmFrZS13aXRoZHJhdy10eA".to_string())
        }
    }

    /// Fake swap provider returning a canned transaction.
    #[derive(Default)]
    pub struct FakeSwap {
        pub calls: Mutex<Vec<(String, String, u64)>>,
        pub fail: AtomicBool,
    }

    #[async_trait]
    impl SwapProvider for FakeSwap {
        async fn create_swap_tx(
            &self,
            user_pubkey: &str,
            input: &TokenInfo,
            _output: &TokenInfo,
            amount: u64,
        ) -> Result<String, ProviderError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProviderError::Denied {
                    status: 500,
                    detail: "simulated swap failure".into(),
                });
            }
            self.calls.lock().unwrap().push((
                user_pubkey.to_string(),
                input.symbol.to_string(),
                amount,
            ));
            Ok("ZmFrZS1zd2FwLXR4".to_string())
        }
    }

    /// Full harness for handler tests: state plus handles on the fakes.
    pub struct TestHarness {
        pub state: AppState,
        pub chain: Arc<FakeChain>,
        pub pool: Arc<FakePool>,
        pub swap: Arc<FakeSwap>,
        pub relayer_address: String,
        _tmp: tempfile::TempDir,
    }

    pub fn harness() -> TestHarness {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(&tmp.path().join("test.redb")).unwrap());

        let chain = Arc::new(FakeChain::default());
        let pool = Arc::new(FakePool::default());
        let swap = Arc::new(FakeSwap::default());

        let (_, relayer_secret) = generate_deposit_keypair();
        let relayer = Arc::new(RelayerSigner::from_base58(&relayer_secret).unwrap());
        let relayer_address = relayer.address();

        let config = Arc::new(Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            data_dir: PathBuf::from(tmp.path()),
            jwt_secret: "test-secret".to_string(),
            solana_rpc_url: "http://localhost:8899".to_string(),
            relayer_secret_key: Some(relayer_secret),
            shadowwire_base_url: "http://localhost:9999".to_string(),
            shadowwire_api_key: None,
            jupiter_quote_url: "http://localhost:9998/quote".to_string(),
            jupiter_swap_url: "http://localhost:9998/swap".to_string(),
        });

        let state = AppState {
            config,
            store,
            chain: chain.clone(),
            pool: pool.clone(),
            swap: swap.clone(),
            relayer: Some(relayer),
            transfer_locks: TransferLocks::default(),
        };

        TestHarness {
            state,
            chain,
            pool,
            swap,
            relayer_address,
            _tmp: tmp,
        }
    }

    /// Minimal state for tests that only need configuration and the store.
    pub fn test_state() -> (AppState, tempfile::TempDir) {
        let h = harness();
        let TestHarness { state, _tmp, .. } = h;
        (state, _tmp)
    }
}
