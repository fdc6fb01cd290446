// SPDX-License-Identifier: AGPL-3.0-or-later

//! Custodial and relayer keypair handling.
//!
//! Custodial deposit keypairs are generated server-side, one per user, and
//! persisted as base58-encoded 64-byte secrets next to their public address.
//! The relayer keypair is a single process-wide signing capability decoded
//! once at startup and injected where relayer-side signing is needed.

use std::str::FromStr;

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};

use super::client::ChainError;

/// Generate a fresh ed25519 deposit keypair.
///
/// Returns `(public_address, secret)` where both halves are base58 encoded
/// and the secret is the full 64-byte keypair.
pub fn generate_deposit_keypair() -> (String, String) {
    let keypair = Keypair::new();
    let address = keypair.pubkey().to_string();
    let secret = bs58::encode(keypair.to_bytes()).into_string();
    (address, secret)
}

/// Decode a base58 64-byte secret back into a signing keypair.
pub fn decode_keypair(secret_b58: &str) -> Result<Keypair, ChainError> {
    let bytes = bs58::decode(secret_b58)
        .into_vec()
        .map_err(|e| ChainError::InvalidKey(format!("base58 decode failed: {e}")))?;
    Keypair::from_bytes(&bytes)
        .map_err(|e| ChainError::InvalidKey(format!("invalid keypair bytes: {e}")))
}

/// Validate that a string parses as a Solana public key.
pub fn validate_address(address: &str) -> Result<Pubkey, ChainError> {
    Pubkey::from_str(address).map_err(|e| ChainError::InvalidAddress(e.to_string()))
}

/// Process-wide relayer signing capability.
///
/// Wraps the shared relayer keypair so handlers depend on an injected signer
/// rather than reading the secret from the environment per call.
pub struct RelayerSigner {
    keypair: Keypair,
}

impl RelayerSigner {
    /// Decode the relayer keypair from its base58 secret.
    pub fn from_base58(secret_b58: &str) -> Result<Self, ChainError> {
        Ok(Self {
            keypair: decode_keypair(secret_b58)?,
        })
    }

    /// The relayer's public address.
    pub fn address(&self) -> String {
        self.keypair.pubkey().to_string()
    }

    /// Borrow the signing keypair.
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keypair_round_trips() {
        let (address, secret) = generate_deposit_keypair();
        let keypair = decode_keypair(&secret).unwrap();
        assert_eq!(keypair.pubkey().to_string(), address);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_keypair("not-base58-%%%").is_err());
        // Valid base58 but wrong length.
        assert!(decode_keypair("3mJr7").is_err());
    }

    #[test]
    fn validate_address_accepts_generated_pubkeys() {
        let (address, _) = generate_deposit_keypair();
        assert!(validate_address(&address).is_ok());
        assert!(validate_address("definitely not a pubkey").is_err());
    }

    #[test]
    fn relayer_signer_exposes_matching_address() {
        let (address, secret) = generate_deposit_keypair();
        let signer = RelayerSigner::from_base58(&secret).unwrap();
        assert_eq!(signer.address(), address);
    }
}
