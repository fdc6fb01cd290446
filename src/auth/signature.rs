// SPDX-License-Identifier: AGPL-3.0-or-later

//! Wallet-signature verification and session token issuance.

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use solana_sdk::signature::Signature;

use super::claims::{SessionClaims, TOKEN_TTL_SECS};
use super::error::AuthError;

/// Verify an ed25519 signature over `message` against a base58 wallet address.
///
/// Decoding failures (bad base58, wrong lengths) are reported separately from
/// a well-formed signature that simply does not verify, matching the API's
/// 400/401 split.
pub fn verify_wallet_signature(
    wallet_address: &str,
    message: &str,
    signature_b58: &str,
) -> Result<(), AuthError> {
    let pubkey_bytes = bs58::decode(wallet_address)
        .into_vec()
        .map_err(|e| AuthError::MalformedSignature(format!("invalid wallet address: {e}")))?;
    if pubkey_bytes.len() != 32 {
        return Err(AuthError::MalformedSignature(
            "wallet address must decode to 32 bytes".to_string(),
        ));
    }

    let signature_bytes = bs58::decode(signature_b58)
        .into_vec()
        .map_err(|e| AuthError::MalformedSignature(format!("invalid signature: {e}")))?;
    let signature = Signature::try_from(signature_bytes.as_slice())
        .map_err(|_| AuthError::MalformedSignature("signature must be 64 bytes".to_string()))?;

    if signature.verify(&pubkey_bytes, message.as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::InvalidWalletSignature)
    }
}

/// Issue a 24h HS256 session token binding the user id and wallet address.
pub fn issue_token(user_id: &str, wallet_address: &str, secret: &str) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = SessionClaims {
        sub: user_id.to_string(),
        wallet: wallet_address.to_string(),
        iat: now,
        exp: now + TOKEN_TTL_SECS,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::InternalError(format!("token encoding failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::{Keypair, Signer};

    fn signed_login(message: &str) -> (String, String) {
        let keypair = Keypair::new();
        let wallet = keypair.pubkey().to_string();
        let signature = keypair.sign_message(message.as_bytes());
        (wallet, bs58::encode(signature.as_ref()).into_string())
    }

    #[test]
    fn accepts_valid_signature() {
        let message = "Sign in to Spectra";
        let (wallet, signature) = signed_login(message);
        assert!(verify_wallet_signature(&wallet, message, &signature).is_ok());
    }

    #[test]
    fn rejects_signature_over_different_message() {
        let (wallet, signature) = signed_login("Sign in to Spectra");
        let err = verify_wallet_signature(&wallet, "another message", &signature).unwrap_err();
        assert!(matches!(err, AuthError::InvalidWalletSignature));
    }

    #[test]
    fn rejects_signature_from_different_wallet() {
        let message = "Sign in to Spectra";
        let (_, signature) = signed_login(message);
        let other = Keypair::new().pubkey().to_string();
        let err = verify_wallet_signature(&other, message, &signature).unwrap_err();
        assert!(matches!(err, AuthError::InvalidWalletSignature));
    }

    #[test]
    fn rejects_malformed_inputs_as_bad_request() {
        let err = verify_wallet_signature("%%%", "msg", "sig").unwrap_err();
        assert!(matches!(err, AuthError::MalformedSignature(_)));

        let (wallet, _) = signed_login("msg");
        let err = verify_wallet_signature(&wallet, "msg", "abc").unwrap_err();
        assert!(matches!(err, AuthError::MalformedSignature(_)));
    }

    #[test]
    fn issued_token_decodes_with_same_secret() {
        use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

        let token = issue_token("user-1", "WalletAddr", "test-secret").unwrap();
        let data = decode::<crate::auth::SessionClaims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();

        assert_eq!(data.claims.sub, "user-1");
        assert_eq!(data.claims.wallet, "WalletAddr");
        assert_eq!(data.claims.exp - data.claims.iat, TOKEN_TTL_SECS);
    }
}
