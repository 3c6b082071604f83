//! The injected connection path: a signer available in-process.
//!
//! # Security
//! - Key material is loaded ONLY from an environment variable
//! - Keys are never logged or serialized
//!
//! This is the headless analog of an in-page wallet: no pairing, the
//! account is available immediately, approval is implicit.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::wallet::types::{WalletError, WalletResult};

/// Environment variable holding the injected wallet's private key.
pub const WALLET_KEY_ENV_VAR: &str = "PRESALE_WALLET_KEY";

/// A locally held signer with nonce management.
#[derive(Debug, Clone)]
pub struct InjectedSigner {
    signer: PrivateKeySigner,
    /// Next nonce for sequential transactions.
    nonce: Arc<AtomicU64>,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl InjectedSigner {
    /// Build a signer from a hex-encoded private key.
    ///
    /// The key is parsed and held in memory only; it is never logged.
    pub fn from_key(private_key_hex: &str, chain_id: u64) -> WalletResult<Self> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| WalletError::Verification(format!("invalid private key: {}", e)))?;

        tracing::info!(
            address = %signer.address(),
            chain_id = chain_id,
            "Injected signer ready"
        );

        Ok(Self {
            signer,
            nonce: Arc::new(AtomicU64::new(0)),
            chain_id,
        })
    }

    /// Detect and load the signer from the environment.
    ///
    /// `Ok(None)` when the variable is unset: the caller falls back to
    /// relay pairing (or fails, in injected-only mode).
    pub fn detect(chain_id: u64) -> WalletResult<Option<Self>> {
        match std::env::var(WALLET_KEY_ENV_VAR) {
            Ok(key) if !key.trim().is_empty() => Self::from_key(&key, chain_id).map(Some),
            _ => Ok(None),
        }
    }

    /// The signer's account.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// The chain this signer is configured for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Get and increment the nonce atomically.
    pub fn get_and_increment_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }

    /// Set the nonce after syncing from the chain.
    pub fn set_nonce(&self, nonce: u64) {
        self.nonce.store(nonce, Ordering::SeqCst);
    }

    /// Sign message bytes (with the Ethereum personal-message prefix).
    pub async fn sign_message(&self, message: &[u8]) -> WalletResult<alloy::signers::Signature> {
        self.signer
            .sign_message(message)
            .await
            .map_err(|e| WalletError::Verification(format!("signing failed: {}", e)))
    }

    /// Prove account ownership: sign `message` and recover the address.
    ///
    /// The recovered address must match the signer's account; anything
    /// else means the key and the claimed account diverge.
    pub async fn verify_ownership(&self, message: &str) -> WalletResult<()> {
        let signature = self.sign_message(message.as_bytes()).await?;
        let recovered = signature
            .recover_address_from_msg(message.as_bytes())
            .map_err(|e| WalletError::Verification(format!("recovery failed: {}", e)))?;

        if recovered != self.address() {
            return Err(WalletError::Verification(format!(
                "recovered {} but expected {}",
                recovered,
                self.address()
            )));
        }
        Ok(())
    }

    /// Borrow the underlying signer for transaction building.
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}
