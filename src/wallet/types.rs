//! Wallet error taxonomy and account-identifier parsing.

use alloy::primitives::Address;
use thiserror::Error;

/// Errors that can occur while connecting to or talking with a wallet.
///
/// Every variant is recoverable: the bridge returns to a clean
/// disconnected state and the user can re-initiate.
#[derive(Debug, Error)]
pub enum WalletError {
    /// The user declined the connection or signing prompt.
    #[error("rejected by the wallet")]
    UserRejected,

    /// No injected signer is available and the mode requires one.
    #[error("no injected wallet available; set {0} or use relay pairing")]
    NoWallet(&'static str),

    /// The wallet offered an account on a different chain.
    #[error("unsupported chain: expected {expected}, wallet offered {actual}")]
    UnsupportedChain { expected: u64, actual: u64 },

    /// The wallet does not support a required method or namespace.
    #[error("unsupported by wallet: {0}")]
    Unsupported(String),

    /// No approval arrived within the pairing window.
    #[error("pairing not approved within {0} seconds")]
    PairingTimeout(u64),

    /// The wallet did not answer a session request in time.
    #[error("wallet did not respond within {0} seconds")]
    RequestTimeout(u64),

    /// The relay or RPC transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The account ownership proof did not check out.
    #[error("account verification failed: {0}")]
    Verification(String),
}

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;

/// Parse a CAIP-10 account identifier (`eip155:<chain>:<address>`).
///
/// Settled sessions carry accounts in this form; anything outside the
/// eip155 namespace is rejected as unsupported.
pub fn parse_caip10_account(account: &str) -> WalletResult<(u64, Address)> {
    let mut parts = account.splitn(3, ':');
    let namespace = parts.next().unwrap_or_default();
    let reference = parts.next().unwrap_or_default();
    let address = parts.next().unwrap_or_default();

    if namespace != "eip155" {
        return Err(WalletError::Unsupported(format!(
            "account namespace '{}' (expected eip155)",
            namespace
        )));
    }

    let chain_id: u64 = reference
        .parse()
        .map_err(|_| WalletError::Unsupported(format!("chain reference '{}'", reference)))?;

    let address: Address = address
        .parse()
        .map_err(|_| WalletError::Unsupported(format!("account address '{}'", address)))?;

    Ok((chain_id, address))
}
