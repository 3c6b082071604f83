//! Pairing requests: the temporary handshake channel for relay wallets.
//!
//! A pairing exists only between "connect initiated" and
//! approved/rejected/expired. The bridge enforces at most one active
//! pairing at a time.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::wallet::types::{WalletError, WalletResult};

/// Pairing URI version rendered into `wc:{topic}@{version}`.
const URI_VERSION: u32 = 2;
/// Relay protocol name advertised in the URI.
const RELAY_PROTOCOL: &str = "irn";

/// A transient pairing request awaiting remote wallet approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    /// Topic the wallet subscribes to answer the proposal.
    pub topic: String,
    /// Symmetric key material, hex encoded. Travels in the URI because
    /// wallets require it; payload encryption itself is the transport's
    /// concern.
    pub sym_key: String,
    /// Unix second the pairing was created.
    pub created_at: u64,
    /// Unix second after which the pairing is dead.
    pub expires_at: u64,
}

impl Pairing {
    /// Generate a fresh pairing valid for `ttl_secs`.
    pub fn generate(ttl_secs: u64) -> Self {
        let topic: [u8; 32] = rand::random();
        let sym_key: [u8; 32] = rand::random();
        let created_at = unix_now();
        Self {
            topic: alloy::hex::encode(topic),
            sym_key: alloy::hex::encode(sym_key),
            created_at,
            expires_at: created_at + ttl_secs,
        }
    }

    /// Whether the pairing window has passed.
    pub fn is_expired(&self) -> bool {
        unix_now() >= self.expires_at
    }

    /// Render the pairing URI shown to the user (QR code / copy-paste).
    pub fn uri(&self) -> String {
        format!(
            "wc:{}@{}?relay-protocol={}&symKey={}&expiryTimestamp={}",
            self.topic, URI_VERSION, RELAY_PROTOCOL, self.sym_key, self.expires_at
        )
    }

    /// Render a wallet-specific deep link (`<scheme>://wc?uri=<encoded>`).
    pub fn deep_link(&self, scheme: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(self.uri().as_bytes()).collect();
        format!("{}://wc?uri={}", scheme, encoded)
    }

    /// Parse a pairing URI back into its parts.
    pub fn from_uri(uri: &str) -> WalletResult<Self> {
        let rest = uri
            .strip_prefix("wc:")
            .ok_or_else(|| WalletError::Unsupported(format!("pairing URI '{}'", uri)))?;

        let (head, query) = rest
            .split_once('?')
            .ok_or_else(|| WalletError::Unsupported("pairing URI missing query".to_string()))?;
        let (topic, version) = head
            .split_once('@')
            .ok_or_else(|| WalletError::Unsupported("pairing URI missing version".to_string()))?;
        if version != URI_VERSION.to_string() {
            return Err(WalletError::Unsupported(format!(
                "pairing URI version '{}'",
                version
            )));
        }

        let mut sym_key = None;
        let mut expires_at = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("symKey", v)) => sym_key = Some(v.to_string()),
                Some(("expiryTimestamp", v)) => expires_at = v.parse().ok(),
                _ => {}
            }
        }

        let sym_key = sym_key
            .ok_or_else(|| WalletError::Unsupported("pairing URI missing symKey".to_string()))?;
        let expires_at = expires_at
            .ok_or_else(|| WalletError::Unsupported("pairing URI missing expiry".to_string()))?;

        Ok(Self {
            topic: topic.to_string(),
            sym_key,
            created_at: unix_now(),
            expires_at,
        })
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
