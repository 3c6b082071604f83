//! Session protocol payloads exchanged with a remote wallet.
//!
//! Messages follow the WalletConnect sign-protocol method registry:
//! each payload has a method name, a numeric tag, and a publish TTL.
//! Encryption of the payload envelope is delegated to the transport;
//! these types only define shape and routing metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata describing this application, shown by wallets at pairing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppMetadata {
    pub name: String,
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub icons: Vec<String>,
}

/// A session proposal: which chain and methods we want approval for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionPropose {
    /// Proposer metadata for the wallet's approval screen.
    pub metadata: AppMetadata,
    /// CAIP-2 chain we require, e.g. `eip155:56`.
    pub required_chain: String,
    /// JSON-RPC methods the session must support.
    pub methods: Vec<String>,
    /// Relay project identifier.
    pub project_id: String,
}

/// A settled session: the wallet's answer to a proposal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSettle {
    /// Topic for all further session traffic (wallet-chosen).
    pub session_topic: String,
    /// Approved accounts as CAIP-10 identifiers.
    pub accounts: Vec<String>,
    /// Unix expiry of the session.
    pub expiry: u64,
}

/// A request sent to the remote wallet over a settled session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRequest {
    /// Correlates the eventual `SessionResponse`.
    pub id: u64,
    /// JSON-RPC method, e.g. `personal_sign` or `eth_sendTransaction`.
    pub method: String,
    /// Method parameters, passed through untouched.
    pub params: Value,
    /// CAIP-2 chain the request targets.
    pub chain_id: String,
}

/// The wallet's answer to a `SessionRequest`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionResponse {
    /// Matches the request id.
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// Error payload inside a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// User-rejected-request error code, per EIP-1193.
pub const CODE_USER_REJECTED: i64 = 4001;
/// Unsupported-chain error code.
pub const CODE_UNSUPPORTED_CHAIN: i64 = 4901;

/// Reason attached to a delete message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteReason {
    pub code: i64,
    pub message: String,
}

impl DeleteReason {
    pub fn user_disconnected() -> Self {
        Self {
            code: 6000,
            message: "user disconnected".to_string(),
        }
    }

    pub fn superseded() -> Self {
        Self {
            code: 6001,
            message: "pairing superseded by a new connect attempt".to_string(),
        }
    }

    pub fn expired() -> Self {
        Self {
            code: 6002,
            message: "pairing expired".to_string(),
        }
    }
}

/// Every message that can travel over a pairing or session topic.
///
/// A tagged union consumed exhaustively by the bridge's dispatcher
/// loop; unknown methods fail deserialization at the boundary instead
/// of leaking untyped objects inward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method", content = "params")]
pub enum SessionMessage {
    #[serde(rename = "wc_sessionPropose")]
    Propose(SessionPropose),
    #[serde(rename = "wc_sessionSettle")]
    Settle(SessionSettle),
    #[serde(rename = "wc_sessionReject")]
    Reject(DeleteReason),
    #[serde(rename = "wc_sessionDelete")]
    Delete(DeleteReason),
    #[serde(rename = "wc_sessionRequest")]
    Request(SessionRequest),
    #[serde(rename = "wc_sessionResponse")]
    Response(SessionResponse),
    #[serde(rename = "wc_pairingDelete")]
    PairingDelete(DeleteReason),
}

impl SessionMessage {
    /// Numeric tag published with the message (method registry).
    pub fn tag(&self) -> u32 {
        match self {
            SessionMessage::Propose(_) => 1100,
            SessionMessage::Settle(_) => 1102,
            SessionMessage::Reject(_) => 1120,
            SessionMessage::Delete(_) => 1112,
            SessionMessage::Request(_) => 1108,
            SessionMessage::Response(_) => 1109,
            SessionMessage::PairingDelete(_) => 1000,
        }
    }

    /// Relay publish TTL in seconds.
    pub fn ttl(&self) -> u64 {
        match self {
            SessionMessage::Propose(_) => 300,
            SessionMessage::Settle(_) => 300,
            SessionMessage::Reject(_) | SessionMessage::Delete(_) => 86400,
            SessionMessage::Request(_) | SessionMessage::Response(_) => 300,
            SessionMessage::PairingDelete(_) => 86400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_serde_round_trip() {
        let msg = SessionMessage::Settle(SessionSettle {
            session_topic: "abc".to_string(),
            accounts: vec!["eip155:56:0x0000000000000000000000000000000000000000".to_string()],
            expiry: 1_900_000_000,
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("wc_sessionSettle"));
        let decoded: SessionMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_unknown_method_rejected() {
        let raw = json!({ "method": "wc_sessionPing", "params": {} });
        assert!(serde_json::from_value::<SessionMessage>(raw).is_err());
    }

    #[test]
    fn test_response_with_error_only() {
        let raw = json!({
            "method": "wc_sessionResponse",
            "params": { "id": 7, "error": { "code": 4001, "message": "rejected" } }
        });
        let msg: SessionMessage = serde_json::from_value(raw).unwrap();
        match msg {
            SessionMessage::Response(resp) => {
                assert_eq!(resp.id, 7);
                assert!(resp.result.is_none());
                assert_eq!(resp.error.unwrap().code, CODE_USER_REJECTED);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_tags_and_ttls() {
        let req = SessionMessage::Request(SessionRequest {
            id: 1,
            method: "personal_sign".to_string(),
            params: json!([]),
            chain_id: "eip155:56".to_string(),
        });
        assert_eq!(req.tag(), 1108);
        assert_eq!(req.ttl(), 300);

        let delete = SessionMessage::Delete(DeleteReason::user_disconnected());
        assert_eq!(delete.ttl(), 86400);
    }
}
