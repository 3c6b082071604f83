//! Shared test harness: a programmable mock JSON-RPC node and an
//! in-memory remote wallet speaking the session protocol.
#![allow(dead_code)]

use alloy::primitives::TxHash;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use presale_client::wallet::protocol::{
    DeleteReason, RpcError, SessionMessage, SessionResponse, SessionSettle, CODE_USER_REJECTED,
};
use presale_client::wallet::relay::{RelayCommand, RelayEnvelope, RelayPeer};

/// Anvil's first well-known account.
pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
pub const TEST_CONTRACT: &str = "0x42395Db998595DC7256aF2a6f10DC7b2E6006993";
pub const TEST_CHAIN_ID: u64 = 31337;

/// A programmable mock JSON-RPC node over HTTP.
///
/// One-shot stubs (if queued) are consumed before the fixed stub for
/// the same method.
#[derive(Clone)]
pub struct MockRpcNode {
    pub url: String,
    fixed: Arc<DashMap<String, Value>>,
    queued: Arc<DashMap<String, VecDeque<Value>>>,
}

impl MockRpcNode {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let node = Self {
            url: format!("http://{}", addr),
            fixed: Arc::new(DashMap::new()),
            queued: Arc::new(DashMap::new()),
        };

        let fixed = Arc::clone(&node.fixed);
        let queued = Arc::clone(&node.queued);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let fixed = Arc::clone(&fixed);
                let queued = Arc::clone(&queued);
                tokio::spawn(async move {
                    // Keep-alive: serve requests until the client closes.
                    loop {
                        let Some(body) = read_http_body(&mut socket).await else {
                            break;
                        };
                        let payload = respond(&body, &fixed, &queued).to_string();
                        let head = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
                            payload.len()
                        );
                        if socket.write_all(head.as_bytes()).await.is_err() {
                            break;
                        }
                        if socket.write_all(payload.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        node
    }

    /// Serve `result` for every call of `method`.
    pub fn stub(&self, method: &str, result: Value) {
        self.fixed.insert(method.to_string(), result);
    }

    /// Serve `result` for exactly one call of `method`.
    pub fn stub_once(&self, method: &str, result: Value) {
        self.queued
            .entry(method.to_string())
            .or_default()
            .push_back(result);
    }

    /// Install the baseline stubs a submission flow needs.
    pub fn stub_chain_basics(&self) {
        self.stub("eth_chainId", json!(format!("0x{:x}", TEST_CHAIN_ID)));
        self.stub("eth_blockNumber", json!("0x10"));
        self.stub("eth_getTransactionCount", json!("0x0"));
        self.stub("eth_gasPrice", json!("0x3b9aca00")); // 1 gwei
        self.stub("eth_estimateGas", json!("0x13880"));
    }
}

async fn read_http_body(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length: usize = headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse().ok())?;

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some(String::from_utf8_lossy(&buf[header_end..header_end + content_length]).to_string())
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn respond(
    body: &str,
    fixed: &DashMap<String, Value>,
    queued: &DashMap<String, VecDeque<Value>>,
) -> Value {
    let request: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            return json!({
                "jsonrpc": "2.0", "id": null,
                "error": {"code": -32700, "message": "parse error"}
            })
        }
    };
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request
        .get("method")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();

    let result = queued
        .get_mut(&method)
        .and_then(|mut q| q.pop_front())
        .or_else(|| fixed.get(&method).map(|r| r.clone()));

    match result {
        Some(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        None => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": format!("no stub for {}", method)}
        }),
    }
}

/// A full receipt as the node would serialize it.
pub fn receipt_json(hash: TxHash, block_number: u64, success: bool) -> Value {
    json!({
        "transactionHash": hash,
        "transactionIndex": "0x0",
        "blockHash": "0x00000000000000000000000000000000000000000000000000000000000000aa",
        "blockNumber": format!("0x{:x}", block_number),
        "from": TEST_ADDRESS,
        "to": TEST_CONTRACT,
        "cumulativeGasUsed": "0x5208",
        "gasUsed": "0x5208",
        "contractAddress": null,
        "logs": [],
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "status": if success { "0x1" } else { "0x0" },
        "effectiveGasPrice": "0x3b9aca00",
        "type": "0x0"
    })
}

/// How the mock wallet answers an `eth_sendTransaction` request.
#[derive(Debug, Clone, Copy)]
pub enum TxAnswer {
    Hash(TxHash),
    Reject,
}

/// Scripted remote wallet driven against the peer end of an in-memory
/// relay connection.
pub struct MockWallet {
    pub signer: PrivateKeySigner,
    pub chain_id: u64,
    /// Approve the session proposal, or reject it as the user would.
    pub approve: bool,
    pub tx_answer: TxAnswer,
}

impl MockWallet {
    pub fn approving() -> Self {
        Self {
            signer: TEST_PRIVATE_KEY.parse().unwrap(),
            chain_id: TEST_CHAIN_ID,
            approve: true,
            tx_answer: TxAnswer::Hash(TxHash::repeat_byte(0x11)),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            approve: false,
            ..Self::approving()
        }
    }

    /// Run the wallet. Every command the bridge issues is mirrored to
    /// the returned channel for assertions.
    pub fn spawn(
        self,
        mut peer: RelayPeer,
    ) -> (mpsc::UnboundedReceiver<RelayCommand>, JoinHandle<()>) {
        let (log_tx, log_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            let mut session_topic: Option<String> = None;
            while let Some(command) = peer.commands.recv().await {
                let _ = log_tx.send(command.clone());
                let RelayCommand::Publish(envelope) = command else {
                    continue;
                };
                match envelope.message {
                    SessionMessage::Propose(_) => {
                        let reply = if self.approve {
                            let topic = format!("session-{}", fastrand::u64(..));
                            session_topic = Some(topic.clone());
                            SessionMessage::Settle(SessionSettle {
                                session_topic: topic,
                                accounts: vec![format!(
                                    "eip155:{}:{}",
                                    self.chain_id,
                                    self.signer.address()
                                )],
                                expiry: unix_now() + 3600,
                            })
                        } else {
                            SessionMessage::Reject(DeleteReason {
                                code: CODE_USER_REJECTED,
                                message: "user rejected".to_string(),
                            })
                        };
                        let _ = peer
                            .inbound
                            .send(RelayEnvelope {
                                topic: envelope.topic,
                                message: reply,
                            })
                            .await;
                    }
                    SessionMessage::Request(request) => {
                        let topic = session_topic.clone().unwrap_or(envelope.topic);
                        let response = match request.method.as_str() {
                            "personal_sign" => {
                                self.answer_personal_sign(request.id, &request.params).await
                            }
                            "eth_sendTransaction" => match self.tx_answer {
                                TxAnswer::Hash(hash) => SessionResponse {
                                    id: request.id,
                                    result: Some(json!(hash)),
                                    error: None,
                                },
                                TxAnswer::Reject => SessionResponse {
                                    id: request.id,
                                    result: None,
                                    error: Some(RpcError {
                                        code: CODE_USER_REJECTED,
                                        message: "user rejected transaction".to_string(),
                                    }),
                                },
                            },
                            other => SessionResponse {
                                id: request.id,
                                result: None,
                                error: Some(RpcError {
                                    code: -32601,
                                    message: format!("unsupported method {}", other),
                                }),
                            },
                        };
                        let _ = peer
                            .inbound
                            .send(RelayEnvelope {
                                topic,
                                message: SessionMessage::Response(response),
                            })
                            .await;
                    }
                    _ => {}
                }
            }
        });
        (log_rx, handle)
    }

    async fn answer_personal_sign(&self, id: u64, params: &Value) -> SessionResponse {
        let hex_message = params.get(0).and_then(|v| v.as_str()).unwrap_or_default();
        let message = alloy::hex::decode(hex_message).unwrap_or_default();
        let signature = self.signer.sign_message(&message).await.unwrap();
        SessionResponse {
            id,
            result: Some(json!(format!(
                "0x{}",
                alloy::hex::encode(signature.as_bytes())
            ))),
            error: None,
        }
    }
}

/// A config pointed at the given mock node, with timeouts tightened
/// for tests.
pub fn test_config(rpc_url: &str) -> presale_client::config::AppConfig {
    let mut config = presale_client::config::AppConfig::default();
    config.app.project_id = "test-project".to_string();
    config.chain.rpc_url = rpc_url.to_string();
    config.chain.chain_id = TEST_CHAIN_ID;
    config.chain.rpc_timeout_secs = 5;
    config.contract.address = TEST_CONTRACT.to_string();
    config.contract.receipt_timeout_secs = 10;
    config.wallet.pairing_timeout_secs = 5;
    config.wallet.request_timeout_secs = 5;
    config
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
