//! The wallet bridge: connect, disconnect, and session-bound requests.
//!
//! # Responsibilities
//! - Select the connection path (injected signer vs. relay pairing)
//! - Tear down stale pairings and sessions before creating new ones
//! - Verify account ownership after approval
//! - Own the dispatcher task that routes wallet-initiated events
//!
//! # Design Decisions
//! - Explicitly constructed and passed by reference; no global client
//!   singleton, no module-level re-init guard flags
//! - The bridge is the only writer of the session store
//! - Remote wallet traffic is consumed by one dispatcher loop over a
//!   tagged message enum, never by ad-hoc event callbacks

use alloy::primitives::Address;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::AppConfig;
use crate::config::WalletMode;
use crate::contract::client::ChainClient;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::session::{Session, SessionEvent, SessionPeer, SessionStore};
use crate::wallet::injected::{InjectedSigner, WALLET_KEY_ENV_VAR};
use crate::wallet::pairing::{unix_now, Pairing};
use crate::wallet::protocol::{
    AppMetadata, DeleteReason, SessionMessage, SessionPropose, SessionRequest, SessionResponse,
    SessionSettle, CODE_UNSUPPORTED_CHAIN, CODE_USER_REJECTED,
};
use crate::wallet::relay::{RelayConnection, RelayEnvelope, RelayHandle};
use crate::wallet::types::{parse_caip10_account, WalletError, WalletResult};

/// Mutable connection state, guarded by one lock.
#[derive(Default)]
struct BridgeState {
    /// Command half of the relay connection, once opened.
    relay: Option<RelayHandle>,
    /// Inbound stream, shared between the connect phase and the
    /// dispatcher so aborting the dispatcher returns it to the bridge.
    inbound: Option<Arc<Mutex<mpsc::Receiver<RelayEnvelope>>>>,
    /// The outstanding pairing, if a connect attempt is mid-flight.
    pairing: Option<Pairing>,
    /// The injected signer backing an injected session.
    injected: Option<InjectedSigner>,
    /// A pre-built relay connection (dependency injection for tests).
    preset_relay: Option<RelayConnection>,
    /// Dispatcher task for the settled relay session.
    dispatcher: Option<JoinHandle<()>>,
}

/// Abstracts the two wallet connection paths into one session shape.
pub struct WalletBridge {
    config: Arc<AppConfig>,
    store: Arc<SessionStore>,
    chain: Arc<ChainClient>,
    state: Mutex<BridgeState>,
    /// Waiters for in-flight session requests, keyed by request id.
    pending: Arc<DashMap<u64, oneshot::Sender<SessionResponse>>>,
    shutdown: Shutdown,
}

impl WalletBridge {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<SessionStore>,
        chain: Arc<ChainClient>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            config,
            store,
            chain,
            state: Mutex::new(BridgeState::default()),
            pending: Arc::new(DashMap::new()),
            shutdown,
        }
    }

    /// Inject a pre-built relay connection instead of dialing the
    /// configured relay URL. Used by tests and local tooling.
    pub async fn set_relay_connection(&self, connection: RelayConnection) {
        self.state.lock().await.preset_relay = Some(connection);
    }

    /// Inject a signer instead of reading the key environment variable.
    pub async fn set_injected_signer(&self, signer: InjectedSigner) {
        self.state.lock().await.injected = Some(signer);
    }

    /// The session store this bridge writes.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Establish a wallet session.
    ///
    /// Any previous pairing or session is torn down first, so at most
    /// one pairing is ever active. Failure leaves the bridge fully
    /// disconnected; every error is recoverable by calling again.
    pub async fn connect(&self) -> WalletResult<Session> {
        let mut state = self.state.lock().await;
        self.teardown_stale(&mut state).await;

        // Relay-forced mode never consults the key environment variable.
        let path = match self.config.wallet.mode {
            WalletMode::Relay => None,
            mode => {
                let injected = match state.injected.clone() {
                    Some(signer) => Some(signer),
                    None => InjectedSigner::detect(self.config.chain.chain_id)?,
                };
                if injected.is_none() && mode == WalletMode::Injected {
                    return Err(WalletError::NoWallet(WALLET_KEY_ENV_VAR));
                }
                injected
            }
        };

        let result = match path {
            Some(signer) => {
                metrics::record_connect_attempt("injected");
                let result = self.connect_injected(&mut state, signer).await;
                metrics::record_connect_outcome("injected", result.is_ok());
                result
            }
            None => {
                metrics::record_connect_attempt("relay");
                let result = self.connect_relay(&mut state).await;
                metrics::record_connect_outcome("relay", result.is_ok());
                result
            }
        };

        if result.is_err() {
            // Leave nothing half-connected behind a failed attempt.
            self.teardown_stale(&mut state).await;
        }
        result
    }

    /// End the current session and pairing, if any.
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        self.teardown_stale(&mut state).await;
    }

    /// Send a JSON-RPC request to the session's remote wallet and wait
    /// for its answer.
    ///
    /// Only valid for relay sessions; injected sessions sign locally.
    pub async fn request(&self, method: &str, params: Value) -> WalletResult<Value> {
        let session = self
            .store
            .current()
            .ok_or_else(|| WalletError::Unsupported("no active session".to_string()))?;
        let topic = session
            .topic()
            .ok_or_else(|| {
                WalletError::Unsupported("session has no remote peer".to_string())
            })?
            .to_string();

        let handle = {
            let state = self.state.lock().await;
            state
                .relay
                .clone()
                .ok_or_else(|| WalletError::Transport("relay not connected".to_string()))?
        };

        let id = fastrand::u64(1..u64::MAX);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let request = SessionMessage::Request(SessionRequest {
            id,
            method: method.to_string(),
            params,
            chain_id: self.caip2_chain(),
        });
        if let Err(e) = handle.publish(&topic, request).await {
            self.pending.remove(&id);
            return Err(e);
        }

        let wait = Duration::from_secs(self.config.wallet.request_timeout_secs);
        match timeout(wait, rx).await {
            Ok(Ok(response)) => map_response(response),
            Ok(Err(_)) => Err(WalletError::Transport(
                "session ended while waiting for the wallet".to_string(),
            )),
            Err(_) => {
                self.pending.remove(&id);
                Err(WalletError::RequestTimeout(
                    self.config.wallet.request_timeout_secs,
                ))
            }
        }
    }

    /// The injected signer backing the current session, if any.
    pub async fn injected_signer(&self) -> Option<InjectedSigner> {
        self.state.lock().await.injected.clone()
    }

    fn caip2_chain(&self) -> String {
        format!("eip155:{}", self.config.chain.chain_id)
    }

    async fn connect_injected(
        &self,
        state: &mut BridgeState,
        signer: InjectedSigner,
    ) -> WalletResult<Session> {
        // The signer trusts its configured chain; the RPC node must agree.
        let node_chain = self
            .chain
            .get_chain_id()
            .await
            .map_err(|e| WalletError::Transport(e.to_string()))?;
        if node_chain != self.config.chain.chain_id {
            return Err(WalletError::UnsupportedChain {
                expected: self.config.chain.chain_id,
                actual: node_chain,
            });
        }

        signer
            .verify_ownership(&self.config.wallet.verify_message)
            .await?;

        let session = Session {
            address: signer.address(),
            chain_id: signer.chain_id(),
            peer: SessionPeer::Injected,
            expires_at: None,
        };
        state.injected = Some(signer);
        self.store.set(session.clone());
        Ok(session)
    }

    async fn connect_relay(&self, state: &mut BridgeState) -> WalletResult<Session> {
        // Reuse a live relay connection; dial otherwise.
        if state.relay.is_none() {
            let connection = match state.preset_relay.take() {
                Some(connection) => connection,
                None => {
                    RelayConnection::connect(
                        &self.config.wallet.relay_url,
                        &self.config.app.project_id,
                        &self.shutdown,
                    )
                    .await?
                }
            };
            let (handle, inbound) = connection.split();
            state.relay = Some(handle);
            state.inbound = Some(Arc::new(Mutex::new(inbound)));
        }
        let handle = state.relay.clone().ok_or_else(|| {
            WalletError::Transport("relay not connected".to_string())
        })?;
        let inbound_cell = state.inbound.clone().ok_or_else(|| {
            WalletError::Transport("relay inbound stream missing".to_string())
        })?;
        // Free once the previous dispatcher (if any) has been aborted.
        let mut inbound = inbound_cell.lock().await;

        let pairing = Pairing::generate(self.config.wallet.pairing_timeout_secs);
        handle.subscribe(&pairing.topic).await?;
        self.store.announce(SessionEvent::PairingReady {
            uri: pairing.uri(),
            expires_at: pairing.expires_at,
        });
        tracing::info!(topic = %pairing.topic, "Pairing created, awaiting approval");

        let propose = SessionMessage::Propose(SessionPropose {
            metadata: AppMetadata {
                name: self.config.app.name.clone(),
                description: "Token presale purchase".to_string(),
                url: String::new(),
                icons: Vec::new(),
            },
            required_chain: self.caip2_chain(),
            methods: vec![
                "personal_sign".to_string(),
                "eth_sendTransaction".to_string(),
            ],
            project_id: self.config.app.project_id.clone(),
        });
        handle.publish(&pairing.topic, propose).await?;
        state.pairing = Some(pairing.clone());

        let settle = match self.await_settle(&handle, &mut inbound, &pairing).await {
            Ok(settle) => settle,
            Err(e) => {
                // On timeout the pairing was already deleted and
                // unsubscribed inside await_settle.
                if matches!(e, WalletError::PairingTimeout(_)) {
                    state.pairing = None;
                }
                return Err(e);
            }
        };

        // Pairing is consumed once the wallet settles.
        let _ = handle.unsubscribe(&pairing.topic).await;
        state.pairing = None;

        let session = self
            .settle_session(&handle, &mut inbound, settle)
            .await?;

        drop(inbound);
        self.spawn_dispatcher(state, Arc::clone(&inbound_cell), session.clone());
        Ok(session)
    }

    /// Wait for the wallet's answer to the proposal, bounded by the
    /// pairing window. Timeout tears the pairing down.
    async fn await_settle(
        &self,
        handle: &RelayHandle,
        inbound: &mut mpsc::Receiver<RelayEnvelope>,
        pairing: &Pairing,
    ) -> WalletResult<SessionSettle> {
        let window = Duration::from_secs(self.config.wallet.pairing_timeout_secs);
        let outcome = timeout(window, async {
            loop {
                let envelope = inbound.recv().await.ok_or_else(|| {
                    WalletError::Transport("relay connection closed".to_string())
                })?;
                if envelope.topic != pairing.topic {
                    continue;
                }
                match envelope.message {
                    SessionMessage::Settle(settle) => return Ok(settle),
                    SessionMessage::Reject(reason) => {
                        return Err(match reason.code {
                            CODE_USER_REJECTED => WalletError::UserRejected,
                            CODE_UNSUPPORTED_CHAIN => WalletError::Unsupported(reason.message),
                            _ => WalletError::Unsupported(reason.message),
                        });
                    }
                    SessionMessage::PairingDelete(_) => {
                        return Err(WalletError::UserRejected);
                    }
                    other => {
                        tracing::debug!(message = ?other, "Ignoring message during pairing");
                    }
                }
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                // No approval in the window: publish the delete so the
                // wallet side sees the pairing die, then unsubscribe.
                let _ = handle
                    .publish(
                        &pairing.topic,
                        SessionMessage::PairingDelete(DeleteReason::expired()),
                    )
                    .await;
                let _ = handle.unsubscribe(&pairing.topic).await;
                tracing::warn!(topic = %pairing.topic, "Pairing timed out");
                Err(WalletError::PairingTimeout(
                    self.config.wallet.pairing_timeout_secs,
                ))
            }
        }
    }

    /// Turn a settle payload into a verified session.
    async fn settle_session(
        &self,
        handle: &RelayHandle,
        inbound: &mut mpsc::Receiver<RelayEnvelope>,
        settle: SessionSettle,
    ) -> WalletResult<Session> {
        let expected_chain = self.config.chain.chain_id;
        let mut accounts = settle.accounts.iter().map(|a| parse_caip10_account(a));

        let first = accounts
            .next()
            .ok_or_else(|| WalletError::Unsupported("settle carried no accounts".to_string()))??;
        let (chain_id, address) = first;

        handle.subscribe(&settle.session_topic).await?;

        if chain_id != expected_chain {
            let _ = handle
                .publish(
                    &settle.session_topic,
                    SessionMessage::Delete(DeleteReason::user_disconnected()),
                )
                .await;
            let _ = handle.unsubscribe(&settle.session_topic).await;
            return Err(WalletError::UnsupportedChain {
                expected: expected_chain,
                actual: chain_id,
            });
        }

        if let Err(e) = self
            .verify_remote_account(handle, inbound, &settle.session_topic, address)
            .await
        {
            let _ = handle
                .publish(
                    &settle.session_topic,
                    SessionMessage::Delete(DeleteReason::user_disconnected()),
                )
                .await;
            let _ = handle.unsubscribe(&settle.session_topic).await;
            return Err(e);
        }

        let session = Session {
            address,
            chain_id,
            peer: SessionPeer::Relay {
                topic: settle.session_topic,
            },
            expires_at: Some(settle.expiry),
        };
        self.store.set(session.clone());
        Ok(session)
    }

    /// Ask the settled wallet for a `personal_sign` proof and recover
    /// the signer; it must match the settled account.
    async fn verify_remote_account(
        &self,
        handle: &RelayHandle,
        inbound: &mut mpsc::Receiver<RelayEnvelope>,
        topic: &str,
        expected: Address,
    ) -> WalletResult<()> {
        let message = &self.config.wallet.verify_message;
        let id = fastrand::u64(1..u64::MAX);
        let request = SessionMessage::Request(SessionRequest {
            id,
            method: "personal_sign".to_string(),
            params: json!([
                format!("0x{}", alloy::hex::encode(message.as_bytes())),
                expected.to_string(),
            ]),
            chain_id: self.caip2_chain(),
        });
        handle.publish(topic, request).await?;

        let wait = Duration::from_secs(self.config.wallet.request_timeout_secs);
        let response = timeout(wait, async {
            loop {
                let envelope = inbound.recv().await.ok_or_else(|| {
                    WalletError::Transport("relay connection closed".to_string())
                })?;
                if envelope.topic != topic {
                    continue;
                }
                match envelope.message {
                    SessionMessage::Response(response) if response.id == id => {
                        return Ok(response);
                    }
                    SessionMessage::Delete(_) => return Err(WalletError::UserRejected),
                    other => {
                        tracing::debug!(message = ?other, "Ignoring message during verification");
                    }
                }
            }
        })
        .await
        .map_err(|_| WalletError::RequestTimeout(self.config.wallet.request_timeout_secs))??;

        let signature = map_response(response)?;
        let signature = signature
            .as_str()
            .ok_or_else(|| WalletError::Verification("signature is not a string".to_string()))?;
        let raw = alloy::hex::decode(signature)
            .map_err(|e| WalletError::Verification(format!("signature hex: {}", e)))?;
        let signature = alloy::signers::Signature::from_raw(&raw)
            .map_err(|e| WalletError::Verification(format!("signature bytes: {}", e)))?;
        let recovered = signature
            .recover_address_from_msg(message.as_bytes())
            .map_err(|e| WalletError::Verification(format!("recovery failed: {}", e)))?;

        if recovered != expected {
            return Err(WalletError::Verification(format!(
                "recovered {} but wallet settled {}",
                recovered, expected
            )));
        }
        tracing::info!(address = %expected, "Account ownership verified");
        Ok(())
    }

    /// Spawn the dispatcher owning the inbound stream for the settled
    /// session: routes responses to waiters, handles wallet-initiated
    /// deletes and session expiry.
    fn spawn_dispatcher(
        &self,
        state: &mut BridgeState,
        inbound_cell: Arc<Mutex<mpsc::Receiver<RelayEnvelope>>>,
        session: Session,
    ) {
        let store = Arc::clone(&self.store);
        let pending = Arc::clone(&self.pending);
        let mut shutdown_rx = self.shutdown.subscribe();
        let topic = session.topic().unwrap_or_default().to_string();
        let expires_in = session
            .expires_at
            .map(|at| Duration::from_secs(at.saturating_sub(unix_now())))
            .unwrap_or(Duration::from_secs(self.config.wallet.session_ttl_secs));

        let task = tokio::spawn(async move {
            let mut inbound = inbound_cell.lock().await;
            let expiry = tokio::time::sleep(expires_in);
            tokio::pin!(expiry);
            loop {
                tokio::select! {
                    envelope = inbound.recv() => {
                        let Some(envelope) = envelope else {
                            store.clear("relay connection lost");
                            break;
                        };
                        if envelope.topic != topic {
                            continue;
                        }
                        match envelope.message {
                            SessionMessage::Response(response) => {
                                if let Some((_, waiter)) = pending.remove(&response.id) {
                                    let _ = waiter.send(response);
                                } else {
                                    tracing::debug!(id = response.id, "Response with no waiter");
                                }
                            }
                            SessionMessage::Delete(reason) => {
                                tracing::info!(reason = %reason.message, "Wallet ended the session");
                                store.clear(&reason.message);
                                break;
                            }
                            other => {
                                tracing::debug!(message = ?other, "Unhandled session message");
                            }
                        }
                    }
                    _ = &mut expiry => {
                        store.expire();
                        break;
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
            tracing::debug!("Session dispatcher terminated");
        });
        state.dispatcher = Some(task);
    }

    /// Tear down whatever is currently live: outstanding pairing,
    /// settled session, dispatcher task. Leaves the relay connection
    /// itself open for reuse.
    async fn teardown_stale(&self, state: &mut BridgeState) {
        if let Some(task) = state.dispatcher.take() {
            task.abort();
        }
        self.pending.clear();

        if let Some(pairing) = state.pairing.take() {
            if let Some(handle) = &state.relay {
                let _ = handle
                    .publish(
                        &pairing.topic,
                        SessionMessage::PairingDelete(DeleteReason::superseded()),
                    )
                    .await;
                let _ = handle.unsubscribe(&pairing.topic).await;
            }
            tracing::info!(topic = %pairing.topic, "Stale pairing torn down");
        }

        if let Some(session) = self.store.current() {
            if let (Some(topic), Some(handle)) = (session.topic(), &state.relay) {
                let _ = handle
                    .publish(
                        topic,
                        SessionMessage::Delete(DeleteReason::user_disconnected()),
                    )
                    .await;
                let _ = handle.unsubscribe(topic).await;
            }
        }
        self.store.clear("disconnected");
    }
}

/// Map a wallet response into a result value or the error taxonomy.
fn map_response(response: SessionResponse) -> WalletResult<Value> {
    if let Some(error) = response.error {
        return Err(match error.code {
            CODE_USER_REJECTED => WalletError::UserRejected,
            CODE_UNSUPPORTED_CHAIN => WalletError::Unsupported(error.message),
            _ => WalletError::Transport(format!("wallet error {}: {}", error.code, error.message)),
        });
    }
    response
        .result
        .ok_or_else(|| WalletError::Transport("response carried no result".to_string()))
}
