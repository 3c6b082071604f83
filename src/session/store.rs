//! The session store: current wallet binding plus change notification.

use alloy::primitives::Address;
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tokio::sync::broadcast;

/// How the session's signer is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPeer {
    /// A locally available signer (key material in this process).
    Injected,
    /// A remote wallet reached over the relay, keyed by session topic.
    Relay { topic: String },
}

/// An approved, active binding to a wallet account on a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The account the wallet approved.
    pub address: Address,
    /// Chain the session is bound to.
    pub chain_id: u64,
    /// Which connection path produced this session.
    pub peer: SessionPeer,
    /// Unix expiry, if the wallet granted a bounded session.
    pub expires_at: Option<u64>,
}

impl Session {
    /// True for relay sessions; injected sessions have no remote peer.
    pub fn is_relay(&self) -> bool {
        matches!(self.peer, SessionPeer::Relay { .. })
    }

    /// The relay session topic, if any.
    pub fn topic(&self) -> Option<&str> {
        match &self.peer {
            SessionPeer::Relay { topic } => Some(topic),
            SessionPeer::Injected => None,
        }
    }
}

/// Session lifecycle events, broadcast to all subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A pairing was created and awaits remote approval; render the URI.
    PairingReady { uri: String, expires_at: u64 },
    /// A session was established.
    Connected(Session),
    /// The session ended (local disconnect or wallet-initiated delete).
    Disconnected { reason: String },
    /// The session's expiry passed without renewal.
    Expired,
}

/// Process-wide cell holding the active session.
///
/// Only the wallet subsystem mutates the cell (`set`/`clear` are
/// crate-private); everything else reads it or subscribes to changes.
pub struct SessionStore {
    current: ArcSwapOption<Session>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            current: ArcSwapOption::empty(),
            events,
        }
    }

    /// The active session, if any.
    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.load_full()
    }

    /// Whether a session is active.
    pub fn is_connected(&self) -> bool {
        self.current.load().is_some()
    }

    /// The active session's account, if connected.
    pub fn address(&self) -> Option<Address> {
        self.current.load().as_ref().map(|s| s.address)
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Install a new session and announce it.
    pub(crate) fn set(&self, session: Session) {
        tracing::info!(
            address = %session.address,
            chain_id = session.chain_id,
            relay = session.is_relay(),
            "Session established"
        );
        self.current.store(Some(Arc::new(session.clone())));
        let _ = self.events.send(SessionEvent::Connected(session));
    }

    /// Clear the session, announcing the given reason.
    ///
    /// Idempotent: clearing an empty store emits nothing.
    pub(crate) fn clear(&self, reason: &str) {
        let previous = self.current.swap(None);
        if previous.is_some() {
            tracing::info!(reason = reason, "Session cleared");
            let _ = self.events.send(SessionEvent::Disconnected {
                reason: reason.to_string(),
            });
        }
    }

    /// Clear the session because its expiry passed.
    pub(crate) fn expire(&self) {
        let previous = self.current.swap(None);
        if previous.is_some() {
            tracing::info!("Session expired");
            let _ = self.events.send(SessionEvent::Expired);
        }
    }

    /// Announce an event without touching the cell (pairing progress).
    pub(crate) fn announce(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("connected", &self.is_connected())
            .field("address", &self.address())
            .finish()
    }
}
