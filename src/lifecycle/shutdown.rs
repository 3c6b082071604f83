//! Shutdown coordination for bridge- and relay-owned tasks.

use tokio::sync::broadcast;

/// Broadcast-based shutdown signal.
///
/// The application root owns one of these and hands clones to the
/// relay pump and the session dispatcher. Triggering it tells every
/// subscriber to exit its loop; it carries no payload and cannot be
/// un-triggered.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe before spawning; a receiver created after `trigger`
    /// never sees the signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal all subscribed tasks to stop.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
