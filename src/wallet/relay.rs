//! Relay transport for remote wallet pairing.
//!
//! The bridge never touches the socket directly: it sends typed
//! `RelayCommand`s and receives `RelayEnvelope`s over channels. In
//! production the channels are pumped by a WebSocket task; tests wire
//! up the same channels to an in-memory peer instead.

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::lifecycle::Shutdown;
use crate::wallet::protocol::SessionMessage;
use crate::wallet::types::{WalletError, WalletResult};

/// A protocol message bound to the topic it travels on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEnvelope {
    pub topic: String,
    pub message: SessionMessage,
}

/// Commands the bridge issues against the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayCommand {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Publish(RelayEnvelope),
}

/// Sender half of the relay: issue commands from anywhere.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    commands: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    /// Subscribe to a topic so the wallet's messages reach us.
    pub async fn subscribe(&self, topic: &str) -> WalletResult<()> {
        self.send(RelayCommand::Subscribe {
            topic: topic.to_string(),
        })
        .await
    }

    /// Drop a topic subscription.
    pub async fn unsubscribe(&self, topic: &str) -> WalletResult<()> {
        self.send(RelayCommand::Unsubscribe {
            topic: topic.to_string(),
        })
        .await
    }

    /// Publish a message on a topic.
    pub async fn publish(&self, topic: &str, message: SessionMessage) -> WalletResult<()> {
        self.send(RelayCommand::Publish(RelayEnvelope {
            topic: topic.to_string(),
            message,
        }))
        .await
    }

    async fn send(&self, command: RelayCommand) -> WalletResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| WalletError::Transport("relay connection closed".to_string()))
    }
}

/// An established relay connection: a command sender plus the inbound
/// message stream. Split by the bridge into its two halves.
#[derive(Debug)]
pub struct RelayConnection {
    handle: RelayHandle,
    inbound: mpsc::Receiver<RelayEnvelope>,
}

impl RelayConnection {
    /// Open a WebSocket relay connection and spawn its pump task.
    ///
    /// The pump terminates on socket close or shutdown signal; either
    /// way the channels close and stranded calls surface as transport
    /// errors.
    pub async fn connect(
        relay_url: &str,
        project_id: &str,
        shutdown: &Shutdown,
    ) -> WalletResult<Self> {
        let mut endpoint = url::Url::parse(relay_url)
            .map_err(|e| WalletError::Transport(format!("invalid relay URL: {}", e)))?;
        endpoint
            .query_pairs_mut()
            .append_pair("projectId", project_id);

        let (socket, _) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| WalletError::Transport(format!("relay connect failed: {}", e)))?;
        tracing::info!(relay = %relay_url, "Relay connected");

        let (command_tx, mut command_rx) = mpsc::channel::<RelayCommand>(32);
        let (inbound_tx, inbound_rx) = mpsc::channel::<RelayEnvelope>(32);
        let mut shutdown_rx = shutdown.subscribe();

        tokio::spawn(async move {
            let (mut sink, mut stream) = socket.split();
            loop {
                tokio::select! {
                    command = command_rx.recv() => {
                        let Some(command) = command else { break };
                        let frame = wire_frame(&command);
                        if let Err(e) = sink.send(Message::Text(frame.into())).await {
                            tracing::warn!(error = %e, "Relay send failed");
                            break;
                        }
                    }
                    frame = stream.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                match parse_subscription(&text) {
                                    Ok(Some(envelope)) => {
                                        if inbound_tx.send(envelope).await.is_err() {
                                            break;
                                        }
                                    }
                                    // Acks and other relay chatter.
                                    Ok(None) => {}
                                    Err(e) => {
                                        tracing::warn!(error = %e, "Ignoring malformed relay frame");
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                            Some(Ok(Message::Close(_))) | None => {
                                tracing::info!("Relay closed the connection");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::warn!(error = %e, "Relay socket error");
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            tracing::debug!("Relay pump terminated");
        });

        Ok(Self {
            handle: RelayHandle {
                commands: command_tx,
            },
            inbound: inbound_rx,
        })
    }

    /// Build a connection backed by in-memory channels, returning the
    /// peer end. Used by tests and local tooling in place of a socket.
    pub fn in_memory() -> (Self, RelayPeer) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (inbound_tx, inbound_rx) = mpsc::channel(32);
        (
            Self {
                handle: RelayHandle {
                    commands: command_tx,
                },
                inbound: inbound_rx,
            },
            RelayPeer {
                commands: command_rx,
                inbound: inbound_tx,
            },
        )
    }

    /// Split into the command handle and the inbound stream.
    pub fn split(self) -> (RelayHandle, mpsc::Receiver<RelayEnvelope>) {
        (self.handle, self.inbound)
    }
}

/// The far end of an in-memory relay: sees the bridge's commands and
/// injects wallet messages.
#[derive(Debug)]
pub struct RelayPeer {
    /// Commands the bridge issued (subscribes, publishes).
    pub commands: mpsc::Receiver<RelayCommand>,
    /// Sender for messages "from the wallet".
    pub inbound: mpsc::Sender<RelayEnvelope>,
}

#[derive(Serialize)]
struct WireRequest<'a, T> {
    id: u64,
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
}

#[derive(Serialize)]
struct TopicParams<'a> {
    topic: &'a str,
}

#[derive(Serialize)]
struct PublishParams<'a> {
    topic: &'a str,
    message: String,
    tag: u32,
    ttl: u64,
    prompt: bool,
}

/// Render a command as a relay JSON-RPC frame.
fn wire_frame(command: &RelayCommand) -> String {
    let id = fastrand::u64(1..u64::MAX);
    let frame = match command {
        RelayCommand::Subscribe { topic } => serde_json::to_string(&WireRequest {
            id,
            jsonrpc: "2.0",
            method: "irn_subscribe",
            params: TopicParams { topic },
        }),
        RelayCommand::Unsubscribe { topic } => serde_json::to_string(&WireRequest {
            id,
            jsonrpc: "2.0",
            method: "irn_unsubscribe",
            params: TopicParams { topic },
        }),
        RelayCommand::Publish(envelope) => {
            let message =
                serde_json::to_string(&envelope.message).unwrap_or_else(|_| "{}".to_string());
            serde_json::to_string(&WireRequest {
                id,
                jsonrpc: "2.0",
                method: "irn_publish",
                params: PublishParams {
                    topic: &envelope.topic,
                    tag: envelope.message.tag(),
                    ttl: envelope.message.ttl(),
                    message,
                    prompt: true,
                },
            })
        }
    };
    // The wire structs serialize infallibly; the fallback never fires
    // for well-formed commands.
    frame.unwrap_or_else(|_| "{}".to_string())
}

#[derive(Deserialize)]
struct WireInbound {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<SubscriptionParams>,
}

#[derive(Deserialize)]
struct SubscriptionParams {
    data: SubscriptionData,
}

#[derive(Deserialize)]
struct SubscriptionData {
    topic: String,
    message: String,
}

/// Parse an inbound relay frame; `Ok(None)` for acks and chatter.
fn parse_subscription(text: &str) -> Result<Option<RelayEnvelope>, String> {
    let frame: WireInbound = serde_json::from_str(text).map_err(|e| e.to_string())?;

    if frame.method.as_deref() != Some("irn_subscription") {
        return Ok(None);
    }
    let params = frame.params.ok_or("irn_subscription without params")?;
    let message: SessionMessage =
        serde_json::from_str(&params.data.message).map_err(|e| e.to_string())?;

    Ok(Some(RelayEnvelope {
        topic: params.data.topic,
        message,
    }))
}
