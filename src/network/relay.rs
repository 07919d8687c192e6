// WebSocket relay transport
// Each channel owns a background thread running a small tokio runtime that
// talks to the signaling server. The frame loop talks to it through channels:
// commands go in over an unbounded tokio mpsc, events come back over std mpsc
// and are drained with try_recv, so no match state ever crosses threads.

use anyhow::{anyhow, Context, Result};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use std::thread;
use tokio::sync::mpsc as tokio_mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::transport::{Channel, ChannelEvent, Transport};
use crate::error::TransportError;

/// Control messages exchanged with the signaling server as JSON text frames.
/// Game data travels as binary frames between paired peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalingMessage {
    /// Register a rendezvous identifier with the server
    Register { peer_id: String },

    /// Server response to registration
    RegisterOk { peer_id: String },

    /// Ask to be paired with a registered, unpaired peer
    Connect { target: String },

    /// Sent to both ends once paired; binary frames now flow
    Paired { peer_id: String },

    /// The paired partner went away
    PeerLeft { peer_id: String },

    /// Error response
    Error { message: String },
}

impl SignalingMessage {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Transport backed by the relay/signaling server at `server_url`
#[derive(Debug, Clone)]
pub struct RelayTransport {
    server_url: String,
}

impl RelayTransport {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
        }
    }
}

impl Transport for RelayTransport {
    type Channel = RelayChannel;

    fn listen(&mut self, own_id: &str) -> Result<RelayChannel, TransportError> {
        spawn_relay_worker(self.server_url.clone(), own_id.to_string(), None)
    }

    fn connect(&mut self, own_id: &str, remote_id: &str) -> Result<RelayChannel, TransportError> {
        spawn_relay_worker(
            self.server_url.clone(),
            own_id.to_string(),
            Some(remote_id.to_string()),
        )
    }
}

/// Commands the frame loop sends to the relay worker
#[derive(Debug)]
enum RelayCommand {
    Send(Vec<u8>),
    Close,
}

pub struct RelayChannel {
    cmd_tx: tokio_mpsc::UnboundedSender<RelayCommand>,
    event_rx: mpsc::Receiver<ChannelEvent>,
    closed: bool,
}

impl Channel for RelayChannel {
    fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::NotOpen);
        }
        self.cmd_tx
            .send(RelayCommand::Send(frame))
            .map_err(|_| TransportError::WorkerGone)
    }

    fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.event_rx.try_recv().ok()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.cmd_tx.send(RelayCommand::Close);
        }
    }
}

impl Drop for RelayChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Spawn the background worker for one channel
fn spawn_relay_worker(
    server_url: String,
    own_id: String,
    remote_id: Option<String>,
) -> Result<RelayChannel, TransportError> {
    let (cmd_tx, cmd_rx) = tokio_mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::channel();

    thread::Builder::new()
        .name(format!("relay-{}", own_id))
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = event_tx.send(ChannelEvent::Error(format!(
                        "failed to create tokio runtime: {}",
                        e
                    )));
                    return;
                }
            };

            rt.block_on(async {
                if let Err(e) =
                    run_relay(&server_url, &own_id, remote_id.as_deref(), cmd_rx, &event_tx).await
                {
                    warn!("Relay channel {} failed: {:#}", own_id, e);
                    let _ = event_tx.send(ChannelEvent::Error(format!("{:#}", e)));
                }
            });
            debug!("Relay worker for {} exiting", own_id);
        })?;

    Ok(RelayChannel {
        cmd_tx,
        event_rx,
        closed: false,
    })
}

/// Worker loop: register, optionally dial, then pump frames both ways
async fn run_relay(
    server_url: &str,
    own_id: &str,
    remote_id: Option<&str>,
    mut cmd_rx: tokio_mpsc::UnboundedReceiver<RelayCommand>,
    event_tx: &mpsc::Sender<ChannelEvent>,
) -> Result<()> {
    let (ws_stream, _) = connect_async(server_url)
        .await
        .with_context(|| format!("connecting to signaling server {}", server_url))?;
    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    let register = SignalingMessage::Register {
        peer_id: own_id.to_string(),
    };
    ws_sink.send(Message::Text(register.to_text()?)).await?;

    let mut paired = false;

    loop {
        tokio::select! {
            incoming = ws_stream.next() => {
                let msg = match incoming {
                    Some(msg) => msg.context("reading from signaling server")?,
                    None => {
                        let _ = event_tx.send(ChannelEvent::Close);
                        return Ok(());
                    }
                };

                match msg {
                    Message::Text(text) => match serde_json::from_str::<SignalingMessage>(&text) {
                        Ok(SignalingMessage::RegisterOk { peer_id }) => {
                            debug!("Registered as {}", peer_id);
                            if let Some(target) = remote_id {
                                let connect = SignalingMessage::Connect {
                                    target: target.to_string(),
                                };
                                ws_sink.send(Message::Text(connect.to_text()?)).await?;
                            }
                        }
                        Ok(SignalingMessage::Paired { peer_id }) => {
                            info!("Paired with {}", peer_id);
                            paired = true;
                            let _ = event_tx.send(ChannelEvent::Open);
                        }
                        Ok(SignalingMessage::PeerLeft { peer_id }) => {
                            info!("Peer {} left", peer_id);
                            let _ = event_tx.send(ChannelEvent::Close);
                            return Ok(());
                        }
                        Ok(SignalingMessage::Error { message }) => {
                            return Err(anyhow!("signaling server: {}", message));
                        }
                        Ok(other) => debug!("Ignoring signaling message {:?}", other),
                        Err(e) => warn!("Failed to parse signaling message: {}", e),
                    },
                    Message::Binary(data) => {
                        if paired {
                            let _ = event_tx.send(ChannelEvent::Message(data));
                        }
                    }
                    Message::Close(_) => {
                        let _ = event_tx.send(ChannelEvent::Close);
                        return Ok(());
                    }
                    _ => {}
                }
            }
            cmd = cmd_rx.recv() => match cmd {
                Some(RelayCommand::Send(frame)) => {
                    ws_sink.send(Message::Binary(frame)).await?;
                }
                Some(RelayCommand::Close) | None => {
                    // Local close: nobody is listening for our own Close event
                    let _ = ws_sink.send(Message::Close(None)).await;
                    return Ok(());
                }
            }
        }
    }
}
