// Rendezvous + relay server
// Registers rendezvous identifiers, pairs a dialer with a registered listener
// exactly once, then forwards binary frames between the pair.

use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

use super::relay::SignalingMessage;

type PeerId = String;

struct PeerEntry {
    tx: mpsc::UnboundedSender<Message>,
    partner: Option<PeerId>,
}

type PeerTable = Arc<RwLock<HashMap<PeerId, PeerEntry>>>;

/// Bind `addr` and serve forever
pub async fn run(addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("🚀 Signaling server listening on {}", listener.local_addr()?);
    serve(listener).await
}

/// Accept connections on an already bound listener
pub async fn serve(listener: TcpListener) -> anyhow::Result<()> {
    let peers: PeerTable = Arc::new(RwLock::new(HashMap::new()));

    loop {
        let (stream, addr) = listener.accept().await?;
        tokio::spawn(handle_connection(stream, addr, peers.clone()));
    }
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, peers: PeerTable) {
    info!("📥 New connection from {}", addr);

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut peer_id: Option<PeerId> = None;

    // Spawn task to send messages to this peer
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Error receiving message from {}: {}", addr, e);
                break;
            }
        };

        match msg {
            Message::Text(text) => match serde_json::from_str::<SignalingMessage>(&text) {
                Ok(signal_msg) => {
                    handle_signaling_message(signal_msg, &mut peer_id, &tx, &peers).await;
                }
                Err(e) => {
                    warn!("Failed to parse message: {}", e);
                    reply(
                        &tx,
                        &SignalingMessage::Error {
                            message: format!("Invalid message format: {}", e),
                        },
                    );
                }
            },
            Message::Binary(data) => {
                if let Some(ref id) = peer_id {
                    forward_frame(&peers, id, data).await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Clean up on disconnect
    if let Some(id) = peer_id {
        remove_peer(&peers, &id).await;
        info!("📤 Peer {} disconnected", id);
    }

    send_task.abort();
}

async fn handle_signaling_message(
    msg: SignalingMessage,
    peer_id: &mut Option<PeerId>,
    tx: &mpsc::UnboundedSender<Message>,
    peers: &PeerTable,
) {
    match msg {
        SignalingMessage::Register { peer_id: new_id } => {
            if peer_id.is_some() {
                reply(tx, &error_msg("connection already registered"));
                return;
            }

            let mut table = peers.write().await;
            if table.contains_key(&new_id) {
                warn!("Rejecting duplicate registration of {}", new_id);
                reply(tx, &error_msg(&format!("peer id {} is taken", new_id)));
                return;
            }
            table.insert(
                new_id.clone(),
                PeerEntry {
                    tx: tx.clone(),
                    partner: None,
                },
            );
            drop(table);

            info!("✅ Peer registered: {}", new_id);
            *peer_id = Some(new_id.clone());
            reply(tx, &SignalingMessage::RegisterOk { peer_id: new_id });
        }

        SignalingMessage::Connect { target } => {
            let Some(own_id) = peer_id.as_ref() else {
                reply(tx, &error_msg("register before connecting"));
                return;
            };

            let mut table = peers.write().await;
            let available = own_id != &target
                && table.get(own_id).map(|e| e.partner.is_none()).unwrap_or(false)
                && table.get(&target).map(|e| e.partner.is_none()).unwrap_or(false);
            if !available {
                drop(table);
                reply(tx, &error_msg(&format!("peer {} is not available", target)));
                return;
            }

            if let Some(entry) = table.get_mut(own_id) {
                entry.partner = Some(target.clone());
            }
            if let Some(entry) = table.get_mut(&target) {
                entry.partner = Some(own_id.clone());
                reply(
                    &entry.tx,
                    &SignalingMessage::Paired {
                        peer_id: own_id.clone(),
                    },
                );
            }
            info!("🔗 Paired {} with {}", own_id, target);
            reply(tx, &SignalingMessage::Paired { peer_id: target });
        }

        other => {
            warn!("Unhandled message type: {:?}", other);
        }
    }
}

fn error_msg(message: &str) -> SignalingMessage {
    SignalingMessage::Error {
        message: message.to_string(),
    }
}

fn reply(tx: &mpsc::UnboundedSender<Message>, msg: &SignalingMessage) {
    match msg.to_text() {
        Ok(json) => {
            let _ = tx.send(Message::Text(json));
        }
        Err(e) => error!("Failed to encode signaling message: {}", e),
    }
}

async fn forward_frame(peers: &PeerTable, from: &str, data: Vec<u8>) {
    let table = peers.read().await;
    let target = table.get(from).and_then(|e| e.partner.as_ref());
    match target.and_then(|t| table.get(t)) {
        Some(partner) => {
            if partner.tx.send(Message::Binary(data)).is_err() {
                error!("Failed to forward frame from {}", from);
            }
        }
        None => warn!("Dropping frame from unpaired peer {}", from),
    }
}

async fn remove_peer(peers: &PeerTable, id: &str) {
    let mut table = peers.write().await;
    if let Some(entry) = table.remove(id) {
        if let Some(partner_id) = entry.partner {
            if let Some(partner) = table.get_mut(&partner_id) {
                partner.partner = None;
                reply(
                    &partner.tx,
                    &SignalingMessage::PeerLeft {
                        peer_id: id.to_string(),
                    },
                );
            }
        }
    }
}
