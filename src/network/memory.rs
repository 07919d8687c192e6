// In-process transport
// Pairs listeners and dialers living in the same process through std channels.
// Delivery is ordered and lossless, which is exactly what the sync protocol
// expects from a real data channel. Used by local matches and by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::transport::{Channel, ChannelEvent, Transport};
use crate::error::TransportError;

/// Shared registry of listeners and live links; clone it to hand the same
/// "network" to several peers
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<Mutex<Registry>>,
}

#[derive(Default)]
struct Registry {
    listeners: HashMap<String, PendingListener>,
    links: HashMap<String, LinkHandles>, // keyed by the listener's id
}

struct PendingListener {
    inbox: Sender<ChannelEvent>,
    peer_slot: PeerSlot,
}

struct LinkHandles {
    link: Arc<Link>,
    listener_inbox: Sender<ChannelEvent>,
    dialer_inbox: Sender<ChannelEvent>,
}

struct Link {
    open: AtomicBool,
}

struct Peer {
    outbox: Sender<ChannelEvent>,
    link: Arc<Link>,
}

type PeerSlot = Arc<Mutex<Option<Peer>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport endpoint attached to this network
    pub fn endpoint(&self) -> MemoryTransport {
        MemoryTransport {
            network: self.clone(),
        }
    }

    pub fn is_listening(&self, id: &str) -> bool {
        lock(&self.inner).listeners.contains_key(id)
    }

    /// Drop the live link of the listener registered as `listener_id`, as if
    /// the underlying connection died. Both ends observe `Close`.
    pub fn sever(&self, listener_id: &str) -> bool {
        let handles = lock(&self.inner).links.remove(listener_id);
        match handles {
            Some(handles) => {
                handles.link.open.store(false, Ordering::SeqCst);
                let _ = handles.listener_inbox.send(ChannelEvent::Close);
                let _ = handles.dialer_inbox.send(ChannelEvent::Close);
                debug!("Severed memory link of {}", listener_id);
                true
            }
            None => false,
        }
    }
}

pub struct MemoryTransport {
    network: MemoryNetwork,
}

impl Transport for MemoryTransport {
    type Channel = MemoryChannel;

    fn listen(&mut self, own_id: &str) -> Result<MemoryChannel, TransportError> {
        let mut registry = lock(&self.network.inner);
        if registry.listeners.contains_key(own_id) {
            return Err(TransportError::AddressInUse(own_id.to_string()));
        }

        let (tx, rx) = mpsc::channel();
        let peer_slot: PeerSlot = Arc::new(Mutex::new(None));
        registry.listeners.insert(
            own_id.to_string(),
            PendingListener {
                inbox: tx,
                peer_slot: peer_slot.clone(),
            },
        );
        debug!("Memory listener registered: {}", own_id);

        Ok(MemoryChannel {
            own_id: own_id.to_string(),
            listener_id: own_id.to_string(),
            inbox: rx,
            peer_slot,
            network: self.network.clone(),
        })
    }

    fn connect(&mut self, own_id: &str, remote_id: &str) -> Result<MemoryChannel, TransportError> {
        let mut registry = lock(&self.network.inner);

        // A listener accepts exactly one inbound connection
        let listener = registry
            .listeners
            .remove(remote_id)
            .ok_or_else(|| TransportError::NoListener(remote_id.to_string()))?;

        let (tx, rx) = mpsc::channel();
        let link = Arc::new(Link {
            open: AtomicBool::new(true),
        });

        *lock(&listener.peer_slot) = Some(Peer {
            outbox: tx.clone(),
            link: link.clone(),
        });
        let peer_slot: PeerSlot = Arc::new(Mutex::new(Some(Peer {
            outbox: listener.inbox.clone(),
            link: link.clone(),
        })));

        let _ = listener.inbox.send(ChannelEvent::Open);
        let _ = tx.send(ChannelEvent::Open);

        registry.links.insert(
            remote_id.to_string(),
            LinkHandles {
                link,
                listener_inbox: listener.inbox,
                dialer_inbox: tx,
            },
        );
        debug!("Memory link established: {} -> {}", own_id, remote_id);

        Ok(MemoryChannel {
            own_id: own_id.to_string(),
            listener_id: remote_id.to_string(),
            inbox: rx,
            peer_slot,
            network: self.network.clone(),
        })
    }
}

pub struct MemoryChannel {
    own_id: String,
    listener_id: String,
    inbox: Receiver<ChannelEvent>,
    peer_slot: PeerSlot,
    network: MemoryNetwork,
}

impl Channel for MemoryChannel {
    fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        let slot = lock(&self.peer_slot);
        match slot.as_ref() {
            Some(peer) if peer.link.open.load(Ordering::SeqCst) => peer
                .outbox
                .send(ChannelEvent::Message(frame))
                .map_err(|_| TransportError::NotOpen),
            _ => Err(TransportError::NotOpen),
        }
    }

    fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.inbox.try_recv().ok()
    }

    fn close(&mut self) {
        let mut registry = lock(&self.network.inner);

        // Still waiting for a dialer: withdraw our registration
        let ours = registry
            .listeners
            .get(&self.own_id)
            .map(|pending| Arc::ptr_eq(&pending.peer_slot, &self.peer_slot))
            .unwrap_or(false);
        if ours {
            registry.listeners.remove(&self.own_id);
        }

        if let Some(peer) = lock(&self.peer_slot).take() {
            if peer.link.open.swap(false, Ordering::SeqCst) {
                let _ = peer.outbox.send(ChannelEvent::Close);
            }
            let same_link = registry
                .links
                .get(&self.listener_id)
                .map(|handles| Arc::ptr_eq(&handles.link, &peer.link))
                .unwrap_or(false);
            if same_link {
                registry.links.remove(&self.listener_id);
            }
        }
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(channel: &mut MemoryChannel) -> Vec<ChannelEvent> {
        std::iter::from_fn(|| channel.try_recv()).collect()
    }

    #[test]
    fn test_dial_without_listener_fails() {
        let network = MemoryNetwork::new();
        let mut guest = network.endpoint();

        match guest.connect("guest_1", "host_1") {
            Err(TransportError::NoListener(id)) => assert_eq!(id, "host_1"),
            other => panic!("expected NoListener, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_pairing_and_ordered_delivery() {
        let network = MemoryNetwork::new();
        let mut host = network.endpoint().listen("host_7").unwrap();
        let mut guest = network.endpoint().connect("guest_7_a", "host_7").unwrap();

        assert_eq!(drain(&mut host), vec![ChannelEvent::Open]);
        assert_eq!(drain(&mut guest), vec![ChannelEvent::Open]);

        for i in 0..10u8 {
            guest.send(vec![i]).unwrap();
        }
        host.send(b"pong".to_vec()).unwrap();

        let received: Vec<ChannelEvent> = drain(&mut host);
        let expected: Vec<ChannelEvent> = (0..10u8).map(|i| ChannelEvent::Message(vec![i])).collect();
        assert_eq!(received, expected);
        assert_eq!(drain(&mut guest), vec![ChannelEvent::Message(b"pong".to_vec())]);
    }

    #[test]
    fn test_listener_accepts_one_connection() {
        let network = MemoryNetwork::new();
        let _host = network.endpoint().listen("host_1").unwrap();
        let _first = network.endpoint().connect("guest_a", "host_1").unwrap();

        assert!(network.endpoint().connect("guest_b", "host_1").is_err());
        assert!(!network.is_listening("host_1"));
    }

    #[test]
    fn test_duplicate_listener_rejected_until_closed() {
        let network = MemoryNetwork::new();
        let mut first = network.endpoint().listen("host_1").unwrap();

        assert!(matches!(
            network.endpoint().listen("host_1"),
            Err(TransportError::AddressInUse(_))
        ));

        first.close();
        assert!(network.endpoint().listen("host_1").is_ok());
    }

    #[test]
    fn test_close_notifies_peer() {
        let network = MemoryNetwork::new();
        let mut host = network.endpoint().listen("host_1").unwrap();
        let mut guest = network.endpoint().connect("guest_a", "host_1").unwrap();
        drain(&mut host);
        drain(&mut guest);

        guest.close();

        assert_eq!(drain(&mut host), vec![ChannelEvent::Close]);
        assert!(host.send(vec![1]).is_err());
        assert!(guest.send(vec![1]).is_err());
    }

    #[test]
    fn test_sever_closes_both_ends() {
        let network = MemoryNetwork::new();
        let mut host = network.endpoint().listen("host_1").unwrap();
        let mut guest = network.endpoint().connect("guest_a", "host_1").unwrap();
        drain(&mut host);
        drain(&mut guest);

        assert!(network.sever("host_1"));
        assert!(!network.sever("host_1"));

        assert_eq!(drain(&mut host), vec![ChannelEvent::Close]);
        assert_eq!(drain(&mut guest), vec![ChannelEvent::Close]);
        assert!(host.send(vec![1]).is_err());
    }
}
