//! Transport/signaling capability consumed by the session layer.
//!
//! A transport knows how to register under a rendezvous identifier and wait
//! for one peer (`listen`), or dial a registered identifier (`connect`). Both
//! hand back a [`Channel`]: an ordered, reliable, bidirectional pipe whose
//! lifecycle events (`Open`, `Message`, `Close`, `Error`) are queued and
//! drained by the frame loop with [`Channel::try_recv`], so that all state
//! mutation happens on the thread that owns the match.

use crate::error::TransportError;

/// Lifecycle and data events raised by a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Both ends are paired and frames may flow
    Open,
    /// One inbound frame, in send order
    Message(Vec<u8>),
    /// The link went away (remote closed, relay dropped, ...)
    Close,
    /// Transport-level failure; the channel should be considered dead
    Error(String),
}

pub trait Channel {
    /// Queue one frame for delivery to the remote end
    fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Next pending event, without blocking
    fn try_recv(&mut self) -> Option<ChannelEvent>;

    /// Tear the channel down; the remote end sees `Close`
    fn close(&mut self);
}

pub trait Transport {
    type Channel: Channel;

    /// Register under `own_id` and wait for exactly one inbound connection
    fn listen(&mut self, own_id: &str) -> Result<Self::Channel, TransportError>;

    /// Register under `own_id` and dial the peer registered as `remote_id`
    fn connect(&mut self, own_id: &str, remote_id: &str) -> Result<Self::Channel, TransportError>;
}
