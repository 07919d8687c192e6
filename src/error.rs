//! Error types shared across the crate.
//!
//! Connectivity problems are deliberately absent from the per-frame API: they
//! show up as [`crate::session::ConnectionState`] changes. These errors cover
//! preconditions, transport plumbing and message decoding.

use thiserror::Error;

/// Preconditions checked before a session may open a connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("identity {identity} is not a participant of match {match_id}")]
    NotAParticipant { match_id: String, identity: String },

    #[error("match {0} already has a finalized outcome")]
    AlreadyFinalized(String),

    #[error("session for match {0} has been abandoned")]
    Abandoned(String),
}

/// Failures reported by a transport or channel
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no listener registered under {0}")]
    NoListener(String),

    #[error("rendezvous identifier {0} is already registered")]
    AddressInUse(String),

    #[error("channel is not open")]
    NotOpen,

    #[error("transport worker stopped")]
    WorkerGone,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encoding failures and the reasons an inbound frame was dropped
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid json frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid bincode frame: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("malformed {kind} payload: {reason}")]
    Malformed { kind: &'static str, reason: String },
}
