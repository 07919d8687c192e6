//! Peer-to-peer pong match synchronization.
//!
//! The host runs the authoritative simulation and streams ball, score and
//! outcome to the guest; each side owns and streams its own paddle. The
//! [`driver::MatchDriver`] ties the pieces together for one participant.

pub mod config;
pub mod driver;
pub mod error;
pub mod game;
pub mod ledger;
pub mod logging;
pub mod network;
pub mod results;
pub mod session;
pub mod sync;

pub use driver::MatchDriver;
pub use error::{CodecError, SessionError, TransportError};
pub use ledger::{MatchRecord, MatchReport};
pub use session::{ConnectionState, MatchSession};
