// Networking for P2Pong sync
// Wire protocol, the transport capability the session consumes, and two
// transports: in-process (tests, local play) and a WebSocket relay.

pub mod memory;
pub mod protocol;
pub mod relay;
pub mod signaling;
pub mod transport;

pub use memory::{MemoryChannel, MemoryNetwork, MemoryTransport};
pub use protocol::{BallState, MessageKind, PaddleState, SyncMessage, SyncPayload};
pub use relay::{RelayChannel, RelayTransport};
pub use transport::{Channel, ChannelEvent, Transport};
