// Match session: connection lifecycle between the two participants
// Owns the transport channel and drives Disconnected/Connecting/Connected/
// Errored/Abandoned. Everything is polled from the frame loop with an
// explicit clock, so retries and heartbeats are plain deadline checks.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::{SessionConfig, WireCodec};
use crate::error::SessionError;
use crate::game::Role;
use crate::ledger::MatchRecord;
use crate::network::protocol::{unix_millis, SyncMessage, SyncPayload};
use crate::network::transport::{Channel, ChannelEvent, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Errored,
    /// Terminal: the match finished or the user left. No more reconnects.
    Abandoned,
}

/// What the frame loop needs to react to after a poll
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(ConnectionState),
    /// Decoded, validated sync message (heartbeats are consumed here)
    Message(SyncMessage),
}

/// Stable rendezvous identifier the host listens under
pub fn host_rendezvous_id(match_id: &str) -> String {
    format!("host_{}", match_id)
}

/// Fresh guest identifier; a new one per attempt so the relay never sees a
/// stale registration collide with the retry
pub fn guest_rendezvous_id(match_id: &str) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let nonce: String = (0..4)
        .map(|_| {
            let idx = rng.gen_range(0..26);
            (b'A' + idx) as char
        })
        .collect();
    format!("guest_{}_{}{}", match_id, unix_millis(), nonce)
}

pub struct MatchSession<T: Transport> {
    match_id: String,
    role: Role,
    transport: T,
    channel: Option<T::Channel>,
    local_id: Option<String>,
    state: ConnectionState,
    config: SessionConfig,
    codec: WireCodec,

    last_inbound: Option<Instant>,
    last_heartbeat: Option<Instant>,
    retry_at: Option<Instant>,

    // Reconnection guards, checked before every attempt
    match_finished: bool,
    navigated_away: bool,

    pending: Vec<SessionEvent>,
}

impl<T: Transport> MatchSession<T> {
    /// Resolve the local role from the match record. Fails without touching
    /// the transport when `identity` may not play this match.
    pub fn new(
        record: &MatchRecord,
        identity: &str,
        transport: T,
        config: &SessionConfig,
        codec: WireCodec,
    ) -> Result<Self, SessionError> {
        let role = record.role_for(identity)?;
        info!("Session for match {} as {:?}", record.match_id, role);

        Ok(Self {
            match_id: record.match_id.clone(),
            role,
            transport,
            channel: None,
            local_id: None,
            state: ConnectionState::Disconnected,
            config: config.clone(),
            codec,
            last_inbound: None,
            last_heartbeat: None,
            retry_at: None,
            match_finished: false,
            navigated_away: false,
            pending: Vec::new(),
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Rendezvous identifier used by the current attempt
    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    /// Pending reconnection deadline, if a retry is scheduled
    pub fn retry_at(&self) -> Option<Instant> {
        self.retry_at
    }

    /// First connection attempt. Host listens, guest dials.
    pub fn start(&mut self, now: Instant) -> Result<(), SessionError> {
        if self.state == ConnectionState::Abandoned {
            return Err(SessionError::Abandoned(self.match_id.clone()));
        }
        if self.state == ConnectionState::Disconnected && self.channel.is_none() {
            self.attempt(now);
        }
        Ok(())
    }

    /// Advance timers and drain the channel.
    ///
    /// Order: scheduled retry, inbound events, heartbeat, staleness check.
    pub fn poll(&mut self, now: Instant) -> Vec<SessionEvent> {
        if let Some(at) = self.retry_at {
            if now >= at {
                self.retry_at = None;
                if self.may_reconnect() {
                    self.attempt(now);
                }
            }
        }

        self.drain(now);

        if self.state == ConnectionState::Connected {
            self.heartbeat(now);
            self.check_stale(now);
        }

        std::mem::take(&mut self.pending)
    }

    /// Encode and send one message. Only while connected; returns whether
    /// the frame went out.
    pub fn send(&mut self, msg: &SyncMessage) -> bool {
        if self.state != ConnectionState::Connected {
            return false;
        }
        self.send_frame(msg)
    }

    /// The match reached a terminal outcome: stop reconnecting but keep the
    /// channel so the final messages flush and late ones still drain.
    pub fn mark_finished(&mut self) {
        if self.match_finished {
            return;
        }
        self.match_finished = true;
        self.retry_at = None;
        info!("Match {} finished, session abandoned", self.match_id);
        self.set_state(ConnectionState::Abandoned);
    }

    /// The user left: cancel any pending retry and close the channel
    pub fn navigate_away(&mut self) {
        self.navigated_away = true;
        self.retry_at = None;
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        info!("Left match {}", self.match_id);
        self.set_state(ConnectionState::Abandoned);
    }

    fn may_reconnect(&self) -> bool {
        !self.match_finished && !self.navigated_away
    }

    fn attempt(&mut self, now: Instant) {
        if let Some(mut old) = self.channel.take() {
            old.close();
        }

        let host_id = host_rendezvous_id(&self.match_id);
        let result = match self.role {
            Role::Host => {
                info!("📡 Listening as {}", host_id);
                self.local_id = Some(host_id.clone());
                self.transport.listen(&host_id)
            }
            Role::Guest => {
                let guest_id = guest_rendezvous_id(&self.match_id);
                info!("🔌 Dialing {} as {}", host_id, guest_id);
                self.local_id = Some(guest_id.clone());
                self.transport.connect(&guest_id, &host_id)
            }
        };

        match result {
            Ok(channel) => {
                self.channel = Some(channel);
                self.set_state(ConnectionState::Connecting);
            }
            Err(e) => {
                warn!("Connection attempt for match {} failed: {}", self.match_id, e);
                self.fail(ConnectionState::Errored, now);
            }
        }
    }

    fn drain(&mut self, now: Instant) {
        loop {
            let event = match self.channel.as_mut() {
                Some(channel) => channel.try_recv(),
                None => None,
            };
            let Some(event) = event else { break };

            match event {
                ChannelEvent::Open => {
                    if self.state == ConnectionState::Abandoned {
                        continue;
                    }
                    info!("✅ Connected to opponent in match {}", self.match_id);
                    self.last_inbound = Some(now);
                    self.last_heartbeat = Some(now);
                    self.set_state(ConnectionState::Connected);
                }
                ChannelEvent::Message(bytes) => {
                    self.last_inbound = Some(now);
                    match SyncMessage::decode(&bytes, self.codec) {
                        Ok(msg) => match msg.payload {
                            SyncPayload::Heartbeat => debug!("💓 Heartbeat received"),
                            _ => self.pending.push(SessionEvent::Message(msg)),
                        },
                        Err(e) => warn!("Dropping inbound frame: {}", e),
                    }
                }
                ChannelEvent::Close => {
                    if self.state == ConnectionState::Abandoned {
                        self.channel = None;
                        break;
                    }
                    info!("Channel closed for match {}", self.match_id);
                    self.fail(ConnectionState::Disconnected, now);
                    break;
                }
                ChannelEvent::Error(e) => {
                    if self.state == ConnectionState::Abandoned {
                        self.channel = None;
                        break;
                    }
                    warn!("Channel error for match {}: {}", self.match_id, e);
                    self.fail(ConnectionState::Errored, now);
                    break;
                }
            }
        }
    }

    fn heartbeat(&mut self, now: Instant) {
        let due = self
            .last_heartbeat
            .map(|at| now.duration_since(at) >= self.config.heartbeat_interval())
            .unwrap_or(true);
        if due {
            self.last_heartbeat = Some(now);
            self.send_frame(&SyncMessage::heartbeat());
        }
    }

    fn check_stale(&mut self, now: Instant) {
        let stale = self
            .last_inbound
            .map(|at| now.duration_since(at) > self.config.heartbeat_timeout())
            .unwrap_or(false);
        if stale {
            warn!(
                "No traffic from opponent for {:?}, dropping link",
                self.config.heartbeat_timeout()
            );
            self.fail(ConnectionState::Disconnected, now);
        }
    }

    /// Tear down the channel, enter `state` and schedule a retry if allowed
    fn fail(&mut self, state: ConnectionState, now: Instant) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.last_inbound = None;
        self.last_heartbeat = None;
        self.set_state(state);

        if self.may_reconnect() {
            let at = now + self.config.retry_delay();
            debug!("Retrying match {} in {:?}", self.match_id, self.config.retry_delay());
            self.retry_at = Some(at);
        }
    }

    fn send_frame(&mut self, msg: &SyncMessage) -> bool {
        let Some(channel) = self.channel.as_mut() else {
            return false;
        };
        let bytes = match msg.encode(self.codec) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode {}: {}", msg.kind().as_str(), e);
                return false;
            }
        };
        match channel.send(bytes) {
            Ok(()) => true,
            Err(e) => {
                // The channel reports the close on its own
                debug!("Send of {} failed: {}", msg.kind().as_str(), e);
                false
            }
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("Session state {:?} -> {:?}", self.state, state);
            self.state = state;
            self.pending.push(SessionEvent::StateChanged(state));
        }
    }
}
