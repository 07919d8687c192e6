// Per-frame match loop for one participant
// Combines the session, the sync engine, local input and (on the host) the
// physics step. Call `frame` once per rendered frame with the current time.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::{Config, PhysicsConfig};
use crate::error::SessionError;
use crate::game::{physics, InputController, Outcome, Role, SimulationState};
use crate::ledger::{MatchRecord, MatchReport};
use crate::network::transport::Transport;
use crate::session::{ConnectionState, MatchSession, SessionEvent};
use crate::sync::{Applied, SyncEngine};

pub struct MatchDriver<T: Transport, R: Rng = StdRng> {
    record: MatchRecord,
    role: Role,
    session: MatchSession<T>,
    sync: SyncEngine,
    input: InputController,
    state: SimulationState,
    physics: PhysicsConfig,
    rng: R,

    started: bool,
    last_frame: Option<Instant>,
    report: Option<MatchReport>,
}

impl<T: Transport> MatchDriver<T, StdRng> {
    pub fn new(
        record: MatchRecord,
        identity: &str,
        transport: T,
        config: &Config,
    ) -> Result<Self, SessionError> {
        Self::with_rng(record, identity, transport, config, StdRng::from_entropy())
    }
}

impl<T: Transport, R: Rng> MatchDriver<T, R> {
    /// Driver with an explicit rng for re-serve angles (seed it for
    /// reproducible matches)
    pub fn with_rng(
        record: MatchRecord,
        identity: &str,
        transport: T,
        config: &Config,
        rng: R,
    ) -> Result<Self, SessionError> {
        let session = MatchSession::new(&record, identity, transport, &config.session, config.sync.codec)?;
        let role = session.role();

        Ok(Self {
            role,
            session,
            sync: SyncEngine::new(role, &config.sync, &config.physics),
            input: InputController::new(role),
            state: SimulationState::new(role, &config.physics),
            physics: config.physics.clone(),
            rng,
            record,
            started: false,
            last_frame: None,
            report: None,
        })
    }

    pub fn start(&mut self, now: Instant) -> Result<(), SessionError> {
        self.session.start(now)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn record(&self) -> &MatchRecord {
        &self.record
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn outcome(&self) -> Outcome {
        self.state.outcome
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }

    /// True once the first connection came up and play began
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Locally observed result once the match is over
    pub fn report(&self) -> Option<&MatchReport> {
        self.report.as_ref()
    }

    /// Pointer/touch position in surface pixels
    pub fn pointer_moved(&mut self, y_px: f32, surface_height_px: f32) {
        self.input.pointer_moved(y_px, surface_height_px, &self.physics);
    }

    /// Pointer position already in field units
    pub fn pointer_at_field(&mut self, y: f32) {
        self.input.pointer_at_field(y);
    }

    /// The user left the match view
    pub fn navigate_away(&mut self) {
        self.session.navigate_away();
    }

    /// Run one frame.
    ///
    /// Inbound messages first, then local input and the outgoing paddle, then
    /// (host only) the physics step and its broadcasts.
    pub fn frame(&mut self, now: Instant) {
        let elapsed_ms = self
            .last_frame
            .map(|last| now.saturating_duration_since(last).as_secs_f32() * 1000.0)
            .unwrap_or(0.0);
        self.last_frame = Some(now);

        for event in self.session.poll(now) {
            match event {
                SessionEvent::StateChanged(ConnectionState::Connected) => self.on_connected(),
                SessionEvent::StateChanged(state) => debug!("Connection state: {:?}", state),
                SessionEvent::Message(msg) => {
                    if let Applied::Ignored(reason) = self.sync.apply(&mut self.state, &msg) {
                        debug!("Ignored {}: {:?}", msg.kind().as_str(), reason);
                    }
                }
            }
        }

        // Local control never waits on the link
        self.input.apply(&mut self.state, &self.physics);

        if self.session.is_connected() {
            if let Some(msg) = self.sync.paddle_update(&self.state, now) {
                self.session.send(&msg);
            }
        }

        // Play pauses while the link is down so a dropped peer cannot lose points
        if self.role.is_host() && self.started && self.session.is_connected() {
            let events = physics::step(&mut self.state, &self.physics, elapsed_ms, &mut self.rng);
            for msg in self.sync.host_events(&self.state, &events) {
                self.session.send(&msg);
            }
            if let Some(msg) = self.sync.ball_update(&self.state, now) {
                self.session.send(&msg);
            }
        }

        if self.state.is_finished() && self.report.is_none() {
            self.finish();
        }
    }

    fn on_connected(&mut self) {
        if !self.started {
            self.started = true;
            info!("🎮 Match {} started as {:?}", self.record.match_id, self.role);
            return;
        }

        // Reconnected mid-match: keep the current state, bring the peer up to date
        info!(
            "🔄 Reconnected to match {} at {}-{}",
            self.record.match_id, self.state.score.left, self.state.score.right
        );
        for msg in self.sync.resync(&self.state) {
            self.session.send(&msg);
        }
    }

    fn finish(&mut self) {
        self.report = MatchReport::from_state(&self.record, &self.state);
        if let Some(report) = &self.report {
            let result = if self.state.outcome.is_local_win(self.role) {
                "won"
            } else {
                "lost"
            };
            info!(
                "Match {} over: {} {}-{}",
                report.match_id, result, report.final_score_a, report.final_score_b
            );
        }
        self.session.mark_finished();
    }
}
