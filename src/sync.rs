// Game state synchronization
// Decides what goes on the wire each frame and how inbound messages mutate
// the local snapshot. Host is authoritative for ball, score and outcome;
// each side is authoritative for its own paddle.

use std::time::Instant;

use tracing::{debug, info};

use crate::config::{PhysicsConfig, SyncConfig};
use crate::game::{clamp_paddle, PhysicsEvents, Role, SimulationState};
use crate::network::protocol::{BallState, GameOverState, PaddleState, SyncMessage, SyncPayload};

/// Result of applying one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Updated,
    /// Outcome changed to finished by this message
    Finished,
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Match already over
    Finished,
    /// Message only the other role may act on (host never takes ball/score)
    NotAuthoritative,
    /// Older sequence than one already applied
    Stale,
    Heartbeat,
}

pub struct SyncEngine {
    role: Role,
    config: SyncConfig,
    physics: PhysicsConfig,

    // Outbound paddle gate
    paddle_sequence: u64,
    last_paddle_sent_at: Option<Instant>,
    last_paddle_sent_y: Option<f32>,

    // Outbound ball broadcast (host)
    ball_sequence: u64,
    last_ball_sent_at: Option<Instant>,
    game_over_sent: bool,

    // Inbound ordering
    last_remote_paddle_sequence: Option<u64>,
    last_ball_sequence: Option<u64>,
}

impl SyncEngine {
    pub fn new(role: Role, config: &SyncConfig, physics: &PhysicsConfig) -> Self {
        Self {
            role,
            config: config.clone(),
            physics: physics.clone(),
            paddle_sequence: 0,
            last_paddle_sent_at: None,
            last_paddle_sent_y: None,
            ball_sequence: 0,
            last_ball_sent_at: None,
            game_over_sent: false,
            last_remote_paddle_sequence: None,
            last_ball_sequence: None,
        }
    }

    /// Own paddle update, if both the interval and the movement gate pass.
    /// The first update always goes out; nothing is sent once finished.
    pub fn paddle_update(&mut self, state: &SimulationState, now: Instant) -> Option<SyncMessage> {
        if state.is_finished() {
            return None;
        }
        let y = state.paddles.get(self.role.owned_side());

        if let (Some(at), Some(last_y)) = (self.last_paddle_sent_at, self.last_paddle_sent_y) {
            if now.duration_since(at) < self.config.paddle_interval() {
                return None;
            }
            if (y - last_y).abs() < self.config.paddle_min_delta {
                return None;
            }
        }

        self.paddle_sequence += 1;
        self.last_paddle_sent_at = Some(now);
        self.last_paddle_sent_y = Some(y);
        Some(SyncMessage::new(SyncPayload::PaddleUpdate(PaddleState {
            y,
            sequence: self.paddle_sequence,
        })))
    }

    /// Periodic ball broadcast (host only, while the match runs)
    pub fn ball_update(&mut self, state: &SimulationState, now: Instant) -> Option<SyncMessage> {
        if !self.role.is_host() || state.is_finished() {
            return None;
        }
        if let Some(at) = self.last_ball_sent_at {
            if now.duration_since(at) < self.config.ball_interval() {
                return None;
            }
        }
        self.last_ball_sent_at = Some(now);
        Some(self.next_ball_message(state))
    }

    /// Messages caused by a physics step: score change and, once, game over
    pub fn host_events(&mut self, state: &SimulationState, events: &PhysicsEvents) -> Vec<SyncMessage> {
        let mut messages = Vec::new();
        if !self.role.is_host() {
            return messages;
        }

        if events.point_scored.is_some() {
            messages.push(SyncMessage::new(SyncPayload::ScoreUpdate(state.score)));
        }

        if let Some(winner) = events.game_over.or_else(|| state.outcome.winner()) {
            if !self.game_over_sent {
                self.game_over_sent = true;
                info!("🏆 Game over, {:?} wins {}-{}", winner, state.score.left, state.score.right);
                messages.push(SyncMessage::new(SyncPayload::GameOver(GameOverState { winner })));
            }
        }

        messages
    }

    /// Catch-up after a reconnection: the host repeats score and ball, both
    /// sides resend their paddle on the next frame.
    ///
    /// Inbound sequence memory is dropped as well, since the peer on the new
    /// link may be a fresh process whose counters start over.
    pub fn resync(&mut self, state: &SimulationState) -> Vec<SyncMessage> {
        self.last_paddle_sent_at = None;
        self.last_paddle_sent_y = None;
        self.last_remote_paddle_sequence = None;
        self.last_ball_sequence = None;

        if !self.role.is_host() || state.is_finished() {
            return Vec::new();
        }
        vec![
            SyncMessage::new(SyncPayload::ScoreUpdate(state.score)),
            self.next_ball_message(state),
        ]
    }

    fn next_ball_message(&mut self, state: &SimulationState) -> SyncMessage {
        self.ball_sequence += 1;
        SyncMessage::new(SyncPayload::BallUpdate(BallState::from_ball(
            &state.ball,
            self.ball_sequence,
        )))
    }

    /// Apply one decoded inbound message. Each message either applies in
    /// full or leaves `state` untouched.
    pub fn apply(&mut self, state: &mut SimulationState, msg: &SyncMessage) -> Applied {
        if let SyncPayload::Heartbeat = msg.payload {
            return Applied::Ignored(IgnoreReason::Heartbeat);
        }
        if state.is_finished() {
            return Applied::Ignored(IgnoreReason::Finished);
        }

        match msg.payload {
            SyncPayload::PaddleUpdate(paddle) => {
                if is_stale(self.last_remote_paddle_sequence, paddle.sequence) {
                    return Applied::Ignored(IgnoreReason::Stale);
                }
                self.last_remote_paddle_sequence = Some(paddle.sequence);
                let side = self.role.owned_side().opposite();
                state.paddles.set(side, clamp_paddle(paddle.y, &self.physics));
                Applied::Updated
            }
            SyncPayload::BallUpdate(ball) => {
                if self.role.is_host() {
                    return Applied::Ignored(IgnoreReason::NotAuthoritative);
                }
                if is_stale(self.last_ball_sequence, ball.sequence) {
                    return Applied::Ignored(IgnoreReason::Stale);
                }
                self.last_ball_sequence = Some(ball.sequence);
                state.ball = ball.to_ball();
                Applied::Updated
            }
            SyncPayload::ScoreUpdate(score) => {
                if self.role.is_host() {
                    return Applied::Ignored(IgnoreReason::NotAuthoritative);
                }
                state.score = score;
                match score.leader_at(self.physics.winning_score) {
                    Some(winner) => {
                        state.finish(winner);
                        info!("Final score {}-{}, {:?} wins", score.left, score.right, winner);
                        Applied::Finished
                    }
                    None => {
                        debug!("Score {}-{}", score.left, score.right);
                        Applied::Updated
                    }
                }
            }
            SyncPayload::GameOver(GameOverState { winner }) => {
                state.finish(winner);
                info!("🏁 Opponent reported game over, {:?} wins", winner);
                Applied::Finished
            }
            SyncPayload::Heartbeat => Applied::Ignored(IgnoreReason::Heartbeat),
        }
    }
}

fn is_stale(last: Option<u64>, sequence: u64) -> bool {
    matches!(last, Some(last) if sequence < last)
}
