use serde::{Deserialize, Serialize};

use crate::config::PhysicsConfig;

/// Network role of the local peer, fixed for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Host,  // Created the match; owns ball physics and the left paddle
    Guest, // Joined the match; mirrors host state, owns the right paddle
}

impl Role {
    /// Side of the court whose paddle this role controls
    pub fn owned_side(self) -> Side {
        match self {
            Role::Host => Side::Left,
            Role::Guest => Side::Right,
        }
    }

    pub fn is_host(self) -> bool {
        matches!(self, Role::Host)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

impl Ball {
    pub fn new(x: f32, y: f32, vx: f32, vy: f32) -> Self {
        Self { x, y, vx, vy }
    }

    /// Vector magnitude of the velocity
    pub fn speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.vx.is_finite() && self.vy.is_finite()
    }
}

/// Top-edge positions of both paddles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paddles {
    pub left: f32,
    pub right: f32,
}

impl Paddles {
    pub fn get(&self, side: Side) -> f32 {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn set(&mut self, side: Side, y: f32) {
        match side {
            Side::Left => self.left = y,
            Side::Right => self.right = y,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub left: u32,
    pub right: u32,
}

impl Score {
    pub fn get(&self, side: Side) -> u32 {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn award(&mut self, side: Side) {
        match side {
            Side::Left => self.left += 1,
            Side::Right => self.right += 1,
        }
    }

    /// Side that has reached `winning_score`, if any
    pub fn leader_at(&self, winning_score: u32) -> Option<Side> {
        if self.left >= winning_score {
            Some(Side::Left)
        } else if self.right >= winning_score {
            Some(Side::Right)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    InProgress,
    Finished(Side),
}

impl Outcome {
    pub fn winner(self) -> Option<Side> {
        match self {
            Outcome::InProgress => None,
            Outcome::Finished(side) => Some(side),
        }
    }

    pub fn is_local_win(self, role: Role) -> bool {
        self.winner() == Some(role.owned_side())
    }
}

/// Authoritative (host) or mirrored (guest) match snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub ball: Ball,
    pub paddles: Paddles,
    pub score: Score,
    pub outcome: Outcome,
}

impl SimulationState {
    /// Center court, zero score, opening serve direction chosen by role.
    ///
    /// The host receives the opening serve; the guest's mirror starts with the
    /// opposite sign and is overwritten by the first ball update anyway.
    pub fn new(role: Role, physics: &PhysicsConfig) -> Self {
        let vx = match role {
            Role::Host => -physics.serve_speed,
            Role::Guest => physics.serve_speed,
        };
        let center_y = physics.paddle_center_y();

        Self {
            ball: Ball::new(
                physics.field_width / 2.0,
                physics.field_height / 2.0,
                vx,
                physics.initial_vertical_speed,
            ),
            paddles: Paddles {
                left: center_y,
                right: center_y,
            },
            score: Score::default(),
            outcome: Outcome::InProgress,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.outcome, Outcome::Finished(_))
    }

    /// Freeze the match. Returns false when it was already finished
    /// (the first terminal result stays authoritative).
    pub fn finish(&mut self, winner: Side) -> bool {
        if self.is_finished() {
            return false;
        }
        self.outcome = Outcome::Finished(winner);
        true
    }
}
