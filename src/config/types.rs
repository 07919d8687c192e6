// P2Pong sync configuration types
// All settings with sensible defaults matching the tuned match constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PhysicsConfig {
    // Logical playfield dimensions (both peers share these)
    pub field_width: f32,
    pub field_height: f32,

    // Paddles sit flush against the left and right edges
    pub paddle_width: f32,
    pub paddle_height: f32,

    pub ball_radius: f32,

    // Score required to win
    pub winning_score: u32,

    // Horizontal speed gain on each paddle hit (0.05 = 5%)
    pub speed_increment: f32,

    // Cap on the ball's total speed (velocity magnitude), units per nominal frame
    pub max_ball_speed: f32,

    // Horizontal speed of every serve, units per nominal frame
    pub serve_speed: f32,

    // Vertical speed of the opening serve
    pub initial_vertical_speed: f32,

    // Re-serves draw their vertical speed uniformly from [-spread, spread)
    pub serve_vertical_spread: f32,

    // Vertical speed produced by a hit on the very tip of a paddle
    pub max_deflection_speed: f32,

    // Velocities are expressed per nominal frame; elapsed time is scaled against this
    pub nominal_frame_ms: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            field_width: 800.0,
            field_height: 500.0,
            paddle_width: 15.0,
            paddle_height: 100.0,
            ball_radius: 10.0,
            winning_score: 5,
            speed_increment: 0.05,
            max_ball_speed: 15.0,
            serve_speed: 5.0,
            initial_vertical_speed: 2.0,
            serve_vertical_spread: 3.0,
            max_deflection_speed: 10.0,
            nominal_frame_ms: 16.67,
        }
    }
}

impl PhysicsConfig {
    /// Highest legal paddle top edge
    pub fn paddle_max_y(&self) -> f32 {
        (self.field_height - self.paddle_height).max(0.0)
    }

    /// Paddle top edge that centers the paddle vertically
    pub fn paddle_center_y(&self) -> f32 {
        self.field_height / 2.0 - self.paddle_height / 2.0
    }
}

/// Wire encoding used on the data channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WireCodec {
    #[default]
    Json,
    Bincode,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    // Minimum time between two paddle updates
    pub paddle_interval_ms: u64,

    // Minimum paddle movement since the last sent value
    pub paddle_min_delta: f32,

    // Host ball broadcast period
    pub ball_interval_ms: u64,

    pub codec: WireCodec,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            paddle_interval_ms: 16,
            paddle_min_delta: 0.5,
            ball_interval_ms: 16,
            codec: WireCodec::Json,
        }
    }
}

impl SyncConfig {
    pub fn paddle_interval(&self) -> Duration {
        Duration::from_millis(self.paddle_interval_ms)
    }

    pub fn ball_interval(&self) -> Duration {
        Duration::from_millis(self.ball_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    // Fixed backoff before every reconnection attempt
    pub retry_delay_ms: u64,

    // Heartbeat period while connected
    pub heartbeat_interval_ms: u64,

    // Silence longer than this marks the link stale
    pub heartbeat_timeout_ms: u64,

    // Relay/signaling server WebSocket URL
    pub signaling_server: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 3000,
            heartbeat_interval_ms: 5000,
            heartbeat_timeout_ms: 10000,
            signaling_server: "ws://127.0.0.1:8080".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    // Target frames per second of the frame loop
    pub target_fps: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { target_fps: 60 }
    }
}

impl DisplayConfig {
    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(1000 / self.target_fps.max(1))
    }
}
