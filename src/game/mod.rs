pub mod input;
pub mod physics;
pub mod state;

pub use input::{clamp_paddle, InputController};
pub use physics::{step, PhysicsEvents};
pub use state::{Ball, Outcome, Paddles, Role, Score, Side, SimulationState};
