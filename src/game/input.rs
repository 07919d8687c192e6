use super::state::{Role, Side, SimulationState};
use crate::config::PhysicsConfig;

/// Maps pointer/touch positions onto the paddle the local role owns.
///
/// Pointer events only record the latest position; the frame loop calls
/// [`InputController::apply`] once per frame. Nothing here looks at the
/// connection, so local control never waits on the network.
#[derive(Debug, Clone)]
pub struct InputController {
    side: Side,
    pointer_y: Option<f32>, // Latest pointer position in field units
}

impl InputController {
    pub fn new(role: Role) -> Self {
        Self {
            side: role.owned_side(),
            pointer_y: None,
        }
    }

    /// Record a pointer/touch position given in surface pixels.
    ///
    /// `surface_height_px` is the rendered height of the playfield; the
    /// position is rescaled to logical field units.
    pub fn pointer_moved(&mut self, y_px: f32, surface_height_px: f32, physics: &PhysicsConfig) {
        if let Some(y) = pointer_to_field(y_px, surface_height_px, physics.field_height) {
            self.pointer_y = Some(y);
        }
    }

    /// Record a position already expressed in field units
    pub fn pointer_at_field(&mut self, y: f32) {
        if y.is_finite() {
            self.pointer_y = Some(y);
        }
    }

    /// Move the owned paddle to follow the pointer. Returns the new paddle
    /// position, or None when nothing moved (no pointer yet, or the match is over).
    pub fn apply(&self, state: &mut SimulationState, physics: &PhysicsConfig) -> Option<f32> {
        if state.is_finished() {
            return None;
        }
        let pointer_y = self.pointer_y?;
        let y = paddle_top_for(pointer_y, physics);
        state.paddles.set(self.side, y);
        Some(y)
    }
}

/// Scale a surface pixel coordinate into field units
pub fn pointer_to_field(y_px: f32, surface_height_px: f32, field_height: f32) -> Option<f32> {
    if !y_px.is_finite() || !surface_height_px.is_finite() || surface_height_px <= 0.0 {
        return None;
    }
    Some(y_px * (field_height / surface_height_px))
}

/// Paddle top edge that centers the paddle on `pointer_y`, clamped to the court
pub fn paddle_top_for(pointer_y: f32, physics: &PhysicsConfig) -> f32 {
    clamp_paddle(pointer_y - physics.paddle_height / 2.0, physics)
}

/// Clamp a paddle top edge into `[0, field_height - paddle_height]`
pub fn clamp_paddle(y: f32, physics: &PhysicsConfig) -> f32 {
    if y.is_nan() {
        return 0.0;
    }
    y.clamp(0.0, physics.paddle_max_y())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_pointer_is_scaled_to_field() {
        // Field 500 units tall rendered 250px tall
        assert_eq!(pointer_to_field(100.0, 250.0, 500.0), Some(200.0));
        assert_eq!(pointer_to_field(100.0, 0.0, 500.0), None);
        assert_eq!(pointer_to_field(f32::INFINITY, 250.0, 500.0), None);
    }

    #[test]
    fn test_host_moves_left_guest_moves_right() {
        let physics = PhysicsConfig::default();

        let mut state = SimulationState::new(Role::Host, &physics);
        let mut host = InputController::new(Role::Host);
        host.pointer_at_field(300.0);
        assert_eq!(host.apply(&mut state, &physics), Some(250.0));
        assert_eq!(state.paddles.left, 250.0);
        assert_eq!(state.paddles.right, physics.paddle_center_y());

        let mut state = SimulationState::new(Role::Guest, &physics);
        let mut guest = InputController::new(Role::Guest);
        guest.pointer_at_field(300.0);
        guest.apply(&mut state, &physics);
        assert_eq!(state.paddles.right, 250.0);
        assert_eq!(state.paddles.left, physics.paddle_center_y());
    }

    #[test]
    fn test_no_pointer_no_movement() {
        let physics = PhysicsConfig::default();
        let mut state = SimulationState::new(Role::Host, &physics);
        let controller = InputController::new(Role::Host);

        assert_eq!(controller.apply(&mut state, &physics), None);
        assert_eq!(state.paddles.left, physics.paddle_center_y());
    }

    #[test]
    fn test_paddle_frozen_after_finish() {
        let physics = PhysicsConfig::default();
        let mut state = SimulationState::new(Role::Guest, &physics);
        state.finish(Side::Left);
        let mut controller = InputController::new(Role::Guest);
        controller.pointer_at_field(10.0);

        assert_eq!(controller.apply(&mut state, &physics), None);
        assert_eq!(state.paddles.right, physics.paddle_center_y());
    }

    #[test]
    fn test_paddle_always_within_bounds() {
        let physics = PhysicsConfig::default();
        let mut state = SimulationState::new(Role::Host, &physics);
        let mut controller = InputController::new(Role::Host);
        let mut rng = StdRng::seed_from_u64(9);

        let extremes = [
            f32::MIN,
            f32::MAX,
            -1.0e9,
            1.0e9,
            0.0,
            -0.0,
            500.0,
            f32::NEG_INFINITY,
        ];
        for y in extremes {
            controller.pointer_moved(y, 500.0, &physics);
            controller.apply(&mut state, &physics);
            assert!(state.paddles.left >= 0.0);
            assert!(state.paddles.left <= physics.field_height - physics.paddle_height);
        }

        for _ in 0..10_000 {
            let y: f32 = rng.gen_range(-10_000.0..10_000.0);
            let surface: f32 = rng.gen_range(1.0..4_000.0);
            controller.pointer_moved(y, surface, &physics);
            controller.apply(&mut state, &physics);
            assert!(state.paddles.left >= 0.0);
            assert!(state.paddles.left <= physics.field_height - physics.paddle_height);
        }
    }

    #[test]
    fn test_clamp_handles_nan() {
        let physics = PhysicsConfig::default();
        assert_eq!(clamp_paddle(f32::NAN, &physics), 0.0);
        assert_eq!(clamp_paddle(1000.0, &physics), 400.0);
    }
}
