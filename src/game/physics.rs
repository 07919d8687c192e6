use rand::Rng;

use super::state::{Ball, Side, SimulationState};
use crate::config::PhysicsConfig;

/// What happened during one step; the sync layer turns these into messages
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PhysicsEvents {
    pub paddle_hit: Option<Side>,
    pub wall_collision: bool,
    pub point_scored: Option<Side>,
    pub game_over: Option<Side>,
}

/// Advance the authoritative ball by `elapsed_ms` of wall-clock time.
///
/// Velocities are per nominal frame, so the step is scaled by
/// `elapsed_ms / nominal_frame_ms`. The rng is only consulted for the vertical
/// component of a re-serve; pass a seeded rng for reproducible runs.
pub fn step<R: Rng + ?Sized>(
    state: &mut SimulationState,
    physics: &PhysicsConfig,
    elapsed_ms: f32,
    rng: &mut R,
) -> PhysicsEvents {
    let mut events = PhysicsEvents::default();
    if state.is_finished() {
        return events;
    }

    let time_scale = time_scale(elapsed_ms, physics.nominal_frame_ms);

    state.ball.x += state.ball.vx * time_scale;
    state.ball.y += state.ball.vy * time_scale;

    events.wall_collision = collide_walls(&mut state.ball, physics);
    events.paddle_hit = collide_paddles(state, physics);

    // Ball is out once its center is past the edge
    let scorer = if state.ball.x < 0.0 {
        Some(Side::Right)
    } else if state.ball.x > physics.field_width {
        Some(Side::Left)
    } else {
        None
    };

    if let Some(scorer) = scorer {
        state.score.award(scorer);
        events.point_scored = Some(scorer);

        if state.score.get(scorer) >= physics.winning_score {
            state.finish(scorer);
            events.game_over = Some(scorer);
        } else {
            serve(&mut state.ball, physics, scorer, rng);
        }
    }

    events
}

fn time_scale(elapsed_ms: f32, nominal_frame_ms: f32) -> f32 {
    if !elapsed_ms.is_finite() || elapsed_ms <= 0.0 || nominal_frame_ms <= 0.0 {
        return 0.0;
    }
    elapsed_ms / nominal_frame_ms
}

fn collide_walls(ball: &mut Ball, physics: &PhysicsConfig) -> bool {
    let radius = physics.ball_radius;
    if ball.y < radius {
        ball.y = radius;
        ball.vy = ball.vy.abs();
        true
    } else if ball.y > physics.field_height - radius {
        ball.y = physics.field_height - radius;
        ball.vy = -ball.vy.abs();
        true
    } else {
        false
    }
}

fn collide_paddles(state: &mut SimulationState, physics: &PhysicsConfig) -> Option<Side> {
    let radius = physics.ball_radius;
    let ball = &mut state.ball;

    // Left paddle occupies [0, paddle_width]; only while travelling left
    let left_y = state.paddles.left;
    if ball.vx < 0.0
        && ball.x - radius <= physics.paddle_width
        && within_paddle(ball.y, left_y, physics.paddle_height)
    {
        bounce_off_paddle(ball, left_y, physics, Side::Left);
        ball.x = physics.paddle_width + radius;
        return Some(Side::Left);
    }

    let right_y = state.paddles.right;
    let right_plane = physics.field_width - physics.paddle_width;
    if ball.vx > 0.0
        && ball.x + radius >= right_plane
        && within_paddle(ball.y, right_y, physics.paddle_height)
    {
        bounce_off_paddle(ball, right_y, physics, Side::Right);
        ball.x = right_plane - radius;
        return Some(Side::Right);
    }

    None
}

fn within_paddle(ball_y: f32, paddle_y: f32, paddle_height: f32) -> bool {
    ball_y >= paddle_y && ball_y <= paddle_y + paddle_height
}

fn bounce_off_paddle(ball: &mut Ball, paddle_y: f32, physics: &PhysicsConfig, side: Side) {
    // Send the ball back towards the other side, a little faster each hit
    let speed_x = ball.vx.abs() * (1.0 + physics.speed_increment);
    ball.vx = match side {
        Side::Left => speed_x,
        Side::Right => -speed_x,
    };

    // -1.0 = top tip, 0.0 = center, 1.0 = bottom tip
    let half = physics.paddle_height / 2.0;
    let hit_position = if half > 0.0 {
        ((ball.y - (paddle_y + half)) / half).clamp(-1.0, 1.0)
    } else {
        0.0
    };
    ball.vy = hit_position * physics.max_deflection_speed;

    cap_speed(ball, physics.max_ball_speed);
}

fn cap_speed(ball: &mut Ball, max_speed: f32) {
    let speed = ball.speed();
    if speed > max_speed && speed > 0.0 {
        let ratio = max_speed / speed;
        ball.vx *= ratio;
        ball.vy *= ratio;
    }
}

/// Re-serve from center court towards the side that won the point
fn serve<R: Rng + ?Sized>(ball: &mut Ball, physics: &PhysicsConfig, towards: Side, rng: &mut R) {
    let spread = physics.serve_vertical_spread;
    let vy = if spread > 0.0 {
        rng.gen_range(-spread..spread)
    } else {
        0.0
    };
    let vx = match towards {
        Side::Left => -physics.serve_speed,
        Side::Right => physics.serve_speed,
    };

    *ball = Ball::new(physics.field_width / 2.0, physics.field_height / 2.0, vx, vy);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Outcome, Role};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const FRAME_MS: f32 = 16.67;

    fn host_state(physics: &PhysicsConfig) -> SimulationState {
        SimulationState::new(Role::Host, physics)
    }

    #[test]
    fn test_motion_scales_with_elapsed_time() {
        let physics = PhysicsConfig::default();
        let mut rng = StdRng::seed_from_u64(1);

        let mut one = host_state(&physics);
        step(&mut one, &physics, FRAME_MS * 2.0, &mut rng);

        let mut two = host_state(&physics);
        step(&mut two, &physics, FRAME_MS, &mut rng);
        step(&mut two, &physics, FRAME_MS, &mut rng);

        assert!((one.ball.x - two.ball.x).abs() < 1e-3);
        assert!((one.ball.y - two.ball.y).abs() < 1e-3);
        assert!((one.ball.x - (400.0 - 10.0)).abs() < 1e-3);
    }

    #[test]
    fn test_non_positive_elapsed_time_does_nothing() {
        let physics = PhysicsConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = host_state(&physics);
        let before = state.clone();

        step(&mut state, &physics, 0.0, &mut rng);
        step(&mut state, &physics, -5.0, &mut rng);
        step(&mut state, &physics, f32::NAN, &mut rng);

        assert_eq!(state, before);
    }

    #[test]
    fn test_wall_reflects_and_clamps() {
        let physics = PhysicsConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = host_state(&physics);
        state.ball = Ball::new(400.0, 12.0, 0.0, -8.0);

        // Large step would tunnel far past the top wall without the clamp
        let events = step(&mut state, &physics, FRAME_MS * 5.0, &mut rng);

        assert!(events.wall_collision);
        assert_eq!(state.ball.y, physics.ball_radius);
        assert_eq!(state.ball.vy, 8.0);

        state.ball = Ball::new(400.0, 488.0, 0.0, 4.0);
        step(&mut state, &physics, FRAME_MS, &mut rng);
        assert_eq!(state.ball.y, physics.field_height - physics.ball_radius);
        assert_eq!(state.ball.vy, -4.0);
    }

    #[test]
    fn test_center_hit_reverses_and_speeds_up() {
        let physics = PhysicsConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = host_state(&physics);
        state.paddles.left = 200.0;
        // Ball center will land on the paddle center after one frame
        state.ball = Ball::new(30.0, 250.0, -6.0, 0.0);

        let events = step(&mut state, &physics, FRAME_MS, &mut rng);

        assert_eq!(events.paddle_hit, Some(Side::Left));
        assert!((state.ball.vx - 6.3).abs() < 1e-4);
        assert!(state.ball.vy.abs() < 1e-4);
        assert_eq!(state.ball.x, physics.paddle_width + physics.ball_radius);
    }

    #[test]
    fn test_hit_position_sets_vertical_angle() {
        let physics = PhysicsConfig::default();
        let mut rng = StdRng::seed_from_u64(1);

        // Near the top tip of the right paddle -> steep upward (negative y)
        let mut state = host_state(&physics);
        state.paddles.right = 100.0;
        state.ball = Ball::new(770.0, 105.0, 5.0, 0.0);
        step(&mut state, &physics, FRAME_MS, &mut rng);
        assert!(state.ball.vx < 0.0);
        assert!(state.ball.vy < -8.0);

        // Symmetric hit near the bottom tip -> steep downward
        let mut state = host_state(&physics);
        state.paddles.right = 100.0;
        state.ball = Ball::new(770.0, 195.0, 5.0, 0.0);
        step(&mut state, &physics, FRAME_MS, &mut rng);
        assert!(state.ball.vy > 8.0);

        // Quarter of the way down -> half deflection upward
        let mut state = host_state(&physics);
        state.paddles.right = 100.0;
        state.ball = Ball::new(770.0, 125.0, 5.0, 0.0);
        step(&mut state, &physics, FRAME_MS, &mut rng);
        assert!((state.ball.vy + 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_ball_moving_away_is_not_hit() {
        let physics = PhysicsConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = host_state(&physics);
        state.paddles.left = 200.0;
        state.ball = Ball::new(20.0, 250.0, 3.0, 0.0);

        let events = step(&mut state, &physics, FRAME_MS, &mut rng);

        assert_eq!(events.paddle_hit, None);
        assert_eq!(state.ball.vx, 3.0);
    }

    #[test]
    fn test_speed_never_exceeds_cap() {
        let physics = PhysicsConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = host_state(&physics);
        state.ball = Ball::new(400.0, 250.0, -14.0, 0.0);

        let mut hits = 0;
        for _ in 0..5000 {
            // Both paddles glued to the ball: it can never score
            let y = state.ball.y - physics.paddle_height / 2.0;
            state.paddles.left = y;
            state.paddles.right = y;

            let events = step(&mut state, &physics, FRAME_MS, &mut rng);
            if events.paddle_hit.is_some() {
                hits += 1;
            }
            assert!(state.ball.speed() <= physics.max_ball_speed + 1e-3);
        }

        assert!(hits > 20);
        assert_eq!(state.score.left + state.score.right, 0);
    }

    #[test]
    fn test_point_reserves_towards_scorer() {
        let physics = PhysicsConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = host_state(&physics);
        state.paddles.left = 0.0;
        state.ball = Ball::new(5.0, 450.0, -6.0, 0.0);

        let events = step(&mut state, &physics, FRAME_MS, &mut rng);

        assert_eq!(events.point_scored, Some(Side::Right));
        assert_eq!(state.score.right, 1);
        assert_eq!(state.ball.x, 400.0);
        assert_eq!(state.ball.y, 250.0);
        assert_eq!(state.ball.vx, physics.serve_speed);
        assert!(state.ball.vy >= -3.0 && state.ball.vy < 3.0);
    }

    #[test]
    fn test_winning_point_freezes_match() {
        let physics = PhysicsConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = host_state(&physics);
        state.score.left = 4;
        state.paddles.right = 0.0;
        state.ball = Ball::new(795.0, 450.0, 6.0, 0.0);

        let events = step(&mut state, &physics, FRAME_MS, &mut rng);
        assert_eq!(events.game_over, Some(Side::Left));
        assert_eq!(state.outcome, Outcome::Finished(Side::Left));

        let frozen = state.clone();
        for _ in 0..100 {
            assert_eq!(step(&mut state, &physics, FRAME_MS, &mut rng), PhysicsEvents::default());
        }
        assert_eq!(state, frozen);
        assert_eq!(state.score.left, 5);
    }

    #[test]
    fn test_same_seed_same_result() {
        let physics = PhysicsConfig::default();
        let run = || {
            let mut rng = StdRng::seed_from_u64(42);
            let mut state = host_state(&physics);
            state.paddles.left = 350.0;
            state.paddles.right = 20.0;
            for i in 0..3000 {
                let elapsed = FRAME_MS + (i % 7) as f32;
                step(&mut state, &physics, elapsed, &mut rng);
            }
            state
        };

        assert_eq!(run(), run());
    }
}
