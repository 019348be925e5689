use bevy::prelude::*;
use std::f32::consts::FRAC_PI_2;

use crate::game_logic::{
    BANK_MARGIN, Hull, Orientation, PaddleRhythm, PLAYFIELD_WIDTH, WATER_RESISTANCE,
};

/// Alternating strokes this close together earn the rhythm bonus (exclusive bounds).
pub const RHYTHM_WINDOW_MS: (f64, f64) = (300., 500.);
pub const RHYTHM_BONUS: f32 = 1.5;
/// First stroke, or repeated strokes on the same side.
pub const COLD_START_FACTOR: f32 = 0.7;
/// Speed floors applied before and after the stroke impulse.
pub const PRE_STROKE_FLOOR: f32 = 0.1;
pub const POST_STROKE_FLOOR: f32 = 0.2;
/// Angle decay per tick while the balance hold is active.
pub const BALANCE_DAMPING: f32 = 0.9;
/// Per-tick speed amplification while boosting. Deliberately not reclamped
/// against the hull's max speed: sustained boost can exceed normal top speed.
pub const BOOST_FACTOR: f32 = 1.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaddleSide {
    Left,
    Right,
}

/// Continuous hold states, normalized from whatever input source drives them.
#[derive(Resource, Default, Clone, Copy)]
pub struct HeldControls {
    pub balance: bool,
    pub boost: bool,
}

/// Apply one discrete paddle stroke. Event-driven: called once per stroke,
/// not per tick. `now_ms` is game time in milliseconds.
pub fn apply_stroke(
    side: PaddleSide,
    now_ms: f64,
    hull: &Hull,
    speed: &mut f32,
    orientation: &mut Orientation,
    rhythm: &mut PaddleRhythm,
) {
    if *speed < PRE_STROKE_FLOOR {
        *speed = PRE_STROKE_FLOOR;
    }

    let opposite = match side {
        PaddleSide::Left => rhythm.last_right_ms,
        PaddleSide::Right => rhythm.last_left_ms,
    };

    match opposite {
        Some(prev) => {
            let delta = now_ms - prev;
            if delta > RHYTHM_WINDOW_MS.0 && delta < RHYTHM_WINDOW_MS.1 {
                rhythm.optimal = true;
                *speed += hull.paddle_strength * RHYTHM_BONUS;
            } else {
                rhythm.optimal = false;
                *speed += hull.paddle_strength;
            }
        }
        None => {
            rhythm.optimal = false;
            *speed += hull.paddle_strength * COLD_START_FACTOR;
        }
    }

    if *speed < POST_STROKE_FLOOR {
        *speed = POST_STROKE_FLOOR;
    }

    match side {
        PaddleSide::Left => {
            rhythm.last_left_ms = Some(now_ms);
            orientation.angle += hull.turn_rate;
        }
        PaddleSide::Right => {
            rhythm.last_right_ms = Some(now_ms);
            orientation.angle -= hull.turn_rate;
        }
    }

    orientation.angle = orientation.angle.clamp(-FRAC_PI_2, FRAC_PI_2);
    *speed = speed.clamp(0., hull.max_speed);
}

/// Advance one racer by one fixed tick: water resistance, balance/boost holds,
/// then displacement along the heading. The y axis is the progress axis and is
/// never clamped; x is kept inside the banks.
pub fn integrate_tick(
    position: &mut Vec2,
    speed: &mut f32,
    orientation: &mut Orientation,
    holds: HeldControls,
) {
    *speed *= WATER_RESISTANCE;

    if holds.balance {
        orientation.angle *= BALANCE_DAMPING;
    }
    if holds.boost {
        *speed *= BOOST_FACTOR;
    }

    let dx = orientation.angle.sin() * *speed;
    let dy = -orientation.angle.cos() * *speed;
    position.x = (position.x + dx).clamp(BANK_MARGIN, PLAYFIELD_WIDTH - BANK_MARGIN);
    position.y += dy;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KayakType;

    fn test_hull() -> Hull {
        Hull::from_kayak(KayakType::Balanced)
    }

    fn stroke(side: PaddleSide, at_ms: f64, speed: &mut f32, o: &mut Orientation, r: &mut PaddleRhythm) {
        apply_stroke(side, at_ms, &test_hull(), speed, o, r);
    }

    #[test]
    fn test_alternating_strokes_in_window_earn_bonus() {
        let hull = test_hull();
        let mut speed = 1.0;
        let mut orientation = Orientation::new(0.);
        let mut rhythm = PaddleRhythm::default();

        stroke(PaddleSide::Left, 0., &mut speed, &mut orientation, &mut rhythm);
        assert!(!rhythm.optimal);

        let before = speed;
        stroke(PaddleSide::Right, 400., &mut speed, &mut orientation, &mut rhythm);
        assert!(rhythm.optimal);
        assert!((speed - (before + hull.paddle_strength * RHYTHM_BONUS)).abs() < 1e-5);
    }

    #[test]
    fn test_strokes_outside_window_get_base_power() {
        for delta in [250., 600.] {
            let mut speed = 1.0;
            let mut orientation = Orientation::new(0.);
            let mut rhythm = PaddleRhythm::default();

            stroke(PaddleSide::Left, 0., &mut speed, &mut orientation, &mut rhythm);
            let before = speed;
            stroke(PaddleSide::Right, delta, &mut speed, &mut orientation, &mut rhythm);
            assert!(!rhythm.optimal, "delta {delta} should not be optimal");
            assert!((speed - (before + test_hull().paddle_strength)).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cold_start_stroke_is_reduced_and_floored() {
        let mut speed = 0.0;
        let mut orientation = Orientation::new(0.);
        let mut rhythm = PaddleRhythm::default();

        stroke(PaddleSide::Left, 0., &mut speed, &mut orientation, &mut rhythm);
        let expected = PRE_STROKE_FLOOR + test_hull().paddle_strength * COLD_START_FACTOR;
        assert!((speed - expected.max(POST_STROKE_FLOOR)).abs() < 1e-5);
        assert!(speed >= POST_STROKE_FLOOR);
    }

    #[test]
    fn test_same_side_repeat_turns_without_bonus() {
        let mut speed = 1.0;
        let mut orientation = Orientation::new(0.);
        let mut rhythm = PaddleRhythm::default();

        stroke(PaddleSide::Left, 0., &mut speed, &mut orientation, &mut rhythm);
        stroke(PaddleSide::Left, 400., &mut speed, &mut orientation, &mut rhythm);
        assert!(!rhythm.optimal);
        assert!(orientation.angle > 0.);
    }

    #[test]
    fn test_stroke_clamps_speed_and_angle() {
        let hull = test_hull();
        let mut speed = hull.max_speed;
        let mut orientation = Orientation::new(FRAC_PI_2);
        let mut rhythm = PaddleRhythm::default();

        for i in 0..20 {
            stroke(PaddleSide::Left, i as f64 * 400., &mut speed, &mut orientation, &mut rhythm);
            assert!(speed <= hull.max_speed);
            assert!(orientation.angle <= FRAC_PI_2 && orientation.angle >= -FRAC_PI_2);
        }
    }

    #[test]
    fn test_integration_moves_upstream_and_decays() {
        let mut position = Vec2::new(240., 700.);
        let mut speed = 2.0;
        let mut orientation = Orientation::new(0.);

        integrate_tick(&mut position, &mut speed, &mut orientation, HeldControls::default());
        assert!(position.y < 700.);
        assert!(speed < 2.0);
    }

    #[test]
    fn test_integration_clamps_to_banks() {
        let mut position = Vec2::new(BANK_MARGIN + 1., 700.);
        let mut speed = 5.0;
        let mut orientation = Orientation::new(-FRAC_PI_2);

        for _ in 0..10 {
            integrate_tick(&mut position, &mut speed, &mut orientation, HeldControls::default());
        }
        assert_eq!(position.x, BANK_MARGIN);
    }

    #[test]
    fn test_balance_hold_straightens_kayak() {
        let mut position = Vec2::new(240., 700.);
        let mut speed = 1.0;
        let mut orientation = Orientation::new(1.0);
        let holds = HeldControls { balance: true, boost: false };

        integrate_tick(&mut position, &mut speed, &mut orientation, holds);
        assert!((orientation.angle - BALANCE_DAMPING).abs() < 1e-6);
    }

    #[test]
    fn test_boost_can_exceed_hull_top_speed() {
        let hull = test_hull();
        let mut position = Vec2::new(240., 700.);
        let mut speed = hull.max_speed;
        let mut orientation = Orientation::new(0.);
        let holds = HeldControls { balance: false, boost: true };

        for _ in 0..20 {
            integrate_tick(&mut position, &mut speed, &mut orientation, holds);
        }
        assert!(speed > hull.max_speed);
    }
}
