use bevy::prelude::*;
use rand::Rng;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use crate::game_logic::course::{Course, ObstacleKind};
use crate::game_logic::progress::RaceSession;
use crate::game_logic::{
    Hull, Kayak, KAYAK_HEIGHT, KAYAK_WIDTH, Orientation, RaceProgress, RacerName, Speed,
};

/// Centered axis-aligned box overlap. Rotation is cosmetic and ignored here.
pub fn aabb_overlap(a_center: Vec2, a_size: Vec2, b_center: Vec2, b_size: Vec2) -> bool {
    let delta = a_center - b_center;
    delta.x.abs() < (a_size.x + b_size.x) / 2. && delta.y.abs() < (a_size.y + b_size.y) / 2.
}

/// Apply a hazard's effect to a racer's kinematic state. Returns true for a
/// finish-line crossing, which the caller records. Hazards are re-applied on
/// every overlapping tick; only the finish line is idempotent.
pub fn apply_hazard_effect(
    kind: ObstacleKind,
    durability: f32,
    speed: &mut f32,
    orientation: &mut Orientation,
    rng: &mut impl Rng,
) -> bool {
    match kind {
        ObstacleKind::Rock => {
            *speed *= 0.3 + 0.4 * durability;
            orientation.angle += rng.random_range(-0.25..0.25);
        }
        ObstacleKind::Debris => {
            *speed *= 0.6 + 0.3 * durability;
            orientation.angle += rng.random_range(-0.1..0.1);
        }
        ObstacleKind::Whirlpool => {
            orientation.angle += FRAC_PI_4;
            *speed *= 0.8;
        }
        ObstacleKind::FinishLine => return true,
    }
    orientation.angle = orientation.angle.clamp(-FRAC_PI_2, FRAC_PI_2);
    false
}

/// Tick step 4: test every racer against every obstacle and apply effects.
pub fn resolve_collisions(
    course: Res<Course>,
    mut session: ResMut<RaceSession>,
    mut racers: Query<
        (
            Entity,
            &Transform,
            &Hull,
            &mut Speed,
            &mut Orientation,
            &mut RaceProgress,
            &RacerName,
        ),
        With<Kayak>,
    >,
) {
    let mut rng = rand::rng();
    let kayak_size = Vec2::new(KAYAK_WIDTH, KAYAK_HEIGHT);

    for (entity, transform, hull, mut speed, mut orientation, mut progress, name) in
        racers.iter_mut()
    {
        let position = transform.translation.truncate();
        for obstacle in &course.obstacles {
            if !aabb_overlap(position, kayak_size, obstacle.position, obstacle.size) {
                continue;
            }

            let crossed_finish = apply_hazard_effect(
                obstacle.kind,
                hull.durability,
                &mut speed.0,
                &mut orientation,
                &mut rng,
            );

            if crossed_finish && !progress.finished {
                let finish_ms = session.record_finish(entity);
                progress.finished = true;
                progress.finish_ms = Some(finish_ms);
                info!("{} crossed the finish line at {} ms", name.0, finish_ms);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_overlap_uses_centered_boxes() {
        let kayak = Vec2::new(KAYAK_WIDTH, KAYAK_HEIGHT);
        let rock = Vec2::new(40., 40.);
        assert!(aabb_overlap(Vec2::new(100., 100.), kayak, Vec2::new(130., 100.), rock));
        assert!(!aabb_overlap(Vec2::new(100., 100.), kayak, Vec2::new(200., 100.), rock));
        // Touching edges do not count as overlap.
        assert!(!aabb_overlap(Vec2::new(100., 100.), kayak, Vec2::new(135., 100.), rock));
    }

    #[test]
    fn test_rock_hits_fragile_kayaks_harder() {
        let mut rng = StdRng::seed_from_u64(1);

        let mut fragile = 4.0;
        let mut sturdy = 4.0;
        let mut orientation = Orientation::new(0.);
        apply_hazard_effect(ObstacleKind::Rock, 0.4, &mut fragile, &mut orientation, &mut rng);
        apply_hazard_effect(ObstacleKind::Rock, 0.8, &mut sturdy, &mut orientation, &mut rng);

        assert!((fragile - 4.0 * (0.3 + 0.4 * 0.4)).abs() < 1e-5);
        assert!((sturdy - 4.0 * (0.3 + 0.4 * 0.8)).abs() < 1e-5);
        assert!(sturdy > fragile);
    }

    #[test]
    fn test_whirlpool_spins_and_slows() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut speed = 2.0;
        let mut orientation = Orientation::new(0.);

        apply_hazard_effect(ObstacleKind::Whirlpool, 0.5, &mut speed, &mut orientation, &mut rng);
        assert!((orientation.angle - FRAC_PI_4).abs() < 1e-6);
        assert!((speed - 1.6).abs() < 1e-6);
    }

    #[test]
    fn test_hazard_deflection_keeps_angle_clamped() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut speed = 3.0;
        let mut orientation = Orientation::new(FRAC_PI_2);

        for _ in 0..50 {
            apply_hazard_effect(ObstacleKind::Whirlpool, 0.5, &mut speed, &mut orientation, &mut rng);
            assert!(orientation.angle >= -FRAC_PI_2 && orientation.angle <= FRAC_PI_2);
        }
    }

    #[test]
    fn test_finish_line_effect_touches_nothing_else() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut speed = 2.5;
        let mut orientation = Orientation::new(0.3);

        let crossed =
            apply_hazard_effect(ObstacleKind::FinishLine, 0.5, &mut speed, &mut orientation, &mut rng);
        assert!(crossed);
        assert_eq!(speed, 2.5);
        assert_eq!(orientation.angle, 0.3);
    }
}
