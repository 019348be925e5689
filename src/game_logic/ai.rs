use bevy::prelude::*;
use rand::Rng;
use std::f32::consts::FRAC_PI_2;

use crate::game_logic::physics::{integrate_tick, HeldControls};
use crate::game_logic::{
    AiControlled, Hull, Lane, LANE_WIDTH, Orientation, RaceProgress, Speed,
};

/// Baseline seconds between AI strokes; the jitter term shrinks as
/// difficulty rises, so harder AIs correct course more often.
pub const AI_STROKE_PERIOD: f32 = 0.33;
pub const AI_STROKE_JITTER: f32 = 0.35;
/// Drift tolerance around the lane center, as a fraction of the lane width.
const LANE_BAND: f32 = 0.2;
/// Beyond this heading the AI considers straightening up.
const CORRECTION_ANGLE: f32 = 0.2;
const ANGLE_CORRECTION_FACTOR: f32 = 0.8;

/// Stroke cadence state for one AI racer. The timer is continuous (seconds),
/// so even a maximum-difficulty AI fires at most one stroke per tick.
#[derive(Component)]
pub struct AiPaddler {
    pub stroke_timer: f32,
    /// In [0, 1]; higher means tighter lane keeping and steadier heading.
    pub difficulty: f32,
}

impl AiPaddler {
    pub fn new(difficulty: f32) -> Self {
        Self {
            stroke_timer: 0.,
            difficulty: difficulty.clamp(0., 1.),
        }
    }

    fn reset_timer(&mut self, rng: &mut impl Rng) {
        self.stroke_timer =
            AI_STROKE_PERIOD + rng.random::<f32>() * AI_STROKE_JITTER * (1. - self.difficulty);
    }
}

/// Decide which side an AI paddles: correct toward the lane center when
/// drifted outside the tolerance band, otherwise alternate randomly.
pub fn choose_stroke_side(x: f32, lane: Lane, rng: &mut impl Rng) -> StrokeChoice {
    let center = lane.center_x();
    if x < center - LANE_BAND * LANE_WIDTH {
        StrokeChoice::Left
    } else if x > center + LANE_BAND * LANE_WIDTH {
        StrokeChoice::Right
    } else if rng.random_bool(0.5) {
        StrokeChoice::Left
    } else {
        StrokeChoice::Right
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrokeChoice {
    Left,
    Right,
}

/// Tick step 3: advance every AI racer. Strokes bypass the rhythm-bonus
/// timing check (base paddle strength only) and AI speed never drops below a
/// small positive floor.
pub fn drive_ai(
    time: Res<Time>,
    mut racers: Query<
        (
            &mut Transform,
            &Hull,
            &Lane,
            &mut Speed,
            &mut Orientation,
            &mut AiPaddler,
            &RaceProgress,
        ),
        With<AiControlled>,
    >,
) {
    let delta = time.delta_secs();
    let mut rng = rand::rng();

    for (mut transform, hull, lane, mut speed, mut orientation, mut paddler, progress) in
        racers.iter_mut()
    {
        if progress.finished {
            continue;
        }

        paddler.stroke_timer -= delta;
        if paddler.stroke_timer <= 0. {
            let side = choose_stroke_side(transform.translation.x, *lane, &mut rng);

            speed.0 += hull.paddle_strength;
            if speed.0 < 0.2 {
                speed.0 = 0.2 + rng.random::<f32>() * 0.3;
            }
            speed.0 = speed.0.min(hull.max_speed);

            match side {
                StrokeChoice::Left => orientation.angle += hull.turn_rate,
                StrokeChoice::Right => orientation.angle -= hull.turn_rate,
            }
            orientation.angle = orientation.angle.clamp(-FRAC_PI_2, FRAC_PI_2);

            paddler.reset_timer(&mut rng);
        }

        // Self-correction: harder AIs straighten up more reliably.
        if orientation.angle.abs() > CORRECTION_ANGLE
            && rng.random::<f32>() < paddler.difficulty
        {
            orientation.angle *= ANGLE_CORRECTION_FACTOR;
        }

        let mut position = transform.translation.truncate();
        integrate_tick(
            &mut position,
            &mut speed.0,
            &mut orientation,
            HeldControls::default(),
        );
        transform.translation.x = position.x;
        transform.translation.y = position.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_drifted_left_corrects_with_left_stroke() {
        let mut rng = StdRng::seed_from_u64(1);
        let lane = Lane(2);
        // Lane 2 center is 180; far left of the band.
        assert_eq!(choose_stroke_side(100., lane, &mut rng), StrokeChoice::Left);
        assert_eq!(choose_stroke_side(260., lane, &mut rng), StrokeChoice::Right);
    }

    #[test]
    fn test_centered_racer_alternates_randomly() {
        let mut rng = StdRng::seed_from_u64(7);
        let lane = Lane(2);
        let choices: Vec<StrokeChoice> = (0..50)
            .map(|_| choose_stroke_side(lane.center_x(), lane, &mut rng))
            .collect();
        assert!(choices.contains(&StrokeChoice::Left));
        assert!(choices.contains(&StrokeChoice::Right));
    }

    #[test]
    fn test_timer_reset_shrinks_with_difficulty() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut easy = AiPaddler::new(0.);
        let mut hard = AiPaddler::new(1.);

        easy.reset_timer(&mut rng);
        hard.reset_timer(&mut rng);

        assert!(easy.stroke_timer >= AI_STROKE_PERIOD);
        assert!(easy.stroke_timer <= AI_STROKE_PERIOD + AI_STROKE_JITTER);
        // At difficulty 1 the jitter vanishes entirely.
        assert_eq!(hard.stroke_timer, AI_STROKE_PERIOD);
    }

    #[test]
    fn test_difficulty_is_clamped() {
        assert_eq!(AiPaddler::new(3.).difficulty, 1.);
        assert_eq!(AiPaddler::new(-1.).difficulty, 0.);
    }
}
