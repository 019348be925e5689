use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

use crate::config::RiverSpec;
use crate::game_logic::{PLAYFIELD_WIDTH, SEGMENT_SPACING, START_OFFSET};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObstacleKind {
    Rock,
    Debris,
    Whirlpool,
    FinishLine,
}

impl ObstacleKind {
    pub fn dimensions(self) -> Vec2 {
        match self {
            ObstacleKind::Rock => Vec2::new(40., 40.),
            ObstacleKind::Debris => Vec2::new(30., 20.),
            ObstacleKind::Whirlpool => Vec2::new(50., 50.),
            ObstacleKind::FinishLine => Vec2::new(PLAYFIELD_WIDTH, 20.),
        }
    }
}

/// A static hazard or the finish line. Never removed or moved during a race.
#[derive(Clone, Debug)]
pub struct Obstacle {
    pub kind: ObstacleKind,
    pub position: Vec2,
    pub size: Vec2,
    /// Cosmetic only; collision boxes stay axis-aligned.
    pub rotation: f32,
}

#[derive(Clone, Debug)]
pub struct RiverSegment {
    pub width: f32,
    pub curve: f32,
    pub fast_current: bool,
    pub y: f32,
}

/// Immutable race course: segments plus the obstacle set, fixed for the
/// duration of one race.
#[derive(Resource)]
pub struct Course {
    pub segments: Vec<RiverSegment>,
    pub obstacles: Vec<Obstacle>,
    pub total_length: f32,
    pub seed: u64,
}

impl Course {
    /// Map a racer's y coordinate to completion percent in [0, 100].
    pub fn progress_percent(&self, y: f32) -> f32 {
        ((START_OFFSET - y) / self.total_length * 100.).clamp(0., 100.)
    }

    /// Inverse of `progress_percent`, used to place remote shadows.
    pub fn y_for_progress(&self, percent: f32) -> f32 {
        START_OFFSET - percent.clamp(0., 100.) / 100. * self.total_length
    }
}

const FAST_CURRENT_CHANCE: f64 = 0.3;

/// Generate the river layout for one race. Deterministic per seed.
pub fn generate_course(river: &RiverSpec, seed: u64) -> Course {
    let mut rng = StdRng::seed_from_u64(seed);
    let segment_count = river.length.segment_count();

    let mut segments = Vec::with_capacity(segment_count);
    let mut obstacles = Vec::new();

    for i in 0..segment_count {
        let y = -(i as f32) * SEGMENT_SPACING;
        let width = river.width
            * (1. - river.current_variation / 2.
                + rng.random::<f32>() * river.current_variation);
        let curve = (rng.random::<f32>() - 0.5) * 0.2 * river.current_variation;

        segments.push(RiverSegment {
            width,
            curve,
            fast_current: rng.random_bool(FAST_CURRENT_CHANCE),
            y,
        });

        if rng.random_bool(river.obstacle_frequency.clamp(0., 1.) as f64) {
            // 60% debris, 32% rock, 8% whirlpool
            let kind = if rng.random::<f32>() < 0.6 {
                ObstacleKind::Debris
            } else if rng.random::<f32>() < 0.8 {
                ObstacleKind::Rock
            } else {
                ObstacleKind::Whirlpool
            };

            obstacles.push(Obstacle {
                kind,
                position: Vec2::new(
                    PLAYFIELD_WIDTH * (0.2 + rng.random::<f32>() * 0.6),
                    y - rng.random::<f32>() * SEGMENT_SPACING,
                ),
                size: kind.dimensions(),
                rotation: rng.random::<f32>() * PI * 2.,
            });
        }
    }

    // Finish line spans the full width, past the last segment.
    let finish_y = -(segment_count as f32) * SEGMENT_SPACING - 100.;
    obstacles.push(Obstacle {
        kind: ObstacleKind::FinishLine,
        position: Vec2::new(PLAYFIELD_WIDTH / 2., finish_y),
        size: ObstacleKind::FinishLine.dimensions(),
        rotation: 0.,
    });

    Course {
        segments,
        obstacles,
        total_length: segment_count as f32 * SEGMENT_SPACING + 100.,
        seed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CourseLength, RiverType};

    fn river_with_frequency(frequency: f32) -> RiverSpec {
        RiverSpec {
            name: "Test River",
            difficulty: 1,
            length: CourseLength::Short,
            width: 300.,
            current_variation: 0.2,
            obstacle_frequency: frequency,
        }
    }

    fn hazard_count(course: &Course) -> usize {
        course
            .obstacles
            .iter()
            .filter(|o| o.kind != ObstacleKind::FinishLine)
            .count()
    }

    #[test]
    fn test_zero_frequency_yields_only_finish_line() {
        let course = generate_course(&river_with_frequency(0.), 7);
        assert_eq!(hazard_count(&course), 0);
        assert_eq!(course.obstacles.len(), 1);
        assert_eq!(course.obstacles.last().unwrap().kind, ObstacleKind::FinishLine);
    }

    #[test]
    fn test_full_frequency_yields_one_hazard_per_segment() {
        // Short course: 20 segments, so 20 hazards plus the finish line.
        let course = generate_course(&river_with_frequency(1.), 7);
        assert_eq!(course.segments.len(), 20);
        assert_eq!(hazard_count(&course), 20);
        assert_eq!(course.obstacles.len(), 21);
    }

    #[test]
    fn test_generation_is_deterministic_per_seed() {
        let river = RiverType::Meghna.spec();
        let a = generate_course(river, 42);
        let b = generate_course(river, 42);
        let c = generate_course(river, 43);

        assert_eq!(a.obstacles.len(), b.obstacles.len());
        for (oa, ob) in a.obstacles.iter().zip(&b.obstacles) {
            assert_eq!(oa.kind, ob.kind);
            assert_eq!(oa.position, ob.position);
        }
        // A different seed almost surely shifts at least one obstacle.
        let same = a.obstacles.len() == c.obstacles.len()
            && a.obstacles
                .iter()
                .zip(&c.obstacles)
                .all(|(oa, oc)| oa.position == oc.position);
        assert!(!same);
    }

    #[test]
    fn test_hazards_stay_inside_central_band() {
        let course = generate_course(&river_with_frequency(1.), 99);
        for obstacle in &course.obstacles {
            if obstacle.kind == ObstacleKind::FinishLine {
                continue;
            }
            assert!(obstacle.position.x >= PLAYFIELD_WIDTH * 0.2);
            assert!(obstacle.position.x <= PLAYFIELD_WIDTH * 0.8);
        }
    }

    #[test]
    fn test_segment_width_jitter_stays_in_band() {
        let river = river_with_frequency(0.5);
        let course = generate_course(&river, 3);
        let (lo, hi) = (
            river.width * (1. - river.current_variation / 2.),
            river.width * (1. + river.current_variation / 2.),
        );
        for segment in &course.segments {
            assert!(segment.width >= lo && segment.width <= hi);
        }
    }

    #[test]
    fn test_progress_mapping_round_trips() {
        let course = generate_course(RiverType::Padma.spec(), 1);
        assert_eq!(course.progress_percent(START_OFFSET), 0.);
        assert_eq!(course.progress_percent(-10_000.), 100.);
        let y = course.y_for_progress(42.);
        assert!((course.progress_percent(y) - 42.).abs() < 1e-3);
    }
}
