use bevy::prelude::*;

use crate::config::KayakType;

pub mod ai;
pub mod collision;
pub mod course;
pub mod physics;
pub mod progress;

pub use physics::PaddleSide;

// Playfield constants
pub const PLAYFIELD_WIDTH: f32 = 480.;
pub const PLAYFIELD_HEIGHT: f32 = 800.;
/// Horizontal clearance a kayak keeps from the playfield edge.
pub const BANK_MARGIN: f32 = 20.;
/// Longitudinal distance between river segments.
pub const SEGMENT_SPACING: f32 = PLAYFIELD_HEIGHT / 10.;
/// Racers start at y = START_OFFSET and paddle toward negative y.
pub const START_OFFSET: f32 = PLAYFIELD_HEIGHT - 100.;

// Kayak hitbox (collision boxes are never rotated)
pub const KAYAK_WIDTH: f32 = 30.;
pub const KAYAK_HEIGHT: f32 = 60.;

// Physics constants
pub const PADDLE_POWER: f32 = 0.5;
pub const WATER_RESISTANCE: f32 = 0.98;
pub const TURN_RATE: f32 = 0.05;
pub const BASE_MAX_SPEED: f32 = 5.;

pub const LANE_COUNT: u8 = 4;
pub const LANE_WIDTH: f32 = PLAYFIELD_WIDTH / LANE_COUNT as f32;

// Racer components

#[derive(Component)]
pub struct Kayak;

#[derive(Component)]
pub struct PlayerControlled;

#[derive(Component)]
pub struct AiControlled;

/// Kinematic stats derived from the chosen kayak.
#[derive(Component, Clone, Copy)]
pub struct Hull {
    pub max_speed: f32,
    pub turn_rate: f32,
    pub paddle_strength: f32,
    pub durability: f32,
}

impl Hull {
    pub fn from_kayak(kayak: KayakType) -> Self {
        let spec = kayak.spec();
        Self {
            max_speed: BASE_MAX_SPEED * spec.speed,
            turn_rate: TURN_RATE * spec.maneuverability,
            paddle_strength: PADDLE_POWER * spec.speed,
            durability: spec.durability,
        }
    }
}

#[derive(Component)]
pub struct Orientation {
    /// Radians, clamped to [-PI/2, PI/2]. Zero points upstream.
    pub angle: f32,
}

impl Orientation {
    pub fn new(angle: f32) -> Self {
        Self { angle }
    }
}

#[derive(Component, Deref, DerefMut)]
pub struct Speed(pub f32);

#[derive(Component, Clone, Copy)]
pub struct Lane(pub u8);

impl Lane {
    pub fn center_x(self) -> f32 {
        (self.0 as f32 - 0.5) * LANE_WIDTH
    }
}

#[derive(Component)]
pub struct RacerName(pub String);

#[derive(Component, Default)]
pub struct RaceProgress {
    /// Percent of the course completed, clamped to [0, 100].
    pub percent: f32,
    pub finished: bool,
    /// Milliseconds from race start. Write-once.
    pub finish_ms: Option<u64>,
}

/// Timestamps of the most recent stroke per side, for the rhythm bonus.
#[derive(Component, Default)]
pub struct PaddleRhythm {
    pub last_left_ms: Option<f64>,
    pub last_right_ms: Option<f64>,
    pub optimal: bool,
}
