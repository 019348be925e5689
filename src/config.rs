use bevy::prelude::*;
use serde::{Deserialize, Serialize};

// Kayak and river catalogs. These are read-only race configuration inputs;
// the simulation never mutates them.

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum KayakType {
    Racing,
    #[default]
    Balanced,
    Traditional,
}

pub struct KayakSpec {
    pub name: &'static str,
    /// Relative top speed in [0, 1].
    pub speed: f32,
    /// Scales turn rate.
    pub maneuverability: f32,
    /// Damage-resistance multiplier in [0, 1].
    pub durability: f32,
}

impl KayakType {
    pub fn spec(self) -> &'static KayakSpec {
        match self {
            KayakType::Racing => &KayakSpec {
                name: "Racing Kayak",
                speed: 0.9,
                maneuverability: 0.5,
                durability: 0.4,
            },
            KayakType::Balanced => &KayakSpec {
                name: "Balanced Kayak",
                speed: 0.7,
                maneuverability: 0.7,
                durability: 0.6,
            },
            KayakType::Traditional => &KayakSpec {
                name: "Traditional Kayak",
                speed: 0.5,
                maneuverability: 0.9,
                durability: 0.8,
            },
        }
    }

    pub fn all() -> [KayakType; 3] {
        [KayakType::Racing, KayakType::Balanced, KayakType::Traditional]
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum RiverType {
    #[default]
    Padma,
    Jamuna,
    Meghna,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CourseLength {
    Short,
    Medium,
    Long,
}

impl CourseLength {
    pub fn segment_count(self) -> usize {
        match self {
            CourseLength::Short => 20,
            CourseLength::Medium => 30,
            CourseLength::Long => 40,
        }
    }
}

pub struct RiverSpec {
    pub name: &'static str,
    pub difficulty: u8,
    pub length: CourseLength,
    pub width: f32,
    pub current_variation: f32,
    pub obstacle_frequency: f32,
}

impl RiverType {
    pub fn spec(self) -> &'static RiverSpec {
        match self {
            RiverType::Padma => &RiverSpec {
                name: "Padma River",
                difficulty: 1,
                length: CourseLength::Medium,
                width: 300.0,
                current_variation: 0.2,
                obstacle_frequency: 0.3,
            },
            RiverType::Jamuna => &RiverSpec {
                name: "Jamuna River",
                difficulty: 2,
                length: CourseLength::Short,
                width: 250.0,
                current_variation: 0.3,
                obstacle_frequency: 0.5,
            },
            RiverType::Meghna => &RiverSpec {
                name: "Meghna River",
                difficulty: 3,
                length: CourseLength::Long,
                width: 280.0,
                current_variation: 0.5,
                obstacle_frequency: 0.7,
            },
        }
    }

    /// AI opponents on harder rivers correct course more aggressively.
    pub fn ai_difficulty(self) -> f32 {
        0.6 + 0.1 * self.spec().difficulty as f32
    }
}

#[derive(Resource, Default)]
pub struct SelectedKayak(pub Option<KayakType>);

#[derive(Resource, Default)]
pub struct SelectedRiver(pub Option<RiverType>);

#[derive(Resource, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GameMode {
    #[default]
    SinglePlayer,
    Multiplayer,
}
