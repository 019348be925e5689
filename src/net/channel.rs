use serde::{Deserialize, Serialize};

use crate::config::{KayakType, RiverType};
use crate::net::NetError;

pub const MAX_ROOM_OCCUPANCY: u32 = 4;

/// Connection lifecycle, in order. A channel only moves forward through these
/// except on disconnect, which resets to the start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelPhase {
    Disconnected,
    ConnectingToHub,
    ConnectedToHub,
    InLobby,
    InRoom,
}

/// Application-level message raised by one racer and fanned out to every
/// other actor in the room. All `PlayerUpdate` fields are optional so a
/// sender can publish only what changed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum PeerEvent {
    PlayerJoined {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kayak: Option<KayakType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        river: Option<RiverType>,
    },
    PlayerLeft,
    PlayerUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kayak: Option<KayakType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        river: Option<RiverType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        angle: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finished: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_ms: Option<u64>,
    },
    GameStart {
        river: RiverType,
    },
    PlayerFinished {
        finish_ms: u64,
    },
    Chat {
        message: String,
    },
}

impl PeerEvent {
    /// Stable numeric code for logging and wire-level dispatch.
    pub fn code(&self) -> u8 {
        match self {
            PeerEvent::PlayerJoined { .. } => 1,
            PeerEvent::PlayerLeft => 2,
            PeerEvent::PlayerUpdate { .. } => 3,
            PeerEvent::GameStart { .. } => 4,
            PeerEvent::PlayerFinished { .. } => 5,
            PeerEvent::Chat { .. } => 6,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RoomDescriptor {
    pub code: String,
    pub occupancy: u32,
    pub max_occupancy: u32,
    /// Actor id of the room master, who alone may start the race.
    pub master_id: u64,
}

impl RoomDescriptor {
    /// Descriptor for a room the hub never described: the local actor alone.
    pub fn solo(code: &str, self_id: u64) -> Self {
        Self {
            code: code.to_string(),
            occupancy: 1,
            max_occupancy: MAX_ROOM_OCCUPANCY,
            master_id: self_id,
        }
    }
}

/// Everything a channel reports back to the game, drained once per frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelNotice {
    PhaseChanged(ChannelPhase),
    RoomList(Vec<RoomDescriptor>),
    ActorJoined(u64),
    ActorLeft(u64),
    RoomEntered { descriptor: Option<RoomDescriptor> },
    Event { sender: u64, event: PeerEvent },
    Fault(String),
}

/// Transport seam. The relay client and the offline fallback both implement
/// this, so the sync systems never know which one they are driving.
pub trait PeerChannel: Send + Sync {
    fn connect(&mut self, region: &str) -> Result<(), NetError>;
    fn join_lobby(&mut self) -> Result<(), NetError>;
    fn create_room(&mut self, code: &str) -> Result<(), NetError>;
    fn join_room(&mut self, code: &str) -> Result<(), NetError>;
    fn leave_room(&mut self) -> Result<(), NetError>;
    fn raise_event(&mut self, event: &PeerEvent) -> Result<(), NetError>;
    fn self_id(&self) -> u64;
    fn drain_notices(&mut self) -> Vec<ChannelNotice>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_update_decodes_with_missing_fields() {
        let json = r#"{"type":"PlayerUpdate","progress":42.5,"x":180.0}"#;
        let event: PeerEvent = serde_json::from_str(json).unwrap();

        match event {
            PeerEvent::PlayerUpdate {
                name,
                x,
                y,
                progress,
                finished,
                ..
            } => {
                assert_eq!(progress, Some(42.5));
                assert_eq!(x, Some(180.0));
                assert_eq!(y, None);
                assert_eq!(name, None);
                assert_eq!(finished, None);
            }
            other => panic!("decoded wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_partial_update_omits_absent_fields_on_encode() {
        let event = PeerEvent::PlayerUpdate {
            name: None,
            kayak: None,
            river: None,
            x: None,
            y: Some(312.0),
            angle: None,
            progress: Some(10.0),
            finished: None,
            finish_ms: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"y\""));
        assert!(json.contains("\"progress\""));
        assert!(!json.contains("\"name\""));
        assert!(!json.contains("\"angle\""));
    }

    #[test]
    fn test_event_codes_are_stable() {
        let update = PeerEvent::PlayerUpdate {
            name: None,
            kayak: None,
            river: None,
            x: None,
            y: None,
            angle: None,
            progress: None,
            finished: None,
            finish_ms: None,
        };
        assert_eq!(
            PeerEvent::PlayerJoined {
                name: None,
                kayak: None,
                river: None
            }
            .code(),
            1
        );
        assert_eq!(PeerEvent::PlayerLeft.code(), 2);
        assert_eq!(update.code(), 3);
        assert_eq!(
            PeerEvent::GameStart {
                river: RiverType::Padma
            }
            .code(),
            4
        );
        assert_eq!(PeerEvent::PlayerFinished { finish_ms: 0 }.code(), 5);
        assert_eq!(
            PeerEvent::Chat {
                message: String::new()
            }
            .code(),
            6
        );
    }

    #[test]
    fn test_game_start_round_trips_with_river() {
        let event = PeerEvent::GameStart {
            river: RiverType::Meghna,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(serde_json::from_str::<PeerEvent>(&json).unwrap(), event);
    }
}
