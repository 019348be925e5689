use rand::Rng;

use crate::config::KayakType;
use crate::net::channel::{ChannelNotice, ChannelPhase, PeerChannel, PeerEvent, RoomDescriptor};
use crate::net::NetError;

const LOCAL_ACTOR_ID: u64 = 1;
/// Drains (frames) between room creation and the scripted peers joining.
const PEER_JOIN_DELAY: u32 = 30;
/// Nominal frame duration used to account elapsed race time.
const TICK_MS: u64 = 16;
/// Fabricated per-drain progress: 0.15 + rand * 0.10 percent. The lower bound
/// guarantees every scripted peer finishes well inside 1000 drains.
const PROGRESS_BASE: f32 = 0.15;
const PROGRESS_JITTER: f32 = 0.10;
/// Scripted finish times land within this many ms of the local finish.
const FINISH_SPREAD_MS: i64 = 5000;

const PEER_NAMES: [&str; 2] = ["Rafiq", "Shila"];
const PEER_KAYAKS: [KayakType; 2] = [KayakType::Racing, KayakType::Traditional];

struct ScriptedPeer {
    actor_id: u64,
    name: &'static str,
    kayak: KayakType,
    progress: f32,
    finished: bool,
}

/// Offline stand-in for the relay hub, used when the hub is unreachable.
/// Rooms are always self-hosted, a couple of scripted peers join shortly
/// after room creation, and during a race their progress is fabricated at a
/// pace comparable to a human player's.
pub struct LocalChannel {
    phase: ChannelPhase,
    room: Option<RoomDescriptor>,
    peers: Vec<ScriptedPeer>,
    drains_in_room: u32,
    race_running: bool,
    race_elapsed_ms: u64,
    local_finish_ms: Option<u64>,
    pending: Vec<ChannelNotice>,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self {
            phase: ChannelPhase::Disconnected,
            room: None,
            peers: Vec::new(),
            drains_in_room: 0,
            race_running: false,
            race_elapsed_ms: 0,
            local_finish_ms: None,
            pending: Vec::new(),
        }
    }

    fn set_phase(&mut self, phase: ChannelPhase) {
        self.phase = phase;
        self.pending.push(ChannelNotice::PhaseChanged(phase));
    }

    fn admit_scripted_peers(&mut self) {
        for (i, (name, kayak)) in PEER_NAMES.into_iter().zip(PEER_KAYAKS).enumerate() {
            let actor_id = 100 + i as u64;
            self.peers.push(ScriptedPeer {
                actor_id,
                name,
                kayak,
                progress: 0.,
                finished: false,
            });
            self.pending.push(ChannelNotice::ActorJoined(actor_id));
            self.pending.push(ChannelNotice::Event {
                sender: actor_id,
                event: PeerEvent::PlayerJoined {
                    name: Some(name.to_string()),
                    kayak: Some(kayak),
                    river: None,
                },
            });
        }
        if let Some(room) = &mut self.room {
            room.occupancy += self.peers.len() as u32;
        }
    }

    fn advance_race(&mut self) {
        let mut rng = rand::rng();
        self.race_elapsed_ms += TICK_MS;

        for peer in &mut self.peers {
            if peer.finished {
                continue;
            }
            peer.progress += PROGRESS_BASE + rng.random::<f32>() * PROGRESS_JITTER;

            if peer.progress >= 100. {
                peer.progress = 100.;
                peer.finished = true;
                let finish_ms = match self.local_finish_ms {
                    Some(local) => {
                        let jitter = rng.random_range(-FINISH_SPREAD_MS..FINISH_SPREAD_MS);
                        (local as i64 + jitter).max(1) as u64
                    }
                    None => self.race_elapsed_ms,
                };
                self.pending.push(ChannelNotice::Event {
                    sender: peer.actor_id,
                    event: PeerEvent::PlayerFinished { finish_ms },
                });
            }

            self.pending.push(ChannelNotice::Event {
                sender: peer.actor_id,
                event: PeerEvent::PlayerUpdate {
                    name: None,
                    kayak: None,
                    river: None,
                    x: None,
                    y: None,
                    angle: None,
                    progress: Some(peer.progress),
                    finished: Some(peer.finished),
                    finish_ms: None,
                },
            });
        }
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerChannel for LocalChannel {
    fn connect(&mut self, _region: &str) -> Result<(), NetError> {
        self.set_phase(ChannelPhase::ConnectedToHub);
        Ok(())
    }

    fn join_lobby(&mut self) -> Result<(), NetError> {
        self.set_phase(ChannelPhase::InLobby);
        self.pending.push(ChannelNotice::RoomList(Vec::new()));
        Ok(())
    }

    fn create_room(&mut self, code: &str) -> Result<(), NetError> {
        let descriptor = RoomDescriptor::solo(code, LOCAL_ACTOR_ID);
        self.room = Some(descriptor.clone());
        self.drains_in_room = 0;
        self.set_phase(ChannelPhase::InRoom);
        self.pending.push(ChannelNotice::RoomEntered {
            descriptor: Some(descriptor),
        });
        Ok(())
    }

    fn join_room(&mut self, code: &str) -> Result<(), NetError> {
        // There is no hub to host anything, so joining degrades to creating.
        self.create_room(code)
    }

    fn leave_room(&mut self) -> Result<(), NetError> {
        self.room = None;
        self.peers.clear();
        self.race_running = false;
        self.set_phase(ChannelPhase::InLobby);
        Ok(())
    }

    fn raise_event(&mut self, event: &PeerEvent) -> Result<(), NetError> {
        if self.room.is_none() {
            return Err(NetError::NotInRoom);
        }
        match event {
            PeerEvent::GameStart { .. } => {
                self.race_running = true;
                self.race_elapsed_ms = 0;
                self.local_finish_ms = None;
                for peer in &mut self.peers {
                    peer.progress = 0.;
                    peer.finished = false;
                }
            }
            PeerEvent::PlayerFinished { finish_ms } => {
                self.local_finish_ms = Some(*finish_ms);
            }
            PeerEvent::Chat { .. } => {
                if let Some(peer) = self.peers.first() {
                    self.pending.push(ChannelNotice::Event {
                        sender: peer.actor_id,
                        event: PeerEvent::Chat {
                            message: "ready when you are".to_string(),
                        },
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn self_id(&self) -> u64 {
        LOCAL_ACTOR_ID
    }

    fn drain_notices(&mut self) -> Vec<ChannelNotice> {
        if self.room.is_some() {
            self.drains_in_room += 1;
            if self.drains_in_room == PEER_JOIN_DELAY && self.peers.is_empty() {
                let headroom = self
                    .room
                    .as_ref()
                    .map(|r| r.max_occupancy - r.occupancy)
                    .unwrap_or(0);
                if headroom as usize >= PEER_NAMES.len() {
                    self.admit_scripted_peers();
                }
            }
            if self.race_running {
                self.advance_race();
            }
        }
        std::mem::take(&mut self.pending)
    }
}
