use bevy::prelude::*;
use std::collections::HashMap;

use crate::config::{GameMode, KayakType, RiverType, SelectedKayak, SelectedRiver};
use crate::game_logic::course::Course;
use crate::game_logic::{
    Hull, Kayak, Orientation, PlayerControlled, RaceProgress, RacerName, Speed, START_OFFSET,
};
use crate::net::channel::{
    ChannelNotice, ChannelPhase, PeerChannel, PeerEvent, RoomDescriptor,
};
use crate::net::local::LocalChannel;
use crate::net::relay::{RelayChannel, DEFAULT_RELAY_ADDR};
use crate::GameState;

/// Fraction of the remaining x error closed per tick when placing shadows.
const SHADOW_SMOOTHING: f32 = 0.1;
/// Local state is broadcast every this many fixed ticks.
const BROADCAST_INTERVAL: u64 = 3;

/// The active transport plus connection bookkeeping. The channel is swapped
/// for the offline fallback if the hub cannot be reached.
#[derive(Resource)]
pub struct PeerLink {
    pub channel: Box<dyn PeerChannel>,
    pub phase: ChannelPhase,
    pub using_fallback: bool,
    pub region: String,
}

impl Default for PeerLink {
    fn default() -> Self {
        let addr = std::env::var("RIVER_RAPIDS_RELAY")
            .unwrap_or_else(|_| DEFAULT_RELAY_ADDR.to_string());
        let region =
            std::env::var("RIVER_RAPIDS_REGION").unwrap_or_else(|_| "ap-south".to_string());
        Self {
            channel: Box::new(RelayChannel::new(addr)),
            phase: ChannelPhase::Disconnected,
            using_fallback: false,
            region,
        }
    }
}

/// Last known state of one remote racer, merged from partial updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemotePlayerRecord {
    pub name: Option<String>,
    pub kayak: Option<KayakType>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub angle: Option<f32>,
    pub progress: f32,
    pub finished: bool,
    pub finish_ms: Option<u64>,
}

impl RemotePlayerRecord {
    /// Fold a peer event into the record. Absent fields leave prior values
    /// untouched.
    pub fn merge(&mut self, event: &PeerEvent) {
        match event {
            PeerEvent::PlayerJoined { name, kayak, .. } => {
                if name.is_some() {
                    self.name = name.clone();
                }
                if kayak.is_some() {
                    self.kayak = *kayak;
                }
            }
            PeerEvent::PlayerUpdate {
                name,
                kayak,
                x,
                y,
                angle,
                progress,
                finished,
                finish_ms,
                ..
            } => {
                if name.is_some() {
                    self.name = name.clone();
                }
                if kayak.is_some() {
                    self.kayak = *kayak;
                }
                if x.is_some() {
                    self.x = *x;
                }
                if y.is_some() {
                    self.y = *y;
                }
                if angle.is_some() {
                    self.angle = *angle;
                }
                if let Some(progress) = progress {
                    self.progress = *progress;
                }
                if let Some(finished) = finished {
                    self.finished = *finished || self.finished;
                }
                if let Some(ms) = finish_ms {
                    // First reported finish time wins.
                    self.finish_ms.get_or_insert(*ms);
                }
            }
            PeerEvent::PlayerFinished { finish_ms } => {
                self.finished = true;
                self.progress = 100.;
                self.finish_ms.get_or_insert(*finish_ms);
            }
            _ => {}
        }
    }
}

#[derive(Resource, Default)]
pub struct RemotePlayers(pub HashMap<u64, RemotePlayerRecord>);

#[derive(Resource, Default)]
pub struct RoomState {
    pub descriptor: Option<RoomDescriptor>,
    pub is_host: bool,
    pub start_allowed: bool,
    pub available_rooms: Vec<RoomDescriptor>,
    /// True once the hub has published at least one room list.
    pub listed: bool,
}

impl RoomState {
    fn refresh(&mut self, self_id: u64) {
        match &self.descriptor {
            Some(d) => {
                self.is_host = d.master_id == self_id;
                self.start_allowed = self.is_host && d.occupancy >= 2;
            }
            None => {
                self.is_host = false;
                self.start_allowed = false;
            }
        }
    }
}

#[derive(Resource, Default)]
pub struct ChatLog(pub Vec<(u64, String)>);

#[derive(Resource, Default)]
pub struct SyncClock {
    pub tick: u64,
}

#[derive(Resource, Default)]
pub struct LocalAnnounce {
    pub finished_sent: bool,
}

/// Marks an entity mirroring a remote racer.
#[derive(Component)]
pub struct RemoteShadow {
    pub actor_id: u64,
}

/// Connect to the hub once multiplayer is selected. A failed connect swaps
/// in the offline fallback rather than blocking the lobby.
pub fn maintain_connection(mode: Res<GameMode>, mut link: ResMut<PeerLink>) {
    if *mode != GameMode::Multiplayer || link.phase != ChannelPhase::Disconnected {
        return;
    }

    let region = link.region.clone();
    if let Err(err) = link.channel.connect(&region) {
        warn!("relay unreachable ({err}), continuing offline");
        link.channel = Box::new(LocalChannel::new());
        link.using_fallback = true;
        // The fallback cannot fail to connect.
        let _ = link.channel.connect(&region);
    }
    if let Err(err) = link.channel.join_lobby() {
        warn!("failed to join lobby: {err}");
        return;
    }
    link.phase = ChannelPhase::InLobby;
}

fn local_player_info(kayak: Option<KayakType>, river: Option<RiverType>) -> PeerEvent {
    PeerEvent::PlayerJoined {
        name: Some(
            std::env::var("RIVER_RAPIDS_NAME").unwrap_or_else(|_| "Paddler".to_string()),
        ),
        kayak,
        river,
    }
}

/// Drain the channel and fold everything into the room, player and chat
/// state. Runs every frame in the lobby and once per fixed tick mid-race.
pub fn pump_peer_notices(
    mode: Res<GameMode>,
    mut link: ResMut<PeerLink>,
    mut remote: ResMut<RemotePlayers>,
    mut room: ResMut<RoomState>,
    mut chat: ResMut<ChatLog>,
    kayak: Res<SelectedKayak>,
    mut river: ResMut<SelectedRiver>,
    state: Res<State<GameState>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if *mode != GameMode::Multiplayer {
        return;
    }

    let self_id = link.channel.self_id();
    let notices = link.channel.drain_notices();

    for notice in notices {
        match notice {
            ChannelNotice::PhaseChanged(phase) => {
                link.phase = phase;
                if phase == ChannelPhase::Disconnected {
                    warn!("lost connection to the hub");
                }
            }
            ChannelNotice::RoomList(rooms) => {
                room.available_rooms = rooms;
                room.listed = true;
            }
            ChannelNotice::RoomEntered { descriptor } => {
                // Some hubs omit the descriptor; assume a fresh solo room.
                let descriptor =
                    descriptor.unwrap_or_else(|| RoomDescriptor::solo("local", self_id));
                room.descriptor = Some(descriptor);
                room.refresh(self_id);
                link.phase = ChannelPhase::InRoom;
                if let Err(err) = link.channel.raise_event(&local_player_info(kayak.0, river.0)) {
                    warn!("failed to announce self: {err}");
                }
            }
            ChannelNotice::ActorJoined(actor_id) => {
                info!("actor {actor_id} joined the room");
                remote.0.entry(actor_id).or_default();
                if let Some(d) = &mut room.descriptor {
                    d.occupancy = (d.occupancy + 1).min(d.max_occupancy);
                }
                room.refresh(self_id);
                // Late joiners need our info too.
                if let Err(err) = link.channel.raise_event(&local_player_info(kayak.0, river.0)) {
                    warn!("failed to announce self: {err}");
                }
            }
            ChannelNotice::ActorLeft(actor_id) => {
                info!("actor {actor_id} left the room");
                remote.0.remove(&actor_id);
                if let Some(d) = &mut room.descriptor {
                    d.occupancy = d.occupancy.saturating_sub(1).max(1);
                }
                room.refresh(self_id);
            }
            ChannelNotice::Event { sender, event } => {
                if sender == self_id {
                    continue;
                }
                match &event {
                    PeerEvent::GameStart { river: chosen } => {
                        if !room.is_host && *state.get() == GameState::Lobby {
                            river.0 = Some(*chosen);
                            next_state.set(GameState::Countdown);
                        }
                    }
                    PeerEvent::PlayerLeft => {
                        remote.0.remove(&sender);
                    }
                    PeerEvent::Chat { message } => {
                        chat.0.push((sender, message.clone()));
                    }
                    _ => {
                        remote.0.entry(sender).or_default().merge(&event);
                    }
                }
            }
            ChannelNotice::Fault(message) => {
                warn!("channel fault: {message}");
            }
        }
    }
}

/// Mirror remote racers as shadow entities. Shadows carry the same racer
/// components as local kayaks so ranking and completion treat them alike,
/// but no physics system drives them.
pub fn project_remote_shadows(
    mode: Res<GameMode>,
    remote: Res<RemotePlayers>,
    course: Option<Res<Course>>,
    mut commands: Commands,
    mut shadows: Query<(
        Entity,
        &RemoteShadow,
        &mut Transform,
        &mut RaceProgress,
        &mut RacerName,
    )>,
) {
    if *mode != GameMode::Multiplayer {
        return;
    }
    let Some(course) = course else { return };

    let mut seen: Vec<u64> = Vec::with_capacity(remote.0.len());
    for (entity, shadow, mut transform, mut progress, mut name) in shadows.iter_mut() {
        let Some(record) = remote.0.get(&shadow.actor_id) else {
            commands.entity(entity).despawn();
            continue;
        };
        seen.push(shadow.actor_id);

        if let Some(remote_x) = record.x {
            transform.translation.x += (remote_x - transform.translation.x) * SHADOW_SMOOTHING;
        }
        transform.translation.y = course.y_for_progress(record.progress);

        progress.percent = record.progress;
        if record.finished && !progress.finished {
            progress.finished = true;
            progress.finish_ms = record.finish_ms;
        }
        if let Some(n) = &record.name {
            if name.0 != *n {
                name.0 = n.clone();
            }
        }
    }

    for (actor_id, record) in &remote.0 {
        if seen.contains(actor_id) {
            continue;
        }
        let kayak = record.kayak.unwrap_or_default();
        let x = record.x.unwrap_or(crate::game_logic::PLAYFIELD_WIDTH / 2.);
        commands.spawn((
            Kayak,
            RemoteShadow {
                actor_id: *actor_id,
            },
            RacerName(
                record
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("Racer {actor_id}")),
            ),
            Hull::from_kayak(kayak),
            Speed(0.),
            Orientation::new(0.),
            RaceProgress::default(),
            Transform::from_xyz(x, START_OFFSET, 0.),
        ));
    }
}

/// Publish the local racer's state at a reduced rate and announce the finish
/// exactly once.
pub fn broadcast_local_state(
    mode: Res<GameMode>,
    mut link: ResMut<PeerLink>,
    mut clock: ResMut<SyncClock>,
    mut announce: ResMut<LocalAnnounce>,
    player: Query<(&Transform, &Orientation, &RaceProgress), With<PlayerControlled>>,
) {
    if *mode != GameMode::Multiplayer {
        return;
    }
    let Ok((transform, orientation, progress)) = player.single() else {
        return;
    };

    clock.tick += 1;
    if clock.tick % BROADCAST_INTERVAL == 0 {
        let update = PeerEvent::PlayerUpdate {
            name: None,
            kayak: None,
            river: None,
            x: Some(transform.translation.x),
            y: Some(transform.translation.y),
            angle: Some(orientation.angle),
            progress: Some(progress.percent),
            finished: Some(progress.finished),
            finish_ms: progress.finish_ms,
        };
        if let Err(err) = link.channel.raise_event(&update) {
            warn!("failed to broadcast state: {err}");
        }
    }

    if progress.finished && !announce.finished_sent {
        if let Some(finish_ms) = progress.finish_ms {
            match link.channel.raise_event(&PeerEvent::PlayerFinished { finish_ms }) {
                Ok(()) => announce.finished_sent = true,
                Err(err) => warn!("failed to announce finish: {err}"),
            }
        }
    }
}

pub struct SyncPlugin;

impl Plugin for SyncPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PeerLink>()
            .init_resource::<RemotePlayers>()
            .init_resource::<RoomState>()
            .init_resource::<ChatLog>()
            .init_resource::<SyncClock>()
            .init_resource::<LocalAnnounce>()
            .add_systems(
                Update,
                (
                    maintain_connection,
                    pump_peer_notices.run_if(
                        in_state(GameState::Lobby).or(in_state(GameState::Countdown)),
                    ),
                )
                    .chain(),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_update() -> PeerEvent {
        PeerEvent::PlayerUpdate {
            name: Some("Anik".to_string()),
            kayak: Some(KayakType::Racing),
            river: None,
            x: Some(120.),
            y: Some(400.),
            angle: Some(0.2),
            progress: Some(10.),
            finished: Some(false),
            finish_ms: None,
        }
    }

    #[test]
    fn test_merge_partial_update_keeps_prior_fields() {
        let mut record = RemotePlayerRecord::default();
        record.merge(&full_update());

        record.merge(&PeerEvent::PlayerUpdate {
            name: None,
            kayak: None,
            river: None,
            x: None,
            y: None,
            angle: None,
            progress: Some(42.),
            finished: None,
            finish_ms: None,
        });

        assert_eq!(record.name.as_deref(), Some("Anik"));
        assert_eq!(record.kayak, Some(KayakType::Racing));
        assert_eq!(record.x, Some(120.));
        assert_eq!(record.progress, 42.);
        assert!(!record.finished);
    }

    #[test]
    fn test_merge_player_finished_pins_progress() {
        let mut record = RemotePlayerRecord::default();
        record.merge(&full_update());
        record.merge(&PeerEvent::PlayerFinished { finish_ms: 58_000 });

        assert!(record.finished);
        assert_eq!(record.progress, 100.);
        assert_eq!(record.finish_ms, Some(58_000));
    }

    #[test]
    fn test_finished_flag_never_regresses() {
        let mut record = RemotePlayerRecord::default();
        record.merge(&PeerEvent::PlayerFinished { finish_ms: 1 });
        record.merge(&PeerEvent::PlayerUpdate {
            name: None,
            kayak: None,
            river: None,
            x: None,
            y: None,
            angle: None,
            progress: None,
            finished: Some(false),
            finish_ms: None,
        });
        assert!(record.finished);
    }

    #[test]
    fn test_first_reported_finish_time_wins() {
        let mut record = RemotePlayerRecord::default();
        record.merge(&PeerEvent::PlayerFinished { finish_ms: 58_000 });
        record.merge(&PeerEvent::PlayerFinished { finish_ms: 61_000 });
        record.merge(&PeerEvent::PlayerUpdate {
            name: None,
            kayak: None,
            river: None,
            x: None,
            y: None,
            angle: None,
            progress: None,
            finished: Some(true),
            finish_ms: Some(64_000),
        });
        assert_eq!(record.finish_ms, Some(58_000));
    }

    #[test]
    fn test_room_entry_announcement_carries_selections() {
        let event = local_player_info(Some(KayakType::Racing), Some(RiverType::Jamuna));
        match event {
            PeerEvent::PlayerJoined { kayak, river, name } => {
                assert_eq!(kayak, Some(KayakType::Racing));
                assert_eq!(river, Some(RiverType::Jamuna));
                assert!(name.is_some());
            }
            other => panic!("expected PlayerJoined, got {other:?}"),
        }
    }

    #[test]
    fn test_room_refresh_computes_host_and_start_permission() {
        let mut room = RoomState {
            descriptor: Some(RoomDescriptor {
                code: "DHAKA1".to_string(),
                occupancy: 1,
                max_occupancy: 4,
                master_id: 7,
            }),
            ..Default::default()
        };

        room.refresh(7);
        assert!(room.is_host);
        assert!(!room.start_allowed, "solo rooms cannot start");

        room.descriptor.as_mut().unwrap().occupancy = 2;
        room.refresh(7);
        assert!(room.start_allowed);

        room.refresh(9);
        assert!(!room.is_host);
        assert!(!room.start_allowed);
    }
}
