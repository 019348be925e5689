use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use rand::Rng;
use std::time::Duration;

mod config;
mod game_logic;
mod input;
mod net;
mod race;

use config::{GameMode, KayakType, RiverType, SelectedKayak, SelectedRiver};
use input::InputPlugin;
use net::channel::{ChannelPhase, PeerEvent, RoomDescriptor};
use net::sync::{PeerLink, RoomState, SyncPlugin};
use race::RaceLoopPlugin;

#[derive(States, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GameState {
    #[default]
    Title,
    Customizing,
    Lobby,
    Countdown,
    Playing,
    Results,
}

fn main() {
    App::new()
        .add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
                1. / 60.,
            ))),
        )
        .add_plugins(bevy::state::app::StatesPlugin)
        .add_plugins(bevy::log::LogPlugin::default())
        .insert_resource(Time::<Fixed>::from_hz(60.))
        .init_state::<GameState>()
        .init_resource::<SelectedKayak>()
        .init_resource::<SelectedRiver>()
        .init_resource::<GameMode>()
        .add_plugins((InputPlugin, SyncPlugin, RaceLoopPlugin))
        .add_systems(Update, title_screen.run_if(in_state(GameState::Title)))
        .add_systems(Update, customize.run_if(in_state(GameState::Customizing)))
        .add_systems(Update, lobby_flow.run_if(in_state(GameState::Lobby)))
        .add_systems(Update, exit_after_results.run_if(in_state(GameState::Results)))
        .run();
}

fn kayak_from_env() -> Option<KayakType> {
    match std::env::var("RIVER_RAPIDS_KAYAK").ok()?.to_lowercase().as_str() {
        "racing" => Some(KayakType::Racing),
        "balanced" => Some(KayakType::Balanced),
        "traditional" => Some(KayakType::Traditional),
        other => {
            warn!("unknown kayak '{other}', using the default");
            None
        }
    }
}

fn river_from_env() -> Option<RiverType> {
    match std::env::var("RIVER_RAPIDS_RIVER").ok()?.to_lowercase().as_str() {
        "padma" => Some(RiverType::Padma),
        "jamuna" => Some(RiverType::Jamuna),
        "meghna" => Some(RiverType::Meghna),
        other => {
            warn!("unknown river '{other}', using the default");
            None
        }
    }
}

fn title_screen(mut mode: ResMut<GameMode>, mut next_state: ResMut<NextState<GameState>>) {
    info!("River Rapids: Bangladesh");
    if std::env::var("RIVER_RAPIDS_MODE").as_deref() == Ok("multi") {
        *mode = GameMode::Multiplayer;
    }
    next_state.set(GameState::Customizing);
}

fn customize(
    mode: Res<GameMode>,
    mut kayak: ResMut<SelectedKayak>,
    mut river: ResMut<SelectedRiver>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    kayak.0 = Some(kayak_from_env().unwrap_or_default());
    river.0 = Some(river_from_env().unwrap_or_default());
    info!(
        "racing the {} in a {}",
        river.0.unwrap().spec().name,
        kayak.0.unwrap().spec().name
    );

    match *mode {
        GameMode::SinglePlayer => next_state.set(GameState::Countdown),
        GameMode::Multiplayer => next_state.set(GameState::Lobby),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum RoomAction {
    Join(String),
    Create(String),
}

/// Join the requested room when the hub lists it with a free seat,
/// otherwise open it (or a fresh random-code room when none was requested).
fn choose_room_action(wanted: Option<&str>, rooms: &[RoomDescriptor]) -> RoomAction {
    match wanted {
        Some(code)
            if rooms
                .iter()
                .any(|r| r.code == code && r.occupancy < r.max_occupancy) =>
        {
            RoomAction::Join(code.to_string())
        }
        Some(code) => RoomAction::Create(code.to_string()),
        None => RoomAction::Create(format!("{:06}", rand::rng().random_range(0..1_000_000))),
    }
}

/// Frames to wait for the hub's room list before assuming there is none.
const ROOM_LIST_GRACE_FRAMES: u32 = 60;

/// Multiplayer lobby: join or create a room once connected, then start the
/// race as soon as the room can legally start.
fn lobby_flow(
    mut link: ResMut<PeerLink>,
    room: Res<RoomState>,
    river: Res<SelectedRiver>,
    mut room_requested: Local<bool>,
    mut frames_waited: Local<u32>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if link.phase == ChannelPhase::InLobby && !*room_requested {
        if !room.listed && *frames_waited < ROOM_LIST_GRACE_FRAMES {
            *frames_waited += 1;
            return;
        }

        let wanted = std::env::var("RIVER_RAPIDS_ROOM").ok();
        let result = match choose_room_action(wanted.as_deref(), &room.available_rooms) {
            RoomAction::Join(code) => {
                info!("joining room {code}");
                link.channel.join_room(&code)
            }
            RoomAction::Create(code) => {
                info!("opening room {code}");
                link.channel.create_room(&code)
            }
        };
        match result {
            Ok(()) => *room_requested = true,
            Err(err) => warn!("failed to enter a room: {err}"),
        }
    }

    if room.start_allowed {
        let Some(river) = river.0 else { return };
        match link.channel.raise_event(&PeerEvent::GameStart { river }) {
            Ok(()) => next_state.set(GameState::Countdown),
            Err(err) => warn!("failed to start the race: {err}"),
        }
    }
}

fn exit_after_results(mut exit: EventWriter<AppExit>) {
    exit.write(AppExit::Success);
}
