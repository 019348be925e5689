use bevy::prelude::*;
use rand::Rng;

use crate::config::{GameMode, KayakType, SelectedKayak, SelectedRiver};
use crate::game_logic::ai::{drive_ai, AiPaddler};
use crate::game_logic::collision::resolve_collisions;
use crate::game_logic::course::generate_course;
use crate::game_logic::physics::{apply_stroke, integrate_tick, HeldControls};
use crate::game_logic::progress::{
    check_race_complete, format_race_time, update_progress_and_ranking, RaceOutcome, RaceSession,
};
use crate::game_logic::{
    AiControlled, Hull, Kayak, Lane, Orientation, PaddleRhythm, PlayerControlled, RaceProgress,
    RacerName, Speed, PLAYFIELD_WIDTH, START_OFFSET,
};
use crate::input::StrokeEvent;
use crate::net::sync::{
    broadcast_local_state, project_remote_shadows, pump_peer_notices, LocalAnnounce,
    RemotePlayers, SyncClock,
};
use crate::GameState;

const AI_OPPONENT_COUNT: usize = 3;
const PLAYER_LANE: u8 = 2;
const AI_LANES: [u8; AI_OPPONENT_COUNT] = [1, 3, 4];
const AI_NAMES: [&str; AI_OPPONENT_COUNT] = ["Karim", "Joya", "Tushar"];

/// Pre-race countdown: one beat per second, three beats then go.
#[derive(Resource)]
struct CountdownTimer {
    timer: Timer,
    remaining: u8,
}

fn setup_race(
    mut commands: Commands,
    racers: Query<Entity, With<Kayak>>,
    mut kayak: ResMut<SelectedKayak>,
    mut river: ResMut<SelectedRiver>,
    mode: Res<GameMode>,
    remote: Res<RemotePlayers>,
    mut clock: ResMut<SyncClock>,
    mut announce: ResMut<LocalAnnounce>,
) {
    for entity in &racers {
        commands.entity(entity).despawn();
    }
    clock.tick = 0;
    announce.finished_sent = false;

    let chosen_kayak = kayak.0.unwrap_or_else(|| {
        warn!("no kayak selected, defaulting to the balanced kayak");
        KayakType::default()
    });
    kayak.0 = Some(chosen_kayak);
    let chosen_river = river.0.unwrap_or_else(|| {
        warn!("no river selected, defaulting to the Padma");
        Default::default()
    });
    river.0 = Some(chosen_river);

    let mut rng = rand::rng();
    let seed: u64 = rng.random();
    let spec = chosen_river.spec();
    info!(
        "race setup: {} on the {} (seed {seed})",
        chosen_kayak.spec().name,
        spec.name
    );
    commands.insert_resource(generate_course(spec, seed));

    commands.spawn((
        Kayak,
        PlayerControlled,
        Hull::from_kayak(chosen_kayak),
        Speed(0.),
        Orientation::new(0.),
        Lane(PLAYER_LANE),
        RacerName("You".to_string()),
        RaceProgress::default(),
        PaddleRhythm::default(),
        // The player starts mid-river rather than on their lane center.
        Transform::from_xyz(PLAYFIELD_WIDTH / 2., START_OFFSET, 0.),
    ));

    // AI opponents fill the field in single player, or in a multiplayer room
    // where nobody else ever showed up.
    let want_ai = *mode == GameMode::SinglePlayer || remote.0.is_empty();
    if want_ai {
        let difficulty = chosen_river.ai_difficulty();
        for (lane, name) in AI_LANES.into_iter().zip(AI_NAMES) {
            let ai_kayak = KayakType::all()[rng.random_range(0..3)];
            let mut hull = Hull::from_kayak(ai_kayak);
            hull.max_speed *= 0.8 + rng.random::<f32>() * 0.4;

            commands.spawn((
                Kayak,
                AiControlled,
                AiPaddler::new(difficulty),
                hull,
                Speed(0.),
                Orientation::new(0.),
                Lane(lane),
                RacerName(name.to_string()),
                RaceProgress::default(),
                Transform::from_xyz(Lane(lane).center_x(), START_OFFSET, 0.),
            ));
        }
    }

    commands.insert_resource(CountdownTimer {
        timer: Timer::from_seconds(1., TimerMode::Repeating),
        remaining: 3,
    });
}

fn run_countdown(
    time: Res<Time>,
    mut countdown: ResMut<CountdownTimer>,
    mut commands: Commands,
    mut next_state: ResMut<NextState<GameState>>,
) {
    countdown.timer.tick(time.delta());
    if !countdown.timer.just_finished() {
        return;
    }

    if countdown.remaining > 0 {
        info!("{}", countdown.remaining);
        countdown.remaining -= 1;
        return;
    }

    info!("GO!");
    commands.remove_resource::<CountdownTimer>();
    commands.insert_resource(RaceSession::start());
    next_state.set(GameState::Playing);
}

/// Tick step 1: consume stroke events against the local racer.
fn handle_paddle_strokes(
    mut strokes: EventReader<StrokeEvent>,
    session: Res<RaceSession>,
    mut player: Query<
        (&Hull, &mut Speed, &mut Orientation, &mut PaddleRhythm, &RaceProgress),
        With<PlayerControlled>,
    >,
) {
    let Ok((hull, mut speed, mut orientation, mut rhythm, progress)) = player.single_mut() else {
        return;
    };
    if progress.finished {
        strokes.clear();
        return;
    }

    let now_ms = session.elapsed_ms() as f64;
    for stroke in strokes.read() {
        apply_stroke(
            stroke.side,
            now_ms,
            hull,
            &mut speed.0,
            &mut orientation,
            &mut rhythm,
        );
    }
}

/// Tick step 2: advance the local racer.
fn integrate_local_player(
    holds: Res<HeldControls>,
    mut player: Query<
        (&mut Transform, &mut Speed, &mut Orientation, &RaceProgress),
        With<PlayerControlled>,
    >,
) {
    let Ok((mut transform, mut speed, mut orientation, progress)) = player.single_mut() else {
        return;
    };
    if progress.finished {
        return;
    }

    let mut position = transform.translation.truncate();
    integrate_tick(&mut position, &mut speed.0, &mut orientation, *holds);
    transform.translation.x = position.x;
    transform.translation.y = position.y;
}

fn log_standings(session: Res<RaceSession>) {
    match session.outcome {
        RaceOutcome::Complete => info!("race complete"),
        RaceOutcome::DidNotFinish => info!("race abandoned"),
        RaceOutcome::InProgress => {}
    }

    for (place, entry) in session.ranking.iter().enumerate() {
        match entry.finish_ms {
            Some(ms) => info!("{}. {} - {}", place + 1, entry.name, format_race_time(ms)),
            None => info!("{}. {} - {:.1}% (DNF)", place + 1, entry.name, entry.progress),
        }
    }
}

pub struct RaceLoopPlugin;

impl Plugin for RaceLoopPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::Countdown), setup_race)
            .add_systems(
                Update,
                run_countdown.run_if(in_state(GameState::Countdown)),
            )
            .add_systems(
                FixedUpdate,
                (
                    handle_paddle_strokes,
                    integrate_local_player,
                    pump_peer_notices,
                    project_remote_shadows,
                    drive_ai,
                    resolve_collisions,
                    update_progress_and_ranking,
                    broadcast_local_state,
                    check_race_complete,
                )
                    .chain()
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(OnEnter(GameState::Results), log_standings);
    }
}
