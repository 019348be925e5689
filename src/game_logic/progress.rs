use bevy::prelude::*;
use std::collections::HashMap;
use std::time::Instant;

use crate::game_logic::course::Course;
use crate::game_logic::{Kayak, PlayerControlled, RaceProgress, RacerName};

/// Race-scoped state: the clock, the finish table and the current ranking.
/// Created when the countdown ends, replaced when the next race starts.
#[derive(Resource)]
pub struct RaceSession {
    started_at: Instant,
    finish_times: HashMap<Entity, u64>,
    pub ranking: Vec<RankEntry>,
    pub outcome: RaceOutcome,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaceOutcome {
    InProgress,
    Complete,
    /// Recovery was impossible (e.g. the local racer vanished); the race ends
    /// explicitly rather than hanging.
    DidNotFinish,
}

#[derive(Clone, Debug)]
pub struct RankEntry {
    pub entity: Entity,
    pub name: String,
    pub progress: f32,
    pub finished: bool,
    pub finish_ms: Option<u64>,
}

impl RaceSession {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
            finish_times: HashMap::new(),
            ranking: Vec::new(),
            outcome: RaceOutcome::InProgress,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Record a finish for a racer. Idempotent: the first recorded time wins.
    pub fn record_finish(&mut self, racer: Entity) -> u64 {
        let elapsed = self.elapsed_ms();
        *self.finish_times.entry(racer).or_insert(elapsed)
    }

    pub fn finish_time(&self, racer: Entity) -> Option<u64> {
        self.finish_times.get(&racer).copied()
    }
}

/// Order racers: everyone who finished outranks everyone who has not,
/// finishers sort by ascending time, the rest by descending progress.
pub fn rank_racers(mut entries: Vec<RankEntry>) -> Vec<RankEntry> {
    entries.sort_by(|a, b| match (a.finished, b.finished) {
        (true, true) => a.finish_ms.cmp(&b.finish_ms),
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        (false, false) => b.progress.total_cmp(&a.progress),
    });
    entries
}

/// Tick step 5: recompute progress for every racer (remote shadows included)
/// and rebuild the ranking.
pub fn update_progress_and_ranking(
    course: Res<Course>,
    mut session: ResMut<RaceSession>,
    mut racers: Query<(Entity, &Transform, &mut RaceProgress, &RacerName), With<Kayak>>,
) {
    let mut entries = Vec::new();

    for (entity, transform, mut progress, name) in racers.iter_mut() {
        if progress.finished {
            progress.percent = 100.;
        } else {
            progress.percent = course.progress_percent(transform.translation.y);
        }

        entries.push(RankEntry {
            entity,
            name: name.0.clone(),
            progress: progress.percent,
            finished: progress.finished,
            finish_ms: progress.finish_ms,
        });
    }

    session.ranking = rank_racers(entries);
}

/// Tick step 7: the race ends when the local player finishes or every
/// opponent has.
pub fn race_complete(
    player: &RaceProgress,
    opponents: impl IntoIterator<Item = bool>,
) -> bool {
    if player.finished {
        return true;
    }
    let mut any = false;
    for finished in opponents {
        any = true;
        if !finished {
            return false;
        }
    }
    any
}

pub fn check_race_complete(
    mut session: ResMut<RaceSession>,
    mut next_state: ResMut<NextState<crate::GameState>>,
    player: Query<&RaceProgress, With<PlayerControlled>>,
    opponents: Query<&RaceProgress, (With<Kayak>, Without<PlayerControlled>)>,
) {
    let Ok(local) = player.single() else {
        // The local racer is gone and cannot recover; end the race explicitly.
        warn!("local racer missing mid-race, ending as DNF");
        session.outcome = RaceOutcome::DidNotFinish;
        next_state.set(crate::GameState::Results);
        return;
    };

    if race_complete(local, opponents.iter().map(|p| p.finished)) {
        session.outcome = RaceOutcome::Complete;
        next_state.set(crate::GameState::Results);
    }
}

/// Format milliseconds as MM:SS.cc for the results table.
pub fn format_race_time(ms: u64) -> String {
    let total_seconds = ms / 1000;
    format!(
        "{:02}:{:02}.{:02}",
        total_seconds / 60,
        total_seconds % 60,
        (ms % 1000) / 10
    )
}
