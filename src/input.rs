use bevy::prelude::*;

use crate::game_logic::physics::HeldControls;
use crate::game_logic::PaddleSide;
use crate::GameState;

/// One discrete paddle stroke requested by the local player.
#[derive(Event, Clone, Copy, Debug)]
pub struct StrokeEvent {
    pub side: PaddleSide,
}

/// Keyboard adapter. A stroke fires on key release so a held key cannot spam
/// strokes every tick; balance and boost are continuous holds.
fn read_keyboard(
    keys: Res<ButtonInput<KeyCode>>,
    mut strokes: EventWriter<StrokeEvent>,
    mut holds: ResMut<HeldControls>,
) {
    if keys.just_released(KeyCode::KeyA) {
        strokes.write(StrokeEvent {
            side: PaddleSide::Left,
        });
    }
    if keys.just_released(KeyCode::KeyD) {
        strokes.write(StrokeEvent {
            side: PaddleSide::Right,
        });
    }

    holds.balance = keys.pressed(KeyCode::Space);
    holds.boost = keys.pressed(KeyCode::ShiftLeft);
}

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<StrokeEvent>()
            // Headless runs have no winit backend, so the key state resource
            // must exist up front.
            .init_resource::<ButtonInput<KeyCode>>()
            .init_resource::<HeldControls>()
            .add_systems(Update, read_keyboard.run_if(in_state(GameState::Playing)));
    }
}
