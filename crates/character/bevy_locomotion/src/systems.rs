use bevy::prelude::*;
use locomotion_core::{CharacterModel, Key, SceneGraph};

use crate::components::{CharacterMesh, ControlledCharacter};
use crate::resources::{LastFrame, LocomotionController, LocomotionEvent};

/// Bevy key → controller key. Keys the controller does not use map to `None`.
pub fn map_key(code: KeyCode) -> Option<Key> {
    Some(match code {
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::ArrowUp => Key::ArrowUp,
        KeyCode::ArrowDown => Key::ArrowDown,
        KeyCode::ArrowLeft => Key::ArrowLeft,
        KeyCode::ArrowRight => Key::ArrowRight,
        KeyCode::Space => Key::Space,
        KeyCode::ShiftLeft | KeyCode::ShiftRight => Key::Shift,
        _ => return None,
    })
}

/// Forward this frame's key transitions to the controller.
pub fn keyboard_input_system(
    keys: Res<ButtonInput<KeyCode>>,
    mut ctl: ResMut<LocomotionController>,
) {
    for code in keys.get_just_pressed() {
        if let Some(key) = map_key(*code) {
            ctl.0.key_down(key);
        }
    }
    for code in keys.get_just_released() {
        if let Some(key) = map_key(*code) {
            ctl.0.key_up(key);
        }
    }
}

/// Spawns the loaded character through `Commands`.
struct BevyScene<'a, 'w, 's> {
    commands: &'a mut Commands<'w, 's>,
}

impl SceneGraph for BevyScene<'_, '_, '_> {
    fn add_character(&mut self, model: &CharacterModel) {
        info!(
            "spawning character '{}' ({} meshes)",
            model.name,
            model.meshes.len()
        );
        let cast_shadows = model.cast_shadows;
        self.commands
            .spawn((
                Name::new(model.name.clone()),
                ControlledCharacter,
                SpatialBundle::from_transform(Transform::from_scale(Vec3::splat(model.scale))),
            ))
            .with_children(|parent| {
                for mesh in &model.meshes {
                    parent.spawn((
                        Name::new(mesh.clone()),
                        CharacterMesh { cast_shadows },
                        SpatialBundle::default(),
                    ));
                }
            });
    }
}

/// Tick the controller once per frame and publish the frame snapshot and its events.
pub fn tick_controller_system(
    mut commands: Commands,
    time: Res<Time>,
    mut ctl: ResMut<LocomotionController>,
    mut last: ResMut<LastFrame>,
    mut events: EventWriter<LocomotionEvent>,
) {
    let dt = ctl.0.frame_dt(time.delta_seconds());
    let mut scene = BevyScene {
        commands: &mut commands,
    };
    let frame = ctl.0.update(dt, &mut scene);
    for event in &frame.events {
        events.send(LocomotionEvent(event.clone()));
    }
    last.0 = frame;
}

/// Write the integrated pose onto the character's transform; scale is left alone.
pub fn apply_pose_system(
    last: Res<LastFrame>,
    mut q: Query<&mut Transform, With<ControlledCharacter>>,
) {
    let pose = last.0.pose;
    for mut tf in &mut q {
        tf.translation = pose.position;
        tf.rotation = pose.rotation;
    }
}
