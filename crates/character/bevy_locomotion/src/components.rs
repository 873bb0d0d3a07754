use bevy::prelude::*;

/// Root entity of the character the controller drives; its `Transform` follows the
/// integrated pose every frame.
#[derive(Component, Debug, Default)]
pub struct ControlledCharacter;

/// One mesh of the loaded character model, spawned as a child of [`ControlledCharacter`].
#[derive(Component, Debug, Clone)]
pub struct CharacterMesh {
    pub cast_shadows: bool,
}
