//! Bevy adapter for `locomotion-core`.
//!
//! Each `Update`: keyboard transitions → controller tick → pose written to the
//! [`ControlledCharacter`] transform. The character entity is spawned when its model
//! finishes loading.

use std::sync::Arc;

use bevy::prelude::*;
use locomotion_core::{AssetSource, CharacterController, ControllerConfig, ControllerError};

pub mod components;
pub mod resources;
pub mod systems;

pub use components::{CharacterMesh, ControlledCharacter};
pub use resources::{LastFrame, LocomotionController, LocomotionEvent};

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocomotionSet;

/// Adds the controller resource and the input / tick / pose systems.
///
/// Assets come from `config.asset_root` on disk unless a `source` is supplied.
#[derive(Default)]
pub struct LocomotionPlugin {
    pub config: ControllerConfig,
    pub source: Option<Arc<dyn AssetSource>>,
    /// Load every asset while the plugin is built instead of on a background thread.
    pub blocking_load: bool,
}

impl LocomotionPlugin {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: Arc<dyn AssetSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn blocking(mut self) -> Self {
        self.blocking_load = true;
        self
    }

    fn controller(&self) -> Result<CharacterController, ControllerError> {
        let config = self.config.clone();
        match (&self.source, self.blocking_load) {
            (Some(source), true) => CharacterController::new_blocking(config, source.as_ref()),
            (Some(source), false) => CharacterController::new(config, Arc::clone(source)),
            (None, true) => {
                let source = locomotion_core::FsAssetSource::new(&config.asset_root);
                CharacterController::new_blocking(config, &source)
            }
            (None, false) => CharacterController::from_fs(config),
        }
    }
}

impl Plugin for LocomotionPlugin {
    fn build(&self, app: &mut App) {
        let controller = match self.controller() {
            Ok(c) => c,
            Err(e) => {
                error!("locomotion controller not started: {e}");
                return;
            }
        };
        app.insert_resource(LocomotionController(controller))
            .init_resource::<LastFrame>()
            .init_resource::<ButtonInput<KeyCode>>()
            .add_event::<LocomotionEvent>()
            .add_systems(
                Update,
                (
                    systems::keyboard_input_system,
                    systems::tick_controller_system,
                    systems::apply_pose_system,
                )
                    .chain()
                    .in_set(LocomotionSet),
            );
    }
}
