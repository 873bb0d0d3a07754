use bevy::prelude::*;
use locomotion_core::{CharacterController, ControllerEvent, ControllerFrame};

/// The controller ticked by the plugin.
#[derive(Resource)]
pub struct LocomotionController(pub CharacterController);

/// Snapshot from the most recent tick (pose, state, clip samples and events).
#[derive(Resource, Default, Debug)]
pub struct LastFrame(pub ControllerFrame);

/// Controller events re-emitted into the Bevy event queue.
#[derive(Event, Debug, Clone)]
pub struct LocomotionEvent(pub ControllerEvent);
