//! Per-tick output contracts.
//!
//! The mixer reports which clips contribute to the pose this tick and at what weight;
//! the controller wraps that together with the integrated pose and discrete events.
//! Adapters (Bevy, tools) apply the samples to the host and transport the events.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::fsm::StateKind;
use crate::ids::ActionId;
use crate::integrator::Pose;

/// One contributing action for this tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionSample {
    pub action: ActionId,
    pub clip: String,
    /// Clip-local time in seconds.
    pub time: f32,
    /// Effective weight in (0, 1].
    pub weight: f32,
}

/// Discrete playback signals emitted while advancing the mixer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MixerEvent {
    Looped { action: ActionId, clip: String },
    Finished { action: ActionId, clip: String },
    FadeCompleted { action: ActionId, clip: String, weight: f32 },
}

/// Discrete controller signals for this tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ControllerEvent {
    LoadStarted { total: usize },
    LoadProgress { path: String, loaded: usize, total: usize },
    ModelLoaded { name: String },
    AnimationLoaded { name: String },
    AssetFailed { path: String, message: String },
    /// Loading finished; `missing` lists required animations that never arrived.
    LoadCompleted { missing: Vec<String> },
    StateChanged { from: Option<StateKind>, to: StateKind },
    Error { message: String },
    Mixer(MixerEvent),
}

/// Snapshot returned by `CharacterController::update()`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ControllerFrame {
    pub tick: u64,
    pub dt: f32,
    pub pose: Pose,
    pub velocity: Vec3,
    pub state: Option<StateKind>,
    #[serde(default)]
    pub samples: Vec<ActionSample>,
    #[serde(default)]
    pub events: Vec<ControllerEvent>,
}

impl ControllerFrame {
    #[inline]
    pub fn push_event(&mut self, event: ControllerEvent) {
        self.events.push(event);
    }

    /// Weight of the named clip this tick, 0 when it does not contribute.
    pub fn weight_of(&self, clip: &str) -> f32 {
        self.samples
            .iter()
            .filter(|s| s.clip == clip)
            .map(|s| s.weight)
            .sum()
    }

    pub fn state_changes(&self) -> impl Iterator<Item = (Option<StateKind>, StateKind)> + '_ {
        self.events.iter().filter_map(|e| match e {
            ControllerEvent::StateChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
    }
}
