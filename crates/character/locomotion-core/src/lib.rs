//! Locomotion Core (engine-agnostic)
//!
//! Drives a single keyboard-controlled character: an input tracker turns key events into
//! logical flags, a movement integrator moves the character, and a finite-state machine
//! (idle / walk / run / dance) cross-fades animation actions owned by a small mixer.
//! Hosts (Bevy, headless tools) feed key events and call [`CharacterController::update`]
//! once per frame.

pub mod clip;
pub mod config;
pub mod controller;
pub mod error;
pub mod frame;
pub mod fsm;
pub mod ids;
pub mod input;
pub mod integrator;
pub mod loader;
pub mod mixer;
pub mod proxy;

// Re-exports for consumers (adapters)
pub use clip::{parse_clip_json, AnimationClip, ClipTrack};
pub use config::{AnimationAsset, ControllerConfig, TickMode};
pub use controller::{CharacterController, HeadlessScene, SceneGraph};
pub use error::{ConfigError, ControllerError, FsmError, LoadError};
pub use frame::{ActionSample, ControllerEvent, ControllerFrame, MixerEvent};
pub use fsm::{CharacterFsm, CharacterState, StateContext, StateKind};
pub use ids::{ActionId, IdAllocator};
pub use input::{InputEvent, InputSender, InputState, InputTracker, Key};
pub use integrator::{MovementIntegrator, Pose};
pub use loader::{
    AssetSource, CharacterModel, FsAssetSource, LoadEvent, LoadPlan, LoadingHandle,
    LoadingManager, MemoryAssetSource,
};
pub use mixer::{Action, AnimationMixer, LoopMode};
pub use proxy::{AnimationEntry, AnimationProxy};
