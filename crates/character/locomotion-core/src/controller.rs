//! Character controller: owns input, movement, animation playback and the state machine,
//! and runs them once per host frame.
//!
//! Per tick: drain queued input → drain loader events → integrate movement → step the
//! state machine → advance the mixer → return a [`ControllerFrame`].

use std::sync::Arc;

use glam::Vec3;

use crate::config::{ControllerConfig, TickMode};
use crate::error::{ControllerError, FsmError};
use crate::frame::{ControllerEvent, ControllerFrame};
use crate::fsm::{CharacterFsm, StateContext, StateKind};
use crate::input::{InputEvent, InputSender, InputState, InputTracker, Key};
use crate::integrator::{MovementIntegrator, Pose};
use crate::loader::{
    AssetSource, CharacterModel, FsAssetSource, LoadEvent, LoadPlan, LoadingHandle,
    LoadingManager,
};
use crate::mixer::AnimationMixer;
use crate::proxy::{AnimationEntry, AnimationProxy};

/// Host scene the loaded character is added to.
pub trait SceneGraph {
    fn add_character(&mut self, model: &CharacterModel);
}

/// Scene without a renderer; remembers what was added.
#[derive(Debug, Default)]
pub struct HeadlessScene {
    pub characters: Vec<CharacterModel>,
}

impl SceneGraph for HeadlessScene {
    fn add_character(&mut self, model: &CharacterModel) {
        self.characters.push(model.clone());
    }
}

#[derive(Debug)]
pub struct CharacterController {
    config: ControllerConfig,
    input: InputTracker,
    integrator: MovementIntegrator,
    velocity: Vec3,
    pose: Pose,
    mixer: AnimationMixer,
    proxy: AnimationProxy,
    fsm: CharacterFsm,
    loading: Option<LoadingHandle>,
    model: Option<CharacterModel>,
    tick: u64,
    ready: bool,
}

impl CharacterController {
    /// Validate `config` and start loading its assets from `source` in the background.
    pub fn new(
        config: ControllerConfig,
        source: Arc<dyn AssetSource>,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        let handle = LoadingManager::spawn(source, LoadPlan::from_config(&config))
            .map_err(ControllerError::Spawn)?;
        Ok(Self::with_loading(config, handle))
    }

    /// Load from JSON descriptors under `config.asset_root`.
    pub fn from_fs(config: ControllerConfig) -> Result<Self, ControllerError> {
        let source = Arc::new(FsAssetSource::new(&config.asset_root));
        Self::new(config, source)
    }

    /// Load every asset on the calling thread before returning. Results are still
    /// applied by the next [`update`](Self::update), like a background load.
    pub fn new_blocking(
        config: ControllerConfig,
        source: &dyn AssetSource,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        let handle = LoadingManager::run_blocking(source, &LoadPlan::from_config(&config));
        Ok(Self::with_loading(config, handle))
    }

    fn with_loading(config: ControllerConfig, handle: LoadingHandle) -> Self {
        Self {
            integrator: MovementIntegrator::from_config(&config),
            config,
            input: InputTracker::new(),
            velocity: Vec3::ZERO,
            pose: Pose::default(),
            mixer: AnimationMixer::new(),
            proxy: AnimationProxy::new(),
            fsm: CharacterFsm::new(),
            loading: Some(handle),
            model: None,
            tick: 0,
            ready: false,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Producer for key events from any thread; applied at the start of the next tick.
    pub fn input_sender(&self) -> InputSender {
        self.input.sender()
    }

    /// Apply a key event immediately.
    pub fn handle_input(&mut self, event: InputEvent) {
        self.input.apply(event);
    }

    pub fn key_down(&mut self, key: Key) {
        self.input.on_key_down(key);
    }

    pub fn key_up(&mut self, key: Key) {
        self.input.on_key_up(key);
    }

    pub fn input(&self) -> &InputState {
        self.input.state()
    }

    pub fn state(&self) -> Option<StateKind> {
        self.fsm.current_kind()
    }

    pub fn fsm(&self) -> &CharacterFsm {
        &self.fsm
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn proxy(&self) -> &AnimationProxy {
        &self.proxy
    }

    pub fn mixer(&self) -> &AnimationMixer {
        &self.mixer
    }

    pub fn model(&self) -> Option<&CharacterModel> {
        self.model.as_ref()
    }

    /// True once the initial state has been entered.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    /// The `dt` to pass to [`update`](Self::update) for a host frame lasting `host_dt`.
    pub fn frame_dt(&self, host_dt: f32) -> f32 {
        match self.config.tick {
            TickMode::Fixed { dt } => dt,
            TickMode::RealTime => host_dt,
        }
    }

    /// Force a state transition (hosts and tools; input normally drives this).
    /// Refused until loading has completed and the initial state is active.
    pub fn set_state(&mut self, kind: StateKind) -> Result<bool, ControllerError> {
        if !self.ready {
            return Err(ControllerError::NotReady);
        }
        Ok(self.enter_state(kind)?)
    }

    fn enter_state(&mut self, kind: StateKind) -> Result<bool, FsmError> {
        let mut ctx = StateContext {
            proxy: &self.proxy,
            mixer: &mut self.mixer,
            blend_duration: self.config.blend_duration,
        };
        self.fsm.set_state(kind, &mut ctx)
    }

    /// Block until the loader has finished, then apply everything it produced.
    pub fn wait_until_loaded(&mut self, scene: &mut dyn SceneGraph) -> Vec<ControllerEvent> {
        let mut frame = ControllerFrame::default();
        if let Some(handle) = self.loading.as_mut() {
            handle.join();
        }
        self.pump_loader(scene, &mut frame);
        frame.events
    }

    pub fn update(&mut self, dt: f32, scene: &mut dyn SceneGraph) -> ControllerFrame {
        self.tick += 1;
        let mut frame = ControllerFrame {
            tick: self.tick,
            dt,
            ..Default::default()
        };

        self.input.drain_events();
        self.pump_loader(scene, &mut frame);

        if self.model.is_some() {
            self.integrator
                .update(dt, self.input.state(), &mut self.velocity, &mut self.pose);

            let from = self.fsm.current_kind();
            let mut ctx = StateContext {
                proxy: &self.proxy,
                mixer: &mut self.mixer,
                blend_duration: self.config.blend_duration,
            };
            if let Err(e) = self.fsm.update(dt, self.input.state(), &mut ctx) {
                log::error!("state transition failed: {e}");
                frame.push_event(ControllerEvent::Error {
                    message: e.to_string(),
                });
            }
            if let Some(to) = self.fsm.current_kind().filter(|k| Some(*k) != from) {
                frame.push_event(ControllerEvent::StateChanged { from, to });
            }

            let (samples, events) = self.mixer.update(dt);
            frame.samples = samples;
            frame
                .events
                .extend(events.into_iter().map(ControllerEvent::Mixer));
        }

        frame.pose = self.pose;
        frame.velocity = self.velocity;
        frame.state = self.fsm.current_kind();
        frame
    }

    fn pump_loader(&mut self, scene: &mut dyn SceneGraph, frame: &mut ControllerFrame) {
        let Some(handle) = self.loading.as_ref() else {
            return;
        };
        // Checked before draining: a finished thread has queued everything it will send.
        let exited = handle.is_finished();
        let mut completed = false;

        for event in handle.poll() {
            match event {
                LoadEvent::Started { total, .. } => {
                    log::info!("loading character assets");
                    frame.push_event(ControllerEvent::LoadStarted { total });
                }
                LoadEvent::Progress { url, loaded, total } => {
                    log::info!("{url}: {loaded}/{total} loaded");
                    frame.push_event(ControllerEvent::LoadProgress {
                        path: url,
                        loaded,
                        total,
                    });
                }
                LoadEvent::ModelLoaded(model) => {
                    scene.add_character(&model);
                    frame.push_event(ControllerEvent::ModelLoaded {
                        name: model.name.clone(),
                    });
                    self.model = Some(model);
                }
                LoadEvent::ClipLoaded { name, mut clip } => {
                    // Actions are cached per clip name; key them by the logical name so
                    // clips exported under the same name stay distinct.
                    if clip.name != name {
                        log::debug!("clip '{}' bound as '{name}'", clip.name);
                        clip.name = name.clone();
                    }
                    let clip = Arc::new(clip);
                    let action = self.mixer.clip_action(Arc::clone(&clip));
                    self.proxy.insert(&name, AnimationEntry { clip, action });
                    frame.push_event(ControllerEvent::AnimationLoaded { name });
                }
                LoadEvent::Failed { url, error } => {
                    log::error!("failed to load {url}: {error}");
                    frame.push_event(ControllerEvent::AssetFailed {
                        path: url,
                        message: error.to_string(),
                    });
                }
                LoadEvent::Completed { loaded, failed } => {
                    log::info!("asset loading finished: {loaded} loaded, {failed} failed");
                    completed = true;
                }
            }
        }

        if !completed && exited {
            log::error!("asset loader stopped without completing");
            completed = true;
        }
        if completed {
            self.loading = None;
            self.finish_loading(frame);
        }
    }

    fn finish_loading(&mut self, frame: &mut ControllerFrame) {
        let required = self.config.required_animations();
        let missing = self.proxy.missing(required.iter().map(String::as_str));
        frame.push_event(ControllerEvent::LoadCompleted {
            missing: missing.clone(),
        });

        if self.model.is_none() {
            log::error!("character model did not load; controller stays inactive");
            return;
        }
        if !missing.is_empty() {
            log::warn!(
                "not entering initial state, missing animations: {}",
                missing.join(", ")
            );
            return;
        }

        match self.enter_state(StateKind::Idle) {
            Ok(false) => {
                log::warn!("initial state already active");
            }
            Ok(true) => {
                self.ready = true;
                frame.push_event(ControllerEvent::StateChanged {
                    from: None,
                    to: StateKind::Idle,
                });
            }
            Err(e) => {
                log::error!("could not enter initial state: {e}");
                frame.push_event(ControllerEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::AnimationClip;
    use crate::loader::MemoryAssetSource;

    fn approx(a: f32, b: f32, eps: f32) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    fn source(skip: Option<&str>) -> MemoryAssetSource {
        let cfg = ControllerConfig::default();
        let mut src = MemoryAssetSource::new()
            .with_model(&cfg.model_file, CharacterModel::new("zombie"));
        for (i, anim) in cfg.animations.iter().enumerate() {
            if Some(anim.name.as_str()) == skip {
                continue;
            }
            // Exported clips commonly share one generic name.
            src = src.with_clip(
                &anim.file,
                AnimationClip::new("mixamo.com", 1.0 + i as f32 * 0.25),
            );
        }
        src
    }

    fn controller(skip: Option<&str>) -> CharacterController {
        CharacterController::new_blocking(ControllerConfig::default(), &source(skip)).unwrap()
    }

    #[test]
    fn enters_idle_once_everything_loaded() {
        let mut c = controller(None);
        let mut scene = HeadlessScene::default();
        assert_eq!(c.state(), None);
        assert!(!c.is_ready());

        let frame = c.update(0.01, &mut scene);
        assert_eq!(frame.state, Some(StateKind::Idle));
        assert!(c.is_ready());
        assert!(!c.is_loading());
        assert_eq!(scene.characters.len(), 1);
        approx(scene.characters[0].scale, 0.1, 1e-6);
        assert!(frame
            .events
            .contains(&ControllerEvent::LoadCompleted { missing: vec![] }));
        assert_eq!(
            frame.state_changes().collect::<Vec<_>>(),
            vec![(None, StateKind::Idle)]
        );
        approx(frame.weight_of("idle"), 1.0, 1e-6);
        assert_eq!(c.proxy().len(), 4);
        assert_eq!(c.mixer().len(), 4);
    }

    #[test]
    fn missing_animation_keeps_controller_degraded() {
        let mut c = controller(Some("dance"));
        let mut scene = HeadlessScene::default();
        let frame = c.update(0.01, &mut scene);
        assert_eq!(frame.state, None);
        assert!(!c.is_ready());
        assert!(frame.events.contains(&ControllerEvent::LoadCompleted {
            missing: vec!["dance".to_string()]
        }));
        assert!(frame
            .events
            .iter()
            .any(|e| matches!(e, ControllerEvent::AssetFailed { path, .. } if path == "dancing.json")));
    }

    #[test]
    fn nothing_moves_without_a_model() {
        let cfg = ControllerConfig::default();
        let src = MemoryAssetSource::new();
        let mut c = CharacterController::new_blocking(cfg, &src).unwrap();
        let mut scene = HeadlessScene::default();
        c.key_down(Key::W);
        let frame = c.update(0.1, &mut scene);
        assert_eq!(frame.state, None);
        assert_eq!(frame.pose, Pose::default());
        assert!(frame.samples.is_empty());
        assert!(scene.characters.is_empty());
    }

    #[test]
    fn sprinting_forward_from_rest() {
        let mut c = controller(None);
        let mut scene = HeadlessScene::default();
        let tx = c.input_sender();
        tx.key_down(Key::W);
        tx.key_down(Key::Shift);

        let frame = c.update(0.1, &mut scene);
        approx(frame.velocity.z, 15.0, 1e-4);
        approx(frame.pose.position.z, 1.5, 1e-4);
        assert_eq!(
            frame.state_changes().collect::<Vec<_>>(),
            vec![(None, StateKind::Idle), (Some(StateKind::Idle), StateKind::Walk)]
        );
        approx(frame.weight_of("walk"), 0.2, 1e-4);
        approx(frame.weight_of("idle"), 0.8, 1e-4);

        let frame = c.update(0.1, &mut scene);
        assert_eq!(frame.state, Some(StateKind::Run));
    }

    #[test]
    fn dance_key_round_trip() {
        let mut c = controller(None);
        let mut scene = HeadlessScene::default();
        c.update(0.01, &mut scene);

        c.handle_input(InputEvent::Pressed(Key::D));
        assert_eq!(c.update(0.01, &mut scene).state, Some(StateKind::Dance));
        c.handle_input(InputEvent::Released(Key::D));
        assert_eq!(c.update(0.01, &mut scene).state, Some(StateKind::Idle));
    }

    #[test]
    fn forced_state_is_refused_while_degraded() {
        let mut c = controller(Some("run"));
        let mut scene = HeadlessScene::default();
        c.update(0.01, &mut scene);
        assert!(matches!(
            c.set_state(StateKind::Run),
            Err(ControllerError::NotReady)
        ));
        assert_eq!(c.state(), None);
    }

    #[test]
    fn forced_state_before_loading_does_not_preempt_idle() {
        let mut c = controller(None);
        let mut scene = HeadlessScene::default();
        assert!(matches!(
            c.set_state(StateKind::Idle),
            Err(ControllerError::NotReady)
        ));
        assert_eq!(c.state(), None);

        let frame = c.update(0.01, &mut scene);
        assert!(c.is_ready());
        assert_eq!(
            frame.state_changes().collect::<Vec<_>>(),
            vec![(None, StateKind::Idle)]
        );
        approx(frame.weight_of("idle"), 1.0, 1e-6);
        let idle = c.proxy().get("idle").unwrap().action;
        assert!(c.mixer().action(idle).unwrap().is_running());
    }

    #[test]
    fn forced_state_after_ready_cross_fades() {
        let mut c = controller(None);
        let mut scene = HeadlessScene::default();
        c.update(0.01, &mut scene);
        assert!(matches!(c.set_state(StateKind::Dance), Ok(true)));
        assert!(matches!(c.set_state(StateKind::Dance), Ok(false)));
        let dance = c.proxy().get("dance").unwrap().action;
        assert!(c.mixer().action(dance).unwrap().is_fading());
    }

    #[test]
    fn frame_dt_follows_tick_mode() {
        let c = controller(None);
        approx(c.frame_dt(0.5), 0.01, 1e-9);
        let cfg = ControllerConfig {
            tick: TickMode::RealTime,
            ..ControllerConfig::default()
        };
        let c = CharacterController::new_blocking(cfg, &source(None)).unwrap();
        approx(c.frame_dt(0.5), 0.5, 1e-9);
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = ControllerConfig {
            blend_duration: -1.0,
            ..ControllerConfig::default()
        };
        assert!(matches!(
            CharacterController::new_blocking(cfg, &source(None)),
            Err(ControllerError::Config(_))
        ));
    }
}
