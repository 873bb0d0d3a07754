//! Character animation state machine.
//!
//! One state is active at a time. Each frame the active state inspects the input and
//! may request a transition; the machine applies it through [`CharacterFsm::set_state`],
//! which exits the outgoing state, installs a fresh instance of the new one and enters
//! it. States never talk to each other directly.
//!
//! | From  | Condition (first match wins)         | To    |
//! |-------|--------------------------------------|-------|
//! | Idle  | dance                                | Dance |
//! | Idle  | forward or backward                  | Walk  |
//! | Walk  | dance                                | Dance |
//! | Walk  | moving and sprint                    | Run   |
//! | Walk  | not moving                           | Idle  |
//! | Run   | dance                                | Dance |
//! | Run   | moving and not sprint                | Walk  |
//! | Run   | not moving                           | Idle  |
//! | Dance | dance released                       | Idle  |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FsmError;
use crate::ids::ActionId;
use crate::input::InputState;
use crate::mixer::AnimationMixer;
use crate::proxy::AnimationProxy;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    Idle,
    Walk,
    Run,
    Dance,
}

impl StateKind {
    pub const ALL: [StateKind; 4] = [
        StateKind::Idle,
        StateKind::Walk,
        StateKind::Run,
        StateKind::Dance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StateKind::Idle => "idle",
            StateKind::Walk => "walk",
            StateKind::Run => "run",
            StateKind::Dance => "dance",
        }
    }

    /// Name of the animation this state plays; looked up in the proxy on enter.
    pub fn animation(self) -> &'static str {
        self.name()
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StateKind {
    type Err = FsmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| FsmError::UnknownState(s.to_string()))
    }
}

/// What a state may touch while entering or exiting: the loaded animations (read-only)
/// and the mixer that owns their actions.
pub struct StateContext<'a> {
    pub proxy: &'a AnimationProxy,
    pub mixer: &'a mut AnimationMixer,
    pub blend_duration: f32,
}

pub trait CharacterState: Send + Sync + fmt::Debug {
    fn kind(&self) -> StateKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Seconds spent in this state instance.
    fn elapsed(&self) -> f32;

    fn enter(
        &mut self,
        previous: Option<&dyn CharacterState>,
        ctx: &mut StateContext<'_>,
    ) -> Result<(), FsmError>;

    fn exit(&mut self, _ctx: &mut StateContext<'_>) -> Result<(), FsmError> {
        Ok(())
    }

    /// Per-frame tick; returns the state to switch to, if any.
    fn update(&mut self, dt: f32, input: &InputState) -> Option<StateKind>;
}

fn action_for(
    proxy: &AnimationProxy,
    state: StateKind,
    animation: &str,
) -> Result<ActionId, FsmError> {
    proxy
        .get(animation)
        .map(|e| e.action)
        .ok_or_else(|| FsmError::MissingAnimation {
            state: state.name(),
            animation: animation.to_string(),
        })
}

/// Start `kind`'s action, cross-fading from the previous state's action when there is one.
fn blend_in(
    kind: StateKind,
    previous: Option<&dyn CharacterState>,
    ctx: &mut StateContext<'_>,
) -> Result<(), FsmError> {
    let action = action_for(ctx.proxy, kind, kind.animation())?;
    let Some(prev) = previous else {
        if let Some(a) = ctx.mixer.action_mut(action) {
            a.play();
        }
        return Ok(());
    };
    let prev_action = action_for(ctx.proxy, kind, prev.kind().animation())?;
    let d = ctx.blend_duration;
    if let Some(a) = ctx.mixer.action_mut(action) {
        a.reset().fade_in(d).play();
    }
    if let Some(p) = ctx.mixer.action_mut(prev_action) {
        p.fade_out(d);
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct IdleState {
    elapsed: f32,
}

impl CharacterState for IdleState {
    fn kind(&self) -> StateKind {
        StateKind::Idle
    }

    fn elapsed(&self) -> f32 {
        self.elapsed
    }

    fn enter(
        &mut self,
        previous: Option<&dyn CharacterState>,
        ctx: &mut StateContext<'_>,
    ) -> Result<(), FsmError> {
        blend_in(StateKind::Idle, previous, ctx)
    }

    fn update(&mut self, dt: f32, input: &InputState) -> Option<StateKind> {
        self.elapsed += dt;
        if input.dance {
            Some(StateKind::Dance)
        } else if input.moving() {
            Some(StateKind::Walk)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct WalkState {
    elapsed: f32,
}

impl CharacterState for WalkState {
    fn kind(&self) -> StateKind {
        StateKind::Walk
    }

    fn elapsed(&self) -> f32 {
        self.elapsed
    }

    fn enter(
        &mut self,
        previous: Option<&dyn CharacterState>,
        ctx: &mut StateContext<'_>,
    ) -> Result<(), FsmError> {
        blend_in(StateKind::Walk, previous, ctx)
    }

    fn update(&mut self, dt: f32, input: &InputState) -> Option<StateKind> {
        self.elapsed += dt;
        if input.dance {
            Some(StateKind::Dance)
        } else if input.moving() {
            input.sprint.then_some(StateKind::Run)
        } else {
            Some(StateKind::Idle)
        }
    }
}

#[derive(Debug, Default)]
pub struct RunState {
    elapsed: f32,
}

impl CharacterState for RunState {
    fn kind(&self) -> StateKind {
        StateKind::Run
    }

    fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Run restarts its loop from a clean slate before blending so the stride always
    /// begins at frame zero.
    fn enter(
        &mut self,
        previous: Option<&dyn CharacterState>,
        ctx: &mut StateContext<'_>,
    ) -> Result<(), FsmError> {
        let action = action_for(ctx.proxy, StateKind::Run, StateKind::Run.animation())?;
        let Some(prev) = previous else {
            if let Some(a) = ctx.mixer.action_mut(action) {
                a.play();
            }
            return Ok(());
        };
        let prev_action = action_for(ctx.proxy, StateKind::Run, prev.kind().animation())?;
        if let Some(a) = ctx.mixer.action_mut(action) {
            a.set_time(0.0)
                .set_enabled(true)
                .set_effective_time_scale(1.0)
                .set_effective_weight(1.0);
        }
        ctx.mixer
            .cross_fade(prev_action, action, ctx.blend_duration, true);
        if let Some(a) = ctx.mixer.action_mut(action) {
            a.play();
        }
        Ok(())
    }

    fn update(&mut self, dt: f32, input: &InputState) -> Option<StateKind> {
        self.elapsed += dt;
        if input.dance {
            return Some(StateKind::Dance);
        }
        if input.moving() {
            return (!input.sprint).then_some(StateKind::Walk);
        }
        Some(StateKind::Idle)
    }
}

#[derive(Debug, Default)]
pub struct DanceState {
    elapsed: f32,
}

impl CharacterState for DanceState {
    fn kind(&self) -> StateKind {
        StateKind::Dance
    }

    fn elapsed(&self) -> f32 {
        self.elapsed
    }

    fn enter(
        &mut self,
        previous: Option<&dyn CharacterState>,
        ctx: &mut StateContext<'_>,
    ) -> Result<(), FsmError> {
        blend_in(StateKind::Dance, previous, ctx)
    }

    fn exit(&mut self, ctx: &mut StateContext<'_>) -> Result<(), FsmError> {
        let action = action_for(ctx.proxy, StateKind::Dance, StateKind::Dance.animation())?;
        if let Some(a) = ctx.mixer.action_mut(action) {
            a.fade_out(ctx.blend_duration);
        }
        Ok(())
    }

    /// Dancing only ever ends in idle, whatever movement keys are held.
    fn update(&mut self, dt: f32, input: &InputState) -> Option<StateKind> {
        self.elapsed += dt;
        (!input.dance).then_some(StateKind::Idle)
    }
}

pub type StateFactory = fn() -> Box<dyn CharacterState>;

#[derive(Debug)]
pub struct CharacterFsm {
    states: hashbrown::HashMap<StateKind, StateFactory>,
    current: Option<Box<dyn CharacterState>>,
    generation: u64,
}

impl Default for CharacterFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl CharacterFsm {
    /// Machine with the four built-in states registered and no active state.
    pub fn new() -> Self {
        let mut fsm = Self {
            states: hashbrown::HashMap::new(),
            current: None,
            generation: 0,
        };
        fsm.add_state(StateKind::Idle, || Box::<IdleState>::default());
        fsm.add_state(StateKind::Walk, || Box::<WalkState>::default());
        fsm.add_state(StateKind::Run, || Box::<RunState>::default());
        fsm.add_state(StateKind::Dance, || Box::<DanceState>::default());
        fsm
    }

    /// Register (or replace) the factory used to build `kind` on each transition.
    pub fn add_state(&mut self, kind: StateKind, factory: StateFactory) {
        self.states.insert(kind, factory);
    }

    pub fn current(&self) -> Option<&dyn CharacterState> {
        self.current.as_deref()
    }

    pub fn current_kind(&self) -> Option<StateKind> {
        self.current.as_ref().map(|s| s.kind())
    }

    /// Number of transitions performed so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Switch to `kind`. Returns `Ok(false)` without side effects when `kind` is already
    /// active. An error from exit/enter is reported after the switch has happened.
    pub fn set_state(
        &mut self,
        kind: StateKind,
        ctx: &mut StateContext<'_>,
    ) -> Result<bool, FsmError> {
        let from = self.current_kind();
        if from == Some(kind) {
            return Ok(false);
        }
        let factory = self
            .states
            .get(&kind)
            .ok_or(FsmError::Unregistered { state: kind })?;
        let next = factory();

        let mut previous = self.current.take();
        let exited = match previous.as_mut() {
            Some(prev) => prev.exit(ctx),
            None => Ok(()),
        };

        log::debug!("character state {from:?} -> {kind}");
        self.generation += 1;
        let state = self.current.insert(next);
        let entered = state.enter(previous.as_deref(), ctx);

        exited.and(entered).map(|_| true)
    }

    pub fn set_state_by_name(
        &mut self,
        name: &str,
        ctx: &mut StateContext<'_>,
    ) -> Result<bool, FsmError> {
        let kind = name.parse::<StateKind>()?;
        self.set_state(kind, ctx)
    }

    /// Tick the active state and apply the transition it requests.
    /// Returns the new state when a transition happened.
    pub fn update(
        &mut self,
        dt: f32,
        input: &InputState,
        ctx: &mut StateContext<'_>,
    ) -> Result<Option<StateKind>, FsmError> {
        let Some(state) = self.current.as_mut() else {
            return Ok(None);
        };
        match state.update(dt, input) {
            Some(next) => Ok(self.set_state(next, ctx)?.then_some(next)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::AnimationClip;
    use crate::proxy::AnimationEntry;
    use std::sync::Arc;

    struct Rig {
        proxy: AnimationProxy,
        mixer: AnimationMixer,
        fsm: CharacterFsm,
    }

    impl Rig {
        fn new(names: &[&str]) -> Self {
            let mut proxy = AnimationProxy::new();
            let mut mixer = AnimationMixer::new();
            for (i, name) in names.iter().enumerate() {
                let clip = Arc::new(AnimationClip::new(name, 1.0 + i as f32 * 0.25));
                let action = mixer.clip_action(clip.clone());
                proxy.insert(name, AnimationEntry { clip, action });
            }
            Self {
                proxy,
                mixer,
                fsm: CharacterFsm::new(),
            }
        }

        fn full() -> Self {
            Self::new(&["idle", "walk", "run", "dance"])
        }

        fn set(&mut self, kind: StateKind) -> Result<bool, FsmError> {
            let mut ctx = StateContext {
                proxy: &self.proxy,
                mixer: &mut self.mixer,
                blend_duration: 0.5,
            };
            self.fsm.set_state(kind, &mut ctx)
        }

        fn tick(&mut self, input: InputState) -> Option<StateKind> {
            let mut ctx = StateContext {
                proxy: &self.proxy,
                mixer: &mut self.mixer,
                blend_duration: 0.5,
            };
            let next = self.fsm.update(0.1, &input, &mut ctx).unwrap();
            self.mixer.update(0.1);
            next
        }

        fn action(&self, name: &str) -> &crate::mixer::Action {
            let id = self.proxy.get(name).unwrap().action;
            self.mixer.action(id).unwrap()
        }
    }

    fn keys(f: impl FnOnce(&mut InputState)) -> InputState {
        let mut s = InputState::default();
        f(&mut s);
        s
    }

    #[test]
    fn parses_state_names() {
        assert_eq!("dance".parse::<StateKind>(), Ok(StateKind::Dance));
        assert_eq!(
            "jump".parse::<StateKind>(),
            Err(FsmError::UnknownState("jump".into()))
        );
    }

    #[test]
    fn no_state_until_first_transition() {
        let mut rig = Rig::full();
        assert!(rig.fsm.current().is_none());
        assert_eq!(rig.tick(keys(|k| k.forward = true)), None);
        assert_eq!(rig.fsm.generation(), 0);
    }

    #[test]
    fn initial_enter_plays_without_fading() {
        let mut rig = Rig::full();
        assert_eq!(rig.set(StateKind::Idle), Ok(true));
        let idle = rig.action("idle");
        assert!(idle.is_running());
        assert!(!idle.is_fading());
    }

    /// it should keep the active instance when asked to enter the state it is already in
    #[test]
    fn redundant_set_state_is_a_no_op() {
        let mut rig = Rig::full();
        rig.set(StateKind::Idle).unwrap();
        rig.tick(InputState::default());
        rig.tick(InputState::default());
        let elapsed = rig.fsm.current().unwrap().elapsed();
        let gen = rig.fsm.generation();
        let t = rig.action("idle").time();

        assert_eq!(rig.set(StateKind::Idle), Ok(false));
        assert_eq!(rig.fsm.generation(), gen);
        assert!((rig.fsm.current().unwrap().elapsed() - elapsed).abs() < 1e-6);
        // Not re-entered: no reset, no fade.
        assert!((rig.action("idle").time() - t).abs() < 1e-6);
        assert!(!rig.action("idle").is_fading());
    }

    #[test]
    fn idle_walk_idle_round_trip() {
        let mut rig = Rig::full();
        rig.set(StateKind::Idle).unwrap();
        assert_eq!(rig.tick(keys(|k| k.forward = true)), Some(StateKind::Walk));
        assert_eq!(rig.tick(keys(|k| k.forward = true)), None);
        assert_eq!(rig.tick(InputState::default()), Some(StateKind::Idle));
        assert_eq!(rig.fsm.current_kind(), Some(StateKind::Idle));
    }

    #[test]
    fn backward_also_walks() {
        let mut rig = Rig::full();
        rig.set(StateKind::Idle).unwrap();
        assert_eq!(rig.tick(keys(|k| k.backward = true)), Some(StateKind::Walk));
    }

    #[test]
    fn sprint_toggles_between_walk_and_run() {
        let mut rig = Rig::full();
        rig.set(StateKind::Walk).unwrap();
        let sprinting = keys(|k| {
            k.forward = true;
            k.sprint = true;
        });
        assert_eq!(rig.tick(sprinting), Some(StateKind::Run));
        assert_eq!(rig.tick(sprinting), None);
        assert_eq!(rig.tick(keys(|k| k.forward = true)), Some(StateKind::Walk));
    }

    #[test]
    fn sprint_alone_from_idle_only_walks() {
        let mut rig = Rig::full();
        rig.set(StateKind::Idle).unwrap();
        let sprinting = keys(|k| {
            k.forward = true;
            k.sprint = true;
        });
        assert_eq!(rig.tick(sprinting), Some(StateKind::Walk));
        assert_eq!(rig.tick(sprinting), Some(StateKind::Run));
    }

    #[test]
    fn run_stops_to_idle() {
        let mut rig = Rig::full();
        rig.set(StateKind::Run).unwrap();
        assert_eq!(rig.tick(keys(|k| k.sprint = true)), Some(StateKind::Idle));
    }

    #[test]
    fn dance_reachable_from_every_moving_state() {
        for start in [StateKind::Idle, StateKind::Walk, StateKind::Run] {
            let mut rig = Rig::full();
            rig.set(start).unwrap();
            let input = keys(|k| {
                k.dance = true;
                k.forward = true;
                k.sprint = true;
            });
            assert_eq!(rig.tick(input), Some(StateKind::Dance), "from {start}");
        }
    }

    #[test]
    fn dance_release_always_goes_to_idle() {
        let mut rig = Rig::full();
        rig.set(StateKind::Dance).unwrap();
        let held = keys(|k| {
            k.forward = true;
            k.sprint = true;
        });
        assert_eq!(rig.tick(held), Some(StateKind::Idle));
        // Walk only follows on the next frame, from idle.
        assert_eq!(rig.tick(held), Some(StateKind::Walk));
    }

    #[test]
    fn transition_cross_fades_actions() {
        let mut rig = Rig::full();
        rig.set(StateKind::Idle).unwrap();
        rig.tick(InputState::default());
        rig.tick(keys(|k| k.forward = true)); // idle -> walk, then mixer +0.1
        let walk = rig.action("walk");
        let idle = rig.action("idle");
        assert!((walk.effective_weight() - 0.2).abs() < 1e-4);
        assert!((idle.effective_weight() - 0.8).abs() < 1e-4);
        for _ in 0..5 {
            rig.tick(keys(|k| k.forward = true));
        }
        assert!(!rig.action("idle").is_enabled());
        assert!((rig.action("walk").effective_weight() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn run_enter_restarts_and_warps() {
        let mut rig = Rig::full();
        rig.set(StateKind::Walk).unwrap();
        rig.tick(keys(|k| k.forward = true));
        let run_id = rig.proxy.get("run").unwrap().action;
        rig.mixer
            .action_mut(run_id)
            .unwrap()
            .set_time(0.7)
            .set_effective_weight(0.2);

        rig.set(StateKind::Run).unwrap();
        let run = rig.action("run");
        assert_eq!(run.time(), 0.0);
        assert_eq!(run.weight(), 1.0);
        assert!(run.is_running());
        assert!(run.is_fading());
        assert!(run.is_warping());
        assert!(rig.action("walk").is_warping());
    }

    #[test]
    fn leaving_dance_fades_it_out() {
        let mut rig = Rig::full();
        rig.set(StateKind::Dance).unwrap();
        rig.tick(keys(|k| k.dance = true));
        rig.tick(InputState::default());
        assert_eq!(rig.fsm.current_kind(), Some(StateKind::Idle));
        assert!(rig.action("dance").is_fading());
        assert!(rig.action("idle").is_running());
    }

    #[test]
    fn entering_state_without_animation_reports_lookup_failure() {
        let mut rig = Rig::new(&["idle", "walk"]);
        rig.set(StateKind::Idle).unwrap();
        let err = rig.set(StateKind::Dance).unwrap_err();
        assert_eq!(
            err,
            FsmError::MissingAnimation {
                state: "dance",
                animation: "dance".into()
            }
        );
        // The switch itself still happened.
        assert_eq!(rig.fsm.current_kind(), Some(StateKind::Dance));
    }

    #[test]
    fn each_transition_builds_a_fresh_instance() {
        let mut rig = Rig::full();
        rig.set(StateKind::Idle).unwrap();
        rig.tick(InputState::default());
        rig.set(StateKind::Walk).unwrap();
        rig.set(StateKind::Idle).unwrap();
        assert_eq!(rig.fsm.current().unwrap().elapsed(), 0.0);
        assert_eq!(rig.fsm.generation(), 3);
    }
}
