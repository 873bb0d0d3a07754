//! Animation mixer: per-clip playback actions with fades, warps and loop handling.
//!
//! Methods:
//! - clip_action (one action per clip name), action / action_mut, cross_fade, update
//!
//! Actions are addressed by [`ActionId`]. Chainable controls are reached through
//! [`AnimationMixer::action_mut`], which borrows the action together with the mixer clock
//! so that fades and warps are scheduled relative to "now":
//!
//! ```ignore
//! mixer.action_mut(id)?.reset().fade_in(0.5).play();
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clip::AnimationClip;
use crate::frame::{ActionSample, MixerEvent};
use crate::ids::{ActionId, IdAllocator};

#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    #[default]
    Repeat,
    PingPong,
}

fn fmod(a: f32, b: f32) -> f32 {
    if b == 0.0 {
        return 0.0;
    }
    let m = a % b;
    if (m < 0.0 && b > 0.0) || (m > 0.0 && b < 0.0) {
        m + b
    } else {
        m
    }
}

/// Reflect t into [0, span] with ping-pong behavior, where period = 2 * span.
fn ping_pong(t: f32, span: f32) -> f32 {
    if span <= 0.0 {
        return 0.0;
    }
    let period = 2.0 * span;
    let m = fmod(t, period);
    if m <= span {
        m
    } else {
        period - m
    }
}

/// Linear ramp between two values over a window of mixer time.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Ramp {
    start: f32,
    end: f32,
    from: f32,
    to: f32,
}

impl Ramp {
    fn new(now: f32, duration: f32, from: f32, to: f32) -> Self {
        Self {
            start: now,
            end: now + duration.max(0.0),
            from,
            to,
        }
    }

    fn value_at(&self, t: f32) -> f32 {
        if t >= self.end {
            return self.to;
        }
        if t <= self.start {
            return self.from;
        }
        let u = (t - self.start) / (self.end - self.start);
        self.from + (self.to - self.from) * u
    }

    #[inline]
    fn done(&self, t: f32) -> bool {
        t >= self.end
    }
}

/// Stateful playback handle binding a clip to the character.
#[derive(Debug, Clone)]
pub struct Action {
    id: ActionId,
    clip: Arc<AnimationClip>,
    /// Unwrapped local time; wrapped on read according to `loop_mode`.
    raw_time: f32,
    time_scale: f32,
    weight: f32,
    enabled: bool,
    running: bool,
    paused: bool,
    finished: bool,
    loop_mode: LoopMode,
    fade: Option<Ramp>,
    warp: Option<Ramp>,
    effective_weight: f32,
    effective_time_scale: f32,
}

impl Action {
    fn new(id: ActionId, clip: Arc<AnimationClip>) -> Self {
        Self {
            id,
            clip,
            raw_time: 0.0,
            time_scale: 1.0,
            weight: 1.0,
            enabled: true,
            running: false,
            paused: false,
            finished: false,
            loop_mode: LoopMode::Repeat,
            fade: None,
            warp: None,
            effective_weight: 1.0,
            effective_time_scale: 1.0,
        }
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn clip(&self) -> &Arc<AnimationClip> {
        &self.clip
    }

    /// Clip-local time in seconds, wrapped by the loop mode.
    pub fn time(&self) -> f32 {
        let d = self.clip.duration;
        match self.loop_mode {
            LoopMode::Once => self.raw_time.min(d).max(0.0),
            LoopMode::Repeat => fmod(self.raw_time, d),
            LoopMode::PingPong => ping_pong(self.raw_time, d),
        }
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    pub fn is_warping(&self) -> bool {
        self.warp.is_some()
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    /// Weight the action contributes with after fades; 0 while disabled.
    pub fn effective_weight(&self) -> f32 {
        self.effective_weight
    }

    pub fn effective_time_scale(&self) -> f32 {
        self.effective_time_scale
    }

    fn loop_index(&self) -> f32 {
        let d = self.clip.duration;
        if d <= 0.0 {
            0.0
        } else {
            (self.raw_time / d).floor()
        }
    }

    fn update_time_scale(&mut self, now: f32) -> f32 {
        let mut ts = 0.0;
        if !self.paused {
            ts = self.time_scale;
            if let Some(warp) = self.warp {
                ts = warp.value_at(now);
                if warp.done(now) {
                    self.warp = None;
                    if ts == 0.0 {
                        self.paused = true;
                    } else {
                        self.time_scale = ts;
                    }
                }
            }
        }
        self.effective_time_scale = ts;
        ts
    }

    fn update_weight(&mut self, now: f32, events: &mut Vec<MixerEvent>) -> f32 {
        let mut w = 0.0;
        if self.enabled {
            w = self.weight;
            if let Some(fade) = self.fade {
                let v = fade.value_at(now);
                w *= v;
                if fade.done(now) {
                    self.fade = None;
                    if v == 0.0 {
                        self.enabled = false;
                    }
                    events.push(MixerEvent::FadeCompleted {
                        action: self.id,
                        clip: self.clip.name.clone(),
                        weight: v,
                    });
                }
            }
        }
        self.effective_weight = w;
        w
    }

    fn advance(&mut self, delta: f32, events: &mut Vec<MixerEvent>) {
        if delta == 0.0 || self.finished {
            return;
        }
        let d = self.clip.duration;
        match self.loop_mode {
            LoopMode::Once => {
                let t = self.raw_time + delta;
                self.raw_time = t.min(d).max(0.0);
                if t >= d || t <= 0.0 {
                    self.finished = true;
                    events.push(MixerEvent::Finished {
                        action: self.id,
                        clip: self.clip.name.clone(),
                    });
                }
            }
            LoopMode::Repeat | LoopMode::PingPong => {
                let before = self.loop_index();
                self.raw_time += delta;
                if self.loop_index() != before {
                    events.push(MixerEvent::Looped {
                        action: self.id,
                        clip: self.clip.name.clone(),
                    });
                }
            }
        }
    }

    fn update(&mut self, now: f32, dt: f32, events: &mut Vec<MixerEvent>) {
        if !self.enabled {
            self.update_weight(now, events);
            return;
        }
        let ts = self.update_time_scale(now);
        self.advance(dt * ts, events);
        self.update_weight(now, events);
    }
}

/// Chainable controls over one action, borrowed from the mixer.
pub struct ActionMut<'a> {
    action: &'a mut Action,
    now: f32,
}

impl<'a> ActionMut<'a> {
    /// Rewind and re-enable; clears any fade or warp in progress.
    pub fn reset(self) -> Self {
        let a = &mut *self.action;
        a.paused = false;
        a.enabled = true;
        a.finished = false;
        a.raw_time = 0.0;
        a.fade = None;
        a.warp = None;
        self
    }

    pub fn play(self) -> Self {
        self.action.running = true;
        self
    }

    pub fn stop(self) -> Self {
        self.action.running = false;
        self.reset()
    }

    pub fn fade_in(self, duration: f32) -> Self {
        self.action.fade = Some(Ramp::new(self.now, duration, 0.0, 1.0));
        self
    }

    pub fn fade_out(self, duration: f32) -> Self {
        self.action.fade = Some(Ramp::new(self.now, duration, 1.0, 0.0));
        self
    }

    /// Ramp the effective time scale from `start` to `end` over `duration`.
    pub fn warp(self, start: f32, end: f32, duration: f32) -> Self {
        self.action.warp = Some(Ramp::new(self.now, duration, start, end));
        self
    }

    pub fn set_time(self, time: f32) -> Self {
        self.action.raw_time = time;
        self.action.finished = false;
        self
    }

    pub fn set_enabled(self, enabled: bool) -> Self {
        self.action.enabled = enabled;
        self
    }

    pub fn set_loop(self, mode: LoopMode) -> Self {
        self.action.loop_mode = mode;
        self
    }

    /// Set the base weight immediately, cancelling any fade.
    pub fn set_effective_weight(self, weight: f32) -> Self {
        let a = &mut *self.action;
        a.weight = weight;
        a.effective_weight = if a.enabled { weight } else { 0.0 };
        a.fade = None;
        self
    }

    /// Set the base time scale immediately, cancelling any warp.
    pub fn set_effective_time_scale(self, time_scale: f32) -> Self {
        let a = &mut *self.action;
        a.time_scale = time_scale;
        a.effective_time_scale = if a.paused { 0.0 } else { time_scale };
        a.warp = None;
        self
    }

    pub fn get(&self) -> &Action {
        self.action
    }
}

/// Owns every action bound to the character and the mixer clock.
#[derive(Debug, Default)]
pub struct AnimationMixer {
    time: f32,
    ids: IdAllocator,
    actions: Vec<Action>,
    by_clip: hashbrown::HashMap<String, ActionId>,
}

impl AnimationMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mixer clock in seconds (sum of all `dt` passed to `update`).
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Return the action bound to `clip`, creating it on first request.
    pub fn clip_action(&mut self, clip: Arc<AnimationClip>) -> ActionId {
        if let Some(id) = self.by_clip.get(&clip.name) {
            return *id;
        }
        let id = self.ids.alloc_action();
        self.by_clip.insert(clip.name.clone(), id);
        self.actions.push(Action::new(id, clip));
        id
    }

    pub fn existing_action(&self, clip_name: &str) -> Option<ActionId> {
        self.by_clip.get(clip_name).copied()
    }

    pub fn action(&self, id: ActionId) -> Option<&Action> {
        self.actions.get(id.0 as usize)
    }

    pub fn action_mut(&mut self, id: ActionId) -> Option<ActionMut<'_>> {
        let now = self.time;
        self.actions
            .get_mut(id.0 as usize)
            .map(|action| ActionMut { action, now })
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    /// Fade `from` out and `to` in over `duration`. With `warp`, the two clips' speeds are
    /// matched during the blend so their cycles line up.
    pub fn cross_fade(&mut self, from: ActionId, to: ActionId, duration: f32, warp: bool) {
        let (from_len, to_len) = match (self.action(from), self.action(to)) {
            (Some(f), Some(t)) => (f.clip.duration, t.clip.duration),
            _ => return,
        };
        if let Some(out) = self.action_mut(from) {
            let out = out.fade_out(duration);
            if warp && to_len > 0.0 {
                out.warp(1.0, from_len / to_len, duration);
            }
        }
        if let Some(inn) = self.action_mut(to) {
            let inn = inn.fade_in(duration);
            if warp && from_len > 0.0 {
                inn.warp(to_len / from_len, 1.0, duration);
            }
        }
    }

    /// Advance the mixer clock and every running action by `dt` seconds.
    pub fn update(&mut self, dt: f32) -> (Vec<ActionSample>, Vec<MixerEvent>) {
        self.time += dt;
        let now = self.time;
        let mut events = Vec::new();
        let mut samples = Vec::new();

        for action in self.actions.iter_mut().filter(|a| a.running) {
            action.update(now, dt, &mut events);
            if action.effective_weight > 0.0 {
                samples.push(ActionSample {
                    action: action.id,
                    clip: action.clip.name.clone(),
                    time: action.time(),
                    weight: action.effective_weight,
                });
            }
        }

        (samples, events)
    }
}
