//! Controller configuration.
//!
//! Every field has a default matching the tuned values the character shipped with, so an
//! empty JSON object (`{}`) is a complete configuration.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How the host should derive the per-frame `dt` handed to the controller.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TickMode {
    /// Constant step per rendered frame, independent of wall-clock time.
    Fixed { dt: f32 },
    /// Use the host's measured frame delta.
    RealTime,
}

impl Default for TickMode {
    fn default() -> Self {
        TickMode::Fixed { dt: 0.01 }
    }
}

/// One animation to load: logical name (the FSM looks clips up by this) and file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationAsset {
    pub name: String,
    pub file: String,
}

impl AnimationAsset {
    pub fn new(name: &str, file: &str) -> Self {
        Self {
            name: name.to_string(),
            file: file.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Per-axis velocity decay coefficients (lateral, vertical, forward).
    pub deceleration: Vec3,
    /// Per-axis acceleration; `y` doubles as the turn-rate constant.
    pub acceleration: Vec3,
    /// Acceleration multiplier while sprint is held.
    pub sprint_multiplier: f32,
    /// Fraction of the forward acceleration applied per second of input.
    pub forward_impulse: f32,
    /// Crossfade length, in seconds, between state animations.
    pub blend_duration: f32,
    pub tick: TickMode,

    /// Directory all asset paths are relative to.
    pub asset_root: String,
    pub model_file: String,
    pub model_scale: f32,
    pub cast_shadows: bool,
    pub animations: Vec<AnimationAsset>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            deceleration: Vec3::new(-0.0005, -0.0001, -5.0),
            acceleration: Vec3::new(1.0, 0.25, 100.0),
            sprint_multiplier: 3.0,
            forward_impulse: 0.5,
            blend_duration: 0.5,
            tick: TickMode::default(),
            asset_root: "resources/zombie".to_string(),
            model_file: "mremireh_o_desbiens.json".to_string(),
            model_scale: 0.1,
            cast_shadows: true,
            animations: vec![
                AnimationAsset::new("walk", "walk.json"),
                AnimationAsset::new("run", "run.json"),
                AnimationAsset::new("idle", "idle.json"),
                AnimationAsset::new("dance", "dancing.json"),
            ],
        }
    }
}

impl ControllerConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: ControllerConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Reject values the integrator or mixer cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.blend_duration.is_finite() || self.blend_duration < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "blend_duration must be finite and >= 0, got {}",
                self.blend_duration
            )));
        }
        if let TickMode::Fixed { dt } = self.tick {
            if !dt.is_finite() || dt <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "fixed tick dt must be > 0, got {dt}"
                )));
            }
        }
        if !self.model_scale.is_finite() || self.model_scale <= 0.0 {
            return Err(ConfigError::Invalid("model_scale must be > 0".into()));
        }
        if !(self.deceleration.is_finite() && self.acceleration.is_finite()) {
            return Err(ConfigError::Invalid(
                "deceleration/acceleration must be finite".into(),
            ));
        }
        let mut seen = hashbrown::HashSet::new();
        for anim in &self.animations {
            if !seen.insert(anim.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "animation '{}' listed twice",
                    anim.name
                )));
            }
        }
        Ok(())
    }

    /// Animation names the controller waits for before entering the initial state.
    pub fn required_animations(&self) -> Vec<String> {
        self.animations.iter().map(|a| a.name.clone()).collect()
    }
}
