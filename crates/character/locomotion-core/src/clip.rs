//! Animation clip model and its JSON descriptor format.
//!
//! A clip is reusable curve data independent of any character instance. The controller
//! only needs its name, length and the targets it animates; keyframes stay with the
//! host renderer.

use serde::{Deserialize, Serialize};

/// One animated target (typically a bone) inside a clip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipTrack {
    pub target: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    /// Length in seconds.
    pub duration: f32,
    #[serde(default)]
    pub tracks: Vec<ClipTrack>,
}

impl AnimationClip {
    pub fn new(name: &str, duration: f32) -> Self {
        Self {
            name: name.to_string(),
            duration,
            tracks: Vec::new(),
        }
    }

    /// Validate basic invariants (finite, non-zero duration; non-empty name).
    pub fn validate_basic(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("clip name must not be empty".into());
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(format!(
                "clip '{}' duration must be > 0 s, got {}",
                self.name, self.duration
            ));
        }
        Ok(())
    }
}

/// Parse a clip descriptor: `{"name", "duration" (ms), "tracks": [{"target"}]}`.
pub fn parse_clip_json(s: &str) -> Result<AnimationClip, serde_json::Error> {
    let raw: StoredClip = serde_json::from_str(s)?;
    Ok(AnimationClip {
        name: raw.name,
        duration: raw.duration as f32 / 1000.0,
        tracks: raw
            .tracks
            .into_iter()
            .map(|t| ClipTrack { target: t.target })
            .collect(),
    })
}

// ----- JSON schema (serde) -----

#[derive(Debug, Deserialize)]
struct StoredClip {
    name: String,
    duration: u64, // milliseconds
    #[serde(default)]
    tracks: Vec<StoredTrack>,
}

#[derive(Debug, Deserialize)]
struct StoredTrack {
    target: String,
}
