//! Read-only view of the loaded animations, keyed by logical name.
//!
//! The controller fills it in as clips finish loading; states only ever read it.

use std::sync::Arc;

use crate::clip::AnimationClip;
use crate::ids::ActionId;

/// A loaded clip and the character's playback action for it.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationEntry {
    pub clip: Arc<AnimationClip>,
    pub action: ActionId,
}

#[derive(Debug, Default)]
pub struct AnimationProxy {
    entries: hashbrown::HashMap<String, AnimationEntry>,
}

impl AnimationProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: &str, entry: AnimationEntry) {
        self.entries.insert(name.to_string(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&AnimationEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Names from `required` that have no entry yet, in the order given.
    pub fn missing<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        required
            .into_iter()
            .filter(|n| !self.contains(n))
            .map(str::to_string)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnimationEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
