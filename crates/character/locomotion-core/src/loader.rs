//! Asset loading off the frame loop.
//!
//! A [`LoadingManager`] walks a [`LoadPlan`]: first the character model, then every
//! animation clip. Progress is reported as [`LoadEvent`]s over a channel that the
//! controller drains once per tick; [`LoadEvent::Completed`] is the single "all done"
//! signal, sent even when some assets failed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::clip::{parse_clip_json, AnimationClip};
use crate::config::{AnimationAsset, ControllerConfig};
use crate::error::LoadError;

/// The loaded character: what the host adds to its scene graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CharacterModel {
    pub name: String,
    #[serde(default)]
    pub meshes: Vec<String>,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub cast_shadows: bool,
}

fn default_scale() -> f32 {
    1.0
}

impl CharacterModel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            meshes: Vec::new(),
            scale: 1.0,
            cast_shadows: false,
        }
    }
}

/// Where models and clips come from. Implementations must be shareable with the
/// loading thread.
pub trait AssetSource: Send + Sync + 'static {
    fn load_model(&self, path: &str) -> Result<CharacterModel, LoadError>;
    fn load_clip(&self, path: &str) -> Result<AnimationClip, LoadError>;
}

/// Reads JSON descriptors from a directory.
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, path: &str) -> Result<String, LoadError> {
        let full = self.root.join(path);
        std::fs::read_to_string(&full).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound {
                    path: full.display().to_string(),
                }
            } else {
                LoadError::Io {
                    path: full.display().to_string(),
                    source,
                }
            }
        })
    }
}

impl AssetSource for FsAssetSource {
    fn load_model(&self, path: &str) -> Result<CharacterModel, LoadError> {
        let text = self.read(path)?;
        serde_json::from_str(&text).map_err(|source| LoadError::Parse {
            path: path.to_string(),
            source,
        })
    }

    fn load_clip(&self, path: &str) -> Result<AnimationClip, LoadError> {
        let text = self.read(path)?;
        let clip = parse_clip_json(&text).map_err(|source| LoadError::Parse {
            path: path.to_string(),
            source,
        })?;
        clip.validate_basic().map_err(|reason| LoadError::Invalid {
            path: path.to_string(),
            reason,
        })?;
        Ok(clip)
    }
}

/// Preloaded assets keyed by path; handy for tests and embedded content.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetSource {
    models: hashbrown::HashMap<String, CharacterModel>,
    clips: hashbrown::HashMap<String, AnimationClip>,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, path: &str, model: CharacterModel) -> Self {
        self.models.insert(path.to_string(), model);
        self
    }

    pub fn with_clip(mut self, path: &str, clip: AnimationClip) -> Self {
        self.clips.insert(path.to_string(), clip);
        self
    }
}

impl AssetSource for MemoryAssetSource {
    fn load_model(&self, path: &str) -> Result<CharacterModel, LoadError> {
        self.models.get(path).cloned().ok_or_else(|| LoadError::NotFound {
            path: path.to_string(),
        })
    }

    fn load_clip(&self, path: &str) -> Result<AnimationClip, LoadError> {
        let clip = self.clips.get(path).cloned().ok_or_else(|| LoadError::NotFound {
            path: path.to_string(),
        })?;
        clip.validate_basic().map_err(|reason| LoadError::Invalid {
            path: path.to_string(),
            reason,
        })?;
        Ok(clip)
    }
}

/// What to load: one model and a list of named clips.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadPlan {
    pub model: String,
    pub model_scale: f32,
    pub cast_shadows: bool,
    pub animations: Vec<AnimationAsset>,
}

impl LoadPlan {
    pub fn from_config(cfg: &ControllerConfig) -> Self {
        Self {
            model: cfg.model_file.clone(),
            model_scale: cfg.model_scale,
            cast_shadows: cfg.cast_shadows,
            animations: cfg.animations.clone(),
        }
    }
}

#[derive(Debug)]
pub enum LoadEvent {
    /// First item of a batch started.
    Started { url: String, loaded: usize, total: usize },
    /// An item finished (successfully or not).
    Progress { url: String, loaded: usize, total: usize },
    ModelLoaded(CharacterModel),
    ClipLoaded { name: String, clip: AnimationClip },
    Failed { url: String, error: LoadError },
    /// Every started item has finished.
    Completed { loaded: usize, failed: usize },
}

/// Item bookkeeping for one plan; emits start/progress/completion events.
#[derive(Debug)]
pub struct LoadingManager {
    tx: Sender<LoadEvent>,
    loaded: usize,
    total: usize,
    failed: usize,
    loading: bool,
}

impl LoadingManager {
    fn new(tx: Sender<LoadEvent>) -> Self {
        Self {
            tx,
            loaded: 0,
            total: 0,
            failed: 0,
            loading: false,
        }
    }

    fn emit(&self, event: LoadEvent) {
        // A dropped receiver means the controller is gone; nothing left to notify.
        let _ = self.tx.send(event);
    }

    fn item_start(&mut self, url: &str) {
        self.total += 1;
        if !self.loading {
            self.emit(LoadEvent::Started {
                url: url.to_string(),
                loaded: self.loaded,
                total: self.total,
            });
        }
        self.loading = true;
    }

    fn item_error(&mut self, url: &str, error: LoadError) {
        self.failed += 1;
        self.emit(LoadEvent::Failed {
            url: url.to_string(),
            error,
        });
    }

    fn item_end(&mut self, url: &str) {
        self.loaded += 1;
        self.emit(LoadEvent::Progress {
            url: url.to_string(),
            loaded: self.loaded,
            total: self.total,
        });
        if self.loaded == self.total {
            self.loading = false;
            self.emit(LoadEvent::Completed {
                loaded: self.loaded - self.failed,
                failed: self.failed,
            });
        }
    }

    fn run(&mut self, source: &dyn AssetSource, plan: &LoadPlan) {
        let model_url = plan.model.as_str();
        self.item_start(model_url);
        match source.load_model(model_url) {
            Ok(mut model) => {
                model.scale = plan.model_scale;
                model.cast_shadows = plan.cast_shadows;
                log::info!("character model '{}' loaded", model.name);
                self.emit(LoadEvent::ModelLoaded(model));
                // Clips are requested only once the model exists to bind them to.
                for anim in &plan.animations {
                    self.item_start(&anim.file);
                }
                self.item_end(model_url);
                for anim in &plan.animations {
                    match source.load_clip(&anim.file) {
                        Ok(clip) => {
                            log::debug!("animation '{}' loaded from {}", anim.name, anim.file);
                            self.emit(LoadEvent::ClipLoaded {
                                name: anim.name.clone(),
                                clip,
                            });
                        }
                        Err(e) => self.item_error(&anim.file, e),
                    }
                    self.item_end(&anim.file);
                }
            }
            Err(e) => {
                self.item_error(model_url, e);
                self.item_end(model_url);
            }
        }
    }

    /// Run `plan` on a background thread.
    pub fn spawn(
        source: Arc<dyn AssetSource>,
        plan: LoadPlan,
    ) -> Result<LoadingHandle, std::io::Error> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let thread = std::thread::Builder::new()
            .name("asset-loader".into())
            .spawn(move || {
                LoadingManager::new(tx).run(source.as_ref(), &plan);
            })?;
        Ok(LoadingHandle {
            rx,
            thread: Some(thread),
        })
    }

    /// Run `plan` to completion on the calling thread. Events are still delivered
    /// through the handle, in the same order as with [`LoadingManager::spawn`].
    pub fn run_blocking(source: &dyn AssetSource, plan: &LoadPlan) -> LoadingHandle {
        let (tx, rx) = crossbeam_channel::unbounded();
        LoadingManager::new(tx).run(source, plan);
        LoadingHandle { rx, thread: None }
    }
}

/// Consumer side of a running (or finished) load.
#[derive(Debug)]
pub struct LoadingHandle {
    rx: Receiver<LoadEvent>,
    thread: Option<JoinHandle<()>>,
}

impl LoadingHandle {
    /// Events that have arrived so far, without blocking.
    pub fn poll(&self) -> Vec<LoadEvent> {
        self.rx.try_iter().collect()
    }

    /// Block for the next event; `None` once the loader has finished and the
    /// channel is drained.
    pub fn recv(&self) -> Option<LoadEvent> {
        self.rx.recv().ok()
    }

    /// True once the loading thread (if any) has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Block until the loading thread exits. Every event it produced stays queued.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("asset loading thread panicked");
            }
        }
    }
}
