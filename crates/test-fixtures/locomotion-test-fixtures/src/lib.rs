//! Shared character fixtures for tests and benches.
//!
//! `fixtures/manifest.json` maps a character name to its controller config and the
//! directory its model and clip descriptors live in.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    characters: HashMap<String, CharacterEntry>,
}

#[derive(Debug, Deserialize)]
struct CharacterEntry {
    config: String,
    assets: String,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read character fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse character fixture {rel}"))
}

fn lookup(name: &str) -> Result<&'static CharacterEntry> {
    MANIFEST
        .characters
        .get(name)
        .ok_or_else(|| anyhow!("unknown character fixture '{name}'"))
}

pub mod characters {
    use super::*;

    pub fn keys() -> Vec<String> {
        let mut keys: Vec<String> = MANIFEST.characters.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn config_json(name: &str) -> Result<String> {
        read_to_string(&lookup(name)?.config)
    }

    /// Deserialize the character's controller config.
    pub fn config<T: DeserializeOwned>(name: &str) -> Result<T> {
        load_json(&lookup(name)?.config)
    }

    pub fn config_path(name: &str) -> Result<PathBuf> {
        Ok(resolve_path(&lookup(name)?.config))
    }

    /// Directory the character's model and clip descriptors are read from.
    pub fn assets_root(name: &str) -> Result<PathBuf> {
        let root = resolve_path(&lookup(name)?.assets);
        if !root.is_dir() {
            return Err(anyhow!("asset directory {} is missing", root.display()));
        }
        Ok(root)
    }

    /// Raw text of one asset descriptor of `name`.
    pub fn asset_json(name: &str, file: &str) -> Result<String> {
        let rel = format!("{}/{file}", lookup(name)?.assets);
        read_to_string(&rel)
    }
}
