//! Engine configuration and theme defaults
//!
//! Both load from JSON files; every field has a default so an empty object is
//! a valid configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::compiler::RenderMode;
use crate::css::Breakpoints;
use crate::node::{Attributes, NodeKind};
use crate::style::ThemeDefaultsProvider;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
        path: path.display().to_string(),
        source,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "default_tablet_breakpoint")]
    pub tablet_breakpoint: u32,
    #[serde(default = "default_phone_breakpoint")]
    pub phone_breakpoint: u32,
    #[serde(default = "default_class_prefix")]
    pub class_prefix: String,
    #[serde(default)]
    pub default_render_mode: RenderMode,
    #[serde(default = "default_max_document_major")]
    pub max_document_major: u64,
}

fn default_tablet_breakpoint() -> u32 { 980 }
fn default_phone_breakpoint() -> u32 { 767 }
fn default_class_prefix() -> String { "pf".to_string() }
fn default_max_document_major() -> u64 { 1 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tablet_breakpoint: default_tablet_breakpoint(),
            phone_breakpoint: default_phone_breakpoint(),
            class_prefix: default_class_prefix(),
            default_render_mode: RenderMode::default(),
            max_document_major: default_max_document_major(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        read_json(path)
    }

    pub fn breakpoints(&self) -> Breakpoints {
        Breakpoints {
            tablet: self.tablet_breakpoint,
            phone: self.phone_breakpoint,
        }
    }
}

/// Site-wide default attributes per kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThemeDefaults {
    kinds: BTreeMap<NodeKind, Attributes>,
}

impl ThemeDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Missing file means no theme defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        read_json(path)
    }

    pub fn set(&mut self, kind: impl Into<NodeKind>, attrs: Attributes) {
        self.kinds.insert(kind.into(), attrs);
    }
}

impl ThemeDefaultsProvider for ThemeDefaults {
    fn defaults_for(&self, kind: &NodeKind) -> Option<&Attributes> {
        self.kinds.get(kind)
    }
}
