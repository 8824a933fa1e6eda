use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Server hosting `documents/index.json` and the documents themselves.
    pub base_url: Option<String>,
    /// Local directory used instead of `base_url`.
    pub documents_dir: Option<PathBuf>,
    pub initial_scale: f32,
    /// Fractional scale change per ctrl+wheel tick.
    pub zoom_step: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub presumed_visible_pages: usize,
    /// Vertical gap between pages, in pixels.
    pub page_gap: f32,
    /// Scroll distance per wheel tick or `j`/`k`, in pixels.
    pub scroll_step: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            documents_dir: None,
            initial_scale: 1.2,
            zoom_step: 0.05,
            min_scale: 0.25,
            max_scale: 8.0,
            presumed_visible_pages: 4,
            page_gap: 16.0,
            scroll_step: 48.0,
        }
    }
}

impl ViewerConfig {
    pub fn default_path(dirs: &ProjectDirs) -> PathBuf {
        dirs.config_dir().join("config.toml")
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw =
            fs::read_to_string(path).with_context(|| format!("failed to read config {:?}", path))?;
        let config: Self =
            toml::from_str(&raw).with_context(|| format!("failed to parse config {:?}", path))?;
        Ok(config.sanitized())
    }

    /// Clamps values that would make the viewer misbehave.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.min_scale.is_finite() && self.min_scale > 0.0) {
            self.min_scale = defaults.min_scale;
        }
        if !(self.max_scale.is_finite() && self.max_scale >= self.min_scale) {
            self.max_scale = defaults.max_scale.max(self.min_scale);
        }
        if !self.initial_scale.is_finite() {
            self.initial_scale = defaults.initial_scale;
        }
        self.initial_scale = self.initial_scale.clamp(self.min_scale, self.max_scale);
        if !(self.zoom_step.is_finite() && self.zoom_step > 0.0 && self.zoom_step < 1.0) {
            self.zoom_step = defaults.zoom_step;
        }
        if !(self.page_gap.is_finite() && self.page_gap >= 0.0) {
            self.page_gap = defaults.page_gap;
        }
        if !(self.scroll_step.is_finite() && self.scroll_step > 0.0) {
            self.scroll_step = defaults.scroll_step;
        }
        self
    }

    pub fn clamp_scale(&self, scale: f32) -> f32 {
        scale.clamp(self.min_scale, self.max_scale)
    }
}
